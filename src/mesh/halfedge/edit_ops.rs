// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

/// Divides the segment of `h` at `interpolation_factor` (0 is the tail, 1 the
/// head), creating a vertex in between. Works on boundary halfedges too.
///
/// ## Id Stability
/// Let (a, b) be the (src, dst) endpoints of `h`, and m the new vertex. On the
/// new mesh, `h` covers the first half of the segment (a -> m) and keeps its
/// edge. A new halfedge continues from m to b. When `h` has a pair `p`, `p`
/// becomes b -> m and a new halfedge continues from m to a.
pub fn split_edge(mesh: &mut HalfEdgeMesh, h: HalfEdgeId, interpolation_factor: f32) -> Result<VertexId> {
    let (a, b) = mesh.at_halfedge(h).src_dst_pair()?;
    let pos = mesh[a].position.lerp(mesh[b].position, interpolation_factor);
    split_edge_at(mesh, h, pos)
}

/// Same as [`split_edge`], placing the new vertex at `pos`.
pub fn split_edge_at(mesh: &mut HalfEdgeMesh, h: HalfEdgeId, pos: Vec3) -> Result<VertexId> {
    let (a, b) = mesh.at_halfedge(h).src_dst_pair()?;
    let h_next = mesh.at_halfedge(h).next().try_end()?;
    let pair = mesh[h].pair;

    let m = mesh.alloc_vertex(pos, None);
    let h2 = mesh.alloc_halfedge(HalfEdge {
        vertex: Some(b),
        next: Some(h_next),
        face: mesh[h].face,
        ..Default::default()
    });
    mesh[h].vertex = Some(m);
    mesh[h].next = Some(h2);
    mesh[m].halfedge = Some(h2);

    if let Some(p) = pair {
        let p_next = mesh.at_halfedge(p).next().try_end()?;
        let p2 = mesh.alloc_halfedge(HalfEdge {
            vertex: Some(a),
            next: Some(p_next),
            face: mesh[p].face,
            ..Default::default()
        });
        mesh[p].vertex = Some(m);
        mesh[p].next = Some(p2);

        // a -> m keeps the old edge, m -> b gets a new one.
        let old_edge = mesh[h].edge;
        mesh[h].pair = Some(p2);
        mesh[p2].pair = Some(h);
        mesh[p2].edge = old_edge;
        if let Some(e) = old_edge {
            mesh[e].halfedge = Some(h);
        }
        mesh.link_pair(h2, p);
    }

    Ok(m)
}

/// Cuts `face` by creating a new edge between vertices `v` and `w`. Both
/// vertices must be on the face, and not be consecutive on it. Returns the
/// new halfedge going from `v` to `w`, which stays on `face`. The other side
/// gets a new face.
pub fn cut_face(mesh: &mut HalfEdgeMesh, face: FaceId, v: VertexId, w: VertexId) -> Result<HalfEdgeId> {
    let face_halfedges = mesh.at_face(face).halfedges()?;
    let into = |target: VertexId| {
        face_halfedges
            .iter_cpy()
            .find(|h| mesh[*h].vertex == Some(target))
    };
    let (Some(h_into_v), Some(h_into_w)) = (into(v), into(w)) else {
        bail!(MeshError::InvalidElement(format!(
            "cut_face: {v:?} and {w:?} must both be on face {face:?}"
        )));
    };
    let h_v_out = mesh.at_halfedge(h_into_v).next().try_end()?;
    let h_w_out = mesh.at_halfedge(h_into_w).next().try_end()?;
    if v == w || mesh[h_v_out].vertex == Some(w) || mesh[h_w_out].vertex == Some(v) {
        bail!(MeshError::InvalidTopology(format!(
            "cut_face: {v:?} and {w:?} are adjacent on face {face:?}"
        )));
    }

    let new_face = mesh.alloc_face(None);
    let h_v_w = mesh.alloc_halfedge(HalfEdge {
        vertex: Some(w),
        next: Some(h_w_out),
        face: Some(face),
        ..Default::default()
    });
    let h_w_v = mesh.alloc_halfedge(HalfEdge {
        vertex: Some(v),
        next: Some(h_v_out),
        face: Some(new_face),
        ..Default::default()
    });
    mesh[h_into_v].next = Some(h_v_w);
    mesh[h_into_w].next = Some(h_w_v);
    mesh.link_pair(h_v_w, h_w_v);

    mesh[face].halfedge = Some(h_v_w);
    mesh[new_face].halfedge = Some(h_w_v);
    for h in mesh.halfedge_loop(h_w_v) {
        mesh[h].face = Some(new_face);
    }

    Ok(h_v_w)
}

/// A sequence of halfedges where each one starts where the previous one ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HalfEdgeChain {
    pub halfedges: Vec<HalfEdgeId>,
    /// Whether the last halfedge ends where the first one starts.
    pub closed: bool,
}

/// Groups the boundary (unpaired) halfedges in `halfedges` into chains,
/// following the boundary in the direction of the halfedges. Halfedges that
/// have a pair are ignored. Chains are returned in the order their first
/// halfedge appears in the input.
pub fn boundary_chains(mesh: &HalfEdgeMesh, halfedges: &[HalfEdgeId]) -> Result<Vec<HalfEdgeChain>> {
    let mut boundary = vec![];
    let mut seen = HashSet::<HalfEdgeId>::new();
    let mut by_tail = HashMap::<VertexId, HalfEdgeId>::new();
    for &h in halfedges {
        if !mesh.at_halfedge(h).is_boundary()? || !seen.insert(h) {
            continue;
        }
        let tail = mesh.at_halfedge(h).src_vertex().try_end()?;
        if by_tail.insert(tail, h).is_some() {
            log::warn!("Boundary vertex {tail:?} has more than one outgoing boundary halfedge");
        }
        boundary.push(h);
    }

    let mut successor = HashMap::<HalfEdgeId, HalfEdgeId>::new();
    let mut has_predecessor = HashSet::<HalfEdgeId>::new();
    for &h in &boundary {
        let head = mesh.at_halfedge(h).vertex().try_end()?;
        if let Some(&g) = by_tail.get(&head) {
            successor.insert(h, g);
            has_predecessor.insert(g);
        }
    }

    let mut visited = HashSet::<HalfEdgeId>::new();
    let walk = |start: HalfEdgeId, visited: &mut HashSet<HalfEdgeId>| -> HalfEdgeChain {
        let mut chain = vec![];
        let mut h = start;
        loop {
            chain.push(h);
            visited.insert(h);
            match successor.get(&h) {
                Some(&g) if g == start => {
                    return HalfEdgeChain {
                        halfedges: chain,
                        closed: true,
                    }
                }
                Some(&g) if !visited.contains(&g) => h = g,
                _ => {
                    return HalfEdgeChain {
                        halfedges: chain,
                        closed: false,
                    }
                }
            }
        }
    };

    let mut chains = vec![];
    // Open chains start at a halfedge nothing leads to.
    for &h in &boundary {
        if !has_predecessor.contains(&h) && !visited.contains(&h) {
            chains.push((h, walk(h, &mut visited)));
        }
    }
    // Whatever remains is made of closed loops.
    for &h in &boundary {
        if !visited.contains(&h) {
            chains.push((h, walk(h, &mut visited)));
        }
    }

    let order: HashMap<HalfEdgeId, usize> =
        boundary.iter().enumerate().map(|(i, h)| (*h, i)).collect();
    chains.sort_by_key(|(start, _)| order[start]);
    Ok(chains.into_iter().map(|(_, chain)| chain).collect())
}

/// Closes every closed boundary chain found among `halfedges` with a new
/// face. The new face's halfedges are paired with the chain. Open chains, and
/// loops with less than three halfedges, are left untouched. Returns the new
/// faces.
pub fn cap_boundary_loops(mesh: &mut HalfEdgeMesh, halfedges: &[HalfEdgeId]) -> Result<Vec<FaceId>> {
    let mut caps = vec![];
    for chain in boundary_chains(mesh, halfedges)? {
        if !chain.closed {
            log::debug!("Not capping open boundary chain of {} halfedges", chain.halfedges.len());
            continue;
        }
        if chain.halfedges.len() < 3 {
            log::warn!("Not capping degenerate boundary loop of {} halfedges", chain.halfedges.len());
            continue;
        }

        let face = mesh.alloc_face(None);
        // Each cap halfedge runs against its chain halfedge, so it points to
        // the chain halfedge's tail.
        let cap_halfedges = chain
            .halfedges
            .iter()
            .map(|&h| -> Result<HalfEdgeId> {
                let tail = mesh.at_halfedge(h).src_vertex().try_end()?;
                let c = mesh.alloc_halfedge(HalfEdge {
                    vertex: Some(tail),
                    face: Some(face),
                    ..Default::default()
                });
                mesh.link_pair(h, c);
                Ok(c)
            })
            .collect::<Result<Vec<_>>>()?;
        // The cap loop goes around in the opposite direction.
        for (&c, &c_prev) in cap_halfedges.iter().circular_tuple_windows() {
            mesh[c_prev].next = Some(c);
        }
        mesh[face].halfedge = cap_halfedges.first().copied();
        caps.push(face);
    }
    Ok(caps)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::halfedge::primitives::*;

    #[test]
    fn test_split_edge_interior() {
        let mut mesh = Tetrahedron::build();
        let h = mesh.halfedge_ids()[0];
        let p = mesh.at_halfedge(h).pair().end();
        let e = mesh[h].edge().unwrap();
        let (a, b) = mesh.at_halfedge(h).src_dst_pair().unwrap();

        let m = split_edge(&mut mesh, h, 0.5).unwrap();
        mesh.validate().unwrap();

        let expected = (mesh.vertex_position(a) + mesh.vertex_position(b)) * 0.5;
        assert!(mesh.vertex_position(m).abs_diff_eq(expected, 1e-6));
        assert_eq!(mesh.at_halfedge(h).src_dst_pair().unwrap(), (a, m));
        assert_eq!(mesh.at_halfedge(h).next().vertex().end(), b);
        assert_eq!(mesh.at_halfedge(p).src_dst_pair().unwrap(), (b, m));
        assert_eq!(mesh[h].edge(), Some(e));

        assert_eq!(mesh.num_vertices(), 5);
        assert_eq!(mesh.num_edges(), 7);
        assert_eq!(mesh.num_halfedges(), 14);
        assert_eq!(mesh.vertex_valence(m), 2);
        assert_eq!(mesh.euler_characteristic(), 2);
    }

    #[test]
    fn test_split_edge_boundary() {
        let mut mesh = Quad::build(Vec3::ZERO, Vec3::Y, Vec3::X, Vec2::ONE);
        let h = mesh.halfedge_ids()[0];
        let m = split_edge(&mut mesh, h, 0.25).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.face_order(mesh.face_ids()[0]), 5);
        assert_eq!(mesh.num_edges(), 0);
        assert_eq!(mesh.boundary_halfedges().len(), 5);
        assert_eq!(mesh.halfedge_head(h), m);
    }

    #[test]
    fn test_cut_face() {
        let mut mesh = Box::build(Vec3::ZERO, Vec3::ONE);
        let f = mesh.face_ids()[0];
        let verts = mesh.face_vertices(f);
        let h = cut_face(&mut mesh, f, verts[0], verts[2]).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.num_faces(), 7);
        assert_eq!(mesh.num_edges(), 13);
        assert_eq!(mesh.face_order(f), 3);
        assert_eq!(mesh[h].face(), Some(f));
        let other = mesh.at_halfedge(h).pair().face().end();
        assert_eq!(mesh.face_order(other), 3);
        assert_eq!(mesh.euler_characteristic(), 2);

        // Adjacent vertices can't be cut
        let g = mesh.face_ids()[1];
        let verts = mesh.face_vertices(g);
        let err = cut_face(&mut mesh, g, verts[0], verts[1]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MeshError>(),
            Some(MeshError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_boundary_chains() {
        let grid = Grid::build(2, 2);
        let chains = boundary_chains(&grid, &grid.boundary_halfedges()).unwrap();
        assert_eq!(chains.len(), 1);
        assert!(chains[0].closed);
        assert_eq!(chains[0].halfedges.len(), 8);
        for (&a, &b) in chains[0].halfedges.iter().circular_tuple_windows() {
            assert_eq!(grid.halfedge_head(a), grid.halfedge_tail(b));
        }

        // A partial selection of the boundary is an open chain
        let partial = chains[0].halfedges[2..5].to_vec();
        let open = boundary_chains(&grid, &partial).unwrap();
        assert_eq!(
            open,
            vec![HalfEdgeChain {
                halfedges: partial,
                closed: false
            }]
        );
    }

    #[test]
    fn test_cap_boundary_loops() {
        let mut mesh = Box::build(Vec3::ZERO, Vec3::ONE);
        let top = mesh
            .face_ids()
            .into_iter()
            .find(|f| mesh.face_normal(*f).unwrap().abs_diff_eq(Vec3::Y, 1e-5))
            .unwrap();
        mesh.remove_faces(&[top]).unwrap();
        mesh.clean_unused_elements_by_face();

        let boundary = mesh.boundary_halfedges();
        let caps = cap_boundary_loops(&mut mesh, &boundary).unwrap();
        mesh.validate().unwrap();
        assert_eq!(caps.len(), 1);
        assert!(mesh.is_closed());
        assert_eq!(mesh.num_faces(), 6);
        assert_eq!(mesh.num_edges(), 12);
        assert!(mesh.face_normal(caps[0]).unwrap().abs_diff_eq(Vec3::Y, 1e-5));
    }
}
