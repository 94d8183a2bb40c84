// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use super::*;

/// Mid-edge subdivision. Every n-gon becomes n corner triangles around a
/// smaller n-gon joining the edge midpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Subdivide;

/// Quad subdivision without smoothing. Every n-gon becomes n quads meeting at
/// the face centroid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubdividePlanar;

impl MeshTransform for Subdivide {
    fn apply_to_selection(&self, mesh: &mut HalfEdgeMesh, selection: &Selection) -> Result<()> {
        let faces = selected_faces(mesh, selection);
        if faces.is_empty() {
            log::debug!("Subdivide: no faces selected");
            return Ok(());
        }
        midedge_subdivide(mesh, &faces)?;
        Ok(())
    }
}

impl MeshTransform for SubdividePlanar {
    fn apply_to_selection(&self, mesh: &mut HalfEdgeMesh, selection: &Selection) -> Result<()> {
        let faces = selected_faces(mesh, selection);
        if faces.is_empty() {
            log::debug!("SubdividePlanar: no faces selected");
            return Ok(());
        }
        planar_subdivide(mesh, &faces)?;
        Ok(())
    }
}

/// Applies mid-edge subdivision to `faces`. Faces sharing a split edge with
/// them, but not in the list, gain the midpoint as an extra vertex.
///
/// ## Id Stability
/// Each original face id is kept by its central face. Returns all the faces
/// that replace the original ones, central faces included.
#[profiling::function]
pub fn midedge_subdivide(mesh: &mut HalfEdgeMesh, faces: &[FaceId]) -> Result<Vec<FaceId>> {
    let midpoints = split_face_edges(mesh, faces)?;

    let mut new_faces = vec![];
    for &f in faces {
        let corners = split_face_corners(mesh, f, &midpoints)?;
        // mids[i] sits between corner i and corner i + 1
        let mids = corners
            .iter()
            .map(|(_, out)| mesh.halfedge_head(*out))
            .collect_vec();
        let n = corners.len();

        let mut center: SVec<HalfEdgeId> = SVec::new();
        for (i, &(into, out)) in corners.iter().enumerate() {
            let m_prev = mids[(i + n - 1) % n];
            let m_next = mids[i];

            let triangle = mesh.alloc_face(Some(into));
            let closing = mesh.alloc_halfedge(HalfEdge {
                vertex: Some(m_prev),
                next: Some(into),
                face: Some(triangle),
                ..Default::default()
            });
            let inner = mesh.alloc_halfedge(HalfEdge {
                vertex: Some(m_next),
                face: Some(f),
                ..Default::default()
            });

            // Next pointers
            mesh[out].next = Some(closing);
            // Face pointers
            mesh[into].face = Some(triangle);
            mesh[out].face = Some(triangle);
            // Pair pointers
            mesh.link_pair(closing, inner);

            center.push(inner);
            new_faces.push(triangle);
        }
        for (&h, &h_next) in center.iter().circular_tuple_windows() {
            mesh[h].next = Some(h_next);
        }
        mesh[f].halfedge = center.first().copied();
        new_faces.push(f);
    }

    Ok(new_faces)
}

/// Applies planar quad subdivision to `faces`.
///
/// ## Id Stability
/// Each original face id is kept by the quad at its first corner.
#[profiling::function]
pub fn planar_subdivide(mesh: &mut HalfEdgeMesh, faces: &[FaceId]) -> Result<Vec<FaceId>> {
    let centroids = faces.iter().map(|f| mesh.face_centroid(*f)).collect_vec();
    let midpoints = split_face_edges(mesh, faces)?;

    let mut new_faces = vec![];
    for (&f, centroid) in faces.iter().zip(centroids) {
        let corners = split_face_corners(mesh, f, &midpoints)?;
        let mids = corners
            .iter()
            .map(|(_, out)| mesh.halfedge_head(*out))
            .collect_vec();
        let n = corners.len();

        let center = mesh.alloc_vertex(centroid, None);
        let quads = (0..n)
            .map(|i| if i == 0 { f } else { mesh.alloc_face(None) })
            .collect_vec();

        // to_center[i] goes from mids[i] to the center, from_center[i] from
        // the center to mids[i - 1].
        let mut to_center = vec![];
        let mut from_center = vec![];
        for (i, &(into, out)) in corners.iter().enumerate() {
            let from = mesh.alloc_halfedge(HalfEdge {
                vertex: Some(mids[(i + n - 1) % n]),
                next: Some(into),
                face: Some(quads[i]),
                ..Default::default()
            });
            let to = mesh.alloc_halfedge(HalfEdge {
                vertex: Some(center),
                next: Some(from),
                face: Some(quads[i]),
                ..Default::default()
            });
            mesh[out].next = Some(to);
            mesh[into].face = Some(quads[i]);
            mesh[out].face = Some(quads[i]);
            mesh[quads[i]].halfedge = Some(into);
            to_center.push(to);
            from_center.push(from);
        }
        for i in 0..n {
            mesh.link_pair(to_center[i], from_center[(i + 1) % n]);
        }
        mesh[center].halfedge = from_center.first().copied();
        new_faces.extend(quads);
    }

    Ok(new_faces)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::halfedge::compact_mesh::MeshCounts;
    use crate::mesh::halfedge::primitives::*;

    #[test]
    fn test_midedge_tetrahedron() {
        let mut mesh = Tetrahedron::build();
        let expected = MeshCounts::of(&mesh).after_midedge_subdivision();
        Subdivide.apply(&mut mesh).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.num_vertices(), 10);
        assert_eq!(mesh.num_edges(), 24);
        assert_eq!(mesh.num_faces(), 16);
        assert_eq!(MeshCounts::of(&mesh), expected);
        assert!(mesh.iter_faces().all(|(f, _)| mesh.face_order(f) == 3));
    }

    #[test]
    fn test_midedge_euler_characteristic() {
        let mut mesh = Icosahedron::build();
        assert_eq!(mesh.euler_characteristic(), 2);
        for _ in 0..2 {
            Subdivide.apply(&mut mesh).unwrap();
            mesh.validate().unwrap();
            assert_eq!(mesh.euler_characteristic(), 2);
        }
        assert_eq!(mesh.num_faces(), 20 * 16);
    }

    #[test]
    fn test_midedge_open_mesh() {
        let mut mesh = Grid::build(2, 2);
        let expected = MeshCounts::of(&mesh).after_midedge_subdivision();
        Subdivide.apply(&mut mesh).unwrap();
        mesh.validate().unwrap();
        assert_eq!(MeshCounts::of(&mesh), expected);
        assert_eq!(mesh.num_vertices(), 21);
        assert_eq!(mesh.boundary_halfedges().len(), 16);
        assert_eq!(mesh.euler_characteristic(), 1);
    }

    #[test]
    fn test_midedge_selection() {
        let mut mesh = Box::build(Vec3::ZERO, Vec3::ONE);
        let bottom = mesh.face_ids()[0];
        Subdivide
            .apply_to_selection(&mut mesh, &Selection::from_faces([bottom]))
            .unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.num_faces(), 10);
        assert_eq!(mesh.num_vertices(), 12);
        assert_eq!(mesh.face_order(bottom), 4);
        // Side faces got one extra vertex each, the top face none
        let orders = mesh.face_ids().iter().map(|f| mesh.face_order(*f)).sorted().collect_vec();
        assert_eq!(orders, vec![3, 3, 3, 3, 4, 4, 5, 5, 5, 5]);

        // Nothing selected, nothing done
        let before = MeshCounts::of(&mesh);
        Subdivide.apply_to_selection(&mut mesh, &Selection::new()).unwrap();
        assert_eq!(MeshCounts::of(&mesh), before);
    }

    #[test]
    fn test_planar_cube() {
        let mut mesh = Box::build(Vec3::ZERO, Vec3::splat(2.0));
        SubdividePlanar.apply(&mut mesh).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.num_vertices(), 26);
        assert_eq!(mesh.num_edges(), 48);
        assert_eq!(mesh.num_faces(), 24);
        assert!(mesh.iter_faces().all(|(f, _)| mesh.face_order(f) == 4));
        // Flat subdivision does not move anything off the cube
        let (center, size) = mesh.bounding_box();
        assert!(center.abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(size.abs_diff_eq(Vec3::splat(2.0), 1e-6));
        for (f, _) in mesh.iter_faces() {
            let n = mesh.face_normal(f).unwrap();
            assert!(n.dot(mesh.face_centroid(f)) > 0.0);
        }
    }

    #[test]
    fn test_planar_quad() {
        let mut mesh = Quad::build(Vec3::ZERO, Vec3::Y, Vec3::X, Vec2::ONE);
        SubdividePlanar.apply(&mut mesh).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.num_vertices(), 9);
        assert_eq!(mesh.num_faces(), 4);
        assert_eq!(mesh.num_edges(), 4);
        assert_eq!(mesh.boundary_halfedges().len(), 8);
    }
}
