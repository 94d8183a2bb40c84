// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use super::*;

/// Pushes vertices along their normals. Topology is left untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Expand {
    pub distance: f32,
}

impl MeshTransform for Expand {
    fn apply_to_selection(&self, mesh: &mut HalfEdgeMesh, selection: &Selection) -> Result<()> {
        let mut vertices = selection.face_vertices(mesh);
        for h in selection.edge_halfedges(mesh) {
            if let Ok((src, dst)) = mesh.at_halfedge(h).src_dst_pair() {
                vertices.insert(src);
                vertices.insert(dst);
            }
        }
        vertices.retain(|v| mesh.vertex_exists(*v));
        if vertices.is_empty() {
            log::debug!("Expand: no vertices selected");
            return Ok(());
        }
        expand_vertices(mesh, &vertices, self.distance);
        Ok(())
    }
}

/// Moves every vertex in `vertices` by `distance` along its vertex normal.
/// Normals are computed before anything moves. Vertices without a normal
/// (isolated, or only touching degenerate faces) stay where they are.
#[profiling::function]
pub fn expand_vertices(mesh: &mut HalfEdgeMesh, vertices: &BTreeSet<VertexId>, distance: f32) {
    let moves = vertices
        .iter()
        .filter_map(|v| Some((*v, mesh.vertex_normal(*v)? * distance)))
        .collect_vec();
    for (v, offset) in moves {
        let pos = mesh.vertex_position(v);
        mesh.set_vertex_position(v, pos + offset);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::halfedge::compact_mesh::CompactMesh;
    use crate::mesh::halfedge::primitives::*;

    #[test]
    fn test_expand_octahedron() {
        let mut mesh = Octahedron::build();
        let before = CompactMesh::from_halfedge(&mesh).unwrap();
        Expand { distance: 0.5 }.apply(&mut mesh).unwrap();
        mesh.validate().unwrap();
        for (_, v) in mesh.iter_vertices() {
            assert!((v.position().length() - 1.5).abs() < 1e-5);
        }
        // Same connectivity, different positions
        let after = CompactMesh::from_halfedge(&mesh).unwrap();
        assert_eq!(after.next, before.next);
        assert_eq!(after.pair, before.pair);
        assert_ne!(after.vertex_positions, before.vertex_positions);
    }

    #[test]
    fn test_expand_selection() {
        let mut mesh = Grid::build(1, 1);
        let f = mesh.face_ids()[0];
        let selection = Selection::from_faces([f]);
        Expand { distance: 2.0 }
            .apply_to_selection(&mut mesh, &selection)
            .unwrap();
        for (_, v) in mesh.iter_vertices() {
            assert!((v.position().y - 2.0).abs() < 1e-6);
        }

        // Only the vertices of the selected edge move
        let mut mesh = Grid::build(2, 1);
        let e = mesh.edge_ids()[0];
        let (a, b) = mesh.at_edge(e).halfedge().src_dst_pair().unwrap();
        Expand { distance: 1.0 }
            .apply_to_selection(&mut mesh, &Selection::from_edges([e]))
            .unwrap();
        for (v, vertex) in mesh.iter_vertices() {
            let expected = if v == a || v == b { 1.0 } else { 0.0 };
            assert!((vertex.position().y - expected).abs() < 1e-6);
        }
    }
}
