// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use super::*;

/// Replaces the mesh with its dual. Faces become vertices at their centroid,
/// and every vertex with a closed fan becomes a face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dual;

impl MeshTransform for Dual {
    fn apply_to_selection(&self, mesh: &mut HalfEdgeMesh, selection: &Selection) -> Result<()> {
        let faces = selected_faces(mesh, selection);
        *mesh = dual(mesh, &faces)?;
        Ok(())
    }
}

/// Builds the dual of the part of `mesh` covered by `faces`. Only vertices
/// whose fan is closed and made entirely of `faces` produce a dual face.
#[profiling::function]
pub fn dual(mesh: &HalfEdgeMesh, faces: &[FaceId]) -> Result<HalfEdgeMesh> {
    let mut face_idx = SecondaryMap::<FaceId, u32>::new();
    let mut positions = vec![];
    for &f in faces {
        face_idx.insert(f, positions.len() as u32);
        positions.push(mesh.face_centroid(f));
    }

    let mut polygons: Vec<SVec<u32>> = vec![];
    for (v, _) in mesh.iter_vertices() {
        if mesh.is_boundary_vertex(v) {
            continue;
        }
        let fan = mesh.at_vertex(v).adjacent_faces()?;
        let Some(mut polygon) = fan
            .iter()
            .map(|f| face_idx.get(*f).copied())
            .collect::<Option<SVec<u32>>>()
        else {
            continue;
        };
        // The fan goes clockwise seen from outside.
        polygon.reverse();
        if polygon.len() >= 3 {
            polygons.push(polygon);
        }
    }

    HalfEdgeMesh::build_from_facelist(
        &positions,
        &polygons,
        &FacelistOptions {
            duplicate: true,
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::halfedge::compact_mesh::MeshCounts;
    use crate::mesh::halfedge::primitives::*;

    fn vef(mesh: &HalfEdgeMesh) -> (usize, usize, usize) {
        (mesh.num_vertices(), mesh.num_edges(), mesh.num_faces())
    }

    #[test]
    fn test_dual_cube() {
        let mut mesh = Box::build(Vec3::ZERO, Vec3::ONE);
        Dual.apply(&mut mesh).unwrap();
        mesh.validate().unwrap();
        assert_eq!(vef(&mesh), (6, 12, 8));
        for (f, _) in mesh.iter_faces() {
            assert_eq!(mesh.face_order(f), 3);
            let n = mesh.face_normal(f).unwrap();
            assert!(n.dot(mesh.face_centroid(f)) > 0.0);
        }

        Dual.apply(&mut mesh).unwrap();
        mesh.validate().unwrap();
        assert_eq!(vef(&mesh), (8, 12, 6));
    }

    #[test]
    fn test_dual_twice_platonic() {
        for original in [Tetrahedron::build(), Octahedron::build(), Icosahedron::build()] {
            let mut mesh = original.clone();
            Dual.apply(&mut mesh).unwrap();
            Dual.apply(&mut mesh).unwrap();
            mesh.validate().unwrap();
            assert_eq!(MeshCounts::of(&mesh), MeshCounts::of(&original));
        }
    }

    #[test]
    fn test_dual_open_and_partial() {
        // Only the center vertex of a 2x2 grid has a closed fan
        let mut mesh = Grid::build(2, 2);
        Dual.apply(&mut mesh).unwrap();
        mesh.validate().unwrap();
        assert_eq!(vef(&mesh), (4, 0, 1));
        let f = mesh.face_ids()[0];
        assert!(mesh.face_normal(f).unwrap().abs_diff_eq(Vec3::Y, 1e-6));

        // A partial selection only gets faces for fully selected fans
        let mut mesh = Octahedron::build();
        let top: Vec<FaceId> = mesh
            .face_ids()
            .into_iter()
            .filter(|f| mesh.face_centroid(*f).z > 0.0)
            .collect();
        Dual.apply_to_selection(&mut mesh, &Selection::from_faces(top))
            .unwrap();
        mesh.validate().unwrap();
        assert_eq!(vef(&mesh), (4, 0, 1));

        // Nothing selected gives an empty mesh
        let mut mesh = Octahedron::build();
        Dual.apply_to_selection(&mut mesh, &Selection::new()).unwrap();
        assert!(mesh.is_empty());
    }
}
