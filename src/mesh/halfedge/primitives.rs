// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Every shape here reduces to a face list and goes through the builder. Face
//! windings are counter-clockwise seen from outside.

use super::*;

pub struct Tetrahedron;
impl Tetrahedron {
    pub fn facelist() -> (Vec<Vec3>, Vec<[u32; 3]>) {
        let positions = vec![
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
        ];
        let faces = vec![[0, 1, 2], [0, 2, 3], [0, 3, 1], [1, 3, 2]];
        (positions, faces)
    }

    pub fn build() -> HalfEdgeMesh {
        let (positions, faces) = Self::facelist();
        HalfEdgeMesh::build_from_polygons(&positions, &faces)
            .expect("Tetrahedron construction should not fail")
    }
}

pub struct Box;
impl Box {
    pub fn facelist(center: Vec3, size: Vec3) -> (Vec<Vec3>, Vec<[u32; 4]>) {
        let hsize = size * 0.5;
        let corner = |x: f32, y: f32, z: f32| center + hsize * Vec3::new(x, y, z);
        let positions = vec![
            corner(-1.0, -1.0, -1.0),
            corner(1.0, -1.0, -1.0),
            corner(1.0, -1.0, 1.0),
            corner(-1.0, -1.0, 1.0),
            corner(-1.0, 1.0, -1.0),
            corner(-1.0, 1.0, 1.0),
            corner(1.0, 1.0, 1.0),
            corner(1.0, 1.0, -1.0),
        ];
        let faces = vec![
            // Bottom, top
            [0, 1, 2, 3],
            [4, 5, 6, 7],
            // Front, back
            [4, 7, 1, 0],
            [3, 2, 6, 5],
            // Left, right
            [5, 4, 0, 3],
            [6, 2, 1, 7],
        ];
        (positions, faces)
    }

    pub fn build(center: Vec3, size: Vec3) -> HalfEdgeMesh {
        let (positions, faces) = Self::facelist(center, size);
        HalfEdgeMesh::build_from_polygons(&positions, &faces)
            .expect("Cube construction should not fail")
    }
}

pub struct Octahedron;
impl Octahedron {
    pub fn facelist() -> (Vec<Vec3>, Vec<[u32; 3]>) {
        let positions = vec![Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
        let faces = vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];
        (positions, faces)
    }

    pub fn build() -> HalfEdgeMesh {
        let (positions, faces) = Self::facelist();
        HalfEdgeMesh::build_from_polygons(&positions, &faces)
            .expect("Octahedron construction should not fail")
    }
}

pub struct Icosahedron;
impl Icosahedron {
    pub fn facelist() -> (Vec<Vec3>, Vec<[u32; 3]>) {
        let t = (1.0 + 5.0f32.sqrt()) / 2.0;
        let positions = vec![
            Vec3::new(-1.0, t, 0.0),
            Vec3::new(1.0, t, 0.0),
            Vec3::new(-1.0, -t, 0.0),
            Vec3::new(1.0, -t, 0.0),
            Vec3::new(0.0, -1.0, t),
            Vec3::new(0.0, 1.0, t),
            Vec3::new(0.0, -1.0, -t),
            Vec3::new(0.0, 1.0, -t),
            Vec3::new(t, 0.0, -1.0),
            Vec3::new(t, 0.0, 1.0),
            Vec3::new(-t, 0.0, -1.0),
            Vec3::new(-t, 0.0, 1.0),
        ];
        #[rustfmt::skip]
        let faces = vec![
            [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
            [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
            [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
            [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
        ];
        (positions, faces)
    }

    pub fn build() -> HalfEdgeMesh {
        let (positions, faces) = Self::facelist();
        HalfEdgeMesh::build_from_polygons(&positions, &faces)
            .expect("Icosahedron construction should not fail")
    }
}

pub struct Quad;
impl Quad {
    pub fn build(center: Vec3, normal: Vec3, right: Vec3, size: Vec2) -> HalfEdgeMesh {
        let normal = normal.normalize();
        let right = right.normalize();
        let forward = normal.cross(right);

        let hsize = size * 0.5;

        let v1 = center + hsize.x * right + hsize.y * forward;
        let v2 = center - hsize.x * right + hsize.y * forward;
        let v3 = center - hsize.x * right - hsize.y * forward;
        let v4 = center + hsize.x * right - hsize.y * forward;

        HalfEdgeMesh::build_from_polygons(&[v1, v2, v3, v4], &[[0u32, 1, 2, 3]])
            .expect("Quad construction should not fail")
    }
}

/// A flat grid of quads on the XZ plane, spanning from -1 to 1 on both axes
/// and facing up.
pub struct Grid;
impl Grid {
    pub fn facelist(cells_x: u32, cells_z: u32) -> (Vec<Vec3>, Vec<[u32; 4]>) {
        let cells_x = cells_x.max(1);
        let cells_z = cells_z.max(1);
        let row = cells_x + 1;
        let positions = (0..=cells_z)
            .cartesian_product(0..=cells_x)
            .map(|(j, i)| {
                Vec3::new(
                    -1.0 + 2.0 * i as f32 / cells_x as f32,
                    0.0,
                    -1.0 + 2.0 * j as f32 / cells_z as f32,
                )
            })
            .collect();
        let faces = (0..cells_z)
            .cartesian_product(0..cells_x)
            .map(|(j, i)| {
                let idx = |i: u32, j: u32| j * row + i;
                [idx(i, j), idx(i, j + 1), idx(i + 1, j + 1), idx(i + 1, j)]
            })
            .collect();
        (positions, faces)
    }

    pub fn build(cells_x: u32, cells_z: u32) -> HalfEdgeMesh {
        let (positions, faces) = Self::facelist(cells_x, cells_z);
        HalfEdgeMesh::build_from_polygons(&positions, &faces)
            .expect("Grid construction should not fail")
    }
}
