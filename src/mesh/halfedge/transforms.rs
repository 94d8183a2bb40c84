// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-mesh and selection-scoped topological transforms. Every transform
//! leaves the mesh in a valid state, or returns an error before touching it.

use serde::{Deserialize, Serialize};

use crate::mesh::halfedge::edit_ops::*;
use crate::prelude::*;

pub mod subdivide;
pub use subdivide::*;

pub mod doo_sabin;
pub use doo_sabin::*;

pub mod expand;
pub use expand::*;

pub mod dual;
pub use dual::*;

pub mod slice;
pub use slice::*;

/// Distances to a plane with `|d| <= PLANE_EPSILON` count as being on it.
pub const PLANE_EPSILON: f32 = 1e-5;

pub trait MeshTransform {
    /// Applies the transform to every element of the mesh.
    fn apply(&self, mesh: &mut HalfEdgeMesh) -> Result<()> {
        let selection = Selection::all(mesh);
        self.apply_to_selection(mesh, &selection)
    }

    /// Applies the transform to the part of the mesh in `selection`. Stale
    /// ids in the selection are ignored.
    fn apply_to_selection(&self, mesh: &mut HalfEdgeMesh, selection: &Selection) -> Result<()>;
}

/// The set of transforms a [`crate::pipeline::Pipeline`] can run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    Subdivide,
    SubdividePlanar,
    DooSabin(DooSabin),
    Expand(Expand),
    Dual,
    Slice(Slice),
    MultiSlice(MultiSlice),
}

impl Transform {
    fn inner(&self) -> &dyn MeshTransform {
        match self {
            Transform::Subdivide => &Subdivide,
            Transform::SubdividePlanar => &SubdividePlanar,
            Transform::DooSabin(t) => t,
            Transform::Expand(t) => t,
            Transform::Dual => &Dual,
            Transform::Slice(t) => t,
            Transform::MultiSlice(t) => t,
        }
    }
}

impl MeshTransform for Transform {
    fn apply(&self, mesh: &mut HalfEdgeMesh) -> Result<()> {
        self.inner().apply(mesh)?;
        log_counts(self, mesh);
        Ok(())
    }

    fn apply_to_selection(&self, mesh: &mut HalfEdgeMesh, selection: &Selection) -> Result<()> {
        self.inner().apply_to_selection(mesh, selection)?;
        log_counts(self, mesh);
        Ok(())
    }
}

fn log_counts(transform: &Transform, mesh: &HalfEdgeMesh) {
    log::debug!(
        "{transform:?}: {} vertices, {} edges, {} faces, {} boundary halfedges",
        mesh.num_vertices(),
        mesh.num_edges(),
        mesh.num_faces(),
        mesh.boundary_halfedges().len(),
    );
}

/// The live faces of `selection`.
pub(crate) fn selected_faces(mesh: &HalfEdgeMesh, selection: &Selection) -> Vec<FaceId> {
    selection
        .faces
        .iter()
        .copied()
        .filter(|f| mesh.face_exists(*f))
        .collect()
}

/// Splits every edge (or boundary halfedge) of `faces` at its midpoint.
/// Returns the new vertices.
pub(crate) fn split_face_edges(mesh: &mut HalfEdgeMesh, faces: &[FaceId]) -> Result<HashSet<VertexId>> {
    let mut seen_edges = HashSet::new();
    let mut to_split = vec![];
    for &f in faces {
        for h in mesh.at_face(f).halfedges()? {
            match mesh[h].edge {
                Some(e) => {
                    if seen_edges.insert(e) {
                        to_split.push(h);
                    }
                }
                None => to_split.push(h),
            }
        }
    }
    to_split
        .into_iter()
        .map(|h| split_edge(mesh, h, 0.5))
        .collect()
}

/// Walks the loop of a face whose edges have all been split by
/// [`split_face_edges`]. Returns one `(into_corner, out_of_corner)` halfedge
/// couple per original corner, in loop order.
pub(crate) fn split_face_corners(
    mesh: &HalfEdgeMesh,
    face: FaceId,
    midpoints: &HashSet<VertexId>,
) -> Result<Vec<(HalfEdgeId, HalfEdgeId)>> {
    let halfedges = mesh.at_face(face).halfedges()?;
    let start = halfedges
        .iter()
        .position(|h| midpoints.contains(&mesh.halfedge_tail(*h)))
        .ok_or_else(|| anyhow!(MeshError::Inconsistent(format!("face {face:?} has no split edges"))))?;
    let rotated = halfedges[start..]
        .iter()
        .chain(&halfedges[..start])
        .copied()
        .collect_vec();
    if rotated.len() % 2 != 0 {
        bail!(MeshError::Inconsistent(format!(
            "face {face:?} has an unsplit edge"
        )));
    }
    Ok(rotated.into_iter().tuples().collect())
}
