// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use super::*;

/// Doo-Sabin style subdivision. Only defined for closed meshes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DooSabin {
    /// How far each face corner moves towards the averaged corner point. 1.0
    /// is classic Doo-Sabin, 0.0 keeps corners in place.
    pub ratio: f32,
}

impl Default for DooSabin {
    fn default() -> Self {
        Self { ratio: 1.0 }
    }
}

impl MeshTransform for DooSabin {
    fn apply_to_selection(&self, mesh: &mut HalfEdgeMesh, selection: &Selection) -> Result<()> {
        if !mesh.is_closed() {
            bail!(MeshError::InvalidTopology(
                "Doo-Sabin subdivision requires a closed mesh".into()
            ));
        }
        if mesh.face_ids().iter().any(|f| !selection.faces.contains(f)) {
            bail!(MeshError::InvalidTopology(
                "Doo-Sabin subdivision can only be applied to the whole mesh".into()
            ));
        }
        *mesh = doo_sabin(mesh, self.ratio)?;
        Ok(())
    }
}

/// Builds the Doo-Sabin refinement of a closed `mesh`. Each face corner gets
/// its own vertex. Faces shrink into F-faces, edges become quads (E-faces) and
/// each vertex becomes a face joining the corners around it (V-faces).
#[profiling::function]
pub fn doo_sabin(mesh: &HalfEdgeMesh, ratio: f32) -> Result<HalfEdgeMesh> {
    // One point per face corner, identified by the halfedge going into it.
    let mut corner_idx = SecondaryMap::<HalfEdgeId, u32>::new();
    let mut positions = vec![];
    let mut faces: Vec<SVec<u32>> = vec![];

    for (f, _) in mesh.iter_faces() {
        let centroid = mesh.face_centroid(f);
        let mut f_face = SVec::new();
        for h in mesh.at_face(f).halfedges()? {
            let v = mesh.at_halfedge(h).vertex().try_end()?;
            let out = mesh.at_halfedge(h).next().try_end()?;
            let corner = mesh[v].position;
            let target = (centroid + corner + mesh.edge_centroid(h) + mesh.edge_centroid(out)) / 4.0;
            corner_idx.insert(h, positions.len() as u32);
            f_face.push(positions.len() as u32);
            positions.push(corner.lerp(target, ratio));
        }
        faces.push(f_face);
    }

    for e in mesh.edge_ids() {
        let h = mesh.at_edge(e).halfedge().try_end()?;
        let pair = mesh.at_halfedge(h).pair().try_end()?;
        let h_prev = mesh.at_halfedge(h).previous().try_end()?;
        let pair_prev = mesh.at_halfedge(pair).previous().try_end()?;
        faces.push(smallvec::smallvec![
            corner_idx[h],
            corner_idx[h_prev],
            corner_idx[pair],
            corner_idx[pair_prev],
        ]);
    }

    for (v, _) in mesh.iter_vertices() {
        // Rotating around the fan goes clockwise seen from outside, so the
        // corners are walked backwards.
        let mut v_face = mesh
            .at_vertex(v)
            .outgoing_halfedges()?
            .iter()
            .map(|out| Ok(corner_idx[mesh.at_halfedge(*out).previous().try_end()?]))
            .collect::<Result<SVec<u32>>>()?;
        v_face.reverse();
        if v_face.len() >= 3 {
            faces.push(v_face);
        }
    }

    HalfEdgeMesh::build_from_facelist(
        &positions,
        &faces,
        &FacelistOptions {
            duplicate: true,
            ..Default::default()
        },
    )
}
