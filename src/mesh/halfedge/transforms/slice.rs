// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use super::*;

/// Cuts the mesh with a plane and keeps the part in front of it (the side the
/// normal points to). Faces lying on the plane count as being in front.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Slice {
    /// With no plane (or a plane with a zero normal), slicing does nothing.
    pub plane: Option<Plane>,
    /// Close every loop of the cut with a new face.
    pub cap: bool,
}

/// Successive slices, one per plane.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiSlice {
    pub planes: Vec<Plane>,
    pub cap: bool,
}

/// The elements a slice introduced, valid in the sliced mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SliceResult {
    /// Halfedges along the cut on the kept side, plus their edges once capped.
    pub cut_edges: Selection,
    /// Vertices created where edges crossed the plane.
    pub new_vertices: Selection,
    pub caps: Selection,
    /// The surviving part of the sliced faces, caps included.
    pub faces: Selection,
}

impl SliceResult {
    fn merge(&mut self, other: SliceResult) {
        self.cut_edges = self.cut_edges.union(&other.cut_edges);
        self.new_vertices = self.new_vertices.union(&other.new_vertices);
        self.caps = self.caps.union(&other.caps);
        self.faces = other.faces;
    }

    pub fn refresh(&mut self, mesh: &HalfEdgeMesh) {
        self.cut_edges.refresh(mesh);
        self.new_vertices.refresh(mesh);
        self.caps.refresh(mesh);
        self.faces.refresh(mesh);
    }
}

impl Slice {
    pub fn new(plane: Plane, cap: bool) -> Self {
        Self {
            plane: Some(plane),
            cap,
        }
    }

    /// Slices the faces in `selection`. See [`slice_faces`].
    pub fn slice(&self, mesh: &mut HalfEdgeMesh, selection: &Selection) -> Result<SliceResult> {
        let Some(plane) = self.plane.filter(|p| p.is_valid()) else {
            log::debug!("Slice: no cutting plane set, nothing to do");
            return Ok(SliceResult::default());
        };
        let faces = selected_faces(mesh, selection);
        slice_faces(mesh, &plane, &faces, self.cap)
    }
}

impl MeshTransform for Slice {
    fn apply_to_selection(&self, mesh: &mut HalfEdgeMesh, selection: &Selection) -> Result<()> {
        self.slice(mesh, selection)?;
        Ok(())
    }
}

impl MultiSlice {
    /// Slices by every plane in order. Each slice only sees what survived the
    /// previous ones. The result accumulates every slice's elements that are
    /// still alive at the end.
    pub fn slice(&self, mesh: &mut HalfEdgeMesh, selection: &Selection) -> Result<SliceResult> {
        if self.planes.is_empty() {
            log::debug!("MultiSlice: no cutting planes set, nothing to do");
            return Ok(SliceResult::default());
        }
        let mut faces = selected_faces(mesh, selection);
        let mut result = SliceResult::default();
        for plane in &self.planes {
            if !plane.is_valid() {
                log::debug!("MultiSlice: skipping plane with zero normal");
                continue;
            }
            let step = slice_faces(mesh, plane, &faces, self.cap)?;
            faces = step.faces.faces.iter().copied().collect();
            result.merge(step);
            result.refresh(mesh);
        }
        Ok(result)
    }
}

impl MeshTransform for MultiSlice {
    fn apply_to_selection(&self, mesh: &mut HalfEdgeMesh, selection: &Selection) -> Result<()> {
        self.slice(mesh, selection)?;
        Ok(())
    }
}

/// Slices `faces` with `plane`, keeping the front side.
///
/// Edges crossing the plane are split where they cross it, and faces lying on
/// both sides are cut along the plane. Faces left behind the plane are
/// removed. Faces whose boundary crosses the plane more than twice are not
/// cut, and are kept whole.
#[profiling::function]
pub fn slice_faces(mesh: &mut HalfEdgeMesh, plane: &Plane, faces: &[FaceId], cap: bool) -> Result<SliceResult> {
    let boundary_before: HashSet<HalfEdgeId> = mesh.boundary_halfedges().into_iter().collect();

    // --- Split crossing edges ---
    let mut seen_edges = HashSet::new();
    let mut crossings = vec![];
    for &f in faces {
        for h in mesh.at_face(f).halfedges()? {
            if let Some(e) = mesh[h].edge {
                if !seen_edges.insert(e) {
                    continue;
                }
            }
            let (a, b) = mesh.at_halfedge(h).src_dst_pair()?;
            if let Some(t) = plane.segment_intersection(mesh[a].position, mesh[b].position, PLANE_EPSILON) {
                crossings.push((h, t));
            }
        }
    }
    let mut new_vertices = BTreeSet::new();
    for (h, t) in crossings {
        new_vertices.insert(split_edge(mesh, h, t)?);
    }

    let side = |mesh: &HalfEdgeMesh, v: VertexId| {
        if new_vertices.contains(&v) {
            PlaneSide::On
        } else {
            plane.classify(mesh[v].position, PLANE_EPSILON)
        }
    };
    let sides_of = |mesh: &HalfEdgeMesh, f: FaceId| {
        let sides = mesh.face_vertices(f).iter().map(|v| side(mesh, *v)).collect_vec();
        (sides.contains(&PlaneSide::Front), sides.contains(&PlaneSide::Back))
    };

    // --- Cut straddling faces ---
    let mut sliced = faces.to_vec();
    for &f in faces {
        if sides_of(mesh, f) != (true, true) {
            continue;
        }
        let on_plane = mesh
            .face_vertices(f)
            .into_iter()
            .filter(|v| side(mesh, *v) == PlaneSide::On)
            .collect_vec();
        if on_plane.len() != 2 {
            log::warn!(
                "Face {f:?} touches the cutting plane at {} vertices, leaving it uncut",
                on_plane.len()
            );
            continue;
        }
        match cut_face(mesh, f, on_plane[0], on_plane[1]) {
            Ok(h) => sliced.push(mesh.at_halfedge(h).pair().face().try_end()?),
            Err(err) => log::warn!("Could not cut face {f:?} along the plane: {err}"),
        }
    }

    // --- Remove what's behind ---
    let behind = sliced
        .iter()
        .copied()
        .filter(|f| sides_of(mesh, *f) == (false, true))
        .collect_vec();
    mesh.remove_faces(&behind)?;
    mesh.clean_unused_elements_by_face();

    // --- Track the cut ---
    // Faces lying on the plane already close the cut where they are.
    let on_coplanar_face = |h: HalfEdgeId| {
        mesh[h]
            .face
            .map_or(false, |f| sides_of(mesh, f) == (false, false))
    };
    let cut = mesh
        .boundary_halfedges()
        .into_iter()
        .filter(|h| !boundary_before.contains(h))
        .filter(|h| {
            side(mesh, mesh.halfedge_tail(*h)) == PlaneSide::On
                && side(mesh, mesh.halfedge_head(*h)) == PlaneSide::On
        })
        .filter(|h| !on_coplanar_face(*h))
        .collect_vec();
    new_vertices.retain(|v| mesh.vertex_exists(*v));

    let caps = if cap {
        cap_boundary_loops(mesh, &cut)?
    } else {
        vec![]
    };

    let mut cut_edges = Selection::from_halfedges(cut.iter().copied());
    cut_edges.edges.extend(cut.iter().filter_map(|h| mesh[*h].edge));
    let mut kept = Selection::from_faces(sliced.iter().copied().chain(caps.iter().copied()));
    kept.refresh(mesh);

    log::debug!(
        "Sliced {} faces: {} removed, {} new vertices, {} cut halfedges, {} caps",
        faces.len(),
        behind.len(),
        new_vertices.len(),
        cut.len(),
        caps.len(),
    );

    Ok(SliceResult {
        cut_edges,
        new_vertices: Selection::from_vertices(new_vertices),
        caps: Selection::from_faces(caps),
        faces: kept,
    })
}

/// Splits `mesh` in two along `plane`. Returns the part in front of the plane,
/// the part behind it, and the slice result for the front part. A plane with
/// a zero normal splits nothing: the whole mesh is returned as the front part.
pub fn split_mesh(mesh: &HalfEdgeMesh, plane: &Plane, cap: bool) -> Result<(HalfEdgeMesh, HalfEdgeMesh, SliceResult)> {
    if !plane.is_valid() {
        log::debug!("split_mesh: cutting plane has a zero normal, nothing to do");
        return Ok((mesh.clone(), HalfEdgeMesh::new(), SliceResult::default()));
    }
    let mut front = mesh.clone();
    let front_faces = front.face_ids();
    let result = slice_faces(&mut front, plane, &front_faces, cap)?;

    let mut back = mesh.clone();
    let back_faces = back.face_ids();
    slice_faces(&mut back, &plane.flipped(), &back_faces, cap)?;

    Ok((front, back, result))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::halfedge::primitives::*;

    fn cube() -> HalfEdgeMesh {
        Box::build(Vec3::ZERO, Vec3::splat(2.0))
    }

    fn vef(mesh: &HalfEdgeMesh) -> (usize, usize, usize) {
        (mesh.num_vertices(), mesh.num_edges(), mesh.num_faces())
    }

    #[test]
    fn test_slice_cube_capped() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut mesh = cube();
        let slice = Slice::new(Plane::new(Vec3::ZERO, Vec3::Y), true);
        let selection = Selection::all(&mesh);
        let result = slice.slice(&mut mesh, &selection).unwrap();
        mesh.validate().unwrap();

        assert_eq!(vef(&mesh), (8, 12, 6));
        assert!(mesh.is_closed());
        assert!(mesh.iter_vertices().all(|(_, v)| v.position().y > -1e-5));
        assert_eq!(result.new_vertices.vertices.len(), 4);
        for v in &result.new_vertices.vertices {
            assert!(mesh.vertex_position(*v).y.abs() < 1e-5);
        }
        assert_eq!(result.cut_edges.halfedges.len(), 4);
        assert_eq!(result.cut_edges.edges.len(), 4);
        assert_eq!(result.caps.faces.len(), 1);
        let cap = *result.caps.faces.iter().next().unwrap();
        assert!(mesh.face_normal(cap).unwrap().abs_diff_eq(Vec3::NEG_Y, 1e-5));
        assert_eq!(result.faces.faces.len(), 6);
    }

    #[test]
    fn test_slice_cube_uncapped() {
        let mut mesh = cube();
        let slice = Slice::new(Plane::new(Vec3::ZERO, Vec3::NEG_Y), false);
        let selection = Selection::all(&mesh);
        let result = slice.slice(&mut mesh, &selection).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.num_faces(), 5);
        assert_eq!(mesh.num_vertices(), 8);
        assert!(mesh.iter_vertices().all(|(_, v)| v.position().y < 1e-5));
        assert_eq!(mesh.boundary_halfedges().len(), 4);
        assert!(result.caps.is_empty());
        assert_eq!(result.cut_edges.halfedges.len(), 4);
        assert!(result.cut_edges.edges.is_empty());
    }

    #[test]
    fn test_split_mesh() {
        let mesh = cube();
        let plane = Plane::new(Vec3::ZERO, Vec3::Y);
        let (front, back, result) = split_mesh(&mesh, &plane, true).unwrap();
        for half in [&front, &back] {
            half.validate().unwrap();
            assert!(half.is_closed());
            assert_eq!(vef(half), (8, 12, 6));
        }
        assert!(front.iter_vertices().all(|(_, v)| v.position().y > -1e-5));
        assert!(back.iter_vertices().all(|(_, v)| v.position().y < 1e-5));
        assert_eq!(result.new_vertices.vertices.len(), 4);
        // The original is untouched
        assert_eq!(vef(&mesh), (8, 12, 6));

    }

    #[test]
    fn test_split_mesh_degenerate_plane() {
        let mesh = cube();
        let (front, back, result) =
            split_mesh(&mesh, &Plane::new(Vec3::ZERO, Vec3::ZERO), true).unwrap();
        front.validate().unwrap();
        assert_eq!(vef(&front), (8, 12, 6));
        assert!(front.is_closed());
        assert!(back.is_empty());
        assert_eq!(result, SliceResult::default());
    }

    #[test]
    fn test_slice_keeps_coplanar_face_uncapped() {
        // Only the bottom face survives, lying on the plane. It must not get
        // a coincident cap.
        let mut mesh = cube();
        let slice = Slice::new(Plane::new(Vec3::new(0.0, -1.0, 0.0), Vec3::NEG_Y), true);
        let selection = Selection::all(&mesh);
        let result = slice.slice(&mut mesh, &selection).unwrap();
        mesh.validate().unwrap();
        assert_eq!(vef(&mesh), (4, 0, 1));
        assert_eq!(mesh.boundary_halfedges().len(), 4);
        assert!(result.caps.is_empty());
        assert!(result.cut_edges.is_empty());
        let f = mesh.face_ids()[0];
        assert!(mesh.face_normal(f).unwrap().abs_diff_eq(Vec3::NEG_Y, 1e-5));
    }

    #[test]
    fn test_slice_through_vertices() {
        // A diagonal plane through four corners leaves a triangular prism
        let mut mesh = cube();
        let slice = Slice::new(Plane::new(Vec3::ZERO, Vec3::new(1.0, 0.0, -1.0)), true);
        let selection = Selection::all(&mesh);
        let result = slice.slice(&mut mesh, &selection).unwrap();
        mesh.validate().unwrap();
        assert_eq!(vef(&mesh), (6, 9, 5));
        assert!(mesh.is_closed());
        assert!(result.new_vertices.is_empty());
        assert_eq!(result.cut_edges.halfedges.len(), 4);
        assert_eq!(result.caps.faces.len(), 1);
    }

    #[test]
    fn test_slice_without_plane_is_noop() {
        let mut mesh = cube();
        let selection = Selection::all(&mesh);
        let result = Slice::default().slice(&mut mesh, &selection).unwrap();
        assert_eq!(result, SliceResult::default());
        assert_eq!(vef(&mesh), (8, 12, 6));

        let degenerate = Slice::new(Plane::new(Vec3::ZERO, Vec3::ZERO), true);
        degenerate.apply(&mut mesh).unwrap();
        assert_eq!(vef(&mesh), (8, 12, 6));

        MultiSlice::default().apply(&mut mesh).unwrap();
        assert_eq!(vef(&mesh), (8, 12, 6));
    }

    #[test]
    fn test_slice_outside_mesh() {
        let mut mesh = cube();
        Slice::new(Plane::new(Vec3::new(0.0, -5.0, 0.0), Vec3::Y), true)
            .apply(&mut mesh)
            .unwrap();
        assert_eq!(vef(&mesh), (8, 12, 6));

        Slice::new(Plane::new(Vec3::new(0.0, 5.0, 0.0), Vec3::Y), true)
            .apply(&mut mesh)
            .unwrap();
        mesh.validate().unwrap();
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_slice_selection() {
        let mut mesh = Grid::build(2, 1);
        let right = mesh
            .face_ids()
            .into_iter()
            .find(|f| mesh.face_centroid(*f).x > 0.0)
            .unwrap();
        let slice = Slice::new(Plane::new(Vec3::new(0.5, 0.0, 0.0), Vec3::NEG_X), false);
        let result = slice
            .slice(&mut mesh, &Selection::from_faces([right]))
            .unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.num_faces(), 2);
        assert_eq!(mesh.num_vertices(), 6);
        assert!(mesh.iter_vertices().all(|(_, v)| v.position().x < 0.5 + 1e-5));
        assert_eq!(result.new_vertices.vertices.len(), 2);
        // Boundary halfedges of an open mesh don't count as part of the cut
        // unless they lie on the plane.
        assert_eq!(result.cut_edges.halfedges.len(), 1);
    }

    #[test]
    fn test_multi_slice() {
        let mut mesh = cube();
        let multi = MultiSlice {
            planes: vec![
                Plane::new(Vec3::ZERO, Vec3::Y),
                Plane::new(Vec3::ZERO, Vec3::X),
            ],
            cap: true,
        };
        let selection = Selection::all(&mesh);
        let result = multi.slice(&mut mesh, &selection).unwrap();
        mesh.validate().unwrap();
        assert!(mesh.is_closed());
        assert_eq!(vef(&mesh), (8, 12, 6));
        let (center, size) = mesh.bounding_box();
        assert!(center.abs_diff_eq(Vec3::new(0.5, 0.5, 0.0), 1e-5));
        assert!(size.abs_diff_eq(Vec3::new(1.0, 1.0, 2.0), 1e-5));
        assert_eq!(result.new_vertices.vertices.len(), 6);
        assert!(!result.caps.is_empty());
    }
}
