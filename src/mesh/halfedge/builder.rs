// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use super::*;

/// Positions closer than this on every axis are merged into one vertex.
pub const DEFAULT_DEDUP_EPSILON: f32 = 1e-5;

/// Parameters of the face list builder.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacelistOptions {
    /// When true, every input position becomes its own vertex, even if it
    /// coincides with another one.
    pub duplicate: bool,
    /// Per-axis merge tolerance. Inclusive: `|a - b| <= epsilon` merges.
    pub epsilon: f32,
    /// Return an error on the first malformed face instead of dropping it.
    pub strict: bool,
}

impl Default for FacelistOptions {
    fn default() -> Self {
        Self {
            duplicate: false,
            epsilon: DEFAULT_DEDUP_EPSILON,
            strict: false,
        }
    }
}

struct IndexedPoint {
    index: usize,
    pos: Vec3,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f32; 3]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.pos.to_array())
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(
        &self,
        point: &<Self::Envelope as rstar::Envelope>::Point,
    ) -> <<Self::Envelope as rstar::Envelope>::Point as rstar::Point>::Scalar {
        self.pos.distance_squared(Vec3::from_slice(point))
    }
}

/// Maps every input position to the index of its representative: the
/// earliest position that lies within `epsilon` on every axis. Lookups go
/// through an R-tree holding only the representatives found so far.
#[profiling::function]
pub fn deduplicate_positions(positions: &[Vec3], epsilon: f32) -> Vec<usize> {
    if epsilon <= 0.0 {
        let mut seen = HashMap::<Vec3Ord, usize>::new();
        return positions
            .iter()
            .enumerate()
            // Adding +0.0 turns -0.0 into +0.0, so both hash the same
            .map(|(i, p)| *seen.entry((*p + Vec3::ZERO).to_ord()).or_insert(i))
            .collect();
    }

    let mut tree = RTree::<IndexedPoint>::new();
    let mut representative = Vec::with_capacity(positions.len());
    for (i, &pos) in positions.iter().enumerate() {
        let window = AABB::from_corners(
            (pos - Vec3::splat(epsilon)).to_array(),
            (pos + Vec3::splat(epsilon)).to_array(),
        );
        let found = tree
            .locate_in_envelope_intersecting(&window)
            .map(|p| p.index)
            .min();
        match found {
            Some(rep) => representative.push(rep),
            None => {
                tree.insert(IndexedPoint { index: i, pos });
                representative.push(i);
            }
        }
    }
    representative
}

/// Maps a polygon of the input to representative vertex indices, merging
/// consecutive repeats. The error describes why the face can't be built: an
/// out-of-range index, fewer than three distinct vertices, or a vertex
/// visited twice.
fn clean_polygon<Index>(
    polygon: &[Index],
    num_positions: usize,
    representative: &[usize],
) -> std::result::Result<SVec<usize>, String>
where
    Index: num_traits::AsPrimitive<usize>,
{
    let mut cleaned = SVec::<usize>::new();
    for index in polygon {
        let index: usize = index.as_();
        if index >= num_positions {
            return Err(format!(
                "index {index} is out of range for {num_positions} positions"
            ));
        }
        let rep = representative[index];
        if cleaned.last() != Some(&rep) {
            cleaned.push(rep);
        }
    }
    // Collapse the wrap-around as well
    while cleaned.len() > 1 && cleaned.first() == cleaned.last() {
        cleaned.pop();
    }
    if cleaned.len() < 3 {
        return Err(format!(
            "face has {} distinct vertices, at least 3 are needed",
            cleaned.len()
        ));
    }
    if cleaned.iter().duplicates().next().is_some() {
        return Err("face visits the same vertex twice".into());
    }
    Ok(cleaned)
}

impl HalfEdgeMesh {
    /// Builds this mesh from a list of positions, and a list of polygons,
    /// containing indices that reference those positions.
    ///
    /// - Generic over Index: Use as much precision as you need / want.
    /// - Generic over Polygon: Use whatever input layout you want.
    ///
    /// Faces that reference fewer than three distinct vertices, repeat a
    /// vertex or use an out-of-range index are dropped with a warning (or
    /// rejected, with `options.strict`). Positions that no surviving face
    /// uses are discarded. Opposite halfedges are paired at the end.
    #[profiling::function]
    pub fn build_from_facelist<Index, Polygon>(
        positions: &[Vec3],
        polygons: &[Polygon],
        options: &FacelistOptions,
    ) -> Result<Self>
    where
        Index: num_traits::AsPrimitive<usize>,
        Polygon: AsRef<[Index]>,
    {
        let representative = if options.duplicate {
            (0..positions.len()).collect_vec()
        } else {
            deduplicate_positions(positions, options.epsilon)
        };

        let mut faces = Vec::with_capacity(polygons.len());
        for (face_idx, polygon) in polygons.iter().enumerate() {
            match clean_polygon(polygon.as_ref(), positions.len(), &representative) {
                Ok(cleaned) => faces.push(cleaned),
                Err(reason) if options.strict => bail!(MeshError::malformed(face_idx, reason)),
                Err(reason) => log::warn!("Dropping face {face_idx}: {reason}"),
            }
        }

        let mut mesh = Self::new();

        // Allocate in input order so the result doesn't depend on face order.
        let used: BTreeSet<usize> = faces.iter().flatten().copied().collect();
        let mut index_to_vertex = HashMap::<usize, VertexId>::with_capacity(used.len());
        for idx in used {
            index_to_vertex.insert(idx, mesh.alloc_vertex(positions[idx], None));
        }

        for polygon in &faces {
            let face = mesh.alloc_face(None);
            let halfedges = polygon
                .iter_cpy()
                .circular_tuple_windows()
                .map(|(a, b)| {
                    let (v_a, v_b) = (index_to_vertex[&a], index_to_vertex[&b]);
                    let h = mesh.alloc_halfedge(HalfEdge {
                        vertex: Some(v_b),
                        face: Some(face),
                        ..Default::default()
                    });
                    if mesh[v_a].halfedge.is_none() {
                        mesh[v_a].halfedge = Some(h);
                    }
                    h
                })
                .collect_svec();

            for (&h, &h_next) in halfedges.iter().circular_tuple_windows() {
                mesh[h].next = Some(h_next);
            }
            mesh[face].halfedge = halfedges.first().copied();
        }

        let pairs = mesh.pair_halfedges();
        log::debug!(
            "Built mesh from {} positions and {} polygons: {} vertices, {} faces, {} edges, {} boundary halfedges",
            positions.len(),
            polygons.len(),
            mesh.num_vertices(),
            mesh.num_faces(),
            pairs,
            mesh.num_halfedges() - 2 * pairs,
        );
        Ok(mesh)
    }

    /// Same as [`HalfEdgeMesh::build_from_facelist`] with default options.
    pub fn build_from_polygons<Index, Polygon>(
        positions: &[Vec3],
        polygons: &[Polygon],
    ) -> Result<Self>
    where
        Index: num_traits::AsPrimitive<usize>,
        Polygon: AsRef<[Index]>,
    {
        Self::build_from_facelist(positions, polygons, &FacelistOptions::default())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::halfedge::compact_mesh::CompactMesh;
    use crate::mesh::halfedge::primitives::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_tetrahedron() {
        init();
        let (positions, faces) = Tetrahedron::facelist();
        let mesh = HalfEdgeMesh::build_from_polygons(&positions, &faces).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_edges(), 6);
        assert_eq!(mesh.num_halfedges(), 12);
        assert_eq!(mesh.num_faces(), 4);
        assert!(mesh.boundary_halfedges().is_empty());
    }

    #[test]
    fn test_tetrahedron_duplicate_positions() {
        init();
        let (positions, faces) = Tetrahedron::facelist();
        // Give every face its own copy of each corner
        let mut split_positions = vec![];
        let mut split_faces = vec![];
        for face in &faces {
            let start = split_positions.len() as u32;
            split_positions.extend(face.iter().map(|&i| positions[i as usize]));
            split_faces.push([start, start + 1, start + 2]);
        }
        let options = FacelistOptions {
            duplicate: true,
            ..Default::default()
        };
        let mesh =
            HalfEdgeMesh::build_from_facelist(&split_positions, &split_faces, &options).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.num_vertices(), 12);
        assert_eq!(mesh.num_halfedges(), 12);
        assert_eq!(mesh.num_edges(), 0);
        assert_eq!(mesh.boundary_halfedges().len(), 12);

        // Without `duplicate`, the copies are merged back into a tetrahedron
        let merged =
            HalfEdgeMesh::build_from_polygons(&split_positions, &split_faces).unwrap();
        assert_eq!(merged.num_vertices(), 4);
        assert_eq!(merged.num_edges(), 6);
        assert!(merged.is_closed());
    }

    #[test]
    fn test_facelist_idempotence() {
        init();
        let (positions, faces) = Octahedron::facelist();
        // Append a jittered copy of every position and point half of the
        // faces at the copies.
        let n = positions.len() as u32;
        let mut noisy = positions.clone();
        noisy.extend(positions.iter().map(|p| *p + Vec3::splat(DEFAULT_DEDUP_EPSILON * 0.5)));
        let noisy_faces = faces
            .iter()
            .enumerate()
            .map(|(i, f)| if i % 2 == 0 { *f } else { f.map(|idx| idx + n) })
            .collect_vec();

        let by_hand = HalfEdgeMesh::build_from_polygons(&positions, &faces).unwrap();
        let deduped = HalfEdgeMesh::build_from_polygons(&noisy, &noisy_faces).unwrap();
        deduped.validate().unwrap();
        assert_eq!(
            CompactMesh::from_halfedge(&by_hand).unwrap(),
            CompactMesh::from_halfedge(&deduped).unwrap()
        );
    }

    #[test]
    fn test_dedup_boundary_is_inclusive() {
        // Values chosen to be exact in binary floating point
        let eps = 0.25;
        let reps = deduplicate_positions(
            &[
                Vec3::ZERO,
                Vec3::new(0.25, 0.0, 0.0),
                Vec3::new(0.0, 0.5, 0.0),
                Vec3::new(0.0, 0.0, 0.25 + 1e-3),
            ],
            eps,
        );
        assert_eq!(reps, vec![0, 0, 2, 3]);
    }

    #[test]
    fn test_dedup_prefers_earliest() {
        // 1 is close to both 0 and 2, but 2 is not close to 0. Only
        // representatives are candidates, so 2 can't merge into 1.
        let reps = deduplicate_positions(
            &[
                Vec3::ZERO,
                Vec3::new(0.2, 0.0, 0.0),
                Vec3::new(0.4, 0.0, 0.0),
                Vec3::new(0.1, 0.0, 0.0),
            ],
            0.25,
        );
        assert_eq!(reps, vec![0, 0, 2, 0]);
    }

    #[test]
    fn test_exact_dedup() {
        let reps = deduplicate_positions(&[Vec3::X, Vec3::Y, Vec3::X, Vec3::Y * 1.000001], 0.0);
        assert_eq!(reps, vec![0, 1, 0, 3]);
    }

    #[test]
    fn test_exact_dedup_signed_zero() {
        let reps = deduplicate_positions(
            &[
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(-0.0, 1.0, -0.0),
                Vec3::new(1.0, -0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
            ],
            0.0,
        );
        assert_eq!(reps, vec![0, 0, 2, 2]);
    }

    #[test]
    fn test_degenerate_faces_are_dropped() {
        init();
        let positions = [
            Vec3::ZERO,
            Vec3::X,
            Vec3::Z,
            Vec3::ONE,
            // Coincides with 0
            Vec3::ZERO,
        ];
        let faces: Vec<Vec<u32>> = vec![
            vec![0, 1, 2],
            // Collapses to two vertices after merging 4 into 0
            vec![0, 1, 4],
            // Out of range
            vec![0, 1, 9],
            // Too short
            vec![1, 2],
            // Repeats a vertex
            vec![0, 1, 0, 2],
        ];
        let mesh = HalfEdgeMesh::build_from_polygons(&positions, &faces).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.num_faces(), 1);
        // Position 3 is not used by any face
        assert_eq!(mesh.num_vertices(), 3);

        let strict = FacelistOptions {
            strict: true,
            ..Default::default()
        };
        let err = HalfEdgeMesh::build_from_facelist(&positions, &faces, &strict).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MeshError>(),
            Some(MeshError::MalformedInput { face: 1, .. })
        ));
    }

    #[test]
    fn test_repeated_consecutive_indices_collapse() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::ONE, Vec3::Z];
        let mesh =
            HalfEdgeMesh::build_from_polygons(&positions, &[vec![0u8, 0, 1, 2, 2, 3, 0]]).unwrap();
        mesh.validate().unwrap();
        assert_eq!(mesh.num_faces(), 1);
        assert_eq!(mesh.face_order(mesh.face_ids()[0]), 4);
    }

    #[test]
    fn test_empty_input() {
        let mesh = HalfEdgeMesh::build_from_polygons::<u32, [u32; 3]>(&[], &[]).unwrap();
        assert!(mesh.is_empty());
        mesh.validate().unwrap();

        // A single unusable face also gives an empty mesh
        let mesh = HalfEdgeMesh::build_from_polygons(&[Vec3::ZERO, Vec3::X], &[[0u32, 1, 1]])
            .unwrap();
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_vertex_halfedges_are_outgoing() {
        let mesh = Icosahedron::build();
        for (v, vertex) in mesh.iter_vertices() {
            let h = vertex.halfedge().unwrap();
            assert_eq!(mesh.halfedge_tail(h), v);
        }
        assert_eq!(mesh.euler_characteristic(), 2);
    }
}
