// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{Read, Write};

use nonmax::NonMaxU32;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use crate::prelude::*;

/// Written in place of an index when there is no reference.
pub const NO_INDEX: u32 = u32::MAX;

/// A HalfEdge representation storing the mesh pointers in contiguous arrays.
/// For each of the per-halfedge arrays, at position `h` there is the data for
/// the halfedge with index `h`. Indices are the position of each element in
/// the iteration order of the [`HalfEdgeMesh`] it was made from.
///
/// This is the form meshes take when they are written out. Identity keys are
/// not stored: a mesh read back gets fresh keys, and is only equal to the
/// original up to relabeling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "CompactMeshRepr", try_from = "CompactMeshRepr")]
pub struct CompactMesh {
    pub vertex_positions: Vec<Vec3>,
    /// Index is either Some(idx) or None. Uses NonMaxU32 to ensure elements are
    /// the same size as `u32`.
    pub vertex_halfedge: Vec<Option<NonMaxU32>>,
    /// The head vertex of each halfedge.
    pub vert: Vec<u32>,
    pub next: Vec<u32>,
    pub pair: Vec<Option<NonMaxU32>>,
    pub edge: Vec<Option<NonMaxU32>>,
    pub face: Vec<Option<NonMaxU32>>,
    pub edge_halfedge: Vec<u32>,
    pub face_halfedge: Vec<u32>,
    pub counts: MeshCounts,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshCounts {
    /// The number of vertices
    pub num_vertices: usize,
    /// The number of halfedges. Note that this is not the same as the number of
    /// edges times two: boundary halfedges have no edge.
    pub num_halfedges: usize,
    /// The number of edges.
    pub num_edges: usize,
    /// The number of faces
    pub num_faces: usize,
}

impl MeshCounts {
    pub fn of(mesh: &HalfEdgeMesh) -> Self {
        MeshCounts {
            num_vertices: mesh.num_vertices(),
            num_halfedges: mesh.num_halfedges(),
            num_edges: mesh.num_edges(),
            num_faces: mesh.num_faces(),
        }
    }

    pub fn num_boundary_halfedges(&self) -> usize {
        self.num_halfedges.saturating_sub(2 * self.num_edges)
    }

    /// V - E + F, where boundary halfedges count as edges.
    pub fn euler_characteristic(&self) -> i64 {
        self.num_vertices as i64 - (self.num_edges + self.num_boundary_halfedges()) as i64
            + self.num_faces as i64
    }

    /// Returns the mesh counts after a single iteration of mid-edge
    /// subdivision. Applies recurrence relation. For closed meshes this is
    /// (V + E, 2E + H, F + H).
    pub fn after_midedge_subdivision(&self) -> Self {
        let v_0 = self.num_vertices;
        let h_0 = self.num_halfedges;
        let e_0 = self.num_edges;
        let f_0 = self.num_faces;
        let b_0 = self.num_boundary_halfedges();

        let num_edges = 2 * e_0 + h_0;
        MeshCounts {
            num_vertices: v_0 + e_0 + b_0,
            num_halfedges: 2 * num_edges + 2 * b_0,
            num_edges,
            num_faces: f_0 + h_0,
        }
    }
}

fn to_index(len: usize, what: &str) -> Result<u32> {
    match u32::try_from(len) {
        Ok(idx) if idx != NO_INDEX => Ok(idx),
        _ => bail!("Too many {what} to write a compact mesh"),
    }
}

impl CompactMesh {
    /// Constructs a [`CompactMesh`] from a [`HalfEdgeMesh`].
    pub fn from_halfedge(mesh: &HalfEdgeMesh) -> Result<CompactMesh> {
        // Slotmap makes no guarantees about the structure of its keys, so
        // elements are numbered by iteration order instead.
        fn numbering<K: slotmap::Key>(ids: impl Iterator<Item = K>, what: &str) -> Result<SecondaryMap<K, u32>> {
            let mut map = SecondaryMap::new();
            for (idx, id) in ids.enumerate() {
                map.insert(id, to_index(idx, what)?);
            }
            Ok(map)
        }
        let v_id_to_idx = numbering(mesh.vertices.keys(), "vertices")?;
        let h_id_to_idx = numbering(mesh.halfedges.keys(), "halfedges")?;
        let e_id_to_idx = numbering(mesh.edges.keys(), "edges")?;
        let f_id_to_idx = numbering(mesh.faces.keys(), "faces")?;

        let slot = |idx: Option<u32>| idx.and_then(NonMaxU32::new);

        let mut vertex_positions = Vec::with_capacity(mesh.num_vertices());
        let mut vertex_halfedge = Vec::with_capacity(mesh.num_vertices());
        for (_, v) in mesh.iter_vertices() {
            vertex_positions.push(v.position);
            vertex_halfedge.push(slot(v.halfedge.and_then(|h| h_id_to_idx.get(h).copied())));
        }

        let num_halfedges = mesh.num_halfedges();
        let mut vert = Vec::with_capacity(num_halfedges);
        let mut next = Vec::with_capacity(num_halfedges);
        let mut pair = Vec::with_capacity(num_halfedges);
        let mut edge = Vec::with_capacity(num_halfedges);
        let mut face = Vec::with_capacity(num_halfedges);
        for (h_id, h) in mesh.iter_halfedges() {
            let head = mesh.at_halfedge(h_id).vertex().try_end()?;
            let h_next = mesh.at_halfedge(h_id).next().try_end()?;
            vert.push(v_id_to_idx[head]);
            next.push(h_id_to_idx[h_next]);
            pair.push(slot(h.pair.and_then(|p| h_id_to_idx.get(p).copied())));
            edge.push(slot(h.edge.and_then(|e| e_id_to_idx.get(e).copied())));
            face.push(slot(h.face.and_then(|f| f_id_to_idx.get(f).copied())));
        }

        let edge_halfedge = mesh
            .edge_ids()
            .into_iter()
            .map(|e| Ok(h_id_to_idx[mesh.at_edge(e).halfedge().try_end()?]))
            .collect::<Result<Vec<_>>>()?;
        let face_halfedge = mesh
            .face_ids()
            .into_iter()
            .map(|f| Ok(h_id_to_idx[mesh.at_face(f).halfedge().try_end()?]))
            .collect::<Result<Vec<_>>>()?;

        Ok(CompactMesh {
            vertex_positions,
            vertex_halfedge,
            vert,
            next,
            pair,
            edge,
            face,
            edge_halfedge,
            face_halfedge,
            counts: MeshCounts::of(mesh),
        })
    }

    /// Checks that array lengths agree with the counts and that every index is
    /// in range.
    fn check_indices(&self) -> Result<()> {
        let c = &self.counts;
        let lengths = [
            ("vertex positions", self.vertex_positions.len(), c.num_vertices),
            ("vertex halfedges", self.vertex_halfedge.len(), c.num_vertices),
            ("halfedge vertices", self.vert.len(), c.num_halfedges),
            ("halfedge nexts", self.next.len(), c.num_halfedges),
            ("halfedge pairs", self.pair.len(), c.num_halfedges),
            ("halfedge edges", self.edge.len(), c.num_halfedges),
            ("halfedge faces", self.face.len(), c.num_halfedges),
            ("edge halfedges", self.edge_halfedge.len(), c.num_edges),
            ("face halfedges", self.face_halfedge.len(), c.num_faces),
        ];
        for (what, len, expected) in lengths {
            if len != expected {
                bail!(MeshError::malformed(
                    len.min(expected),
                    format!("expected {expected} {what}, found {len}")
                ));
            }
        }

        let check = |what: &str, indices: &mut dyn Iterator<Item = u32>, count: usize| -> Result<()> {
            for (i, idx) in indices.enumerate() {
                if idx as usize >= count {
                    bail!(MeshError::malformed(
                        i,
                        format!("{what} index {idx} out of range (count is {count})")
                    ));
                }
            }
            Ok(())
        };
        let opt = |v: &[Option<NonMaxU32>]| -> Vec<u32> { v.iter().flatten().map(|x| x.get()).collect() };
        check("vertex halfedge", &mut opt(&self.vertex_halfedge).into_iter(), c.num_halfedges)?;
        check("halfedge vertex", &mut self.vert.iter_cpy(), c.num_vertices)?;
        check("halfedge next", &mut self.next.iter_cpy(), c.num_halfedges)?;
        check("halfedge pair", &mut opt(&self.pair).into_iter(), c.num_halfedges)?;
        check("halfedge edge", &mut opt(&self.edge).into_iter(), c.num_edges)?;
        check("halfedge face", &mut opt(&self.face).into_iter(), c.num_faces)?;
        check("edge halfedge", &mut self.edge_halfedge.iter_cpy(), c.num_halfedges)?;
        check("face halfedge", &mut self.face_halfedge.iter_cpy(), c.num_halfedges)?;
        Ok(())
    }

    /// Rebuilds a [`HalfEdgeMesh`]. Out of range indices are rejected with
    /// [`MeshError::MalformedInput`], and the result is validated.
    pub fn to_halfedge(&self) -> Result<HalfEdgeMesh> {
        self.check_indices()?;
        let mut mesh = HalfEdgeMesh::new();

        let v_idx_to_id = self
            .vertex_positions
            .iter()
            .map(|pos| mesh.alloc_vertex(*pos, None))
            .collect_vec();
        let h_idx_to_id = (0..self.counts.num_halfedges)
            .map(|_| mesh.alloc_halfedge(HalfEdge::default()))
            .collect_vec();
        let e_idx_to_id = (0..self.counts.num_edges)
            .map(|_| mesh.alloc_edge(None))
            .collect_vec();
        let f_idx_to_id = (0..self.counts.num_faces)
            .map(|_| mesh.alloc_face(None))
            .collect_vec();

        for (v, h) in self.vertex_halfedge.iter().enumerate() {
            mesh[v_idx_to_id[v]].halfedge = h.map(|h| h_idx_to_id[h.get() as usize]);
        }
        for (h, (vert, next, pair, edge, face)) in
            itertools::multizip((&self.vert, &self.next, &self.pair, &self.edge, &self.face)).enumerate()
        {
            let h_id = h_idx_to_id[h];
            mesh[h_id].vertex = Some(v_idx_to_id[*vert as usize]);
            mesh[h_id].next = Some(h_idx_to_id[*next as usize]);
            mesh[h_id].pair = pair.map(|p| h_idx_to_id[p.get() as usize]);
            mesh[h_id].edge = edge.map(|e| e_idx_to_id[e.get() as usize]);
            mesh[h_id].face = face.map(|f| f_idx_to_id[f.get() as usize]);
        }
        for (e, h) in self.edge_halfedge.iter().enumerate() {
            mesh[e_idx_to_id[e]].halfedge = Some(h_idx_to_id[*h as usize]);
        }
        for (f, h) in self.face_halfedge.iter().enumerate() {
            mesh[f_idx_to_id[f]].halfedge = Some(h_idx_to_id[*h as usize]);
        }

        mesh.validate()
            .context("Compact mesh does not describe a valid halfedge mesh")?;
        Ok(mesh)
    }

    pub fn to_ron_string(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    pub fn from_ron_str(input: &str) -> Result<Self> {
        ron::from_str(input).context("Error parsing compact mesh")
    }

    /// Writes the four counts, then the vertex, halfedge, edge and face
    /// records. Everything is little-endian: u32 indices (with [`NO_INDEX`] for
    /// none) and f32 coordinates.
    pub fn write_binary(&self, w: &mut impl Write) -> Result<()> {
        self.check_indices()?;
        let c = &self.counts;
        for count in [c.num_vertices, c.num_halfedges, c.num_edges, c.num_faces] {
            w.write_all(&to_index(count, "elements")?.to_le_bytes())?;
        }
        let raw = |x: Option<NonMaxU32>| x.map(|x| x.get()).unwrap_or(NO_INDEX);
        for (pos, h) in self.vertex_positions.iter().zip(&self.vertex_halfedge) {
            for coord in pos.to_array() {
                w.write_all(&coord.to_le_bytes())?;
            }
            w.write_all(&raw(*h).to_le_bytes())?;
        }
        for h in 0..c.num_halfedges {
            for idx in [
                self.vert[h],
                self.next[h],
                raw(self.pair[h]),
                raw(self.edge[h]),
                raw(self.face[h]),
            ] {
                w.write_all(&idx.to_le_bytes())?;
            }
        }
        for idx in self.edge_halfedge.iter().chain(&self.face_halfedge) {
            w.write_all(&idx.to_le_bytes())?;
        }
        Ok(())
    }

    /// Reads a mesh in the format of [`CompactMesh::write_binary`].
    pub fn read_binary(r: &mut impl Read) -> Result<Self> {
        fn read_u32(r: &mut impl Read) -> Result<u32> {
            let mut buf = [0u8; 4];
            r.read_exact(&mut buf)
                .context("Unexpected end of compact mesh data")?;
            Ok(u32::from_le_bytes(buf))
        }
        fn read_f32(r: &mut impl Read) -> Result<f32> {
            Ok(f32::from_bits(read_u32(r)?))
        }

        let counts = MeshCounts {
            num_vertices: read_u32(r)? as usize,
            num_halfedges: read_u32(r)? as usize,
            num_edges: read_u32(r)? as usize,
            num_faces: read_u32(r)? as usize,
        };

        let mut vertex_positions = vec![];
        let mut vertex_halfedge = vec![];
        for _ in 0..counts.num_vertices {
            vertex_positions.push(Vec3::new(read_f32(r)?, read_f32(r)?, read_f32(r)?));
            vertex_halfedge.push(NonMaxU32::new(read_u32(r)?));
        }

        let (mut vert, mut next, mut pair, mut edge, mut face) = (vec![], vec![], vec![], vec![], vec![]);
        for _ in 0..counts.num_halfedges {
            vert.push(read_u32(r)?);
            next.push(read_u32(r)?);
            pair.push(NonMaxU32::new(read_u32(r)?));
            edge.push(NonMaxU32::new(read_u32(r)?));
            face.push(NonMaxU32::new(read_u32(r)?));
        }

        let edge_halfedge = (0..counts.num_edges)
            .map(|_| read_u32(r))
            .collect::<Result<Vec<_>>>()?;
        let face_halfedge = (0..counts.num_faces)
            .map(|_| read_u32(r))
            .collect::<Result<Vec<_>>>()?;

        Ok(CompactMesh {
            vertex_positions,
            vertex_halfedge,
            vert,
            next,
            pair,
            edge,
            face,
            edge_halfedge,
            face_halfedge,
            counts,
        })
    }
}

/// The serialized form of a [`CompactMesh`], with [`NO_INDEX`] standing in for
/// missing references.
#[derive(Serialize, Deserialize)]
struct CompactMeshRepr {
    counts: MeshCounts,
    vertex_positions: Vec<[f32; 3]>,
    vertex_halfedge: Vec<u32>,
    vert: Vec<u32>,
    next: Vec<u32>,
    pair: Vec<u32>,
    edge: Vec<u32>,
    face: Vec<u32>,
    edge_halfedge: Vec<u32>,
    face_halfedge: Vec<u32>,
}

impl From<CompactMesh> for CompactMeshRepr {
    fn from(mesh: CompactMesh) -> Self {
        let raw = |v: Vec<Option<NonMaxU32>>| -> Vec<u32> {
            v.into_iter()
                .map(|x| x.map(|x| x.get()).unwrap_or(NO_INDEX))
                .collect()
        };
        CompactMeshRepr {
            counts: mesh.counts,
            vertex_positions: mesh.vertex_positions.iter().map(|p| p.to_array()).collect(),
            vertex_halfedge: raw(mesh.vertex_halfedge),
            vert: mesh.vert,
            next: mesh.next,
            pair: raw(mesh.pair),
            edge: raw(mesh.edge),
            face: raw(mesh.face),
            edge_halfedge: mesh.edge_halfedge,
            face_halfedge: mesh.face_halfedge,
        }
    }
}

impl TryFrom<CompactMeshRepr> for CompactMesh {
    type Error = MeshError;

    fn try_from(repr: CompactMeshRepr) -> Result<Self, Self::Error> {
        let slots = |v: Vec<u32>| -> Vec<Option<NonMaxU32>> { v.into_iter().map(NonMaxU32::new).collect() };
        if repr.vertex_positions.len() != repr.counts.num_vertices {
            return Err(MeshError::malformed(
                0,
                format!(
                    "expected {} vertex positions, found {}",
                    repr.counts.num_vertices,
                    repr.vertex_positions.len()
                ),
            ));
        }
        Ok(CompactMesh {
            vertex_positions: repr.vertex_positions.into_iter().map(Vec3::from).collect(),
            vertex_halfedge: slots(repr.vertex_halfedge),
            vert: repr.vert,
            next: repr.next,
            pair: slots(repr.pair),
            edge: slots(repr.edge),
            face: slots(repr.face),
            edge_halfedge: repr.edge_halfedge,
            face_halfedge: repr.face_halfedge,
            counts: repr.counts,
        })
    }
}
