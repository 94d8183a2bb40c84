// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::marker::PhantomData;

use crate::prelude::*;

use slotmap::SlotMap;

/// Implements indexing traits so the mesh data structure can be used to access
/// vertex, halfedge, edge or face information using ids as indices.
pub mod mesh_index_impls;

/// Type-safe wrappers over the internal allocator indices used as pointers
pub mod id_types;
pub use id_types::*;

/// An API to represent type-safe and error-handled graph traversals over a mesh
pub mod traversals;
pub use traversals::*;

/// Container-level primitives: checked insertion, face removal, cleanup,
/// pairing and merging.
pub mod bulk_ops;

/// Construction of a mesh from a list of positions and polygons.
pub mod builder;
pub use builder::*;

/// The structural invariant checker.
pub mod validation;

/// Local edit operations used as building blocks by the transforms
pub mod edit_ops;

/// Types to represent a selection of a subset of faces, vertices or edges.
pub mod selection;
pub use selection::*;

/// A compact, index-based representation of the mesh, used for serialization
pub mod compact_mesh;

/// Simple closed-form shapes, handed to the face list builder
pub mod primitives;

/// Whole-mesh and selection-scoped topological transforms
pub mod transforms;

/// HalfEdge meshes are a type of linked list. This means it is sometimes
/// impossible to ensure some algorithms will terminate when the mesh is
/// malformed. To ensure the code never goes into an infinite loop, this max
/// number of iterations will be performed before giving an error. This error
/// should be large enough, as faces with a very large number of vertices may
/// trigger it.
pub const MAX_LOOP_ITERATIONS: usize = 8196;

/// A point of the mesh. Its `halfedge`, when set, is one of the halfedges
/// leaving the vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    key: Option<u64>,
    position: Vec3,
    halfedge: Option<HalfEdgeId>,
}

/// A directed use of an edge by a face. `vertex` is the vertex this halfedge
/// points *to*. A halfedge without `pair` lies on the boundary of the mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HalfEdge {
    key: Option<u64>,
    vertex: Option<VertexId>,
    next: Option<HalfEdgeId>,
    pair: Option<HalfEdgeId>,
    edge: Option<EdgeId>,
    face: Option<FaceId>,
}

/// An undirected edge. Only exists for paired halfedges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Edge {
    key: Option<u64>,
    halfedge: Option<HalfEdgeId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Face {
    key: Option<u64>,
    halfedge: Option<HalfEdgeId>,
}

impl Vertex {
    /// A vertex that belongs to no mesh yet.
    pub fn new(position: Vec3) -> Self {
        Self {
            key: None,
            position,
            halfedge: None,
        }
    }

    pub fn with_halfedge(mut self, halfedge: HalfEdgeId) -> Self {
        self.halfedge = Some(halfedge);
        self
    }

    pub fn key(&self) -> Option<u64> {
        self.key
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn halfedge(&self) -> Option<HalfEdgeId> {
        self.halfedge
    }
}

impl HalfEdge {
    /// A halfedge pointing to `head` that belongs to no mesh yet.
    pub fn new(head: VertexId) -> Self {
        Self {
            vertex: Some(head),
            ..Default::default()
        }
    }

    pub fn with_next(mut self, next: HalfEdgeId) -> Self {
        self.next = Some(next);
        self
    }

    pub fn with_face(mut self, face: FaceId) -> Self {
        self.face = Some(face);
        self
    }

    pub fn key(&self) -> Option<u64> {
        self.key
    }

    /// The vertex this halfedge points to.
    pub fn vertex(&self) -> Option<VertexId> {
        self.vertex
    }

    pub fn next(&self) -> Option<HalfEdgeId> {
        self.next
    }

    pub fn pair(&self) -> Option<HalfEdgeId> {
        self.pair
    }

    pub fn edge(&self) -> Option<EdgeId> {
        self.edge
    }

    pub fn face(&self) -> Option<FaceId> {
        self.face
    }
}

impl Edge {
    pub fn new(halfedge: HalfEdgeId) -> Self {
        Self {
            key: None,
            halfedge: Some(halfedge),
        }
    }

    pub fn key(&self) -> Option<u64> {
        self.key
    }

    pub fn halfedge(&self) -> Option<HalfEdgeId> {
        self.halfedge
    }
}

impl Face {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_halfedge(mut self, halfedge: HalfEdgeId) -> Self {
        self.halfedge = Some(halfedge);
        self
    }

    pub fn key(&self) -> Option<u64> {
        self.key
    }

    pub fn halfedge(&self) -> Option<HalfEdgeId> {
        self.halfedge
    }
}

/// The mesh container. Owns one arena per element kind; all cross references
/// are generational ids into those arenas.
#[derive(Debug, Clone, Default)]
pub struct HalfEdgeMesh {
    vertices: SlotMap<VertexId, Vertex>,
    halfedges: SlotMap<HalfEdgeId, HalfEdge>,
    edges: SlotMap<EdgeId, Edge>,
    faces: SlotMap<FaceId, Face>,

    /// Next identity key handed out by this container.
    next_key: u64,

    named_selections: BTreeMap<String, Selection>,
}

impl HalfEdgeMesh {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_key(&mut self) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        key
    }

    /// Adds a new vertex to the mesh, disconnected from everything else. Returns its handle.
    pub(crate) fn alloc_vertex(&mut self, position: Vec3, halfedge: Option<HalfEdgeId>) -> VertexId {
        let key = Some(self.take_key());
        self.vertices.insert(Vertex {
            key,
            position,
            halfedge,
        })
    }

    /// Adds a new halfedge to the mesh. Pointers are stored as given, so the
    /// caller is responsible for linking it up.
    pub(crate) fn alloc_halfedge(&mut self, mut halfedge: HalfEdge) -> HalfEdgeId {
        halfedge.key = Some(self.take_key());
        self.halfedges.insert(halfedge)
    }

    pub(crate) fn alloc_edge(&mut self, halfedge: Option<HalfEdgeId>) -> EdgeId {
        let key = Some(self.take_key());
        self.edges.insert(Edge { key, halfedge })
    }

    pub(crate) fn alloc_face(&mut self, halfedge: Option<HalfEdgeId>) -> FaceId {
        let key = Some(self.take_key());
        self.faces.insert(Face { key, halfedge })
    }

    /// Removes a vertex from the mesh. This does not attempt to preserve mesh
    /// connectivity and should only be used as part of internal operations.
    pub(crate) fn remove_vertex(&mut self, vertex: VertexId) {
        self.vertices.remove(vertex);
    }

    /// Same as `remove_vertex`, for halfedges.
    pub(crate) fn remove_halfedge(&mut self, halfedge: HalfEdgeId) {
        self.halfedges.remove(halfedge);
    }

    pub(crate) fn remove_edge(&mut self, edge: EdgeId) {
        self.edges.remove(edge);
    }

    pub(crate) fn remove_face(&mut self, face: FaceId) {
        self.faces.remove(face);
    }

    /// Pairs `a` and `b` and gives them a fresh shared edge.
    pub(crate) fn link_pair(&mut self, a: HalfEdgeId, b: HalfEdgeId) -> EdgeId {
        let e = self.alloc_edge(Some(a));
        self[a].pair = Some(b);
        self[a].edge = Some(e);
        self[b].pair = Some(a);
        self[b].edge = Some(e);
        e
    }

    pub fn iter_vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices.iter()
    }

    pub fn iter_halfedges(&self) -> impl Iterator<Item = (HalfEdgeId, &HalfEdge)> {
        self.halfedges.iter()
    }

    pub fn iter_edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter()
    }

    pub fn iter_faces(&self) -> impl Iterator<Item = (FaceId, &Face)> {
        self.faces.iter()
    }

    pub fn vertex_ids(&self) -> Vec<VertexId> {
        self.vertices.keys().collect()
    }

    pub fn halfedge_ids(&self) -> Vec<HalfEdgeId> {
        self.halfedges.keys().collect()
    }

    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges.keys().collect()
    }

    pub fn face_ids(&self) -> Vec<FaceId> {
        self.faces.keys().collect()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.halfedges.is_empty() && self.faces.is_empty()
    }

    pub fn vertex_exists(&self, vertex: VertexId) -> bool {
        self.vertices.contains_key(vertex)
    }

    pub fn halfedge_exists(&self, halfedge: HalfEdgeId) -> bool {
        self.halfedges.contains_key(halfedge)
    }

    pub fn edge_exists(&self, edge: EdgeId) -> bool {
        self.edges.contains_key(edge)
    }

    pub fn face_exists(&self, face: FaceId) -> bool {
        self.faces.contains_key(face)
    }

    pub fn vertex_position(&self, vertex: VertexId) -> Vec3 {
        self[vertex].position
    }

    pub fn set_vertex_position(&mut self, vertex: VertexId, position: Vec3) {
        self[vertex].position = position;
    }

    /// Returns the halfedges of a face, starting at the face's halfedge and
    /// following `next`.
    pub fn face_halfedges(&self, face_id: FaceId) -> SVec<HalfEdgeId> {
        let h0 = self[face_id]
            .halfedge
            .unwrap_or_else(|| panic!("Face {face_id:?} has no halfedge"));
        self.halfedge_loop(h0)
    }

    pub fn face_vertices(&self, face_id: FaceId) -> SVec<VertexId> {
        self.face_halfedges(face_id)
            .iter()
            .map(|h| self.at_halfedge(*h).vertex().end())
            .collect()
    }

    /// Number of sides of a face.
    pub fn face_order(&self, face_id: FaceId) -> usize {
        self.halfedge_loop_iter(self.at_face(face_id).halfedge().end())
            .count()
    }

    fn halfedge_loop(&self, h0: HalfEdgeId) -> SVec<HalfEdgeId> {
        self.halfedge_loop_iter(h0).collect()
    }

    /// Returns an iterator that follows the next pointer for halfedges starting
    /// at `h0` until closing the loop.
    pub fn halfedge_loop_iter(&self, h0: HalfEdgeId) -> HalfedgeOpIterator<'_, NextOp> {
        HalfedgeOpIterator {
            mesh: self,
            start: h0,
            next: Some(h0),
            count: 0,
            _op: PhantomData,
        }
    }

    /// Returns an iterator that rotates around the tail vertex of `h0`, going
    /// through the outgoing halfedges of that vertex. Stops at the boundary
    /// for open fans; see [`VertexTraversalHelpers::outgoing_halfedges`] for
    /// the full fan.
    pub fn halfedge_fan_iter(&self, h0: HalfEdgeId) -> HalfedgeOpIterator<'_, CycleFanOp> {
        HalfedgeOpIterator {
            mesh: self,
            start: h0,
            next: Some(h0),
            count: 0,
            _op: PhantomData,
        }
    }

    /// The vertex `h` points to.
    pub fn halfedge_head(&self, h: HalfEdgeId) -> VertexId {
        self.at_halfedge(h).vertex().end()
    }

    /// The vertex `h` starts at. Equal to the head of the previous halfedge.
    pub fn halfedge_tail(&self, h: HalfEdgeId) -> VertexId {
        self.at_halfedge(h).src_vertex().end()
    }

    pub fn previous(&self, h: HalfEdgeId) -> HalfEdgeId {
        self.at_halfedge(h).previous().end()
    }

    pub fn is_boundary_halfedge(&self, h: HalfEdgeId) -> bool {
        self[h].pair.is_none()
    }

    pub fn is_boundary_vertex(&self, v: VertexId) -> bool {
        let outgoing = self.at_vertex(v).outgoing_halfedges().unwrap_or_default();
        outgoing.is_empty()
            || outgoing.iter().any(|&h| {
                self[h].pair.is_none() || self[self.previous(h)].pair.is_none()
            })
    }

    /// A mesh is closed when it has no boundary halfedges.
    pub fn is_closed(&self) -> bool {
        self.halfedges.values().all(|h| h.pair.is_some())
    }

    pub fn boundary_halfedges(&self) -> Vec<HalfEdgeId> {
        self.halfedges
            .iter()
            .filter(|(_, h)| h.pair.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of distinct vertices connected to `v` by an edge or boundary
    /// halfedge.
    pub fn vertex_valence(&self, v: VertexId) -> usize {
        self.vertex_neighbours(v).len()
    }

    /// The one-ring of `v`, in rotational order.
    pub fn vertex_neighbours(&self, v: VertexId) -> SVec<VertexId> {
        let outgoing = self
            .at_vertex(v)
            .outgoing_halfedges()
            .unwrap_or_else(|err| panic!("Error during traversal: {err}"));
        let mut neighbours: SVec<VertexId> = SVec::new();
        if let Some(&first) = outgoing.first() {
            let incoming = self.previous(first);
            if self[incoming].pair.is_none() {
                neighbours.push(self.halfedge_tail(incoming));
            }
        }
        for h in outgoing {
            let w = self.halfedge_head(h);
            if !neighbours.contains(&w) {
                neighbours.push(w);
            }
        }
        neighbours
    }

    /// Returns the average of a face's vertices. Note that this is different
    /// from the area centroid for non-regular polygons.
    pub fn face_centroid(&self, face_id: FaceId) -> Vec3 {
        let verts = self.face_vertices(face_id);
        verts
            .iter()
            .fold(Vec3::ZERO, |acc, v| acc + self[*v].position)
            / verts.len() as f32
    }

    /// Midpoint of the segment spanned by `h`.
    pub fn edge_centroid(&self, h: HalfEdgeId) -> Vec3 {
        let (a, b) = self
            .at_halfedge(h)
            .src_dst_pair()
            .unwrap_or_else(|err| panic!("Error during traversal: {err}"));
        (self[a].position + self[b].position) * 0.5
    }

    /// Average of the one-ring of `v`. Isolated vertices return their own
    /// position.
    pub fn vertex_centroid(&self, v: VertexId) -> Vec3 {
        let ring = self.vertex_neighbours(v);
        if ring.is_empty() {
            return self[v].position;
        }
        ring.iter().fold(Vec3::ZERO, |acc, w| acc + self[*w].position) / ring.len() as f32
    }

    /// Face normal computed with Newell's method, so non-planar and concave
    /// faces get a sensible answer. Returns `None` for degenerate faces.
    pub fn face_normal(&self, face: FaceId) -> Option<Vec3> {
        let verts = self.face_vertices(face);
        if verts.len() < 3 {
            return None;
        }
        let normal = verts
            .iter()
            .circular_tuple_windows()
            .fold(Vec3::ZERO, |acc, (a, b)| {
                acc + self[*a].position.cross(self[*b].position)
            });
        (normal.length_squared() > f32::EPSILON * f32::EPSILON).then(|| normal.normalize())
    }

    /// Normalized sum of the normals of the faces around `v`.
    pub fn vertex_normal(&self, v: VertexId) -> Option<Vec3> {
        let faces = self.at_vertex(v).adjacent_faces().ok()?;
        let sum = faces
            .iter()
            .filter_map(|f| self.face_normal(*f))
            .fold(Vec3::ZERO, |acc, n| acc + n);
        (sum.length_squared() > f32::EPSILON).then(|| sum.normalize())
    }

    /// Returns the (center, size) of the axis-aligned bounding box.
    pub fn bounding_box(&self) -> (Vec3, Vec3) {
        if self.vertices.is_empty() {
            return (Vec3::ZERO, Vec3::ZERO);
        }
        let (min, max) = self.vertices.values().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), v| (min.min(v.position), max.max(v.position)),
        );
        ((min + max) * 0.5, max - min)
    }

    /// V - E + F. Boundary halfedges count as edges too, since the Edge
    /// entity only exists for paired halfedges.
    pub fn euler_characteristic(&self) -> i64 {
        let boundary = self.halfedges.values().filter(|h| h.pair.is_none()).count();
        self.num_vertices() as i64 - (self.num_edges() + boundary) as i64
            + self.num_faces() as i64
    }
}

pub trait HalfEdgeOp {
    fn op(mesh: &HalfEdgeMesh, h: HalfEdgeId) -> Option<HalfEdgeId>;
}

pub struct NextOp;
impl HalfEdgeOp for NextOp {
    fn op(mesh: &HalfEdgeMesh, h: HalfEdgeId) -> Option<HalfEdgeId> {
        Some(mesh.at_halfedge(h).next().end())
    }
}

/// Rotates to the next outgoing halfedge of the same vertex. `None` when
/// reaching the boundary.
pub struct CycleFanOp;
impl HalfEdgeOp for CycleFanOp {
    fn op(mesh: &HalfEdgeMesh, h: HalfEdgeId) -> Option<HalfEdgeId> {
        mesh.at_halfedge(h).cycle_around_fan().try_end().ok()
    }
}

pub struct HalfedgeOpIterator<'a, Op: HalfEdgeOp> {
    mesh: &'a HalfEdgeMesh,
    start: HalfEdgeId,
    next: Option<HalfEdgeId>,
    count: usize,
    _op: PhantomData<Op>,
}

impl<'a, Op: HalfEdgeOp> Iterator for HalfedgeOpIterator<'a, Op> {
    type Item = HalfEdgeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.count >= MAX_LOOP_ITERATIONS {
            panic!("Max number of iterations reached. Is the mesh malformed?");
        }
        let res = self.next?;
        if self.count > 0 && res == self.start {
            return None;
        }
        self.next = Op::op(self.mesh, res);
        self.count += 1;
        Some(res)
    }
}
