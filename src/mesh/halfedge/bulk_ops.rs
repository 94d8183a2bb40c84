// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;

use slotmap::SecondaryMap;

use super::*;

fn invalid_element(msg: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(MeshError::InvalidElement(msg.into()))
}

impl HalfEdgeMesh {
    fn ensure_detached(key: Option<u64>, kind: &str) -> Result<()> {
        if let Some(key) = key {
            return Err(invalid_element(format!(
                "{kind} with key {key} already belongs to a mesh"
            )));
        }
        Ok(())
    }

    fn ensure_vertex(&self, v: VertexId) -> Result<()> {
        if !self.vertex_exists(v) {
            return Err(invalid_element(format!("vertex {v:?} is not in this mesh")));
        }
        Ok(())
    }

    fn ensure_halfedge(&self, h: HalfEdgeId) -> Result<()> {
        if !self.halfedge_exists(h) {
            return Err(invalid_element(format!("halfedge {h:?} is not in this mesh")));
        }
        Ok(())
    }

    fn ensure_face(&self, f: FaceId) -> Result<()> {
        if !self.face_exists(f) {
            return Err(invalid_element(format!("face {f:?} is not in this mesh")));
        }
        Ok(())
    }

    /// Inserts a detached vertex, assigning it a key. Fails with
    /// [`MeshError::InvalidElement`] if the record was taken from a mesh or
    /// points to a halfedge this mesh doesn't have.
    pub fn add_vertex(&mut self, vertex: Vertex) -> Result<VertexId> {
        Self::ensure_detached(vertex.key, "vertex")?;
        if let Some(h) = vertex.halfedge {
            self.ensure_halfedge(h)?;
        }
        Ok(self.alloc_vertex(vertex.position, vertex.halfedge))
    }

    pub fn add_vertices(&mut self, vertices: impl IntoIterator<Item = Vertex>) -> Result<Vec<VertexId>> {
        vertices.into_iter().map(|v| self.add_vertex(v)).collect()
    }

    /// Inserts a detached halfedge. Pairing is not accepted here, it is
    /// computed by [`HalfEdgeMesh::pair_halfedges`].
    pub fn add_halfedge(&mut self, halfedge: HalfEdge) -> Result<HalfEdgeId> {
        Self::ensure_detached(halfedge.key, "halfedge")?;
        if let Some(v) = halfedge.vertex {
            self.ensure_vertex(v)?;
        }
        if let Some(next) = halfedge.next {
            self.ensure_halfedge(next)?;
        }
        if let Some(f) = halfedge.face {
            self.ensure_face(f)?;
        }
        if halfedge.pair.is_some() || halfedge.edge.is_some() {
            return Err(invalid_element(
                "new halfedges must be unpaired, pairs are found by pair_halfedges",
            ));
        }
        Ok(self.alloc_halfedge(halfedge))
    }

    pub fn add_halfedges(
        &mut self,
        halfedges: impl IntoIterator<Item = HalfEdge>,
    ) -> Result<Vec<HalfEdgeId>> {
        halfedges.into_iter().map(|h| self.add_halfedge(h)).collect()
    }

    /// Inserts an edge for an already paired halfedge, linking both
    /// halfedges of the pair to it.
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeId> {
        Self::ensure_detached(edge.key, "edge")?;
        let h = edge
            .halfedge
            .ok_or_else(|| invalid_element("edge has no halfedge"))?;
        self.ensure_halfedge(h)?;
        let pair = self[h]
            .pair
            .ok_or_else(|| invalid_element(format!("halfedge {h:?} has no pair")))?;
        if self[h].edge.is_some() {
            return Err(invalid_element(format!("halfedge {h:?} already has an edge")));
        }
        let e = self.alloc_edge(Some(h));
        self[h].edge = Some(e);
        self[pair].edge = Some(e);
        Ok(e)
    }

    pub fn add_edges(&mut self, edges: impl IntoIterator<Item = Edge>) -> Result<Vec<EdgeId>> {
        edges.into_iter().map(|e| self.add_edge(e)).collect()
    }

    pub fn add_face(&mut self, face: Face) -> Result<FaceId> {
        Self::ensure_detached(face.key, "face")?;
        if let Some(h) = face.halfedge {
            self.ensure_halfedge(h)?;
        }
        Ok(self.alloc_face(face.halfedge))
    }

    pub fn add_faces(&mut self, faces: impl IntoIterator<Item = Face>) -> Result<Vec<FaceId>> {
        faces.into_iter().map(|f| self.add_face(f)).collect()
    }

    /// Links `h` to `next` while building a mesh by hand.
    pub fn set_next(&mut self, h: HalfEdgeId, next: HalfEdgeId) -> Result<()> {
        self.ensure_halfedge(h)?;
        self.ensure_halfedge(next)?;
        self[h].next = Some(next);
        Ok(())
    }

    pub fn set_halfedge_face(&mut self, h: HalfEdgeId, face: FaceId) -> Result<()> {
        self.ensure_halfedge(h)?;
        self.ensure_face(face)?;
        self[h].face = Some(face);
        Ok(())
    }

    pub fn set_vertex_halfedge(&mut self, v: VertexId, h: HalfEdgeId) -> Result<()> {
        self.ensure_vertex(v)?;
        self.ensure_halfedge(h)?;
        self[v].halfedge = Some(h);
        Ok(())
    }

    pub fn set_face_halfedge(&mut self, f: FaceId, h: HalfEdgeId) -> Result<()> {
        self.ensure_face(f)?;
        self.ensure_halfedge(h)?;
        self[f].halfedge = Some(h);
        Ok(())
    }

    /// Detaches the given faces from their halfedges and deletes them. The
    /// halfedges themselves stay until [`HalfEdgeMesh::clean_unused_elements_by_face`]
    /// runs, so the mesh is not consistent in between.
    pub fn remove_faces(&mut self, faces: &[FaceId]) -> Result<()> {
        for &f in faces {
            self.ensure_face(f)?;
        }
        for &f in faces {
            if !self.face_exists(f) {
                // Listed twice
                continue;
            }
            let halfedges = self.at_face(f).halfedges()?;
            for h in halfedges {
                if self[h].face == Some(f) {
                    self[h].face = None;
                }
            }
            self.remove_face(f);
        }
        Ok(())
    }

    /// Deletes every element that is no longer reachable from a face, and
    /// repairs the references of the survivors: halfedges whose pair went
    /// away become boundary, and vertices get a live outgoing halfedge.
    #[profiling::function]
    pub fn clean_unused_elements_by_face(&mut self) {
        let mut used_halfedges = SecondaryMap::<HalfEdgeId, ()>::new();
        for f in self.face_ids() {
            for h in self.face_halfedges(f) {
                used_halfedges.insert(h, ());
            }
        }

        let unused_halfedges = self
            .halfedges
            .keys()
            .filter(|h| !used_halfedges.contains_key(*h))
            .collect_vec();
        for &h in &unused_halfedges {
            if let Some(pair) = self[h].pair {
                if let Some(pair_he) = self.halfedges.get_mut(pair) {
                    pair_he.pair = None;
                    pair_he.edge = None;
                }
            }
            if let Some(e) = self[h].edge {
                self.remove_edge(e);
            }
        }
        for h in unused_halfedges.iter_cpy() {
            self.remove_halfedge(h);
        }

        // The next of a halfedge leaves its head, so it is an outgoing
        // halfedge of that vertex.
        let mut outgoing = SecondaryMap::<VertexId, HalfEdgeId>::new();
        for (_, he) in self.halfedges.iter() {
            if let (Some(v), Some(next)) = (he.vertex, he.next) {
                if !outgoing.contains_key(v) {
                    outgoing.insert(v, next);
                }
            }
        }

        let unused_vertices = self
            .vertices
            .keys()
            .filter(|v| !outgoing.contains_key(*v))
            .collect_vec();
        for &v in &unused_vertices {
            self.remove_vertex(v);
        }
        for (v, vertex) in self.vertices.iter_mut() {
            let stale = vertex.halfedge.map_or(true, |h| !used_halfedges.contains_key(h));
            if stale {
                vertex.halfedge = outgoing.get(v).copied();
            }
        }

        log::debug!(
            "Removed {} halfedges and {} vertices no longer used by any face",
            unused_halfedges.len(),
            unused_vertices.len(),
        );
    }

    /// Pairs every unpaired halfedge with an unpaired halfedge running in the
    /// opposite direction between the same two vertices, giving each new pair
    /// a fresh [`Edge`]. Halfedges are visited in iteration order, and when
    /// several candidates exist the one visited first wins. Returns the number
    /// of pairs created.
    #[profiling::function]
    pub fn pair_halfedges(&mut self) -> usize {
        let mut tails = SecondaryMap::<HalfEdgeId, VertexId>::new();
        for (_, he) in self.halfedges.iter() {
            if let (Some(v), Some(next)) = (he.vertex, he.next) {
                tails.insert(next, v);
            }
        }

        let unpaired = self
            .halfedges
            .iter()
            .filter(|(_, he)| he.pair.is_none())
            .filter_map(|(h, he)| Some((h, *tails.get(h)?, he.vertex?)))
            .collect_vec();

        let mut waiting = HashMap::<(VertexId, VertexId), VecDeque<HalfEdgeId>>::new();
        let mut count = 0;
        for (h, tail, head) in unpaired {
            let partner = waiting
                .get_mut(&(head, tail))
                .and_then(|queue| queue.pop_front());
            match partner {
                Some(other) => {
                    self.link_pair(other, h);
                    count += 1;
                }
                None => waiting.entry((tail, head)).or_default().push_back(h),
            }
        }
        count
    }

    /// Swaps `old_faces` for `new_faces` in one step. The new faces must
    /// already be linked into the halfedge structure; any halfedge still
    /// pointing at one of the old faces is detached from it.
    ///
    /// Takes the faces being replaced so a transform can swap only the part
    /// of the mesh it touched. Use `replace_all_faces` to swap every face.
    pub fn replace_faces(&mut self, old_faces: &[FaceId], new_faces: &[FaceId]) -> Result<()> {
        for &f in new_faces {
            self.ensure_face(f)?;
            self.at_face(f).halfedge().try_end()?;
        }
        let old: HashSet<FaceId> = old_faces
            .iter_cpy()
            .filter(|f| !new_faces.contains(f))
            .collect();
        for he in self.halfedges.values_mut() {
            if he.face.map_or(false, |f| old.contains(&f)) {
                he.face = None;
            }
        }
        for f in old {
            self.remove_face(f);
        }
        Ok(())
    }

    /// Replaces the whole face set of the mesh with `new_faces`.
    pub fn replace_all_faces(&mut self, new_faces: &[FaceId]) -> Result<()> {
        let old = self.face_ids();
        self.replace_faces(&old, new_faces)
    }

    /// Merges this halfedge mesh with another one. No additional connectivity
    /// data is generated between the two. The merged elements get fresh keys
    /// from this mesh. Returns the ids of the copied faces.
    pub fn merge_with(&mut self, other: &HalfEdgeMesh) -> Vec<FaceId> {
        let mut vmap = SecondaryMap::<VertexId, VertexId>::new();
        let mut hmap = SecondaryMap::<HalfEdgeId, HalfEdgeId>::new();
        let mut emap = SecondaryMap::<EdgeId, EdgeId>::new();
        let mut fmap = SecondaryMap::<FaceId, FaceId>::new();

        // First pass: allocate everything, so all ids are known.
        for (v, vertex) in other.iter_vertices() {
            vmap.insert(v, self.alloc_vertex(vertex.position, None));
        }
        for (h, _) in other.iter_halfedges() {
            hmap.insert(h, self.alloc_halfedge(HalfEdge::default()));
        }
        for (e, _) in other.iter_edges() {
            emap.insert(e, self.alloc_edge(None));
        }
        for (f, _) in other.iter_faces() {
            fmap.insert(f, self.alloc_face(None));
        }

        // Second pass: translate the pointers.
        for (v, vertex) in other.iter_vertices() {
            self[vmap[v]].halfedge = vertex.halfedge.map(|h| hmap[h]);
        }
        for (h, he) in other.iter_halfedges() {
            let new = &mut self[hmap[h]];
            new.vertex = he.vertex.map(|v| vmap[v]);
            new.next = he.next.map(|n| hmap[n]);
            new.pair = he.pair.map(|p| hmap[p]);
            new.edge = he.edge.map(|e| emap[e]);
            new.face = he.face.map(|f| fmap[f]);
        }
        for (e, edge) in other.iter_edges() {
            self[emap[e]].halfedge = edge.halfedge.map(|h| hmap[h]);
        }
        for (f, face) in other.iter_faces() {
            self[fmap[f]].halfedge = face.halfedge.map(|h| hmap[h]);
        }

        other.iter_faces().map(|(f, _)| fmap[f]).collect()
    }
}
