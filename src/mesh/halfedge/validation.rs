// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use slotmap::SecondaryMap;

use super::*;

macro_rules! inconsistent {
    ($($arg:tt)*) => {
        bail!(MeshError::Inconsistent(format!($($arg)*)))
    };
}

impl HalfEdgeMesh {
    /// Checks the structural invariants of the mesh:
    ///
    /// 1. Every face is a closed `next` loop of at least three halfedges, all
    ///    of them pointing back to the face.
    /// 2. Pairs are symmetric and run in opposite directions.
    /// 3. Every halfedge belongs to a face; a halfedge without pair is on the
    ///    boundary, and has no edge.
    /// 4. A vertex's halfedge leaves the vertex, and rotating around the
    ///    vertex from it either closes or reaches the boundary.
    /// 5. Identity keys are set and unique.
    ///
    /// It also checks that edges and pairs agree with each other.
    #[profiling::function]
    pub fn validate(&self) -> Result<()> {
        let mut tails = SecondaryMap::<HalfEdgeId, VertexId>::new();
        for (h, he) in self.halfedges.iter() {
            let Some(v) = he.vertex else {
                inconsistent!("halfedge {h:?} has no vertex");
            };
            if !self.vertex_exists(v) {
                inconsistent!("halfedge {h:?} points to missing vertex {v:?}");
            }
            let Some(next) = he.next else {
                inconsistent!("halfedge {h:?} has no next");
            };
            if !self.halfedge_exists(next) {
                inconsistent!("halfedge {h:?} has missing next {next:?}");
            }
            if tails.insert(next, v).is_some() {
                inconsistent!("halfedge {next:?} is the next of more than one halfedge");
            }
        }

        // Invariant 1
        let mut visited = SecondaryMap::<HalfEdgeId, ()>::new();
        for (f, face) in self.faces.iter() {
            let Some(h0) = face.halfedge else {
                inconsistent!("face {f:?} has no halfedge");
            };
            if !self.halfedge_exists(h0) {
                inconsistent!("face {f:?} points to missing halfedge {h0:?}");
            }
            let mut h = h0;
            let mut order = 0;
            loop {
                if order > MAX_LOOP_ITERATIONS {
                    inconsistent!("face {f:?} does not form a closed loop");
                }
                if self[h].face != Some(f) {
                    inconsistent!("halfedge {h:?} is in the loop of face {f:?} but points elsewhere");
                }
                if visited.insert(h, ()).is_some() {
                    inconsistent!("halfedge {h:?} is visited twice");
                }
                order += 1;
                h = self[h].next.unwrap_or(h0);
                if h == h0 {
                    break;
                }
            }
            if order < 3 {
                inconsistent!("face {f:?} has only {order} sides");
            }
        }

        for (h, he) in self.halfedges.iter() {
            // Invariant 3: no dangling halfedges
            if !visited.contains_key(h) {
                match he.face {
                    Some(f) if !self.face_exists(f) => {
                        inconsistent!("halfedge {h:?} points to missing face {f:?}")
                    }
                    Some(f) => inconsistent!("halfedge {h:?} is not in the loop of its face {f:?}"),
                    None => inconsistent!("halfedge {h:?} has no face"),
                }
            }

            // Invariant 2 + edge agreement
            match he.pair {
                Some(pair) => {
                    let Some(pair_he) = self.halfedge(pair) else {
                        inconsistent!("halfedge {h:?} has missing pair {pair:?}");
                    };
                    if pair_he.pair != Some(h) {
                        inconsistent!("pair of {h:?} is {pair:?}, but not the other way around");
                    }
                    if pair_he.vertex != tails.get(h).copied() || he.vertex != tails.get(pair).copied() {
                        inconsistent!("halfedges {h:?} and {pair:?} are paired but don't share endpoints");
                    }
                    let Some(e) = he.edge else {
                        inconsistent!("paired halfedge {h:?} has no edge");
                    };
                    if pair_he.edge != Some(e) {
                        inconsistent!("halfedges {h:?} and {pair:?} are paired but have different edges");
                    }
                    match self.edge(e).and_then(|edge| edge.halfedge) {
                        Some(eh) if eh == h || eh == pair => {}
                        Some(eh) => inconsistent!("edge {e:?} points to {eh:?}, outside its pair"),
                        None => inconsistent!("edge {e:?} is missing or has no halfedge"),
                    }
                }
                None => {
                    if let Some(e) = he.edge {
                        inconsistent!("boundary halfedge {h:?} has edge {e:?}");
                    }
                }
            }
        }

        for (e, edge) in self.edges.iter() {
            let Some(h) = edge.halfedge else {
                inconsistent!("edge {e:?} has no halfedge");
            };
            match self.halfedge(h) {
                Some(he) if he.edge == Some(e) => {}
                _ => inconsistent!("edge {e:?} and its halfedge {h:?} disagree"),
            }
        }

        // Invariant 4
        for (v, vertex) in self.vertices.iter() {
            let Some(h) = vertex.halfedge else {
                continue;
            };
            if tails.get(h) != Some(&v) {
                inconsistent!("halfedge {h:?} of vertex {v:?} does not leave it");
            }
            let fan = self
                .at_vertex(v)
                .outgoing_halfedges()
                .map_err(|err| MeshError::Inconsistent(format!("vertex {v:?}: {err}")))?;
            if let Some(bad) = fan.iter().find(|h| tails.get(**h) != Some(&v)) {
                inconsistent!("fan of vertex {v:?} reaches {bad:?}, which does not leave it");
            }
        }

        // Invariant 5
        let mut keys = HashSet::new();
        let all_keys = self
            .vertices
            .values()
            .map(|x| x.key)
            .chain(self.halfedges.values().map(|x| x.key))
            .chain(self.edges.values().map(|x| x.key))
            .chain(self.faces.values().map(|x| x.key));
        for key in all_keys {
            let Some(key) = key else {
                inconsistent!("element without identity key");
            };
            if !keys.insert(key) {
                inconsistent!("identity key {key} is used twice");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::halfedge::primitives::*;

    fn assert_inconsistent(mesh: &HalfEdgeMesh) {
        let err = mesh.validate().unwrap_err();
        assert!(
            matches!(err.downcast_ref::<MeshError>(), Some(MeshError::Inconsistent(_))),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_valid_primitives() {
        Tetrahedron::build().validate().unwrap();
        Box::build(Vec3::ZERO, Vec3::ONE).validate().unwrap();
        Octahedron::build().validate().unwrap();
        Icosahedron::build().validate().unwrap();
        Grid::build(3, 2).validate().unwrap();
        HalfEdgeMesh::new().validate().unwrap();
    }

    #[test]
    fn test_detects_asymmetric_pair() {
        let mut mesh = Tetrahedron::build();
        let hs = mesh.halfedge_ids();
        let (a, b) = (hs[0], hs[1]);
        mesh[a].pair = Some(b);
        assert_inconsistent(&mesh);
    }

    #[test]
    fn test_detects_broken_loop() {
        let mut mesh = Tetrahedron::build();
        let f = mesh.face_ids()[0];
        let h = mesh.face_halfedges(f)[0];
        let other = mesh.face_halfedges(mesh.face_ids()[1])[0];
        mesh[h].next = Some(other);
        assert_inconsistent(&mesh);
    }

    #[test]
    fn test_detects_wrong_vertex_halfedge() {
        let mut mesh = Tetrahedron::build();
        let v = mesh.vertex_ids()[0];
        let h = mesh[v].halfedge().unwrap();
        // The pair comes *into* v
        mesh[v].halfedge = mesh[h].pair();
        assert_inconsistent(&mesh);
    }

    #[test]
    fn test_detects_edge_mismatch() {
        let mut mesh = Tetrahedron::build();
        let h = mesh.halfedge_ids()[0];
        mesh[h].edge = None;
        assert_inconsistent(&mesh);
    }

    #[test]
    fn test_detects_duplicate_keys() {
        let mut mesh = Tetrahedron::build();
        let vs = mesh.vertex_ids();
        mesh[vs[1]].key = mesh[vs[0]].key;
        assert_inconsistent(&mesh);
    }

    #[test]
    fn test_detects_faceless_halfedges() {
        let mut mesh = Tetrahedron::build();
        let f = mesh.face_ids()[0];
        mesh.remove_faces(&[f]).unwrap();
        assert_inconsistent(&mesh);
        mesh.clean_unused_elements_by_face();
        mesh.validate().unwrap();
    }
}
