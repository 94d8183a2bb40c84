// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

pub trait Location {}

impl Location for VertexId {}
impl Location for HalfEdgeId {}
impl Location for EdgeId {}
impl Location for FaceId {}
impl Location for bool {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TraversalError {
    #[error("vertex {0:?} does not exist")]
    StaleVertex(VertexId),
    #[error("halfedge {0:?} does not exist")]
    StaleHalfEdge(HalfEdgeId),
    #[error("edge {0:?} does not exist")]
    StaleEdge(EdgeId),
    #[error("face {0:?} does not exist")]
    StaleFace(FaceId),
    #[error("vertex {0:?} has no halfedge")]
    VertexHasNoHalfedge(VertexId),
    #[error("edge {0:?} has no halfedge")]
    EdgeHasNoHalfedge(EdgeId),
    #[error("face {0:?} has no halfedge")]
    FaceHasNoHalfedge(FaceId),
    #[error("halfedge {0:?} has no next")]
    HalfEdgeHasNoNext(HalfEdgeId),
    #[error("halfedge {0:?} has no pair")]
    HalfEdgeHasNoPair(HalfEdgeId),
    #[error("halfedge {0:?} has no vertex")]
    HalfEdgeHasNoVertex(HalfEdgeId),
    #[error("halfedge {0:?} has no edge")]
    HalfEdgeHasNoEdge(HalfEdgeId),
    #[error("halfedge {0:?} has no face")]
    HalfEdgeHasNoFace(HalfEdgeId),
    #[error("no halfedge goes to vertex {0:?}")]
    NoHalfedgeTo(VertexId),
    #[error("halfedge {0:?} is not part of a closed loop")]
    HalfedgeBadLoop(HalfEdgeId),
}

#[derive(Clone, Copy)]
pub struct ValidTraversal<'a, L>
where
    L: Location,
{
    inner: &'a HalfEdgeMesh,
    location: L,
}

pub type Traversal<'a, L> = Result<ValidTraversal<'a, L>, TraversalError>;

impl<'a, L: Location> ValidTraversal<'a, L> {
    fn step<M: Location>(&self, location: M) -> ValidTraversal<'a, M> {
        ValidTraversal {
            inner: self.inner,
            location,
        }
    }
}

/* ===================== */
/* Traversal on vertices */
/* ===================== */

pub trait VertexTraversal<'a> {
    fn halfedge(&'a self) -> Traversal<'a, HalfEdgeId>;
}

impl<'a> VertexTraversal<'a> for Traversal<'a, VertexId> {
    fn halfedge(&'a self) -> Traversal<'a, HalfEdgeId> {
        self.and_then(|valid| {
            let v = valid
                .inner
                .vertex(valid.location)
                .ok_or(TraversalError::StaleVertex(valid.location))?;
            Ok(valid.step(
                v.halfedge
                    .ok_or(TraversalError::VertexHasNoHalfedge(valid.location))?,
            ))
        })
    }
}

/* ================== */
/* Traversal on edges */
/* ================== */

pub trait EdgeTraversal<'a> {
    fn halfedge(&'a self) -> Traversal<'a, HalfEdgeId>;
}

impl<'a> EdgeTraversal<'a> for Traversal<'a, EdgeId> {
    fn halfedge(&'a self) -> Traversal<'a, HalfEdgeId> {
        self.and_then(|valid| {
            let e = valid
                .inner
                .edge(valid.location)
                .ok_or(TraversalError::StaleEdge(valid.location))?;
            Ok(valid.step(
                e.halfedge
                    .ok_or(TraversalError::EdgeHasNoHalfedge(valid.location))?,
            ))
        })
    }
}

/* ================== */
/* Traversal on faces */
/* ================== */

pub trait FaceTraversal<'a> {
    fn halfedge(&'a self) -> Traversal<'a, HalfEdgeId>;
}

impl<'a> FaceTraversal<'a> for Traversal<'a, FaceId> {
    fn halfedge(&'a self) -> Traversal<'a, HalfEdgeId> {
        self.and_then(|valid| {
            let f = valid
                .inner
                .face(valid.location)
                .ok_or(TraversalError::StaleFace(valid.location))?;
            Ok(valid.step(
                f.halfedge
                    .ok_or(TraversalError::FaceHasNoHalfedge(valid.location))?,
            ))
        })
    }
}

/* ====================== */
/* Traversal on halfedges */
/* ====================== */

pub trait HalfEdgeTraversal<'a> {
    fn pair(&'a self) -> Traversal<'a, HalfEdgeId>;
    fn next(&'a self) -> Traversal<'a, HalfEdgeId>;
    fn edge(&'a self) -> Traversal<'a, EdgeId>;
    fn face(&'a self) -> Traversal<'a, FaceId>;
    /// The vertex this halfedge points to.
    fn vertex(&'a self) -> Traversal<'a, VertexId>;
    fn face_or_boundary(&'a self) -> Result<Option<FaceId>, TraversalError>;
}

fn halfedge_record<'a>(valid: &ValidTraversal<'a, HalfEdgeId>) -> Result<&'a HalfEdge, TraversalError> {
    valid
        .inner
        .halfedge(valid.location)
        .ok_or(TraversalError::StaleHalfEdge(valid.location))
}

impl<'a> HalfEdgeTraversal<'a> for Traversal<'a, HalfEdgeId> {
    fn pair(&'a self) -> Traversal<'a, HalfEdgeId> {
        self.and_then(|valid| {
            let h = halfedge_record(&valid)?;
            Ok(valid.step(h.pair.ok_or(TraversalError::HalfEdgeHasNoPair(valid.location))?))
        })
    }

    fn next(&'a self) -> Traversal<'a, HalfEdgeId> {
        self.and_then(|valid| {
            let h = halfedge_record(&valid)?;
            Ok(valid.step(h.next.ok_or(TraversalError::HalfEdgeHasNoNext(valid.location))?))
        })
    }

    fn edge(&'a self) -> Traversal<'a, EdgeId> {
        self.and_then(|valid| {
            let h = halfedge_record(&valid)?;
            Ok(valid.step(h.edge.ok_or(TraversalError::HalfEdgeHasNoEdge(valid.location))?))
        })
    }

    fn face(&'a self) -> Traversal<'a, FaceId> {
        self.and_then(|valid| {
            let h = halfedge_record(&valid)?;
            Ok(valid.step(h.face.ok_or(TraversalError::HalfEdgeHasNoFace(valid.location))?))
        })
    }

    fn vertex(&'a self) -> Traversal<'a, VertexId> {
        self.and_then(|valid| {
            let h = halfedge_record(&valid)?;
            Ok(valid.step(
                h.vertex
                    .ok_or(TraversalError::HalfEdgeHasNoVertex(valid.location))?,
            ))
        })
    }

    fn face_or_boundary(&'a self) -> Result<Option<FaceId>, TraversalError> {
        self.and_then(|valid| Ok(halfedge_record(&valid)?.face))
    }
}

/* =================== */
/*  Generic traversal  */
/* =================== */

pub trait AnyTraversal<'a, L> {
    fn end(&'a self) -> L;
    fn try_end(&'a self) -> Result<L, TraversalError>;
}

impl<'a, L> AnyTraversal<'a, L> for Traversal<'a, L>
where
    L: Location + Copy,
{
    fn end(&'a self) -> L {
        self.map(|valid| valid.location)
            .unwrap_or_else(|err| panic!("Error during traversal: {err:?}"))
    }

    fn try_end(&'a self) -> Result<L, TraversalError> {
        self.map(|valid| valid.location)
    }
}

/* ============ */
/*  Initiators  */
/* ============ */

impl HalfEdgeMesh {
    pub fn at_halfedge(&self, halfedge_id: HalfEdgeId) -> Traversal<'_, HalfEdgeId> {
        Ok(ValidTraversal {
            inner: self,
            location: halfedge_id,
        })
    }

    pub fn at_edge(&self, edge_id: EdgeId) -> Traversal<'_, EdgeId> {
        Ok(ValidTraversal {
            inner: self,
            location: edge_id,
        })
    }

    pub fn at_face(&self, face_id: FaceId) -> Traversal<'_, FaceId> {
        Ok(ValidTraversal {
            inner: self,
            location: face_id,
        })
    }

    pub fn at_vertex(&self, vertex_id: VertexId) -> Traversal<'_, VertexId> {
        Ok(ValidTraversal {
            inner: self,
            location: vertex_id,
        })
    }
}

/* ================ */
/*  Vertex Helpers  */
/* ================ */

pub trait VertexTraversalHelpers<'a> {
    fn outgoing_halfedges(&'a self) -> Result<SVec<HalfEdgeId>, TraversalError>;
    fn incoming_halfedges(&'a self) -> Result<SVec<HalfEdgeId>, TraversalError>;
    fn halfedge_to(&self, other: VertexId) -> Traversal<HalfEdgeId>;
    fn adjacent_faces(&self) -> Result<SVec<FaceId>, TraversalError>;
}

impl<'a> VertexTraversalHelpers<'a> for Traversal<'a, VertexId> {
    /// Halfedges leaving this vertex, in rotational order. On an open fan the
    /// list starts right after the boundary and ends at it.
    fn outgoing_halfedges(&'a self) -> Result<SVec<HalfEdgeId>, TraversalError> {
        self.and_then(|valid| {
            let mesh = valid.inner;
            let vertex = mesh
                .vertex(valid.location)
                .ok_or(TraversalError::StaleVertex(valid.location))?;
            // Could be a disconnected vertex. Return an empty list in that case.
            let Some(h0) = vertex.halfedge else {
                return Ok(SVec::new());
            };

            let mut forward = SVec::new();
            let mut h = h0;
            let mut closed = false;
            loop {
                if forward.len() > MAX_LOOP_ITERATIONS {
                    return Err(TraversalError::HalfedgeBadLoop(h0));
                }
                forward.push(h);
                match mesh.at_halfedge(h).cycle_around_fan().try_end() {
                    Ok(h_next) if h_next == h0 => {
                        closed = true;
                        break;
                    }
                    Ok(h_next) => h = h_next,
                    Err(TraversalError::HalfEdgeHasNoPair(_)) => break,
                    Err(err) => return Err(err),
                }
            }
            if closed {
                return Ok(forward);
            }

            // Open fan: also rotate backwards from the starting halfedge.
            let mut backward: SVec<HalfEdgeId> = SVec::new();
            let mut h = h0;
            loop {
                if backward.len() > MAX_LOOP_ITERATIONS {
                    return Err(TraversalError::HalfedgeBadLoop(h0));
                }
                match mesh.at_halfedge(h).previous().pair().try_end() {
                    Ok(h_prev) => {
                        backward.push(h_prev);
                        h = h_prev;
                    }
                    Err(TraversalError::HalfEdgeHasNoPair(_)) => break,
                    Err(err) => return Err(err),
                }
            }
            Ok(backward.into_iter().rev().chain(forward).collect())
        })
    }

    fn incoming_halfedges(&'a self) -> Result<SVec<HalfEdgeId>, TraversalError> {
        self.and_then(|valid| {
            self.outgoing_halfedges()?
                .iter()
                .map(|h| valid.inner.at_halfedge(*h).previous().try_end())
                .collect()
        })
    }

    /// Returns the halfedge that goes from the current vertex to `other`,
    /// if any.
    fn halfedge_to(&self, other: VertexId) -> Traversal<HalfEdgeId> {
        self.and_then(|valid| {
            let h_to = self
                .outgoing_halfedges()?
                .into_iter()
                .find(|&h| valid.inner.at_halfedge(h).vertex().try_end() == Ok(other))
                .ok_or(TraversalError::NoHalfedgeTo(other))?;
            Ok(valid.step(h_to))
        })
    }

    /// Returns the polygon fan around this vertex.
    fn adjacent_faces(&self) -> Result<SVec<FaceId>, TraversalError> {
        self.and_then(|valid| {
            Ok(self
                .outgoing_halfedges()?
                .into_iter()
                .filter_map(|h| valid.inner.at_halfedge(h).face().try_end().ok())
                .collect::<SVec<_>>())
        })
    }
}

/* ============== */
/*  Face Helpers  */
/* ============== */

pub trait FaceTraversalHelpers<'a> {
    fn halfedges(&'a self) -> Result<SVec<HalfEdgeId>, TraversalError>;
    fn vertices(&'a self) -> Result<SVec<VertexId>, TraversalError>;
}

impl<'a> FaceTraversalHelpers<'a> for Traversal<'a, FaceId> {
    fn halfedges(&'a self) -> Result<SVec<HalfEdgeId>, TraversalError> {
        self.and_then(|valid| {
            let mut halfedges = SVec::new();
            let h0 = self.halfedge().try_end()?;
            let mut h = h0;
            loop {
                if halfedges.len() > MAX_LOOP_ITERATIONS {
                    return Err(TraversalError::HalfedgeBadLoop(h0));
                }
                halfedges.push(h);
                h = valid.inner.at_halfedge(h).next().try_end()?;
                if h == h0 {
                    break;
                }
            }
            Ok(halfedges)
        })
    }

    fn vertices(&'a self) -> Result<SVec<VertexId>, TraversalError> {
        self.and_then(|valid| {
            self.halfedges()?
                .iter()
                .map(|h| valid.inner.at_halfedge(*h).vertex().try_end())
                .collect::<Result<SVec<_>, TraversalError>>()
        })
    }
}

/* ================== */
/*  Halfedge Helpers  */
/* ================== */

pub trait HalfedgeTraversalHelpers<'a> {
    fn cycle_around_fan(&'a self) -> Traversal<HalfEdgeId>;
    fn src_vertex(&'a self) -> Traversal<VertexId>;
    fn dst_vertex(&'a self) -> Traversal<VertexId>;
    fn src_dst_pair(&'a self) -> Result<(VertexId, VertexId), TraversalError>;
    fn is_boundary(&'a self) -> Result<bool, TraversalError>;
    fn previous(&'a self) -> Traversal<HalfEdgeId>;
}

impl<'a> HalfedgeTraversalHelpers<'a> for Traversal<'a, HalfEdgeId> {
    /// Next outgoing halfedge around the tail vertex.
    fn cycle_around_fan(&'a self) -> Traversal<HalfEdgeId> {
        self.and_then(|valid| Ok(valid.step(self.pair().next().try_end()?)))
    }

    fn src_vertex(&'a self) -> Traversal<VertexId> {
        self.and_then(|valid| Ok(valid.step(self.previous().vertex().try_end()?)))
    }

    fn dst_vertex(&'a self) -> Traversal<VertexId> {
        self.vertex()
    }

    fn src_dst_pair(&'a self) -> Result<(VertexId, VertexId), TraversalError> {
        Ok((self.src_vertex().try_end()?, self.dst_vertex().try_end()?))
    }

    /// Boundary halfedges are the ones without a pair.
    fn is_boundary(&'a self) -> Result<bool, TraversalError> {
        self.and_then(|valid| Ok(halfedge_record(&valid)?.pair.is_none()))
    }

    fn previous(&'a self) -> Traversal<HalfEdgeId> {
        self.and_then(|valid| {
            let mut h = valid.location;
            for _ in 0..MAX_LOOP_ITERATIONS {
                let next = valid.inner.at_halfedge(h).next().try_end()?;
                if next == valid.location {
                    return Ok(valid.step(h));
                }
                h = next;
            }
            Err(TraversalError::HalfedgeBadLoop(valid.location))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_chained_traversal() {
        let mesh = primitives::Tetrahedron::build();
        for (h, _) in mesh.iter_halfedges() {
            // Going to the pair and back is a no-op
            assert_eq!(mesh.at_halfedge(h).pair().pair().end(), h);
            // The pair starts where this halfedge ends
            assert_eq!(
                mesh.at_halfedge(h).pair().src_vertex().end(),
                mesh.at_halfedge(h).vertex().end()
            );
            assert_eq!(
                mesh.at_halfedge(h).edge().end(),
                mesh.at_halfedge(h).pair().edge().end()
            );
            assert_eq!(mesh.at_halfedge(h).next().next().next().end(), h);
            assert!(!mesh.at_halfedge(h).is_boundary().unwrap());
        }
        for (e, _) in mesh.iter_edges() {
            let h = mesh.at_edge(e).halfedge().end();
            assert_eq!(mesh.at_halfedge(h).edge().end(), e);
        }
        for (f, _) in mesh.iter_faces() {
            assert_eq!(mesh.at_face(f).halfedges().unwrap().len(), 3);
            assert_eq!(mesh.at_face(f).vertices().unwrap().len(), 3);
        }
    }

    #[test]
    fn test_vertex_helpers() {
        let mesh = primitives::Octahedron::build();
        for (v, _) in mesh.iter_vertices() {
            let outgoing = mesh.at_vertex(v).outgoing_halfedges().unwrap();
            assert_eq!(outgoing.len(), 4);
            for &h in &outgoing {
                assert_eq!(mesh.at_halfedge(h).src_vertex().end(), v);
                let w = mesh.at_halfedge(h).vertex().end();
                assert_eq!(mesh.at_vertex(v).halfedge_to(w).end(), h);
            }
            // Consecutive entries are one fan rotation apart
            for (&a, &b) in outgoing.iter().circular_tuple_windows() {
                assert_eq!(mesh.at_halfedge(a).cycle_around_fan().end(), b);
            }
            let incoming = mesh.at_vertex(v).incoming_halfedges().unwrap();
            assert!(incoming
                .iter()
                .all(|h| mesh.at_halfedge(*h).vertex().end() == v));
            assert_eq!(mesh.at_vertex(v).adjacent_faces().unwrap().len(), 4);
        }
    }

    #[test]
    fn test_open_fan_outgoing() {
        let mesh = primitives::Grid::build(2, 2);
        for (v, _) in mesh.iter_vertices() {
            let outgoing = mesh.at_vertex(v).outgoing_halfedges().unwrap();
            for (&a, &b) in outgoing.iter().tuple_windows() {
                assert_eq!(mesh.at_halfedge(a).cycle_around_fan().end(), b);
            }
            // Every face around the vertex is reached
            assert_eq!(
                mesh.at_vertex(v).adjacent_faces().unwrap().len(),
                outgoing.len()
            );
        }
    }

    #[test]
    fn test_traversal_errors() {
        let mesh = primitives::Quad::build(Vec3::ZERO, Vec3::Y, Vec3::X, Vec2::ONE);
        let h = mesh.halfedge_ids()[0];
        assert_eq!(
            mesh.at_halfedge(h).pair().try_end(),
            Err(TraversalError::HalfEdgeHasNoPair(h))
        );
        assert!(mesh.at_halfedge(h).is_boundary().unwrap());
        assert_eq!(mesh.at_halfedge(h).face_or_boundary(), Ok(mesh[h].face()));

        let v = mesh.vertex_ids()[0];
        let mut other = mesh.clone();
        other.remove_vertex(v);
        assert_eq!(
            other.at_vertex(v).halfedge().try_end(),
            Err(TraversalError::StaleVertex(v))
        );
    }
}
