// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ops::Range;

use slotmap::SlotMap;

use super::*;

/// A subset of the elements of a mesh, used to scope operations.
///
/// A selection does not borrow its mesh. After a structural change, ids in
/// the selection may have become stale: call [`Selection::refresh`] before
/// using it again.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub vertices: BTreeSet<VertexId>,
    pub halfedges: BTreeSet<HalfEdgeId>,
    pub edges: BTreeSet<EdgeId>,
    pub faces: BTreeSet<FaceId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects every element in the mesh.
    pub fn all(mesh: &HalfEdgeMesh) -> Self {
        Self {
            vertices: mesh.vertices.keys().collect(),
            halfedges: mesh.halfedges.keys().collect(),
            edges: mesh.edges.keys().collect(),
            faces: mesh.faces.keys().collect(),
        }
    }

    pub fn from_faces(faces: impl IntoIterator<Item = FaceId>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn from_vertices(vertices: impl IntoIterator<Item = VertexId>) -> Self {
        Self {
            vertices: vertices.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn from_edges(edges: impl IntoIterator<Item = EdgeId>) -> Self {
        Self {
            edges: edges.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn from_halfedges(halfedges: impl IntoIterator<Item = HalfEdgeId>) -> Self {
        Self {
            halfedges: halfedges.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn union(&self, other: &Selection) -> Selection {
        Selection {
            vertices: self.vertices.union(&other.vertices).copied().collect(),
            halfedges: self.halfedges.union(&other.halfedges).copied().collect(),
            edges: self.edges.union(&other.edges).copied().collect(),
            faces: self.faces.union(&other.faces).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
            && self.halfedges.is_empty()
            && self.edges.is_empty()
            && self.faces.is_empty()
    }

    /// Drops every id that is no longer live in `mesh`.
    pub fn refresh(&mut self, mesh: &HalfEdgeMesh) {
        self.vertices.retain(|v| mesh.vertex_exists(*v));
        self.halfedges.retain(|h| mesh.halfedge_exists(*h));
        self.edges.retain(|e| mesh.edge_exists(*e));
        self.faces.retain(|f| mesh.face_exists(*f));
    }

    /// The vertices of the selected faces, plus the selected vertices.
    pub fn face_vertices(&self, mesh: &HalfEdgeMesh) -> BTreeSet<VertexId> {
        let mut vertices = self.vertices.clone();
        for &f in &self.faces {
            if mesh.face_exists(f) {
                vertices.extend(mesh.face_vertices(f));
            }
        }
        vertices
    }

    /// Both halfedges of every selected edge, plus the selected halfedges.
    pub fn edge_halfedges(&self, mesh: &HalfEdgeMesh) -> BTreeSet<HalfEdgeId> {
        let mut halfedges = self.halfedges.clone();
        for &e in &self.edges {
            let Some(h) = mesh.edge(e).and_then(|edge| edge.halfedge) else {
                continue;
            };
            halfedges.insert(h);
            if let Some(pair) = mesh[h].pair {
                halfedges.insert(pair);
            }
        }
        halfedges
    }
}

impl HalfEdgeMesh {
    /// Stores `selection` under `name`, replacing any previous one.
    pub fn set_named_selection(&mut self, name: impl Into<String>, selection: Selection) {
        self.named_selections.insert(name.into(), selection);
    }

    pub fn named_selection(&self, name: &str) -> Option<&Selection> {
        self.named_selections.get(name)
    }

    pub fn remove_named_selection(&mut self, name: &str) -> Option<Selection> {
        self.named_selections.remove(name)
    }

    pub fn named_selection_names(&self) -> impl Iterator<Item = &str> {
        self.named_selections.keys().map(|k| k.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionFragment {
    Range(Range<u32>),
    Single(u32),
    /// A named selection stored in the mesh.
    Group(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionExpression {
    All,
    None,
    Explicit(Vec<SelectionFragment>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionKind {
    Vertices,
    HalfEdges,
    Edges,
    Faces,
}

impl SelectionExpression {
    /// Parses a [`SelectionExpression`] from a string input.
    ///
    /// Syntax Examples:
    /// ```ignore
    /// 0, 1, 2 // Select elements 0, 1 and 2
    /// * // Select all elements
    /// 0..1 // Select a range of elements
    /// 0..5, 7..10, 13, 17, 22 // Select multiple ranges, and some single elements
    /// @top, 3 // Select the elements in the named selection 'top', and element 3
    ///  // (empty string), selects nothing
    /// ```
    pub fn parse(input: &str) -> Result<SelectionExpression> {
        use nom_prelude::*;

        fn number(input: &str) -> IResult<&str, u32> {
            map_res(digit1, |s: &str| s.parse::<u32>()).parse(input)
        }

        fn single(input: &str) -> IResult<&str, SelectionFragment> {
            map(number, SelectionFragment::Single).parse(input)
        }

        fn range(input: &str) -> IResult<&str, SelectionFragment> {
            map(separated_pair(number, tag(".."), number), |(x, y)| {
                SelectionFragment::Range(x..y)
            })
            .parse(input)
        }

        fn group(input: &str) -> IResult<&str, SelectionFragment> {
            map(
                preceded(
                    char('@'),
                    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-'),
                ),
                |name: &str| SelectionFragment::Group(name.to_string()),
            )
            .parse(input)
        }

        fn selection_fragment(input: &str) -> IResult<&str, SelectionFragment> {
            alt((range, single, group)).parse(input)
        }

        fn expression_all(input: &str) -> IResult<&str, SelectionExpression> {
            map(tag("*"), |_| SelectionExpression::All).parse(input)
        }

        fn separator(input: &str) -> IResult<&str, ()> {
            map(delimited(multispace0, tag(","), multispace0), |_| ()).parse(input)
        }

        fn expression_explicit(input: &str) -> IResult<&str, SelectionExpression> {
            map(
                separated_list1(separator, selection_fragment),
                SelectionExpression::Explicit,
            )
            .parse(input)
        }

        fn expression(input: &str) -> IResult<&str, SelectionExpression> {
            all_consuming(delimited(
                multispace0,
                alt((expression_all, expression_explicit)),
                multispace0,
            ))
            .parse(input)
        }

        if input.trim().is_empty() {
            Ok(SelectionExpression::None)
        } else {
            expression(input)
                .map(|(_, parsed)| parsed)
                .map_err(|err| anyhow!("Error parsing selection '{input}': {err}"))
        }
    }

    /// The inverse of [`SelectionExpression::parse`].
    pub fn unparse(&self) -> String {
        match self {
            SelectionExpression::All => "*".into(),
            SelectionExpression::None => "".into(),
            SelectionExpression::Explicit(fragments) => fragments
                .iter()
                .map(|fragment| match fragment {
                    SelectionFragment::Range(r) => format!("{}..{}", r.start, r.end),
                    SelectionFragment::Single(i) => format!("{i}"),
                    SelectionFragment::Group(name) => format!("@{name}"),
                })
                .join(", "),
        }
    }
}

/// Ids that can be picked by a [`SelectionExpression`].
trait SelectableKey: slotmap::Key + Ord {
    type Element;
    fn arena(mesh: &HalfEdgeMesh) -> &SlotMap<Self, Self::Element>;
    fn in_selection(selection: &Selection) -> &BTreeSet<Self>;
}

macro_rules! impl_selectable_key {
    ($id:ty, $element:ty, $field:ident) => {
        impl SelectableKey for $id {
            type Element = $element;
            fn arena(mesh: &HalfEdgeMesh) -> &SlotMap<Self, Self::Element> {
                &mesh.$field
            }
            fn in_selection(selection: &Selection) -> &BTreeSet<Self> {
                &selection.$field
            }
        }
    };
}

impl_selectable_key!(VertexId, Vertex, vertices);
impl_selectable_key!(HalfEdgeId, HalfEdge, halfedges);
impl_selectable_key!(EdgeId, Edge, edges);
impl_selectable_key!(FaceId, Face, faces);

impl HalfEdgeMesh {
    /// Resolves `expression` against the iteration order of one element
    /// kind. Output is in iteration order, without repetitions.
    fn resolve_ids<K: SelectableKey>(&self, expression: &SelectionExpression) -> Result<Vec<K>> {
        let arena = K::arena(self);
        match expression {
            SelectionExpression::All => Ok(arena.keys().collect()),
            SelectionExpression::None => Ok(vec![]),
            SelectionExpression::Explicit(fragments) => {
                let mut grouped = BTreeSet::new();
                for fragment in fragments {
                    if let SelectionFragment::Group(name) = fragment {
                        let Some(selection) = self.named_selection(name) else {
                            bail!(MeshError::InvalidElement(format!(
                                "No selection named '{name}' in this mesh"
                            )));
                        };
                        grouped.extend(K::in_selection(selection).iter().copied());
                    }
                }
                let picked = |i: usize, id: &K| {
                    grouped.contains(id)
                        || fragments.iter().any(|fragment| match fragment {
                            SelectionFragment::Range(r) => r.contains(&(i as u32)),
                            SelectionFragment::Single(s) => *s as usize == i,
                            SelectionFragment::Group(_) => false,
                        })
                };
                Ok(arena
                    .keys()
                    .enumerate()
                    .filter(|(i, id)| picked(*i, id))
                    .map(|(_, id)| id)
                    .collect())
            }
        }
    }

    pub fn resolve_vertices(&self, expression: &SelectionExpression) -> Result<Vec<VertexId>> {
        self.resolve_ids(expression)
    }

    pub fn resolve_halfedges(&self, expression: &SelectionExpression) -> Result<Vec<HalfEdgeId>> {
        self.resolve_ids(expression)
    }

    pub fn resolve_edges(&self, expression: &SelectionExpression) -> Result<Vec<EdgeId>> {
        self.resolve_ids(expression)
    }

    pub fn resolve_faces(&self, expression: &SelectionExpression) -> Result<Vec<FaceId>> {
        self.resolve_ids(expression)
    }

    /// Resolves `expression` into a [`Selection`]. Numeric fragments pick
    /// elements of the given `kind`. `*` and `@group` fragments pick every
    /// kind.
    pub fn resolve_selection(
        &self,
        expression: &SelectionExpression,
        kind: SelectionKind,
    ) -> Result<Selection> {
        let mut selection = match expression {
            SelectionExpression::All => return Ok(Selection::all(self)),
            SelectionExpression::None => return Ok(Selection::new()),
            SelectionExpression::Explicit(fragments) => {
                let mut selection = Selection::new();
                for fragment in fragments {
                    if let SelectionFragment::Group(name) = fragment {
                        let Some(group) = self.named_selection(name) else {
                            bail!(MeshError::InvalidElement(format!(
                                "No selection named '{name}' in this mesh"
                            )));
                        };
                        selection = selection.union(group);
                    }
                }
                selection
            }
        };
        match kind {
            SelectionKind::Vertices => selection.vertices.extend(self.resolve_vertices(expression)?),
            SelectionKind::HalfEdges => selection.halfedges.extend(self.resolve_halfedges(expression)?),
            SelectionKind::Edges => selection.edges.extend(self.resolve_edges(expression)?),
            SelectionKind::Faces => selection.faces.extend(self.resolve_faces(expression)?),
        }
        selection.refresh(self);
        Ok(selection)
    }
}
