// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::mesh::halfedge::TraversalError;

/// Error categories raised by mesh operations. Functions in this crate return
/// [`anyhow::Result`], so callers that need to tell these apart should use
/// `err.downcast_ref::<MeshError>()`.
#[derive(Debug, Error)]
pub enum MeshError {
    /// The operation requires a precondition on the mesh topology (e.g. being
    /// closed) that does not hold. Raised before any mutation.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// An element handed to a container primitive does not belong to it, or
    /// already belongs to some mesh.
    #[error("Invalid element: {0}")]
    InvalidElement(String),

    /// A face of a face list, or an index of a serialized mesh, is unusable.
    #[error("Malformed input at face {face}: {reason}")]
    MalformedInput { face: usize, reason: String },

    /// A structural invariant does not hold.
    #[error("Inconsistent mesh: {0}")]
    Inconsistent(String),

    #[error("Traversal error: {0}")]
    Traversal(#[from] TraversalError),
}

impl MeshError {
    pub fn malformed(face: usize, reason: impl Into<String>) -> Self {
        MeshError::MalformedInput {
            face,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::bail;

    fn fails() -> anyhow::Result<()> {
        bail!(MeshError::InvalidTopology("open mesh".into()))
    }

    #[test]
    fn test_downcast() {
        let err = fails().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MeshError>(),
            Some(MeshError::InvalidTopology(_))
        ));
        assert_eq!(
            MeshError::malformed(3, "too few vertices").to_string(),
            "Malformed input at face 3: too few vertices"
        );
    }
}
