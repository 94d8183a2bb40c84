// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Some useful re-exports
pub mod prelude;

/// The error taxonomy shared by every mesh operation
pub mod error;

/// The halfedge graph data structure and its topological transforms
pub mod mesh;

/// Chains of transforms described by a configuration file
pub mod pipeline;
