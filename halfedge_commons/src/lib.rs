// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Small geometric helpers: hashable vectors and planes.
pub mod math;

/// Iterator and collection extensions used across the kernel.
pub mod utils;
