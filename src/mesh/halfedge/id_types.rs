// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

slotmap::new_key_type! { pub struct VertexId; }
slotmap::new_key_type! { pub struct HalfEdgeId; }
slotmap::new_key_type! { pub struct EdgeId; }
slotmap::new_key_type! { pub struct FaceId; }
