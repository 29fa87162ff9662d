// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-frame counters.

use serde::{Deserialize, Serialize};

/// Counters accumulated while a frame is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderStats {
    /// Index of the frame these counters belong to.
    pub frame_number: u64,
    /// Number of triangle batches submitted.
    pub drawn_batches: u32,
    /// Vertices (or indices, for indexed draws) submitted.
    pub drawn_vertices: u32,
    /// Native draw calls issued, batched or not.
    pub draw_calls: u32,
}

impl RenderStats {
    /// Zeroes the draw counters, keeping the frame number.
    pub fn reset_counters(&mut self) {
        self.drawn_batches = 0;
        self.drawn_vertices = 0;
        self.draw_calls = 0;
    }
}
