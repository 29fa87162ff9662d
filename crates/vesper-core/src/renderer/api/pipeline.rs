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

//! Fixed-function pipeline state.
//!
//! A draw's pipeline is fully determined by the [`PipelineDesc`] (program,
//! vertex layout, blend) plus the dynamic raster inputs the context tracks
//! (depth/stencil, cull mode, winding, primitive group). Backends hash that
//! tuple to find or build a native pipeline object.

pub mod blend;
pub mod depth_stencil;
pub mod state;
pub mod vertex_layout;

pub use self::blend::*;
pub use self::depth_stencil::*;
pub use self::state::*;
pub use self::vertex_layout::*;

use super::program::ProgramState;
use std::sync::Arc;

/// What a draw needs from the pipeline cache besides the dynamic raster state.
#[derive(Debug, Clone)]
pub struct PipelineDesc {
    /// Program plus the uniform values and textures for this draw.
    pub program_state: Arc<ProgramState>,
    /// Layout of the vertex (and optional instance) stream.
    pub vertex_layout: VertexLayoutId,
    /// Blend and color-write state.
    pub blend: BlendDesc,
}

impl PipelineDesc {
    /// Bundles the three parts of a pipeline description.
    pub fn new(
        program_state: Arc<ProgramState>,
        vertex_layout: VertexLayoutId,
        blend: BlendDesc,
    ) -> Self {
        Self {
            program_state,
            vertex_layout,
            blend,
        }
    }
}
