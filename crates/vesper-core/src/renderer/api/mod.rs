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

//! Backend-agnostic rendering API.
//!
//! Organized into several logical sub-modules:
//!
//! - **[`buffer`]** / **[`texture`]** / **[`sampler`]**: GPU resource handles and
//!   their creation descriptors.
//! - **[`pipeline`]**: fixed-function state (blend, depth/stencil, raster) and
//!   vertex layouts that together key the pipeline cache.
//! - **[`program`]**: shader programs, their reflection data and the per-draw
//!   [`ProgramState`] holding uniforms and texture bindings.
//! - **[`pass`]**: render targets and render-pass descriptions.
//! - **[`common`]**: frame-wide constants, draw enums and device queries.
//! - **[`stats`]**: per-frame counters.

pub mod buffer;
pub mod common;
pub mod pass;
pub mod pipeline;
pub mod program;
pub mod sampler;
pub mod stats;
pub mod surface;
pub mod texture;

pub use self::buffer::*;
pub use self::common::*;
pub use self::pass::*;
pub use self::pipeline::*;
pub use self::program::*;
pub use self::sampler::*;
pub use self::stats::*;
pub use self::surface::*;
pub use self::texture::*;
