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

//! Defines the core architectural traits for the rendering subsystem.
//!
//! This module contains the two contracts that decouple the engine's renderer
//! from any specific graphics backend.
//!
//! - [`RenderDevice`]: the factory for GPU resources (buffers, textures, render
//!   targets, programs, vertex layouts, samplers). Shared across threads.
//! - [`RenderContext`]: the per-window frame driver that records passes and draws.
//!   Owned by the single render thread.

mod render_context;
mod render_device;

pub use self::render_context::RenderContext;
pub use self::render_device::RenderDevice;
