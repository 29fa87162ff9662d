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

//! # Vesper Lanes
//!
//! The engine-facing half of the renderer. Scene objects submit
//! [`RenderCommand`](render_lane::RenderCommand)s to a
//! [`Renderer`](render_lane::Renderer) while the scene is visited; at the end
//! of the frame the renderer sorts them, merges compatible triangle commands
//! and drives a [`RenderContext`](vesper_core::renderer::RenderContext).
//!
//! Nothing in this crate names a concrete backend: the renderer receives its
//! device and context as trait objects.

#![warn(missing_docs)]

pub mod render_lane;

pub use render_lane::{
    CommandKind, CustomCommand, GroupCommand, MeshCommand, RenderCommand, RenderCommandType,
    RenderQueue, Renderer, RendererError, Triangles, TrianglesCommand, V3fC4bT2f,
};
