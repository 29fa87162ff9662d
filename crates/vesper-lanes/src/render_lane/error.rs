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

//! Errors reported by the [`Renderer`](super::Renderer).

use thiserror::Error;
use vesper_core::renderer::{RenderError, ResourceError};

/// A failure of the command-queue layer, or of the backend underneath it.
#[derive(Debug, Error)]
pub enum RendererError {
    /// The queue id was never returned by `create_render_queue`.
    #[error("render queue {0} does not exist")]
    QueueNotFound(usize),
    /// Commands and group changes are frozen while `render` walks the queues.
    #[error("cannot add commands or change groups while rendering")]
    AddWhileRendering,
    /// `pop_group` was called with only the default queue on the stack.
    #[error("group stack underflow: the default queue cannot be popped")]
    GroupStackUnderflow,
    /// A buffer of the triangle pool could not be created or written.
    #[error("triangle buffer error: {0}")]
    Resource(#[from] ResourceError),
    /// The frame driver failed.
    #[error(transparent)]
    Render(#[from] RenderError),
}
