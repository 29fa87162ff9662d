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

//! Frame-wide constants and small enums shared by every backend.

use serde::{Deserialize, Serialize};

/// Default number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Number of color attachments a render target can bind at once.
pub const MAX_COLOR_ATTACHMENT: usize = 4;

/// Default capacity of the interned sampler registry.
pub const MAX_SAMPLER_COUNT: usize = 256;

/// The integer width of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexFormat {
    /// 16-bit unsigned indices.
    U16,
    /// 32-bit unsigned indices.
    U32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub const fn size_bytes(self) -> u32 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// How a custom draw consumes its buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawType {
    /// Non-indexed draw.
    Array,
    /// Non-indexed, instanced draw.
    ArrayInstanced,
    /// Indexed draw.
    #[default]
    Element,
    /// Indexed, instanced draw.
    ElementInstanced,
}

/// Optional device capabilities that callers may query before relying on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// BC1-BC3 block compression.
    S3tc,
    /// ASTC block compression.
    Astc,
    /// BGRA8 color textures.
    Bgra8,
    /// 24-bit depth attachments.
    Depth24,
    /// Combined depth/stencil formats.
    PackedDepthStencil,
    /// Vertex array objects (always available on modern APIs).
    VertexArrayObject,
    /// Separate vertex attribute binding (always available on modern APIs).
    VertexAttribBinding,
}

/// Human-readable identification of the active adapter and API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// The adapter vendor, e.g. `"NVIDIA"`.
    pub vendor: String,
    /// The adapter name.
    pub renderer: String,
    /// The graphics API and its version, e.g. `"Direct3D 12.0"`.
    pub version: String,
    /// The shading language accepted by [`RenderDevice::compile_shader`](crate::renderer::traits::RenderDevice::compile_shader).
    pub shading_language_version: String,
}
