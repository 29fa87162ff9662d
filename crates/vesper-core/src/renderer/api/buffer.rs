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

//! Defines data structures related to GPU buffer resources.

use std::borrow::Cow;

/// What a buffer is bound as. Each type has its own steady resource state in
/// the explicit backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// Vertex stream, bound through [`RenderContext::set_vertex_buffer`](crate::renderer::traits::RenderContext::set_vertex_buffer)
    /// or as an instance stream.
    Vertex,
    /// Index stream.
    Index,
    /// Uniform (constant) data. Capacity is rounded up to the constant-buffer alignment.
    Uniform,
    /// CPU readback destination for pixel transfers.
    PixelPack,
}

/// How often a buffer's content changes, which decides the memory it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// GPU-local memory, updated through staging copies.
    #[default]
    Static,
    /// CPU-writable memory, replicated per frame in flight and written directly.
    Dynamic,
    /// GPU-local memory, written once at creation.
    Immutable,
}

/// A descriptor used to create a [`BufferId`].
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The total size of the buffer in bytes.
    pub size: u64,
    /// The binding type of the buffer.
    pub buffer_type: BufferType,
    /// The update frequency of the buffer.
    pub usage: BufferUsage,
    /// Bytes uploaded at creation. Required for meaningful [`BufferUsage::Immutable`] buffers.
    pub initial_data: Option<Cow<'a, [u8]>>,
    /// Keep a CPU copy of the last full update so the content can be restored
    /// with [`RenderDevice::restore_buffer_default_data`](crate::renderer::traits::RenderDevice::restore_buffer_default_data).
    pub retain_default_data: bool,
}

impl<'a> BufferDescriptor<'a> {
    /// A descriptor with no label, no initial data and no retained copy.
    pub fn new(size: u64, buffer_type: BufferType, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            buffer_type,
            usage,
            initial_data: None,
            retain_default_data: false,
        }
    }

    /// Attaches bytes to upload at creation.
    pub fn with_data(mut self, data: impl Into<Cow<'a, [u8]>>) -> Self {
        self.initial_data = Some(data.into());
        self
    }

    /// Attaches a debug label.
    pub fn with_label(mut self, label: impl Into<Cow<'a, str>>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// An opaque handle to a GPU buffer resource.
///
/// This ID is returned by [`RenderDevice::create_buffer`](crate::renderer::traits::RenderDevice::create_buffer)
/// and is used to reference the buffer in all subsequent operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);
