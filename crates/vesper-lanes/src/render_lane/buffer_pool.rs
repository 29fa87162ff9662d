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

//! The pool of dynamic vertex/index buffer pairs used by triangle batching.
//!
//! When a batch would overflow the current pair, the renderer moves on to the
//! next pair instead of growing the buffers, so GPU allocations stay bounded.
//! Every pair is reused from the first one at the start of the next frame.

use log::debug;
use vesper_core::renderer::{
    BufferDescriptor, BufferId, BufferType, BufferUsage, RenderDevice, ResourceError,
};

use super::command::V3fC4bT2f;

/// Dynamic vertex and index buffers, handed out pair by pair.
#[derive(Debug)]
pub struct TriangleBufferPool {
    vertex_buffers: Vec<BufferId>,
    index_buffers: Vec<BufferId>,
    current: usize,
    vertex_buffer_size: u64,
    index_buffer_size: u64,
}

impl TriangleBufferPool {
    /// Creates the pool with its first pair, sized for `vbo_size` vertices and
    /// `index_vbo_size` 16-bit indices.
    pub fn new(
        device: &dyn RenderDevice,
        vbo_size: u32,
        index_vbo_size: u32,
    ) -> Result<Self, ResourceError> {
        let mut pool = Self {
            vertex_buffers: Vec::new(),
            index_buffers: Vec::new(),
            current: 0,
            vertex_buffer_size: u64::from(vbo_size) * u64::from(V3fC4bT2f::STRIDE),
            index_buffer_size: u64::from(index_vbo_size) * 2,
        };
        pool.create_pair(device)?;
        Ok(pool)
    }

    fn create_pair(&mut self, device: &dyn RenderDevice) -> Result<(), ResourceError> {
        let vertex = device.create_buffer(
            &BufferDescriptor::new(self.vertex_buffer_size, BufferType::Vertex, BufferUsage::Dynamic)
                .with_label("batched vertices"),
        )?;
        let index = match device.create_buffer(
            &BufferDescriptor::new(self.index_buffer_size, BufferType::Index, BufferUsage::Dynamic)
                .with_label("batched indices"),
        ) {
            Ok(index) => index,
            Err(err) => {
                // Keep the pool made of complete pairs.
                let _ = device.destroy_buffer(vertex);
                return Err(err);
            }
        };
        self.vertex_buffers.push(vertex);
        self.index_buffers.push(index);
        debug!(
            "Triangle buffer pool grew to {} pairs",
            self.vertex_buffers.len()
        );
        Ok(())
    }

    /// Moves on to the next pair, creating it if every pair is in use.
    pub fn prepare_next_buffer(&mut self, device: &dyn RenderDevice) -> Result<(), ResourceError> {
        if self.current + 1 >= self.vertex_buffers.len() {
            self.create_pair(device)?;
        }
        self.current += 1;
        Ok(())
    }

    /// Rewinds to the first pair.
    pub fn putback_all_buffers(&mut self) {
        self.current = 0;
    }

    /// The vertex buffer of the current pair.
    pub fn vertex_buffer(&self) -> BufferId {
        self.vertex_buffers[self.current]
    }

    /// The index buffer of the current pair.
    pub fn index_buffer(&self) -> BufferId {
        self.index_buffers[self.current]
    }

    /// Number of pairs created so far.
    pub fn len(&self) -> usize {
        self.vertex_buffers.len()
    }

    /// Always `false`: the pool starts with one pair.
    pub fn is_empty(&self) -> bool {
        self.vertex_buffers.is_empty()
    }

    /// Index of the current pair.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Queues every buffer of the pool for destruction.
    pub fn release(&mut self, device: &dyn RenderDevice) {
        for id in self.vertex_buffers.drain(..).chain(self.index_buffers.drain(..)) {
            if let Err(err) = device.destroy_buffer(id) {
                log::warn!("Failed to release triangle buffer {id:?}: {err}");
            }
        }
        self.current = 0;
    }
}
