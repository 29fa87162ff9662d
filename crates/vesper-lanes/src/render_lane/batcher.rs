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

//! Merges consecutive triangle commands into as few draws as possible.
//!
//! Queued commands are appended to shared vertex and index arrays, their
//! vertices transformed into world space and their indices rebased onto the
//! shared vertex array. Each contiguous run of batchable commands with the same
//! material becomes one [`TriangleBatch`].
//!
//! Several flushes may land in the same GPU buffer during a frame: the batcher
//! tracks how much of the current buffer earlier flushes used and places new
//! geometry after it, so draws already recorded keep reading their own region.

use std::sync::Arc;

use vesper_core::renderer::PipelineDesc;

use super::command::{TrianglesCommand, V3fC4bT2f, MATERIAL_ID_DO_NOT_BATCH};

/// One native draw covering a run of same-material commands.
#[derive(Debug, Clone)]
pub struct TriangleBatch {
    /// Pipeline of the run's last command.
    pub pipeline: PipelineDesc,
    /// Shared material id, [`MATERIAL_ID_DO_NOT_BATCH`] for isolated commands.
    pub material_id: u32,
    /// First index of the run, counted from the start of the index buffer.
    pub index_offset: u32,
    /// Number of indices in the run.
    pub index_count: u32,
}

/// Geometry produced by [`TriangleBatcher::build`], ready to upload.
#[derive(Debug)]
pub struct BatchedGeometry<'a> {
    /// Where `vertices` goes in the vertex buffer, in bytes.
    pub vertex_byte_offset: u64,
    /// Transformed vertices.
    pub vertices: &'a [V3fC4bT2f],
    /// Where `indices` goes in the index buffer, in bytes.
    pub index_byte_offset: u64,
    /// Rebased indices.
    pub indices: &'a [u16],
    /// Draws to issue, in order.
    pub batches: &'a [TriangleBatch],
}

#[derive(Debug)]
struct QueuedTriangles {
    command: Arc<TrianglesCommand>,
    batchable: bool,
}

/// Accumulates triangle commands between flushes.
#[derive(Debug)]
pub struct TriangleBatcher {
    vertex_capacity: usize,
    index_capacity: usize,
    queued: Vec<QueuedTriangles>,
    queued_vertices: usize,
    queued_indices: usize,
    total_vertices: usize,
    total_indices: usize,
    vertices: Vec<V3fC4bT2f>,
    indices: Vec<u16>,
    batches: Vec<TriangleBatch>,
}

impl TriangleBatcher {
    /// Creates a batcher for buffers holding `vertex_capacity` vertices and
    /// `index_capacity` indices.
    pub fn new(vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            vertex_capacity,
            index_capacity,
            queued: Vec::with_capacity(64),
            queued_vertices: 0,
            queued_indices: 0,
            total_vertices: 0,
            total_indices: 0,
            vertices: Vec::with_capacity(vertex_capacity),
            indices: Vec::with_capacity(index_capacity),
            batches: Vec::new(),
        }
    }

    /// Returns `true` if `command` fits in an empty buffer at all.
    pub fn fits(&self, command: &TrianglesCommand) -> bool {
        command.vertex_count() <= self.vertex_capacity
            && command.index_count() <= self.index_capacity
    }

    /// Returns `true` if queuing `command` would exceed the current buffer.
    pub fn would_overflow(&self, command: &TrianglesCommand) -> bool {
        self.total_vertices + command.vertex_count() > self.vertex_capacity
            || self.total_indices + command.index_count() > self.index_capacity
    }

    /// Queues a command. `skip_batching` keeps it out of any shared draw.
    pub fn push(&mut self, command: Arc<TrianglesCommand>, skip_batching: bool) {
        let batchable = !skip_batching && command.material_id() != MATERIAL_ID_DO_NOT_BATCH;
        self.queued_vertices += command.vertex_count();
        self.queued_indices += command.index_count();
        self.total_vertices += command.vertex_count();
        self.total_indices += command.index_count();
        self.queued.push(QueuedTriangles { command, batchable });
    }

    /// Returns `true` if nothing is waiting for a flush.
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Number of queued commands.
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// Fills the staging arrays from the queued commands and groups them
    /// into draws. Returns `None` when nothing is queued.
    ///
    /// The queue is emptied; the space the geometry occupies in the current
    /// buffer stays reserved until [`next_buffer`](Self::next_buffer) or
    /// [`reset`](Self::reset).
    pub fn build(&mut self) -> Option<BatchedGeometry<'_>> {
        if self.queued.is_empty() {
            return None;
        }

        let vertex_fill_offset = self.total_vertices - self.queued_vertices;
        let index_fill_offset = self.total_indices - self.queued_indices;

        self.vertices.clear();
        self.indices.clear();
        self.batches.clear();

        let mut run: Option<u32> = None;
        for entry in self.queued.drain(..) {
            let command = &entry.command;
            let base = vertex_fill_offset + self.vertices.len();
            let model_view = command.model_view();

            self.vertices.extend(command.vertices().iter().map(|v| V3fC4bT2f {
                position: model_view.transform_point3(v.position),
                ..*v
            }));
            // Capacity is at most 65536 vertices, so rebased indices fit in u16.
            self.indices
                .extend(command.indices().iter().map(|&i| (base + i as usize) as u16));

            let material_id = command.material_id();
            let index_count = command.index_count() as u32;
            match self.batches.last_mut() {
                Some(batch) if entry.batchable && run == Some(material_id) => {
                    batch.index_count += index_count;
                    batch.pipeline = command.pipeline().clone();
                }
                last => {
                    let index_offset = last
                        .map(|b| b.index_offset + b.index_count)
                        .unwrap_or(index_fill_offset as u32);
                    self.batches.push(TriangleBatch {
                        pipeline: command.pipeline().clone(),
                        material_id: if entry.batchable {
                            material_id
                        } else {
                            MATERIAL_ID_DO_NOT_BATCH
                        },
                        index_offset,
                        index_count,
                    });
                    run = entry.batchable.then_some(material_id);
                }
            }
        }

        self.queued_vertices = 0;
        self.queued_indices = 0;

        let vertex_size = std::mem::size_of::<V3fC4bT2f>() as u64;
        let index_size = std::mem::size_of::<u16>() as u64;
        Some(BatchedGeometry {
            vertex_byte_offset: vertex_fill_offset as u64 * vertex_size,
            vertices: &self.vertices,
            index_byte_offset: index_fill_offset as u64 * index_size,
            indices: &self.indices,
            batches: &self.batches,
        })
    }

    /// The draws produced by the last [`build`](Self::build).
    pub fn batches(&self) -> &[TriangleBatch] {
        &self.batches
    }

    /// Drops queued commands without drawing them. Space used by earlier
    /// flushes stays reserved.
    pub fn discard_queued(&mut self) {
        self.total_vertices -= self.queued_vertices;
        self.total_indices -= self.queued_indices;
        self.queued_vertices = 0;
        self.queued_indices = 0;
        self.queued.clear();
    }

    /// Starts filling a fresh buffer from offset zero.
    pub fn next_buffer(&mut self) {
        debug_assert!(self.queued.is_empty());
        self.total_vertices = 0;
        self.total_indices = 0;
    }

    /// Drops queued commands and forgets buffer usage, at frame end.
    pub fn reset(&mut self) {
        self.queued.clear();
        self.queued_vertices = 0;
        self.queued_indices = 0;
        self.total_vertices = 0;
        self.total_indices = 0;
    }
}
