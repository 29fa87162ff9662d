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

//! Renderer configuration.
//!
//! A [`RendererConfig`] is usually deserialized from a small RON file by the
//! host application. Every field has a default, so a partial file (or none at
//! all) yields a usable configuration. Call [`RendererConfig::validated`]
//! before handing the values to a backend.

use crate::renderer::api::{MAX_FRAMES_IN_FLIGHT, MAX_SAMPLER_COUNT};
use serde::{Deserialize, Serialize};

/// Smallest upload ring the backend accepts.
pub const MIN_UPLOAD_RING_SIZE: u64 = 8 * 1024 * 1024;

/// Tunables of the renderer and its backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Frames the CPU may record ahead of the GPU.
    pub max_frames_in_flight: usize,
    /// Number of swapchain back buffers.
    pub swapchain_buffer_count: u32,
    /// Waits for vertical blank when presenting.
    pub vsync: bool,
    /// Size in bytes of each frame's uniform ring.
    pub uniform_ring_size: u64,
    /// Alignment of uniform ring slices. Must be a power of two.
    pub uniform_alignment: u64,
    /// Size in bytes of the shared upload ring.
    pub upload_ring_size: u64,
    /// Draw calls budgeted per frame, sizing the shader-visible heaps.
    pub max_draw_calls: u32,
    /// Texture slots budgeted per draw call.
    pub max_texture_units: u32,
    /// Capacity of the CPU-only shader-resource heap.
    pub srv_heap_capacity: u32,
    /// Capacity of the sampler registry and its heap.
    pub sampler_heap_capacity: u32,
    /// Capacity of the render-target-view heap.
    pub rtv_heap_capacity: u32,
    /// Capacity of the depth-stencil-view heap.
    pub dsv_heap_capacity: u32,
    /// Vertices per batching vertex buffer.
    pub vbo_size: u32,
    /// Indices per batching index buffer.
    pub index_vbo_size: u32,
    /// Compiles shaders with shader model 6 profiles.
    pub use_dxc: bool,
    /// Aborts the process when the device is removed during present.
    pub abort_on_device_removed: bool,
    /// Renders the global-Z 0 bucket with depth test and write on.
    pub depth_test_for_2d: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_frames_in_flight: MAX_FRAMES_IN_FLIGHT,
            swapchain_buffer_count: 3,
            vsync: true,
            uniform_ring_size: 1024 * 1024,
            uniform_alignment: 256,
            upload_ring_size: MIN_UPLOAD_RING_SIZE,
            max_draw_calls: 2000,
            max_texture_units: 128,
            srv_heap_capacity: 8192,
            sampler_heap_capacity: MAX_SAMPLER_COUNT as u32,
            rtv_heap_capacity: 1024,
            dsv_heap_capacity: 512,
            vbo_size: 65536,
            index_vbo_size: 65536 * 3 / 2,
            use_dxc: false,
            abort_on_device_removed: true,
            depth_test_for_2d: false,
        }
    }
}

impl RendererConfig {
    /// Returns a copy with out-of-range values clamped, logging each clamp.
    pub fn validated(mut self) -> Self {
        if self.max_frames_in_flight == 0 {
            log::warn!("max_frames_in_flight must be at least 1, using 1");
            self.max_frames_in_flight = 1;
        }
        if self.swapchain_buffer_count < 2 {
            log::warn!(
                "swapchain_buffer_count {} is below 2, using 2",
                self.swapchain_buffer_count
            );
            self.swapchain_buffer_count = 2;
        }
        if self.upload_ring_size < MIN_UPLOAD_RING_SIZE {
            log::warn!(
                "upload_ring_size {} is below the {} byte minimum",
                self.upload_ring_size,
                MIN_UPLOAD_RING_SIZE
            );
            self.upload_ring_size = MIN_UPLOAD_RING_SIZE;
        }
        if !self.uniform_alignment.is_power_of_two() || self.uniform_alignment < 256 {
            log::warn!(
                "uniform_alignment {} is not a power of two >= 256, using 256",
                self.uniform_alignment
            );
            self.uniform_alignment = 256;
        }
        if self.uniform_ring_size < self.uniform_alignment {
            log::warn!("uniform_ring_size {} is too small", self.uniform_ring_size);
            self.uniform_ring_size = 1024 * 1024;
        }
        if self.sampler_heap_capacity == 0 {
            log::warn!("sampler_heap_capacity must be positive, using {MAX_SAMPLER_COUNT}");
            self.sampler_heap_capacity = MAX_SAMPLER_COUNT as u32;
        }
        // 16-bit indices address at most 65536 vertices per buffer.
        if self.vbo_size == 0 || self.vbo_size > 65536 {
            log::warn!("vbo_size {} is out of range, using 65536", self.vbo_size);
            self.vbo_size = 65536;
        }
        if self.index_vbo_size == 0 {
            log::warn!("index_vbo_size must be positive, using {}", self.vbo_size * 3 / 2);
            self.index_vbo_size = self.vbo_size * 3 / 2;
        }
        self
    }

    /// Shader-visible resource descriptors needed per frame.
    pub fn srv_descriptors_per_frame(&self) -> u32 {
        self.max_draw_calls * self.max_texture_units
    }
}
