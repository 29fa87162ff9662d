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

use crate::renderer::api::*;
use crate::renderer::error::RenderError;
use std::fmt::Debug;

/// The per-surface frame driver.
///
/// A context moves through `begin_frame`, one or more
/// `begin_render_pass`/`end_render_pass` pairs with draws in between, and
/// `end_frame`. Draws outside a render pass are a caller error.
///
/// Dynamic state (viewport, scissor, stencil reference, cull mode, winding) is
/// applied lazily before the next draw and re-applied at least once per frame.
pub trait RenderContext: Send + Debug {
    /// Starts a frame, waiting for the frame slot about to be reused.
    /// ## Returns
    /// `Ok(false)` if the frame must be skipped, e.g. for a zero-sized surface.
    /// ## Errors
    /// * `RenderError::DeviceLost` - If the device was removed.
    fn begin_frame(&mut self) -> Result<bool, RenderError>;

    /// Begins a pass on `target`, clearing the attachments `desc` asks for.
    fn begin_render_pass(
        &mut self,
        target: RenderTargetId,
        desc: &RenderPassDesc,
    ) -> Result<(), RenderError>;

    /// Stages the depth/stencil state for the next pipeline resolution.
    fn update_depth_stencil_state(&mut self, desc: &DepthStencilDesc);

    /// Resolves and binds the pipeline for the next draws.
    /// ## Returns
    /// `false` if the pipeline could not be resolved; the caller skips the draw.
    fn update_pipeline_state(
        &mut self,
        target: RenderTargetId,
        pipeline: &PipelineDesc,
        primitive: PrimitiveType,
    ) -> bool;

    /// Sets the stencil reference value.
    fn set_stencil_reference(&mut self, value: u32);

    /// Sets the viewport.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Enables or disables the scissor test.
    fn set_scissor_rect(&mut self, enabled: bool, rect: ScissorRect);

    /// Sets the face culling mode.
    fn set_cull_mode(&mut self, mode: CullMode);

    /// Sets the front-face winding.
    fn set_winding(&mut self, winding: Winding);

    /// Binds the vertex buffer used by the next draws.
    fn set_vertex_buffer(&mut self, buffer: BufferId);

    /// Binds the index buffer used by the next indexed draws.
    fn set_index_buffer(&mut self, buffer: BufferId);

    /// Binds the per-instance buffer used by the next instanced draws.
    fn set_instance_buffer(&mut self, buffer: BufferId);

    /// Issues a non-indexed draw.
    fn draw_arrays(&mut self, primitive: PrimitiveType, start: u32, count: u32);

    /// Issues a non-indexed, instanced draw.
    fn draw_arrays_instanced(
        &mut self,
        primitive: PrimitiveType,
        start: u32,
        count: u32,
        instance_count: u32,
    );

    /// Issues an indexed draw. `offset` is in bytes into the index buffer.
    fn draw_elements(
        &mut self,
        primitive: PrimitiveType,
        format: IndexFormat,
        count: u32,
        offset: u64,
    );

    /// Issues an indexed, instanced draw.
    fn draw_elements_instanced(
        &mut self,
        primitive: PrimitiveType,
        format: IndexFormat,
        count: u32,
        offset: u64,
        instance_count: u32,
    );

    /// Ends the current pass.
    fn end_render_pass(&mut self);

    /// Submits the frame, presents and advances the frame slot.
    /// ## Errors
    /// * `RenderError::DeviceLost` - If presenting found the device removed and
    ///   the backend is configured not to abort.
    fn end_frame(&mut self) -> Result<(), RenderError>;

    /// Reads back the color attachment 0 of `target`.
    ///
    /// The callback receives an empty [`PixelBufferDesc`] if the readback fails.
    fn read_pixels(
        &mut self,
        target: RenderTargetId,
        preserve_axis_hint: bool,
        callback: ReadPixelsCallback,
    );

    /// Notifies the context of a new surface size.
    /// ## Returns
    /// `true` if the size changed and the swapchain will be rebuilt.
    fn update_surface(&mut self, width: u32, height: u32) -> bool;

    /// The current surface size.
    fn surface_size(&self) -> (u32, u32);

    /// The last fence value the GPU has completed.
    fn completed_fence_value(&self) -> u64;
}
