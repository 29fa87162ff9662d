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

//! The engine-facing renderer: queues commands during the scene visit and
//! turns them into backend draws when the frame is rendered.

use std::sync::Arc;

use log::{debug, error, info, trace, warn};
use vesper_core::math::Color4F;
use vesper_core::renderer::{
    CompareFunc, CullMode, DepthStencilDesc, DepthStencilFlags, DrawType, IndexFormat,
    PrimitiveType, ReadPixelsCallback, RenderContext, RenderDevice, RenderPassDesc,
    RenderStats, RenderTargetId, ScissorRect, StencilOp, TargetBufferFlags, Viewport, Winding,
};
use vesper_core::RendererConfig;

use super::batcher::TriangleBatcher;
use super::buffer_pool::TriangleBufferPool;
use super::command::{
    CommandKind, CustomCommand, GroupCommand, RenderCallback, RenderCommand, TrianglesCommand,
};
use super::error::RendererError;
use super::queue::{QueueGroup, RenderQueue};

/// The queue commands go to when no group is pushed. Rendering starts there.
pub const DEFAULT_RENDER_QUEUE: usize = 0;

/// Scissor test switch and rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScissorState {
    /// Whether the scissor test is on.
    pub enabled: bool,
    /// The scissor rectangle.
    pub rect: ScissorRect,
}

/// Raster state saved around each queue section.
#[derive(Debug, Clone, Copy)]
struct StateBlock {
    depth_test: bool,
    depth_write: bool,
    cull_mode: CullMode,
}

/// Collects [`RenderCommand`]s for a frame, sorts them and draws them through a
/// [`RenderContext`].
///
/// A frame looks like:
///
/// ```ignore
/// if renderer.begin_frame()? {
///     renderer.clear(TargetBufferFlags::ALL, Color4F::BLACK, 1.0, 0, f32::MIN)?;
///     renderer.add_command(RenderCommand::triangles(sprite, 0.0))?;
///     renderer.render()?;
///     renderer.end_frame()?;
/// }
/// ```
///
/// Queue 0 is drawn section by section: negative global order first, then
/// opaque 3D with depth test, depth write and back-face culling, then
/// transparent 3D without depth write, then 2D, then positive global order.
/// Raster state is saved and restored around every queue and around the 3D
/// sections, so a nested group starts from the same defaults and cannot leak
/// its state into its siblings.
#[derive(Debug)]
pub struct Renderer {
    device: Arc<dyn RenderDevice>,
    context: Box<dyn RenderContext>,

    queues: Vec<RenderQueue>,
    group_stack: Vec<usize>,
    group_pool: Vec<GroupCommand>,
    is_rendering: bool,

    batcher: TriangleBatcher,
    buffers: TriangleBufferPool,

    depth_stencil: DepthStencilDesc,
    stencil_reference: u32,
    cull_mode: CullMode,
    winding: Winding,
    viewport: Viewport,
    scissor: ScissorState,
    state_blocks: Vec<StateBlock>,
    depth_test_for_2d: bool,

    current_target: RenderTargetId,
    render_pass: RenderPassDesc,
    clear_flags: TargetBufferFlags,
    clear_color: Color4F,

    stats: RenderStats,
}

impl Renderer {
    /// Creates a renderer drawing through `context`, with triangle buffers
    /// allocated from `device`.
    ///
    /// ## Errors
    /// * `RendererError::Resource` - If the first vertex/index buffer pair cannot be created.
    pub fn new(
        device: Arc<dyn RenderDevice>,
        context: Box<dyn RenderContext>,
        config: &RendererConfig,
    ) -> Result<Self, RendererError> {
        let config = config.clone().validated();
        let buffers =
            TriangleBufferPool::new(device.as_ref(), config.vbo_size, config.index_vbo_size)?;
        let (width, height) = context.surface_size();

        info!(
            "Renderer ready: {} vertices / {} indices per batch buffer, surface {}x{}",
            config.vbo_size, config.index_vbo_size, width, height
        );

        Ok(Self {
            device,
            context,
            queues: vec![RenderQueue::new()],
            group_stack: vec![DEFAULT_RENDER_QUEUE],
            group_pool: Vec::new(),
            is_rendering: false,
            batcher: TriangleBatcher::new(
                config.vbo_size as usize,
                config.index_vbo_size as usize,
            ),
            buffers,
            depth_stencil: DepthStencilDesc::default(),
            stencil_reference: 0,
            cull_mode: CullMode::None,
            winding: Winding::CounterClockwise,
            viewport: Viewport {
                x: 0,
                y: 0,
                width,
                height,
            },
            scissor: ScissorState::default(),
            state_blocks: Vec::new(),
            depth_test_for_2d: config.depth_test_for_2d,
            current_target: RenderTargetId::DEFAULT,
            render_pass: RenderPassDesc::default(),
            clear_flags: TargetBufferFlags::EMPTY,
            clear_color: Color4F::TRANSPARENT,
            stats: RenderStats::default(),
        })
    }

    // --- Command submission ---

    /// Adds a command to the queue on top of the group stack.
    ///
    /// ## Errors
    /// * `RendererError::AddWhileRendering` - If called from inside [`render`](Self::render).
    pub fn add_command(&mut self, command: RenderCommand) -> Result<(), RendererError> {
        let queue_id = self
            .group_stack
            .last()
            .copied()
            .unwrap_or(DEFAULT_RENDER_QUEUE);
        self.add_command_to(command, queue_id)
    }

    /// Adds a command to a specific queue.
    ///
    /// ## Errors
    /// * `RendererError::AddWhileRendering` - If called from inside [`render`](Self::render).
    /// * `RendererError::QueueNotFound` - If `queue_id` was never created.
    pub fn add_command_to(
        &mut self,
        command: RenderCommand,
        queue_id: usize,
    ) -> Result<(), RendererError> {
        if self.is_rendering {
            warn!(
                "Rejected a {:?} command submitted while rendering",
                command.command_type()
            );
            return Err(RendererError::AddWhileRendering);
        }
        let queue = self
            .queues
            .get_mut(queue_id)
            .ok_or(RendererError::QueueNotFound(queue_id))?;
        queue.push(command);
        Ok(())
    }

    /// Runs `callback` on the render thread at `global_order`.
    pub fn add_callback_command(
        &mut self,
        callback: RenderCallback,
        global_order: f32,
    ) -> Result<(), RendererError> {
        self.add_command(RenderCommand::callback(callback, global_order))
    }

    /// Hands out a group command with its own queue, recycled from a previous
    /// frame when possible.
    pub fn get_next_group_command(&mut self) -> GroupCommand {
        match self.group_pool.pop() {
            Some(group) => group,
            None => GroupCommand::new(self.create_render_queue()),
        }
    }

    /// Redirects subsequent [`add_command`](Self::add_command) calls to `queue_id`.
    pub fn push_group(&mut self, queue_id: usize) -> Result<(), RendererError> {
        if self.is_rendering {
            return Err(RendererError::AddWhileRendering);
        }
        if queue_id >= self.queues.len() {
            return Err(RendererError::QueueNotFound(queue_id));
        }
        self.group_stack.push(queue_id);
        Ok(())
    }

    /// Restores the queue that was current before the last [`push_group`](Self::push_group).
    pub fn pop_group(&mut self) -> Result<(), RendererError> {
        if self.is_rendering {
            return Err(RendererError::AddWhileRendering);
        }
        if self.group_stack.len() <= 1 {
            return Err(RendererError::GroupStackUnderflow);
        }
        self.group_stack.pop();
        Ok(())
    }

    /// Creates an empty queue and returns its id.
    pub fn create_render_queue(&mut self) -> usize {
        self.queues.push(RenderQueue::new());
        self.queues.len() - 1
    }

    /// The queue commands currently go to.
    pub fn current_queue(&self) -> usize {
        self.group_stack
            .last()
            .copied()
            .unwrap_or(DEFAULT_RENDER_QUEUE)
    }

    /// Number of commands waiting in `queue_id`.
    pub fn queued_command_count(&self, queue_id: usize) -> Option<usize> {
        self.queues.get(queue_id).map(RenderQueue::len)
    }

    /// Queues a clear of the current render target at `global_order`.
    ///
    /// Planes not named in `flags` are marked as discardable instead.
    pub fn clear(
        &mut self,
        flags: TargetBufferFlags,
        color: Color4F,
        depth: f32,
        stencil: u8,
        global_order: f32,
    ) -> Result<(), RendererError> {
        self.clear_flags = flags;
        self.add_callback_command(
            Box::new(move |renderer: &mut Renderer| {
                renderer.clear_current_target(flags, color, depth, stencil)
            }),
            global_order,
        )
    }

    fn clear_current_target(
        &mut self,
        flags: TargetBufferFlags,
        color: Color4F,
        depth: f32,
        stencil: u8,
    ) -> Result<(), RendererError> {
        let mut desc = RenderPassDesc::default();
        desc.flags.clear = flags;
        if flags.intersects(TargetBufferFlags::ALL_COLOR) {
            self.clear_color = color;
            desc.clear_color = color.to_array();
        }
        if flags.contains(TargetBufferFlags::DEPTH) {
            desc.clear_depth = depth;
        } else {
            desc.flags.discard_start |= TargetBufferFlags::DEPTH;
        }
        if flags.contains(TargetBufferFlags::STENCIL) {
            desc.clear_stencil = stencil;
        } else {
            desc.flags.discard_start |= TargetBufferFlags::STENCIL;
        }

        trace!("Clearing {:?} of {:?}", flags, self.current_target);
        self.context.begin_render_pass(self.current_target, &desc)?;
        self.context.end_render_pass();
        Ok(())
    }

    // --- Frame ---

    /// Starts a frame.
    ///
    /// ## Returns
    /// `Ok(false)` if the frame must be skipped, e.g. while the surface has no area.
    pub fn begin_frame(&mut self) -> Result<bool, RendererError> {
        self.stats.reset_counters();
        Ok(self.context.begin_frame()?)
    }

    /// Sorts every queue and draws queue 0, recursing into groups.
    ///
    /// Queues are emptied afterwards, even when drawing failed part-way.
    pub fn render(&mut self) -> Result<(), RendererError> {
        self.is_rendering = true;
        for queue in &mut self.queues {
            queue.sort();
        }

        let result = self.visit_render_queue(DEFAULT_RENDER_QUEUE);

        for queue in &mut self.queues {
            queue.clear();
        }
        self.batcher.discard_queued();
        self.is_rendering = false;

        if let Err(err) = &result {
            error!("Frame {} failed to render: {err}", self.stats.frame_number);
        }
        result
    }

    /// Submits and presents the frame, then rewinds the triangle buffers.
    pub fn end_frame(&mut self) -> Result<(), RendererError> {
        let result = self.context.end_frame();

        self.buffers.putback_all_buffers();
        self.batcher.reset();
        debug!(
            "Frame {}: {} batches, {} draw calls, {} vertices",
            self.stats.frame_number,
            self.stats.drawn_batches,
            self.stats.draw_calls,
            self.stats.drawn_vertices
        );
        self.stats.frame_number += 1;

        Ok(result?)
    }

    fn visit_render_queue(&mut self, queue_id: usize) -> Result<(), RendererError> {
        let mut queue = match self.queues.get_mut(queue_id) {
            Some(queue) => std::mem::take(queue),
            None => return Err(RendererError::QueueNotFound(queue_id)),
        };

        self.push_state_block();
        self.set_depth_test(false);
        self.set_depth_write(false);
        self.set_cull_mode(CullMode::None);

        let result = self.visit_sections(&mut queue);

        self.pop_state_block();
        queue.clear();
        self.queues[queue_id] = queue;
        result
    }

    fn visit_sections(&mut self, queue: &mut RenderQueue) -> Result<(), RendererError> {
        self.visit_bucket(queue, QueueGroup::NegativeZ)?;

        self.push_state_block();
        self.set_depth_test(true);
        self.set_depth_write(true);
        self.set_cull_mode(CullMode::Back);
        let result = self
            .visit_bucket(queue, QueueGroup::Opaque3D)
            .and_then(|()| {
                self.set_depth_write(false);
                self.visit_bucket(queue, QueueGroup::Transparent3D)
            });
        self.pop_state_block();
        result?;

        if self.depth_test_for_2d {
            self.push_state_block();
            self.set_depth_test(true);
            self.set_depth_write(true);
            let result = self.visit_bucket(queue, QueueGroup::ZeroZ);
            self.pop_state_block();
            result?;
        } else {
            self.visit_bucket(queue, QueueGroup::ZeroZ)?;
        }
        self.visit_bucket(queue, QueueGroup::PositiveZ)
    }

    fn visit_bucket(
        &mut self,
        queue: &mut RenderQueue,
        group: QueueGroup,
    ) -> Result<(), RendererError> {
        let mut bucket = queue.take_bucket(group);
        let result = bucket
            .drain(..)
            .try_for_each(|command| self.process_render_command(command))
            .and_then(|()| self.flush());
        queue.restore_bucket(group, bucket);
        result
    }

    fn process_render_command(&mut self, command: RenderCommand) -> Result<(), RendererError> {
        let skip_batching = command.is_skip_batching();
        match command.into_kind() {
            CommandKind::Triangles(triangles) => self.queue_triangles(triangles, skip_batching),
            CommandKind::Mesh(mesh) => {
                self.flush()?;
                self.draw_custom_command(&mesh)
            }
            CommandKind::Custom(custom) => {
                self.flush()?;
                self.draw_custom_command(&custom)
            }
            CommandKind::Group(group) => {
                self.flush()?;
                let result = self.visit_render_queue(group.queue_id());
                self.group_pool.push(group);
                result
            }
            CommandKind::Callback(callback) => {
                self.flush()?;
                callback(self)
            }
        }
    }

    fn queue_triangles(
        &mut self,
        triangles: Arc<TrianglesCommand>,
        skip_batching: bool,
    ) -> Result<(), RendererError> {
        if !self.batcher.fits(&triangles) {
            error!(
                "Triangles command with {} vertices and {} indices exceeds the batch buffers, \
                 submit it as a custom command instead",
                triangles.vertex_count(),
                triangles.index_count()
            );
            return Ok(());
        }

        if self.batcher.would_overflow(&triangles) {
            self.flush()?;
            self.buffers.prepare_next_buffer(self.device.as_ref())?;
            self.batcher.next_buffer();
            trace!(
                "Batch buffers full, moved to pair {}",
                self.buffers.current_index()
            );
        }

        self.batcher.push(triangles, skip_batching);
        Ok(())
    }

    /// Draws every pending triangle batch.
    fn flush(&mut self) -> Result<(), RendererError> {
        let vertex_buffer = self.buffers.vertex_buffer();
        let index_buffer = self.buffers.index_buffer();

        match self.batcher.build() {
            Some(geometry) => {
                self.device.update_buffer_sub_data(
                    vertex_buffer,
                    geometry.vertex_byte_offset,
                    bytemuck::cast_slice(geometry.vertices),
                )?;
                self.device.update_buffer_sub_data(
                    index_buffer,
                    geometry.index_byte_offset,
                    bytemuck::cast_slice(geometry.indices),
                )?;
            }
            None => return Ok(()),
        }

        self.begin_render_pass()?;
        self.context.set_vertex_buffer(vertex_buffer);
        self.context.set_index_buffer(index_buffer);

        let target = self.current_target;
        for batch in self.batcher.batches() {
            if !self
                .context
                .update_pipeline_state(target, &batch.pipeline, PrimitiveType::Triangle)
            {
                debug!("Skipping a batch of {} indices without pipeline", batch.index_count);
                continue;
            }
            self.context.draw_elements(
                PrimitiveType::Triangle,
                IndexFormat::U16,
                batch.index_count,
                u64::from(batch.index_offset) * 2,
            );
            self.stats.drawn_batches += 1;
            self.stats.draw_calls += 1;
            self.stats.drawn_vertices += batch.index_count;
        }

        self.context.end_render_pass();
        Ok(())
    }

    fn draw_custom_command(&mut self, command: &CustomCommand) -> Result<(), RendererError> {
        command.run_before();
        self.begin_render_pass()?;

        self.context.set_vertex_buffer(command.vertex_buffer());
        let primitive = command.primitive();
        if self
            .context
            .update_pipeline_state(self.current_target, command.pipeline(), primitive)
        {
            self.record_custom_draw(command);
        } else {
            debug!("Skipping a {:?} draw without pipeline", command.draw_type());
        }

        self.context.end_render_pass();
        command.run_after();
        Ok(())
    }

    fn record_custom_draw(&mut self, command: &CustomCommand) {
        let primitive = command.primitive();
        let (start, vertex_count) = command.vertex_range();
        let (offset, index_count) = command.index_range();
        let instances = command.instance_count();
        if let Some(buffer) = command.instance_buffer() {
            self.context.set_instance_buffer(buffer);
        }

        let drawn = match (command.draw_type(), command.index_buffer()) {
            (DrawType::Element, Some(indices)) => {
                self.context.set_index_buffer(indices);
                self.context
                    .draw_elements(primitive, command.index_format(), index_count, offset);
                index_count
            }
            (DrawType::ElementInstanced, Some(indices)) => {
                self.context.set_index_buffer(indices);
                self.context.draw_elements_instanced(
                    primitive,
                    command.index_format(),
                    index_count,
                    offset,
                    instances,
                );
                index_count * instances
            }
            (DrawType::Array, _) => {
                self.context.draw_arrays(primitive, start, vertex_count);
                vertex_count
            }
            (DrawType::ArrayInstanced, _) => {
                self.context
                    .draw_arrays_instanced(primitive, start, vertex_count, instances);
                vertex_count * instances
            }
            (draw_type, None) => {
                warn!("{draw_type:?} draw without an index buffer skipped");
                return;
            }
        };

        self.stats.drawn_batches += 1;
        self.stats.draw_calls += 1;
        self.stats.drawn_vertices += drawn;
    }

    fn begin_render_pass(&mut self) -> Result<(), RendererError> {
        self.context
            .begin_render_pass(self.current_target, &self.render_pass)?;

        // Targets without a depth/stencil attachment cannot run either test.
        let mut depth_stencil = self.depth_stencil;
        if !self.current_target.is_default() {
            let has_depth = self
                .device
                .render_target_attachments(self.current_target)
                .is_some_and(|attachments| attachments.depth_stencil.is_some());
            if !has_depth {
                depth_stencil.flags.remove(DepthStencilFlags::ALL);
            }
        }

        self.context.set_stencil_reference(self.stencil_reference);
        self.context.update_depth_stencil_state(&depth_stencil);
        self.context.set_viewport(self.viewport);
        self.context.set_cull_mode(self.cull_mode);
        self.context.set_winding(self.winding);
        self.context
            .set_scissor_rect(self.scissor.enabled, self.scissor.rect);
        Ok(())
    }

    fn push_state_block(&mut self) {
        self.state_blocks.push(StateBlock {
            depth_test: self.depth_test(),
            depth_write: self.depth_write(),
            cull_mode: self.cull_mode,
        });
    }

    fn pop_state_block(&mut self) {
        if let Some(block) = self.state_blocks.pop() {
            self.set_depth_test(block.depth_test);
            self.set_depth_write(block.depth_write);
            self.cull_mode = block.cull_mode;
        }
    }

    // --- Render target and pixels ---

    /// Directs subsequent passes to `target`.
    pub fn set_render_target(&mut self, target: RenderTargetId) {
        self.current_target = target;
    }

    /// The target passes currently draw into.
    pub fn render_target(&self) -> RenderTargetId {
        self.current_target
    }

    /// The attachments named by the last [`clear`](Self::clear).
    pub fn clear_flags(&self) -> TargetBufferFlags {
        self.clear_flags
    }

    /// The color used by the last executed color clear.
    pub fn clear_color(&self) -> Color4F {
        self.clear_color
    }

    /// Reads back color attachment 0 of `target`; see [`RenderContext::read_pixels`].
    pub fn read_pixels(
        &mut self,
        target: RenderTargetId,
        preserve_axis_hint: bool,
        callback: ReadPixelsCallback,
    ) {
        self.context
            .read_pixels(target, preserve_axis_hint, callback);
    }

    /// Forwards a new surface size. When it changed, the viewport is reset to
    /// cover the whole surface.
    pub fn update_surface(&mut self, width: u32, height: u32) -> bool {
        let changed = self.context.update_surface(width, height);
        if changed {
            self.viewport = Viewport {
                x: 0,
                y: 0,
                width,
                height,
            };
        }
        changed
    }

    /// The current surface size.
    pub fn surface_size(&self) -> (u32, u32) {
        self.context.surface_size()
    }

    /// The last fence value the GPU has completed.
    pub fn completed_fence_value(&self) -> u64 {
        self.context.completed_fence_value()
    }

    /// Counters of the current (or last finished) frame.
    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// The device the triangle buffers live on.
    pub fn device(&self) -> &Arc<dyn RenderDevice> {
        &self.device
    }

    // --- Depth / stencil ---

    /// Enables or disables the depth test.
    pub fn set_depth_test(&mut self, enabled: bool) {
        self.depth_stencil
            .flags
            .set(DepthStencilFlags::DEPTH_TEST, enabled);
    }

    /// Whether the depth test is on.
    pub fn depth_test(&self) -> bool {
        self.depth_stencil
            .flags
            .contains(DepthStencilFlags::DEPTH_TEST)
    }

    /// Enables or disables depth writes.
    pub fn set_depth_write(&mut self, enabled: bool) {
        self.depth_stencil
            .flags
            .set(DepthStencilFlags::DEPTH_WRITE, enabled);
    }

    /// Whether depth writes are on.
    pub fn depth_write(&self) -> bool {
        self.depth_stencil
            .flags
            .contains(DepthStencilFlags::DEPTH_WRITE)
    }

    /// Enables or disables the stencil test.
    pub fn set_stencil_test(&mut self, enabled: bool) {
        self.depth_stencil
            .flags
            .set(DepthStencilFlags::STENCIL_TEST, enabled);
    }

    /// Whether the stencil test is on.
    pub fn stencil_test(&self) -> bool {
        self.depth_stencil
            .flags
            .contains(DepthStencilFlags::STENCIL_TEST)
    }

    /// Sets the depth comparison.
    pub fn set_depth_compare_func(&mut self, func: CompareFunc) {
        self.depth_stencil.depth_compare = func;
    }

    /// The depth comparison.
    pub fn depth_compare_func(&self) -> CompareFunc {
        self.depth_stencil.depth_compare
    }

    /// Sets the stencil comparison, reference and read mask for both faces.
    pub fn set_stencil_compare_func(&mut self, func: CompareFunc, reference: u32, read_mask: u8) {
        for face in [&mut self.depth_stencil.front, &mut self.depth_stencil.back] {
            face.compare = func;
            face.read_mask = read_mask;
        }
        self.stencil_reference = reference;
    }

    /// Sets the stencil operations for both faces.
    pub fn set_stencil_op(
        &mut self,
        stencil_failure: StencilOp,
        depth_failure: StencilOp,
        depth_stencil_pass: StencilOp,
    ) {
        for face in [&mut self.depth_stencil.front, &mut self.depth_stencil.back] {
            face.stencil_failure_op = stencil_failure;
            face.depth_failure_op = depth_failure;
            face.depth_stencil_pass_op = depth_stencil_pass;
        }
    }

    /// Sets the stencil write mask for both faces.
    pub fn set_stencil_write_mask(&mut self, mask: u8) {
        self.depth_stencil.front.write_mask = mask;
        self.depth_stencil.back.write_mask = mask;
    }

    /// The front-face stencil comparison.
    pub fn stencil_compare_func(&self) -> CompareFunc {
        self.depth_stencil.front.compare
    }

    /// The front-face operation on stencil failure.
    pub fn stencil_failure_op(&self) -> StencilOp {
        self.depth_stencil.front.stencil_failure_op
    }

    /// The front-face operation when the stencil passes and the depth fails.
    pub fn stencil_pass_depth_failure_op(&self) -> StencilOp {
        self.depth_stencil.front.depth_failure_op
    }

    /// The front-face operation when both tests pass.
    pub fn stencil_depth_pass_op(&self) -> StencilOp {
        self.depth_stencil.front.depth_stencil_pass_op
    }

    /// The front-face stencil read mask.
    pub fn stencil_read_mask(&self) -> u8 {
        self.depth_stencil.front.read_mask
    }

    /// The front-face stencil write mask.
    pub fn stencil_write_mask(&self) -> u8 {
        self.depth_stencil.front.write_mask
    }

    /// The stencil reference value.
    pub fn stencil_reference_value(&self) -> u32 {
        self.stencil_reference
    }

    /// Replaces the whole depth/stencil state.
    pub fn set_depth_stencil_desc(&mut self, desc: DepthStencilDesc) {
        self.depth_stencil = desc;
    }

    /// The whole depth/stencil state.
    pub fn depth_stencil_desc(&self) -> &DepthStencilDesc {
        &self.depth_stencil
    }

    // --- Raster ---

    /// Sets face culling.
    pub fn set_cull_mode(&mut self, mode: CullMode) {
        self.cull_mode = mode;
    }

    /// Face culling.
    pub fn cull_mode(&self) -> CullMode {
        self.cull_mode
    }

    /// Sets the front-face winding.
    pub fn set_winding(&mut self, winding: Winding) {
        self.winding = winding;
    }

    /// The front-face winding.
    pub fn winding(&self) -> Winding {
        self.winding
    }

    /// Sets the viewport used by subsequent passes.
    pub fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = Viewport {
            x,
            y,
            width,
            height,
        };
    }

    /// The viewport.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Enables or disables the scissor test.
    pub fn set_scissor_test(&mut self, enabled: bool) {
        self.scissor.enabled = enabled;
    }

    /// Whether the scissor test is on.
    pub fn scissor_test(&self) -> bool {
        self.scissor.enabled
    }

    /// Sets the scissor rectangle.
    pub fn set_scissor_rect(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.scissor.rect = ScissorRect {
            x,
            y,
            width,
            height,
        };
    }

    /// The scissor rectangle.
    pub fn scissor_rect(&self) -> ScissorRect {
        self.scissor.rect
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.buffers.release(self.device.as_ref());
    }
}
