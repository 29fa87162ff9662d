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

//! The D3D12 implementation of [`RenderContext`].
//!
//! The context records every frame into the command list of its frame slot.
//! Pipeline objects, root signatures and topology are only re-recorded when
//! they change. Viewport, scissor and stencil reference are tracked with
//! dirty bits and flushed right before the next draw.

use super::conversions::IntoD3d12;
use super::driver::{DriverShared, DriverState};
use super::format;
use super::frame::FrameResources;
use super::native::{
    DescriptorHeapKind, DxgiFormat, HeapType, IndexBufferView, NativeCommand, NativeDevice,
    NativeError, PipelineHandle, PrimitiveTopology, ResourceDesc, ResourceStates,
    RootSignatureHandle, SrvDesc, SrvDimension, TextureCopyLocation, VertexBufferView,
};
use super::pipeline::{PipelineInputs, RasterState, RootSignatureEntry};
use super::render_target::{BoundTargets, ScreenTarget, ViewEnv};
use super::texture::D3d12Texture;
use super::transfer::backend_error;
use super::vertex_layout::{INSTANCE_SLOT, VERTEX_SLOT};
use std::fmt;
use std::sync::Arc;
use vesper_core::renderer::{
    BufferId, CullMode, DepthStencilDesc, IndexFormat, PipelineDesc, PixelBufferDesc,
    PrimitiveType, ProgramState, ReadPixelsCallback, RenderContext, RenderError,
    RenderPassDesc, RenderTargetId, ResourceError, ScissorRect, SurfaceDescriptor, TextureId,
    VertexLayoutId, Viewport, Winding,
};

vesper_core::vesper_bitflags! {
    /// Dynamic state waiting to be recorded before the next draw.
    struct DirtyState: u8 {
        const VIEWPORT = 1 << 0;
        const SCISSOR = 1 << 1;
        const STENCIL_REF = 1 << 2;
        const ALL = 0x7;
    }
}

/// Written into texture table slots the program declares but the draw leaves empty.
const NULL_SRV: SrvDesc = SrvDesc {
    format: DxgiFormat::R8G8B8A8_UNORM,
    dimension: SrvDimension::Texture2D,
    most_detailed_mip: 0,
    mip_levels: 1,
    first_slice: 0,
    array_size: 1,
};

/// The pipeline bound by the last successful `update_pipeline_state`.
#[derive(Debug)]
struct BoundPipeline {
    root: Arc<RootSignatureEntry>,
    layout: VertexLayoutId,
    program_state: Arc<ProgramState>,
}

#[derive(Debug, Clone, Copy)]
enum ReadbackSource {
    /// A back buffer, valid as long as the screen was not rebuilt.
    Screen { index: usize, generation: u64 },
    Texture(TextureId),
}

/// A readback waiting for the frame that rendered its source.
struct PendingReadback {
    source: ReadbackSource,
    fence_value: u64,
    callback: ReadPixelsCallback,
}

impl fmt::Debug for PendingReadback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingReadback")
            .field("source", &self.source)
            .field("fence_value", &self.fence_value)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
enum DrawCall {
    Arrays { start: u32, count: u32 },
    Elements { format: IndexFormat, count: u32, offset: u64 },
}

/// Clamps `rect` to a `width x height` target.
fn clamp_scissor(rect: ScissorRect, width: u32, height: u32) -> ScissorRect {
    let (width, height) = (width as i32, height as i32);
    let left = rect.x.clamp(0, width);
    let top = rect.y.clamp(0, height);
    let right = rect.x.saturating_add(rect.width as i32).clamp(left, width);
    let bottom = rect.y.saturating_add(rect.height as i32).clamp(top, height);
    ScissorRect {
        x: left,
        y: top,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    }
}

/// Removes the row padding of a readback and converts it to RGBA.
fn pack_rows(raw: &[u8], row_pitch: usize, row_size: usize, rows: usize, bgra: bool) -> Option<Vec<u8>> {
    let mut data = Vec::with_capacity(row_size * rows);
    for row in 0..rows {
        let start = row * row_pitch;
        data.extend_from_slice(raw.get(start..start + row_size)?);
    }
    if bgra {
        for pixel in data.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
    }
    Some(data)
}

/// Records frames for one surface.
#[derive(Debug)]
pub struct D3d12RenderContext {
    shared: Arc<DriverShared>,
    screen: ScreenTarget,
    frames: Vec<FrameResources>,
    /// Frame fence value of the frame being recorded.
    frame_value: u64,
    in_frame: bool,
    surface_size: (u32, u32),
    resize_pending: bool,
    pass: Option<(RenderTargetId, RenderPassDesc)>,
    bound: BoundTargets,
    pipeline: Option<BoundPipeline>,
    depth_stencil: DepthStencilDesc,
    cull: CullMode,
    winding: Winding,
    viewport: Option<Viewport>,
    /// `None` while the scissor test is disabled.
    scissor: Option<ScissorRect>,
    stencil_ref: u32,
    dirty: DirtyState,
    topology: Option<PrimitiveTopology>,
    bound_root: Option<RootSignatureHandle>,
    bound_pipeline: Option<PipelineHandle>,
    vertex_buffer: Option<BufferId>,
    index_buffer: Option<BufferId>,
    instance_buffer: Option<BufferId>,
    readbacks: Vec<PendingReadback>,
}

impl D3d12RenderContext {
    /// Creates the frame slots and the screen target of `surface`.
    ///
    /// ## Errors
    /// * `RenderError::InitializationFailed` - If a frame slot cannot be created.
    /// * `RenderError::ResourceError` - If the swapchain or its attachments cannot be created.
    pub(crate) fn new(
        shared: Arc<DriverShared>,
        surface: &SurfaceDescriptor,
    ) -> Result<Self, RenderError> {
        let native = shared.native.as_ref();
        let config = &shared.config;
        let mut frames = Vec::with_capacity(config.max_frames_in_flight);
        for _ in 0..config.max_frames_in_flight {
            match FrameResources::new(
                native,
                config.uniform_ring_size,
                config.uniform_alignment,
                config.srv_descriptors_per_frame(),
            ) {
                Ok(frame) => frames.push(frame),
                Err(err) => {
                    frames.iter().for_each(|frame| frame.release(native));
                    log::error!("D3d12RenderContext: failed to create a frame slot: {err}");
                    return Err(RenderError::InitializationFailed(err.to_string()));
                }
            }
        }

        let screen = {
            let mut guard = shared.lock();
            let state = &mut *guard;
            let mut env = ViewEnv {
                native,
                heaps: &mut state.heaps,
                disposal: &mut state.disposal,
            };
            ScreenTarget::new(&mut env, surface, config.swapchain_buffer_count)
        };
        let screen = match screen {
            Ok(screen) => screen,
            Err(err) => {
                frames.iter().for_each(|frame| frame.release(native));
                return Err(err.into());
            }
        };
        log::info!(
            "D3d12RenderContext: created {}x{} {} surface with {} frames in flight",
            surface.width,
            surface.height,
            if screen.is_windowed() { "windowed" } else { "offscreen" },
            frames.len()
        );

        Ok(Self {
            screen,
            frames,
            frame_value: 0,
            in_frame: false,
            surface_size: (surface.width, surface.height),
            resize_pending: false,
            pass: None,
            bound: BoundTargets::default(),
            pipeline: None,
            depth_stencil: DepthStencilDesc::default(),
            cull: CullMode::default(),
            winding: Winding::default(),
            viewport: None,
            scissor: None,
            stencil_ref: 0,
            dirty: DirtyState::ALL,
            topology: None,
            bound_root: None,
            bound_pipeline: None,
            vertex_buffer: None,
            index_buffer: None,
            instance_buffer: None,
            readbacks: Vec::new(),
            shared,
        })
    }

    fn slot(&self, state: &DriverState) -> usize {
        state.frame_index % self.frames.len()
    }

    /// Runs the readbacks whose frame completed, or all of them with `u64::MAX`.
    fn run_readbacks(&mut self, native: &dyn NativeDevice, state: &mut DriverState, completed: u64) {
        if self.readbacks.is_empty() {
            return;
        }
        let (ready, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.readbacks)
            .into_iter()
            .partition(|readback| readback.fence_value <= completed);
        self.readbacks = pending;
        for readback in ready {
            let pixels = match self.copy_to_host(native, state, readback.source) {
                Ok(pixels) => pixels,
                Err(err) => {
                    log::error!("D3d12RenderContext: pixel readback failed: {err}");
                    PixelBufferDesc::default()
                }
            };
            (readback.callback)(pixels);
        }
    }

    /// Copies mip 0 of the source into a readback buffer and waits for it.
    fn copy_to_host(
        &mut self,
        native: &dyn NativeDevice,
        state: &mut DriverState,
        source: ReadbackSource,
    ) -> Result<PixelBufferDesc, ResourceError> {
        let texture: &mut D3d12Texture = match source {
            ReadbackSource::Screen { index, generation } => {
                if generation != self.screen.generation() {
                    return Err(ResourceError::NotFound);
                }
                self.screen.buffer_mut(index).ok_or(ResourceError::NotFound)?
            }
            ReadbackSource::Texture(id) => state
                .textures
                .get_mut(id.0)
                .ok_or(ResourceError::InvalidHandle)?,
        };
        let bgra = match texture.format() {
            DxgiFormat::R8G8B8A8_UNORM => false,
            DxgiFormat::B8G8R8A8_UNORM => true,
            other => return Err(ResourceError::UnsupportedFormat(format!("{other:?}"))),
        };
        let (width, height) = (texture.desc().width, texture.desc().height);
        let footprint = format::footprint(texture.format(), width, height, 0);
        let size = footprint.total_bytes();
        let readback = native
            .create_committed_resource(
                HeapType::Readback,
                &ResourceDesc::buffer(size),
                ResourceStates::COPY_DEST,
                None,
            )
            .map_err(backend_error)?;

        let before = texture.state(0).unwrap_or_else(|| texture.steady_state());
        let list = match state.transfer.list() {
            Ok(list) => list,
            Err(err) => {
                native.release_resource(readback);
                return Err(err);
            }
        };
        texture.transition(list, Some(0), ResourceStates::COPY_SOURCE);
        list.record(NativeCommand::CopyTextureRegion {
            dst: TextureCopyLocation::Footprint {
                resource: readback,
                footprint,
            },
            dst_x: 0,
            dst_y: 0,
            src: TextureCopyLocation::Subresource {
                resource: texture.resource(),
                index: 0,
            },
        });
        texture.transition(list, Some(0), before);

        let raw = state
            .transfer
            .submit(true)
            .and_then(|_| native.read_mapped(readback, 0, size).map_err(backend_error));
        native.release_resource(readback);
        let data = pack_rows(
            &raw?,
            footprint.row_pitch as usize,
            footprint.row_size as usize,
            footprint.row_count as usize,
            bgra,
        )
        .ok_or(ResourceError::OutOfBounds)?;
        Ok(PixelBufferDesc { width, height, data })
    }

    /// Flushes dynamic state and binds buffers, uniforms and textures.
    /// Returns `false` if the draw must be skipped.
    fn prepare_drawing(
        &mut self,
        native: &dyn NativeDevice,
        state: &mut DriverState,
        primitive: PrimitiveType,
        instanced: bool,
    ) -> bool {
        if self.pass.is_none() {
            log::warn!("D3d12RenderContext: draw outside a render pass skipped");
            return false;
        }
        let Some(pipeline) = self.pipeline.as_ref() else {
            log::warn!("D3d12RenderContext: draw without a pipeline skipped");
            return false;
        };
        let slot = state.frame_index % self.frames.len();
        let frame = &mut self.frames[slot];

        let topology: PrimitiveTopology = primitive.into_d3d12();
        if self.topology != Some(topology) {
            frame.list.record(NativeCommand::IaSetPrimitiveTopology(topology));
            self.topology = Some(topology);
        }

        if self.dirty.contains(DirtyState::VIEWPORT) {
            let viewport = self.viewport.unwrap_or(Viewport {
                x: 0,
                y: 0,
                width: self.bound.width,
                height: self.bound.height,
            });
            frame.list.record(NativeCommand::RsSetViewports(viewport.into_d3d12()));
        }
        if self.dirty.contains(DirtyState::SCISSOR) {
            let full = ScissorRect {
                x: 0,
                y: 0,
                width: self.bound.width,
                height: self.bound.height,
            };
            let rect = self
                .scissor
                .map_or(full, |rect| clamp_scissor(rect, self.bound.width, self.bound.height));
            frame.list.record(NativeCommand::RsSetScissorRects(rect.into_d3d12()));
        }
        if self.dirty.contains(DirtyState::STENCIL_REF) {
            frame.list.record(NativeCommand::OmSetStencilRef(self.stencil_ref));
        }
        self.dirty = DirtyState::EMPTY;

        // Vertex streams.
        let Some(layout) = state.layouts.get(pipeline.layout.0) else {
            log::error!("D3d12RenderContext: vertex layout {} was destroyed", pipeline.layout.0);
            return false;
        };
        let (stride, instance_stride) = (layout.stride(), layout.instance_stride());
        let mut views = Vec::with_capacity(2);
        let Some(buffer) = self.vertex_buffer.and_then(|id| state.buffers.get_mut(id.0)) else {
            log::error!("D3d12RenderContext: draw without a vertex buffer skipped");
            return false;
        };
        let Some(resource) = buffer.resource_for_frame(native, state.frame_index) else {
            log::error!("D3d12RenderContext: vertex buffer has no content");
            return false;
        };
        buffer.last_fence_value = self.frame_value;
        views.push(VertexBufferView {
            address: native.gpu_virtual_address(resource),
            size: buffer.capacity as u32,
            stride,
        });
        if instanced && instance_stride > 0 {
            let instance = self
                .instance_buffer
                .and_then(|id| state.buffers.get_mut(id.0))
                .and_then(|buffer| {
                    let resource = buffer.resource_for_frame(native, state.frame_index)?;
                    buffer.last_fence_value = self.frame_value;
                    Some((resource, buffer.capacity))
                });
            match instance {
                Some((resource, capacity)) => views.push(VertexBufferView {
                    address: native.gpu_virtual_address(resource),
                    size: capacity as u32,
                    stride: instance_stride,
                }),
                None => {
                    log::error!("D3d12RenderContext: instanced draw without an instance buffer skipped");
                    return false;
                }
            }
        }
        debug_assert_eq!(VERTEX_SLOT + 1, INSTANCE_SLOT);
        frame.list.record(NativeCommand::IaSetVertexBuffers {
            start_slot: VERTEX_SLOT,
            views,
        });

        // Uniform blocks, one ring slice each.
        let reflection = pipeline.program_state.reflection();
        let uniforms = pipeline.program_state.resolved_uniforms();
        for (index, block) in reflection.uniform_blocks.iter().enumerate() {
            let Some(&root) = pipeline.root.bindings.block_roots.get(index) else {
                continue;
            };
            let start = reflection.block_cpu_offset(index) as usize;
            let Some(bytes) = uniforms.get(start..start + block.size as usize) else {
                log::error!("D3d12RenderContext: uniform block '{}' is out of range", block.name);
                return false;
            };
            let Some(address) = frame.uniforms.push(native, bytes) else {
                return false;
            };
            frame.list.record(NativeCommand::SetGraphicsRootConstantBufferView {
                index: root,
                address,
            });
        }

        // Texture table.
        if let Some((root, count)) = pipeline.root.bindings.srv_table {
            let Some(first) = frame.reserve_srvs(count) else {
                return false;
            };
            let (cpu_start, increment) = (frame.srv_heap().cpu_start, frame.srv_heap().increment);
            let mut filled = vec![false; count as usize];
            for (binding, textures) in pipeline.program_state.textures() {
                for (offset, id) in textures.iter().enumerate() {
                    let register = binding + offset as u32;
                    if register >= count {
                        continue;
                    }
                    let Some(texture) = state.textures.get_mut(id.0) else {
                        log::warn!("D3d12RenderContext: texture {} was destroyed", id.0);
                        continue;
                    };
                    let Some(srv) = texture.srv() else {
                        continue;
                    };
                    texture.last_fence_value = self.frame_value;
                    native.copy_descriptors_simple(
                        1,
                        cpu_start.offset(first + register, increment),
                        srv.cpu,
                        DescriptorHeapKind::CbvSrvUav,
                    );
                    filled[register as usize] = true;
                }
            }
            for (register, _) in filled.iter().enumerate().filter(|(_, filled)| !**filled) {
                native.create_shader_resource_view(
                    None,
                    &NULL_SRV,
                    cpu_start.offset(first + register as u32, increment),
                );
            }
            let Some(base) = frame.srv_gpu(first) else {
                log::error!("D3d12RenderContext: frame descriptor heap is not shader visible");
                return false;
            };
            frame
                .list
                .record(NativeCommand::SetGraphicsRootDescriptorTable { index: root, base });
        }
        true
    }

    fn draw(&mut self, primitive: PrimitiveType, call: DrawCall, instance_count: u32) {
        let shared = self.shared.clone();
        let native = shared.native.as_ref();
        let mut guard = shared.lock();
        let state = &mut *guard;
        if !self.prepare_drawing(native, state, primitive, instance_count > 1) {
            return;
        }
        let slot = self.slot(state);
        match call {
            DrawCall::Arrays { start, count } => {
                self.frames[slot].list.record(NativeCommand::DrawInstanced {
                    vertex_count: count,
                    instance_count,
                    start_vertex: start,
                    start_instance: 0,
                });
            }
            DrawCall::Elements {
                format: index_format,
                count,
                offset,
            } => {
                let Some(buffer) = self.index_buffer.and_then(|id| state.buffers.get_mut(id.0)) else {
                    log::error!("D3d12RenderContext: indexed draw without an index buffer skipped");
                    return;
                };
                if offset >= buffer.capacity {
                    log::error!(
                        "D3d12RenderContext: index offset {offset} is past the buffer end {}",
                        buffer.capacity
                    );
                    return;
                }
                let Some(resource) = buffer.resource_for_frame(native, state.frame_index) else {
                    log::error!("D3d12RenderContext: index buffer has no content");
                    return;
                };
                buffer.last_fence_value = self.frame_value;
                let list = &mut self.frames[slot].list;
                list.record(NativeCommand::IaSetIndexBuffer(IndexBufferView {
                    address: native.gpu_virtual_address(resource) + offset,
                    size: (buffer.capacity - offset) as u32,
                    format: format::index_format(index_format),
                }));
                list.record(NativeCommand::DrawIndexedInstanced {
                    index_count: count,
                    instance_count,
                    start_index: 0,
                    base_vertex: 0,
                    start_instance: 0,
                });
            }
        }
    }
}

impl RenderContext for D3d12RenderContext {
    fn begin_frame(&mut self) -> Result<bool, RenderError> {
        if self.in_frame {
            log::warn!("D3d12RenderContext: begin_frame called twice");
            return Ok(true);
        }
        let (width, height) = self.surface_size;
        if width == 0 || height == 0 {
            return Ok(false);
        }
        let shared = self.shared.clone();
        let native = shared.native.as_ref();
        let mut guard = shared.lock();
        let state = &mut *guard;
        let slot = self.slot(state);

        shared.wait_frame(self.frames[slot].fence_value)?;
        let completed = shared.completed_frame_value();
        let released = state.disposal.process(completed, native, &mut state.heaps);
        if released > 0 {
            log::trace!("D3d12RenderContext: released {released} objects up to frame {completed}");
        }
        self.run_readbacks(native, state, completed);

        if self.resize_pending {
            self.resize_pending = false;
            if self.screen.size() != (width, height) {
                shared.wait_idle(state)?;
                let mut env = ViewEnv {
                    native,
                    heaps: &mut state.heaps,
                    disposal: &mut state.disposal,
                };
                self.screen.resize(&mut env, width, height)?;
                log::debug!("D3d12RenderContext: surface resized to {width}x{height}");
            }
        }

        let frame = &mut self.frames[slot];
        frame.reset();
        let heaps = vec![frame.srv_heap().handle, state.samplers.heap().handle];
        frame.list.record(NativeCommand::SetDescriptorHeaps(heaps));
        self.frame_value = state.next_frame_value;
        self.topology = None;
        self.bound_root = None;
        self.bound_pipeline = None;
        self.pipeline = None;
        self.dirty = DirtyState::ALL;
        self.in_frame = true;
        Ok(true)
    }

    fn begin_render_pass(
        &mut self,
        target: RenderTargetId,
        desc: &RenderPassDesc,
    ) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::Internal("render pass begun outside a frame".into()));
        }
        if self.pass.is_some() {
            self.end_render_pass();
        }
        let shared = self.shared.clone();
        let native = shared.native.as_ref();
        let mut guard = shared.lock();
        let state = &mut *guard;
        let slot = self.slot(state);
        let list = &mut self.frames[slot].list;

        let bound = if target.is_default() {
            self.screen.begin_pass(native, list, desc, self.frame_value)?
        } else {
            let DriverState {
                targets,
                textures,
                heaps,
                disposal,
                ..
            } = state;
            let render_target = targets
                .get_mut(target.0)
                .ok_or(ResourceError::InvalidHandle)?;
            let mut env = ViewEnv {
                native,
                heaps,
                disposal,
            };
            render_target.begin_pass(&mut env, textures, list, desc, self.frame_value)?
        };
        self.bound = bound;
        self.pass = Some((target, *desc));
        self.dirty = DirtyState::ALL;
        Ok(())
    }

    fn update_depth_stencil_state(&mut self, desc: &DepthStencilDesc) {
        self.depth_stencil = *desc;
    }

    fn update_pipeline_state(
        &mut self,
        target: RenderTargetId,
        pipeline: &PipelineDesc,
        primitive: PrimitiveType,
    ) -> bool {
        match self.pass {
            Some((current, _)) if current == target => {}
            Some((current, _)) => {
                log::warn!(
                    "D3d12RenderContext: pipeline for target {} while target {} is bound",
                    target.0,
                    current.0
                );
            }
            None => {
                log::warn!("D3d12RenderContext: pipeline update outside a render pass");
                return false;
            }
        }
        let shared = self.shared.clone();
        let mut guard = shared.lock();
        let state = &mut *guard;
        let program_id = pipeline.program_state.program();
        let (Some(program), Some(layout)) = (
            state.programs.get(program_id.0),
            state.layouts.get(pipeline.vertex_layout.0),
        ) else {
            log::error!(
                "D3d12RenderContext: program {} or vertex layout {} does not exist",
                program_id.0,
                pipeline.vertex_layout.0
            );
            return false;
        };
        let inputs = PipelineInputs {
            program_id,
            program,
            layout,
            blend: &pipeline.blend,
            depth_stencil: &self.depth_stencil,
            raster: RasterState {
                cull: self.cull,
                winding: self.winding,
                group: primitive.group(),
            },
            targets: &self.bound.formats,
        };
        let resolved = match state.pipelines.resolve(&inputs) {
            Ok(resolved) => resolved,
            Err(err) => {
                log::error!("D3d12RenderContext: failed to resolve pipeline: {err}");
                return false;
            }
        };

        let slot = state.frame_index % self.frames.len();
        let list = &mut self.frames[slot].list;
        let topology: PrimitiveTopology = primitive.into_d3d12();
        if self.topology != Some(topology) {
            list.record(NativeCommand::IaSetPrimitiveTopology(topology));
            self.topology = Some(topology);
        }
        let root_changed = self.bound_root != Some(resolved.root.handle);
        if root_changed {
            list.record(NativeCommand::SetGraphicsRootSignature(resolved.root.handle));
            self.bound_root = Some(resolved.root.handle);
            // A new root signature drops every table binding.
            if let (Some((index, _)), Some(base)) =
                (resolved.root.bindings.sampler_table, state.samplers.gpu_start())
            {
                list.record(NativeCommand::SetGraphicsRootDescriptorTable { index, base });
            }
        }
        if self.bound_pipeline != Some(resolved.pipeline) {
            list.record(NativeCommand::SetPipelineState(resolved.pipeline));
            self.bound_pipeline = Some(resolved.pipeline);
        }
        self.pipeline = Some(BoundPipeline {
            root: resolved.root,
            layout: pipeline.vertex_layout,
            program_state: pipeline.program_state.clone(),
        });
        true
    }

    fn set_stencil_reference(&mut self, value: u32) {
        if self.stencil_ref != value {
            self.stencil_ref = value;
            self.dirty.insert(DirtyState::STENCIL_REF);
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.dirty.insert(DirtyState::VIEWPORT);
    }

    fn set_scissor_rect(&mut self, enabled: bool, rect: ScissorRect) {
        self.scissor = enabled.then_some(rect);
        self.dirty.insert(DirtyState::SCISSOR);
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.cull = mode;
    }

    fn set_winding(&mut self, winding: Winding) {
        self.winding = winding;
    }

    fn set_vertex_buffer(&mut self, buffer: BufferId) {
        self.vertex_buffer = Some(buffer);
    }

    fn set_index_buffer(&mut self, buffer: BufferId) {
        self.index_buffer = Some(buffer);
    }

    fn set_instance_buffer(&mut self, buffer: BufferId) {
        self.instance_buffer = Some(buffer);
    }

    fn draw_arrays(&mut self, primitive: PrimitiveType, start: u32, count: u32) {
        self.draw(primitive, DrawCall::Arrays { start, count }, 1);
    }

    fn draw_arrays_instanced(
        &mut self,
        primitive: PrimitiveType,
        start: u32,
        count: u32,
        instance_count: u32,
    ) {
        self.draw(primitive, DrawCall::Arrays { start, count }, instance_count);
    }

    fn draw_elements(
        &mut self,
        primitive: PrimitiveType,
        format: IndexFormat,
        count: u32,
        offset: u64,
    ) {
        self.draw(primitive, DrawCall::Elements { format, count, offset }, 1);
    }

    fn draw_elements_instanced(
        &mut self,
        primitive: PrimitiveType,
        format: IndexFormat,
        count: u32,
        offset: u64,
        instance_count: u32,
    ) {
        self.draw(
            primitive,
            DrawCall::Elements { format, count, offset },
            instance_count,
        );
    }

    fn end_render_pass(&mut self) {
        let Some((target, desc)) = self.pass.take() else {
            return;
        };
        let shared = self.shared.clone();
        let native = shared.native.as_ref();
        let mut guard = shared.lock();
        let state = &mut *guard;
        let slot = self.slot(state);
        let list = &mut self.frames[slot].list;
        if target.is_default() {
            self.screen.end_pass(native, list, &desc);
        } else if let Some(render_target) = state.targets.get_mut(target.0) {
            render_target.end_pass(&mut state.textures, list, &desc);
        }
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        if !self.in_frame {
            log::warn!("D3d12RenderContext: end_frame without begin_frame");
            return Ok(());
        }
        if self.pass.is_some() {
            self.end_render_pass();
        }
        let shared = self.shared.clone();
        let native = shared.native.as_ref();
        let mut guard = shared.lock();
        let state = &mut *guard;
        let slot = self.slot(state);
        self.in_frame = false;
        self.pipeline = None;

        let device_error = |err: NativeError| match err {
            NativeError::DeviceRemoved { reason } => RenderError::DeviceLost { reason },
            other => RenderError::Internal(other.to_string()),
        };
        native
            .execute(&self.frames[slot].list)
            .map_err(device_error)?;
        let vsync = shared.config.vsync;
        let presented = self
            .screen
            .present(native, u32::from(vsync), !vsync && native.supports_tearing());

        let value = self.frame_value;
        native.signal(shared.frame_fence, value).map_err(device_error)?;
        self.frames[slot].fence_value = value;
        state.next_frame_value = value + 1;
        state.frame_index = (state.frame_index + 1) % self.frames.len();

        match presented {
            Ok(()) => Ok(()),
            Err(NativeError::DeviceRemoved { reason }) => {
                log::error!("D3d12RenderContext: device removed while presenting: {reason}");
                if shared.config.abort_on_device_removed {
                    std::process::abort();
                }
                Err(RenderError::DeviceLost { reason })
            }
            Err(err) => {
                log::error!("D3d12RenderContext: present failed: {err}");
                Err(RenderError::SurfaceLost)
            }
        }
    }

    fn read_pixels(
        &mut self,
        target: RenderTargetId,
        _preserve_axis_hint: bool,
        callback: ReadPixelsCallback,
    ) {
        // Rows are always returned top row first.
        let shared = self.shared.clone();
        let state = shared.lock();
        let source = if target.is_default() {
            ReadbackSource::Screen {
                index: self.screen.current_index(shared.native.as_ref()),
                generation: self.screen.generation(),
            }
        } else {
            match state
                .targets
                .get(target.0)
                .and_then(|render_target| render_target.attachments().color[0])
            {
                Some(texture) => ReadbackSource::Texture(texture),
                None => {
                    log::error!("D3d12RenderContext: target {} has no color attachment to read", target.0);
                    drop(state);
                    callback(PixelBufferDesc::default());
                    return;
                }
            }
        };
        let fence_value = if self.in_frame {
            self.frame_value
        } else {
            state.next_frame_value - 1
        };
        self.readbacks.push(PendingReadback {
            source,
            fence_value,
            callback,
        });
    }

    fn update_surface(&mut self, width: u32, height: u32) -> bool {
        if self.surface_size == (width, height) {
            return false;
        }
        self.surface_size = (width, height);
        if width > 0 && height > 0 {
            self.resize_pending = true;
        }
        true
    }

    fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    fn completed_fence_value(&self) -> u64 {
        self.shared.completed_frame_value()
    }
}

impl Drop for D3d12RenderContext {
    fn drop(&mut self) {
        let shared = self.shared.clone();
        let native = shared.native.as_ref();
        let mut guard = shared.lock();
        let state = &mut *guard;
        if let Err(err) = shared.wait_idle(state) {
            log::error!("D3d12RenderContext: failed to wait for the GPU: {err}");
        }
        self.run_readbacks(native, state, u64::MAX);
        for frame in &self.frames {
            frame.release(native);
        }
        self.screen.dispose(&mut state.disposal);
    }
}
