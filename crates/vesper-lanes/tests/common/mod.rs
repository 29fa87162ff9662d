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

//! Recording doubles for the renderer's device and context.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use vesper_core::math::{Color4B, Mat4};
use vesper_core::renderer::*;
use vesper_lanes::{RenderCommand, Triangles, TrianglesCommand, V3fC4bT2f};

/// A buffer created through [`MockDevice`].
#[derive(Debug, Clone)]
pub struct MockBuffer {
    pub buffer_type: BufferType,
    pub usage: BufferUsage,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct DeviceState {
    pub buffers: Vec<MockBuffer>,
    pub destroyed: Vec<BufferId>,
    pub targets: HashMap<RenderTargetId, RenderTargetDescriptor>,
    pub fail_buffer_creation: bool,
}

/// A device that keeps buffer contents in memory.
#[derive(Debug, Default)]
pub struct MockDevice {
    state: Mutex<DeviceState>,
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap()
    }

    pub fn add_render_target(&self, id: RenderTargetId, descriptor: RenderTargetDescriptor) {
        self.state().targets.insert(id, descriptor);
    }

    pub fn buffer_data(&self, id: BufferId) -> Vec<u8> {
        self.state().buffers[id.0].data.clone()
    }

    /// `count` vertices read from the start of a vertex buffer.
    pub fn vertices(&self, id: BufferId, first: usize, count: usize) -> Vec<V3fC4bT2f> {
        let data = self.buffer_data(id);
        let bytes = &data[first * 24..(first + count) * 24];
        bytes
            .chunks_exact(24)
            .map(bytemuck::pod_read_unaligned::<V3fC4bT2f>)
            .collect()
    }

    /// `count` 16-bit indices read from the start of an index buffer.
    pub fn indices(&self, id: BufferId, first: usize, count: usize) -> Vec<u16> {
        let data = self.buffer_data(id);
        data[first * 2..(first + count) * 2]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }
}

impl RenderDevice for MockDevice {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            vendor: "Mock".into(),
            renderer: "Recording device".into(),
            version: "0".into(),
            shading_language_version: "none".into(),
        }
    }

    fn check_feature(&self, _feature: Feature) -> bool {
        true
    }

    fn create_render_context(
        &self,
        _surface: &SurfaceDescriptor,
    ) -> Result<Box<dyn RenderContext>, RenderError> {
        Err(RenderError::NotInitialized)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let mut state = self.state();
        if state.fail_buffer_creation {
            return Err(ResourceError::BackendError("out of memory".into()));
        }
        state.buffers.push(MockBuffer {
            buffer_type: descriptor.buffer_type,
            usage: descriptor.usage,
            data: vec![0; descriptor.size as usize],
        });
        Ok(BufferId(state.buffers.len() - 1))
    }

    fn update_buffer_data(&self, id: BufferId, data: &[u8]) -> Result<(), ResourceError> {
        self.update_buffer_sub_data(id, 0, data)
    }

    fn update_buffer_sub_data(
        &self,
        id: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let mut state = self.state();
        let buffer = state
            .buffers
            .get_mut(id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        let start = offset as usize;
        let dst = buffer
            .data
            .get_mut(start..start + data.len())
            .ok_or(ResourceError::OutOfBounds)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, len: u64) -> Result<Vec<u8>, ResourceError> {
        let data = self.buffer_data(id);
        Ok(data[offset as usize..(offset + len) as usize].to_vec())
    }

    fn using_default_stored_data(&self, _id: BufferId, _enabled: bool) -> Result<(), ResourceError> {
        Ok(())
    }

    fn set_buffer_default_data(&self, _id: BufferId, _data: &[u8]) -> Result<(), ResourceError> {
        Ok(())
    }

    fn restore_buffer_default_data(&self, _id: BufferId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.state().destroyed.push(id);
        Ok(())
    }

    fn create_texture(&self, _descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        Err(ResourceError::BackendError("textures are not mocked".into()))
    }

    fn update_texture_data(
        &self,
        _id: TextureId,
        _data: &[u8],
        _width: u32,
        _height: u32,
        _level: u32,
    ) -> Result<(), ResourceError> {
        Err(ResourceError::NotFound)
    }

    fn update_texture_sub_data(
        &self,
        _id: TextureId,
        _region: &TextureRegion,
        _data: &[u8],
    ) -> Result<(), ResourceError> {
        Err(ResourceError::NotFound)
    }

    fn update_texture_compressed_data(
        &self,
        _id: TextureId,
        _data: &[u8],
        _width: u32,
        _height: u32,
        _level: u32,
    ) -> Result<(), ResourceError> {
        Err(ResourceError::NotFound)
    }

    fn update_texture_compressed_sub_data(
        &self,
        _id: TextureId,
        _region: &TextureRegion,
        _data: &[u8],
    ) -> Result<(), ResourceError> {
        Err(ResourceError::NotFound)
    }

    fn update_texture_face_data(
        &self,
        _id: TextureId,
        _face: u32,
        _data: &[u8],
    ) -> Result<(), ResourceError> {
        Err(ResourceError::NotFound)
    }

    fn generate_mipmaps(&self, _id: TextureId) -> Result<(), ResourceError> {
        Err(ResourceError::NotFound)
    }

    fn update_texture_sampler(
        &self,
        _id: TextureId,
        _sampler: &SamplerDesc,
    ) -> Result<(), ResourceError> {
        Err(ResourceError::NotFound)
    }

    fn texture_descriptor(&self, _id: TextureId) -> Option<TextureDescriptor> {
        None
    }

    fn destroy_texture(&self, _id: TextureId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_render_target(
        &self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<RenderTargetId, ResourceError> {
        let mut state = self.state();
        let id = RenderTargetId(state.targets.len() + 1);
        state.targets.insert(id, *descriptor);
        Ok(id)
    }

    fn set_render_target_color(
        &self,
        _id: RenderTargetId,
        _index: usize,
        _texture: Option<TextureId>,
    ) -> Result<(), ResourceError> {
        Ok(())
    }

    fn set_render_target_depth_stencil(
        &self,
        _id: RenderTargetId,
        _texture: Option<TextureId>,
    ) -> Result<(), ResourceError> {
        Ok(())
    }

    fn render_target_attachments(&self, id: RenderTargetId) -> Option<RenderTargetDescriptor> {
        self.state().targets.get(&id).copied()
    }

    fn destroy_render_target(&self, _id: RenderTargetId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_program(&self, _descriptor: &ProgramDescriptor) -> Result<ProgramId, ResourceError> {
        Ok(ProgramId(1))
    }

    fn destroy_program(&self, _id: ProgramId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_vertex_layout(
        &self,
        _desc: &VertexLayoutDesc,
    ) -> Result<VertexLayoutId, ResourceError> {
        Ok(VertexLayoutId(1))
    }

    fn create_sampler(&self, _desc: &SamplerDesc) -> Result<SamplerHandle, ResourceError> {
        Ok(SamplerHandle(0))
    }

    fn compile_shader(&self, stage: ShaderStage, _source: &str) -> Result<Vec<u8>, ShaderError> {
        Err(ShaderError::MissingEntryPoint { stage })
    }

    fn clean_pending_resources(&self) {}
}

/// One call received by [`MockContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    BeginFrame,
    BeginPass {
        target: RenderTargetId,
        desc: RenderPassDesc,
    },
    DepthStencil(DepthStencilDesc),
    Pipeline {
        program: ProgramId,
        primitive: PrimitiveType,
    },
    StencilReference(u32),
    Viewport(Viewport),
    Scissor(bool, ScissorRect),
    Cull(CullMode),
    Winding(Winding),
    VertexBuffer(BufferId),
    IndexBuffer(BufferId),
    InstanceBuffer(BufferId),
    DrawArrays {
        primitive: PrimitiveType,
        start: u32,
        count: u32,
        instances: u32,
    },
    DrawElements {
        primitive: PrimitiveType,
        format: IndexFormat,
        count: u32,
        offset: u64,
        instances: u32,
    },
    EndPass,
    EndFrame,
    ReadPixels(RenderTargetId),
}

impl Call {
    pub fn is_draw(&self) -> bool {
        matches!(self, Call::DrawArrays { .. } | Call::DrawElements { .. })
    }
}

/// A context that records every call into a shared log.
#[derive(Debug)]
pub struct MockContext {
    calls: Arc<Mutex<Vec<Call>>>,
    size: (u32, u32),
    accept_pipelines: bool,
}

impl MockContext {
    pub fn new(width: u32, height: u32) -> (Box<Self>, CallLog) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let context = Box::new(Self {
            calls: calls.clone(),
            size: (width, height),
            accept_pipelines: true,
        });
        (context, CallLog(calls))
    }

    pub fn rejecting_pipelines(mut self: Box<Self>) -> Box<Self> {
        self.accept_pipelines = false;
        self
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

/// The test's view of a [`MockContext`] log.
#[derive(Debug, Clone)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn draws(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_draw).collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl RenderContext for MockContext {
    fn begin_frame(&mut self) -> Result<bool, RenderError> {
        self.record(Call::BeginFrame);
        Ok(self.size.0 > 0 && self.size.1 > 0)
    }

    fn begin_render_pass(
        &mut self,
        target: RenderTargetId,
        desc: &RenderPassDesc,
    ) -> Result<(), RenderError> {
        self.record(Call::BeginPass {
            target,
            desc: *desc,
        });
        Ok(())
    }

    fn update_depth_stencil_state(&mut self, desc: &DepthStencilDesc) {
        self.record(Call::DepthStencil(*desc));
    }

    fn update_pipeline_state(
        &mut self,
        _target: RenderTargetId,
        pipeline: &PipelineDesc,
        primitive: PrimitiveType,
    ) -> bool {
        self.record(Call::Pipeline {
            program: pipeline.program_state.program(),
            primitive,
        });
        self.accept_pipelines
    }

    fn set_stencil_reference(&mut self, value: u32) {
        self.record(Call::StencilReference(value));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(Call::Viewport(viewport));
    }

    fn set_scissor_rect(&mut self, enabled: bool, rect: ScissorRect) {
        self.record(Call::Scissor(enabled, rect));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.record(Call::Cull(mode));
    }

    fn set_winding(&mut self, winding: Winding) {
        self.record(Call::Winding(winding));
    }

    fn set_vertex_buffer(&mut self, buffer: BufferId) {
        self.record(Call::VertexBuffer(buffer));
    }

    fn set_index_buffer(&mut self, buffer: BufferId) {
        self.record(Call::IndexBuffer(buffer));
    }

    fn set_instance_buffer(&mut self, buffer: BufferId) {
        self.record(Call::InstanceBuffer(buffer));
    }

    fn draw_arrays(&mut self, primitive: PrimitiveType, start: u32, count: u32) {
        self.draw_arrays_instanced(primitive, start, count, 1);
    }

    fn draw_arrays_instanced(
        &mut self,
        primitive: PrimitiveType,
        start: u32,
        count: u32,
        instances: u32,
    ) {
        self.record(Call::DrawArrays {
            primitive,
            start,
            count,
            instances,
        });
    }

    fn draw_elements(
        &mut self,
        primitive: PrimitiveType,
        format: IndexFormat,
        count: u32,
        offset: u64,
    ) {
        self.draw_elements_instanced(primitive, format, count, offset, 1);
    }

    fn draw_elements_instanced(
        &mut self,
        primitive: PrimitiveType,
        format: IndexFormat,
        count: u32,
        offset: u64,
        instances: u32,
    ) {
        self.record(Call::DrawElements {
            primitive,
            format,
            count,
            offset,
            instances,
        });
    }

    fn end_render_pass(&mut self) {
        self.record(Call::EndPass);
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        self.record(Call::EndFrame);
        Ok(())
    }

    fn read_pixels(
        &mut self,
        target: RenderTargetId,
        _preserve_axis_hint: bool,
        callback: ReadPixelsCallback,
    ) {
        self.record(Call::ReadPixels(target));
        callback(PixelBufferDesc::default());
    }

    fn update_surface(&mut self, width: u32, height: u32) -> bool {
        let changed = self.size != (width, height);
        self.size = (width, height);
        changed
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn completed_fence_value(&self) -> u64 {
        7
    }
}

/// A pipeline whose material is keyed by `program` and `texture`.
pub fn material(program: usize, texture: usize) -> PipelineDesc {
    let mut state = ProgramState::new(ProgramId(program), Arc::new(ProgramReflection::default()));
    state.set_texture(0, TextureId(texture));
    PipelineDesc::new(
        Arc::new(state),
        VertexLayoutId(1),
        BlendDesc::alpha_premultiplied(),
    )
}

/// A 2x2 quad moved by `model_view`.
pub fn quad(model_view: Mat4, pipeline: PipelineDesc) -> Arc<TrianglesCommand> {
    Arc::new(TrianglesCommand::new(
        Triangles::quad(2.0, 2.0, Color4B::WHITE),
        model_view,
        pipeline,
    ))
}

/// A 2D quad command at global order zero.
pub fn quad_command(pipeline: PipelineDesc) -> RenderCommand {
    RenderCommand::triangles(quad(Mat4::IDENTITY, pipeline), 0.0)
}
