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
use crate::renderer::error::{RenderError, ResourceError, ShaderError};
use crate::renderer::traits::RenderContext;
use std::fmt::Debug;

/// The resource factory every graphics backend implements.
///
/// All methods take `&self`: implementations keep their mutable state behind
/// interior locks so the device can be shared through an `Arc` between the
/// renderer and asset-loading code. Destruction is always deferred until the
/// GPU has retired every frame that may still reference the resource.
pub trait RenderDevice: Send + Sync + Debug + 'static {
    /// Identification of the adapter and API.
    fn device_info(&self) -> DeviceInfo;

    /// Returns `true` if the device supports `feature`.
    fn check_feature(&self, feature: Feature) -> bool;

    /// Creates the frame driver for a surface.
    /// ## Arguments
    /// * `surface` - The window (or offscreen size) to present into.
    /// ## Errors
    /// * `RenderError::InitializationFailed` - If the swapchain or the frame resources cannot be created.
    fn create_render_context(
        &self,
        surface: &SurfaceDescriptor,
    ) -> Result<Box<dyn RenderContext>, RenderError>;

    /// Creates a new GPU buffer.
    /// ## Arguments
    /// * `descriptor` - Size, type, usage and optional initial contents.
    /// ## Returns
    /// The ID of the created buffer. An `Immutable` buffer without initial data
    /// still gets an ID but owns no native resource.
    /// ## Errors
    /// * `ResourceError::BackendError` - If the native allocation fails.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Replaces the whole content of a buffer from offset 0.
    fn update_buffer_data(&self, id: BufferId, data: &[u8]) -> Result<(), ResourceError>;

    /// Writes `data` at byte `offset`. An empty slice is a no-op.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the write exceeds the buffer size.
    fn update_buffer_sub_data(
        &self,
        id: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError>;

    /// Reads `len` bytes at `offset` through the CPU mapping.
    ///
    /// Only `Dynamic` and `PixelPack` buffers are CPU-visible.
    fn read_buffer(&self, id: BufferId, offset: u64, len: u64) -> Result<Vec<u8>, ResourceError>;

    /// Turns the CPU shadow copy of a buffer on or off.
    fn using_default_stored_data(&self, id: BufferId, enabled: bool) -> Result<(), ResourceError>;

    /// Replaces the CPU shadow copy used to restore the buffer.
    fn set_buffer_default_data(&self, id: BufferId, data: &[u8]) -> Result<(), ResourceError>;

    /// Re-uploads the CPU shadow copy, if any.
    fn restore_buffer_default_data(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Queues a buffer for release once the GPU no longer uses it.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Creates a new GPU texture.
    /// ## Errors
    /// * `ResourceError::UnsupportedFormat` - If the device cannot create the pixel format.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Uploads a whole mip level of layer 0.
    ///
    /// Uploading level 0 of a texture created with `mip_levels == 0` also
    /// generates the rest of the chain.
    fn update_texture_data(
        &self,
        id: TextureId,
        data: &[u8],
        width: u32,
        height: u32,
        level: u32,
    ) -> Result<(), ResourceError>;

    /// Uploads a sub-rectangle of one mip level and layer.
    fn update_texture_sub_data(
        &self,
        id: TextureId,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), ResourceError>;

    /// Uploads a whole block-compressed mip level of layer 0.
    fn update_texture_compressed_data(
        &self,
        id: TextureId,
        data: &[u8],
        width: u32,
        height: u32,
        level: u32,
    ) -> Result<(), ResourceError>;

    /// Uploads a block-aligned sub-rectangle of a compressed mip level.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the region is not aligned to the compression block.
    fn update_texture_compressed_sub_data(
        &self,
        id: TextureId,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), ResourceError>;

    /// Uploads level 0 of one cube face (`0..6`).
    fn update_texture_face_data(
        &self,
        id: TextureId,
        face: u32,
        data: &[u8],
    ) -> Result<(), ResourceError>;

    /// Regenerates every mip level below level 0 on the GPU.
    fn generate_mipmaps(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Assigns a different sampler to a texture.
    fn update_texture_sampler(&self, id: TextureId, sampler: &SamplerDesc)
        -> Result<(), ResourceError>;

    /// The descriptor a texture was created with, with `mip_levels` resolved.
    fn texture_descriptor(&self, id: TextureId) -> Option<TextureDescriptor>;

    /// Queues a texture for release once the GPU no longer uses it.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates an offscreen render target.
    fn create_render_target(
        &self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<RenderTargetId, ResourceError>;

    /// Replaces one color attachment. Views are rebuilt at the next pass.
    fn set_render_target_color(
        &self,
        id: RenderTargetId,
        index: usize,
        texture: Option<TextureId>,
    ) -> Result<(), ResourceError>;

    /// Replaces the depth/stencil attachment. Views are rebuilt at the next pass.
    fn set_render_target_depth_stencil(
        &self,
        id: RenderTargetId,
        texture: Option<TextureId>,
    ) -> Result<(), ResourceError>;

    /// The attachments of an offscreen render target.
    fn render_target_attachments(&self, id: RenderTargetId) -> Option<RenderTargetDescriptor>;

    /// Releases an offscreen render target and its views.
    fn destroy_render_target(&self, id: RenderTargetId) -> Result<(), ResourceError>;

    /// Creates a program from compiled bytecode and its reflection.
    fn create_program(&self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ResourceError>;

    /// Destroys a program and evicts every pipeline object built from it.
    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError>;

    /// Registers a vertex layout.
    fn create_vertex_layout(&self, desc: &VertexLayoutDesc)
        -> Result<VertexLayoutId, ResourceError>;

    /// Interns a sampler. Equal descriptors return the same handle.
    /// ## Errors
    /// * `ResourceError::OutOfDescriptors` - If the sampler registry is full.
    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle, ResourceError>;

    /// Compiles shader source to bytecode accepted by [`create_program`](Self::create_program).
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<Vec<u8>, ShaderError>;

    /// Waits for the GPU and releases every resource queued for destruction.
    fn clean_pending_resources(&self);
}
