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

//! The D3D12 implementation of [`RenderDevice`].
//!
//! Every object the driver hands out lives in a registry behind one mutex,
//! shared with the render contexts it creates. Destruction never releases
//! native objects directly: they go through the disposal queue, gated by the
//! frame fence value of the last frame that used them.

use super::buffer::D3d12Buffer;
use super::context::D3d12RenderContext;
use super::descriptor_heap::DescriptorHeapSet;
use super::disposal::{Disposable, DisposalQueue};
use super::mipmap::MipmapGenerator;
use super::native::{DxgiFormat, FenceHandle, HeadlessDevice, NativeDevice};
use super::pipeline::PipelineCache;
use super::program::{self, D3d12Program};
use super::registry::Registry;
use super::render_target::D3d12RenderTarget;
use super::sampler_cache::SamplerCache;
use super::texture::D3d12Texture;
use super::transfer::{backend_error, TransferQueue};
use super::vertex_layout::D3d12VertexLayout;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use vesper_core::config::RendererConfig;
use vesper_core::renderer::{
    BufferDescriptor, BufferId, DeviceInfo, Feature, PixelFormat, ProgramDescriptor, ProgramId,
    RenderContext, RenderDevice, RenderError, RenderTargetDescriptor, RenderTargetId,
    ResourceError, SamplerDesc, SamplerHandle, ShaderError, ShaderStage, SurfaceDescriptor,
    TextureDescriptor, TextureId, TextureRegion, TextureUsage, VertexLayoutDesc, VertexLayoutId,
};

/// Everything the driver and its contexts mutate.
#[derive(Debug)]
pub(crate) struct DriverState {
    pub buffers: Registry<D3d12Buffer>,
    pub textures: Registry<D3d12Texture>,
    pub targets: Registry<D3d12RenderTarget>,
    pub programs: Registry<D3d12Program>,
    pub layouts: Registry<D3d12VertexLayout>,
    pub samplers: SamplerCache,
    pub pipelines: PipelineCache,
    pub mipmaps: MipmapGenerator,
    pub transfer: TransferQueue,
    pub disposal: DisposalQueue,
    pub heaps: DescriptorHeapSet,
    /// Frame slot being recorded; selects dynamic buffer backings.
    pub frame_index: usize,
    /// Frame fence value the frame being recorded will signal.
    pub next_frame_value: u64,
}

/// The part of the driver its contexts hold on to.
#[derive(Debug)]
pub(crate) struct DriverShared {
    pub native: Arc<dyn NativeDevice>,
    pub config: RendererConfig,
    pub frame_fence: FenceHandle,
    state: Mutex<DriverState>,
}

impl DriverShared {
    /// Locks the driver state. A panic while it was held does not leave it
    /// unusable: every mutation keeps the registries consistent.
    pub fn lock(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last frame fence value the GPU completed.
    pub fn completed_frame_value(&self) -> u64 {
        self.native.completed_value(self.frame_fence)
    }

    /// Blocks until frame fence `value` has completed.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If the wait fails.
    pub fn wait_frame(&self, value: u64) -> Result<(), ResourceError> {
        if value == 0 || self.completed_frame_value() >= value {
            return Ok(());
        }
        self.native
            .wait(self.frame_fence, value)
            .map_err(backend_error)
    }

    /// Blocks until every submitted frame and isolated copy has completed.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If a wait fails.
    pub fn wait_idle(&self, state: &mut DriverState) -> Result<(), ResourceError> {
        state.transfer.wait_idle()?;
        self.wait_frame(state.next_frame_value - 1)
    }
}

impl Drop for DriverShared {
    fn drop(&mut self) {
        let native = self.native.clone();
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = state.transfer.wait_idle() {
            log::error!("D3d12Driver: failed to drain copies on shutdown: {err}");
        }
        let last = state.next_frame_value - 1;
        if last > 0 && native.completed_value(self.frame_fence) < last {
            if let Err(err) = native.wait(self.frame_fence, last) {
                log::error!("D3d12Driver: failed to drain frames on shutdown: {err}");
            }
        }
        for (_, buffer) in state.buffers.drain() {
            for resource in buffer.backings() {
                state.disposal.push(0, Disposable::Resource(*resource));
            }
        }
        for (_, texture) in state.textures.drain() {
            texture.dispose(0, &mut state.disposal);
        }
        for (_, mut target) in state.targets.drain() {
            target.dispose(&mut state.disposal);
        }
        let released = state.disposal.process_all(native.as_ref(), &mut state.heaps);
        log::debug!("D3d12Driver: released {released} objects on shutdown");
    }
}

/// The D3D12 render device.
///
/// Cloning is cheap and yields another handle to the same device.
#[derive(Debug, Clone)]
pub struct D3d12Driver {
    shared: Arc<DriverShared>,
}

impl D3d12Driver {
    /// Creates the driver over a native device.
    ///
    /// ## Errors
    /// * `RenderError::InitializationFailed` - If a heap, the upload ring or a fence
    ///   cannot be created.
    pub fn new(native: Arc<dyn NativeDevice>, config: RendererConfig) -> Result<Self, RenderError> {
        let config = config.validated();
        let init_error = |what: &str, err: &dyn std::fmt::Display| {
            log::error!("D3d12Driver: failed to create {what}: {err}");
            RenderError::InitializationFailed(format!("{what}: {err}"))
        };

        let heaps = DescriptorHeapSet::new(
            &native,
            config.srv_heap_capacity,
            config.rtv_heap_capacity,
            config.dsv_heap_capacity,
        )
        .map_err(|e| init_error("descriptor heaps", &e))?;
        let samplers = SamplerCache::new(native.clone(), config.sampler_heap_capacity)
            .map_err(|e| init_error("sampler heap", &e))?;
        let transfer = TransferQueue::new(native.clone(), config.upload_ring_size)
            .map_err(|e| init_error("upload ring", &e))?;
        let frame_fence = native
            .create_fence(0)
            .map_err(|e| init_error("frame fence", &e))?;

        let info = native.adapter_info();
        log::info!(
            "D3d12Driver: using '{}' (feature level {})",
            info.description,
            info.feature_level
        );

        let state = DriverState {
            buffers: Registry::new(),
            textures: Registry::new(),
            targets: Registry::new(),
            programs: Registry::new(),
            layouts: Registry::new(),
            samplers,
            pipelines: PipelineCache::new(native.clone()),
            mipmaps: MipmapGenerator::new(native.clone(), config.use_dxc),
            transfer,
            disposal: DisposalQueue::new(),
            heaps,
            frame_index: 0,
            next_frame_value: 1,
        };
        Ok(Self {
            shared: Arc::new(DriverShared {
                native,
                config,
                frame_fence,
                state: Mutex::new(state),
            }),
        })
    }

    /// Creates the driver over an in-memory [`HeadlessDevice`].
    ///
    /// ## Errors
    /// See [`new`](Self::new).
    pub fn headless(config: RendererConfig) -> Result<Self, RenderError> {
        Self::new(Arc::new(HeadlessDevice::new()), config)
    }

    /// The validated configuration.
    pub fn config(&self) -> &RendererConfig {
        &self.shared.config
    }

    /// The native device the driver records against.
    pub fn native(&self) -> &Arc<dyn NativeDevice> {
        &self.shared.native
    }

    /// Objects waiting in the disposal queue.
    pub fn pending_disposals(&self) -> usize {
        self.shared.lock().disposal.len()
    }

    /// Number of cached pipeline state objects.
    pub fn cached_pipeline_count(&self) -> usize {
        self.shared.lock().pipelines.pipeline_count()
    }

    fn texture_format(state: &DriverState, id: TextureId) -> Result<(PixelFormat, TextureUsage), ResourceError> {
        let texture = state.textures.get(id.0).ok_or(ResourceError::InvalidHandle)?;
        Ok((texture.desc().format, texture.desc().usage))
    }

    fn check_color_attachment(state: &DriverState, id: TextureId) -> Result<(), ResourceError> {
        match Self::texture_format(state, id)? {
            (format, TextureUsage::RenderTarget) if !format.is_depth_stencil() => Ok(()),
            (format, usage) => {
                log::error!("D3d12Driver: {format:?} texture with {usage:?} usage cannot be a color attachment");
                Err(ResourceError::UnsupportedFormat(format!("{format:?}")))
            }
        }
    }

    fn check_depth_attachment(state: &DriverState, id: TextureId) -> Result<(), ResourceError> {
        match Self::texture_format(state, id)? {
            (format, TextureUsage::RenderTarget) if format.is_depth_stencil() => Ok(()),
            (format, _) => {
                log::error!("D3d12Driver: {format:?} texture cannot be a depth/stencil attachment");
                Err(ResourceError::UnsupportedFormat(format!("{format:?}")))
            }
        }
    }

    fn upload_level(
        &self,
        id: TextureId,
        data: &[u8],
        width: u32,
        height: u32,
        level: u32,
        compressed: bool,
    ) -> Result<(), ResourceError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let texture = state
            .textures
            .get_mut(id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        let region = TextureRegion {
            width,
            height,
            level,
            ..Default::default()
        };
        let updated = if compressed {
            texture.update_compressed_region(&mut state.transfer, &region, data)?
        } else {
            texture.update_region(&mut state.transfer, &region, data)?
        };
        if updated && level == 0 && texture.generates_mips() {
            state.mipmaps.generate(texture, &mut state.transfer)?;
        }
        Ok(())
    }

    fn with_buffer<R>(
        &self,
        id: BufferId,
        f: impl FnOnce(&mut D3d12Buffer, &dyn NativeDevice, &mut TransferQueue, usize) -> Result<R, ResourceError>,
    ) -> Result<R, ResourceError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let buffer = state
            .buffers
            .get_mut(id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        f(buffer, self.shared.native.as_ref(), &mut state.transfer, state.frame_index)
    }
}

impl RenderDevice for D3d12Driver {
    fn device_info(&self) -> DeviceInfo {
        let info = self.shared.native.adapter_info();
        let vendor = match info.vendor_id {
            0x10DE => "NVIDIA",
            0x1002 => "AMD",
            0x8086 => "Intel",
            0x1414 => "Microsoft",
            _ => "Unknown",
        };
        DeviceInfo {
            vendor: vendor.to_string(),
            renderer: info.description,
            version: format!("Direct3D {}", info.feature_level),
            shading_language_version: if self.shared.config.use_dxc {
                "HLSL 6.0".to_string()
            } else {
                "HLSL 5.1".to_string()
            },
        }
    }

    fn check_feature(&self, feature: Feature) -> bool {
        let native = &self.shared.native;
        match feature {
            Feature::S3tc => native.check_format_support(DxgiFormat::BC2_UNORM),
            Feature::Astc => native.check_format_support(DxgiFormat::ASTC_4X4_UNORM),
            Feature::Bgra8 => native.check_format_support(DxgiFormat::B8G8R8A8_UNORM),
            Feature::Depth24 | Feature::PackedDepthStencil => {
                native.check_format_support(DxgiFormat::D24_UNORM_S8_UINT)
            }
            Feature::VertexArrayObject | Feature::VertexAttribBinding => true,
        }
    }

    fn create_render_context(
        &self,
        surface: &SurfaceDescriptor,
    ) -> Result<Box<dyn RenderContext>, RenderError> {
        let context = D3d12RenderContext::new(self.shared.clone(), surface)?;
        Ok(Box::new(context))
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let buffer = D3d12Buffer::create(
            self.shared.native.as_ref(),
            &mut state.transfer,
            descriptor,
            self.shared.config.max_frames_in_flight,
        )?;
        Ok(BufferId(state.buffers.insert(buffer)))
    }

    fn update_buffer_data(&self, id: BufferId, data: &[u8]) -> Result<(), ResourceError> {
        self.with_buffer(id, |buffer, native, transfer, frame| {
            buffer.update_data(native, transfer, frame, data)
        })
    }

    fn update_buffer_sub_data(
        &self,
        id: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        self.with_buffer(id, |buffer, native, transfer, frame| {
            buffer.update_sub_data(native, transfer, frame, offset, data)
        })
    }

    fn read_buffer(&self, id: BufferId, offset: u64, len: u64) -> Result<Vec<u8>, ResourceError> {
        self.with_buffer(id, |buffer, native, _, frame| {
            buffer.read(native, frame, offset, len)
        })
    }

    fn using_default_stored_data(&self, id: BufferId, enabled: bool) -> Result<(), ResourceError> {
        self.with_buffer(id, |buffer, _, _, _| {
            buffer.set_use_default_data(enabled);
            Ok(())
        })
    }

    fn set_buffer_default_data(&self, id: BufferId, data: &[u8]) -> Result<(), ResourceError> {
        self.with_buffer(id, |buffer, _, _, _| {
            buffer.set_default_data(data);
            Ok(())
        })
    }

    fn restore_buffer_default_data(&self, id: BufferId) -> Result<(), ResourceError> {
        self.with_buffer(id, |buffer, native, transfer, frame| {
            buffer.restore_default_data(native, transfer, frame)
        })
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let buffer = state
            .buffers
            .remove(id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        // Copies run outside the frame fence, so they are waited on here.
        state.transfer.wait_for(buffer.isolated_fence_value)?;
        for resource in buffer.backings() {
            state
                .disposal
                .push(buffer.last_fence_value, Disposable::Resource(*resource));
        }
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let sampler = state.samplers.get_or_create(&descriptor.sampler)?;
        let texture = D3d12Texture::create(
            self.shared.native.as_ref(),
            &mut state.heaps,
            descriptor,
            sampler,
        )?;
        Ok(TextureId(state.textures.insert(texture)))
    }

    fn update_texture_data(
        &self,
        id: TextureId,
        data: &[u8],
        width: u32,
        height: u32,
        level: u32,
    ) -> Result<(), ResourceError> {
        self.upload_level(id, data, width, height, level, false)
    }

    fn update_texture_sub_data(
        &self,
        id: TextureId,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let texture = state
            .textures
            .get_mut(id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        texture.update_region(&mut state.transfer, region, data)?;
        Ok(())
    }

    fn update_texture_compressed_data(
        &self,
        id: TextureId,
        data: &[u8],
        width: u32,
        height: u32,
        level: u32,
    ) -> Result<(), ResourceError> {
        self.upload_level(id, data, width, height, level, true)
    }

    fn update_texture_compressed_sub_data(
        &self,
        id: TextureId,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let texture = state
            .textures
            .get_mut(id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        texture.update_compressed_region(&mut state.transfer, region, data)?;
        Ok(())
    }

    fn update_texture_face_data(
        &self,
        id: TextureId,
        face: u32,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let texture = state
            .textures
            .get_mut(id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        if texture.update_face(&mut state.transfer, face, data)? && texture.generates_mips() {
            state.mipmaps.generate(texture, &mut state.transfer)?;
        }
        Ok(())
    }

    fn generate_mipmaps(&self, id: TextureId) -> Result<(), ResourceError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let texture = state
            .textures
            .get_mut(id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        state.mipmaps.generate(texture, &mut state.transfer)
    }

    fn update_texture_sampler(
        &self,
        id: TextureId,
        sampler: &SamplerDesc,
    ) -> Result<(), ResourceError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let handle = state.samplers.get_or_create(sampler)?;
        let texture = state
            .textures
            .get_mut(id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        texture.sampler = handle;
        Ok(())
    }

    fn texture_descriptor(&self, id: TextureId) -> Option<TextureDescriptor> {
        self.shared
            .lock()
            .textures
            .get(id.0)
            .map(|texture| texture.desc().clone())
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let texture = state
            .textures
            .remove(id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        state.transfer.wait_for(texture.isolated_fence_value)?;
        texture.dispose(texture.last_fence_value, &mut state.disposal);
        Ok(())
    }

    fn create_render_target(
        &self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<RenderTargetId, ResourceError> {
        let mut state = self.shared.lock();
        for id in descriptor.color.iter().flatten() {
            Self::check_color_attachment(&state, *id)?;
        }
        if let Some(id) = descriptor.depth_stencil {
            Self::check_depth_attachment(&state, id)?;
        }
        let id = state.targets.insert(D3d12RenderTarget::new(*descriptor));
        log::debug!(
            "D3d12Driver: created render target {id} with {:?}",
            descriptor.attachment_flags()
        );
        Ok(RenderTargetId(id))
    }

    fn set_render_target_color(
        &self,
        id: RenderTargetId,
        index: usize,
        texture: Option<TextureId>,
    ) -> Result<(), ResourceError> {
        if id.is_default() {
            return Err(ResourceError::InvalidHandle);
        }
        let mut state = self.shared.lock();
        if let Some(texture) = texture {
            Self::check_color_attachment(&state, texture)?;
        }
        state
            .targets
            .get_mut(id.0)
            .ok_or(ResourceError::InvalidHandle)?
            .set_color(index, texture)
    }

    fn set_render_target_depth_stencil(
        &self,
        id: RenderTargetId,
        texture: Option<TextureId>,
    ) -> Result<(), ResourceError> {
        if id.is_default() {
            return Err(ResourceError::InvalidHandle);
        }
        let mut state = self.shared.lock();
        if let Some(texture) = texture {
            Self::check_depth_attachment(&state, texture)?;
        }
        state
            .targets
            .get_mut(id.0)
            .ok_or(ResourceError::InvalidHandle)?
            .set_depth_stencil(texture);
        Ok(())
    }

    fn render_target_attachments(&self, id: RenderTargetId) -> Option<RenderTargetDescriptor> {
        self.shared
            .lock()
            .targets
            .get(id.0)
            .map(|target| *target.attachments())
    }

    fn destroy_render_target(&self, id: RenderTargetId) -> Result<(), ResourceError> {
        if id.is_default() {
            return Err(ResourceError::InvalidHandle);
        }
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let mut target = state
            .targets
            .remove(id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        target.dispose(&mut state.disposal);
        Ok(())
    }

    fn create_program(&self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ResourceError> {
        let program = D3d12Program::new(descriptor)?;
        log::debug!("D3d12Driver: created program '{}'", program.label);
        Ok(ProgramId(self.shared.lock().programs.insert(program)))
    }

    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        state
            .programs
            .remove(id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        // The frame being recorded may have bound these already.
        state
            .pipelines
            .remove_cached_objects(id, state.next_frame_value, &mut state.disposal);
        Ok(())
    }

    fn create_vertex_layout(
        &self,
        desc: &VertexLayoutDesc,
    ) -> Result<VertexLayoutId, ResourceError> {
        if !desc.is_valid() {
            log::error!("D3d12Driver: vertex layout without a stride");
            return Err(ResourceError::BackendError("vertex layout has no stride".into()));
        }
        let layout = D3d12VertexLayout::new(desc.clone());
        Ok(VertexLayoutId(self.shared.lock().layouts.insert(layout)))
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle, ResourceError> {
        self.shared.lock().samplers.get_or_create(desc)
    }

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<Vec<u8>, ShaderError> {
        program::compile_shader(
            self.shared.native.as_ref(),
            stage,
            source,
            self.shared.config.use_dxc,
        )
    }

    fn clean_pending_resources(&self) {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        if let Err(err) = self.shared.wait_idle(state) {
            log::error!("D3d12Driver: failed to wait for the GPU: {err}");
            return;
        }
        let released = state
            .disposal
            .process_all(self.shared.native.as_ref(), &mut state.heaps);
        log::debug!("D3d12Driver: released {released} pending objects");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use vesper_core::renderer::{
        BufferType, BufferUsage, SamplerIndex, TextureType,
    };

    fn driver() -> (Arc<HeadlessDevice>, D3d12Driver) {
        let device = Arc::new(HeadlessDevice::new());
        let driver = D3d12Driver::new(device.clone(), RendererConfig::default()).unwrap();
        (device, driver)
    }

    fn color_texture(driver: &D3d12Driver, usage: TextureUsage, format: PixelFormat) -> TextureId {
        driver
            .create_texture(&TextureDescriptor {
                format,
                usage,
                width: 16,
                height: 16,
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn device_info_reports_adapter_and_api() {
        let (_, driver) = driver();
        let info = driver.device_info();
        assert_eq!(info.vendor, "Microsoft");
        assert_eq!(info.renderer, "Vesper Headless Adapter");
        assert_eq!(info.version, "Direct3D 12.0");
        assert_eq!(info.shading_language_version, "HLSL 5.1");
    }

    #[test]
    fn features_follow_format_support() {
        let (device, driver) = driver();
        device.set_format_supported(DxgiFormat::ASTC_4X4_UNORM, false);
        device.set_format_supported(DxgiFormat::B8G8R8A8_UNORM, false);

        assert!(!driver.check_feature(Feature::Astc));
        assert!(!driver.check_feature(Feature::Bgra8));
        assert!(driver.check_feature(Feature::S3tc));
        assert!(driver.check_feature(Feature::PackedDepthStencil));
        assert!(driver.check_feature(Feature::VertexArrayObject));
    }

    #[test]
    fn dynamic_sub_update_leaves_the_rest_untouched() {
        // --- 1. ARRANGE ---
        let (_, driver) = driver();
        let id = driver
            .create_buffer(&BufferDescriptor {
                label: Some(Cow::Borrowed("dynamic")),
                size: 1024,
                buffer_type: BufferType::Vertex,
                usage: BufferUsage::Dynamic,
                initial_data: None,
                retain_default_data: false,
            })
            .unwrap();
        let data: Vec<u8> = (0..512u32).map(|i| (i % 251) as u8).collect();

        // --- 2. ACT ---
        driver.update_buffer_sub_data(id, 512, &data).unwrap();
        let contents = driver.read_buffer(id, 0, 1024).unwrap();

        // --- 3. ASSERT ---
        assert_eq!(&contents[512..], data.as_slice());
        assert!(contents[..512].iter().all(|b| *b == 0));
    }

    #[test]
    fn writes_past_the_end_are_rejected() {
        let (_, driver) = driver();
        let id = driver
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 64,
                buffer_type: BufferType::Index,
                usage: BufferUsage::Static,
                initial_data: None,
                retain_default_data: false,
            })
            .unwrap();
        let err = driver.update_buffer_sub_data(id, 60, &[0; 8]).unwrap_err();
        assert!(matches!(err, ResourceError::OutOfBounds));
        assert!(driver.update_buffer_sub_data(id, 60, &[]).is_ok());
    }

    #[test]
    fn default_data_is_restored() {
        let (device, driver) = driver();
        let id = driver
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 4,
                buffer_type: BufferType::Vertex,
                usage: BufferUsage::Static,
                initial_data: Some(Cow::Borrowed(&[1, 2, 3, 4])),
                retain_default_data: true,
            })
            .unwrap();

        driver.update_buffer_sub_data(id, 0, &[9, 9, 9, 9]).unwrap();
        driver.restore_buffer_default_data(id).unwrap();

        let state = driver.shared.lock();
        let resource = state.buffers.get(id.0).unwrap().backings()[0];
        assert_eq!(device.buffer_contents(resource).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn auto_mip_texture_generates_its_chain_on_upload() {
        // --- 1. ARRANGE ---
        let (device, driver) = driver();
        let id = driver
            .create_texture(&TextureDescriptor {
                width: 32,
                height: 32,
                mip_levels: 0,
                ..Default::default()
            })
            .unwrap();

        // --- 2. ACT ---
        driver
            .update_texture_data(id, &vec![255; 32 * 32 * 4], 32, 32, 0)
            .unwrap();

        // --- 3. ASSERT ---
        assert_eq!(driver.texture_descriptor(id).unwrap().mip_levels, 6);
        assert_eq!(device.dispatch_count(), 5);
    }

    #[test]
    fn explicit_mip_uploads_do_not_dispatch() {
        let (device, driver) = driver();
        let id = driver
            .create_texture(&TextureDescriptor {
                width: 8,
                height: 8,
                mip_levels: 4,
                ..Default::default()
            })
            .unwrap();
        driver.update_texture_data(id, &[0; 8 * 8 * 4], 8, 8, 0).unwrap();
        driver.update_texture_data(id, &[0; 4 * 4 * 4], 4, 4, 1).unwrap();
        assert_eq!(device.dispatch_count(), 0);
    }

    #[test]
    fn cube_faces_are_validated() {
        let (_, driver) = driver();
        let cube = driver
            .create_texture(&TextureDescriptor {
                texture_type: TextureType::TextureCube,
                width: 4,
                height: 4,
                ..Default::default()
            })
            .unwrap();
        assert!(driver.update_texture_face_data(cube, 5, &[0; 64]).is_ok());
        assert!(matches!(
            driver.update_texture_face_data(cube, 6, &[0; 64]),
            Err(ResourceError::OutOfBounds)
        ));
    }

    #[test]
    fn equal_sampler_descriptors_share_a_handle() {
        let (_, driver) = driver();
        let a = driver.create_sampler(&SamplerIndex::LinearClamp.desc()).unwrap();
        let b = driver.create_sampler(&SamplerIndex::LinearClamp.desc()).unwrap();
        let c = driver.create_sampler(&SamplerIndex::PointWrap.desc()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn render_target_attachments_are_validated() {
        // --- 1. ARRANGE ---
        let (_, driver) = driver();
        let color = color_texture(&driver, TextureUsage::RenderTarget, PixelFormat::RGBA8);
        let sampled = color_texture(&driver, TextureUsage::Read, PixelFormat::RGBA8);
        let depth = color_texture(&driver, TextureUsage::RenderTarget, PixelFormat::D24S8);

        // --- 2. ACT ---
        let valid = driver.create_render_target(&RenderTargetDescriptor {
            color: [Some(color), None, None, None],
            depth_stencil: Some(depth),
        });
        let sampled_color = driver.create_render_target(&RenderTargetDescriptor {
            color: [Some(sampled), None, None, None],
            depth_stencil: None,
        });
        let depth_as_color = driver.create_render_target(&RenderTargetDescriptor {
            color: [Some(depth), None, None, None],
            depth_stencil: None,
        });

        // --- 3. ASSERT ---
        let id = valid.unwrap();
        assert!(!id.is_default());
        assert!(sampled_color.is_err());
        assert!(depth_as_color.is_err());
        assert_eq!(
            driver.render_target_attachments(id).unwrap().depth_stencil,
            Some(depth)
        );
        assert!(matches!(
            driver.set_render_target_color(RenderTargetId::DEFAULT, 0, Some(color)),
            Err(ResourceError::InvalidHandle)
        ));
    }

    #[test]
    fn destroyed_objects_wait_for_cleanup() {
        let (device, driver) = driver();
        let texture = color_texture(&driver, TextureUsage::Read, PixelFormat::RGBA8);
        let resource = driver.shared.lock().textures.get(texture.0).unwrap().resource();

        driver.destroy_texture(texture).unwrap();
        assert_eq!(driver.pending_disposals(), 2);
        assert!(driver.texture_descriptor(texture).is_none());

        driver.clean_pending_resources();
        assert_eq!(driver.pending_disposals(), 0);
        assert!(!device.is_live(resource));
        assert!(matches!(
            driver.destroy_texture(texture),
            Err(ResourceError::InvalidHandle)
        ));
    }

    #[test]
    fn shader_compilation_reports_missing_entry_points() {
        let (_, driver) = driver();
        let bytecode = driver
            .compile_shader(ShaderStage::Vertex, "float4 main() : SV_Position { return 0; }")
            .unwrap();
        assert!(bytecode.starts_with(b"DXBC"));

        let err = driver
            .compile_shader(ShaderStage::Vertex, "float4 entry() : SV_Position { return 0; }")
            .unwrap_err();
        assert!(matches!(err, ShaderError::MissingEntryPoint { .. }));
    }

    #[test]
    fn programs_need_both_stages() {
        let (_, driver) = driver();
        let result = driver.create_program(&ProgramDescriptor {
            label: None,
            vertex_bytecode: Cow::Borrowed(b"DXBC"),
            fragment_bytecode: Cow::Borrowed(&[]),
            reflection: Default::default(),
        });
        assert!(matches!(result, Err(ResourceError::Shader(_))));
    }
}
