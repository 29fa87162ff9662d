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

//! Render targets: offscreen attachment sets and the screen.
//!
//! Views are rebuilt lazily. Changing an attachment only raises its dirty
//! bit, and the new RTV/DSV is written at the start of the next pass while
//! the old one goes through the disposal queue. Ending a pass on the screen
//! leaves the back buffer ready to present; ending one on an offscreen target
//! leaves its color attachments ready to be sampled.

use super::descriptor_heap::{DescriptorHandle, DescriptorHeapSet};
use super::disposal::{Disposable, DisposalQueue};
use super::native::{
    CommandList, CpuDescriptor, DxgiFormat, NativeCommand, NativeDevice, NativeError,
    ResourceHandle, ResourceStates, RtvDesc, SwapchainHandle,
};
use super::pipeline::TargetFormats;
use super::registry::Registry;
use super::texture::D3d12Texture;
use super::transfer::backend_error;
use vesper_core::renderer::{
    PixelFormat, RenderPassDesc, RenderTargetDescriptor, ResourceError, SamplerHandle,
    SurfaceDescriptor, TargetBufferFlags, TextureDescriptor, TextureId, TextureUsage,
    MAX_COLOR_ATTACHMENT,
};

/// Format of the screen's back buffers.
pub const SWAPCHAIN_FORMAT: DxgiFormat = DxgiFormat::R8G8B8A8_UNORM;

/// The device objects needed to write and retire views.
pub struct ViewEnv<'a> {
    pub native: &'a dyn NativeDevice,
    pub heaps: &'a mut DescriptorHeapSet,
    pub disposal: &'a mut DisposalQueue,
}

/// What a pass bound, as seen by pipeline resolution and scissor clamping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundTargets {
    /// Color views in slot order.
    pub rtvs: Vec<CpuDescriptor>,
    /// Depth/stencil view.
    pub dsv: Option<CpuDescriptor>,
    /// Formats of the bound attachments.
    pub formats: TargetFormats,
    /// Width of the attachments.
    pub width: u32,
    /// Height of the attachments.
    pub height: u32,
}

fn create_rtv(
    native: &dyn NativeDevice,
    heaps: &mut DescriptorHeapSet,
    texture: &D3d12Texture,
) -> Result<DescriptorHandle, ResourceError> {
    let handle = heaps.rtv.allocate()?;
    native.create_render_target_view(
        texture.resource(),
        &RtvDesc {
            format: texture.format(),
            mip_slice: 0,
            array_slice: 0,
        },
        handle.cpu,
    );
    Ok(handle)
}

fn create_dsv(
    native: &dyn NativeDevice,
    heaps: &mut DescriptorHeapSet,
    texture: &D3d12Texture,
) -> Result<DescriptorHandle, ResourceError> {
    let handle = heaps.dsv.allocate()?;
    native.create_depth_stencil_view(texture.resource(), texture.format(), handle.cpu);
    Ok(handle)
}

/// Records discards, clears and the OM binding that open a pass.
fn open_pass(
    list: &mut CommandList,
    colors: &[(CpuDescriptor, ResourceHandle)],
    depth: Option<(CpuDescriptor, ResourceHandle)>,
    desc: &RenderPassDesc,
) {
    let flags = desc.flags;
    for (index, (rtv, resource)) in colors.iter().enumerate() {
        let bit = TargetBufferFlags::color(index);
        if flags.clear.contains(bit) {
            list.record(NativeCommand::ClearRenderTargetView {
                rtv: *rtv,
                color: desc.clear_color,
            });
        } else if flags.discard_start.contains(bit) {
            list.record(NativeCommand::DiscardResource(*resource));
        }
    }
    if let Some((dsv, resource)) = depth {
        let clear_depth = flags.clear.contains(TargetBufferFlags::DEPTH);
        let clear_stencil = flags.clear.contains(TargetBufferFlags::STENCIL);
        if clear_depth || clear_stencil {
            list.record(NativeCommand::ClearDepthStencilView {
                dsv,
                clear_depth,
                clear_stencil,
                depth: desc.clear_depth,
                stencil: desc.clear_stencil,
            });
        } else if flags.discard_start.intersects(TargetBufferFlags::DEPTH_AND_STENCIL) {
            list.record(NativeCommand::DiscardResource(resource));
        }
    }
    list.record(NativeCommand::OmSetRenderTargets {
        rtvs: colors.iter().map(|(rtv, _)| *rtv).collect(),
        dsv: depth.map(|(dsv, _)| dsv),
    });
}

/// An offscreen render target over registered textures.
#[derive(Debug)]
pub struct D3d12RenderTarget {
    attachments: RenderTargetDescriptor,
    dirty: TargetBufferFlags,
    rtvs: [Option<DescriptorHandle>; MAX_COLOR_ATTACHMENT],
    dsv: Option<DescriptorHandle>,
    /// Frame fence value of the last pass rendered into it.
    pub last_fence_value: u64,
}

impl D3d12RenderTarget {
    /// A target whose views are all built by the first pass.
    pub fn new(attachments: RenderTargetDescriptor) -> Self {
        Self {
            attachments,
            dirty: TargetBufferFlags::ALL,
            rtvs: [None; MAX_COLOR_ATTACHMENT],
            dsv: None,
            last_fence_value: 0,
        }
    }

    pub fn attachments(&self) -> &RenderTargetDescriptor {
        &self.attachments
    }

    /// Attachments whose views are stale.
    pub fn dirty(&self) -> TargetBufferFlags {
        self.dirty
    }

    /// Replaces color attachment `index`.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If `index` is not a color slot.
    pub fn set_color(&mut self, index: usize, texture: Option<TextureId>) -> Result<(), ResourceError> {
        let slot = self
            .attachments
            .color
            .get_mut(index)
            .ok_or(ResourceError::OutOfBounds)?;
        *slot = texture;
        self.dirty.insert(TargetBufferFlags::color(index));
        Ok(())
    }

    /// Replaces the depth/stencil attachment.
    pub fn set_depth_stencil(&mut self, texture: Option<TextureId>) {
        self.attachments.depth_stencil = texture;
        self.dirty.insert(TargetBufferFlags::DEPTH_AND_STENCIL);
    }

    fn rebuild_views(
        &mut self,
        env: &mut ViewEnv<'_>,
        textures: &Registry<D3d12Texture>,
    ) -> Result<(), ResourceError> {
        for index in 0..MAX_COLOR_ATTACHMENT {
            if !self.dirty.contains(TargetBufferFlags::color(index)) {
                continue;
            }
            if let Some(old) = self.rtvs[index].take() {
                env.disposal.push(self.last_fence_value, Disposable::Rtv(old));
            }
            if let Some(texture) = self.attachments.color[index].and_then(|id| textures.get(id.0)) {
                self.rtvs[index] = Some(create_rtv(env.native, env.heaps, texture)?);
            }
        }
        if self.dirty.intersects(TargetBufferFlags::DEPTH_AND_STENCIL) {
            if let Some(old) = self.dsv.take() {
                env.disposal.push(self.last_fence_value, Disposable::Dsv(old));
            }
            if let Some(texture) = self.attachments.depth_stencil.and_then(|id| textures.get(id.0)) {
                self.dsv = Some(create_dsv(env.native, env.heaps, texture)?);
            }
        }
        self.dirty = TargetBufferFlags::EMPTY;
        Ok(())
    }

    /// Rebuilds stale views, transitions the attachments, clears what `desc`
    /// asks for and binds the views.
    pub fn begin_pass(
        &mut self,
        env: &mut ViewEnv<'_>,
        textures: &mut Registry<D3d12Texture>,
        list: &mut CommandList,
        desc: &RenderPassDesc,
        fence_value: u64,
    ) -> Result<BoundTargets, ResourceError> {
        if !self.dirty.is_empty() {
            self.rebuild_views(env, textures)?;
        }
        self.last_fence_value = fence_value;

        let mut bound = BoundTargets::default();
        let mut colors = Vec::new();
        // Color slots are bound contiguously from slot 0.
        for index in 0..MAX_COLOR_ATTACHMENT {
            let (Some(id), Some(rtv)) = (self.attachments.color[index], self.rtvs[index]) else {
                break;
            };
            let Some(texture) = textures.get_mut(id.0) else {
                log::warn!("D3d12RenderTarget: color attachment {index} was destroyed");
                break;
            };
            texture.transition(list, None, ResourceStates::RENDER_TARGET);
            texture.last_fence_value = fence_value;
            bound.formats.color.push(texture.format());
            bound.width = texture.desc().width;
            bound.height = texture.desc().height;
            colors.push((rtv.cpu, texture.resource()));
        }

        let mut depth = None;
        if let (Some(id), Some(dsv)) = (self.attachments.depth_stencil, self.dsv) {
            if let Some(texture) = textures.get_mut(id.0) {
                texture.transition(list, None, ResourceStates::DEPTH_WRITE);
                texture.last_fence_value = fence_value;
                bound.formats.depth_stencil = texture.format();
                if colors.is_empty() {
                    bound.width = texture.desc().width;
                    bound.height = texture.desc().height;
                }
                depth = Some((dsv.cpu, texture.resource()));
            }
        }

        open_pass(list, &colors, depth, desc);
        bound.rtvs = colors.iter().map(|(rtv, _)| *rtv).collect();
        bound.dsv = depth.map(|(dsv, _)| dsv);
        Ok(bound)
    }

    /// Returns the attachments to their shader-readable state.
    pub fn end_pass(
        &mut self,
        textures: &mut Registry<D3d12Texture>,
        list: &mut CommandList,
        desc: &RenderPassDesc,
    ) {
        let discard = desc.flags.discard_end;
        for index in 0..MAX_COLOR_ATTACHMENT {
            let Some(texture) = self.attachments.color[index].and_then(|id| textures.get_mut(id.0))
            else {
                break;
            };
            if discard.contains(TargetBufferFlags::color(index)) {
                list.record(NativeCommand::DiscardResource(texture.resource()));
            }
            let steady = texture.steady_state();
            texture.transition(list, None, steady);
        }
        if let Some(texture) = self.attachments.depth_stencil.and_then(|id| textures.get_mut(id.0)) {
            if discard.intersects(TargetBufferFlags::DEPTH_AND_STENCIL) {
                list.record(NativeCommand::DiscardResource(texture.resource()));
            }
            let steady = texture.steady_state();
            texture.transition(list, None, steady);
        }
    }

    /// Queues every view for release.
    pub fn dispose(&mut self, disposal: &mut DisposalQueue) {
        for rtv in self.rtvs.iter_mut().filter_map(Option::take) {
            disposal.push(self.last_fence_value, Disposable::Rtv(rtv));
        }
        if let Some(dsv) = self.dsv.take() {
            disposal.push(self.last_fence_value, Disposable::Dsv(dsv));
        }
        self.dirty = TargetBufferFlags::ALL;
    }
}

/// The default render target: back buffers plus a D24S8 depth buffer.
///
/// With a window the back buffers are the swapchain's images, wrapped as
/// non-owned textures. Without one they are ordinary render-target textures
/// rotated on every present.
#[derive(Debug)]
pub struct ScreenTarget {
    swapchain: Option<SwapchainHandle>,
    buffer_count: u32,
    buffers: Vec<D3d12Texture>,
    rtvs: Vec<DescriptorHandle>,
    depth: Option<D3d12Texture>,
    dsv: Option<DescriptorHandle>,
    current: usize,
    width: u32,
    height: u32,
    generation: u64,
    /// Frame fence value of the last pass rendered into it.
    pub last_fence_value: u64,
}

impl ScreenTarget {
    /// Creates the swapchain (if `surface` has a window) and the attachments.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If the swapchain or a buffer cannot be created.
    pub fn new(
        env: &mut ViewEnv<'_>,
        surface: &SurfaceDescriptor,
        buffer_count: u32,
    ) -> Result<Self, ResourceError> {
        let buffer_count = buffer_count.max(2);
        let width = surface.width.max(1);
        let height = surface.height.max(1);
        let swapchain = match surface.window {
            Some(window) => Some(
                env.native
                    .create_swapchain(window, width, height, buffer_count, SWAPCHAIN_FORMAT)
                    .map_err(|err| {
                        log::error!("ScreenTarget: swapchain creation failed: {err}");
                        backend_error(err)
                    })?,
            ),
            None => None,
        };
        let mut target = Self {
            swapchain,
            buffer_count,
            buffers: Vec::new(),
            rtvs: Vec::new(),
            depth: None,
            dsv: None,
            current: 0,
            width,
            height,
            generation: 0,
            last_fence_value: 0,
        };
        target.build(env, false)?;
        Ok(target)
    }

    fn build(&mut self, env: &mut ViewEnv<'_>, resize: bool) -> Result<(), ResourceError> {
        match self.swapchain {
            Some(chain) => {
                if resize {
                    env.native
                        .resize_swapchain(chain, self.width, self.height)
                        .map_err(backend_error)?;
                }
                for index in 0..self.buffer_count {
                    let resource = env
                        .native
                        .swapchain_buffer(chain, index)
                        .map_err(backend_error)?;
                    self.buffers.push(D3d12Texture::wrap(
                        resource,
                        SWAPCHAIN_FORMAT,
                        self.width,
                        self.height,
                        ResourceStates::PRESENT,
                    ));
                }
            }
            None => {
                let desc = TextureDescriptor {
                    format: PixelFormat::RGBA8,
                    usage: TextureUsage::RenderTarget,
                    width: self.width,
                    height: self.height,
                    ..TextureDescriptor::default()
                };
                for _ in 0..self.buffer_count {
                    self.buffers
                        .push(D3d12Texture::create(env.native, env.heaps, &desc, SamplerHandle(0))?);
                }
            }
        }
        for buffer in &self.buffers {
            self.rtvs.push(create_rtv(env.native, env.heaps, buffer)?);
        }

        let depth_desc = TextureDescriptor {
            format: PixelFormat::D24S8,
            usage: TextureUsage::RenderTarget,
            width: self.width,
            height: self.height,
            ..TextureDescriptor::default()
        };
        match D3d12Texture::create(env.native, env.heaps, &depth_desc, SamplerHandle(0)) {
            Ok(depth) => {
                self.dsv = Some(create_dsv(env.native, env.heaps, &depth)?);
                self.depth = Some(depth);
            }
            Err(err) => log::warn!("ScreenTarget: rendering without a depth buffer: {err}"),
        }
        self.current = 0;
        self.generation += 1;
        log::debug!(
            "ScreenTarget: generation {} with {} {}x{} buffers",
            self.generation,
            self.buffers.len(),
            self.width,
            self.height
        );
        Ok(())
    }

    fn release_attachments(&mut self, disposal: &mut DisposalQueue) {
        let fence = self.last_fence_value;
        for rtv in self.rtvs.drain(..) {
            disposal.push(fence, Disposable::Rtv(rtv));
        }
        if let Some(dsv) = self.dsv.take() {
            disposal.push(fence, Disposable::Dsv(dsv));
        }
        for buffer in self.buffers.drain(..) {
            buffer.dispose(fence, disposal);
        }
        if let Some(depth) = self.depth.take() {
            depth.dispose(fence, disposal);
        }
    }

    /// Rebuilds every attachment at a new size. The GPU must be idle.
    pub fn resize(&mut self, env: &mut ViewEnv<'_>, width: u32, height: u32) -> Result<(), ResourceError> {
        self.release_attachments(env.disposal);
        self.width = width.max(1);
        self.height = height.max(1);
        self.build(env, true)
    }

    /// Index of the back buffer rendered into this frame.
    pub fn current_index(&self, native: &dyn NativeDevice) -> usize {
        let count = self.buffers.len().max(1);
        match self.swapchain {
            Some(chain) => native.current_back_buffer_index(chain) as usize % count,
            None => self.current % count,
        }
    }

    /// The back buffer rendered into this frame.
    pub fn current_buffer_mut(&mut self, native: &dyn NativeDevice) -> Option<&mut D3d12Texture> {
        let index = self.current_index(native);
        self.buffers.get_mut(index)
    }

    /// Back buffer `index`.
    pub fn buffer_mut(&mut self, index: usize) -> Option<&mut D3d12Texture> {
        self.buffers.get_mut(index)
    }

    /// Transitions the current back buffer and the depth buffer, clears and binds.
    pub fn begin_pass(
        &mut self,
        native: &dyn NativeDevice,
        list: &mut CommandList,
        desc: &RenderPassDesc,
        fence_value: u64,
    ) -> Result<BoundTargets, ResourceError> {
        self.last_fence_value = fence_value;
        let index = self.current_index(native);
        let rtv = self
            .rtvs
            .get(index)
            .copied()
            .ok_or_else(|| ResourceError::BackendError("screen target has no back buffer".into()))?;
        let buffer = self
            .buffers
            .get_mut(index)
            .ok_or_else(|| ResourceError::BackendError("screen target has no back buffer".into()))?;
        buffer.transition(list, None, ResourceStates::RENDER_TARGET);
        let colors = [(rtv.cpu, buffer.resource())];
        let mut bound = BoundTargets {
            rtvs: vec![rtv.cpu],
            dsv: None,
            formats: TargetFormats {
                color: vec![buffer.format()],
                depth_stencil: DxgiFormat::UNKNOWN,
            },
            width: self.width,
            height: self.height,
        };

        let mut depth = None;
        if let (Some(texture), Some(dsv)) = (self.depth.as_mut(), self.dsv) {
            texture.transition(list, None, ResourceStates::DEPTH_WRITE);
            bound.formats.depth_stencil = texture.format();
            bound.dsv = Some(dsv.cpu);
            depth = Some((dsv.cpu, texture.resource()));
        }
        open_pass(list, &colors, depth, desc);
        Ok(bound)
    }

    /// Leaves the current back buffer ready to present.
    pub fn end_pass(&mut self, native: &dyn NativeDevice, list: &mut CommandList, desc: &RenderPassDesc) {
        let index = self.current_index(native);
        if let Some(buffer) = self.buffers.get_mut(index) {
            buffer.transition(list, None, ResourceStates::PRESENT);
        }
        if desc.flags.discard_end.intersects(TargetBufferFlags::DEPTH_AND_STENCIL) {
            if let Some(depth) = &self.depth {
                list.record(NativeCommand::DiscardResource(depth.resource()));
            }
        }
    }

    /// Presents the swapchain, or rotates the offscreen buffers.
    ///
    /// ## Errors
    /// * `NativeError::DeviceRemoved` - If the device was lost while presenting.
    pub fn present(
        &mut self,
        native: &dyn NativeDevice,
        sync_interval: u32,
        allow_tearing: bool,
    ) -> Result<(), NativeError> {
        match self.swapchain {
            Some(chain) => native.present(chain, sync_interval, allow_tearing),
            None => {
                self.current = (self.current + 1) % self.buffers.len().max(1);
                Ok(())
            }
        }
    }

    /// Whether the back buffers belong to a swapchain.
    pub fn is_windowed(&self) -> bool {
        self.swapchain.is_some()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Incremented every time the back buffers are rebuilt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queues every attachment and view for release.
    pub fn dispose(&mut self, disposal: &mut DisposalQueue) {
        self.release_attachments(disposal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::d3d12::native::HeadlessDevice;
    use std::sync::Arc;
    use vesper_core::renderer::RenderPassFlags;

    struct Fixture {
        device: Arc<HeadlessDevice>,
        heaps: DescriptorHeapSet,
        disposal: DisposalQueue,
        textures: Registry<D3d12Texture>,
    }

    impl Fixture {
        fn new() -> Self {
            let device = Arc::new(HeadlessDevice::new());
            let native: Arc<dyn NativeDevice> = device.clone();
            Self {
                heaps: DescriptorHeapSet::new(&native, 16, 8, 8).unwrap(),
                disposal: DisposalQueue::new(),
                textures: Registry::new(),
                device,
            }
        }

        fn texture(&mut self, format: PixelFormat) -> TextureId {
            let desc = TextureDescriptor {
                format,
                usage: TextureUsage::RenderTarget,
                width: 2,
                height: 2,
                ..TextureDescriptor::default()
            };
            let texture =
                D3d12Texture::create(self.device.as_ref(), &mut self.heaps, &desc, SamplerHandle(0))
                    .unwrap();
            TextureId(self.textures.insert(texture))
        }

        fn env(&mut self) -> (ViewEnv<'_>, &mut Registry<D3d12Texture>) {
            (
                ViewEnv {
                    native: self.device.as_ref(),
                    heaps: &mut self.heaps,
                    disposal: &mut self.disposal,
                },
                &mut self.textures,
            )
        }
    }

    fn clear_color_only() -> RenderPassDesc {
        RenderPassDesc {
            clear_color: [1.0, 0.0, 0.0, 1.0],
            flags: RenderPassFlags {
                clear: TargetBufferFlags::COLOR0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn pass_clears_only_the_requested_planes() {
        // --- 1. ARRANGE ---
        let mut f = Fixture::new();
        let color = f.texture(PixelFormat::RGBA8);
        let depth = f.texture(PixelFormat::D24S8);
        let mut target = D3d12RenderTarget::new(RenderTargetDescriptor {
            color: [Some(color), None, None, None],
            depth_stencil: Some(depth),
        });
        let mut list = CommandList::new();
        let desc = clear_color_only();

        // --- 2. ACT ---
        let (mut env, textures) = f.env();
        let bound = target.begin_pass(&mut env, textures, &mut list, &desc, 1).unwrap();
        target.end_pass(textures, &mut list, &desc);
        f.device.execute(&list).unwrap();

        // --- 3. ASSERT ---
        let commands = list.commands();
        assert_eq!(
            commands
                .iter()
                .filter(|c| matches!(c, NativeCommand::ClearRenderTargetView { .. }))
                .count(),
            1
        );
        assert!(!commands
            .iter()
            .any(|c| matches!(c, NativeCommand::ClearDepthStencilView { .. })));
        assert_eq!(bound.rtvs.len(), 1);
        assert!(bound.dsv.is_some());
        assert_eq!(bound.formats.depth_stencil, DxgiFormat::D24_UNORM_S8_UINT);
        assert_eq!((bound.width, bound.height), (2, 2));

        let texture = f.textures.get(color.0).unwrap();
        assert_eq!(texture.state(0), Some(ResourceStates::PIXEL_SHADER_RESOURCE));
        assert_eq!(
            f.device.subresource_contents(texture.resource(), 0).unwrap(),
            [255, 0, 0, 255].repeat(4)
        );
        assert!(target.dirty().is_empty());
    }

    #[test]
    fn replaced_attachment_retires_its_old_view() {
        let mut f = Fixture::new();
        let first = f.texture(PixelFormat::RGBA8);
        let second = f.texture(PixelFormat::RGBA8);
        let mut target = D3d12RenderTarget::new(RenderTargetDescriptor {
            color: [Some(first), None, None, None],
            depth_stencil: None,
        });
        let desc = RenderPassDesc::default();
        let mut list = CommandList::new();
        {
            let (mut env, textures) = f.env();
            target.begin_pass(&mut env, textures, &mut list, &desc, 3).unwrap();
            target.end_pass(textures, &mut list, &desc);
        }
        assert!(f.disposal.is_empty());

        target.set_color(0, Some(second)).unwrap();
        assert!(target.dirty().contains(TargetBufferFlags::COLOR0));
        {
            let (mut env, textures) = f.env();
            target.begin_pass(&mut env, textures, &mut list, &desc, 4).unwrap();
        }

        assert_eq!(f.disposal.len(), 1);
        assert!(f.disposal.take_ready(2).is_empty());
        assert!(matches!(f.disposal.take_ready(3)[..], [Disposable::Rtv(_)]));
        assert!(matches!(
            target.set_color(MAX_COLOR_ATTACHMENT, None),
            Err(ResourceError::OutOfBounds)
        ));
    }

    #[test]
    fn screen_target_presents_and_rotates_offscreen_buffers() {
        let mut f = Fixture::new();
        let (mut env, _) = f.env();
        let mut screen = ScreenTarget::new(&mut env, &SurfaceDescriptor::offscreen(4, 4), 3).unwrap();
        assert!(!screen.is_windowed());
        let native = f.device.as_ref();

        let mut list = CommandList::new();
        let desc = RenderPassDesc::clear_all([0.0; 4], 1.0, 0);
        let bound = screen.begin_pass(native, &mut list, &desc, 1).unwrap();
        assert_eq!(bound.formats.color, vec![SWAPCHAIN_FORMAT]);
        assert!(list
            .commands()
            .iter()
            .any(|c| matches!(c, NativeCommand::ClearDepthStencilView { clear_depth: true, clear_stencil: true, .. })));
        screen.end_pass(native, &mut list, &desc);
        assert_eq!(
            screen.current_buffer_mut(native).unwrap().state(0),
            Some(ResourceStates::PRESENT)
        );

        assert_eq!(screen.current_index(native), 0);
        screen.present(native, 1, false).unwrap();
        assert_eq!(screen.current_index(native), 1);
    }

    #[test]
    fn resize_rebuilds_a_new_generation() {
        let mut f = Fixture::new();
        let (mut env, _) = f.env();
        let mut screen = ScreenTarget::new(&mut env, &SurfaceDescriptor::offscreen(4, 4), 2).unwrap();
        assert_eq!(screen.generation(), 1);

        screen.resize(&mut env, 8, 6).unwrap();

        assert_eq!(screen.generation(), 2);
        assert_eq!(screen.size(), (8, 6));
        // Two RTVs, one DSV, two owned buffers with their SRVs, the depth texture.
        assert_eq!(f.disposal.len(), 8);
    }
}
