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

//! D3D12 textures.
//!
//! A texture owns one committed resource with every mip and layer, an SRV
//! over all of them (unless it is a depth/stencil texture) and the registry
//! slot of its sampler. Resource states are tracked per subresource so that
//! uploads, mip generation and render passes only emit the transitions they
//! actually need.

use super::descriptor_heap::{DescriptorHandle, DescriptorHeapSet};
use super::disposal::{Disposable, DisposalQueue};
use super::format::{self, subresource_index};
use super::native::{
    Barrier, ClearValue, CommandList, DxgiFormat, HeapType, NativeCommand, NativeDevice,
    ResourceDesc, ResourceFlags, ResourceHandle, ResourceStates, SrvDesc, SrvDimension,
    TextureCopyLocation,
};
use super::transfer::{backend_error, TransferQueue};
use vesper_core::renderer::{
    mip_extent, PixelFormat, ResourceError, SamplerHandle, TextureDescriptor, TextureRegion,
    TextureType, TextureUsage,
};

/// A texture and its native objects.
#[derive(Debug)]
pub struct D3d12Texture {
    desc: TextureDescriptor,
    format: DxgiFormat,
    resource: ResourceHandle,
    srv: Option<DescriptorHandle>,
    states: Vec<ResourceStates>,
    owned: bool,
    auto_mips: bool,
    /// Registry slot of the texture's sampler.
    pub sampler: SamplerHandle,
    /// Frame fence value of the last frame that sampled or rendered into it.
    pub last_fence_value: u64,
    /// Isolated fence value of the last copy or mip generation.
    pub isolated_fence_value: u64,
}

impl D3d12Texture {
    /// Creates the resource and its SRV. `desc.mip_levels == 0` allocates
    /// the full chain.
    ///
    /// ## Errors
    /// * `ResourceError::UnsupportedFormat` - If the device cannot create the format.
    /// * `ResourceError::BackendError` - If the resource cannot be created.
    pub fn create(
        native: &dyn NativeDevice,
        heaps: &mut DescriptorHeapSet,
        desc: &TextureDescriptor,
        sampler: SamplerHandle,
    ) -> Result<Self, ResourceError> {
        let format = match format::to_dxgi(desc.format) {
            Some(format) if native.check_format_support(format) => format,
            _ => {
                log::error!(
                    "D3d12Texture: pixel format {:?} is not supported by the device",
                    desc.format
                );
                return Err(ResourceError::UnsupportedFormat(format!("{:?}", desc.format)));
            }
        };

        let mip_count = desc.mip_level_count();
        let layers = desc.layer_count();
        let is_depth = desc.format.is_depth_stencil();
        let mut flags = ResourceFlags::EMPTY;
        let mut clear_value = None;
        if desc.usage == TextureUsage::RenderTarget {
            if is_depth {
                flags.insert(ResourceFlags::ALLOW_DEPTH_STENCIL);
                clear_value = Some(ClearValue::DepthStencil {
                    format,
                    depth: 1.0,
                    stencil: 0,
                });
            } else {
                flags.insert(ResourceFlags::ALLOW_RENDER_TARGET);
                clear_value = Some(ClearValue::Color {
                    format,
                    color: [0.0; 4],
                });
            }
        }
        if desc.wants_generated_mips() && !desc.format.is_compressed() && !is_depth {
            flags.insert(ResourceFlags::ALLOW_UNORDERED_ACCESS);
        }

        let initial = if is_depth {
            ResourceStates::DEPTH_WRITE
        } else {
            ResourceStates::PIXEL_SHADER_RESOURCE
        };
        let native_desc = ResourceDesc::texture_2d(
            format,
            desc.width.max(1),
            desc.height.max(1),
            layers as u16,
            mip_count as u16,
            flags,
        );
        let resource = native
            .create_committed_resource(HeapType::Default, &native_desc, initial, clear_value)
            .map_err(backend_error)?;

        let mut resolved = desc.clone();
        resolved.mip_levels = mip_count;
        let mut texture = Self {
            desc: resolved,
            format,
            resource,
            srv: None,
            states: vec![initial; (mip_count * layers) as usize],
            owned: true,
            auto_mips: desc.wants_generated_mips(),
            sampler,
            last_fence_value: 0,
            isolated_fence_value: 0,
        };

        if !is_depth {
            let handle = match heaps.srv.allocate() {
                Ok(handle) => handle,
                Err(err) => {
                    native.release_resource(resource);
                    return Err(err);
                }
            };
            native.create_shader_resource_view(Some(resource), &texture.srv_desc(), handle.cpu);
            texture.srv = Some(handle);
        }
        log::trace!(
            "D3d12Texture: created {}x{} {:?} ({} mips, {} layers)",
            desc.width,
            desc.height,
            desc.format,
            mip_count,
            layers
        );
        Ok(texture)
    }

    /// Wraps a resource owned elsewhere, such as a swapchain back buffer.
    /// Wrapped textures are never released through the disposal queue.
    pub fn wrap(
        resource: ResourceHandle,
        format: DxgiFormat,
        width: u32,
        height: u32,
        state: ResourceStates,
    ) -> Self {
        Self {
            desc: TextureDescriptor {
                usage: TextureUsage::RenderTarget,
                width,
                height,
                ..TextureDescriptor::default()
            },
            format,
            resource,
            srv: None,
            states: vec![state],
            owned: false,
            auto_mips: false,
            sampler: SamplerHandle(0),
            last_fence_value: 0,
            isolated_fence_value: 0,
        }
    }

    /// The creation descriptor with `mip_levels` resolved.
    pub fn desc(&self) -> &TextureDescriptor {
        &self.desc
    }

    /// Native format.
    pub fn format(&self) -> DxgiFormat {
        self.format
    }

    /// Native resource.
    pub fn resource(&self) -> ResourceHandle {
        self.resource
    }

    /// The SRV over every mip and layer, `None` for depth/stencil textures.
    pub fn srv(&self) -> Option<DescriptorHandle> {
        self.srv
    }

    /// Number of mip levels.
    pub fn mip_count(&self) -> u32 {
        self.desc.mip_levels.max(1)
    }

    /// Number of array layers (6 for cube maps).
    pub fn layers(&self) -> u32 {
        (self.states.len() as u32 / self.mip_count()).max(1)
    }

    /// Whether the texture is a depth/stencil texture.
    pub fn is_depth_stencil(&self) -> bool {
        self.format == DxgiFormat::D24_UNORM_S8_UINT
    }

    /// Whether the resource belongs to this texture.
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// The state the texture rests in between passes and copies.
    pub fn steady_state(&self) -> ResourceStates {
        if self.is_depth_stencil() {
            ResourceStates::DEPTH_WRITE
        } else {
            ResourceStates::PIXEL_SHADER_RESOURCE
        }
    }

    /// Current state of a subresource.
    pub fn state(&self, subresource: u32) -> Option<ResourceStates> {
        self.states.get(subresource as usize).copied()
    }

    /// The SRV description over the whole texture.
    pub fn srv_desc(&self) -> SrvDesc {
        let layers = self.layers();
        let dimension = match self.desc.texture_type {
            TextureType::TextureCube => SrvDimension::TextureCube,
            TextureType::Texture2D if layers > 1 => SrvDimension::Texture2DArray,
            TextureType::Texture2D => SrvDimension::Texture2D,
        };
        SrvDesc {
            format: self.format,
            dimension,
            most_detailed_mip: 0,
            mip_levels: self.mip_count(),
            first_slice: 0,
            array_size: layers,
        }
    }

    /// Records the barriers moving `subresource` (or every subresource for
    /// `None`) to `after`.
    pub fn transition(
        &mut self,
        list: &mut CommandList,
        subresource: Option<u32>,
        after: ResourceStates,
    ) {
        let resource = self.resource;
        match subresource {
            Some(index) => {
                if let Some(state) = self.states.get_mut(index as usize) {
                    list.barriers([Barrier::Transition {
                        resource,
                        subresource: index,
                        before: *state,
                        after,
                    }]);
                    *state = after;
                }
            }
            None => {
                let first = self.states.first().copied().unwrap_or(after);
                if self.states.iter().all(|s| *s == first) {
                    list.barriers([Barrier::transition(resource, first, after)]);
                } else {
                    list.barriers(self.states.iter().enumerate().map(|(index, before)| {
                        Barrier::Transition {
                            resource,
                            subresource: index as u32,
                            before: *before,
                            after,
                        }
                    }));
                }
                self.states.fill(after);
            }
        }
    }

    fn check_region(&self, region: &TextureRegion) -> Result<(u32, u32), ResourceError> {
        if region.level >= self.mip_count() || region.layer >= self.layers() {
            return Err(ResourceError::OutOfBounds);
        }
        let mip_width = mip_extent(self.desc.width, region.level);
        let mip_height = mip_extent(self.desc.height, region.level);
        let exceeds = |start: u32, extent: u32, limit: u32| {
            start.checked_add(extent).map_or(true, |end| end > limit)
        };
        if exceeds(region.x, region.width, mip_width) || exceeds(region.y, region.height, mip_height) {
            return Err(ResourceError::OutOfBounds);
        }
        Ok((mip_width, mip_height))
    }

    /// Uploads tightly packed pixels into `region`. Returns `false` for an
    /// empty region or empty data, which are ignored.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the region lies outside the mip or
    ///   `data` is too short.
    pub fn update_region(
        &mut self,
        transfer: &mut TransferQueue,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<bool, ResourceError> {
        if data.is_empty() || region.width == 0 || region.height == 0 {
            return Ok(false);
        }
        self.check_region(region)?;
        if self.desc.format.is_compressed() {
            self.check_block_alignment(region)?;
        }
        self.copy_region(transfer, region, data)?;
        Ok(true)
    }

    /// Uploads block-compressed data into `region`.
    ///
    /// Sub-rectangles must start on a block boundary and cover whole blocks,
    /// except where they end on the mip edge. Mips smaller than one block
    /// are only uploaded whole, starting at the origin.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the region breaks those rules.
    /// * `ResourceError::UnsupportedFormat` - If the texture is not compressed.
    pub fn update_compressed_region(
        &mut self,
        transfer: &mut TransferQueue,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<bool, ResourceError> {
        if !self.desc.format.is_compressed() {
            return Err(ResourceError::UnsupportedFormat(format!(
                "{:?} is not a compressed format",
                self.desc.format
            )));
        }
        self.update_region(transfer, region, data)
    }

    fn check_block_alignment(&self, region: &TextureRegion) -> Result<(), ResourceError> {
        let block = self.desc.format.block_info();
        let mip_width = mip_extent(self.desc.width, region.level);
        let mip_height = mip_extent(self.desc.height, region.level);
        if mip_width < block.width || mip_height < block.height {
            let whole = region.x == 0
                && region.y == 0
                && region.width == mip_width
                && region.height == mip_height;
            if !whole {
                log::warn!(
                    "D3d12Texture: mip {} is smaller than a block and must be uploaded whole",
                    region.level
                );
                return Err(ResourceError::OutOfBounds);
            }
            return Ok(());
        }
        let aligned = |offset: u32, extent: u32, edge: u32, size: u32| {
            offset % size == 0 && (extent % size == 0 || offset.checked_add(extent) == Some(edge))
        };
        if !aligned(region.x, region.width, mip_width, block.width)
            || !aligned(region.y, region.height, mip_height, block.height)
        {
            log::warn!("D3d12Texture: compressed region {region:?} is not block aligned");
            return Err(ResourceError::OutOfBounds);
        }
        Ok(())
    }

    fn copy_region(
        &mut self,
        transfer: &mut TransferQueue,
        region: &TextureRegion,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let staged = transfer.stage_image(self.format, region.width, region.height, data)?;
        let index = subresource_index(region.level, region.layer, self.mip_count());
        let steady = self.state(index).unwrap_or_else(|| self.steady_state());
        let list = transfer.list()?;
        self.transition(list, Some(index), ResourceStates::COPY_DEST);
        list.record(NativeCommand::CopyTextureRegion {
            dst: TextureCopyLocation::Subresource {
                resource: self.resource,
                index,
            },
            dst_x: region.x,
            dst_y: region.y,
            src: staged.location(),
        });
        self.transition(list, Some(index), steady);
        self.isolated_fence_value = transfer.submit(false)?;
        Ok(())
    }

    /// Uploads level 0 of one cube face.
    ///
    /// ## Errors
    /// * `ResourceError::InvalidHandle` - If the texture is not a cube map.
    /// * `ResourceError::OutOfBounds` - If `face` is not in `0..6`.
    pub fn update_face(
        &mut self,
        transfer: &mut TransferQueue,
        face: u32,
        data: &[u8],
    ) -> Result<bool, ResourceError> {
        if self.desc.texture_type != TextureType::TextureCube {
            return Err(ResourceError::InvalidHandle);
        }
        if face >= 6 {
            return Err(ResourceError::OutOfBounds);
        }
        let region = TextureRegion {
            width: self.desc.width,
            height: self.desc.height,
            layer: face,
            ..Default::default()
        };
        self.update_region(transfer, &region, data)
    }

    /// Whether level 0 uploads should be followed by mip generation.
    pub fn generates_mips(&self) -> bool {
        self.auto_mips
            && self.mip_count() > 1
            && !matches!(self.desc.format, PixelFormat::D24S8)
            && !self.desc.format.is_compressed()
    }

    /// Queues the native objects for release after `fence_value`.
    pub fn dispose(&self, fence_value: u64, queue: &mut DisposalQueue) {
        if self.owned {
            queue.push(fence_value, Disposable::Resource(self.resource));
        }
        if let Some(srv) = self.srv {
            queue.push(fence_value, Disposable::Srv(srv));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::d3d12::native::{DescriptorContent, HeadlessDevice};
    use std::sync::Arc;

    struct Fixture {
        device: Arc<HeadlessDevice>,
        heaps: DescriptorHeapSet,
        transfer: TransferQueue,
    }

    fn fixture() -> Fixture {
        let device = Arc::new(HeadlessDevice::new());
        let native: Arc<dyn NativeDevice> = device.clone();
        Fixture {
            heaps: DescriptorHeapSet::new(&native, 16, 4, 4).unwrap(),
            transfer: TransferQueue::new(native, 1 << 20).unwrap(),
            device,
        }
    }

    fn create(f: &mut Fixture, desc: &TextureDescriptor) -> Result<D3d12Texture, ResourceError> {
        D3d12Texture::create(f.device.as_ref(), &mut f.heaps, desc, SamplerHandle(0))
    }

    #[test]
    fn sub_region_lands_in_the_subresource() {
        // --- 1. ARRANGE ---
        let mut f = fixture();
        let mut texture = create(&mut f, &TextureDescriptor::default()).unwrap();
        let red = [255u8, 0, 0, 255].repeat(4);

        // --- 2. ACT ---
        let region = TextureRegion {
            x: 2,
            y: 1,
            width: 2,
            height: 2,
            ..Default::default()
        };
        let written = texture
            .update_region(&mut f.transfer, &region, &red)
            .unwrap();

        // --- 3. ASSERT ---
        assert!(written);
        let pixels = f.device.subresource_contents(texture.resource(), 0).unwrap();
        let at = |x: usize, y: usize| &pixels[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(at(2, 1), [255, 0, 0, 255]);
        assert_eq!(at(3, 2), [255, 0, 0, 255]);
        assert_eq!(at(1, 1), [0, 0, 0, 0]);
        assert_eq!(texture.state(0), Some(ResourceStates::PIXEL_SHADER_RESOURCE));
        assert_eq!(texture.isolated_fence_value, 1);
    }

    #[test]
    fn empty_updates_are_ignored_and_bad_regions_rejected() {
        let mut f = fixture();
        let mut texture = create(&mut f, &TextureDescriptor::default()).unwrap();

        let nothing = texture
            .update_region(&mut f.transfer, &TextureRegion::default(), &[1, 2, 3, 4])
            .unwrap();
        assert!(!nothing);
        let outside = TextureRegion {
            x: 3,
            width: 2,
            height: 1,
            ..Default::default()
        };
        assert!(matches!(
            texture.update_region(&mut f.transfer, &outside, &[0; 8]),
            Err(ResourceError::OutOfBounds)
        ));
        let wrapping = TextureRegion {
            x: u32::MAX,
            width: 2,
            height: 1,
            ..Default::default()
        };
        assert!(matches!(
            texture.update_region(&mut f.transfer, &wrapping, &[0; 8]),
            Err(ResourceError::OutOfBounds)
        ));
        let missing_mip = TextureRegion {
            width: 1,
            height: 1,
            level: 1,
            ..Default::default()
        };
        assert!(texture
            .update_region(&mut f.transfer, &missing_mip, &[0; 4])
            .is_err());
    }

    #[test]
    fn unsupported_formats_create_nothing() {
        let mut f = fixture();
        f.device
            .set_format_supported(DxgiFormat::ASTC_4X4_UNORM, false);
        let live_before = f.device.live_resource_count();

        for format in [PixelFormat::RGB8, PixelFormat::ASTC4x4] {
            let desc = TextureDescriptor {
                format,
                ..Default::default()
            };
            assert!(matches!(
                create(&mut f, &desc),
                Err(ResourceError::UnsupportedFormat(_))
            ));
        }
        assert_eq!(f.device.live_resource_count(), live_before);
    }

    #[test]
    fn compressed_regions_must_be_block_aligned() {
        // --- 1. ARRANGE ---
        let mut f = fixture();
        let desc = TextureDescriptor {
            format: PixelFormat::BC1,
            width: 8,
            height: 8,
            mip_levels: 4,
            ..Default::default()
        };
        let mut texture = create(&mut f, &desc).unwrap();

        // --- 2. ACT ---
        let misaligned = TextureRegion {
            x: 2,
            width: 4,
            height: 4,
            ..Default::default()
        };
        let block = TextureRegion {
            x: 4,
            y: 4,
            width: 4,
            height: 4,
            ..Default::default()
        };
        let partial_tiny_mip = TextureRegion {
            width: 1,
            height: 1,
            level: 2,
            ..Default::default()
        };
        let whole_tiny_mip = TextureRegion {
            width: 2,
            height: 2,
            level: 2,
            ..Default::default()
        };

        // --- 3. ASSERT ---
        assert!(texture
            .update_compressed_region(&mut f.transfer, &misaligned, &[0; 8])
            .is_err());
        assert!(texture
            .update_compressed_region(&mut f.transfer, &block, &[7; 8])
            .unwrap());
        assert!(texture
            .update_compressed_region(&mut f.transfer, &partial_tiny_mip, &[0; 8])
            .is_err());
        assert!(texture
            .update_compressed_region(&mut f.transfer, &whole_tiny_mip, &[9; 8])
            .unwrap());

        let level0 = f.device.subresource_contents(texture.resource(), 0).unwrap();
        assert_eq!(&level0[24..32], &[7; 8]);
        let level2 = f.device.subresource_contents(texture.resource(), 2).unwrap();
        assert_eq!(level2, vec![9; 8]);
    }

    #[test]
    fn cube_faces_and_views() {
        let mut f = fixture();
        let desc = TextureDescriptor {
            texture_type: TextureType::TextureCube,
            width: 2,
            height: 2,
            ..Default::default()
        };
        let mut texture = create(&mut f, &desc).unwrap();
        assert_eq!(texture.layers(), 6);
        assert_eq!(texture.srv_desc().dimension, SrvDimension::TextureCube);

        texture.update_face(&mut f.transfer, 5, &[3; 16]).unwrap();
        assert_eq!(
            f.device.subresource_contents(texture.resource(), 5).unwrap(),
            vec![3; 16]
        );
        assert!(texture.update_face(&mut f.transfer, 6, &[3; 16]).is_err());

        let srv = texture.srv().unwrap();
        assert!(matches!(
            f.device.descriptor(srv.cpu),
            Some(DescriptorContent::Srv(Some(_), _))
        ));
    }

    #[test]
    fn depth_targets_have_no_srv_and_rest_in_depth_write() {
        let mut f = fixture();
        let desc = TextureDescriptor {
            format: PixelFormat::D24S8,
            usage: TextureUsage::RenderTarget,
            ..Default::default()
        };
        let texture = create(&mut f, &desc).unwrap();
        assert!(texture.srv().is_none());
        assert!(texture.is_depth_stencil());
        assert_eq!(texture.steady_state(), ResourceStates::DEPTH_WRITE);
    }

    #[test]
    fn transitions_track_each_subresource() {
        // --- 1. ARRANGE ---
        let mut f = fixture();
        let desc = TextureDescriptor {
            width: 4,
            height: 4,
            mip_levels: 0,
            ..Default::default()
        };
        let mut texture = create(&mut f, &desc).unwrap();
        let mut list = CommandList::new();

        // --- 2. ACT ---
        texture.transition(&mut list, Some(1), ResourceStates::UNORDERED_ACCESS);
        texture.transition(&mut list, None, ResourceStates::PIXEL_SHADER_RESOURCE);

        // --- 3. ASSERT ---
        assert_eq!(texture.mip_count(), 3);
        assert!(texture.generates_mips());
        // One barrier for mip 1, then only mip 1 differs on the way back.
        assert_eq!(list.commands().len(), 2);
        assert_eq!(texture.state(1), Some(ResourceStates::PIXEL_SHADER_RESOURCE));
    }

    #[test]
    fn disposal_skips_wrapped_resources() {
        let mut f = fixture();
        let owned = create(&mut f, &TextureDescriptor::default()).unwrap();
        let wrapped = D3d12Texture::wrap(
            ResourceHandle(99),
            DxgiFormat::R8G8B8A8_UNORM,
            4,
            4,
            ResourceStates::PRESENT,
        );
        let mut queue = DisposalQueue::new();
        owned.dispose(3, &mut queue);
        wrapped.dispose(3, &mut queue);
        assert_eq!(queue.len(), 2);
        assert!(!wrapped.is_owned());
    }
}
