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

//! A [`NativeDevice`] that executes everything against CPU memory.
//!
//! Resources are plain byte vectors (one per subresource for textures), copy
//! and clear commands really move bytes, views are remembered per descriptor
//! address and draws are logged as [`DrawRecord`]s. Fences complete as soon
//! as they are signaled unless manual completion is turned on, which lets
//! tests hold the "GPU" back to observe fence-gated behavior.

use super::*;
use crate::graphics::d3d12::format;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

const DESCRIPTOR_INCREMENT: u32 = 32;

/// What a descriptor slot currently holds.
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorContent {
    /// A shader resource view, `None` for a null view.
    Srv(Option<ResourceHandle>, SrvDesc),
    /// An unordered access view.
    Uav(ResourceHandle, UavDesc),
    /// A render target view.
    Rtv(ResourceHandle, RtvDesc),
    /// A depth/stencil view.
    Dsv(ResourceHandle, DxgiFormat),
    /// A sampler.
    Sampler(NativeSamplerDesc),
}

/// The pipeline state a draw was issued with.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Bound pipeline state object.
    pub pipeline: Option<PipelineHandle>,
    /// Bound graphics root signature.
    pub root_signature: Option<RootSignatureHandle>,
    /// Bound topology.
    pub topology: Option<PrimitiveTopology>,
    /// Bound vertex buffers by slot.
    pub vertex_buffers: Vec<VertexBufferView>,
    /// Bound index buffer.
    pub index_buffer: Option<IndexBufferView>,
    /// Root constant buffer addresses by root index.
    pub root_cbvs: BTreeMap<u32, u64>,
    /// Descriptor tables by root index.
    pub tables: BTreeMap<u32, GpuDescriptor>,
    /// Bound color views.
    pub render_targets: Vec<CpuDescriptor>,
    /// Bound depth view.
    pub depth_stencil: Option<CpuDescriptor>,
    /// Viewport.
    pub viewport: Option<NativeViewport>,
    /// Scissor rectangle.
    pub scissor: Option<NativeRect>,
    /// Stencil reference.
    pub stencil_ref: u32,
    /// The draw command itself.
    pub command: NativeCommand,
}

#[derive(Debug)]
struct HeadlessResource {
    heap: HeapType,
    desc: ResourceDesc,
    data: Vec<u8>,
    subresources: Vec<Vec<u8>>,
}

#[derive(Debug, Default)]
struct FenceState {
    completed: u64,
    pending: VecDeque<u64>,
}

#[derive(Debug)]
struct HeadlessSwapchain {
    buffers: Vec<ResourceHandle>,
    current: u32,
    format: DxgiFormat,
}

#[derive(Debug, Default, Clone)]
struct ExecState {
    pipeline: Option<PipelineHandle>,
    root_signature: Option<RootSignatureHandle>,
    topology: Option<PrimitiveTopology>,
    vertex_buffers: Vec<VertexBufferView>,
    index_buffer: Option<IndexBufferView>,
    root_cbvs: BTreeMap<u32, u64>,
    tables: BTreeMap<u32, GpuDescriptor>,
    render_targets: Vec<CpuDescriptor>,
    depth_stencil: Option<CpuDescriptor>,
    viewport: Option<NativeViewport>,
    scissor: Option<NativeRect>,
    stencil_ref: u32,
}

#[derive(Debug, Default)]
struct HeadlessState {
    next_id: u64,
    resources: HashMap<u64, HeadlessResource>,
    released: Vec<ResourceHandle>,
    heaps: HashMap<u64, (DescriptorHeapKind, u32)>,
    descriptors: HashMap<u64, DescriptorContent>,
    root_signatures: HashMap<u64, RootSignatureDesc>,
    pipelines: HashMap<u64, Option<GraphicsPipelineDesc>>,
    graphics_pipeline_creations: usize,
    root_signature_creations: usize,
    fences: HashMap<u64, FenceState>,
    manual_fences: bool,
    swapchains: HashMap<u64, HeadlessSwapchain>,
    present_failure: Option<String>,
    unsupported_formats: HashSet<DxgiFormat>,
    draws: Vec<DrawRecord>,
    dispatches: usize,
    executed_lists: usize,
}

impl HeadlessState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn resource(&self, handle: ResourceHandle) -> Result<&HeadlessResource, NativeError> {
        self.resources.get(&handle.0).ok_or(NativeError::InvalidHandle)
    }

    fn resource_mut(&mut self, handle: ResourceHandle) -> Result<&mut HeadlessResource, NativeError> {
        self.resources
            .get_mut(&handle.0)
            .ok_or(NativeError::InvalidHandle)
    }
}

/// An in-memory [`NativeDevice`].
#[derive(Debug)]
pub struct HeadlessDevice {
    state: Mutex<HeadlessState>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Creates a device that supports every format except ASTC.
    pub fn new() -> Self {
        let mut state = HeadlessState::default();
        state.unsupported_formats.insert(DxgiFormat::ASTC_4X4_UNORM);
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// With manual completion, signals stay pending until
    /// [`complete_all_fences`](Self::complete_all_fences) or a CPU wait.
    pub fn set_manual_fences(&self, manual: bool) {
        self.lock().manual_fences = manual;
    }

    /// Completes every pending signal on every fence.
    pub fn complete_all_fences(&self) {
        for fence in self.lock().fences.values_mut() {
            if let Some(last) = fence.pending.drain(..).max() {
                fence.completed = fence.completed.max(last);
            }
        }
    }

    /// Marks a format as unsupported (or supported again).
    pub fn set_format_supported(&self, format: DxgiFormat, supported: bool) {
        let mut state = self.lock();
        if supported {
            state.unsupported_formats.remove(&format);
        } else {
            state.unsupported_formats.insert(format);
        }
    }

    /// Makes the next present fail with a device-removed error.
    pub fn fail_next_present(&self, reason: impl Into<String>) {
        self.lock().present_failure = Some(reason.into());
    }

    /// Every resource released so far, in release order.
    pub fn released_resources(&self) -> Vec<ResourceHandle> {
        self.lock().released.clone()
    }

    /// Returns `true` if the resource exists and was not released.
    pub fn is_live(&self, resource: ResourceHandle) -> bool {
        self.lock().resources.contains_key(&resource.0)
    }

    /// Number of live resources.
    pub fn live_resource_count(&self) -> usize {
        self.lock().resources.len()
    }

    /// Heap type and description of a live resource.
    pub fn resource_info(&self, resource: ResourceHandle) -> Option<(HeapType, ResourceDesc)> {
        self.lock()
            .resources
            .get(&resource.0)
            .map(|r| (r.heap, r.desc))
    }

    /// The bytes of a buffer, whatever its heap.
    pub fn buffer_contents(&self, resource: ResourceHandle) -> Option<Vec<u8>> {
        self.lock().resources.get(&resource.0).map(|r| r.data.clone())
    }

    /// The tightly packed bytes of one texture subresource.
    pub fn subresource_contents(&self, resource: ResourceHandle, index: u32) -> Option<Vec<u8>> {
        self.lock()
            .resources
            .get(&resource.0)
            .and_then(|r| r.subresources.get(index as usize).cloned())
    }

    /// What a descriptor slot holds.
    pub fn descriptor(&self, address: CpuDescriptor) -> Option<DescriptorContent> {
        self.lock().descriptors.get(&address.0).cloned()
    }

    /// Draws executed so far.
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.lock().draws.clone()
    }

    /// Returns and forgets the draws executed so far.
    pub fn take_draws(&self) -> Vec<DrawRecord> {
        std::mem::take(&mut self.lock().draws)
    }

    /// Number of compute dispatches executed.
    pub fn dispatch_count(&self) -> usize {
        self.lock().dispatches
    }

    /// Number of command lists executed.
    pub fn executed_list_count(&self) -> usize {
        self.lock().executed_lists
    }

    /// Number of graphics pipelines created.
    pub fn graphics_pipeline_creations(&self) -> usize {
        self.lock().graphics_pipeline_creations
    }

    /// Number of root signatures created.
    pub fn root_signature_creations(&self) -> usize {
        self.lock().root_signature_creations
    }

    /// Number of live pipeline state objects.
    pub fn live_pipeline_count(&self) -> usize {
        self.lock().pipelines.len()
    }

    /// The description a graphics pipeline was created with.
    pub fn graphics_pipeline_desc(&self, pipeline: PipelineHandle) -> Option<GraphicsPipelineDesc> {
        self.lock().pipelines.get(&pipeline.0).cloned().flatten()
    }

    /// The description a root signature was created with.
    pub fn root_signature_desc(&self, root: RootSignatureHandle) -> Option<RootSignatureDesc> {
        self.lock().root_signatures.get(&root.0).cloned()
    }
}

fn pack_clear_color(format: DxgiFormat, color: [f32; 4]) -> Option<[u8; 4]> {
    let unorm = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    match format {
        DxgiFormat::R8G8B8A8_UNORM => Some([
            unorm(color[0]),
            unorm(color[1]),
            unorm(color[2]),
            unorm(color[3]),
        ]),
        DxgiFormat::B8G8R8A8_UNORM => Some([
            unorm(color[2]),
            unorm(color[1]),
            unorm(color[0]),
            unorm(color[3]),
        ]),
        _ => None,
    }
}

fn copy_texture_region(
    state: &mut HeadlessState,
    dst: TextureCopyLocation,
    dst_x: u32,
    dst_y: u32,
    src: TextureCopyLocation,
) -> Result<(), NativeError> {
    match (dst, src) {
        (
            TextureCopyLocation::Subresource { resource, index },
            TextureCopyLocation::Footprint {
                resource: buffer,
                footprint,
            },
        ) => {
            let rows: Vec<Vec<u8>> = {
                let src = state.resource(buffer)?;
                (0..footprint.row_count as u64)
                    .map(|row| {
                        let start = (footprint.offset + row * footprint.row_pitch as u64) as usize;
                        src.data
                            .get(start..start + footprint.row_size as usize)
                            .map(<[u8]>::to_vec)
                            .ok_or(NativeError::OutOfBounds)
                    })
                    .collect::<Result<_, _>>()?
            };
            let texture = state.resource_mut(resource)?;
            let (bw, bh, bytes) = format::block_info(texture.desc.format);
            let mip = index % texture.desc.mip_levels as u32;
            let width = (texture.desc.width as u32 >> mip).max(1);
            let tight_row = (width.div_ceil(bw) * bytes) as usize;
            let sub = texture
                .subresources
                .get_mut(index as usize)
                .ok_or(NativeError::OutOfBounds)?;
            let x = (dst_x / bw * bytes) as usize;
            for (r, row) in rows.iter().enumerate() {
                let start = (dst_y / bh) as usize * tight_row + r * tight_row + x;
                sub.get_mut(start..start + row.len())
                    .ok_or(NativeError::OutOfBounds)?
                    .copy_from_slice(row);
            }
            Ok(())
        }
        (
            TextureCopyLocation::Footprint {
                resource: buffer,
                footprint,
            },
            TextureCopyLocation::Subresource { resource, index },
        ) => {
            let sub = state
                .resource(resource)?
                .subresources
                .get(index as usize)
                .cloned()
                .ok_or(NativeError::OutOfBounds)?;
            let dst = state.resource_mut(buffer)?;
            let row_size = footprint.row_size as usize;
            for row in 0..footprint.row_count as usize {
                let src_row = sub
                    .get(row * row_size..(row + 1) * row_size)
                    .ok_or(NativeError::OutOfBounds)?;
                let start = footprint.offset as usize + row * footprint.row_pitch as usize;
                dst.data
                    .get_mut(start..start + row_size)
                    .ok_or(NativeError::OutOfBounds)?
                    .copy_from_slice(src_row);
            }
            Ok(())
        }
        (
            TextureCopyLocation::Subresource {
                resource: dst,
                index: dst_index,
            },
            TextureCopyLocation::Subresource {
                resource: src,
                index: src_index,
            },
        ) => {
            let sub = state
                .resource(src)?
                .subresources
                .get(src_index as usize)
                .cloned()
                .ok_or(NativeError::OutOfBounds)?;
            let target = state
                .resource_mut(dst)?
                .subresources
                .get_mut(dst_index as usize)
                .ok_or(NativeError::OutOfBounds)?;
            if target.len() != sub.len() {
                return Err(NativeError::OutOfBounds);
            }
            target.copy_from_slice(&sub);
            Ok(())
        }
        _ => Err(NativeError::Other(
            "buffer to buffer copies go through CopyBufferRegion".into(),
        )),
    }
}

fn run_command(
    state: &mut HeadlessState,
    exec: &mut ExecState,
    command: &NativeCommand,
) -> Result<(), NativeError> {
    match command {
        NativeCommand::ResourceBarrier(_) | NativeCommand::SetDescriptorHeaps(_) => {}
        NativeCommand::CopyBufferRegion {
            dst,
            dst_offset,
            src,
            src_offset,
            size,
        } => {
            let span = |offset: u64| {
                offset
                    .checked_add(*size)
                    .map(|end| offset as usize..end as usize)
                    .ok_or(NativeError::OutOfBounds)
            };
            let bytes = state
                .resource(*src)?
                .data
                .get(span(*src_offset)?)
                .map(<[u8]>::to_vec)
                .ok_or(NativeError::OutOfBounds)?;
            state
                .resource_mut(*dst)?
                .data
                .get_mut(span(*dst_offset)?)
                .ok_or(NativeError::OutOfBounds)?
                .copy_from_slice(&bytes);
        }
        NativeCommand::CopyTextureRegion {
            dst,
            dst_x,
            dst_y,
            src,
        } => copy_texture_region(state, *dst, *dst_x, *dst_y, *src)?,
        NativeCommand::CopyResource { dst, src } => {
            let (data, subresources) = {
                let src = state.resource(*src)?;
                (src.data.clone(), src.subresources.clone())
            };
            let dst = state.resource_mut(*dst)?;
            dst.data = data;
            dst.subresources = subresources;
        }
        NativeCommand::SetGraphicsRootSignature(root) => {
            exec.root_signature = Some(*root);
            exec.root_cbvs.clear();
            exec.tables.clear();
        }
        NativeCommand::SetComputeRootSignature(_) => {}
        NativeCommand::SetPipelineState(pipeline) => exec.pipeline = Some(*pipeline),
        NativeCommand::SetGraphicsRootConstantBufferView { index, address } => {
            exec.root_cbvs.insert(*index, *address);
        }
        NativeCommand::SetGraphicsRootDescriptorTable { index, base } => {
            exec.tables.insert(*index, *base);
        }
        NativeCommand::SetComputeRootConstantBufferView { .. }
        | NativeCommand::SetComputeRootDescriptorTable { .. } => {}
        NativeCommand::IaSetPrimitiveTopology(topology) => exec.topology = Some(*topology),
        NativeCommand::IaSetVertexBuffers { start_slot, views } => {
            let end = *start_slot as usize + views.len();
            if exec.vertex_buffers.len() < end {
                exec.vertex_buffers.resize(
                    end,
                    VertexBufferView {
                        address: 0,
                        size: 0,
                        stride: 0,
                    },
                );
            }
            exec.vertex_buffers[*start_slot as usize..end].copy_from_slice(views);
        }
        NativeCommand::IaSetIndexBuffer(view) => exec.index_buffer = Some(*view),
        NativeCommand::RsSetViewports(viewport) => exec.viewport = Some(*viewport),
        NativeCommand::RsSetScissorRects(rect) => exec.scissor = Some(*rect),
        NativeCommand::OmSetStencilRef(value) => exec.stencil_ref = *value,
        NativeCommand::OmSetRenderTargets { rtvs, dsv } => {
            exec.render_targets = rtvs.clone();
            exec.depth_stencil = *dsv;
        }
        NativeCommand::ClearRenderTargetView { rtv, color } => {
            if let Some(DescriptorContent::Rtv(resource, desc)) = state.descriptors.get(&rtv.0).cloned()
            {
                let texture = state.resource_mut(resource)?;
                let index = desc.mip_slice + desc.array_slice * texture.desc.mip_levels as u32;
                if let (Some(pixel), Some(sub)) = (
                    pack_clear_color(texture.desc.format, *color),
                    texture.subresources.get_mut(index as usize),
                ) {
                    for chunk in sub.chunks_exact_mut(4) {
                        chunk.copy_from_slice(&pixel);
                    }
                }
            }
        }
        NativeCommand::ClearDepthStencilView {
            dsv,
            clear_depth,
            clear_stencil,
            depth,
            stencil,
        } => {
            if let Some(DescriptorContent::Dsv(resource, _)) = state.descriptors.get(&dsv.0).cloned() {
                let texture = state.resource_mut(resource)?;
                if let Some(sub) = texture.subresources.get_mut(0) {
                    let depth_bits = (depth.clamp(0.0, 1.0) * 16_777_215.0).round() as u32;
                    for chunk in sub.chunks_exact_mut(4) {
                        let mut value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                        if *clear_depth {
                            value = (value & 0xFF00_0000) | depth_bits;
                        }
                        if *clear_stencil {
                            value = (value & 0x00FF_FFFF) | (*stencil as u32) << 24;
                        }
                        chunk.copy_from_slice(&value.to_le_bytes());
                    }
                }
            }
        }
        NativeCommand::DiscardResource(_) => {}
        NativeCommand::DrawInstanced { .. } | NativeCommand::DrawIndexedInstanced { .. } => {
            state.draws.push(DrawRecord {
                pipeline: exec.pipeline,
                root_signature: exec.root_signature,
                topology: exec.topology,
                vertex_buffers: exec.vertex_buffers.clone(),
                index_buffer: exec.index_buffer,
                root_cbvs: exec.root_cbvs.clone(),
                tables: exec.tables.clone(),
                render_targets: exec.render_targets.clone(),
                depth_stencil: exec.depth_stencil,
                viewport: exec.viewport,
                scissor: exec.scissor,
                stencil_ref: exec.stencil_ref,
                command: command.clone(),
            });
        }
        NativeCommand::Dispatch { .. } => state.dispatches += 1,
    }
    Ok(())
}

impl NativeDevice for HeadlessDevice {
    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            vendor_id: 0x1414,
            description: "Vesper Headless Adapter".to_string(),
            feature_level: "12.0".to_string(),
        }
    }

    fn check_format_support(&self, format: DxgiFormat) -> bool {
        !self.lock().unsupported_formats.contains(&format)
    }

    fn create_committed_resource(
        &self,
        heap: HeapType,
        desc: &ResourceDesc,
        _initial_state: ResourceStates,
        _clear_value: Option<ClearValue>,
    ) -> Result<ResourceHandle, NativeError> {
        let mut state = self.lock();
        if desc.dimension == ResourceDimension::Texture2D
            && state.unsupported_formats.contains(&desc.format)
        {
            return Err(NativeError::CreationFailed(format!(
                "format {:?} is not supported",
                desc.format
            )));
        }
        let (data, subresources) = match desc.dimension {
            ResourceDimension::Buffer => (vec![0; desc.width as usize], Vec::new()),
            ResourceDimension::Texture2D => {
                let mut subresources = Vec::with_capacity(desc.subresource_count() as usize);
                for _layer in 0..desc.array_size {
                    for mip in 0..desc.mip_levels as u32 {
                        let width = (desc.width as u32 >> mip).max(1);
                        let height = (desc.height >> mip).max(1);
                        subresources.push(vec![
                            0;
                            format::image_size(desc.format, width, height) as usize
                        ]);
                    }
                }
                (Vec::new(), subresources)
            }
        };
        let id = state.allocate_id();
        state.resources.insert(
            id,
            HeadlessResource {
                heap,
                desc: *desc,
                data,
                subresources,
            },
        );
        Ok(ResourceHandle(id))
    }

    fn release_resource(&self, resource: ResourceHandle) {
        let mut state = self.lock();
        if state.resources.remove(&resource.0).is_some() {
            state.released.push(resource);
        } else {
            log::warn!("HeadlessDevice: release of unknown resource {resource:?}");
        }
    }

    fn write_mapped(
        &self,
        resource: ResourceHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), NativeError> {
        let mut state = self.lock();
        let target = state.resource_mut(resource)?;
        if target.heap != HeapType::Upload {
            return Err(NativeError::OutOfBounds);
        }
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or(NativeError::OutOfBounds)?;
        target
            .data
            .get_mut(offset as usize..end as usize)
            .ok_or(NativeError::OutOfBounds)?
            .copy_from_slice(data);
        Ok(())
    }

    fn read_mapped(
        &self,
        resource: ResourceHandle,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>, NativeError> {
        let state = self.lock();
        let source = state.resource(resource)?;
        if source.heap == HeapType::Default {
            return Err(NativeError::OutOfBounds);
        }
        let end = offset.checked_add(len).ok_or(NativeError::OutOfBounds)?;
        source
            .data
            .get(offset as usize..end as usize)
            .map(<[u8]>::to_vec)
            .ok_or(NativeError::OutOfBounds)
    }

    fn gpu_virtual_address(&self, resource: ResourceHandle) -> u64 {
        resource.0 << 32
    }

    fn create_descriptor_heap(
        &self,
        kind: DescriptorHeapKind,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<NativeHeap, NativeError> {
        let mut state = self.lock();
        let id = state.allocate_id();
        state.heaps.insert(id, (kind, capacity));
        let start = id << 32;
        Ok(NativeHeap {
            handle: HeapHandle(id),
            cpu_start: CpuDescriptor(start),
            gpu_start: shader_visible.then_some(GpuDescriptor(start)),
            increment: DESCRIPTOR_INCREMENT,
        })
    }

    fn release_descriptor_heap(&self, heap: HeapHandle) {
        let mut state = self.lock();
        state.heaps.remove(&heap.0);
        state.descriptors.retain(|address, _| address >> 32 != heap.0);
    }

    fn create_shader_resource_view(
        &self,
        resource: Option<ResourceHandle>,
        desc: &SrvDesc,
        dst: CpuDescriptor,
    ) {
        self.lock()
            .descriptors
            .insert(dst.0, DescriptorContent::Srv(resource, *desc));
    }

    fn create_unordered_access_view(
        &self,
        resource: ResourceHandle,
        desc: &UavDesc,
        dst: CpuDescriptor,
    ) {
        self.lock()
            .descriptors
            .insert(dst.0, DescriptorContent::Uav(resource, *desc));
    }

    fn create_render_target_view(&self, resource: ResourceHandle, desc: &RtvDesc, dst: CpuDescriptor) {
        self.lock()
            .descriptors
            .insert(dst.0, DescriptorContent::Rtv(resource, *desc));
    }

    fn create_depth_stencil_view(
        &self,
        resource: ResourceHandle,
        format: DxgiFormat,
        dst: CpuDescriptor,
    ) {
        self.lock()
            .descriptors
            .insert(dst.0, DescriptorContent::Dsv(resource, format));
    }

    fn create_sampler(&self, desc: &NativeSamplerDesc, dst: CpuDescriptor) {
        self.lock()
            .descriptors
            .insert(dst.0, DescriptorContent::Sampler(*desc));
    }

    fn copy_descriptors_simple(
        &self,
        count: u32,
        dst: CpuDescriptor,
        src: CpuDescriptor,
        _kind: DescriptorHeapKind,
    ) {
        let mut state = self.lock();
        for i in 0..count {
            let from = src.offset(i, DESCRIPTOR_INCREMENT).0;
            let to = dst.offset(i, DESCRIPTOR_INCREMENT).0;
            match state.descriptors.get(&from).cloned() {
                Some(content) => {
                    state.descriptors.insert(to, content);
                }
                None => {
                    state.descriptors.remove(&to);
                }
            }
        }
    }

    fn create_root_signature(
        &self,
        desc: &RootSignatureDesc,
    ) -> Result<RootSignatureHandle, NativeError> {
        let mut state = self.lock();
        let id = state.allocate_id();
        state.root_signatures.insert(id, desc.clone());
        state.root_signature_creations += 1;
        Ok(RootSignatureHandle(id))
    }

    fn release_root_signature(&self, root_signature: RootSignatureHandle) {
        self.lock().root_signatures.remove(&root_signature.0);
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
    ) -> Result<PipelineHandle, NativeError> {
        let mut state = self.lock();
        if !state.root_signatures.contains_key(&desc.root_signature.0) {
            return Err(NativeError::InvalidHandle);
        }
        if desc.vertex_shader.is_empty() || desc.pixel_shader.is_empty() {
            return Err(NativeError::CreationFailed("empty shader bytecode".into()));
        }
        let id = state.allocate_id();
        state.pipelines.insert(id, Some(desc.clone()));
        state.graphics_pipeline_creations += 1;
        Ok(PipelineHandle(id))
    }

    fn create_compute_pipeline(
        &self,
        root_signature: RootSignatureHandle,
        compute_shader: &[u8],
    ) -> Result<PipelineHandle, NativeError> {
        let mut state = self.lock();
        if !state.root_signatures.contains_key(&root_signature.0) || compute_shader.is_empty() {
            return Err(NativeError::InvalidHandle);
        }
        let id = state.allocate_id();
        state.pipelines.insert(id, None);
        Ok(PipelineHandle(id))
    }

    fn release_pipeline(&self, pipeline: PipelineHandle) {
        self.lock().pipelines.remove(&pipeline.0);
    }

    fn compile_shader(
        &self,
        source: &str,
        profile: &str,
        defines: &[(&str, &str)],
    ) -> Result<Vec<u8>, NativeError> {
        if let Some(line) = source.lines().find(|l| l.trim_start().starts_with("#error")) {
            return Err(NativeError::ShaderCompilation(line.trim().to_string()));
        }
        if !source.contains("main") {
            return Err(NativeError::ShaderCompilation(
                "error X3501: 'main': entrypoint not found".to_string(),
            ));
        }
        let mut bytecode = b"DXBC".to_vec();
        bytecode.extend_from_slice(profile.as_bytes());
        for (name, value) in defines {
            bytecode.extend_from_slice(name.as_bytes());
            bytecode.extend_from_slice(value.as_bytes());
        }
        bytecode.extend_from_slice(source.as_bytes());
        Ok(bytecode)
    }

    fn create_fence(&self, initial_value: u64) -> Result<FenceHandle, NativeError> {
        let mut state = self.lock();
        let id = state.allocate_id();
        state.fences.insert(
            id,
            FenceState {
                completed: initial_value,
                pending: VecDeque::new(),
            },
        );
        Ok(FenceHandle(id))
    }

    fn signal(&self, fence: FenceHandle, value: u64) -> Result<(), NativeError> {
        let mut state = self.lock();
        let manual = state.manual_fences;
        let fence = state
            .fences
            .get_mut(&fence.0)
            .ok_or(NativeError::InvalidHandle)?;
        if manual {
            fence.pending.push_back(value);
        } else {
            fence.completed = fence.completed.max(value);
        }
        Ok(())
    }

    fn completed_value(&self, fence: FenceHandle) -> u64 {
        self.lock()
            .fences
            .get(&fence.0)
            .map_or(0, |f| f.completed)
    }

    fn wait(&self, fence: FenceHandle, value: u64) -> Result<(), NativeError> {
        let mut state = self.lock();
        let fence = state
            .fences
            .get_mut(&fence.0)
            .ok_or(NativeError::InvalidHandle)?;
        // The "GPU" catches up with every signal up to the awaited one.
        while fence.completed < value {
            match fence.pending.pop_front() {
                Some(signaled) => fence.completed = fence.completed.max(signaled),
                None => {
                    return Err(NativeError::Other(format!(
                        "wait for fence value {value} that was never signaled"
                    )))
                }
            }
        }
        Ok(())
    }

    fn execute(&self, list: &CommandList) -> Result<(), NativeError> {
        let mut state = self.lock();
        let mut exec = ExecState::default();
        for command in list.commands() {
            run_command(&mut state, &mut exec, command)?;
        }
        state.executed_lists += 1;
        Ok(())
    }

    fn create_swapchain(
        &self,
        _window: RawWindowHandle,
        width: u32,
        height: u32,
        buffer_count: u32,
        format: DxgiFormat,
    ) -> Result<SwapchainHandle, NativeError> {
        let desc = ResourceDesc::texture_2d(
            format,
            width,
            height,
            1,
            1,
            ResourceFlags::ALLOW_RENDER_TARGET,
        );
        let buffers = (0..buffer_count)
            .map(|_| {
                self.create_committed_resource(HeapType::Default, &desc, ResourceStates::PRESENT, None)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut state = self.lock();
        let id = state.allocate_id();
        state.swapchains.insert(
            id,
            HeadlessSwapchain {
                buffers,
                current: 0,
                format,
            },
        );
        Ok(SwapchainHandle(id))
    }

    fn resize_swapchain(
        &self,
        swapchain: SwapchainHandle,
        width: u32,
        height: u32,
    ) -> Result<(), NativeError> {
        let (old, format) = {
            let mut state = self.lock();
            let chain = state
                .swapchains
                .get_mut(&swapchain.0)
                .ok_or(NativeError::InvalidHandle)?;
            chain.current = 0;
            (std::mem::take(&mut chain.buffers), chain.format)
        };
        for buffer in &old {
            self.release_resource(*buffer);
        }
        let desc = ResourceDesc::texture_2d(
            format,
            width,
            height,
            1,
            1,
            ResourceFlags::ALLOW_RENDER_TARGET,
        );
        let buffers = old
            .iter()
            .map(|_| {
                self.create_committed_resource(HeapType::Default, &desc, ResourceStates::PRESENT, None)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut state = self.lock();
        if let Some(chain) = state.swapchains.get_mut(&swapchain.0) {
            chain.buffers = buffers;
        }
        Ok(())
    }

    fn swapchain_buffer(
        &self,
        swapchain: SwapchainHandle,
        index: u32,
    ) -> Result<ResourceHandle, NativeError> {
        self.lock()
            .swapchains
            .get(&swapchain.0)
            .and_then(|c| c.buffers.get(index as usize).copied())
            .ok_or(NativeError::InvalidHandle)
    }

    fn current_back_buffer_index(&self, swapchain: SwapchainHandle) -> u32 {
        self.lock()
            .swapchains
            .get(&swapchain.0)
            .map_or(0, |c| c.current)
    }

    fn present(
        &self,
        swapchain: SwapchainHandle,
        _sync_interval: u32,
        _allow_tearing: bool,
    ) -> Result<(), NativeError> {
        let mut state = self.lock();
        if let Some(reason) = state.present_failure.take() {
            return Err(NativeError::DeviceRemoved { reason });
        }
        let chain = state
            .swapchains
            .get_mut(&swapchain.0)
            .ok_or(NativeError::InvalidHandle)?;
        chain.current = (chain.current + 1) % chain.buffers.len().max(1) as u32;
        Ok(())
    }

    fn supports_tearing(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_copies_move_bytes() {
        // --- 1. ARRANGE ---
        let device = HeadlessDevice::new();
        let upload = device
            .create_committed_resource(
                HeapType::Upload,
                &ResourceDesc::buffer(16),
                ResourceStates::GENERIC_READ,
                None,
            )
            .unwrap();
        let target = device
            .create_committed_resource(
                HeapType::Default,
                &ResourceDesc::buffer(16),
                ResourceStates::COPY_DEST,
                None,
            )
            .unwrap();
        device.write_mapped(upload, 4, &[1, 2, 3, 4]).unwrap();

        // --- 2. ACT ---
        let mut list = CommandList::new();
        list.record(NativeCommand::CopyBufferRegion {
            dst: target,
            dst_offset: 8,
            src: upload,
            src_offset: 4,
            size: 4,
        });
        device.execute(&list).unwrap();

        // --- 3. ASSERT ---
        let contents = device.buffer_contents(target).unwrap();
        assert_eq!(&contents[8..12], &[1, 2, 3, 4]);
        assert!(device.read_mapped(target, 0, 4).is_err());
        assert_eq!(
            device.write_mapped(upload, u64::MAX - 1, &[1, 2, 3, 4]),
            Err(NativeError::OutOfBounds)
        );
        assert_eq!(device.read_mapped(upload, u64::MAX, 2), Err(NativeError::OutOfBounds));
    }

    #[test]
    fn manual_fences_complete_on_wait() {
        let device = HeadlessDevice::new();
        device.set_manual_fences(true);
        let fence = device.create_fence(0).unwrap();
        device.signal(fence, 1).unwrap();
        device.signal(fence, 2).unwrap();
        assert_eq!(device.completed_value(fence), 0);

        device.wait(fence, 1).unwrap();
        assert_eq!(device.completed_value(fence), 1);
        assert!(device.wait(fence, 3).is_err());

        device.complete_all_fences();
        assert_eq!(device.completed_value(fence), 2);
    }

    #[test]
    fn clearing_a_render_target_view_fills_the_subresource() {
        let device = HeadlessDevice::new();
        let texture = device
            .create_committed_resource(
                HeapType::Default,
                &ResourceDesc::texture_2d(
                    DxgiFormat::R8G8B8A8_UNORM,
                    2,
                    2,
                    1,
                    1,
                    ResourceFlags::ALLOW_RENDER_TARGET,
                ),
                ResourceStates::RENDER_TARGET,
                None,
            )
            .unwrap();
        let heap = device
            .create_descriptor_heap(DescriptorHeapKind::Rtv, 4, false)
            .unwrap();
        let rtv = RtvDesc {
            format: DxgiFormat::R8G8B8A8_UNORM,
            mip_slice: 0,
            array_slice: 0,
        };
        device.create_render_target_view(texture, &rtv, heap.cpu_start);

        let mut list = CommandList::new();
        list.record(NativeCommand::ClearRenderTargetView {
            rtv: heap.cpu_start,
            color: [1.0, 0.0, 0.0, 1.0],
        });
        device.execute(&list).unwrap();

        assert_eq!(
            device.subresource_contents(texture, 0).unwrap(),
            [255, 0, 0, 255].repeat(4)
        );
    }

    #[test]
    fn failing_present_reports_device_removal() {
        let device = HeadlessDevice::new();
        let handle = raw_window_handle::RawWindowHandle::Web(raw_window_handle::WebWindowHandle::new(1));
        let chain = device
            .create_swapchain(handle, 4, 4, 3, DxgiFormat::R8G8B8A8_UNORM)
            .unwrap();
        device.present(chain, 1, false).unwrap();
        assert_eq!(device.current_back_buffer_index(chain), 1);

        device.fail_next_present("DXGI_ERROR_DEVICE_HUNG");
        assert_eq!(
            device.present(chain, 1, false),
            Err(NativeError::DeviceRemoved {
                reason: "DXGI_ERROR_DEVICE_HUNG".into()
            })
        );
    }
}
