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

//! GPU mip chain generation.
//!
//! Each pass samples mip `n - 1` through a linear-clamp static sampler and
//! writes mip `n` through a UAV. Array and cube textures cover every slice
//! in one dispatch per pass. The work is recorded on the isolated list.

use super::conversions::IntoD3d12;
use super::format::{subresource_index, CONSTANT_BUFFER_ALIGNMENT};
use super::native::{
    Barrier, DescriptorHeapKind, DescriptorRange, DescriptorRangeKind, NativeCommand,
    NativeDevice, NativeHeap, PipelineHandle, ResourceStates, RootParameter, RootSignatureDesc,
    RootSignatureHandle, ShaderVisibility, SrvDesc, SrvDimension, StaticSampler, UavDesc,
};
use super::texture::D3d12Texture;
use super::transfer::{backend_error, TransferQueue};
use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use vesper_core::math::align_up;
use vesper_core::renderer::{mip_extent, ResourceError, SamplerIndex};

const GENERATE_MIPS_HLSL: &str = include_str!("shaders/generate_mips.hlsl");

/// Threads per group along x and y.
const GROUP_SIZE: u32 = 8;

/// Longest mip chain of a 16384-texel texture.
const MAX_MIP_LEVELS: u32 = 15;

const SRV_ROOT: u32 = 0;
const UAV_ROOT: u32 = 1;
const CONSTANTS_ROOT: u32 = 2;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct MipConstants {
    src_dim: [u32; 2],
    dst_dim: [u32; 2],
    inv_src_dim: [f32; 2],
    first_slice: u32,
    slice_count: u32,
}

#[derive(Debug)]
struct MipPipelines {
    root_signature: RootSignatureHandle,
    plain: PipelineHandle,
    array: PipelineHandle,
}

/// Lazily built compute pipelines and descriptor heap for mip generation.
#[derive(Debug)]
pub struct MipmapGenerator {
    native: Arc<dyn NativeDevice>,
    use_dxc: bool,
    pipelines: Option<MipPipelines>,
    heap: Option<(NativeHeap, u32)>,
}

impl MipmapGenerator {
    /// Creates a generator. Nothing native is created before the first use.
    pub fn new(native: Arc<dyn NativeDevice>, use_dxc: bool) -> Self {
        Self {
            native,
            use_dxc,
            pipelines: None,
            heap: None,
        }
    }

    fn ensure_pipelines(&mut self) -> Result<&MipPipelines, ResourceError> {
        if self.pipelines.is_none() {
            let root_signature = self
                .native
                .create_root_signature(&RootSignatureDesc {
                    parameters: vec![
                        RootParameter::DescriptorTable {
                            ranges: vec![DescriptorRange {
                                kind: DescriptorRangeKind::Srv,
                                count: 1,
                                base_register: 0,
                            }],
                            visibility: ShaderVisibility::All,
                        },
                        RootParameter::DescriptorTable {
                            ranges: vec![DescriptorRange {
                                kind: DescriptorRangeKind::Uav,
                                count: 1,
                                base_register: 0,
                            }],
                            visibility: ShaderVisibility::All,
                        },
                        RootParameter::Cbv {
                            register: 0,
                            visibility: ShaderVisibility::All,
                        },
                    ],
                    static_samplers: vec![StaticSampler {
                        desc: SamplerIndex::LinearClamp.desc().into_d3d12(),
                        register: 0,
                        visibility: ShaderVisibility::All,
                    }],
                    allow_input_layout: false,
                })
                .map_err(backend_error)?;
            let profile = if self.use_dxc { "cs_6_0" } else { "cs_5_1" };
            let build = |defines: &[(&str, &str)]| -> Result<PipelineHandle, ResourceError> {
                let bytecode = self
                    .native
                    .compile_shader(GENERATE_MIPS_HLSL, profile, defines)
                    .map_err(|err| {
                        log::error!("MipmapGenerator: compute shader failed to compile: {err}");
                        backend_error(err)
                    })?;
                self.native
                    .create_compute_pipeline(root_signature, &bytecode)
                    .map_err(backend_error)
            };
            let plain = match build(&[("USE_ARRAY", "0")]) {
                Ok(plain) => plain,
                Err(err) => {
                    self.native.release_root_signature(root_signature);
                    return Err(err);
                }
            };
            let array = match build(&[("USE_ARRAY", "1")]) {
                Ok(array) => array,
                Err(err) => {
                    self.native.release_pipeline(plain);
                    self.native.release_root_signature(root_signature);
                    return Err(err);
                }
            };
            log::debug!("MipmapGenerator: compute pipelines created");
            self.pipelines = Some(MipPipelines {
                root_signature,
                plain,
                array,
            });
        }
        self.pipelines
            .as_ref()
            .ok_or_else(|| ResourceError::BackendError("mip pipelines missing".into()))
    }

    fn ensure_heap(&mut self, mip_count: u32) -> Result<NativeHeap, ResourceError> {
        let needed = align_up(mip_count.max(MAX_MIP_LEVELS) as u64 * 2, 64) as u32;
        if let Some((heap, capacity)) = self.heap {
            if capacity >= needed {
                return Ok(heap);
            }
            self.native.release_descriptor_heap(heap.handle);
            self.heap = None;
        }
        let heap = self
            .native
            .create_descriptor_heap(DescriptorHeapKind::CbvSrvUav, needed, true)
            .map_err(|err| {
                log::error!("MipmapGenerator: descriptor heap of {needed} slots failed: {err}");
                backend_error(err)
            })?;
        self.heap = Some((heap, needed));
        Ok(heap)
    }

    /// Fills mips `1..` of `texture` from mip 0.
    ///
    /// ## Errors
    /// * `ResourceError::UnsupportedFormat` - For compressed or depth textures.
    /// * `ResourceError::BackendError` - If the pipelines or the heap cannot be created.
    pub fn generate(
        &mut self,
        texture: &mut D3d12Texture,
        transfer: &mut TransferQueue,
    ) -> Result<(), ResourceError> {
        let format = texture.desc().format;
        if format.is_compressed() || texture.is_depth_stencil() {
            log::warn!("MipmapGenerator: cannot generate mips for {format:?}");
            return Err(ResourceError::UnsupportedFormat(format!("{format:?}")));
        }
        let mip_count = texture.mip_count();
        if mip_count < 2 {
            return Ok(());
        }

        let (root_signature, pipeline) = {
            let pipelines = self.ensure_pipelines()?;
            let pipeline = if texture.layers() > 1 {
                pipelines.array
            } else {
                pipelines.plain
            };
            (pipelines.root_signature, pipeline)
        };
        let heap = self.ensure_heap(mip_count)?;
        let gpu_start = heap
            .gpu_start
            .ok_or_else(|| ResourceError::BackendError("mip heap is not shader visible".into()))?;

        // The previous isolated submission may still read this heap.
        transfer.list()?;

        let layers = texture.layers();
        let is_array = layers > 1;
        let width = texture.desc().width;
        let height = texture.desc().height;
        for dst_mip in 1..mip_count {
            let src_mip = dst_mip - 1;
            let srv_slot = src_mip * 2;
            let uav_slot = srv_slot + 1;
            self.native.create_shader_resource_view(
                Some(texture.resource()),
                &SrvDesc {
                    format: texture.format(),
                    dimension: if is_array {
                        SrvDimension::Texture2DArray
                    } else {
                        SrvDimension::Texture2D
                    },
                    most_detailed_mip: src_mip,
                    mip_levels: 1,
                    first_slice: 0,
                    array_size: layers,
                },
                heap.cpu_start.offset(srv_slot, heap.increment),
            );
            self.native.create_unordered_access_view(
                texture.resource(),
                &UavDesc {
                    format: texture.format(),
                    mip_slice: dst_mip,
                    first_slice: 0,
                    array_size: layers,
                    is_array,
                },
                heap.cpu_start.offset(uav_slot, heap.increment),
            );

            let src_dim = [mip_extent(width, src_mip), mip_extent(height, src_mip)];
            let dst_dim = [mip_extent(width, dst_mip), mip_extent(height, dst_mip)];
            let constants = MipConstants {
                src_dim,
                dst_dim,
                inv_src_dim: [1.0 / src_dim[0] as f32, 1.0 / src_dim[1] as f32],
                first_slice: 0,
                slice_count: layers,
            };
            let staged = transfer.stage(bytemuck::bytes_of(&constants), CONSTANT_BUFFER_ALIGNMENT)?;
            let constants_address = self.native.gpu_virtual_address(staged.resource) + staged.offset;

            let list = transfer.list()?;
            for layer in 0..layers {
                texture.transition(
                    list,
                    Some(subresource_index(src_mip, layer, mip_count)),
                    ResourceStates::NON_PIXEL_SHADER_RESOURCE,
                );
                texture.transition(
                    list,
                    Some(subresource_index(dst_mip, layer, mip_count)),
                    ResourceStates::UNORDERED_ACCESS,
                );
            }
            list.record(NativeCommand::SetDescriptorHeaps(vec![heap.handle]));
            list.record(NativeCommand::SetComputeRootSignature(root_signature));
            list.record(NativeCommand::SetPipelineState(pipeline));
            list.record(NativeCommand::SetComputeRootDescriptorTable {
                index: SRV_ROOT,
                base: gpu_start.offset(srv_slot, heap.increment),
            });
            list.record(NativeCommand::SetComputeRootDescriptorTable {
                index: UAV_ROOT,
                base: gpu_start.offset(uav_slot, heap.increment),
            });
            list.record(NativeCommand::SetComputeRootConstantBufferView {
                index: CONSTANTS_ROOT,
                address: constants_address,
            });
            list.record(NativeCommand::Dispatch {
                x: dst_dim[0].div_ceil(GROUP_SIZE),
                y: dst_dim[1].div_ceil(GROUP_SIZE),
                z: if is_array { layers } else { 1 },
            });
            list.barriers([Barrier::Uav {
                resource: texture.resource(),
            }]);
        }

        let steady = texture.steady_state();
        let list = transfer.list()?;
        texture.transition(list, None, steady);
        texture.isolated_fence_value = transfer.submit(false)?;
        log::trace!(
            "MipmapGenerator: {} passes recorded for a {}x{} texture",
            mip_count - 1,
            width,
            height
        );
        Ok(())
    }
}

impl Drop for MipmapGenerator {
    fn drop(&mut self) {
        if let Some(pipelines) = self.pipelines.take() {
            self.native.release_pipeline(pipelines.plain);
            self.native.release_pipeline(pipelines.array);
            self.native.release_root_signature(pipelines.root_signature);
        }
        if let Some((heap, _)) = self.heap.take() {
            self.native.release_descriptor_heap(heap.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::d3d12::descriptor_heap::DescriptorHeapSet;
    use crate::graphics::d3d12::native::HeadlessDevice;
    use vesper_core::renderer::{PixelFormat, SamplerHandle, TextureDescriptor, TextureType};

    fn setup() -> (Arc<HeadlessDevice>, DescriptorHeapSet, TransferQueue, MipmapGenerator) {
        let device = Arc::new(HeadlessDevice::new());
        let native: Arc<dyn NativeDevice> = device.clone();
        let heaps = DescriptorHeapSet::new(&native, 16, 4, 4).unwrap();
        let transfer = TransferQueue::new(native.clone(), 1 << 20).unwrap();
        (device, heaps, transfer, MipmapGenerator::new(native, false))
    }

    #[test]
    fn one_dispatch_per_pass_and_everything_ends_shader_readable() {
        // --- 1. ARRANGE ---
        let (device, mut heaps, mut transfer, mut generator) = setup();
        let desc = TextureDescriptor {
            width: 64,
            height: 16,
            mip_levels: 0,
            ..Default::default()
        };
        let mut texture =
            D3d12Texture::create(device.as_ref(), &mut heaps, &desc, SamplerHandle(0)).unwrap();

        // --- 2. ACT ---
        generator.generate(&mut texture, &mut transfer).unwrap();

        // --- 3. ASSERT ---
        assert_eq!(texture.mip_count(), 7);
        assert_eq!(device.dispatch_count(), 6);
        for mip in 0..7 {
            assert_eq!(texture.state(mip), Some(ResourceStates::PIXEL_SHADER_RESOURCE));
        }
        assert!(texture.isolated_fence_value > 0);
    }

    #[test]
    fn pipelines_are_built_once() {
        let (device, mut heaps, mut transfer, mut generator) = setup();
        let desc = TextureDescriptor {
            texture_type: TextureType::TextureCube,
            width: 8,
            height: 8,
            mip_levels: 0,
            ..Default::default()
        };
        let mut cube =
            D3d12Texture::create(device.as_ref(), &mut heaps, &desc, SamplerHandle(0)).unwrap();

        generator.generate(&mut cube, &mut transfer).unwrap();
        generator.generate(&mut cube, &mut transfer).unwrap();

        assert_eq!(device.root_signature_creations(), 1);
        assert_eq!(device.dispatch_count(), 6);
    }

    #[test]
    fn compressed_textures_are_rejected() {
        let (device, mut heaps, mut transfer, mut generator) = setup();
        let desc = TextureDescriptor {
            format: PixelFormat::BC3,
            width: 16,
            height: 16,
            mip_levels: 0,
            ..Default::default()
        };
        let mut texture =
            D3d12Texture::create(device.as_ref(), &mut heaps, &desc, SamplerHandle(0)).unwrap();
        assert!(matches!(
            generator.generate(&mut texture, &mut transfer),
            Err(ResourceError::UnsupportedFormat(_))
        ));
        assert_eq!(device.dispatch_count(), 0);
    }
}
