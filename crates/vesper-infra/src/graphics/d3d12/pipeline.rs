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

//! Root signature and pipeline state caches.
//!
//! A program gets exactly one root signature, derived from its reflection:
//! one root constant buffer per uniform block (register = binding), then,
//! when the program samples textures, a sampler table over the sampler
//! registry and an SRV table. Pipeline state objects are keyed by a hash of
//! the blend state, the depth/stencil hash, the program, the attachment
//! formats and a seed packing the vertex layout hash with the raster state.
//! Every hashed struct is `Pod`, so its bytes carry no uninitialized padding
//! and logically equal inputs always hash equally.

use super::conversions::IntoD3d12;
use super::disposal::{Disposable, DisposalQueue};
use super::native::{
    DescriptorRange, DescriptorRangeKind, DxgiFormat, GraphicsPipelineDesc, NativeDevice,
    PipelineHandle, RasterizerDesc, RootParameter, RootSignatureDesc, RootSignatureHandle,
    ShaderVisibility,
};
use super::program::D3d12Program;
use super::vertex_layout::D3d12VertexLayout;
use ahash::AHashMap;
use bytemuck::{Pod, Zeroable};
use std::hash::{BuildHasher, Hasher};
use std::sync::Arc;
use vesper_core::renderer::{
    BlendDesc, CullMode, DepthStencilDesc, PipelineError, PrimitiveGroup, ProgramId,
    ProgramReflection, ShaderStage, StencilDesc, Winding,
};

fn key_hasher() -> ahash::AHasher {
    ahash::RandomState::with_seeds(
        0x5053_4f5f_6b65_7930,
        0x9e37_79b9_7f4a_7c15,
        0xbf58_476d_1ce4_e5b9,
        0x94d0_49bb_1331_11eb,
    )
    .build_hasher()
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct StencilKey {
    ops: [u32; 4],
    masks: [u32; 2],
}

impl From<&StencilDesc> for StencilKey {
    fn from(desc: &StencilDesc) -> Self {
        Self {
            ops: [
                desc.stencil_failure_op as u32,
                desc.depth_failure_op as u32,
                desc.depth_stencil_pass_op as u32,
                desc.compare as u32,
            ],
            masks: [desc.read_mask as u32, desc.write_mask as u32],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DepthStencilKey {
    depth_compare: u32,
    flags: u32,
    front: StencilKey,
    back: StencilKey,
}

/// Stable 32-bit hash of a depth/stencil description.
pub fn depth_stencil_hash(desc: &DepthStencilDesc) -> u32 {
    let key = DepthStencilKey {
        depth_compare: desc.depth_compare as u32,
        flags: desc.flags.bits(),
        front: StencilKey::from(&desc.front),
        back: StencilKey::from(&desc.back),
    };
    let mut hasher = key_hasher();
    hasher.write(bytemuck::bytes_of(&key));
    let full = hasher.finish();
    (full ^ (full >> 32)) as u32
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PipelineKey {
    blend: [u32; 8],
    depth_stencil_hash: u32,
    program: u32,
    program_high: u32,
    targets_hash: u32,
}

/// Formats of the attachments a pipeline renders into.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetFormats {
    /// Color attachment formats in slot order.
    pub color: Vec<DxgiFormat>,
    /// Depth/stencil format, `UNKNOWN` without one.
    pub depth_stencil: DxgiFormat,
}

impl TargetFormats {
    fn hash(&self) -> u32 {
        let mut hasher = key_hasher();
        for format in &self.color {
            hasher.write_u32(*format as u32);
        }
        hasher.write_u32(self.depth_stencil as u32);
        let full = hasher.finish();
        (full ^ (full >> 32)) as u32
    }
}

/// The raster inputs tracked by the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterState {
    /// Face culling.
    pub cull: CullMode,
    /// Front-face winding.
    pub winding: Winding,
    /// Topology class of the draw.
    pub group: PrimitiveGroup,
}

impl RasterState {
    fn seed(&self, layout_hash: u32) -> u64 {
        let front_ccw = (self.winding == Winding::CounterClockwise) as u64;
        (layout_hash as u64) << 32
            | (self.group as u64) << 16
            | (self.cull as u64) << 8
            | front_ccw
    }
}

/// Everything a pipeline is resolved from.
#[derive(Debug, Clone, Copy)]
pub struct PipelineInputs<'a> {
    /// Program identity.
    pub program_id: ProgramId,
    /// The program itself.
    pub program: &'a D3d12Program,
    /// Vertex layout.
    pub layout: &'a D3d12VertexLayout,
    /// Blend state.
    pub blend: &'a BlendDesc,
    /// Depth/stencil state.
    pub depth_stencil: &'a DepthStencilDesc,
    /// Raster state.
    pub raster: RasterState,
    /// Attachment formats of the current render target.
    pub targets: &'a TargetFormats,
}

impl PipelineInputs<'_> {
    /// The cache key of these inputs.
    pub fn key(&self) -> u64 {
        let b = self.blend;
        let key = PipelineKey {
            blend: [
                b.write_mask.bits() as u32,
                b.blend_enabled as u32,
                b.src_color as u32,
                b.dst_color as u32,
                b.color_op as u32,
                b.src_alpha as u32,
                b.dst_alpha as u32,
                b.alpha_op as u32,
            ],
            depth_stencil_hash: depth_stencil_hash(self.depth_stencil),
            program: self.program_id.0 as u32,
            program_high: (self.program_id.0 as u64 >> 32) as u32,
            targets_hash: self.targets.hash(),
        };
        let mut hasher = key_hasher();
        hasher.write_u64(self.raster.seed(self.layout.hash()));
        hasher.write(bytemuck::bytes_of(&key));
        hasher.finish()
    }
}

/// Where each binding of a program lives in its root signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootBindings {
    /// Root index of each uniform block, in reflection order.
    pub block_roots: Vec<u32>,
    /// `(root index, register count)` of the sampler table.
    pub sampler_table: Option<(u32, u32)>,
    /// `(root index, register count)` of the SRV table.
    pub srv_table: Option<(u32, u32)>,
}

/// A program's root signature.
#[derive(Debug)]
pub struct RootSignatureEntry {
    /// Native object.
    pub handle: RootSignatureHandle,
    /// Binding locations.
    pub bindings: RootBindings,
}

/// Describes the root signature of a program.
pub fn root_signature_layout(reflection: &ProgramReflection) -> (RootSignatureDesc, RootBindings) {
    let mut desc = RootSignatureDesc {
        allow_input_layout: true,
        ..Default::default()
    };
    let mut bindings = RootBindings {
        block_roots: Vec::with_capacity(reflection.uniform_blocks.len()),
        ..Default::default()
    };
    for block in &reflection.uniform_blocks {
        bindings.block_roots.push(desc.parameters.len() as u32);
        desc.parameters.push(RootParameter::Cbv {
            register: block.binding,
            visibility: match block.stage {
                ShaderStage::Vertex => ShaderVisibility::Vertex,
                ShaderStage::Fragment => ShaderVisibility::Pixel,
                ShaderStage::Compute => ShaderVisibility::All,
            },
        });
    }

    if let Some(max_slot) = reflection.max_sampler_slot() {
        let sampler_count = max_slot + 1;
        bindings.sampler_table = Some((desc.parameters.len() as u32, sampler_count));
        desc.parameters.push(RootParameter::DescriptorTable {
            ranges: vec![DescriptorRange {
                kind: DescriptorRangeKind::Sampler,
                count: sampler_count,
                base_register: 0,
            }],
            visibility: ShaderVisibility::Pixel,
        });

        let srv_count = reflection
            .textures
            .iter()
            .map(|t| t.binding + t.count.max(1))
            .max()
            .unwrap_or(0);
        bindings.srv_table = Some((desc.parameters.len() as u32, srv_count));
        desc.parameters.push(RootParameter::DescriptorTable {
            ranges: vec![DescriptorRange {
                kind: DescriptorRangeKind::Srv,
                count: srv_count,
                base_register: 0,
            }],
            visibility: ShaderVisibility::Pixel,
        });
    }
    (desc, bindings)
}

/// A root signature and pipeline state pair ready to bind.
#[derive(Debug, Clone)]
pub struct ResolvedPipeline {
    /// Root signature of the program.
    pub root: Arc<RootSignatureEntry>,
    /// Pipeline state object.
    pub pipeline: PipelineHandle,
}

/// Caches of root signatures by program and pipelines by key.
#[derive(Debug)]
pub struct PipelineCache {
    native: Arc<dyn NativeDevice>,
    root_signatures: AHashMap<ProgramId, Arc<RootSignatureEntry>>,
    pipelines: AHashMap<u64, PipelineHandle>,
    program_pipelines: AHashMap<ProgramId, Vec<u64>>,
}

impl PipelineCache {
    /// Creates empty caches.
    pub fn new(native: Arc<dyn NativeDevice>) -> Self {
        Self {
            native,
            root_signatures: AHashMap::default(),
            pipelines: AHashMap::default(),
            program_pipelines: AHashMap::default(),
        }
    }

    fn root_signature(
        &mut self,
        id: ProgramId,
        program: &D3d12Program,
    ) -> Result<Arc<RootSignatureEntry>, PipelineError> {
        if let Some(entry) = self.root_signatures.get(&id) {
            return Ok(entry.clone());
        }
        let (desc, bindings) = root_signature_layout(&program.reflection);
        let handle = self.native.create_root_signature(&desc).map_err(|err| {
            log::error!(
                "PipelineCache: root signature for '{}' failed: {err}",
                program.label
            );
            PipelineError::RootSignatureCreationFailed(err.to_string())
        })?;
        let entry = Arc::new(RootSignatureEntry { handle, bindings });
        self.root_signatures.insert(id, entry.clone());
        Ok(entry)
    }

    /// Finds or builds the root signature and pipeline for `inputs`.
    ///
    /// ## Errors
    /// * `PipelineError::RootSignatureCreationFailed` - If the root signature is rejected.
    /// * `PipelineError::CompilationFailed` - If the pipeline state is rejected.
    pub fn resolve(&mut self, inputs: &PipelineInputs) -> Result<ResolvedPipeline, PipelineError> {
        let root = self.root_signature(inputs.program_id, inputs.program)?;
        let key = inputs.key();
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(ResolvedPipeline {
                root,
                pipeline: *pipeline,
            });
        }

        let mut depth_stencil = (*inputs.depth_stencil).into_d3d12();
        if inputs.targets.depth_stencil == DxgiFormat::UNKNOWN {
            depth_stencil.depth_enable = false;
            depth_stencil.depth_write = false;
            depth_stencil.stencil_enable = false;
        }
        let desc = GraphicsPipelineDesc {
            root_signature: root.handle,
            vertex_shader: inputs.program.vertex.clone(),
            pixel_shader: inputs.program.pixel.clone(),
            input_layout: inputs.layout.elements().to_vec(),
            blend: (*inputs.blend).into_d3d12(),
            rasterizer: RasterizerDesc {
                cull: inputs.raster.cull.into_d3d12(),
                front_counter_clockwise: inputs.raster.winding == Winding::CounterClockwise,
            },
            depth_stencil,
            topology_type: inputs.raster.group.into_d3d12(),
            rtv_formats: inputs.targets.color.clone(),
            dsv_format: inputs.targets.depth_stencil,
        };
        let pipeline = self.native.create_graphics_pipeline(&desc).map_err(|err| {
            log::error!(
                "PipelineCache: pipeline for '{}' failed: {err}",
                inputs.program.label
            );
            PipelineError::CompilationFailed {
                details: err.to_string(),
            }
        })?;
        log::debug!(
            "PipelineCache: created pipeline {key:#018x} for '{}'",
            inputs.program.label
        );
        self.pipelines.insert(key, pipeline);
        self.program_pipelines
            .entry(inputs.program_id)
            .or_default()
            .push(key);
        Ok(ResolvedPipeline { root, pipeline })
    }

    /// Evicts the root signature and every pipeline of `program`.
    ///
    /// The evicted objects are queued for release once frame fence
    /// `fence_value` completes, since the frame being recorded may already
    /// reference them.
    pub fn remove_cached_objects(
        &mut self,
        program: ProgramId,
        fence_value: u64,
        disposal: &mut DisposalQueue,
    ) {
        let mut evicted = 0;
        for key in self.program_pipelines.remove(&program).unwrap_or_default() {
            if let Some(pipeline) = self.pipelines.remove(&key) {
                disposal.push(fence_value, Disposable::Pipeline(pipeline));
                evicted += 1;
            }
        }
        if let Some(entry) = self.root_signatures.remove(&program) {
            disposal.push(fence_value, Disposable::RootSignature(entry.handle));
        }
        log::debug!(
            "PipelineCache: evicted {evicted} pipelines of program {} until frame {fence_value}",
            program.0
        );
    }

    /// Number of cached pipelines.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Number of cached root signatures.
    pub fn root_signature_count(&self) -> usize {
        self.root_signatures.len()
    }
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        for (_, pipeline) in self.pipelines.drain() {
            self.native.release_pipeline(pipeline);
        }
        for (_, entry) in self.root_signatures.drain() {
            self.native.release_root_signature(entry.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::d3d12::descriptor_heap::DescriptorHeapSet;
    use crate::graphics::d3d12::native::HeadlessDevice;
    use std::borrow::Cow;
    use vesper_core::renderer::{
        BlendFactor, DepthStencilFlags, ProgramDescriptor, TextureBindingInfo, UniformBlockInfo,
        VertexFormat, VertexLayoutDesc,
    };

    struct Fixture {
        device: Arc<HeadlessDevice>,
        cache: PipelineCache,
        program: D3d12Program,
        layout: D3d12VertexLayout,
        targets: TargetFormats,
    }

    fn reflection() -> ProgramReflection {
        ProgramReflection {
            uniform_blocks: vec![
                UniformBlockInfo {
                    name: "vs_ub".into(),
                    binding: 0,
                    size: 64,
                    stage: ShaderStage::Vertex,
                    members: Vec::new(),
                },
                UniformBlockInfo {
                    name: "fs_ub".into(),
                    binding: 1,
                    size: 16,
                    stage: ShaderStage::Fragment,
                    members: Vec::new(),
                },
            ],
            textures: vec![
                TextureBindingInfo {
                    name: "u_tex0".into(),
                    binding: 0,
                    count: 1,
                    sampler_slot: 0,
                },
                TextureBindingInfo {
                    name: "u_lut".into(),
                    binding: 2,
                    count: 2,
                    sampler_slot: 4,
                },
            ],
            vertex_inputs: Vec::new(),
        }
    }

    fn fixture() -> Fixture {
        let device = Arc::new(HeadlessDevice::new());
        let program = D3d12Program::new(&ProgramDescriptor {
            label: Some(Cow::Borrowed("sprite")),
            vertex_bytecode: Cow::Borrowed(b"DXBCvs"),
            fragment_bytecode: Cow::Borrowed(b"DXBCps"),
            reflection: reflection(),
        })
        .unwrap();
        let layout = D3d12VertexLayout::new(
            VertexLayoutDesc::new()
                .attribute("POSITION", 0, VertexFormat::Float3, 0, false)
                .end_layout(None),
        );
        Fixture {
            cache: PipelineCache::new(device.clone()),
            device,
            program,
            layout,
            targets: TargetFormats {
                color: vec![DxgiFormat::R8G8B8A8_UNORM],
                depth_stencil: DxgiFormat::D24_UNORM_S8_UINT,
            },
        }
    }

    fn raster() -> RasterState {
        RasterState {
            cull: CullMode::Back,
            winding: Winding::CounterClockwise,
            group: PrimitiveGroup::Triangle,
        }
    }

    #[test]
    fn root_signature_follows_reflection() {
        let (desc, bindings) = root_signature_layout(&reflection());

        assert_eq!(bindings.block_roots, vec![0, 1]);
        assert_eq!(bindings.sampler_table, Some((2, 5)));
        assert_eq!(bindings.srv_table, Some((3, 4)));
        assert_eq!(
            desc.parameters[1],
            RootParameter::Cbv {
                register: 1,
                visibility: ShaderVisibility::Pixel
            }
        );
        assert!(desc.allow_input_layout);

        let (bare, empty) = root_signature_layout(&ProgramReflection::default());
        assert!(bare.parameters.is_empty());
        assert_eq!(empty, RootBindings::default());
    }

    #[test]
    fn identical_inputs_resolve_to_the_same_pipeline() {
        // --- 1. ARRANGE ---
        let mut f = fixture();
        let blend = BlendDesc::alpha_premultiplied();
        let depth_stencil = DepthStencilDesc::default();
        let inputs = PipelineInputs {
            program_id: ProgramId(7),
            program: &f.program,
            layout: &f.layout,
            blend: &blend,
            depth_stencil: &depth_stencil,
            raster: raster(),
            targets: &f.targets,
        };

        // --- 2. ACT ---
        let first = f.cache.resolve(&inputs).unwrap();
        let second = f.cache.resolve(&inputs).unwrap();

        // --- 3. ASSERT ---
        assert_eq!(first.pipeline, second.pipeline);
        assert!(Arc::ptr_eq(&first.root, &second.root));
        assert_eq!(f.device.graphics_pipeline_creations(), 1);
        assert_eq!(f.device.root_signature_creations(), 1);
    }

    #[test]
    fn any_key_component_change_builds_a_new_pipeline() {
        let mut f = fixture();
        let blend = BlendDesc::alpha_premultiplied();
        let other_blend = BlendDesc {
            src_color: BlendFactor::SrcAlpha,
            ..blend
        };
        let depth_stencil = DepthStencilDesc::default();
        let no_depth = DepthStencilDesc {
            flags: DepthStencilFlags::EMPTY,
            ..depth_stencil
        };
        let base = PipelineInputs {
            program_id: ProgramId(1),
            program: &f.program,
            layout: &f.layout,
            blend: &blend,
            depth_stencil: &depth_stencil,
            raster: raster(),
            targets: &f.targets,
        };

        let a = f.cache.resolve(&base).unwrap().pipeline;
        let b = f
            .cache
            .resolve(&PipelineInputs {
                blend: &other_blend,
                ..base
            })
            .unwrap()
            .pipeline;
        let c = f
            .cache
            .resolve(&PipelineInputs {
                depth_stencil: &no_depth,
                ..base
            })
            .unwrap()
            .pipeline;
        let d = f
            .cache
            .resolve(&PipelineInputs {
                raster: RasterState {
                    cull: CullMode::None,
                    ..raster()
                },
                ..base
            })
            .unwrap()
            .pipeline;

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(f.device.graphics_pipeline_creations(), 4);
        assert_eq!(f.device.root_signature_creations(), 1);
    }

    #[test]
    fn evicting_a_program_releases_its_objects() {
        // --- 1. ARRANGE ---
        let mut f = fixture();
        let blend = BlendDesc::alpha_non_premultiplied();
        let depth_stencil = DepthStencilDesc::default();
        for id in [ProgramId(1), ProgramId(2)] {
            f.cache
                .resolve(&PipelineInputs {
                    program_id: id,
                    program: &f.program,
                    layout: &f.layout,
                    blend: &blend,
                    depth_stencil: &depth_stencil,
                    raster: raster(),
                    targets: &f.targets,
                })
                .unwrap();
        }
        assert_eq!(f.device.live_pipeline_count(), 2);

        let native: Arc<dyn NativeDevice> = f.device.clone();
        let mut heaps = DescriptorHeapSet::new(&native, 4, 4, 4).unwrap();
        let mut disposal = DisposalQueue::new();

        // --- 2. ACT ---
        f.cache.remove_cached_objects(ProgramId(1), 3, &mut disposal);

        // --- 3. ASSERT ---
        assert_eq!(f.cache.pipeline_count(), 1);
        assert_eq!(f.cache.root_signature_count(), 1);
        assert_eq!(disposal.len(), 2);
        assert_eq!(f.device.live_pipeline_count(), 2);

        assert_eq!(disposal.process(2, native.as_ref(), &mut heaps), 0);
        assert_eq!(f.device.live_pipeline_count(), 2);
        assert_eq!(disposal.process(3, native.as_ref(), &mut heaps), 2);
        assert_eq!(f.device.live_pipeline_count(), 1);
    }

    #[test]
    fn targets_without_depth_disable_the_depth_test() {
        let mut f = fixture();
        f.targets.depth_stencil = DxgiFormat::UNKNOWN;
        let blend = BlendDesc::alpha_premultiplied();
        let depth_stencil = DepthStencilDesc::default();
        let resolved = f
            .cache
            .resolve(&PipelineInputs {
                program_id: ProgramId(3),
                program: &f.program,
                layout: &f.layout,
                blend: &blend,
                depth_stencil: &depth_stencil,
                raster: raster(),
                targets: &f.targets,
            })
            .unwrap();

        let desc = f.device.graphics_pipeline_desc(resolved.pipeline).unwrap();
        assert!(!desc.depth_stencil.depth_enable);
        assert_eq!(desc.rtv_formats, vec![DxgiFormat::R8G8B8A8_UNORM]);
    }
}
