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

//! Plain-data mirrors of the Direct3D 12 structures the backend records.
//!
//! Enum discriminants match the native `D3D12_*` / `DXGI_*` values so the
//! Windows device can cast them directly.

use vesper_core::vesper_bitflags;

/// A committed GPU resource owned by a [`NativeDevice`](super::NativeDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(pub u64);

/// A native descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapHandle(pub u64);

/// A native root signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootSignatureHandle(pub u64);

/// A native graphics or compute pipeline state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u64);

/// A native fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceHandle(pub u64);

/// A native swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapchainHandle(pub u64);

/// CPU address of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CpuDescriptor(pub u64);

impl CpuDescriptor {
    /// The descriptor `index * increment` bytes further.
    pub const fn offset(self, index: u32, increment: u32) -> Self {
        Self(self.0 + index as u64 * increment as u64)
    }
}

/// GPU address of a descriptor in a shader-visible heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GpuDescriptor(pub u64);

impl GpuDescriptor {
    /// The descriptor `index * increment` bytes further.
    pub const fn offset(self, index: u32, increment: u32) -> Self {
        Self(self.0 + index as u64 * increment as u64)
    }
}

/// Memory pool of a committed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapType {
    /// GPU-local memory.
    Default = 1,
    /// CPU-write, GPU-read memory, persistently mapped.
    Upload = 2,
    /// GPU-write, CPU-read memory.
    Readback = 3,
}

vesper_bitflags! {
    /// `D3D12_RESOURCE_STATES`.
    pub struct ResourceStates: u32 {
        /// Common / present.
        const COMMON = 0;
        /// Vertex or constant buffer.
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        /// Index buffer.
        const INDEX_BUFFER = 0x2;
        /// Render target.
        const RENDER_TARGET = 0x4;
        /// Unordered access.
        const UNORDERED_ACCESS = 0x8;
        /// Depth write.
        const DEPTH_WRITE = 0x10;
        /// Depth read.
        const DEPTH_READ = 0x20;
        /// Read by non-pixel stages.
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        /// Read by the pixel stage.
        const PIXEL_SHADER_RESOURCE = 0x80;
        /// Copy destination.
        const COPY_DEST = 0x400;
        /// Copy source.
        const COPY_SOURCE = 0x800;
        /// Required state of upload-heap resources.
        const GENERIC_READ = 0xAC3;
    }
}

impl ResourceStates {
    /// Alias of [`ResourceStates::COMMON`] for swapchain buffers.
    pub const PRESENT: Self = Self::COMMON;
    /// Readable by every shader stage.
    pub const ALL_SHADER_RESOURCE: Self = Self::from_bits_truncate(0xC0);
}

vesper_bitflags! {
    /// `D3D12_RESOURCE_FLAGS`.
    pub struct ResourceFlags: u32 {
        /// Usable as a render target.
        const ALLOW_RENDER_TARGET = 0x1;
        /// Usable as a depth/stencil target.
        const ALLOW_DEPTH_STENCIL = 0x2;
        /// Usable as an unordered-access view.
        const ALLOW_UNORDERED_ACCESS = 0x4;
    }
}

/// `DXGI_FORMAT` values used by the backend.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DxgiFormat {
    /// No format.
    #[default]
    UNKNOWN = 0,
    /// 4x f32.
    R32G32B32A32_FLOAT = 2,
    /// 4x i32.
    R32G32B32A32_SINT = 4,
    /// 3x f32.
    R32G32B32_FLOAT = 6,
    /// 3x i32.
    R32G32B32_SINT = 8,
    /// 4x u16 normalized.
    R16G16B16A16_UNORM = 11,
    /// 4x u16.
    R16G16B16A16_UINT = 12,
    /// 2x f32.
    R32G32_FLOAT = 16,
    /// 2x i32.
    R32G32_SINT = 18,
    /// 4x u8 normalized.
    R8G8B8A8_UNORM = 28,
    /// 4x u8.
    R8G8B8A8_UINT = 30,
    /// 2x u16 normalized.
    R16G16_UNORM = 35,
    /// 2x u16.
    R16G16_UINT = 36,
    /// f32 depth.
    D32_FLOAT = 40,
    /// 1x f32.
    R32_FLOAT = 41,
    /// 1x u32.
    R32_UINT = 42,
    /// 1x i32.
    R32_SINT = 43,
    /// Typeless 24/8 depth-stencil storage.
    R24G8_TYPELESS = 44,
    /// 24-bit depth, 8-bit stencil.
    D24_UNORM_S8_UINT = 45,
    /// Depth plane of a 24/8 resource viewed as color.
    R24_UNORM_X8_TYPELESS = 46,
    /// 2x u8 normalized.
    R8G8_UNORM = 49,
    /// 1x u16.
    R16_UINT = 57,
    /// 1x u8 normalized.
    R8_UNORM = 61,
    /// BC1.
    BC1_UNORM = 71,
    /// BC2.
    BC2_UNORM = 74,
    /// BC3.
    BC3_UNORM = 77,
    /// Packed 5/6/5.
    B5G6R5_UNORM = 85,
    /// Packed 5/5/5/1.
    B5G5R5A1_UNORM = 86,
    /// 4x u8 normalized, blue first.
    B8G8R8A8_UNORM = 87,
    /// Packed 4/4/4/4.
    B4G4R4A4_UNORM = 115,
    /// ASTC 4x4, exposed by some drivers.
    ASTC_4X4_UNORM = 134,
}

/// Shape of a committed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceDimension {
    /// A linear buffer.
    Buffer = 1,
    /// A 2D texture or texture array.
    Texture2D = 3,
}

/// `D3D12_RESOURCE_DESC`, reduced to what the backend creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceDesc {
    /// Buffer or 2D texture.
    pub dimension: ResourceDimension,
    /// Byte size for buffers, pixel width for textures.
    pub width: u64,
    /// Pixel height (1 for buffers).
    pub height: u32,
    /// Array layers (1 for buffers).
    pub array_size: u16,
    /// Mip levels (1 for buffers).
    pub mip_levels: u16,
    /// Texel format (`UNKNOWN` for buffers).
    pub format: DxgiFormat,
    /// Usage flags.
    pub flags: ResourceFlags,
}

impl ResourceDesc {
    /// A buffer of `size` bytes.
    pub const fn buffer(size: u64) -> Self {
        Self {
            dimension: ResourceDimension::Buffer,
            width: size,
            height: 1,
            array_size: 1,
            mip_levels: 1,
            format: DxgiFormat::UNKNOWN,
            flags: ResourceFlags::EMPTY,
        }
    }

    /// A 2D texture (array).
    pub const fn texture_2d(
        format: DxgiFormat,
        width: u32,
        height: u32,
        array_size: u16,
        mip_levels: u16,
        flags: ResourceFlags,
    ) -> Self {
        Self {
            dimension: ResourceDimension::Texture2D,
            width: width as u64,
            height,
            array_size,
            mip_levels,
            format,
            flags,
        }
    }

    /// Number of subresources.
    pub const fn subresource_count(&self) -> u32 {
        self.array_size as u32 * self.mip_levels as u32
    }
}

/// Optimized clear value passed at creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Color clear.
    Color {
        /// Format of the value.
        format: DxgiFormat,
        /// RGBA.
        color: [f32; 4],
    },
    /// Depth/stencil clear.
    DepthStencil {
        /// Format of the value.
        format: DxgiFormat,
        /// Depth.
        depth: f32,
        /// Stencil.
        stencil: u8,
    },
}

/// Layout of one subresource inside a linear buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PlacedFootprint {
    /// Offset of the first row in the buffer.
    pub offset: u64,
    /// Texel format.
    pub format: DxgiFormat,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Bytes between rows (of blocks for compressed formats).
    pub row_pitch: u32,
    /// Number of rows (of blocks for compressed formats).
    pub row_count: u32,
    /// Bytes of one tightly packed row.
    pub row_size: u32,
}

impl PlacedFootprint {
    /// Bytes spanned by the footprint in its buffer.
    pub const fn total_bytes(&self) -> u64 {
        if self.row_count == 0 {
            return 0;
        }
        (self.row_count as u64 - 1) * self.row_pitch as u64 + self.row_size as u64
    }
}

/// Descriptor heap kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    /// Constant buffer, shader resource and unordered access views.
    CbvSrvUav = 0,
    /// Samplers.
    Sampler = 1,
    /// Render target views.
    Rtv = 2,
    /// Depth/stencil views.
    Dsv = 3,
}

/// A native heap as seen by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeHeap {
    /// Heap handle.
    pub handle: HeapHandle,
    /// CPU address of slot 0.
    pub cpu_start: CpuDescriptor,
    /// GPU address of slot 0, for shader-visible heaps.
    pub gpu_start: Option<GpuDescriptor>,
    /// Bytes between consecutive slots.
    pub increment: u32,
}

/// How a shader resource view reads its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SrvDimension {
    /// A 2D texture.
    Texture2D,
    /// A 2D texture array.
    Texture2DArray,
    /// A cube map.
    TextureCube,
}

/// `D3D12_SHADER_RESOURCE_VIEW_DESC`, reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SrvDesc {
    /// View format.
    pub format: DxgiFormat,
    /// View dimension.
    pub dimension: SrvDimension,
    /// First visible mip.
    pub most_detailed_mip: u32,
    /// Number of visible mips.
    pub mip_levels: u32,
    /// First visible layer.
    pub first_slice: u32,
    /// Number of visible layers.
    pub array_size: u32,
}

/// `D3D12_UNORDERED_ACCESS_VIEW_DESC` for one mip of a (array) texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UavDesc {
    /// View format.
    pub format: DxgiFormat,
    /// Mip written through the view.
    pub mip_slice: u32,
    /// First layer.
    pub first_slice: u32,
    /// Number of layers; `1` produces a non-array view.
    pub array_size: u32,
    /// Whether the view is an array view.
    pub is_array: bool,
}

/// `D3D12_RENDER_TARGET_VIEW_DESC` for one mip and layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RtvDesc {
    /// View format.
    pub format: DxgiFormat,
    /// Mip written.
    pub mip_slice: u32,
    /// Layer written.
    pub array_slice: u32,
}

/// `D3D12_FILTER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Filter(pub u32);

impl Filter {
    /// Point min, mag and mip.
    pub const MIN_MAG_MIP_POINT: Self = Self(0x0);
    /// Linear min, mag and mip.
    pub const MIN_MAG_MIP_LINEAR: Self = Self(0x15);
    /// Anisotropic.
    pub const ANISOTROPIC: Self = Self(0x55);
    /// Bit raised on comparison filters.
    pub const COMPARISON_BIT: u32 = 0x80;

    /// The comparison variant of this filter.
    pub const fn comparison(self) -> Self {
        Self(self.0 | Self::COMPARISON_BIT)
    }
}

/// `D3D12_TEXTURE_ADDRESS_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureAddressMode {
    /// Repeat.
    Wrap = 1,
    /// Mirror.
    Mirror = 2,
    /// Clamp to edge.
    Clamp = 3,
    /// Border color.
    Border = 4,
}

/// `D3D12_COMPARISON_FUNC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonFunc {
    /// Never.
    Never = 1,
    /// Less.
    Less = 2,
    /// Equal.
    Equal = 3,
    /// Less or equal.
    LessEqual = 4,
    /// Greater.
    Greater = 5,
    /// Not equal.
    NotEqual = 6,
    /// Greater or equal.
    GreaterEqual = 7,
    /// Always.
    Always = 8,
}

/// `D3D12_SAMPLER_DESC`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeSamplerDesc {
    /// Filter.
    pub filter: Filter,
    /// U addressing.
    pub address_u: TextureAddressMode,
    /// V addressing.
    pub address_v: TextureAddressMode,
    /// W addressing.
    pub address_w: TextureAddressMode,
    /// LOD bias.
    pub mip_lod_bias: f32,
    /// Anisotropy bound.
    pub max_anisotropy: u32,
    /// Comparison for comparison filters.
    pub comparison: ComparisonFunc,
    /// Border color.
    pub border_color: [f32; 4],
    /// Smallest LOD.
    pub min_lod: f32,
    /// Largest LOD.
    pub max_lod: f32,
}

/// `D3D12_SHADER_VISIBILITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderVisibility {
    /// Every stage.
    All = 0,
    /// Vertex stage.
    Vertex = 1,
    /// Pixel stage.
    Pixel = 5,
}

/// `D3D12_DESCRIPTOR_RANGE_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorRangeKind {
    /// Shader resource views (`t` registers).
    Srv = 0,
    /// Unordered access views (`u` registers).
    Uav = 1,
    /// Constant buffer views (`b` registers).
    Cbv = 2,
    /// Samplers (`s` registers).
    Sampler = 3,
}

/// One range of a descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorRange {
    /// Register class.
    pub kind: DescriptorRangeKind,
    /// Number of consecutive registers.
    pub count: u32,
    /// First register.
    pub base_register: u32,
}

/// A root signature parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RootParameter {
    /// A root constant buffer view bound by GPU address.
    Cbv {
        /// `b` register.
        register: u32,
        /// Stages that read it.
        visibility: ShaderVisibility,
    },
    /// A descriptor table bound by GPU descriptor.
    DescriptorTable {
        /// Ranges in table order.
        ranges: Vec<DescriptorRange>,
        /// Stages that read it.
        visibility: ShaderVisibility,
    },
}

/// A sampler baked into a root signature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticSampler {
    /// Sampler state.
    pub desc: NativeSamplerDesc,
    /// `s` register.
    pub register: u32,
    /// Stages that read it.
    pub visibility: ShaderVisibility,
}

/// `D3D12_ROOT_SIGNATURE_DESC`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RootSignatureDesc {
    /// Parameters; their index is the root index.
    pub parameters: Vec<RootParameter>,
    /// Static samplers.
    pub static_samplers: Vec<StaticSampler>,
    /// Allows an input assembler layout.
    pub allow_input_layout: bool,
}

/// `D3D12_INPUT_CLASSIFICATION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputClassification {
    /// Per-vertex data.
    PerVertex = 0,
    /// Per-instance data.
    PerInstance = 1,
}

/// `D3D12_INPUT_ELEMENT_DESC`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputElement {
    /// Semantic name.
    pub semantic: String,
    /// Semantic index.
    pub semantic_index: u32,
    /// Element format.
    pub format: DxgiFormat,
    /// Input slot.
    pub slot: u32,
    /// Byte offset in the slot.
    pub offset: u32,
    /// Per-vertex or per-instance.
    pub classification: InputClassification,
    /// Instances per step (0 for per-vertex data).
    pub step_rate: u32,
}

/// `D3D12_BLEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blend {
    /// 0.
    Zero = 1,
    /// 1.
    One = 2,
    /// Source color.
    SrcColor = 3,
    /// 1 - source color.
    InvSrcColor = 4,
    /// Source alpha.
    SrcAlpha = 5,
    /// 1 - source alpha.
    InvSrcAlpha = 6,
    /// Destination alpha.
    DestAlpha = 7,
    /// 1 - destination alpha.
    InvDestAlpha = 8,
    /// Destination color.
    DestColor = 9,
    /// 1 - destination color.
    InvDestColor = 10,
    /// Saturated source alpha.
    SrcAlphaSat = 11,
    /// Blend constant.
    BlendFactor = 14,
    /// 1 - blend constant.
    InvBlendFactor = 15,
}

/// `D3D12_BLEND_OP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeBlendOp {
    /// Add.
    Add = 1,
    /// Subtract.
    Subtract = 2,
    /// Reverse subtract.
    RevSubtract = 3,
}

/// `D3D12_RENDER_TARGET_BLEND_DESC`, applied to every color attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeBlendDesc {
    /// Whether blending is enabled.
    pub enabled: bool,
    /// Source color factor.
    pub src: Blend,
    /// Destination color factor.
    pub dst: Blend,
    /// Color operation.
    pub op: NativeBlendOp,
    /// Source alpha factor.
    pub src_alpha: Blend,
    /// Destination alpha factor.
    pub dst_alpha: Blend,
    /// Alpha operation.
    pub op_alpha: NativeBlendOp,
    /// `D3D12_COLOR_WRITE_ENABLE` bits.
    pub write_mask: u8,
}

/// `D3D12_CULL_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeCullMode {
    /// No culling.
    None = 1,
    /// Cull front faces.
    Front = 2,
    /// Cull back faces.
    Back = 3,
}

/// `D3D12_RASTERIZER_DESC`, reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerDesc {
    /// Face culling.
    pub cull: NativeCullMode,
    /// Counter-clockwise triangles are front-facing.
    pub front_counter_clockwise: bool,
}

/// `D3D12_STENCIL_OP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeStencilOp {
    /// Keep.
    Keep = 1,
    /// Zero.
    Zero = 2,
    /// Replace.
    Replace = 3,
    /// Saturating increment.
    IncrSat = 4,
    /// Saturating decrement.
    DecrSat = 5,
    /// Invert.
    Invert = 6,
    /// Wrapping increment.
    Incr = 7,
    /// Wrapping decrement.
    Decr = 8,
}

/// `D3D12_DEPTH_STENCILOP_DESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeStencilFace {
    /// Stencil fail.
    pub fail: NativeStencilOp,
    /// Depth fail.
    pub depth_fail: NativeStencilOp,
    /// Both pass.
    pub pass: NativeStencilOp,
    /// Comparison.
    pub func: ComparisonFunc,
}

/// `D3D12_DEPTH_STENCIL_DESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeDepthStencilDesc {
    /// Depth test on.
    pub depth_enable: bool,
    /// Depth writes on.
    pub depth_write: bool,
    /// Depth comparison.
    pub depth_func: ComparisonFunc,
    /// Stencil test on.
    pub stencil_enable: bool,
    /// Stencil read mask.
    pub stencil_read_mask: u8,
    /// Stencil write mask.
    pub stencil_write_mask: u8,
    /// Front faces.
    pub front: NativeStencilFace,
    /// Back faces.
    pub back: NativeStencilFace,
}

/// `D3D12_PRIMITIVE_TOPOLOGY_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopologyType {
    /// Points.
    Point = 1,
    /// Lines.
    Line = 2,
    /// Triangles.
    Triangle = 3,
}

/// `D3D_PRIMITIVE_TOPOLOGY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    /// Point list.
    PointList = 1,
    /// Line list.
    LineList = 2,
    /// Line strip.
    LineStrip = 3,
    /// Triangle list.
    TriangleList = 4,
    /// Triangle strip.
    TriangleStrip = 5,
}

/// `D3D12_GRAPHICS_PIPELINE_STATE_DESC`, reduced.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineDesc {
    /// Root signature.
    pub root_signature: RootSignatureHandle,
    /// Vertex shader bytecode.
    pub vertex_shader: std::sync::Arc<[u8]>,
    /// Pixel shader bytecode.
    pub pixel_shader: std::sync::Arc<[u8]>,
    /// Input layout.
    pub input_layout: Vec<InputElement>,
    /// Blend state for every attachment.
    pub blend: NativeBlendDesc,
    /// Raster state.
    pub rasterizer: RasterizerDesc,
    /// Depth/stencil state.
    pub depth_stencil: NativeDepthStencilDesc,
    /// Topology class.
    pub topology_type: PrimitiveTopologyType,
    /// Color attachment formats.
    pub rtv_formats: Vec<DxgiFormat>,
    /// Depth attachment format.
    pub dsv_format: DxgiFormat,
}

/// A transition or UAV barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Barrier {
    /// State transition of one subresource (or all of them).
    Transition {
        /// Resource.
        resource: ResourceHandle,
        /// Subresource index, [`Barrier::ALL_SUBRESOURCES`] for every one.
        subresource: u32,
        /// State before.
        before: ResourceStates,
        /// State after.
        after: ResourceStates,
    },
    /// Orders unordered-access writes.
    Uav {
        /// Resource.
        resource: ResourceHandle,
    },
}

impl Barrier {
    /// `D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES`.
    pub const ALL_SUBRESOURCES: u32 = u32::MAX;

    /// A transition of every subresource.
    pub const fn transition(
        resource: ResourceHandle,
        before: ResourceStates,
        after: ResourceStates,
    ) -> Self {
        Barrier::Transition {
            resource,
            subresource: Self::ALL_SUBRESOURCES,
            before,
            after,
        }
    }
}

/// One side of a texture copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureCopyLocation {
    /// A subresource of a texture.
    Subresource {
        /// Texture.
        resource: ResourceHandle,
        /// Subresource index.
        index: u32,
    },
    /// A footprint inside a buffer.
    Footprint {
        /// Buffer.
        resource: ResourceHandle,
        /// Layout.
        footprint: PlacedFootprint,
    },
}

/// `D3D12_VERTEX_BUFFER_VIEW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBufferView {
    /// GPU address.
    pub address: u64,
    /// Bytes visible.
    pub size: u32,
    /// Bytes per element.
    pub stride: u32,
}

/// `D3D12_INDEX_BUFFER_VIEW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexBufferView {
    /// GPU address.
    pub address: u64,
    /// Bytes visible.
    pub size: u32,
    /// `R16_UINT` or `R32_UINT`.
    pub format: DxgiFormat,
}

/// `D3D12_VIEWPORT`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NativeViewport {
    /// Left.
    pub x: f32,
    /// Top.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

/// `D3D12_RECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativeRect {
    /// Left.
    pub left: i32,
    /// Top.
    pub top: i32,
    /// Right (exclusive).
    pub right: i32,
    /// Bottom (exclusive).
    pub bottom: i32,
}

/// A command recorded into a [`CommandList`](super::CommandList).
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCommand {
    /// Resource barriers.
    ResourceBarrier(Vec<Barrier>),
    /// Buffer to buffer copy.
    CopyBufferRegion {
        /// Destination buffer.
        dst: ResourceHandle,
        /// Destination offset.
        dst_offset: u64,
        /// Source buffer.
        src: ResourceHandle,
        /// Source offset.
        src_offset: u64,
        /// Bytes copied.
        size: u64,
    },
    /// Texture copy, to or from a buffer footprint.
    CopyTextureRegion {
        /// Destination.
        dst: TextureCopyLocation,
        /// Destination x in texels.
        dst_x: u32,
        /// Destination y in texels.
        dst_y: u32,
        /// Source.
        src: TextureCopyLocation,
    },
    /// Whole-resource copy.
    CopyResource {
        /// Destination.
        dst: ResourceHandle,
        /// Source.
        src: ResourceHandle,
    },
    /// Binds shader-visible heaps.
    SetDescriptorHeaps(Vec<HeapHandle>),
    /// Binds the graphics root signature.
    SetGraphicsRootSignature(RootSignatureHandle),
    /// Binds the compute root signature.
    SetComputeRootSignature(RootSignatureHandle),
    /// Binds a pipeline state object.
    SetPipelineState(PipelineHandle),
    /// Sets a graphics root CBV.
    SetGraphicsRootConstantBufferView {
        /// Root index.
        index: u32,
        /// GPU address.
        address: u64,
    },
    /// Sets a compute root CBV.
    SetComputeRootConstantBufferView {
        /// Root index.
        index: u32,
        /// GPU address.
        address: u64,
    },
    /// Sets a graphics descriptor table.
    SetGraphicsRootDescriptorTable {
        /// Root index.
        index: u32,
        /// First descriptor.
        base: GpuDescriptor,
    },
    /// Sets a compute descriptor table.
    SetComputeRootDescriptorTable {
        /// Root index.
        index: u32,
        /// First descriptor.
        base: GpuDescriptor,
    },
    /// Sets the topology.
    IaSetPrimitiveTopology(PrimitiveTopology),
    /// Binds vertex buffers.
    IaSetVertexBuffers {
        /// First slot.
        start_slot: u32,
        /// Views.
        views: Vec<VertexBufferView>,
    },
    /// Binds the index buffer.
    IaSetIndexBuffer(IndexBufferView),
    /// Sets the viewport.
    RsSetViewports(NativeViewport),
    /// Sets the scissor rectangle.
    RsSetScissorRects(NativeRect),
    /// Sets the stencil reference.
    OmSetStencilRef(u32),
    /// Binds render targets.
    OmSetRenderTargets {
        /// Color views.
        rtvs: Vec<CpuDescriptor>,
        /// Depth view.
        dsv: Option<CpuDescriptor>,
    },
    /// Clears a color view.
    ClearRenderTargetView {
        /// View.
        rtv: CpuDescriptor,
        /// Color.
        color: [f32; 4],
    },
    /// Clears a depth/stencil view.
    ClearDepthStencilView {
        /// View.
        dsv: CpuDescriptor,
        /// Clear the depth plane.
        clear_depth: bool,
        /// Clear the stencil plane.
        clear_stencil: bool,
        /// Depth value.
        depth: f32,
        /// Stencil value.
        stencil: u8,
    },
    /// Discards a resource's content.
    DiscardResource(ResourceHandle),
    /// Non-indexed draw.
    DrawInstanced {
        /// Vertices per instance.
        vertex_count: u32,
        /// Instances.
        instance_count: u32,
        /// First vertex.
        start_vertex: u32,
        /// First instance.
        start_instance: u32,
    },
    /// Indexed draw.
    DrawIndexedInstanced {
        /// Indices per instance.
        index_count: u32,
        /// Instances.
        instance_count: u32,
        /// First index.
        start_index: u32,
        /// Added to every index.
        base_vertex: i32,
        /// First instance.
        start_instance: u32,
    },
    /// Compute dispatch.
    Dispatch {
        /// Groups along x.
        x: u32,
        /// Groups along y.
        y: u32,
        /// Groups along z.
        z: u32,
    },
}

impl NativeCommand {
    /// Returns `true` for draw commands.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            NativeCommand::DrawInstanced { .. } | NativeCommand::DrawIndexedInstanced { .. }
        )
    }
}

/// Adapter identification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterInfo {
    /// PCI vendor id.
    pub vendor_id: u32,
    /// Adapter name.
    pub description: String,
    /// Highest supported feature level, e.g. `"12.0"`.
    pub feature_level: String,
}
