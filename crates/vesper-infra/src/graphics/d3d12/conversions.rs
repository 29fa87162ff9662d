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

//! Conversions from RHI enums and descriptors to their D3D12 equivalents.

use super::native::{
    Blend, ComparisonFunc, Filter, NativeBlendDesc, NativeBlendOp, NativeCullMode,
    NativeDepthStencilDesc, NativeRect, NativeSamplerDesc, NativeStencilFace, NativeStencilOp,
    NativeViewport, PrimitiveTopology, PrimitiveTopologyType, TextureAddressMode,
};
use vesper_core::renderer::{
    AddressMode, BlendDesc, BlendFactor, BlendOp, CompareFunc, CullMode, DepthStencilDesc,
    DepthStencilFlags, MagFilter, MinFilter, PrimitiveGroup, PrimitiveType, SamplerDesc,
    ScissorRect, StencilDesc, StencilOp, Viewport,
};

/// A local extension trait to convert RHI types into D3D12-compatible types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_d3d12()` syntax.
pub trait IntoD3d12<T> {
    /// Consumes self and converts it into a D3D12-compatible type.
    fn into_d3d12(self) -> T;
}

// --- Comparison and stencil ---

impl IntoD3d12<ComparisonFunc> for CompareFunc {
    fn into_d3d12(self) -> ComparisonFunc {
        match self {
            CompareFunc::Never => ComparisonFunc::Never,
            CompareFunc::Less => ComparisonFunc::Less,
            CompareFunc::Equal => ComparisonFunc::Equal,
            CompareFunc::LessEqual => ComparisonFunc::LessEqual,
            CompareFunc::Greater => ComparisonFunc::Greater,
            CompareFunc::NotEqual => ComparisonFunc::NotEqual,
            CompareFunc::GreaterEqual => ComparisonFunc::GreaterEqual,
            CompareFunc::Always => ComparisonFunc::Always,
        }
    }
}

impl IntoD3d12<NativeStencilOp> for StencilOp {
    fn into_d3d12(self) -> NativeStencilOp {
        match self {
            StencilOp::Keep => NativeStencilOp::Keep,
            StencilOp::Zero => NativeStencilOp::Zero,
            StencilOp::Replace => NativeStencilOp::Replace,
            StencilOp::Invert => NativeStencilOp::Invert,
            StencilOp::IncrementWrap => NativeStencilOp::Incr,
            StencilOp::DecrementWrap => NativeStencilOp::Decr,
        }
    }
}

impl IntoD3d12<NativeStencilFace> for StencilDesc {
    fn into_d3d12(self) -> NativeStencilFace {
        NativeStencilFace {
            fail: self.stencil_failure_op.into_d3d12(),
            depth_fail: self.depth_failure_op.into_d3d12(),
            pass: self.depth_stencil_pass_op.into_d3d12(),
            func: self.compare.into_d3d12(),
        }
    }
}

impl IntoD3d12<NativeDepthStencilDesc> for DepthStencilDesc {
    fn into_d3d12(self) -> NativeDepthStencilDesc {
        let depth_enable = self.flags.contains(DepthStencilFlags::DEPTH_TEST);
        NativeDepthStencilDesc {
            depth_enable,
            depth_write: depth_enable && self.flags.contains(DepthStencilFlags::DEPTH_WRITE),
            depth_func: if depth_enable {
                self.depth_compare.into_d3d12()
            } else {
                ComparisonFunc::Always
            },
            stencil_enable: self.flags.contains(DepthStencilFlags::STENCIL_TEST),
            stencil_read_mask: self.front.read_mask,
            stencil_write_mask: self.front.write_mask,
            front: self.front.into_d3d12(),
            back: self.back.into_d3d12(),
        }
    }
}

// --- Blending ---

impl IntoD3d12<Blend> for BlendFactor {
    fn into_d3d12(self) -> Blend {
        match self {
            BlendFactor::Zero => Blend::Zero,
            BlendFactor::One => Blend::One,
            BlendFactor::SrcColor => Blend::SrcColor,
            BlendFactor::OneMinusSrcColor => Blend::InvSrcColor,
            BlendFactor::SrcAlpha => Blend::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha => Blend::InvSrcAlpha,
            BlendFactor::DstColor => Blend::DestColor,
            BlendFactor::OneMinusDstColor => Blend::InvDestColor,
            BlendFactor::DstAlpha => Blend::DestAlpha,
            BlendFactor::OneMinusDstAlpha => Blend::InvDestAlpha,
            BlendFactor::ConstantAlpha | BlendFactor::BlendColor => Blend::BlendFactor,
            BlendFactor::SrcAlphaSaturate => Blend::SrcAlphaSat,
            BlendFactor::OneMinusConstantAlpha => Blend::InvBlendFactor,
        }
    }
}

/// The alpha-channel factor for `factor`. D3D12 rejects color factors in the
/// alpha slots; those fall back to `One`.
pub fn alpha_blend(factor: BlendFactor) -> Blend {
    match factor.into_d3d12() {
        Blend::SrcColor | Blend::InvSrcColor | Blend::DestColor | Blend::InvDestColor => {
            Blend::One
        }
        other => other,
    }
}

impl IntoD3d12<NativeBlendOp> for BlendOp {
    fn into_d3d12(self) -> NativeBlendOp {
        match self {
            BlendOp::Add => NativeBlendOp::Add,
            BlendOp::Subtract => NativeBlendOp::Subtract,
            BlendOp::ReverseSubtract => NativeBlendOp::RevSubtract,
        }
    }
}

impl IntoD3d12<NativeBlendDesc> for BlendDesc {
    fn into_d3d12(self) -> NativeBlendDesc {
        NativeBlendDesc {
            enabled: self.blend_enabled,
            src: self.src_color.into_d3d12(),
            dst: self.dst_color.into_d3d12(),
            op: self.color_op.into_d3d12(),
            src_alpha: alpha_blend(self.src_alpha),
            dst_alpha: alpha_blend(self.dst_alpha),
            op_alpha: self.alpha_op.into_d3d12(),
            write_mask: self.write_mask.bits(),
        }
    }
}

// --- Rasterizer and topology ---

impl IntoD3d12<NativeCullMode> for CullMode {
    fn into_d3d12(self) -> NativeCullMode {
        match self {
            CullMode::None => NativeCullMode::None,
            CullMode::Back => NativeCullMode::Back,
            CullMode::Front => NativeCullMode::Front,
        }
    }
}

impl IntoD3d12<PrimitiveTopology> for PrimitiveType {
    fn into_d3d12(self) -> PrimitiveTopology {
        match self {
            PrimitiveType::Point => PrimitiveTopology::PointList,
            PrimitiveType::Line => PrimitiveTopology::LineList,
            // No closing segment in D3D12; loops draw as strips.
            PrimitiveType::LineLoop | PrimitiveType::LineStrip => PrimitiveTopology::LineStrip,
            PrimitiveType::Triangle => PrimitiveTopology::TriangleList,
            PrimitiveType::TriangleStrip => PrimitiveTopology::TriangleStrip,
        }
    }
}

impl IntoD3d12<PrimitiveTopologyType> for PrimitiveGroup {
    fn into_d3d12(self) -> PrimitiveTopologyType {
        match self {
            PrimitiveGroup::Point => PrimitiveTopologyType::Point,
            PrimitiveGroup::Line => PrimitiveTopologyType::Line,
            PrimitiveGroup::Triangle => PrimitiveTopologyType::Triangle,
        }
    }
}

impl IntoD3d12<NativeViewport> for Viewport {
    fn into_d3d12(self) -> NativeViewport {
        NativeViewport {
            x: self.x as f32,
            y: self.y as f32,
            width: self.width as f32,
            height: self.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

impl IntoD3d12<NativeRect> for ScissorRect {
    fn into_d3d12(self) -> NativeRect {
        NativeRect {
            left: self.x,
            top: self.y,
            right: self.x + self.width as i32,
            bottom: self.y + self.height as i32,
        }
    }
}

// --- Samplers ---

impl IntoD3d12<TextureAddressMode> for AddressMode {
    fn into_d3d12(self) -> TextureAddressMode {
        match self {
            AddressMode::Repeat => TextureAddressMode::Wrap,
            AddressMode::Mirror => TextureAddressMode::Mirror,
            AddressMode::Clamp => TextureAddressMode::Clamp,
            AddressMode::Border => TextureAddressMode::Border,
        }
    }
}

/// Filters indexed by `(min_linear << 2) | (mag_linear << 1) | mip_linear`.
const FILTER_TABLE: [u32; 8] = [0x00, 0x01, 0x04, 0x05, 0x10, 0x11, 0x14, 0x15];

/// The native filter of a sampler description.
pub fn sampler_filter(desc: &SamplerDesc) -> Filter {
    let filter = if desc.min_filter == MinFilter::Anisotropic {
        Filter::ANISOTROPIC
    } else {
        let index = ((desc.min_filter == MinFilter::Linear) as usize) << 2
            | ((desc.mag_filter == MagFilter::Linear) as usize) << 1
            | desc.mip_filter.is_linear() as usize;
        Filter(FILTER_TABLE[index])
    };
    if desc.is_comparison() {
        filter.comparison()
    } else {
        filter
    }
}

impl IntoD3d12<NativeSamplerDesc> for SamplerDesc {
    fn into_d3d12(self) -> NativeSamplerDesc {
        NativeSamplerDesc {
            filter: sampler_filter(&self),
            address_u: self.address_s.into_d3d12(),
            address_v: self.address_t.into_d3d12(),
            address_w: self.address_w.into_d3d12(),
            mip_lod_bias: 0.0,
            max_anisotropy: self.clamped_anisotropy(),
            comparison: if self.is_comparison() {
                self.compare.into_d3d12()
            } else {
                ComparisonFunc::Never
            },
            border_color: [0.0; 4],
            min_lod: 0.0,
            max_lod: f32::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_core::renderer::{MipFilter, SamplerIndex};

    #[test]
    fn filter_table_follows_linear_bits() {
        let point = SamplerIndex::PointNoMipClamp.desc();
        assert_eq!(sampler_filter(&point), Filter::MIN_MAG_MIP_POINT);

        let linear_mip = SamplerIndex::LinearMipClamp.desc();
        assert_eq!(sampler_filter(&linear_mip), Filter::MIN_MAG_MIP_LINEAR);

        let min_only = SamplerDesc {
            min_filter: MinFilter::Linear,
            mag_filter: MagFilter::Nearest,
            mip_filter: MipFilter::Nearest,
            ..Default::default()
        };
        assert_eq!(sampler_filter(&min_only), Filter(0x10));
    }

    #[test]
    fn comparison_and_anisotropic_samplers() {
        let shadow: NativeSamplerDesc = SamplerIndex::ShadowCmpClamp.desc().into_d3d12();
        assert_eq!(shadow.filter, Filter(0x15 | Filter::COMPARISON_BIT));
        assert_eq!(shadow.comparison, ComparisonFunc::Less);

        let aniso: NativeSamplerDesc = SamplerIndex::AnisoWrap.desc().into_d3d12();
        assert_eq!(aniso.filter, Filter::ANISOTROPIC);
        assert_eq!(aniso.max_anisotropy, 16);
        assert_eq!(aniso.address_u, TextureAddressMode::Wrap);
        assert_eq!(aniso.max_lod, f32::MAX);
    }

    #[test]
    fn color_factors_are_rejected_for_alpha() {
        // --- 1. ARRANGE ---
        let desc = BlendDesc {
            blend_enabled: true,
            src_color: BlendFactor::ConstantAlpha,
            dst_color: BlendFactor::OneMinusConstantAlpha,
            src_alpha: BlendFactor::SrcColor,
            dst_alpha: BlendFactor::OneMinusDstAlpha,
            ..Default::default()
        };

        // --- 2. ACT ---
        let native: NativeBlendDesc = desc.into_d3d12();

        // --- 3. ASSERT ---
        assert_eq!(native.src, Blend::BlendFactor);
        assert_eq!(native.dst, Blend::InvBlendFactor);
        assert_eq!(native.src_alpha, Blend::One);
        assert_eq!(native.dst_alpha, Blend::InvDestAlpha);
        assert_eq!(native.write_mask, 0xF);
    }

    #[test]
    fn line_loops_draw_as_strips() {
        let topology: PrimitiveTopology = PrimitiveType::LineLoop.into_d3d12();
        assert_eq!(topology, PrimitiveTopology::LineStrip);
        let cull: NativeCullMode = CullMode::Front.into_d3d12();
        assert_eq!(cull as u32, 2);
        let scissor: NativeRect = ScissorRect {
            x: 10,
            y: 20,
            width: 30,
            height: 40,
        }
        .into_d3d12();
        assert_eq!((scissor.right, scissor.bottom), (40, 60));
    }

    #[test]
    fn disabled_depth_test_never_writes() {
        let desc = DepthStencilDesc {
            flags: DepthStencilFlags::DEPTH_WRITE,
            ..Default::default()
        };
        let native: NativeDepthStencilDesc = desc.into_d3d12();
        assert!(!native.depth_enable);
        assert!(!native.depth_write);
        assert!(!native.stencil_enable);
    }
}
