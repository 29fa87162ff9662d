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

//! Blend state.

use super::state::ColorWriteMask;

/// A blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// 0
    Zero = 0,
    /// 1
    One = 1,
    /// Source color.
    SrcColor = 2,
    /// 1 - source color.
    OneMinusSrcColor = 3,
    /// Source alpha.
    SrcAlpha = 4,
    /// 1 - source alpha.
    OneMinusSrcAlpha = 5,
    /// Destination color.
    DstColor = 6,
    /// 1 - destination color.
    OneMinusDstColor = 7,
    /// Destination alpha.
    DstAlpha = 8,
    /// 1 - destination alpha.
    OneMinusDstAlpha = 9,
    /// Constant alpha.
    ConstantAlpha = 10,
    /// Saturated source alpha.
    SrcAlphaSaturate = 11,
    /// 1 - constant alpha.
    OneMinusConstantAlpha = 12,
    /// Blend constant.
    BlendColor = 13,
}

/// How source and destination terms combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOp {
    /// src + dst
    #[default]
    Add = 0,
    /// src - dst
    Subtract = 1,
    /// dst - src
    ReverseSubtract = 2,
}

/// Blend and color-write state for all color attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendDesc {
    /// Channels written.
    pub write_mask: ColorWriteMask,
    /// Whether blending is enabled.
    pub blend_enabled: bool,
    /// Source factor for color.
    pub src_color: BlendFactor,
    /// Destination factor for color.
    pub dst_color: BlendFactor,
    /// Color operation.
    pub color_op: BlendOp,
    /// Source factor for alpha.
    pub src_alpha: BlendFactor,
    /// Destination factor for alpha.
    pub dst_alpha: BlendFactor,
    /// Alpha operation.
    pub alpha_op: BlendOp,
}

impl Default for BlendDesc {
    fn default() -> Self {
        Self {
            write_mask: ColorWriteMask::ALL,
            blend_enabled: false,
            src_color: BlendFactor::One,
            dst_color: BlendFactor::Zero,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
        }
    }
}

impl BlendDesc {
    /// Premultiplied-alpha blending, the default for sprites.
    pub fn alpha_premultiplied() -> Self {
        Self {
            blend_enabled: true,
            src_color: BlendFactor::One,
            dst_color: BlendFactor::OneMinusSrcAlpha,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::OneMinusSrcAlpha,
            ..Self::default()
        }
    }

    /// Straight (non-premultiplied) alpha blending.
    pub fn alpha_non_premultiplied() -> Self {
        Self {
            blend_enabled: true,
            src_color: BlendFactor::SrcAlpha,
            dst_color: BlendFactor::OneMinusSrcAlpha,
            src_alpha: BlendFactor::SrcAlpha,
            dst_alpha: BlendFactor::OneMinusSrcAlpha,
            ..Self::default()
        }
    }
}
