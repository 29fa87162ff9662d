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

//! Sampler state and the builtin sampler table.
//!
//! A [`SamplerDesc`] packs into a single `u32` ([`SamplerDesc::key`]); devices
//! intern samplers by that key so that identical descriptions always resolve
//! to the same native sampler. The first [`SamplerIndex::COUNT`] registry slots
//! are reserved for the builtin samplers, which shaders can reference by name.

use super::pipeline::CompareFunc;
use serde::{Deserialize, Serialize};

/// Minification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MinFilter {
    /// Nearest texel.
    Nearest = 0,
    /// Bilinear.
    #[default]
    Linear = 1,
    /// Anisotropic, bounded by [`SamplerDesc::max_anisotropy`].
    Anisotropic = 2,
}

/// Magnification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MagFilter {
    /// Nearest texel.
    Nearest = 0,
    /// Bilinear.
    #[default]
    Linear = 1,
}

/// Filter between mip levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MipFilter {
    /// Nearest level.
    Nearest = 0,
    /// Blend between the two nearest levels.
    Linear = 1,
    /// Backend default, which is linear.
    #[default]
    Default = 3,
}

impl MipFilter {
    /// Whether the filter blends between levels once the default is resolved.
    pub const fn is_linear(self) -> bool {
        !matches!(self, MipFilter::Nearest)
    }
}

/// What happens to coordinates outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AddressMode {
    /// Tile the texture.
    Repeat = 0,
    /// Tile with every other copy mirrored.
    Mirror = 1,
    /// Clamp to the edge texel.
    #[default]
    Clamp = 2,
    /// Use the border color.
    Border = 3,
}

/// A complete sampler description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerDesc {
    /// Minification filter.
    pub min_filter: MinFilter,
    /// Magnification filter.
    pub mag_filter: MagFilter,
    /// Mip filter.
    pub mip_filter: MipFilter,
    /// Address mode along U.
    pub address_s: AddressMode,
    /// Address mode along V.
    pub address_t: AddressMode,
    /// Address mode along W.
    pub address_w: AddressMode,
    /// Comparison function. Anything but [`CompareFunc::Never`] makes this a
    /// comparison (shadow) sampler.
    pub compare: CompareFunc,
    /// Anisotropy bound in `1..=16`. Out-of-range values are clamped when packed.
    pub max_anisotropy: u8,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            min_filter: MinFilter::Linear,
            mag_filter: MagFilter::Linear,
            mip_filter: MipFilter::Default,
            address_s: AddressMode::Clamp,
            address_t: AddressMode::Clamp,
            address_w: AddressMode::Clamp,
            compare: CompareFunc::Never,
            max_anisotropy: 1,
        }
    }
}

impl SamplerDesc {
    /// The same filters with all three address modes set to `mode`.
    pub const fn with_address(mut self, mode: AddressMode) -> Self {
        self.address_s = mode;
        self.address_t = mode;
        self.address_w = mode;
        self
    }

    /// Returns `true` for comparison samplers.
    pub fn is_comparison(&self) -> bool {
        self.compare != CompareFunc::Never
    }

    /// The anisotropy bound clamped to `1..=16`.
    pub fn clamped_anisotropy(&self) -> u32 {
        self.max_anisotropy.clamp(1, 16) as u32
    }

    /// Packs the description into its 32-bit interning key.
    ///
    /// Layout, low bits first: min 2, mag 2, mip 2, s 2, t 2, w 2, compare 4,
    /// anisotropy-1 4, reserved 12.
    pub fn key(&self) -> u32 {
        (self.min_filter as u32)
            | (self.mag_filter as u32) << 2
            | (self.mip_filter as u32) << 4
            | (self.address_s as u32) << 6
            | (self.address_t as u32) << 8
            | (self.address_w as u32) << 10
            | (self.compare as u32) << 12
            | (self.clamped_anisotropy() - 1) << 16
    }
}

/// The builtin samplers, registered first and in this order by every device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SamplerIndex {
    /// Linear, clamp to edge.
    LinearClamp,
    /// Linear, repeat.
    LinearWrap,
    /// Linear, mirrored repeat.
    LinearMirror,
    /// Linear, border color.
    LinearBorder,
    /// Nearest, clamp to edge.
    PointClamp,
    /// Nearest, repeat.
    PointWrap,
    /// Nearest, mirrored repeat.
    PointMirror,
    /// Nearest, border color.
    PointBorder,
    /// Linear with linear mips, clamp to edge.
    LinearMipClamp,
    /// Linear with linear mips, repeat.
    LinearMipWrap,
    /// Linear with linear mips, mirrored repeat.
    LinearMipMirror,
    /// Linear with linear mips, border color.
    LinearMipBorder,
    /// Anisotropic x16, clamp to edge.
    AnisoClamp,
    /// Anisotropic x16, repeat along U.
    AnisoWrap,
    /// Anisotropic x16, mirrored along U.
    AnisoMirror,
    /// Anisotropic x16, border along U.
    AnisoBorder,
    /// Less-than comparison, clamp to edge.
    ShadowCmpClamp,
    /// Less-than comparison, repeat along U.
    ShadowCmpWrap,
    /// Less-than comparison, mirrored along U.
    ShadowCmpMirror,
    /// Less-than comparison, border along U.
    ShadowCmpBorder,
    /// Linear without mips, clamp. The usual choice for UI and sprites.
    LinearNoMipClamp,
    /// Nearest without mips, clamp. The usual choice for pixel art.
    PointNoMipClamp,
}

impl SamplerIndex {
    /// Number of builtin samplers.
    pub const COUNT: usize = 22;

    /// All builtin samplers in registration order.
    pub const ALL: [SamplerIndex; Self::COUNT] = [
        SamplerIndex::LinearClamp,
        SamplerIndex::LinearWrap,
        SamplerIndex::LinearMirror,
        SamplerIndex::LinearBorder,
        SamplerIndex::PointClamp,
        SamplerIndex::PointWrap,
        SamplerIndex::PointMirror,
        SamplerIndex::PointBorder,
        SamplerIndex::LinearMipClamp,
        SamplerIndex::LinearMipWrap,
        SamplerIndex::LinearMipMirror,
        SamplerIndex::LinearMipBorder,
        SamplerIndex::AnisoClamp,
        SamplerIndex::AnisoWrap,
        SamplerIndex::AnisoMirror,
        SamplerIndex::AnisoBorder,
        SamplerIndex::ShadowCmpClamp,
        SamplerIndex::ShadowCmpWrap,
        SamplerIndex::ShadowCmpMirror,
        SamplerIndex::ShadowCmpBorder,
        SamplerIndex::LinearNoMipClamp,
        SamplerIndex::PointNoMipClamp,
    ];

    /// The name shaders use to refer to this sampler.
    pub const fn name(self) -> &'static str {
        match self {
            SamplerIndex::LinearClamp => "LinearClamp",
            SamplerIndex::LinearWrap => "LinearWrap",
            SamplerIndex::LinearMirror => "LinearMirror",
            SamplerIndex::LinearBorder => "LinearBorder",
            SamplerIndex::PointClamp => "PointClamp",
            SamplerIndex::PointWrap => "PointWrap",
            SamplerIndex::PointMirror => "PointMirror",
            SamplerIndex::PointBorder => "PointBorder",
            SamplerIndex::LinearMipClamp => "LinearMipClamp",
            SamplerIndex::LinearMipWrap => "LinearMipWrap",
            SamplerIndex::LinearMipMirror => "LinearMipMirror",
            SamplerIndex::LinearMipBorder => "LinearMipBorder",
            SamplerIndex::AnisoClamp => "AnisoClamp",
            SamplerIndex::AnisoWrap => "AnisoWrap",
            SamplerIndex::AnisoMirror => "AnisoMirror",
            SamplerIndex::AnisoBorder => "AnisoBorder",
            SamplerIndex::ShadowCmpClamp => "ShadowCmpClamp",
            SamplerIndex::ShadowCmpWrap => "ShadowCmpWrap",
            SamplerIndex::ShadowCmpMirror => "ShadowCmpMirror",
            SamplerIndex::ShadowCmpBorder => "ShadowCmpBorder",
            SamplerIndex::LinearNoMipClamp => "LinearNoMipClamp",
            SamplerIndex::PointNoMipClamp => "PointNoMipClamp",
        }
    }

    /// The description registered for this builtin.
    pub fn desc(self) -> SamplerDesc {
        use SamplerIndex::*;
        let address = |group_offset: u32| match self as u32 - group_offset {
            0 => AddressMode::Clamp,
            1 => AddressMode::Repeat,
            2 => AddressMode::Mirror,
            _ => AddressMode::Border,
        };
        let base = SamplerDesc::default();
        match self {
            LinearClamp | LinearWrap | LinearMirror | LinearBorder => {
                let mode = address(LinearClamp as u32);
                SamplerDesc {
                    address_s: mode,
                    address_t: mode,
                    ..base
                }
            }
            PointClamp | PointWrap | PointMirror | PointBorder => {
                let mode = address(PointClamp as u32);
                SamplerDesc {
                    min_filter: MinFilter::Nearest,
                    mag_filter: MagFilter::Nearest,
                    address_s: mode,
                    address_t: mode,
                    ..base
                }
            }
            LinearMipClamp | LinearMipWrap | LinearMipMirror | LinearMipBorder => {
                let mode = address(LinearMipClamp as u32);
                SamplerDesc {
                    mip_filter: MipFilter::Linear,
                    address_s: mode,
                    address_t: mode,
                    ..base
                }
            }
            // Only U varies for the anisotropic and comparison groups.
            AnisoClamp | AnisoWrap | AnisoMirror | AnisoBorder => SamplerDesc {
                min_filter: MinFilter::Anisotropic,
                mip_filter: MipFilter::Linear,
                max_anisotropy: 16,
                address_s: address(AnisoClamp as u32),
                ..base
            },
            ShadowCmpClamp | ShadowCmpWrap | ShadowCmpMirror | ShadowCmpBorder => SamplerDesc {
                compare: CompareFunc::Less,
                address_s: address(ShadowCmpClamp as u32),
                ..base
            },
            LinearNoMipClamp => SamplerDesc {
                mip_filter: MipFilter::Nearest,
                ..base
            },
            PointNoMipClamp => SamplerDesc {
                min_filter: MinFilter::Nearest,
                mag_filter: MagFilter::Nearest,
                mip_filter: MipFilter::Nearest,
                ..base
            },
        }
    }
}

/// A registry slot returned by sampler interning. Builtins occupy slots
/// `0..SamplerIndex::COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SamplerHandle(pub u32);

impl From<SamplerIndex> for SamplerHandle {
    fn from(index: SamplerIndex) -> Self {
        SamplerHandle(index as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_key_matches_packed_layout() {
        let desc = SamplerDesc::default();
        // min=1, mag=1<<2, mip=3<<4, s/t/w=2<<6|2<<8|2<<10
        let expected = 1 | (1 << 2) | (3 << 4) | (2 << 6) | (2 << 8) | (2 << 10);
        assert_eq!(desc.key(), expected);
    }

    #[test]
    fn anisotropy_sixteen_fits_in_the_key() {
        let aniso16 = SamplerIndex::AnisoClamp.desc();
        let aniso1 = SamplerDesc {
            max_anisotropy: 1,
            ..aniso16
        };
        assert_ne!(aniso16.key(), aniso1.key());
        assert_eq!(aniso16.key() >> 16 & 0xF, 15);
        assert_eq!(aniso16.key() >> 20, 0, "reserved bits stay clear");
    }

    #[test]
    fn builtins_are_distinct() {
        let keys: HashSet<u32> = SamplerIndex::ALL.iter().map(|s| s.desc().key()).collect();
        assert_eq!(keys.len(), SamplerIndex::COUNT);
        assert_eq!(SamplerHandle::from(SamplerIndex::PointNoMipClamp).0, 21);
    }

    #[test]
    fn comparison_builtins_only_vary_u() {
        let wrap = SamplerIndex::ShadowCmpWrap.desc();
        assert!(wrap.is_comparison());
        assert_eq!(wrap.address_s, AddressMode::Repeat);
        assert_eq!(wrap.address_t, AddressMode::Clamp);
    }
}
