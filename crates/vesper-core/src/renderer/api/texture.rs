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

//! Texture handles, pixel formats and texture creation descriptors.

use super::sampler::SamplerDesc;
use serde::{Deserialize, Serialize};

/// An opaque handle to a texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// The dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureType {
    /// A 2D texture, or a 2D array when `array_size > 1`.
    #[default]
    Texture2D,
    /// A cube map with six faces.
    TextureCube,
}

/// How a texture is accessed by the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureUsage {
    /// Sampled only.
    #[default]
    Read,
    /// Sampled and written by uploads.
    Write,
    /// Usable as a color or depth/stencil attachment.
    RenderTarget,
}

/// The pixel formats understood by the RHI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Single 8-bit channel.
    R8,
    /// Two 8-bit channels.
    RG8,
    /// Three 8-bit channels, without alpha. Has no native equivalent on some APIs.
    RGB8,
    /// Four 8-bit channels.
    #[default]
    RGBA8,
    /// Four 8-bit channels, blue first.
    BGRA8,
    /// Packed 16-bit color without alpha.
    RGB565,
    /// Packed 16-bit color with 1-bit alpha.
    RGB5A1,
    /// Packed 16-bit color with 4-bit alpha.
    RGBA4,
    /// Four 32-bit float channels.
    RGBA32F,
    /// BC1 (DXT1) block compression.
    BC1,
    /// BC2 (DXT3) block compression.
    BC2,
    /// BC3 (DXT5) block compression.
    BC3,
    /// ASTC with 4x4 blocks.
    ASTC4x4,
    /// 24-bit depth with 8-bit stencil.
    D24S8,
}

/// The footprint of one compression block (or one pixel for plain formats).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Block width in pixels.
    pub width: u32,
    /// Block height in pixels.
    pub height: u32,
    /// Bytes per block.
    pub bytes: u32,
}

impl PixelFormat {
    /// Returns `true` for block-compressed formats.
    pub const fn is_compressed(self) -> bool {
        matches!(
            self,
            PixelFormat::BC1 | PixelFormat::BC2 | PixelFormat::BC3 | PixelFormat::ASTC4x4
        )
    }

    /// Returns `true` for depth and depth/stencil formats.
    pub const fn is_depth_stencil(self) -> bool {
        matches!(self, PixelFormat::D24S8)
    }

    /// The block footprint. Plain formats report a 1x1 block.
    pub const fn block_info(self) -> BlockInfo {
        let (width, height, bytes) = match self {
            PixelFormat::R8 => (1, 1, 1),
            PixelFormat::RG8 => (1, 1, 2),
            PixelFormat::RGB8 => (1, 1, 3),
            PixelFormat::RGBA8 | PixelFormat::BGRA8 | PixelFormat::D24S8 => (1, 1, 4),
            PixelFormat::RGB565 | PixelFormat::RGB5A1 | PixelFormat::RGBA4 => (1, 1, 2),
            PixelFormat::RGBA32F => (1, 1, 16),
            PixelFormat::BC1 => (4, 4, 8),
            PixelFormat::BC2 | PixelFormat::BC3 | PixelFormat::ASTC4x4 => (4, 4, 16),
        };
        BlockInfo {
            width,
            height,
            bytes,
        }
    }

    /// Bytes occupied by a tightly packed `width x height` image in this format.
    pub fn image_size(self, width: u32, height: u32) -> u64 {
        let block = self.block_info();
        let blocks_x = width.div_ceil(block.width).max(1) as u64;
        let blocks_y = height.div_ceil(block.height).max(1) as u64;
        blocks_x * blocks_y * block.bytes as u64
    }
}

/// A descriptor used to create a [`TextureId`].
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    /// 2D or cube.
    pub texture_type: TextureType,
    /// Pixel format of every subresource.
    pub format: PixelFormat,
    /// Access pattern.
    pub usage: TextureUsage,
    /// Width of mip 0.
    pub width: u32,
    /// Height of mip 0.
    pub height: u32,
    /// Number of array layers. Ignored for cube maps, which always have six faces.
    pub array_size: u32,
    /// Number of mip levels. `0` requests a full chain generated on the GPU
    /// after the first upload of level 0.
    pub mip_levels: u32,
    /// Sampling state, interned by the device.
    pub sampler: SamplerDesc,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            texture_type: TextureType::Texture2D,
            format: PixelFormat::RGBA8,
            usage: TextureUsage::Read,
            width: 4,
            height: 4,
            array_size: 1,
            mip_levels: 1,
            sampler: SamplerDesc::default(),
        }
    }
}

impl TextureDescriptor {
    /// Number of layers actually allocated (six for cube maps).
    pub fn layer_count(&self) -> u32 {
        match self.texture_type {
            TextureType::TextureCube => 6,
            TextureType::Texture2D => self.array_size.max(1),
        }
    }

    /// The mip count after resolving the `0 = full chain` sentinel.
    pub fn mip_level_count(&self) -> u32 {
        if self.mip_levels == 0 {
            full_mip_chain(self.width, self.height)
        } else {
            self.mip_levels
        }
    }

    /// Returns `true` when the descriptor asks for GPU mip generation.
    pub fn wants_generated_mips(&self) -> bool {
        self.mip_levels == 0
    }
}

/// Number of levels in a complete chain down to 1x1.
pub fn full_mip_chain(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Size of `level` given the size of level 0, clamped to one pixel.
pub const fn mip_extent(base: u32, level: u32) -> u32 {
    let v = base >> level;
    if v == 0 {
        1
    } else {
        v
    }
}

/// A rectangle inside one subresource, the target of a partial upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureRegion {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Mip level.
    pub level: u32,
    /// Array layer or cube face.
    pub layer: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_chain_counts_down_to_one_pixel() {
        assert_eq!(full_mip_chain(256, 256), 9);
        assert_eq!(full_mip_chain(300, 20), 9);
        assert_eq!(full_mip_chain(1, 1), 1);
        assert_eq!(full_mip_chain(0, 0), 1);
    }

    #[test]
    fn zero_mip_levels_is_the_generate_sentinel() {
        let desc = TextureDescriptor {
            width: 64,
            height: 16,
            mip_levels: 0,
            ..Default::default()
        };
        assert!(desc.wants_generated_mips());
        assert_eq!(desc.mip_level_count(), 7);
        assert_eq!(mip_extent(16, 6), 1);
    }

    #[test]
    fn compressed_image_size_rounds_to_whole_blocks() {
        assert_eq!(PixelFormat::BC1.image_size(4, 4), 8);
        assert_eq!(PixelFormat::BC1.image_size(2, 2), 8);
        assert_eq!(PixelFormat::BC3.image_size(8, 12), 2 * 3 * 16);
        assert_eq!(PixelFormat::RGBA8.image_size(3, 2), 24);
    }

    #[test]
    fn cube_maps_always_have_six_layers() {
        let desc = TextureDescriptor {
            texture_type: TextureType::TextureCube,
            array_size: 1,
            ..Default::default()
        };
        assert_eq!(desc.layer_count(), 6);
    }
}
