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

//! Pixel and vertex format tables, and linear-footprint math for uploads.

use super::native::{DxgiFormat, PlacedFootprint};
use vesper_core::math::align_up;
use vesper_core::renderer::{IndexFormat, PixelFormat, VertexFormat};

/// Row pitch alignment of texture data in buffers.
pub const TEXTURE_DATA_PITCH_ALIGNMENT: u64 = 256;
/// Offset alignment of texture data in buffers.
pub const TEXTURE_DATA_PLACEMENT_ALIGNMENT: u64 = 512;
/// Size alignment of constant buffer views.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Native format of a pixel format. `None` if D3D12 has no equivalent.
pub fn to_dxgi(format: PixelFormat) -> Option<DxgiFormat> {
    let dxgi = match format {
        PixelFormat::R8 => DxgiFormat::R8_UNORM,
        PixelFormat::RG8 => DxgiFormat::R8G8_UNORM,
        PixelFormat::RGB8 => return None,
        PixelFormat::RGBA8 => DxgiFormat::R8G8B8A8_UNORM,
        PixelFormat::BGRA8 => DxgiFormat::B8G8R8A8_UNORM,
        PixelFormat::RGB565 => DxgiFormat::B5G6R5_UNORM,
        PixelFormat::RGB5A1 => DxgiFormat::B5G5R5A1_UNORM,
        PixelFormat::RGBA4 => DxgiFormat::B4G4R4A4_UNORM,
        PixelFormat::RGBA32F => DxgiFormat::R32G32B32A32_FLOAT,
        PixelFormat::BC1 => DxgiFormat::BC1_UNORM,
        PixelFormat::BC2 => DxgiFormat::BC2_UNORM,
        PixelFormat::BC3 => DxgiFormat::BC3_UNORM,
        PixelFormat::ASTC4x4 => DxgiFormat::ASTC_4X4_UNORM,
        PixelFormat::D24S8 => DxgiFormat::D24_UNORM_S8_UINT,
    };
    Some(dxgi)
}

/// `(block width, block height, bytes per block)` of a native format.
pub fn block_info(format: DxgiFormat) -> (u32, u32, u32) {
    match format {
        DxgiFormat::BC1_UNORM => (4, 4, 8),
        DxgiFormat::BC2_UNORM | DxgiFormat::BC3_UNORM | DxgiFormat::ASTC_4X4_UNORM => (4, 4, 16),
        DxgiFormat::R32G32B32A32_FLOAT | DxgiFormat::R32G32B32A32_SINT => (1, 1, 16),
        DxgiFormat::R32G32B32_FLOAT | DxgiFormat::R32G32B32_SINT => (1, 1, 12),
        DxgiFormat::R16G16B16A16_UNORM
        | DxgiFormat::R16G16B16A16_UINT
        | DxgiFormat::R32G32_FLOAT
        | DxgiFormat::R32G32_SINT => (1, 1, 8),
        DxgiFormat::R8G8B8A8_UNORM
        | DxgiFormat::R8G8B8A8_UINT
        | DxgiFormat::B8G8R8A8_UNORM
        | DxgiFormat::R16G16_UNORM
        | DxgiFormat::R16G16_UINT
        | DxgiFormat::D32_FLOAT
        | DxgiFormat::R32_FLOAT
        | DxgiFormat::R32_UINT
        | DxgiFormat::R32_SINT
        | DxgiFormat::R24G8_TYPELESS
        | DxgiFormat::D24_UNORM_S8_UINT
        | DxgiFormat::R24_UNORM_X8_TYPELESS => (1, 1, 4),
        DxgiFormat::R8G8_UNORM
        | DxgiFormat::R16_UINT
        | DxgiFormat::B5G6R5_UNORM
        | DxgiFormat::B5G5R5A1_UNORM
        | DxgiFormat::B4G4R4A4_UNORM => (1, 1, 2),
        DxgiFormat::R8_UNORM => (1, 1, 1),
        DxgiFormat::UNKNOWN => (1, 1, 1),
    }
}

/// Bytes of a tightly packed `width x height` image.
pub fn image_size(format: DxgiFormat, width: u32, height: u32) -> u64 {
    let (bw, bh, bytes) = block_info(format);
    width.div_ceil(bw).max(1) as u64 * height.div_ceil(bh).max(1) as u64 * bytes as u64
}

/// Layout of a `width x height` image placed at or after `offset` in an
/// upload or readback buffer.
pub fn footprint(format: DxgiFormat, width: u32, height: u32, offset: u64) -> PlacedFootprint {
    let (bw, bh, bytes) = block_info(format);
    let row_size = width.div_ceil(bw).max(1) * bytes;
    PlacedFootprint {
        offset: align_up(offset, TEXTURE_DATA_PLACEMENT_ALIGNMENT),
        format,
        width,
        height,
        row_pitch: align_up(row_size as u64, TEXTURE_DATA_PITCH_ALIGNMENT) as u32,
        row_count: height.div_ceil(bh).max(1),
        row_size,
    }
}

/// Native format of a vertex attribute.
pub fn vertex_format(format: VertexFormat, normalized: bool) -> DxgiFormat {
    match format {
        VertexFormat::Float4 | VertexFormat::Mat4 => DxgiFormat::R32G32B32A32_FLOAT,
        VertexFormat::Float3 => DxgiFormat::R32G32B32_FLOAT,
        VertexFormat::Float2 => DxgiFormat::R32G32_FLOAT,
        VertexFormat::Float => DxgiFormat::R32_FLOAT,
        VertexFormat::Int4 => DxgiFormat::R32G32B32A32_SINT,
        VertexFormat::Int3 => DxgiFormat::R32G32B32_SINT,
        VertexFormat::Int2 => DxgiFormat::R32G32_SINT,
        VertexFormat::Int => DxgiFormat::R32_SINT,
        VertexFormat::UShort4 if normalized => DxgiFormat::R16G16B16A16_UNORM,
        VertexFormat::UShort4 => DxgiFormat::R16G16B16A16_UINT,
        VertexFormat::UShort2 if normalized => DxgiFormat::R16G16_UNORM,
        VertexFormat::UShort2 => DxgiFormat::R16G16_UINT,
        VertexFormat::UByte4 if normalized => DxgiFormat::R8G8B8A8_UNORM,
        VertexFormat::UByte4 => DxgiFormat::R8G8B8A8_UINT,
    }
}

/// Native format of an index buffer view.
pub fn index_format(format: IndexFormat) -> DxgiFormat {
    match format {
        IndexFormat::U16 => DxgiFormat::R16_UINT,
        IndexFormat::U32 => DxgiFormat::R32_UINT,
    }
}

/// Subresource index of `(mip, layer)`.
pub const fn subresource_index(mip: u32, layer: u32, mip_levels: u32) -> u32 {
    mip + layer * mip_levels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_pads_rows_and_aligns_offset() {
        let fp = footprint(DxgiFormat::R8G8B8A8_UNORM, 10, 3, 1);
        assert_eq!(fp.offset, 512);
        assert_eq!(fp.row_size, 40);
        assert_eq!(fp.row_pitch, 256);
        assert_eq!(fp.row_count, 3);
        assert_eq!(fp.total_bytes(), 2 * 256 + 40);
    }

    #[test]
    fn compressed_footprint_counts_block_rows() {
        let fp = footprint(DxgiFormat::BC1_UNORM, 16, 8, 0);
        assert_eq!(fp.row_size, 4 * 8);
        assert_eq!(fp.row_count, 2);
        // A 2x2 mip still occupies one whole block.
        assert_eq!(image_size(DxgiFormat::BC3_UNORM, 2, 2), 16);
    }

    #[test]
    fn rgb8_has_no_native_format() {
        assert_eq!(to_dxgi(PixelFormat::RGB8), None);
        assert_eq!(to_dxgi(PixelFormat::D24S8), Some(DxgiFormat::D24_UNORM_S8_UINT));
        assert_eq!(
            vertex_format(VertexFormat::UByte4, true),
            DxgiFormat::R8G8B8A8_UNORM
        );
        assert_eq!(subresource_index(2, 1, 4), 6);
    }
}
