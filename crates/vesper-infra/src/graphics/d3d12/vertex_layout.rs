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

//! Input layouts derived from RHI vertex layouts.

use super::format;
use super::native::{InputClassification, InputElement};
use std::hash::{BuildHasher, Hash, Hasher};
use vesper_core::renderer::{VertexFormat, VertexLayoutDesc};

/// Seeds of the layout hash. Fixed so that the hash, and with it the pipeline
/// cache keys, are stable across runs.
const LAYOUT_HASH_SEEDS: [u64; 4] = [
    0x7665_7370_6572_0001,
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
];

/// Input slot of the per-vertex stream.
pub const VERTEX_SLOT: u32 = 0;
/// Input slot of the per-instance stream.
pub const INSTANCE_SLOT: u32 = 1;

/// A vertex layout and its native input elements.
#[derive(Debug, Clone)]
pub struct D3d12VertexLayout {
    desc: VertexLayoutDesc,
    elements: Vec<InputElement>,
    hash: u32,
}

impl D3d12VertexLayout {
    /// Translates `desc`. Matrix attributes expand into four `float4` rows
    /// with consecutive semantic indices.
    pub fn new(desc: VertexLayoutDesc) -> Self {
        let mut elements = Vec::with_capacity(desc.attributes().len());
        for attribute in desc.attributes() {
            let (slot, classification, step_rate) = if attribute.is_instanced() {
                (
                    INSTANCE_SLOT,
                    InputClassification::PerInstance,
                    attribute.instance_step_rate as u32,
                )
            } else {
                (VERTEX_SLOT, InputClassification::PerVertex, 0)
            };
            let rows = if attribute.format == VertexFormat::Mat4 { 4 } else { 1 };
            let row_size = VertexFormat::Float4.size();
            for row in 0..rows {
                elements.push(InputElement {
                    semantic: attribute.semantic.clone(),
                    semantic_index: attribute.index + row,
                    format: format::vertex_format(attribute.format, attribute.normalized),
                    slot,
                    offset: attribute.offset + row * row_size,
                    classification,
                    step_rate,
                });
            }
        }

        let mut hasher = ahash::RandomState::with_seeds(
            LAYOUT_HASH_SEEDS[0],
            LAYOUT_HASH_SEEDS[1],
            LAYOUT_HASH_SEEDS[2],
            LAYOUT_HASH_SEEDS[3],
        )
        .build_hasher();
        elements.hash(&mut hasher);
        desc.stride().hash(&mut hasher);
        desc.instance_stride().hash(&mut hasher);
        let full = hasher.finish();

        Self {
            desc,
            elements,
            hash: (full ^ (full >> 32)) as u32,
        }
    }

    /// The RHI description.
    pub fn desc(&self) -> &VertexLayoutDesc {
        &self.desc
    }

    /// Native input elements.
    pub fn elements(&self) -> &[InputElement] {
        &self.elements
    }

    /// Stable 32-bit hash, the high half of pipeline cache keys.
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Byte stride of the vertex stream.
    pub fn stride(&self) -> u32 {
        self.desc.stride()
    }

    /// Byte stride of the instance stream.
    pub fn instance_stride(&self) -> u32 {
        self.desc.instance_stride()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::d3d12::native::DxgiFormat;

    fn sprite_layout() -> VertexLayoutDesc {
        VertexLayoutDesc::new()
            .attribute("POSITION", 0, VertexFormat::Float3, 0, false)
            .attribute("COLOR", 0, VertexFormat::UByte4, 12, true)
            .attribute("TEXCOORD", 0, VertexFormat::Float2, 16, false)
            .end_layout(None)
    }

    #[test]
    fn attributes_map_to_per_vertex_elements() {
        let layout = D3d12VertexLayout::new(sprite_layout());

        let elements = layout.elements();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[1].format, DxgiFormat::R8G8B8A8_UNORM);
        assert_eq!(elements[2].offset, 16);
        assert!(elements
            .iter()
            .all(|e| e.slot == VERTEX_SLOT && e.classification == InputClassification::PerVertex));
        assert_eq!(layout.stride(), 24);
    }

    #[test]
    fn instanced_matrix_expands_into_rows() {
        // --- 1. ARRANGE ---
        let desc = sprite_layout()
            .instance_attribute("INSTANCE", 2, VertexFormat::Mat4, 0, 1)
            .end_layout(Some(24));

        // --- 2. ACT ---
        let layout = D3d12VertexLayout::new(desc);

        // --- 3. ASSERT ---
        let rows: Vec<_> = layout.elements()[3..].to_vec();
        assert_eq!(rows.len(), 4);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.semantic_index, 2 + i as u32);
            assert_eq!(row.offset, 16 * i as u32);
            assert_eq!(row.slot, INSTANCE_SLOT);
            assert_eq!(row.classification, InputClassification::PerInstance);
            assert_eq!(row.step_rate, 1);
            assert_eq!(row.format, DxgiFormat::R32G32B32A32_FLOAT);
        }
        assert_eq!(layout.instance_stride(), 64);
    }

    #[test]
    fn hash_is_stable_and_layout_sensitive() {
        let a = D3d12VertexLayout::new(sprite_layout());
        let b = D3d12VertexLayout::new(sprite_layout());
        let c = D3d12VertexLayout::new(sprite_layout().end_layout(Some(32)));
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }
}
