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

//! Vertex stream layouts.

/// The memory format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Four 32-bit floats.
    Float4,
    /// Three 32-bit floats.
    Float3,
    /// Two 32-bit floats.
    Float2,
    /// One 32-bit float.
    Float,
    /// Four 32-bit signed integers.
    Int4,
    /// Three 32-bit signed integers.
    Int3,
    /// Two 32-bit signed integers.
    Int2,
    /// One 32-bit signed integer.
    Int,
    /// Four 16-bit unsigned integers.
    UShort4,
    /// Two 16-bit unsigned integers.
    UShort2,
    /// Four 8-bit unsigned integers.
    UByte4,
    /// A 4x4 float matrix, expanded into four consecutive `Float4` attributes.
    Mat4,
}

impl VertexFormat {
    /// Size of one element in bytes.
    pub const fn size(self) -> u32 {
        match self {
            VertexFormat::Float4 | VertexFormat::Int4 => 16,
            VertexFormat::Float3 | VertexFormat::Int3 => 12,
            VertexFormat::Float2 | VertexFormat::Int2 | VertexFormat::UShort4 => 8,
            VertexFormat::Float | VertexFormat::Int | VertexFormat::UShort2 | VertexFormat::UByte4 => 4,
            VertexFormat::Mat4 => 64,
        }
    }
}

/// One attribute of a vertex layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Semantic name, e.g. `"POSITION"`.
    pub semantic: String,
    /// Semantic index, also the shader input location.
    pub index: u32,
    /// Element format.
    pub format: VertexFormat,
    /// Byte offset inside its stream.
    pub offset: u32,
    /// Normalize fixed-point data to `[0, 1]`.
    pub normalized: bool,
    /// `0` for per-vertex data, otherwise the number of instances per step.
    pub instance_step_rate: u8,
}

impl VertexAttribute {
    /// Returns `true` when the attribute is fed from the instance stream.
    pub fn is_instanced(&self) -> bool {
        self.instance_step_rate != 0
    }
}

/// A complete vertex layout: attributes over one vertex stream and an optional
/// instance stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexLayoutDesc {
    attributes: Vec<VertexAttribute>,
    strides: [u32; 2],
}

impl VertexLayoutDesc {
    /// Starts an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attribute.
    pub fn attribute(
        mut self,
        semantic: impl Into<String>,
        index: u32,
        format: VertexFormat,
        offset: u32,
        normalized: bool,
    ) -> Self {
        self.attributes.push(VertexAttribute {
            semantic: semantic.into(),
            index,
            format,
            offset,
            normalized,
            instance_step_rate: 0,
        });
        self
    }

    /// Appends an attribute fed from the instance stream.
    pub fn instance_attribute(
        mut self,
        semantic: impl Into<String>,
        index: u32,
        format: VertexFormat,
        offset: u32,
        step_rate: u8,
    ) -> Self {
        self.attributes.push(VertexAttribute {
            semantic: semantic.into(),
            index,
            format,
            offset,
            normalized: false,
            instance_step_rate: step_rate.max(1),
        });
        self
    }

    /// Finishes the layout. Without an explicit stride, each stream's stride is
    /// the end of its furthest attribute.
    pub fn end_layout(mut self, stride: Option<u32>) -> Self {
        let extent = |instanced: bool| {
            self.attributes
                .iter()
                .filter(|a| a.is_instanced() == instanced)
                .map(|a| a.offset + a.format.size())
                .max()
                .unwrap_or(0)
        };
        self.strides = [stride.unwrap_or_else(|| extent(false)), extent(true)];
        self
    }

    /// The attributes in declaration order.
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Byte stride of the vertex stream.
    pub fn stride(&self) -> u32 {
        self.strides[0]
    }

    /// Byte stride of the instance stream, `0` when there is none.
    pub fn instance_stride(&self) -> u32 {
        self.strides[1]
    }

    /// A layout is usable once it has a non-zero vertex stride.
    pub fn is_valid(&self) -> bool {
        self.strides[0] != 0
    }
}

/// An opaque handle to a vertex layout registered with a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexLayoutId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_are_inferred_per_stream() {
        let layout = VertexLayoutDesc::new()
            .attribute("POSITION", 0, VertexFormat::Float3, 0, false)
            .attribute("COLOR", 0, VertexFormat::UByte4, 12, true)
            .attribute("TEXCOORD", 0, VertexFormat::Float2, 16, false)
            .instance_attribute("INSTANCE", 0, VertexFormat::Mat4, 0, 1)
            .end_layout(None);
        assert!(layout.is_valid());
        assert_eq!(layout.stride(), 24);
        assert_eq!(layout.instance_stride(), 64);
    }

    #[test]
    fn explicit_stride_wins_and_empty_layout_is_invalid() {
        let layout = VertexLayoutDesc::new()
            .attribute("POSITION", 0, VertexFormat::Float2, 0, false)
            .end_layout(Some(32));
        assert_eq!(layout.stride(), 32);
        assert_eq!(layout.instance_stride(), 0);
        assert!(!VertexLayoutDesc::new().end_layout(None).is_valid());
    }
}
