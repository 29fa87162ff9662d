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

//! Raster and primitive state.

use crate::vesper_bitflags;
use serde::{Deserialize, Serialize};

/// The primitive topology of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PrimitiveType {
    /// Points.
    Point,
    /// Independent line segments.
    Line,
    /// Closed line strip. Drawn as a strip on APIs without native loops.
    LineLoop,
    /// Connected line segments.
    LineStrip,
    /// Independent triangles.
    #[default]
    Triangle,
    /// Connected triangles.
    TriangleStrip,
}

/// The class of primitive a pipeline object is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveGroup {
    /// Point topologies.
    Point = 0,
    /// Line topologies.
    Line = 1,
    /// Triangle topologies.
    Triangle = 2,
}

impl PrimitiveType {
    /// The pipeline-level group this topology belongs to.
    pub const fn group(self) -> PrimitiveGroup {
        match self {
            PrimitiveType::Point => PrimitiveGroup::Point,
            PrimitiveType::Line | PrimitiveType::LineLoop | PrimitiveType::LineStrip => {
                PrimitiveGroup::Line
            }
            PrimitiveType::Triangle | PrimitiveType::TriangleStrip => PrimitiveGroup::Triangle,
        }
    }
}

/// Which triangle faces are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CullMode {
    /// Draw both faces.
    #[default]
    None = 0,
    /// Discard back faces.
    Back = 1,
    /// Discard front faces.
    Front = 2,
}

/// The vertex order of a front-facing triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Winding {
    /// Clockwise triangles face the viewer.
    Clockwise,
    /// Counter-clockwise triangles face the viewer.
    #[default]
    CounterClockwise,
}

/// A comparison used by depth, stencil and comparison-sampler tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompareFunc {
    /// Never passes.
    #[default]
    Never = 0,
    /// Passes if the incoming value is less than the stored one.
    Less = 1,
    /// Passes on equality.
    Equal = 2,
    /// Passes if less than or equal.
    LessEqual = 3,
    /// Passes if greater.
    Greater = 4,
    /// Passes on inequality.
    NotEqual = 5,
    /// Passes if greater than or equal.
    GreaterEqual = 6,
    /// Always passes.
    Always = 7,
}

vesper_bitflags! {
    /// Which color channels a draw writes.
    pub struct ColorWriteMask: u8 {
        /// Red.
        const RED = 1 << 0;
        /// Green.
        const GREEN = 1 << 1;
        /// Blue.
        const BLUE = 1 << 2;
        /// Alpha.
        const ALPHA = 1 << 3;
        /// All four channels.
        const ALL = 0xF;
    }
}

/// A viewport rectangle in pixels, origin at the top-left of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Viewport {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// A scissor rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScissorRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_and_loops_share_their_list_group() {
        assert_eq!(PrimitiveType::LineLoop.group(), PrimitiveGroup::Line);
        assert_eq!(PrimitiveType::LineStrip.group(), PrimitiveGroup::Line);
        assert_eq!(PrimitiveType::TriangleStrip.group(), PrimitiveGroup::Triangle);
        assert_eq!(PrimitiveType::Point.group(), PrimitiveGroup::Point);
    }

    #[test]
    fn write_mask_all_covers_every_channel() {
        let rgb = ColorWriteMask::RED | ColorWriteMask::GREEN | ColorWriteMask::BLUE;
        assert!(ColorWriteMask::ALL.contains(rgb | ColorWriteMask::ALPHA));
        assert_eq!(format!("{:?}", ColorWriteMask::ALL), "ColorWriteMask { RED | GREEN | BLUE | ALPHA }");
    }
}
