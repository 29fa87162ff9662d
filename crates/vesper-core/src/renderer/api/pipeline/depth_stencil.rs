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

//! Depth and stencil test configuration.

use super::state::CompareFunc;
use crate::vesper_bitflags;

vesper_bitflags! {
    /// Switches for the depth and stencil tests.
    pub struct DepthStencilFlags: u32 {
        /// Enable the depth test.
        const DEPTH_TEST = 1;
        /// Write passing fragments' depth.
        const DEPTH_WRITE = 1 << 1;
        /// Enable the stencil test.
        const STENCIL_TEST = 1 << 2;
        /// Depth and stencil tests without depth writes.
        const DEPTH_STENCIL_TEST = 1 | (1 << 2);
        /// Everything on.
        const ALL = 0b111;
    }
}

/// What the stencil test does to the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    /// Keep the stored value.
    #[default]
    Keep = 0,
    /// Store zero.
    Zero = 1,
    /// Store the reference value.
    Replace = 2,
    /// Bitwise invert.
    Invert = 3,
    /// Increment, wrapping to zero.
    IncrementWrap = 4,
    /// Decrement, wrapping to the maximum.
    DecrementWrap = 5,
}

/// Stencil behavior for one triangle face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilDesc {
    /// Applied when the stencil test fails.
    pub stencil_failure_op: StencilOp,
    /// Applied when the stencil test passes but the depth test fails.
    pub depth_failure_op: StencilOp,
    /// Applied when both tests pass.
    pub depth_stencil_pass_op: StencilOp,
    /// Stencil comparison.
    pub compare: CompareFunc,
    /// Mask applied before comparing.
    pub read_mask: u8,
    /// Mask applied before writing.
    pub write_mask: u8,
}

impl Default for StencilDesc {
    fn default() -> Self {
        Self {
            stencil_failure_op: StencilOp::Keep,
            depth_failure_op: StencilOp::Keep,
            depth_stencil_pass_op: StencilOp::Keep,
            compare: CompareFunc::Always,
            read_mask: 0,
            write_mask: 0,
        }
    }
}

/// The full depth/stencil state of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilDesc {
    /// Depth comparison.
    pub depth_compare: CompareFunc,
    /// Which tests are enabled.
    pub flags: DepthStencilFlags,
    /// Front-face stencil behavior.
    pub front: StencilDesc,
    /// Back-face stencil behavior.
    pub back: StencilDesc,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self {
            depth_compare: CompareFunc::Less,
            flags: DepthStencilFlags::ALL,
            front: StencilDesc::default(),
            back: StencilDesc::default(),
        }
    }
}

impl DepthStencilDesc {
    /// Returns `true` if either test is enabled. A desc that only sets
    /// [`DepthStencilFlags::DEPTH_WRITE`] is treated as fully disabled.
    pub fn is_enabled(&self) -> bool {
        self.flags.intersects(DepthStencilFlags::DEPTH_STENCIL_TEST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_only_flags_count_as_disabled() {
        let desc = DepthStencilDesc {
            flags: DepthStencilFlags::DEPTH_WRITE,
            ..Default::default()
        };
        assert!(!desc.is_enabled());
        assert!(DepthStencilDesc::default().is_enabled());
    }

    #[test]
    fn defaults_use_less_and_always() {
        let desc = DepthStencilDesc::default();
        assert_eq!(desc.depth_compare, CompareFunc::Less);
        assert_eq!(desc.front.compare, CompareFunc::Always);
        assert_eq!(desc.flags, DepthStencilFlags::ALL);
    }
}
