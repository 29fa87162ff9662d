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

//! Render targets and render-pass descriptions.

use super::common::MAX_COLOR_ATTACHMENT;
use super::texture::TextureId;

/// An opaque handle to a render target.
///
/// [`RenderTargetId::DEFAULT`] always names the swapchain's current back buffer
/// together with the default depth/stencil buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetId(pub usize);

impl RenderTargetId {
    /// The screen.
    pub const DEFAULT: Self = Self(0);

    /// Returns `true` for the screen target.
    pub const fn is_default(self) -> bool {
        self.0 == 0
    }
}

crate::vesper_bitflags! {
    /// Selects attachments of a render target.
    pub struct TargetBufferFlags: u8 {
        /// First color attachment.
        const COLOR0 = 1 << 0;
        /// Second color attachment.
        const COLOR1 = 1 << 1;
        /// Third color attachment.
        const COLOR2 = 1 << 2;
        /// Fourth color attachment.
        const COLOR3 = 1 << 3;
        /// Every color attachment.
        const ALL_COLOR = 0xF;
        /// The depth plane.
        const DEPTH = 1 << 4;
        /// The stencil plane.
        const STENCIL = 1 << 5;
        /// Depth and stencil planes.
        const DEPTH_AND_STENCIL = 0x30;
        /// Everything.
        const ALL = 0x3F;
    }
}

impl TargetBufferFlags {
    /// The flag for color attachment `index`.
    pub fn color(index: usize) -> Self {
        debug_assert!(index < MAX_COLOR_ATTACHMENT);
        Self::from_bits_truncate(1 << index)
    }
}

/// Attachment operations applied at the start and end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderPassFlags {
    /// Attachments cleared when the pass begins.
    pub clear: TargetBufferFlags,
    /// Attachments whose previous content may be discarded when the pass begins.
    pub discard_start: TargetBufferFlags,
    /// Attachments whose content may be discarded when the pass ends.
    pub discard_end: TargetBufferFlags,
}

/// Clear values and attachment operations of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassDesc {
    /// Color used to clear color attachments.
    pub clear_color: [f32; 4],
    /// Depth used to clear the depth plane.
    pub clear_depth: f32,
    /// Value used to clear the stencil plane.
    pub clear_stencil: u8,
    /// Load/store behavior.
    pub flags: RenderPassFlags,
}

impl Default for RenderPassDesc {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 0.0],
            clear_depth: 1.0,
            clear_stencil: 0,
            flags: RenderPassFlags::default(),
        }
    }
}

impl RenderPassDesc {
    /// A pass that clears every attachment with the given values.
    pub fn clear_all(clear_color: [f32; 4], clear_depth: f32, clear_stencil: u8) -> Self {
        Self {
            clear_color,
            clear_depth,
            clear_stencil,
            flags: RenderPassFlags {
                clear: TargetBufferFlags::ALL,
                ..Default::default()
            },
        }
    }
}

/// Attachments of an offscreen render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderTargetDescriptor {
    /// Color attachments by slot.
    pub color: [Option<TextureId>; MAX_COLOR_ATTACHMENT],
    /// The depth/stencil attachment.
    pub depth_stencil: Option<TextureId>,
}

impl RenderTargetDescriptor {
    /// Attachments present in the descriptor.
    pub fn attachment_flags(&self) -> TargetBufferFlags {
        let mut flags = TargetBufferFlags::EMPTY;
        for (index, slot) in self.color.iter().enumerate() {
            flags.set(TargetBufferFlags::color(index), slot.is_some());
        }
        flags.set(TargetBufferFlags::DEPTH_AND_STENCIL, self.depth_stencil.is_some());
        flags
    }
}

/// Pixels read back from a render target, tightly packed RGBA8 rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelBufferDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes, or empty when the read failed.
    pub data: Vec<u8>,
}

impl PixelBufferDesc {
    /// Returns `true` if the readback produced pixels.
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Receives a readback once the GPU has produced it.
pub type ReadPixelsCallback = Box<dyn FnOnce(PixelBufferDesc) + Send>;
