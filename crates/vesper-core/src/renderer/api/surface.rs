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

//! Presentation surface description.

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// The window a device presents into, and its initial size.
///
/// A descriptor without a window creates a device that renders offscreen
/// only; the default render target is then backed by plain textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceDescriptor {
    /// The native window, if any.
    pub window: Option<RawWindowHandle>,
    /// The native display, if the platform needs one.
    pub display: Option<RawDisplayHandle>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl SurfaceDescriptor {
    /// An offscreen surface of the given size.
    pub fn offscreen(width: u32, height: u32) -> Self {
        Self {
            window: None,
            display: None,
            width,
            height,
        }
    }
}
