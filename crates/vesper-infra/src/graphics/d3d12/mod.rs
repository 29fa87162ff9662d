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

//! A Direct3D 12 implementation of the render hardware interface.
//!
//! [`D3d12Driver`] implements [`RenderDevice`](vesper_core::renderer::RenderDevice)
//! and [`D3d12RenderContext`] implements
//! [`RenderContext`](vesper_core::renderer::RenderContext). Both sit on a
//! [`NativeDevice`], which is the Windows D3D12/DXGI device on Windows and the
//! in-memory [`HeadlessDevice`] everywhere else.

mod buffer;
mod context;
mod conversions;
mod descriptor_heap;
mod disposal;
mod driver;
mod format;
mod frame;
mod mipmap;
pub mod native;
mod pipeline;
mod program;
mod registry;
mod render_target;
mod sampler_cache;
mod submission;
mod texture;
mod transfer;
mod upload_allocator;
mod vertex_layout;

pub use self::context::D3d12RenderContext;
pub use self::driver::D3d12Driver;
pub use self::native::{HeadlessDevice, NativeDevice};
#[cfg(windows)]
pub use self::native::WindowsDevice;
