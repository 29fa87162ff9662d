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

//! The seam between the D3D12 backend logic and the native API.
//!
//! Everything the backend decides (allocation, state tracking, caching, frame
//! pacing, disposal) happens above this seam in portable Rust. Below it sits a
//! [`NativeDevice`]: the Windows implementation forwards to `ID3D12Device`,
//! `ID3D12CommandQueue` and DXGI, while [`HeadlessDevice`] executes the same
//! calls against CPU memory so the backend runs in tests and on machines
//! without a GPU.
//!
//! Commands are recorded into a [`CommandList`] owned by the backend and
//! replayed in order by [`NativeDevice::execute`], which plays the role of
//! `ExecuteCommandLists` on the single direct queue.

mod headless;
mod types;
#[cfg(windows)]
mod hardware;

pub use self::headless::{DescriptorContent, DrawRecord, HeadlessDevice};
pub use self::types::*;
#[cfg(windows)]
pub use self::hardware::WindowsDevice;

use raw_window_handle::RawWindowHandle;
use std::fmt;

/// An error reported by the native layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// An object could not be created.
    CreationFailed(String),
    /// A handle does not name a live object.
    InvalidHandle,
    /// A mapped access was outside the resource or the resource is not CPU-visible.
    OutOfBounds,
    /// The device was removed.
    DeviceRemoved {
        /// The reason reported by the driver.
        reason: String,
    },
    /// Shader compilation failed.
    ShaderCompilation(String),
    /// Any other failure.
    Other(String),
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeError::CreationFailed(msg) => write!(f, "Native object creation failed: {msg}"),
            NativeError::InvalidHandle => write!(f, "Invalid native handle"),
            NativeError::OutOfBounds => write!(f, "Mapped access out of bounds"),
            NativeError::DeviceRemoved { reason } => write!(f, "Device removed: {reason}"),
            NativeError::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {msg}"),
            NativeError::Other(msg) => write!(f, "Native error: {msg}"),
        }
    }
}

impl std::error::Error for NativeError {}

/// A recorded sequence of commands for the direct queue.
#[derive(Debug, Default)]
pub struct CommandList {
    commands: Vec<NativeCommand>,
}

impl CommandList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command.
    pub fn record(&mut self, command: NativeCommand) {
        self.commands.push(command);
    }

    /// Appends transition barriers, skipping those whose states are equal.
    pub fn barriers(&mut self, barriers: impl IntoIterator<Item = Barrier>) {
        let barriers: Vec<Barrier> = barriers
            .into_iter()
            .filter(|b| match b {
                Barrier::Transition { before, after, .. } => before != after,
                Barrier::Uav { .. } => true,
            })
            .collect();
        if !barriers.is_empty() {
            self.commands.push(NativeCommand::ResourceBarrier(barriers));
        }
    }

    /// Recorded commands.
    pub fn commands(&self) -> &[NativeCommand] {
        &self.commands
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drops every recorded command, keeping the allocation.
    pub fn reset(&mut self) {
        self.commands.clear();
    }
}

/// The native device, queue and swapchain operations the backend relies on.
///
/// Implementations are internally synchronized; the backend calls them from
/// the render thread and from resource-creating threads.
pub trait NativeDevice: Send + Sync + fmt::Debug {
    /// Adapter identification.
    fn adapter_info(&self) -> AdapterInfo;

    /// Returns `true` if `format` can be sampled (and rendered, for color formats).
    fn check_format_support(&self, format: DxgiFormat) -> bool;

    /// Creates a committed resource.
    fn create_committed_resource(
        &self,
        heap: HeapType,
        desc: &ResourceDesc,
        initial_state: ResourceStates,
        clear_value: Option<ClearValue>,
    ) -> Result<ResourceHandle, NativeError>;

    /// Releases a resource. The caller guarantees the GPU no longer uses it.
    fn release_resource(&self, resource: ResourceHandle);

    /// Writes through the persistent mapping of an upload resource.
    fn write_mapped(&self, resource: ResourceHandle, offset: u64, data: &[u8])
        -> Result<(), NativeError>;

    /// Reads through the mapping of an upload or readback resource.
    fn read_mapped(&self, resource: ResourceHandle, offset: u64, len: u64)
        -> Result<Vec<u8>, NativeError>;

    /// GPU virtual address of a buffer.
    fn gpu_virtual_address(&self, resource: ResourceHandle) -> u64;

    /// Creates a descriptor heap.
    fn create_descriptor_heap(
        &self,
        kind: DescriptorHeapKind,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<NativeHeap, NativeError>;

    /// Releases a descriptor heap.
    fn release_descriptor_heap(&self, heap: HeapHandle);

    /// Writes a shader resource view. `None` writes a null view.
    fn create_shader_resource_view(
        &self,
        resource: Option<ResourceHandle>,
        desc: &SrvDesc,
        dst: CpuDescriptor,
    );

    /// Writes an unordered access view.
    fn create_unordered_access_view(&self, resource: ResourceHandle, desc: &UavDesc, dst: CpuDescriptor);

    /// Writes a render target view.
    fn create_render_target_view(&self, resource: ResourceHandle, desc: &RtvDesc, dst: CpuDescriptor);

    /// Writes a depth/stencil view.
    fn create_depth_stencil_view(&self, resource: ResourceHandle, format: DxgiFormat, dst: CpuDescriptor);

    /// Writes a sampler.
    fn create_sampler(&self, desc: &NativeSamplerDesc, dst: CpuDescriptor);

    /// Copies `count` consecutive descriptors.
    fn copy_descriptors_simple(
        &self,
        count: u32,
        dst: CpuDescriptor,
        src: CpuDescriptor,
        kind: DescriptorHeapKind,
    );

    /// Serializes and creates a root signature.
    fn create_root_signature(&self, desc: &RootSignatureDesc)
        -> Result<RootSignatureHandle, NativeError>;

    /// Releases a root signature.
    fn release_root_signature(&self, root_signature: RootSignatureHandle);

    /// Creates a graphics pipeline state object.
    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc)
        -> Result<PipelineHandle, NativeError>;

    /// Creates a compute pipeline state object.
    fn create_compute_pipeline(
        &self,
        root_signature: RootSignatureHandle,
        compute_shader: &[u8],
    ) -> Result<PipelineHandle, NativeError>;

    /// Releases a pipeline state object.
    fn release_pipeline(&self, pipeline: PipelineHandle);

    /// Compiles HLSL with entry point `main`.
    fn compile_shader(
        &self,
        source: &str,
        profile: &str,
        defines: &[(&str, &str)],
    ) -> Result<Vec<u8>, NativeError>;

    /// Creates a fence with an initial value.
    fn create_fence(&self, initial_value: u64) -> Result<FenceHandle, NativeError>;

    /// Queues a GPU-side signal of `value` after all previously executed work.
    fn signal(&self, fence: FenceHandle, value: u64) -> Result<(), NativeError>;

    /// The last value the GPU has signaled.
    fn completed_value(&self, fence: FenceHandle) -> u64;

    /// Blocks the calling thread until the fence reaches `value`.
    fn wait(&self, fence: FenceHandle, value: u64) -> Result<(), NativeError>;

    /// Submits a command list to the direct queue.
    fn execute(&self, list: &CommandList) -> Result<(), NativeError>;

    /// Creates a flip-discard swapchain for a window.
    fn create_swapchain(
        &self,
        window: RawWindowHandle,
        width: u32,
        height: u32,
        buffer_count: u32,
        format: DxgiFormat,
    ) -> Result<SwapchainHandle, NativeError>;

    /// Resizes every back buffer. All references to them must be released first.
    fn resize_swapchain(&self, swapchain: SwapchainHandle, width: u32, height: u32)
        -> Result<(), NativeError>;

    /// Back buffer `index` of the swapchain.
    fn swapchain_buffer(&self, swapchain: SwapchainHandle, index: u32)
        -> Result<ResourceHandle, NativeError>;

    /// Index of the back buffer to render into.
    fn current_back_buffer_index(&self, swapchain: SwapchainHandle) -> u32;

    /// Presents the current back buffer.
    /// ## Errors
    /// * `NativeError::DeviceRemoved` - If the device was removed or reset.
    fn present(&self, swapchain: SwapchainHandle, sync_interval: u32, allow_tearing: bool)
        -> Result<(), NativeError>;

    /// Returns `true` when tearing presents are available.
    fn supports_tearing(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transitions_are_dropped() {
        let mut list = CommandList::new();
        let resource = ResourceHandle(1);
        list.barriers([Barrier::transition(
            resource,
            ResourceStates::COPY_DEST,
            ResourceStates::COPY_DEST,
        )]);
        assert!(list.is_empty());

        list.barriers([
            Barrier::transition(resource, ResourceStates::COPY_DEST, ResourceStates::GENERIC_READ),
            Barrier::Uav { resource },
        ]);
        assert_eq!(list.commands().len(), 1);
        list.reset();
        assert!(list.is_empty());
    }
}
