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

//! Per-frame recording resources.
//!
//! Each in-flight frame owns a command list, the fence value that retires it,
//! a slice of shader-visible descriptors for texture tables and a uniform
//! ring. A slot is only reset after its fence value has completed.

use super::native::{
    CommandList, DescriptorHeapKind, GpuDescriptor, HeapType, NativeDevice, NativeError,
    NativeHeap, ResourceDesc, ResourceHandle, ResourceStates,
};
use vesper_core::math::align_up;

/// A persistently mapped upload buffer handing out aligned slices, wrapping
/// to offset 0 when the end is reached.
#[derive(Debug)]
pub struct UniformRing {
    resource: ResourceHandle,
    base_address: u64,
    capacity: u64,
    alignment: u64,
    cursor: u64,
}

impl UniformRing {
    /// Creates the ring.
    ///
    /// ## Errors
    /// * `NativeError` - If the upload buffer cannot be created.
    pub fn new(native: &dyn NativeDevice, capacity: u64, alignment: u64) -> Result<Self, NativeError> {
        let resource = native.create_committed_resource(
            HeapType::Upload,
            &ResourceDesc::buffer(capacity),
            ResourceStates::GENERIC_READ,
            None,
        )?;
        Ok(Self {
            resource,
            base_address: native.gpu_virtual_address(resource),
            capacity,
            alignment,
            cursor: 0,
        })
    }

    /// Copies `data` into the next slice and returns its GPU address.
    /// `None` if `data` is larger than the whole ring.
    pub fn push(&mut self, native: &dyn NativeDevice, data: &[u8]) -> Option<u64> {
        let size = align_up((data.len() as u64).max(1), self.alignment);
        if size > self.capacity {
            log::error!(
                "UniformRing: {} bytes of uniforms exceed the ring capacity {}",
                data.len(),
                self.capacity
            );
            return None;
        }
        if self.cursor + size > self.capacity {
            self.cursor = 0;
        }
        let offset = self.cursor;
        if let Err(err) = native.write_mapped(self.resource, offset, data) {
            log::error!("UniformRing: write failed: {err}");
            return None;
        }
        self.cursor += size;
        Some(self.base_address + offset)
    }

    /// Restarts at offset 0.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Bytes handed out since the last reset or wrap.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn resource(&self) -> ResourceHandle {
        self.resource
    }
}

/// Everything one in-flight frame records into.
#[derive(Debug)]
pub struct FrameResources {
    /// The frame's command list.
    pub list: CommandList,
    /// Frame fence value signaled when the frame was submitted.
    pub fence_value: u64,
    /// Uniform slices of the frame's draws.
    pub uniforms: UniformRing,
    srv_heap: NativeHeap,
    srv_capacity: u32,
    srv_cursor: u32,
}

impl FrameResources {
    /// Creates the slot's ring and its shader-visible descriptor heap.
    ///
    /// ## Errors
    /// * `NativeError` - If a native object cannot be created.
    pub fn new(
        native: &dyn NativeDevice,
        uniform_ring_size: u64,
        uniform_alignment: u64,
        srv_capacity: u32,
    ) -> Result<Self, NativeError> {
        let uniforms = UniformRing::new(native, uniform_ring_size, uniform_alignment)?;
        let srv_heap = match native.create_descriptor_heap(
            DescriptorHeapKind::CbvSrvUav,
            srv_capacity,
            true,
        ) {
            Ok(heap) => heap,
            Err(err) => {
                native.release_resource(uniforms.resource());
                return Err(err);
            }
        };
        Ok(Self {
            list: CommandList::new(),
            fence_value: 0,
            uniforms,
            srv_heap,
            srv_capacity,
            srv_cursor: 0,
        })
    }

    /// Clears the list and rewinds the ring and the descriptor cursor.
    pub fn reset(&mut self) {
        self.list.reset();
        self.uniforms.reset();
        self.srv_cursor = 0;
    }

    pub fn srv_heap(&self) -> &NativeHeap {
        &self.srv_heap
    }

    /// Reserves `count` consecutive shader-visible descriptors. Returns the
    /// index of the first one, or `None` when the frame ran out.
    pub fn reserve_srvs(&mut self, count: u32) -> Option<u32> {
        if self.srv_cursor + count > self.srv_capacity {
            log::error!(
                "FrameResources: {} texture descriptors per frame exhausted",
                self.srv_capacity
            );
            return None;
        }
        let first = self.srv_cursor;
        self.srv_cursor += count;
        Some(first)
    }

    /// GPU address of shader-visible descriptor `index`.
    pub fn srv_gpu(&self, index: u32) -> Option<GpuDescriptor> {
        self.srv_heap
            .gpu_start
            .map(|start| start.offset(index, self.srv_heap.increment))
    }

    /// Releases the native objects. The GPU must be done with the slot.
    pub fn release(&self, native: &dyn NativeDevice) {
        native.release_resource(self.uniforms.resource());
        native.release_descriptor_heap(self.srv_heap.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::d3d12::native::HeadlessDevice;

    #[test]
    fn uniform_ring_wraps_to_the_start() {
        // --- 1. ARRANGE ---
        let device = HeadlessDevice::new();
        let mut ring = UniformRing::new(&device, 1024, 256).unwrap();
        let base = device.gpu_virtual_address(ring.resource());

        // --- 2. ACT ---
        let first = ring.push(&device, &[1; 300]).unwrap();
        let second = ring.push(&device, &[2; 256]).unwrap();
        let wrapped = ring.push(&device, &[3; 300]).unwrap();

        // --- 3. ASSERT ---
        assert_eq!(first, base);
        assert_eq!(second, base + 512);
        assert_eq!(wrapped, base);
        assert_eq!(ring.cursor(), 512);
        let contents = device.buffer_contents(ring.resource()).unwrap();
        assert_eq!(contents[0], 3);
        assert_eq!(contents[512], 2);
    }

    #[test]
    fn oversized_uniforms_are_rejected() {
        let device = HeadlessDevice::new();
        let mut ring = UniformRing::new(&device, 512, 256).unwrap();
        assert!(ring.push(&device, &[0; 513]).is_none());
        assert_eq!(ring.cursor(), 0);
    }

    #[test]
    fn descriptor_reservations_stop_at_capacity() {
        let device = HeadlessDevice::new();
        let mut frame = FrameResources::new(&device, 1024, 256, 8).unwrap();

        assert_eq!(frame.reserve_srvs(5), Some(0));
        assert_eq!(frame.reserve_srvs(3), Some(5));
        assert_eq!(frame.reserve_srvs(1), None);
        frame.reset();
        assert_eq!(frame.reserve_srvs(8), Some(0));
        assert!(frame.srv_gpu(2).is_some());
    }
}
