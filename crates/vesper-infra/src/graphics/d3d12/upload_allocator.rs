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

//! Ring allocator over a persistently mapped upload heap.
//!
//! Allocations are tagged with the serial (isolated fence value) of the
//! submission that consumes them. The ring only reclaims space when that
//! serial has completed, so an allocation's bytes are never overwritten while
//! a copy may still read them. Requests that do not fit are served by a
//! dedicated staging buffer, released once its serial completes.

use super::native::{HeapType, NativeDevice, ResourceDesc, ResourceHandle, ResourceStates};
use std::collections::VecDeque;
use std::sync::Arc;
use vesper_core::math::align_up;
use vesper_core::renderer::ResourceError;

/// Default alignment of upload allocations.
pub const DEFAULT_UPLOAD_ALIGNMENT: u64 = 256;

/// A slice of upload memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadAllocation {
    /// Upload resource holding the slice.
    pub resource: ResourceHandle,
    /// Offset of the slice in the resource.
    pub offset: u64,
    /// Bytes reserved.
    pub size: u64,
    /// Whether the slice lives in a dedicated staging buffer.
    pub one_off: bool,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    end: u64,
    serial: u64,
    // The range starts a new lap at offset 0.
    wraps: bool,
}

/// Ring of upload memory with one-off fallback.
#[derive(Debug)]
pub struct UploadBufferAllocator {
    native: Arc<dyn NativeDevice>,
    ring: ResourceHandle,
    capacity: u64,
    write: u64,
    read: u64,
    wrapped: bool,
    in_flight: VecDeque<InFlight>,
    one_offs: VecDeque<(u64, ResourceHandle)>,
}

impl UploadBufferAllocator {
    /// Creates a ring of `capacity` bytes.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If the upload heap cannot be created.
    pub fn new(native: Arc<dyn NativeDevice>, capacity: u64) -> Result<Self, ResourceError> {
        let ring = create_upload_buffer(native.as_ref(), capacity)?;
        log::debug!("UploadBufferAllocator: ring of {capacity} bytes created");
        Ok(Self {
            native,
            ring,
            capacity,
            write: 0,
            read: 0,
            wrapped: false,
            in_flight: VecDeque::new(),
            one_offs: VecDeque::new(),
        })
    }

    /// Ring capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Reserves `size` bytes for the submission that will signal `serial`.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If a one-off staging buffer is needed and cannot be created.
    pub fn alloc_bytes(
        &mut self,
        size: u64,
        alignment: u64,
        serial: u64,
    ) -> Result<UploadAllocation, ResourceError> {
        if self.in_flight.is_empty() {
            self.write = 0;
            self.read = 0;
            self.wrapped = false;
        }

        let start = align_up(self.write, alignment);
        let placement = if !self.wrapped {
            if start + size <= self.capacity {
                Some((start, false))
            } else if size <= self.read {
                Some((0, true))
            } else {
                None
            }
        } else if start + size <= self.read {
            Some((start, false))
        } else {
            None
        };

        let Some((offset, wraps)) = placement else {
            return self.alloc_one_off(size, serial);
        };

        self.write = offset + size;
        if wraps {
            self.wrapped = true;
        }
        match self.in_flight.back_mut() {
            Some(last) if last.serial == serial && !wraps => last.end = self.write,
            _ => self.in_flight.push_back(InFlight {
                end: self.write,
                serial,
                wraps,
            }),
        }
        Ok(UploadAllocation {
            resource: self.ring,
            offset,
            size,
            one_off: false,
        })
    }

    fn alloc_one_off(&mut self, size: u64, serial: u64) -> Result<UploadAllocation, ResourceError> {
        log::debug!("UploadBufferAllocator: ring full, staging {size} bytes in a one-off buffer");
        let resource = create_upload_buffer(self.native.as_ref(), size)?;
        self.one_offs.push_back((serial, resource));
        Ok(UploadAllocation {
            resource,
            offset: 0,
            size,
            one_off: true,
        })
    }

    /// Copies `data` into an allocation.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If `data` is larger than the allocation.
    pub fn write(&self, allocation: &UploadAllocation, data: &[u8]) -> Result<(), ResourceError> {
        self.write_at(allocation, 0, data)
    }

    /// Copies `data` at `offset` bytes into an allocation.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the write exceeds the allocation.
    pub fn write_at(
        &self,
        allocation: &UploadAllocation,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        if offset
            .checked_add(data.len() as u64)
            .map_or(true, |end| end > allocation.size)
        {
            return Err(ResourceError::OutOfBounds);
        }
        self.native
            .write_mapped(allocation.resource, allocation.offset + offset, data)
            .map_err(|e| ResourceError::BackendError(e.to_string()))
    }

    /// Reclaims every range whose serial is at most `completed`.
    pub fn retire(&mut self, completed: u64) {
        while let Some(head) = self.in_flight.front().copied() {
            if head.serial > completed {
                break;
            }
            if head.wraps {
                self.wrapped = false;
            }
            self.read = head.end;
            self.in_flight.pop_front();
        }
        while let Some(&(serial, resource)) = self.one_offs.front() {
            if serial > completed {
                break;
            }
            self.native.release_resource(resource);
            self.one_offs.pop_front();
        }
    }

    /// Reclaims everything. The caller has waited for the GPU.
    pub fn retire_sync(&mut self) {
        self.retire(u64::MAX);
    }

    /// Bytes currently reserved in the ring.
    pub fn used_bytes(&self) -> u64 {
        if self.in_flight.is_empty() {
            0
        } else if self.wrapped {
            self.capacity - self.read + self.write
        } else {
            self.write - self.read
        }
    }
}

impl Drop for UploadBufferAllocator {
    fn drop(&mut self) {
        for (_, resource) in self.one_offs.drain(..) {
            self.native.release_resource(resource);
        }
        self.native.release_resource(self.ring);
    }
}

fn create_upload_buffer(
    native: &dyn NativeDevice,
    size: u64,
) -> Result<ResourceHandle, ResourceError> {
    native
        .create_committed_resource(
            HeapType::Upload,
            &ResourceDesc::buffer(size.max(1)),
            ResourceStates::GENERIC_READ,
            None,
        )
        .map_err(|e| {
            log::error!("UploadBufferAllocator: failed to create upload buffer: {e}");
            ResourceError::BackendError(e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::d3d12::native::HeadlessDevice;

    const CAPACITY: u64 = 1024;

    fn ring() -> (Arc<HeadlessDevice>, UploadBufferAllocator) {
        let device = Arc::new(HeadlessDevice::new());
        let ring = UploadBufferAllocator::new(device.clone(), CAPACITY).unwrap();
        (device, ring)
    }

    #[test]
    fn overlapping_second_half_falls_back_to_one_off() {
        // --- 1. ARRANGE ---
        let (device, mut ring) = ring();
        let half = CAPACITY / 2 + 1;
        let first = ring.alloc_bytes(half, 1, 1).unwrap();
        ring.write(&first, &vec![0xAA; half as usize]).unwrap();

        // --- 2. ACT ---
        let second = ring.alloc_bytes(half, 1, 2).unwrap();
        ring.write(&second, &vec![0x55; half as usize]).unwrap();

        // --- 3. ASSERT ---
        assert!(!first.one_off);
        assert!(second.one_off);
        assert_ne!(second.resource, first.resource);
        let bytes = device.buffer_contents(first.resource).unwrap();
        assert!(bytes[..half as usize].iter().all(|b| *b == 0xAA));
    }

    #[test]
    fn wraps_to_zero_once_the_head_is_retired() {
        let (_device, mut ring) = ring();
        let a = ring.alloc_bytes(400, 256, 1).unwrap();
        let b = ring.alloc_bytes(400, 256, 2).unwrap();
        assert_eq!((a.offset, b.offset), (0, 512));

        // Tail [912, 1024) is too small and [0, read) is still in flight.
        ring.retire(1);
        let c = ring.alloc_bytes(300, 256, 3).unwrap();
        assert!(!c.one_off);
        assert_eq!(c.offset, 0);

        // Wrapped: the next slice must end before `read`.
        let d = ring.alloc_bytes(300, 256, 3).unwrap();
        assert!(d.one_off);
    }

    #[test]
    fn one_off_buffers_are_released_when_retired() {
        let (device, mut ring) = ring();
        let big = ring.alloc_bytes(CAPACITY * 2, 256, 5).unwrap();
        assert!(big.one_off);
        assert!(device.is_live(big.resource));

        ring.retire(4);
        assert!(device.is_live(big.resource));
        ring.retire(5);
        assert!(!device.is_live(big.resource));
    }

    #[test]
    fn same_serial_ranges_merge_and_reset_when_idle() {
        let (_device, mut ring) = ring();
        ring.alloc_bytes(100, 256, 7).unwrap();
        ring.alloc_bytes(100, 256, 7).unwrap();
        assert_eq!(ring.in_flight.len(), 1);
        assert_eq!(ring.used_bytes(), 356);

        ring.retire_sync();
        assert_eq!(ring.used_bytes(), 0);
        let next = ring.alloc_bytes(CAPACITY, 256, 8).unwrap();
        assert_eq!(next.offset, 0);
        assert!(!next.one_off);
    }

    #[test]
    fn writes_past_the_allocation_are_rejected() {
        let (_device, mut ring) = ring();
        let slice = ring.alloc_bytes(16, 256, 1).unwrap();
        assert!(matches!(
            ring.write(&slice, &[0; 17]),
            Err(ResourceError::OutOfBounds)
        ));
        assert!(matches!(
            ring.write_at(&slice, u64::MAX - 4, &[0; 8]),
            Err(ResourceError::OutOfBounds)
        ));
    }
}
