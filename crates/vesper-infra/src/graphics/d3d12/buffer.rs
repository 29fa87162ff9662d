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

//! D3D12 buffers.
//!
//! Static and immutable buffers live in GPU-local memory and are updated
//! through staged copies. Dynamic buffers get one persistently mapped upload
//! backing per frame slot and are written by the CPU directly; a CPU shadow
//! keeps the slots coherent when a frame binds a backing that missed writes.
//! Pixel-pack buffers live in readback memory.

use super::format::CONSTANT_BUFFER_ALIGNMENT;
use super::native::{HeapType, NativeDevice, ResourceDesc, ResourceHandle, ResourceStates};
use super::transfer::{backend_error, TransferQueue};
use vesper_core::math::align_up;
use vesper_core::renderer::{BufferDescriptor, BufferType, BufferUsage, ResourceError};

/// State a GPU-local buffer of `buffer_type` rests in between copies.
pub fn steady_state(buffer_type: BufferType) -> ResourceStates {
    match buffer_type {
        BufferType::Vertex | BufferType::Uniform => ResourceStates::VERTEX_AND_CONSTANT_BUFFER,
        BufferType::Index => ResourceStates::INDEX_BUFFER,
        BufferType::PixelPack => ResourceStates::COMMON,
    }
}

#[derive(Debug)]
struct DynamicShadow {
    contents: Vec<u8>,
    generation: u64,
    synced: Vec<u64>,
}

/// A buffer and its native backings.
#[derive(Debug)]
pub struct D3d12Buffer {
    /// Buffer role.
    pub buffer_type: BufferType,
    /// Update policy.
    pub usage: BufferUsage,
    /// Requested size.
    pub size: u64,
    /// Allocated size (uniform buffers are padded to 256 bytes).
    pub capacity: u64,
    backings: Vec<ResourceHandle>,
    shadow: Option<DynamicShadow>,
    default_data: Option<Vec<u8>>,
    use_default_data: bool,
    /// Frame fence value of the last frame that bound this buffer.
    pub last_fence_value: u64,
    /// Isolated fence value of the last copy into this buffer.
    pub isolated_fence_value: u64,
}

impl D3d12Buffer {
    /// Creates a buffer.
    ///
    /// ## Arguments
    /// * `frame_count` - Number of frame slots; dynamic buffers get one backing each.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the initial data exceeds the size.
    /// * `ResourceError::BackendError` - If a native allocation fails.
    pub fn create(
        native: &dyn NativeDevice,
        transfer: &mut TransferQueue,
        descriptor: &BufferDescriptor,
        frame_count: usize,
    ) -> Result<Self, ResourceError> {
        let capacity = match descriptor.buffer_type {
            BufferType::Uniform => align_up(descriptor.size, CONSTANT_BUFFER_ALIGNMENT),
            _ => descriptor.size,
        }
        .max(1);
        let initial = descriptor.initial_data.as_deref();
        if initial.is_some_and(|d| d.len() as u64 > capacity) {
            return Err(ResourceError::OutOfBounds);
        }

        let mut buffer = Self {
            buffer_type: descriptor.buffer_type,
            usage: descriptor.usage,
            size: descriptor.size,
            capacity,
            backings: Vec::new(),
            shadow: None,
            default_data: None,
            use_default_data: descriptor.retain_default_data,
            last_fence_value: 0,
            isolated_fence_value: 0,
        };

        match (descriptor.buffer_type, descriptor.usage) {
            (BufferType::PixelPack, _) => {
                buffer.backings.push(create_backing(
                    native,
                    HeapType::Readback,
                    capacity,
                    ResourceStates::COPY_DEST,
                )?);
            }
            (_, BufferUsage::Dynamic) => {
                for _ in 0..frame_count.max(1) {
                    buffer.backings.push(create_backing(
                        native,
                        HeapType::Upload,
                        capacity,
                        ResourceStates::GENERIC_READ,
                    )?);
                }
                buffer.shadow = Some(DynamicShadow {
                    contents: vec![0; capacity as usize],
                    generation: 0,
                    synced: vec![0; frame_count.max(1)],
                });
            }
            // Created lazily by the first update.
            (_, BufferUsage::Immutable) if initial.is_none() => {}
            _ => buffer.create_local_backing(native)?,
        }

        if let Some(data) = initial {
            buffer.update_sub_data(native, transfer, 0, 0, data)?;
            if buffer.use_default_data {
                buffer.default_data = Some(data.to_vec());
            }
        }
        log::debug!(
            "D3d12Buffer: created {:?}/{:?} buffer of {} bytes",
            buffer.buffer_type,
            buffer.usage,
            buffer.capacity
        );
        Ok(buffer)
    }

    fn create_local_backing(&mut self, native: &dyn NativeDevice) -> Result<(), ResourceError> {
        let steady = steady_state(self.buffer_type);
        self.backings
            .push(create_backing(native, HeapType::Default, self.capacity, steady)?);
        Ok(())
    }

    /// Writes `data` at `offset`. Empty writes are ignored.
    ///
    /// Static and immutable buffers are copied on the isolated list, which is
    /// submitted before the frame list that is being recorded. Draws recorded
    /// earlier in the same frame therefore read the new bytes too. Dynamic
    /// buffers write only the current frame slot's backing.
    ///
    /// ## Arguments
    /// * `frame_index` - Frame slot being recorded; selects the dynamic backing.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the write exceeds the capacity.
    /// * `ResourceError::BackendError` - If the buffer is GPU-written or the copy fails.
    pub fn update_sub_data(
        &mut self,
        native: &dyn NativeDevice,
        transfer: &mut TransferQueue,
        frame_index: usize,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        if data.is_empty() {
            return Ok(());
        }
        if offset
            .checked_add(data.len() as u64)
            .map_or(true, |end| end > self.capacity)
        {
            log::error!(
                "D3d12Buffer: write of {} bytes at {offset} exceeds capacity {}",
                data.len(),
                self.capacity
            );
            return Err(ResourceError::OutOfBounds);
        }
        if self.buffer_type == BufferType::PixelPack {
            return Err(ResourceError::BackendError(
                "pixel pack buffers are written by the GPU only".into(),
            ));
        }

        if let Some(shadow) = self.shadow.as_mut() {
            let slot = frame_index % self.backings.len();
            native
                .write_mapped(self.backings[slot], offset, data)
                .map_err(backend_error)?;
            shadow.contents[offset as usize..offset as usize + data.len()].copy_from_slice(data);
            shadow.generation += 1;
            // Only this slot saw every write so far if it was in sync before.
            let in_sync = shadow.synced[slot] + 1 == shadow.generation;
            shadow.synced[slot] = if in_sync { shadow.generation } else { shadow.synced[slot] };
            return Ok(());
        }

        if self.backings.is_empty() {
            self.create_local_backing(native)?;
        }
        self.isolated_fence_value = transfer.upload_buffer(
            self.backings[0],
            offset,
            data,
            steady_state(self.buffer_type),
        )?;
        Ok(())
    }

    /// Replaces the content from offset 0, remembering it as default data
    /// when default-data retention is on.
    ///
    /// ## Errors
    /// See [`update_sub_data`](Self::update_sub_data).
    pub fn update_data(
        &mut self,
        native: &dyn NativeDevice,
        transfer: &mut TransferQueue,
        frame_index: usize,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        self.update_sub_data(native, transfer, frame_index, 0, data)?;
        if self.use_default_data && !data.is_empty() {
            self.default_data = Some(data.to_vec());
        }
        Ok(())
    }

    /// Turns default-data retention on or off. Turning it off drops the copy.
    pub fn set_use_default_data(&mut self, enabled: bool) {
        self.use_default_data = enabled;
        if !enabled {
            self.default_data = None;
        }
    }

    /// Stores `data` as the content restored after a device reset.
    pub fn set_default_data(&mut self, data: &[u8]) {
        self.default_data = Some(data.to_vec());
    }

    /// Uploads the stored default data again.
    ///
    /// ## Errors
    /// * `ResourceError::NotFound` - If no default data is stored.
    pub fn restore_default_data(
        &mut self,
        native: &dyn NativeDevice,
        transfer: &mut TransferQueue,
        frame_index: usize,
    ) -> Result<(), ResourceError> {
        let data = self.default_data.take().ok_or(ResourceError::NotFound)?;
        let result = self.update_sub_data(native, transfer, frame_index, 0, &data);
        self.default_data = Some(data);
        result
    }

    /// Reads `len` bytes at `offset` from CPU-visible memory.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the range exceeds the capacity.
    /// * `ResourceError::BackendError` - If the buffer has no CPU-visible copy.
    pub fn read(
        &self,
        native: &dyn NativeDevice,
        frame_index: usize,
        offset: u64,
        len: u64,
    ) -> Result<Vec<u8>, ResourceError> {
        if offset.checked_add(len).map_or(true, |end| end > self.capacity) {
            return Err(ResourceError::OutOfBounds);
        }
        let mapped = match (self.buffer_type, &self.shadow) {
            (BufferType::PixelPack, _) => self.backings.first().copied(),
            (_, Some(_)) => self.backings.get(frame_index % self.backings.len()).copied(),
            _ => None,
        };
        if let Some(resource) = mapped {
            return native.read_mapped(resource, offset, len).map_err(backend_error);
        }
        self.default_data
            .as_deref()
            .and_then(|d| d.get(offset as usize..(offset + len) as usize))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ResourceError::BackendError("buffer has no CPU-visible copy".into()))
    }

    /// The backing bound by frame slot `frame_index`, bringing a stale
    /// dynamic backing up to date first. `None` if nothing was created yet.
    pub fn resource_for_frame(
        &mut self,
        native: &dyn NativeDevice,
        frame_index: usize,
    ) -> Option<ResourceHandle> {
        if self.backings.is_empty() {
            return None;
        }
        let slot = frame_index % self.backings.len();
        if let Some(shadow) = self.shadow.as_mut() {
            if shadow.synced[slot] != shadow.generation {
                match native.write_mapped(self.backings[slot], 0, &shadow.contents) {
                    Ok(()) => shadow.synced[slot] = shadow.generation,
                    Err(e) => log::error!("D3d12Buffer: failed to refresh frame backing: {e}"),
                }
            }
        }
        Some(self.backings[slot])
    }

    /// Every native resource owned by the buffer.
    pub fn backings(&self) -> &[ResourceHandle] {
        &self.backings
    }
}

fn create_backing(
    native: &dyn NativeDevice,
    heap: HeapType,
    size: u64,
    state: ResourceStates,
) -> Result<ResourceHandle, ResourceError> {
    native
        .create_committed_resource(heap, &ResourceDesc::buffer(size), state, None)
        .map_err(|e| {
            log::error!("D3d12Buffer: failed to create {heap:?} backing of {size} bytes: {e}");
            backend_error(e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::d3d12::native::HeadlessDevice;
    use std::sync::Arc;

    fn setup() -> (Arc<HeadlessDevice>, TransferQueue) {
        let device = Arc::new(HeadlessDevice::new());
        let transfer = TransferQueue::new(device.clone(), 1 << 16).unwrap();
        (device, transfer)
    }

    #[test]
    fn dynamic_sub_update_leaves_other_bytes_untouched() {
        // --- 1. ARRANGE ---
        let (device, mut transfer) = setup();
        let desc = BufferDescriptor::new(1024, BufferType::Vertex, BufferUsage::Dynamic);
        let mut buffer = D3d12Buffer::create(device.as_ref(), &mut transfer, &desc, 2).unwrap();
        let data: Vec<u8> = (0..512).map(|i| (i % 251) as u8).collect();

        // --- 2. ACT ---
        buffer
            .update_sub_data(device.as_ref(), &mut transfer, 0, 512, &data)
            .unwrap();
        let bytes = buffer.read(device.as_ref(), 0, 0, 1024).unwrap();

        // --- 3. ASSERT ---
        assert_eq!(&bytes[512..], &data[..]);
        assert!(bytes[..512].iter().all(|b| *b == 0));
        assert_eq!(device.executed_list_count(), 0);
    }

    #[test]
    fn wrapping_offsets_are_out_of_bounds() {
        let (device, mut transfer) = setup();
        let desc = BufferDescriptor::new(64, BufferType::Vertex, BufferUsage::Dynamic);
        let mut buffer = D3d12Buffer::create(device.as_ref(), &mut transfer, &desc, 1).unwrap();

        assert!(matches!(
            buffer.update_sub_data(device.as_ref(), &mut transfer, 0, u64::MAX - 4, &[1; 8]),
            Err(ResourceError::OutOfBounds)
        ));
        assert!(matches!(
            buffer.read(device.as_ref(), 0, u64::MAX, 2),
            Err(ResourceError::OutOfBounds)
        ));
    }

    #[test]
    fn stale_dynamic_backing_is_refreshed_on_bind() {
        let (device, mut transfer) = setup();
        let desc = BufferDescriptor::new(16, BufferType::Uniform, BufferUsage::Dynamic);
        let mut buffer = D3d12Buffer::create(device.as_ref(), &mut transfer, &desc, 2).unwrap();
        assert_eq!(buffer.capacity, 256);

        buffer
            .update_sub_data(device.as_ref(), &mut transfer, 0, 0, &[7; 16])
            .unwrap();
        let second = buffer.resource_for_frame(device.as_ref(), 1).unwrap();
        assert_eq!(&device.buffer_contents(second).unwrap()[..16], &[7; 16]);
        assert_ne!(Some(second), buffer.resource_for_frame(device.as_ref(), 0));
    }

    #[test]
    fn static_updates_are_copied_through_the_ring() {
        let (device, mut transfer) = setup();
        let desc = BufferDescriptor::new(8, BufferType::Index, BufferUsage::Static)
            .with_data(&[1u8, 2, 3, 4, 5, 6, 7, 8][..]);
        let mut buffer = D3d12Buffer::create(device.as_ref(), &mut transfer, &desc, 2).unwrap();
        let resource = buffer.resource_for_frame(device.as_ref(), 0).unwrap();

        assert_eq!(
            device.buffer_contents(resource).unwrap(),
            vec![1, 2, 3, 4, 5, 6, 7, 8]
        );
        assert_eq!(buffer.isolated_fence_value, 1);
        assert!(buffer.read(device.as_ref(), 0, 0, 8).is_err());
        assert!(matches!(
            buffer.update_sub_data(device.as_ref(), &mut transfer, 0, 4, &[0; 8]),
            Err(ResourceError::OutOfBounds)
        ));
    }

    #[test]
    fn immutable_without_data_allocates_on_first_update() {
        let (device, mut transfer) = setup();
        let live_before = device.live_resource_count();
        let desc = BufferDescriptor::new(4, BufferType::Vertex, BufferUsage::Immutable);
        let mut buffer = D3d12Buffer::create(device.as_ref(), &mut transfer, &desc, 2).unwrap();
        assert!(buffer.backings().is_empty());
        assert_eq!(device.live_resource_count(), live_before);

        buffer
            .update_data(device.as_ref(), &mut transfer, 0, &[1, 2, 3, 4])
            .unwrap();
        assert_eq!(buffer.backings().len(), 1);
    }

    #[test]
    fn default_data_is_kept_and_restored() {
        let (device, mut transfer) = setup();
        let mut desc = BufferDescriptor::new(4, BufferType::Vertex, BufferUsage::Static);
        desc.retain_default_data = true;
        let mut buffer = D3d12Buffer::create(device.as_ref(), &mut transfer, &desc, 2).unwrap();

        buffer
            .update_data(device.as_ref(), &mut transfer, 0, &[4, 3, 2, 1])
            .unwrap();
        assert_eq!(buffer.read(device.as_ref(), 0, 0, 4).unwrap(), vec![4, 3, 2, 1]);
        buffer
            .restore_default_data(device.as_ref(), &mut transfer, 0)
            .unwrap();

        buffer.set_use_default_data(false);
        assert!(matches!(
            buffer.restore_default_data(device.as_ref(), &mut transfer, 0),
            Err(ResourceError::NotFound)
        ));
    }
}
