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

//! Staged copies from CPU memory into GPU-local resources.
//!
//! Every copy stages its bytes in the upload ring, tagged with the fence value
//! of the isolated submission that will consume them, and records the copy
//! with the surrounding state transitions on the isolated list.
//!
//! The isolated list executes as soon as a copy is recorded, ahead of the
//! frame list still being recorded. A mid-frame update of a GPU-local
//! resource is visible to every draw of that frame, including earlier ones.

use super::format;
use super::native::{
    Barrier, CommandList, DxgiFormat, NativeCommand, NativeDevice, NativeError, PlacedFootprint,
    ResourceHandle, ResourceStates, TextureCopyLocation,
};
use super::submission::IsolatedSubmission;
use super::upload_allocator::{UploadAllocation, UploadBufferAllocator};
use std::sync::Arc;
use vesper_core::renderer::ResourceError;

pub(crate) fn backend_error(err: NativeError) -> ResourceError {
    ResourceError::BackendError(err.to_string())
}

/// A staged texture region ready to be copied.
#[derive(Debug, Clone, Copy)]
pub struct StagedImage {
    /// Upload resource holding the rows.
    pub resource: ResourceHandle,
    /// Layout of the rows in that resource.
    pub footprint: PlacedFootprint,
}

impl StagedImage {
    /// The copy source location.
    pub fn location(&self) -> TextureCopyLocation {
        TextureCopyLocation::Footprint {
            resource: self.resource,
            footprint: self.footprint,
        }
    }
}

/// Upload ring plus the isolated submission consuming it.
#[derive(Debug)]
pub struct TransferQueue {
    ring: UploadBufferAllocator,
    isolated: IsolatedSubmission,
}

impl TransferQueue {
    /// Creates the ring and the isolated submission.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If the ring or the fence cannot be created.
    pub fn new(native: Arc<dyn NativeDevice>, ring_size: u64) -> Result<Self, ResourceError> {
        Ok(Self {
            ring: UploadBufferAllocator::new(native.clone(), ring_size)?,
            isolated: IsolatedSubmission::new(native).map_err(backend_error)?,
        })
    }

    /// Opens the isolated list, reclaiming ring space the GPU is done with.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If waiting on the previous submission fails.
    pub fn list(&mut self) -> Result<&mut CommandList, ResourceError> {
        self.isolated.begin().map_err(backend_error)?;
        self.ring.retire(self.isolated.completed_value());
        // Already recording, so this returns the open list without waiting.
        self.isolated.begin().map_err(backend_error)
    }

    /// Copies `data` into the ring for the open submission.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If a one-off staging buffer cannot be created.
    pub fn stage(&mut self, data: &[u8], alignment: u64) -> Result<UploadAllocation, ResourceError> {
        self.list()?;
        let allocation =
            self.ring
                .alloc_bytes(data.len() as u64, alignment, self.isolated.pending_value())?;
        self.ring.write(&allocation, data)?;
        Ok(allocation)
    }

    /// Stages a tightly packed `width x height` image with pitched rows.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If `data` is shorter than the image.
    pub fn stage_image(
        &mut self,
        format: DxgiFormat,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<StagedImage, ResourceError> {
        let layout = format::footprint(format, width, height, 0);
        let row_size = layout.row_size as usize;
        let rows = layout.row_count as usize;
        if data.len() < row_size * rows {
            return Err(ResourceError::OutOfBounds);
        }
        let mut pitched = vec![0u8; layout.total_bytes() as usize];
        for (row, chunk) in data.chunks_exact(row_size).take(rows).enumerate() {
            let start = row * layout.row_pitch as usize;
            pitched[start..start + row_size].copy_from_slice(chunk);
        }
        let allocation = self.stage(&pitched, format::TEXTURE_DATA_PLACEMENT_ALIGNMENT)?;
        Ok(StagedImage {
            resource: allocation.resource,
            footprint: PlacedFootprint {
                offset: allocation.offset,
                ..layout
            },
        })
    }

    /// Copies `data` into a buffer at `offset`, transitioning it from and back
    /// to `steady`. Returns the isolated fence value that completes the copy.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If staging or submission fails.
    pub fn upload_buffer(
        &mut self,
        dst: ResourceHandle,
        offset: u64,
        data: &[u8],
        steady: ResourceStates,
    ) -> Result<u64, ResourceError> {
        let staged = self.stage(data, 4)?;
        let list = self.list()?;
        list.barriers([Barrier::transition(dst, steady, ResourceStates::COPY_DEST)]);
        list.record(NativeCommand::CopyBufferRegion {
            dst,
            dst_offset: offset,
            src: staged.resource,
            src_offset: staged.offset,
            size: data.len() as u64,
        });
        list.barriers([Barrier::transition(dst, ResourceStates::COPY_DEST, steady)]);
        self.submit(false)
    }

    /// Executes the open list. Returns the signaled fence value.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If execution or waiting fails.
    pub fn submit(&mut self, wait: bool) -> Result<u64, ResourceError> {
        let value = self.isolated.submit(wait).map_err(backend_error)?;
        if wait {
            self.ring.retire(value);
        }
        Ok(value)
    }

    /// The isolated submission, for fencing work recorded elsewhere.
    pub fn isolated(&mut self) -> &mut IsolatedSubmission {
        &mut self.isolated
    }

    /// Last isolated fence value the GPU completed.
    pub fn completed_value(&self) -> u64 {
        self.isolated.completed_value()
    }

    /// Blocks until the isolated fence reaches `value`.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If the wait fails.
    pub fn wait_for(&self, value: u64) -> Result<(), ResourceError> {
        self.isolated.wait_for(value).map_err(backend_error)
    }

    /// Submits pending work, waits for all of it and empties the ring.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If submission or waiting fails.
    pub fn wait_idle(&mut self) -> Result<(), ResourceError> {
        self.isolated.submit(false).map_err(backend_error)?;
        self.isolated.wait_idle().map_err(backend_error)?;
        self.ring.retire_sync();
        Ok(())
    }

    /// Bytes reserved in the upload ring.
    pub fn ring_used_bytes(&self) -> u64 {
        self.ring.used_bytes()
    }
}
