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

//! Fence-gated disposal of GPU objects.
//!
//! Destroyed resources and views are queued with the frame fence value of
//! the last frame that referenced them. They are released only once the GPU
//! has completed that value, so nothing a submitted command list can still
//! touch is ever freed.

use super::descriptor_heap::{DescriptorHandle, DescriptorHeapSet};
use super::native::{NativeDevice, PipelineHandle, ResourceHandle, RootSignatureHandle};

/// An object awaiting release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposable {
    /// A committed resource.
    Resource(ResourceHandle),
    /// A shader resource view slot.
    Srv(DescriptorHandle),
    /// A render target view slot.
    Rtv(DescriptorHandle),
    /// A depth/stencil view slot.
    Dsv(DescriptorHandle),
    /// An evicted pipeline state object.
    Pipeline(PipelineHandle),
    /// An evicted root signature.
    RootSignature(RootSignatureHandle),
}

/// Objects waiting for their fence value to complete.
#[derive(Debug, Default)]
pub struct DisposalQueue {
    pending: Vec<(u64, Disposable)>,
}

impl DisposalQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `item`, releasable once `fence_value` has completed.
    pub fn push(&mut self, fence_value: u64, item: Disposable) {
        self.pending.push((fence_value, item));
    }

    /// Number of queued objects.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns every item whose fence value is at most `completed`.
    pub fn take_ready(&mut self, completed: u64) -> Vec<Disposable> {
        let mut ready = Vec::new();
        self.pending.retain(|(value, item)| {
            if *value <= completed {
                ready.push(*item);
                false
            } else {
                true
            }
        });
        ready
    }

    /// Releases every item whose fence value is at most `completed`.
    /// Returns the number of released items.
    pub fn process(
        &mut self,
        completed: u64,
        native: &dyn NativeDevice,
        heaps: &mut DescriptorHeapSet,
    ) -> usize {
        let ready = self.take_ready(completed);
        let count = ready.len();
        for item in ready {
            release(item, native, heaps);
        }
        if count > 0 {
            log::trace!("DisposalQueue: released {count} objects (completed fence {completed})");
        }
        count
    }

    /// Releases everything. The caller has waited for the GPU to go idle.
    pub fn process_all(&mut self, native: &dyn NativeDevice, heaps: &mut DescriptorHeapSet) -> usize {
        self.process(u64::MAX, native, heaps)
    }
}

fn release(item: Disposable, native: &dyn NativeDevice, heaps: &mut DescriptorHeapSet) {
    match item {
        Disposable::Resource(resource) => native.release_resource(resource),
        Disposable::Srv(handle) => heaps.srv.deallocate(handle),
        Disposable::Rtv(handle) => heaps.rtv.deallocate(handle),
        Disposable::Dsv(handle) => heaps.dsv.deallocate(handle),
        Disposable::Pipeline(pipeline) => native.release_pipeline(pipeline),
        Disposable::RootSignature(root) => native.release_root_signature(root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::d3d12::native::{
        HeadlessDevice, HeapType, ResourceDesc, ResourceStates,
    };
    use std::sync::Arc;

    #[test]
    fn release_waits_for_the_recorded_fence_value() {
        // --- 1. ARRANGE ---
        let device = Arc::new(HeadlessDevice::new());
        device.set_manual_fences(true);
        let native: Arc<dyn NativeDevice> = device.clone();
        let mut heaps = DescriptorHeapSet::new(&native, 8, 8, 8).unwrap();
        let fence = device.create_fence(0).unwrap();
        let resource = device
            .create_committed_resource(
                HeapType::Default,
                &ResourceDesc::buffer(64),
                ResourceStates::COMMON,
                None,
            )
            .unwrap();
        let mut queue = DisposalQueue::new();
        queue.push(2, Disposable::Resource(resource));

        // --- 2. ACT & ASSERT ---
        device.signal(fence, 1).unwrap();
        device.signal(fence, 2).unwrap();
        device.wait(fence, 1).unwrap();
        let completed = device.completed_value(fence);
        assert_eq!(completed, 1);
        assert_eq!(queue.process(completed, device.as_ref(), &mut heaps), 0);
        assert!(device.is_live(resource));
        assert!(device.released_resources().is_empty());

        device.complete_all_fences();
        let completed = device.completed_value(fence);
        assert_eq!(queue.process(completed, device.as_ref(), &mut heaps), 1);
        assert_eq!(device.released_resources(), vec![resource]);
        assert!(queue.is_empty());
    }

    #[test]
    fn descriptors_return_to_their_heap() {
        let native: Arc<dyn NativeDevice> = Arc::new(HeadlessDevice::new());
        let mut heaps = DescriptorHeapSet::new(&native, 4, 4, 4).unwrap();
        let srv = heaps.srv.allocate().unwrap();
        let rtv = heaps.rtv.allocate().unwrap();

        let mut queue = DisposalQueue::new();
        queue.push(5, Disposable::Srv(srv));
        queue.push(3, Disposable::Rtv(rtv));

        assert_eq!(queue.process(3, native.as_ref(), &mut heaps), 1);
        assert_eq!(heaps.rtv.stats().used, 0);
        assert_eq!(heaps.srv.stats().used, 1);

        assert_eq!(queue.process_all(native.as_ref(), &mut heaps), 1);
        assert_eq!(heaps.srv.stats().used, 0);
    }
}
