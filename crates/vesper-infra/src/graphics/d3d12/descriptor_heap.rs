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

//! Growable descriptor heap allocator.
//!
//! Slots are handed out from fixed-capacity blocks of one native heap each.
//! A free-bit scan finds the first free slot across blocks; when every block
//! is full and growth is allowed, one more block is created whose capacity
//! doubles the total (never fewer than 64 slots).

use super::native::{
    CpuDescriptor, DescriptorHeapKind, GpuDescriptor, NativeDevice, NativeHeap,
};
use std::sync::Arc;
use vesper_core::renderer::ResourceError;

const MIN_GROWTH: u32 = 64;

/// A descriptor slot inside a specific heap block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHandle {
    /// Block the slot belongs to.
    pub block: u32,
    /// Slot index inside the block.
    pub slot: u32,
    /// CPU address of the slot.
    pub cpu: CpuDescriptor,
    /// GPU address of the slot, for shader-visible heaps.
    pub gpu: Option<GpuDescriptor>,
}

/// Occupancy figures of an allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    /// Number of native heap blocks.
    pub blocks: u32,
    /// Total slots across blocks.
    pub capacity: u32,
    /// Live slots.
    pub used: u32,
}

#[derive(Debug)]
struct HeapBlock {
    heap: NativeHeap,
    capacity: u32,
    free_bits: Vec<u64>,
    used: u32,
}

impl HeapBlock {
    fn new(heap: NativeHeap, capacity: u32) -> Self {
        let words = capacity.div_ceil(64) as usize;
        let mut free_bits = vec![u64::MAX; words];
        // Bits past the capacity in the last word are never free.
        let tail = capacity % 64;
        if tail != 0 {
            if let Some(last) = free_bits.last_mut() {
                *last = (1u64 << tail) - 1;
            }
        }
        Self {
            heap,
            capacity,
            free_bits,
            used: 0,
        }
    }

    fn take_free_slot(&mut self) -> Option<u32> {
        let (word_index, word) = self
            .free_bits
            .iter_mut()
            .enumerate()
            .find(|(_, w)| **w != 0)?;
        let bit = word.trailing_zeros();
        *word &= !(1u64 << bit);
        self.used += 1;
        Some(word_index as u32 * 64 + bit)
    }

    fn release_slot(&mut self, slot: u32) -> bool {
        let word = &mut self.free_bits[(slot / 64) as usize];
        let mask = 1u64 << (slot % 64);
        if *word & mask != 0 {
            return false;
        }
        *word |= mask;
        self.used -= 1;
        true
    }
}

/// Hands out stable descriptor slots from growable heap blocks.
#[derive(Debug)]
pub struct DescriptorHeapAllocator {
    native: Arc<dyn NativeDevice>,
    kind: DescriptorHeapKind,
    shader_visible: bool,
    allow_grow: bool,
    label: &'static str,
    blocks: Vec<HeapBlock>,
}

impl DescriptorHeapAllocator {
    /// Creates an allocator with one block of `capacity` slots.
    ///
    /// ## Arguments
    /// * `label` - Heap name used in logs and in `OutOfDescriptors` errors.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If the native heap cannot be created.
    pub fn new(
        native: Arc<dyn NativeDevice>,
        kind: DescriptorHeapKind,
        capacity: u32,
        shader_visible: bool,
        allow_grow: bool,
        label: &'static str,
    ) -> Result<Self, ResourceError> {
        let mut allocator = Self {
            native,
            kind,
            shader_visible,
            allow_grow,
            label,
            blocks: Vec::new(),
        };
        allocator.add_block(capacity.max(1))?;
        Ok(allocator)
    }

    fn add_block(&mut self, capacity: u32) -> Result<(), ResourceError> {
        let heap = self
            .native
            .create_descriptor_heap(self.kind, capacity, self.shader_visible)
            .map_err(|e| ResourceError::BackendError(e.to_string()))?;
        log::debug!(
            "DescriptorHeapAllocator: '{}' heap block {} created with {} slots",
            self.label,
            self.blocks.len(),
            capacity
        );
        self.blocks.push(HeapBlock::new(heap, capacity));
        Ok(())
    }

    /// Allocates a slot, growing by one block if allowed.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfDescriptors` - If every block is full and growth is disabled.
    pub fn allocate(&mut self) -> Result<DescriptorHandle, ResourceError> {
        if let Some(handle) = self.try_allocate() {
            return Ok(handle);
        }
        if !self.allow_grow {
            log::error!("DescriptorHeapAllocator: '{}' heap is exhausted", self.label);
            return Err(ResourceError::OutOfDescriptors { heap: self.label });
        }
        let total = self.stats().capacity;
        self.add_block(total.max(MIN_GROWTH))?;
        self.try_allocate()
            .ok_or(ResourceError::OutOfDescriptors { heap: self.label })
    }

    fn try_allocate(&mut self) -> Option<DescriptorHandle> {
        self.blocks
            .iter_mut()
            .enumerate()
            .find_map(|(block_index, block)| {
                let slot = block.take_free_slot()?;
                Some(DescriptorHandle {
                    block: block_index as u32,
                    slot,
                    cpu: block.heap.cpu_start.offset(slot, block.heap.increment),
                    gpu: block
                        .heap
                        .gpu_start
                        .map(|gpu| gpu.offset(slot, block.heap.increment)),
                })
            })
    }

    /// Returns a slot to its block. Releasing a free slot is ignored.
    pub fn deallocate(&mut self, handle: DescriptorHandle) {
        let released = self
            .blocks
            .get_mut(handle.block as usize)
            .filter(|block| handle.slot < block.capacity)
            .map(|block| block.release_slot(handle.slot));
        match released {
            Some(true) => {}
            Some(false) => log::debug!(
                "DescriptorHeapAllocator: ignoring double free of {}:{} in '{}'",
                handle.block,
                handle.slot,
                self.label
            ),
            None => log::warn!(
                "DescriptorHeapAllocator: handle {}:{} does not belong to '{}'",
                handle.block,
                handle.slot,
                self.label
            ),
        }
    }

    /// Enables or disables growth.
    pub fn set_allow_grow(&mut self, allow: bool) {
        self.allow_grow = allow;
    }

    /// Current occupancy.
    pub fn stats(&self) -> HeapStats {
        self.blocks.iter().fold(HeapStats::default(), |mut stats, block| {
            stats.blocks += 1;
            stats.capacity += block.capacity;
            stats.used += block.used;
            stats
        })
    }

    /// Native heap of block `index`.
    pub fn block_heap(&self, index: u32) -> Option<&NativeHeap> {
        self.blocks.get(index as usize).map(|b| &b.heap)
    }
}

/// The CPU-only heaps resource views are created in.
#[derive(Debug)]
pub struct DescriptorHeapSet {
    /// Shader resource views of textures.
    pub srv: DescriptorHeapAllocator,
    /// Render target views.
    pub rtv: DescriptorHeapAllocator,
    /// Depth/stencil views.
    pub dsv: DescriptorHeapAllocator,
}

impl DescriptorHeapSet {
    /// Creates the three growable heaps.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If a native heap cannot be created.
    pub fn new(
        native: &Arc<dyn NativeDevice>,
        srv_capacity: u32,
        rtv_capacity: u32,
        dsv_capacity: u32,
    ) -> Result<Self, ResourceError> {
        Ok(Self {
            srv: DescriptorHeapAllocator::new(
                native.clone(),
                DescriptorHeapKind::CbvSrvUav,
                srv_capacity,
                false,
                true,
                "srv",
            )?,
            rtv: DescriptorHeapAllocator::new(
                native.clone(),
                DescriptorHeapKind::Rtv,
                rtv_capacity,
                false,
                true,
                "rtv",
            )?,
            dsv: DescriptorHeapAllocator::new(
                native.clone(),
                DescriptorHeapKind::Dsv,
                dsv_capacity,
                false,
                true,
                "dsv",
            )?,
        })
    }
}

impl Drop for DescriptorHeapAllocator {
    fn drop(&mut self) {
        for block in self.blocks.drain(..) {
            self.native.release_descriptor_heap(block.heap.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::d3d12::native::HeadlessDevice;
    use std::collections::HashSet;

    fn allocator(capacity: u32, allow_grow: bool) -> DescriptorHeapAllocator {
        let native: Arc<dyn NativeDevice> = Arc::new(HeadlessDevice::new());
        DescriptorHeapAllocator::new(
            native,
            DescriptorHeapKind::CbvSrvUav,
            capacity,
            false,
            allow_grow,
            "srv",
        )
        .unwrap()
    }

    #[test]
    fn live_handles_never_share_a_slot() {
        // --- 1. ARRANGE ---
        let mut heap = allocator(8, true);
        let mut live = Vec::new();

        // --- 2. ACT ---
        for round in 0..100 {
            live.push(heap.allocate().unwrap());
            if round % 3 == 0 {
                let freed = live.remove(round % live.len());
                heap.deallocate(freed);
            }
        }

        // --- 3. ASSERT ---
        let unique: HashSet<(u32, u32)> = live.iter().map(|h| (h.block, h.slot)).collect();
        assert_eq!(unique.len(), live.len());
        let cpu: HashSet<CpuDescriptor> = live.iter().map(|h| h.cpu).collect();
        assert_eq!(cpu.len(), live.len());
        assert_eq!(heap.stats().used as usize, live.len());
    }

    #[test]
    fn freed_slot_is_reused() {
        let mut heap = allocator(4, false);
        let _a = heap.allocate().unwrap();
        let b = heap.allocate().unwrap();
        heap.deallocate(b);
        let c = heap.allocate().unwrap();
        assert_eq!((c.block, c.slot), (b.block, b.slot));
    }

    #[test]
    fn exhaustion_without_growth_is_an_error() {
        let mut heap = allocator(2, false);
        heap.allocate().unwrap();
        heap.allocate().unwrap();
        assert!(matches!(
            heap.allocate(),
            Err(ResourceError::OutOfDescriptors { heap: "srv" })
        ));

        heap.set_allow_grow(true);
        let grown = heap.allocate().unwrap();
        assert_eq!(grown.block, 1);
        assert_eq!(
            heap.stats(),
            HeapStats {
                blocks: 2,
                capacity: 2 + 64,
                used: 3
            }
        );
    }

    #[test]
    fn double_free_is_ignored() {
        let mut heap = allocator(4, false);
        let a = heap.allocate().unwrap();
        heap.deallocate(a);
        heap.deallocate(a);
        assert_eq!(heap.stats().used, 0);
        // The slot is handed out once, not twice.
        let first = heap.allocate().unwrap();
        let second = heap.allocate().unwrap();
        assert_ne!(first.slot, second.slot);
    }
}
