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

//! Interned samplers in the shader-visible sampler heap.
//!
//! Samplers are keyed by [`SamplerDesc::key`], so equal descriptions share one
//! heap slot. The builtins occupy the first [`SamplerIndex::COUNT`] slots in
//! registration order, which lets shaders declare them at fixed registers.
//! The heap never grows and slots are never released.

use super::conversions::IntoD3d12;
use super::native::{CpuDescriptor, DescriptorHeapKind, GpuDescriptor, NativeDevice, NativeHeap};
use super::transfer::backend_error;
use ahash::AHashMap;
use std::sync::Arc;
use vesper_core::renderer::{ResourceError, SamplerDesc, SamplerHandle, SamplerIndex};

/// The sampler registry.
#[derive(Debug)]
pub struct SamplerCache {
    native: Arc<dyn NativeDevice>,
    heap: NativeHeap,
    capacity: u32,
    by_key: AHashMap<u32, SamplerHandle>,
    descs: Vec<SamplerDesc>,
}

impl SamplerCache {
    /// Creates the heap and registers the builtin samplers.
    ///
    /// ## Errors
    /// * `ResourceError::BackendError` - If the heap cannot be created.
    /// * `ResourceError::OutOfDescriptors` - If `capacity` cannot hold the builtins.
    pub fn new(native: Arc<dyn NativeDevice>, capacity: u32) -> Result<Self, ResourceError> {
        let heap = native
            .create_descriptor_heap(DescriptorHeapKind::Sampler, capacity, true)
            .map_err(backend_error)?;
        let mut cache = Self {
            native,
            heap,
            capacity,
            by_key: AHashMap::default(),
            descs: Vec::with_capacity(SamplerIndex::COUNT),
        };
        for index in SamplerIndex::ALL {
            let handle = cache.get_or_create(&index.desc())?;
            debug_assert_eq!(handle, SamplerHandle::from(index));
        }
        log::debug!(
            "SamplerCache: {} builtin samplers registered, capacity {}",
            SamplerIndex::COUNT,
            capacity
        );
        Ok(cache)
    }

    /// Returns the slot of `desc`, creating the native sampler on first use.
    ///
    /// ## Errors
    /// * `ResourceError::OutOfDescriptors` - If the registry is full.
    pub fn get_or_create(&mut self, desc: &SamplerDesc) -> Result<SamplerHandle, ResourceError> {
        let key = desc.key();
        if let Some(handle) = self.by_key.get(&key) {
            return Ok(*handle);
        }
        let slot = self.descs.len() as u32;
        if slot >= self.capacity {
            log::error!(
                "SamplerCache: registry exhausted at {} samplers (key {key:#x})",
                self.capacity
            );
            return Err(ResourceError::OutOfDescriptors { heap: "sampler" });
        }
        let handle = SamplerHandle(slot);
        self.native
            .create_sampler(&desc.into_d3d12(), self.cpu(handle));
        self.by_key.insert(key, handle);
        self.descs.push(*desc);
        Ok(handle)
    }

    /// The description registered at `handle`.
    pub fn desc(&self, handle: SamplerHandle) -> Option<&SamplerDesc> {
        self.descs.get(handle.0 as usize)
    }

    /// Number of registered samplers.
    pub fn len(&self) -> usize {
        self.descs.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    /// CPU address of a slot.
    pub fn cpu(&self, handle: SamplerHandle) -> CpuDescriptor {
        self.heap.cpu_start.offset(handle.0, self.heap.increment)
    }

    /// GPU address of the first slot, bound as the sampler table base.
    pub fn gpu_start(&self) -> Option<GpuDescriptor> {
        self.heap.gpu_start
    }

    /// The native heap, bound next to the frame's SRV heap.
    pub fn heap(&self) -> &NativeHeap {
        &self.heap
    }
}

impl Drop for SamplerCache {
    fn drop(&mut self) {
        self.native.release_descriptor_heap(self.heap.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::d3d12::native::{DescriptorContent, Filter, HeadlessDevice};
    use vesper_core::renderer::{AddressMode, MinFilter};

    #[test]
    fn builtins_take_the_first_slots() {
        // --- 1. ARRANGE ---
        let device = Arc::new(HeadlessDevice::new());

        // --- 2. ACT ---
        let cache = SamplerCache::new(device.clone(), 256).unwrap();

        // --- 3. ASSERT ---
        assert_eq!(cache.len(), SamplerIndex::COUNT);
        let aniso = SamplerHandle::from(SamplerIndex::AnisoClamp);
        match device.descriptor(cache.cpu(aniso)) {
            Some(DescriptorContent::Sampler(desc)) => {
                assert_eq!(desc.filter, Filter::ANISOTROPIC);
                assert_eq!(desc.max_anisotropy, 16);
            }
            other => panic!("unexpected descriptor {other:?}"),
        }
    }

    #[test]
    fn equal_descriptions_share_a_slot() {
        let device = Arc::new(HeadlessDevice::new());
        let mut cache = SamplerCache::new(device, 256).unwrap();

        let builtin = cache.get_or_create(&SamplerIndex::PointWrap.desc()).unwrap();
        assert_eq!(builtin, SamplerHandle::from(SamplerIndex::PointWrap));

        let custom = SamplerDesc {
            min_filter: MinFilter::Nearest,
            ..SamplerDesc::default().with_address(AddressMode::Border)
        };
        let first = cache.get_or_create(&custom).unwrap();
        let second = cache.get_or_create(&custom).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.0 as usize, SamplerIndex::COUNT);
        assert_eq!(cache.desc(first), Some(&custom));
    }

    #[test]
    fn full_registry_reports_exhaustion() {
        // --- 1. ARRANGE ---
        let device = Arc::new(HeadlessDevice::new());
        let mut cache = SamplerCache::new(device, SamplerIndex::COUNT as u32 + 1).unwrap();
        let extra = SamplerDesc {
            max_anisotropy: 3,
            min_filter: MinFilter::Anisotropic,
            ..SamplerDesc::default()
        };
        cache.get_or_create(&extra).unwrap();

        // --- 2. ACT ---
        let overflow = cache.get_or_create(&SamplerDesc {
            max_anisotropy: 4,
            ..extra
        });

        // --- 3. ASSERT ---
        assert!(matches!(
            overflow,
            Err(ResourceError::OutOfDescriptors { heap: "sampler" })
        ));
        assert!(SamplerCache::new(Arc::new(HeadlessDevice::new()), 4).is_err());
    }
}
