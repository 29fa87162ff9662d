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

//! Id-keyed storage for backend objects.

use ahash::AHashMap;

/// Objects addressed by the `usize` inside the RHI's opaque ids.
///
/// Ids start at 1 and are never reused, so a stale id from a destroyed
/// object can never alias a newer one.
#[derive(Debug)]
pub struct Registry<T> {
    items: AHashMap<usize, T>,
    next_id: usize,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            items: AHashMap::new(),
            next_id: 1,
        }
    }
}

impl<T> Registry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `item` and returns its id.
    pub fn insert(&mut self, item: T) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, item);
        id
    }

    /// The object stored under `id`.
    pub fn get(&self, id: usize) -> Option<&T> {
        self.items.get(&id)
    }

    /// Mutable access to the object stored under `id`.
    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.items.get_mut(&id)
    }

    /// Removes and returns the object stored under `id`.
    pub fn remove(&mut self, id: usize) -> Option<T> {
        self.items.remove(&id)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Removes and returns every object.
    pub fn drain(&mut self) -> impl Iterator<Item = (usize, T)> + '_ {
        self.items.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_never_reused() {
        let mut registry = Registry::new();
        let first = registry.insert("a");
        assert_eq!(first, 1);
        assert_eq!(registry.remove(first), Some("a"));
        let second = registry.insert("b");
        assert_ne!(first, second);
        assert!(registry.get(first).is_none());
        assert_eq!(registry.len(), 1);
    }
}
