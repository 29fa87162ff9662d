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

//! Per-frame command buckets.

use super::command::RenderCommand;

/// The five buckets of a [`RenderQueue`], in the order they are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueGroup {
    /// Global order below zero, sorted ascending.
    NegativeZ = 0,
    /// Opaque 3D commands at global order zero, in submission order.
    Opaque3D = 1,
    /// Transparent 3D commands at global order zero, farthest first.
    Transparent3D = 2,
    /// 2D commands at global order zero, in submission order.
    ZeroZ = 3,
    /// Global order above zero, sorted ascending.
    PositiveZ = 4,
}

impl QueueGroup {
    /// Every bucket in draw order.
    pub const ALL: [QueueGroup; 5] = [
        QueueGroup::NegativeZ,
        QueueGroup::Opaque3D,
        QueueGroup::Transparent3D,
        QueueGroup::ZeroZ,
        QueueGroup::PositiveZ,
    ];

    /// The bucket a command belongs to.
    pub fn of(command: &RenderCommand) -> Self {
        let z = command.global_order();
        if z < 0.0 {
            QueueGroup::NegativeZ
        } else if z > 0.0 {
            QueueGroup::PositiveZ
        } else if !command.is_3d() {
            QueueGroup::ZeroZ
        } else if command.is_transparent() {
            QueueGroup::Transparent3D
        } else {
            QueueGroup::Opaque3D
        }
    }
}

/// The commands of one frame, split into [`QueueGroup`] buckets.
///
/// Buckets are cleared, not freed, between frames so steady-state frames do
/// not allocate.
#[derive(Debug, Default)]
pub struct RenderQueue {
    buckets: [Vec<RenderCommand>; 5],
}

impl RenderQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command to its bucket.
    pub fn push(&mut self, command: RenderCommand) {
        self.buckets[QueueGroup::of(&command) as usize].push(command);
    }

    /// Stable-sorts the Z buckets by global order and the transparent bucket
    /// by depth, farthest first. Opaque and zero-Z commands keep their order.
    pub fn sort(&mut self) {
        self.buckets[QueueGroup::Transparent3D as usize]
            .sort_by(|a, b| b.depth().total_cmp(&a.depth()));
        self.buckets[QueueGroup::NegativeZ as usize]
            .sort_by(|a, b| a.global_order().total_cmp(&b.global_order()));
        self.buckets[QueueGroup::PositiveZ as usize]
            .sort_by(|a, b| a.global_order().total_cmp(&b.global_order()));
    }

    /// The commands of one bucket.
    pub fn bucket(&self, group: QueueGroup) -> &[RenderCommand] {
        &self.buckets[group as usize]
    }

    pub(crate) fn take_bucket(&mut self, group: QueueGroup) -> Vec<RenderCommand> {
        std::mem::take(&mut self.buckets[group as usize])
    }

    pub(crate) fn restore_bucket(&mut self, group: QueueGroup, mut bucket: Vec<RenderCommand>) {
        bucket.clear();
        self.buckets[group as usize] = bucket;
    }

    /// Total number of commands.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Returns `true` if no command is queued.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Drops every command, keeping the bucket allocations.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    /// Clears the queue and reserves `capacity` commands per bucket.
    pub fn realloc(&mut self, capacity: usize) {
        for bucket in &mut self.buckets {
            bucket.clear();
            bucket.reserve(capacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::command::{GroupCommand, RenderCommand};

    fn tagged(z: f32, tag: usize) -> RenderCommand {
        RenderCommand::group(GroupCommand::new(tag), z)
    }

    fn tags(queue: &RenderQueue, group: QueueGroup) -> Vec<usize> {
        queue
            .bucket(group)
            .iter()
            .map(|c| match c.kind() {
                crate::render_lane::CommandKind::Group(g) => g.queue_id(),
                _ => usize::MAX,
            })
            .collect()
    }

    #[test]
    fn zero_order_commands_are_routed_by_flags() {
        // --- 1. ARRANGE ---
        let mut queue = RenderQueue::new();

        // --- 2. ACT ---
        queue.push(tagged(0.0, 1));
        queue.push(tagged(0.0, 2).with_depth(1.0));
        queue.push(tagged(0.0, 3).with_depth(1.0).with_transparent(true));
        queue.push(tagged(0.0, 4).with_transparent(true));

        // --- 3. ASSERT ---
        assert_eq!(tags(&queue, QueueGroup::ZeroZ), vec![1, 4]);
        assert_eq!(tags(&queue, QueueGroup::Opaque3D), vec![2]);
        assert_eq!(tags(&queue, QueueGroup::Transparent3D), vec![3]);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn z_buckets_sort_ascending_and_stable() {
        let mut queue = RenderQueue::new();
        for (tag, z) in [(1, -1.0), (2, -5.0), (3, -1.0), (4, 3.0), (5, 2.0), (6, 3.0)] {
            queue.push(tagged(z, tag));
        }

        queue.sort();

        assert_eq!(tags(&queue, QueueGroup::NegativeZ), vec![2, 1, 3]);
        assert_eq!(tags(&queue, QueueGroup::PositiveZ), vec![5, 4, 6]);
    }

    #[test]
    fn transparent_bucket_sorts_farthest_first() {
        let mut queue = RenderQueue::new();
        for (tag, depth) in [(1, 2.0), (2, 9.0), (3, 2.0), (4, 5.0)] {
            queue.push(tagged(0.0, tag).with_depth(depth).with_transparent(true));
        }

        queue.sort();

        assert_eq!(tags(&queue, QueueGroup::Transparent3D), vec![2, 4, 1, 3]);
        let depths: Vec<f32> = queue
            .bucket(QueueGroup::Transparent3D)
            .iter()
            .map(RenderCommand::depth)
            .collect();
        assert!(depths.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn opaque_and_zero_buckets_keep_submission_order() {
        let mut queue = RenderQueue::new();
        queue.push(tagged(0.0, 1).with_depth(9.0));
        queue.push(tagged(0.0, 2).with_depth(1.0));
        queue.push(tagged(0.0, 3));
        queue.push(tagged(0.0, 4));

        queue.sort();

        assert_eq!(tags(&queue, QueueGroup::Opaque3D), vec![1, 2]);
        assert_eq!(tags(&queue, QueueGroup::ZeroZ), vec![3, 4]);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut queue = RenderQueue::new();
        queue.realloc(16);
        queue.push(tagged(1.0, 1));
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.buckets.iter().all(|b| b.capacity() >= 16));
    }
}
