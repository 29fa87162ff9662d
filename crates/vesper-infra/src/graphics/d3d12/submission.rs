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

//! Isolated submissions for one-off GPU work.
//!
//! Uploads, mipmap generation and readbacks record into a dedicated command
//! list with its own fence instead of the frame's list. Reusing the list
//! waits for its previous submission; a caller that needs the result right
//! away submits with `wait = true`.

use super::native::{CommandList, FenceHandle, NativeDevice, NativeError};
use std::sync::Arc;

/// A dedicated command list and fence for out-of-frame work.
#[derive(Debug)]
pub struct IsolatedSubmission {
    native: Arc<dyn NativeDevice>,
    list: CommandList,
    fence: FenceHandle,
    next_value: u64,
    recording: bool,
}

impl IsolatedSubmission {
    /// Creates the submission path. The first submission signals 1.
    ///
    /// ## Errors
    /// * `NativeError` - If the fence cannot be created.
    pub fn new(native: Arc<dyn NativeDevice>) -> Result<Self, NativeError> {
        let fence = native.create_fence(0)?;
        Ok(Self {
            native,
            list: CommandList::new(),
            fence,
            next_value: 1,
            recording: false,
        })
    }

    /// Opens the list for recording, waiting for the previous submission
    /// first. Calling it while already recording returns the open list.
    ///
    /// ## Errors
    /// * `NativeError` - If waiting on the previous submission fails.
    pub fn begin(&mut self) -> Result<&mut CommandList, NativeError> {
        if !self.recording {
            self.wait_previous()?;
            self.list.reset();
            self.recording = true;
        }
        Ok(&mut self.list)
    }

    /// Fence value the open (or next) submission will signal.
    pub fn pending_value(&self) -> u64 {
        self.next_value
    }

    /// Last value the GPU completed.
    pub fn completed_value(&self) -> u64 {
        self.native.completed_value(self.fence)
    }

    /// Executes the open list and signals its fence value, optionally
    /// blocking until the GPU is done. Returns the signaled value.
    ///
    /// ## Errors
    /// * `NativeError` - If execution, signaling or waiting fails.
    pub fn submit(&mut self, wait: bool) -> Result<u64, NativeError> {
        let value = self.next_value;
        if !self.recording {
            return Ok(value - 1);
        }
        self.recording = false;
        self.native.execute(&self.list)?;
        self.native.signal(self.fence, value)?;
        self.next_value += 1;
        if wait {
            self.native.wait(self.fence, value)?;
        }
        Ok(value)
    }

    /// Blocks until `value` has completed.
    ///
    /// ## Errors
    /// * `NativeError` - If the wait fails.
    pub fn wait_for(&self, value: u64) -> Result<(), NativeError> {
        if value == 0 || self.completed_value() >= value {
            return Ok(());
        }
        self.native.wait(self.fence, value)
    }

    /// Signals the next fence value without recording anything, then waits
    /// for it. Used to fence work that was executed on another list.
    ///
    /// ## Errors
    /// * `NativeError` - If signaling or waiting fails.
    pub fn flush(&mut self) -> Result<u64, NativeError> {
        let value = self.next_value;
        self.native.signal(self.fence, value)?;
        self.next_value += 1;
        self.native.wait(self.fence, value)?;
        Ok(value)
    }

    /// Blocks until every submission has completed.
    ///
    /// ## Errors
    /// * `NativeError` - If the wait fails.
    pub fn wait_idle(&self) -> Result<(), NativeError> {
        self.wait_for(self.next_value - 1)
    }

    fn wait_previous(&self) -> Result<(), NativeError> {
        self.wait_for(self.next_value - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::d3d12::native::{HeadlessDevice, NativeCommand};

    #[test]
    fn fence_values_start_at_one_and_increase() {
        // --- 1. ARRANGE ---
        let device = Arc::new(HeadlessDevice::new());
        let mut isolated = IsolatedSubmission::new(device.clone()).unwrap();

        // --- 2. ACT ---
        isolated
            .begin()
            .unwrap()
            .record(NativeCommand::Dispatch { x: 1, y: 1, z: 1 });
        let first = isolated.submit(true).unwrap();
        isolated.begin().unwrap();
        let second = isolated.submit(false).unwrap();

        // --- 3. ASSERT ---
        assert_eq!((first, second), (1, 2));
        assert_eq!(isolated.pending_value(), 3);
        assert_eq!(device.dispatch_count(), 1);
        assert_eq!(isolated.completed_value(), 2);
    }

    #[test]
    fn reuse_waits_for_the_previous_submission() {
        let device = Arc::new(HeadlessDevice::new());
        device.set_manual_fences(true);
        let mut isolated = IsolatedSubmission::new(device.clone()).unwrap();

        isolated.begin().unwrap();
        isolated.submit(false).unwrap();
        assert_eq!(isolated.completed_value(), 0);

        isolated.begin().unwrap();
        assert_eq!(isolated.completed_value(), 1);
    }

    #[test]
    fn submitting_without_recording_is_a_no_op() {
        let device = Arc::new(HeadlessDevice::new());
        let mut isolated = IsolatedSubmission::new(device.clone()).unwrap();
        assert_eq!(isolated.submit(false).unwrap(), 0);
        assert_eq!(device.executed_list_count(), 0);
    }
}
