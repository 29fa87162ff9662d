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

//! RAII timers for CPU-side frame phases.

use std::time::Duration;
use vesper_core::utils::timer::Stopwatch;

/// Measures the scope it lives in and writes the result into `slot` when
/// dropped.
///
/// The measurement is stored even on early returns, which keeps frame timing
/// correct when a frame is skipped half-way.
#[derive(Debug)]
pub struct ScopedTimer<'a> {
    label: &'static str,
    stopwatch: Stopwatch,
    slot: &'a mut Duration,
}

impl<'a> ScopedTimer<'a> {
    /// Starts timing immediately.
    pub fn new(label: &'static str, slot: &'a mut Duration) -> Self {
        Self {
            label,
            stopwatch: Stopwatch::new(),
            slot,
        }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.stopwatch.elapsed();
        log::trace!(
            "[ScopedTimer] {} took {:.3} ms",
            self.label,
            elapsed.as_secs_f64() * 1000.0
        );
        *self.slot = elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_elapsed_time_is_written_on_drop() {
        let mut frame_time = Duration::ZERO;
        {
            let _timer = ScopedTimer::new("frame", &mut frame_time);
            thread::sleep(Duration::from_millis(2));
        }
        assert!(frame_time >= Duration::from_millis(2));
    }

    #[test]
    fn test_early_return_still_records() {
        fn skipped_frame(slot: &mut Duration) -> Option<()> {
            let _timer = ScopedTimer::new("skipped", slot);
            let surface: Option<()> = None;
            surface?;
            Some(())
        }

        let mut frame_time = Duration::MAX;
        assert!(skipped_frame(&mut frame_time).is_none());
        assert!(frame_time < Duration::MAX);
    }
}
