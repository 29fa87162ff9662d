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

//! Wall-clock measurement for CPU-side frame phases.

use std::time::{Duration, Instant};

/// A started-on-creation stopwatch.
///
/// Used by the renderer to time the CPU portion of a frame and by the
/// telemetry crate's scoped timers.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    /// Creates a stopwatch that starts counting immediately.
    #[inline]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Restarts the measurement and returns the time elapsed before the restart.
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.start);
        self.start = now;
        elapsed
    }

    /// Time elapsed since creation or the last [`Stopwatch::lap`].
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time in fractional milliseconds.
    #[inline]
    pub fn elapsed_ms_f64(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn elapsed_is_monotonic() {
        let watch = Stopwatch::new();
        let first = watch.elapsed();
        thread::sleep(Duration::from_millis(5));
        assert!(watch.elapsed() >= first);
        assert!(watch.elapsed_ms_f64() >= 5.0);
    }

    #[test]
    fn lap_restarts_the_measurement() {
        let mut watch = Stopwatch::new();
        thread::sleep(Duration::from_millis(20));
        let lap = watch.lap();
        assert!(lap >= Duration::from_millis(20));
        assert!(watch.elapsed() < lap);
    }
}
