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

//! A bounded history of per-frame render counters.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use vesper_core::renderer::RenderStats;

/// Counters of one finished frame and the CPU time it took.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameSample {
    /// The renderer's counters at the end of the frame.
    pub stats: RenderStats,
    /// CPU time spent between `begin_frame` and `end_frame`, in milliseconds.
    pub cpu_time_ms: f64,
}

/// Averages and peaks over the frames currently held by a [`FrameStatsHistory`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FrameStatsSummary {
    /// Number of frames summarized.
    pub frames: usize,
    /// Mean draw calls per frame.
    pub avg_draw_calls: f64,
    /// Mean merged batches per frame.
    pub avg_batches: f64,
    /// Mean vertices (indices for indexed draws) per frame.
    pub avg_vertices: f64,
    /// Mean CPU frame time in milliseconds.
    pub avg_cpu_time_ms: f64,
    /// Largest draw-call count seen.
    pub peak_draw_calls: u32,
    /// Slowest CPU frame time in milliseconds.
    pub peak_cpu_time_ms: f64,
}

/// The last `capacity` frames, oldest first.
#[derive(Debug, Clone)]
pub struct FrameStatsHistory {
    capacity: usize,
    samples: VecDeque<FrameSample>,
}

impl FrameStatsHistory {
    /// Creates a history keeping at most `capacity` frames (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a frame, evicting the oldest one when full.
    pub fn record(&mut self, stats: RenderStats, cpu_time: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(FrameSample {
            stats,
            cpu_time_ms: cpu_time.as_secs_f64() * 1000.0,
        });
    }

    /// Maximum number of frames kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames currently kept.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` before the first frame is recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The most recent frame.
    pub fn latest(&self) -> Option<&FrameSample> {
        self.samples.back()
    }

    /// Frames from oldest to newest.
    pub fn samples(&self) -> impl Iterator<Item = &FrameSample> {
        self.samples.iter()
    }

    /// Forgets every frame.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Averages and peaks over the held frames. All zero when empty.
    pub fn summary(&self) -> FrameStatsSummary {
        if self.samples.is_empty() {
            return FrameStatsSummary::default();
        }

        let frames = self.samples.len();
        let mut summary = FrameStatsSummary {
            frames,
            ..FrameStatsSummary::default()
        };
        for sample in &self.samples {
            summary.avg_draw_calls += f64::from(sample.stats.draw_calls);
            summary.avg_batches += f64::from(sample.stats.drawn_batches);
            summary.avg_vertices += f64::from(sample.stats.drawn_vertices);
            summary.avg_cpu_time_ms += sample.cpu_time_ms;
            summary.peak_draw_calls = summary.peak_draw_calls.max(sample.stats.draw_calls);
            summary.peak_cpu_time_ms = summary.peak_cpu_time_ms.max(sample.cpu_time_ms);
        }

        let n = frames as f64;
        summary.avg_draw_calls /= n;
        summary.avg_batches /= n;
        summary.avg_vertices /= n;
        summary.avg_cpu_time_ms /= n;
        summary
    }

    /// Serializes the summary and every held frame as a JSON object.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct Export<'a> {
            summary: FrameStatsSummary,
            frames: Vec<&'a FrameSample>,
        }

        serde_json::to_string_pretty(&Export {
            summary: self.summary(),
            frames: self.samples.iter().collect(),
        })
    }
}

impl Default for FrameStatsHistory {
    fn default() -> Self {
        Self::new(120)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stats(frame: u64, draw_calls: u32, vertices: u32) -> RenderStats {
        RenderStats {
            frame_number: frame,
            drawn_batches: draw_calls,
            drawn_vertices: vertices,
            draw_calls,
        }
    }

    #[test]
    fn oldest_frames_are_evicted() {
        let mut history = FrameStatsHistory::new(2);
        for frame in 0..3 {
            history.record(stats(frame, 1, 6), Duration::from_millis(1));
        }

        assert_eq!(history.len(), 2);
        let frames: Vec<u64> = history.samples().map(|s| s.stats.frame_number).collect();
        assert_eq!(frames, vec![1, 2]);
        assert_eq!(history.latest().map(|s| s.stats.frame_number), Some(2));
    }

    #[test]
    fn summary_averages_and_peaks() {
        // --- 1. ARRANGE ---
        let mut history = FrameStatsHistory::new(8);
        history.record(stats(0, 2, 12), Duration::from_millis(4));
        history.record(stats(1, 4, 36), Duration::from_millis(8));

        // --- 2. ACT ---
        let summary = history.summary();

        // --- 3. ASSERT ---
        assert_eq!(summary.frames, 2);
        assert_relative_eq!(summary.avg_draw_calls, 3.0);
        assert_relative_eq!(summary.avg_vertices, 24.0);
        assert_relative_eq!(summary.avg_cpu_time_ms, 6.0);
        assert_eq!(summary.peak_draw_calls, 4);
        assert_relative_eq!(summary.peak_cpu_time_ms, 8.0);
    }

    #[test]
    fn empty_history_summarizes_to_zero() {
        let history = FrameStatsHistory::new(0);
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.summary(), FrameStatsSummary::default());
    }

    #[test]
    fn json_export_contains_summary_and_frames() {
        let mut history = FrameStatsHistory::default();
        history.record(stats(7, 3, 18), Duration::from_millis(2));

        let json = history.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["summary"]["frames"], 1);
        assert_eq!(value["frames"][0]["stats"]["frame_number"], 7);
        assert_eq!(value["frames"][0]["stats"]["draw_calls"], 3);
    }
}
