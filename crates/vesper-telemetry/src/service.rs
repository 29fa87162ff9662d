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

//! Collects frame statistics and reports them periodically.

use crate::frame_stats::{FrameStatsHistory, FrameStatsSummary};
use std::time::{Duration, Instant};
use vesper_core::renderer::RenderStats;

/// Owns the frame history and logs a summary every `report_interval`.
#[derive(Debug)]
pub struct TelemetryService {
    history: FrameStatsHistory,
    last_report: Instant,
    report_interval: Duration,
}

impl TelemetryService {
    /// Creates a service keeping `history_len` frames and reporting every
    /// `report_interval`.
    pub fn new(history_len: usize, report_interval: Duration) -> Self {
        Self {
            history: FrameStatsHistory::new(history_len),
            last_report: Instant::now(),
            report_interval,
        }
    }

    /// Should be called once per finished frame.
    ///
    /// ## Returns
    /// The summary that was logged, if the report interval elapsed.
    pub fn tick(&mut self, stats: &RenderStats, cpu_time: Duration) -> Option<FrameStatsSummary> {
        self.history.record(*stats, cpu_time);

        if self.last_report.elapsed() < self.report_interval {
            return None;
        }
        self.last_report = Instant::now();

        let summary = self.history.summary();
        log::info!(
            "{} frames: {:.1} draw calls, {:.1} batches, {:.0} vertices, {:.2} ms CPU (peak {:.2} ms)",
            summary.frames,
            summary.avg_draw_calls,
            summary.avg_batches,
            summary.avg_vertices,
            summary.avg_cpu_time_ms,
            summary.peak_cpu_time_ms
        );
        Some(summary)
    }

    /// The frames recorded so far.
    pub fn history(&self) -> &FrameStatsHistory {
        &self.history
    }
}

impl Default for TelemetryService {
    fn default() -> Self {
        Self::new(120, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_records_every_frame() {
        let mut service = TelemetryService::new(4, Duration::from_secs(3600));
        let stats = RenderStats {
            draw_calls: 2,
            ..RenderStats::default()
        };

        assert!(service.tick(&stats, Duration::from_millis(1)).is_none());
        assert!(service.tick(&stats, Duration::from_millis(1)).is_none());
        assert_eq!(service.history().len(), 2);
    }

    #[test]
    fn test_zero_interval_reports_each_tick() {
        crate::logging::init_test_logging();
        let mut service = TelemetryService::new(4, Duration::ZERO);
        let stats = RenderStats {
            draw_calls: 3,
            ..RenderStats::default()
        };

        let summary = service.tick(&stats, Duration::from_millis(5));

        assert_eq!(summary.map(|s| s.peak_draw_calls), Some(3));
    }
}
