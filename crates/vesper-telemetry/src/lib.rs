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

//! # Vesper Telemetry
//!
//! Logging bootstrap and a rolling history of the renderer's per-frame
//! counters.
//!
//! Hosts call [`logging::init_logging`] once at startup, then feed each
//! finished frame into a [`TelemetryService`], which keeps the last frames in
//! a [`FrameStatsHistory`] and periodically logs a summary.

#![warn(missing_docs)]

pub mod frame_stats;
pub mod logging;
pub mod service;
pub mod utils;

pub use frame_stats::{FrameSample, FrameStatsHistory, FrameStatsSummary};
pub use service::TelemetryService;
pub use utils::timer::ScopedTimer;
