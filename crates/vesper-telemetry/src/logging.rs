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

//! Process-wide logger setup.

use env_logger::{Builder, Env};

/// Installs `env_logger` as the `log` backend.
///
/// `RUST_LOG` wins over `default_filter` when set. Calling this twice is
/// harmless: the second call logs a warning and leaves the first logger in
/// place.
///
/// ## Returns
/// `true` if this call installed the logger.
pub fn init_logging(default_filter: &str) -> bool {
    let installed = Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init()
        .is_ok();
    if !installed {
        log::warn!("A logger is already installed, keeping it");
    }
    installed
}

/// Logger for unit and integration tests, captured by the test harness.
pub fn init_test_logging() {
    let _ = Builder::from_env(Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_can_be_initialized_repeatedly() {
        init_test_logging();
        init_test_logging();
        log::debug!("still logging");
        // The test logger is already installed.
        assert!(!init_logging("info"));
    }
}
