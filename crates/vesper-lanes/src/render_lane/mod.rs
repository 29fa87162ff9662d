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

//! Rendering lane: command queues, sorting and triangle batching.

mod batcher;
mod buffer_pool;
mod command;
mod error;
mod queue;
mod renderer;

pub use batcher::*;
pub use buffer_pool::*;
pub use command::*;
pub use error::*;
pub use queue::*;
pub use renderer::*;
