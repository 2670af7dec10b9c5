/*
 *   Copyright (c) 2025 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Cooperative coroutine scheduling: the [`Task`] protocol, coroutine identity/status/
//! hooks, and the [`Scheduler`] that drives them over a [`Reactor`](crate::Reactor).

// Attach sources.
pub mod coroutine;
pub mod scheduler;
pub mod task;

// Re-export.
pub use coroutine::{CoroId, CoroStatus, HookEvent, HookToken};
pub use scheduler::*;
pub use task::*;
