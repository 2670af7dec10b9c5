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

//! The per-thread event loop and its handles: [`Reactor`], [`Timer`], [`Notifier`].
//!
//! Everything here is thread-confined to the reactor thread except the two explicit
//! bridges: [`NotifySender::send`] and [`ReactorWaker::wake`].

// Attach sources.
pub mod event_loop;
pub mod notifier;
pub mod timer;

// Re-export.
pub use event_loop::{Reactor, ReactorWaker, RunMode};
pub use notifier::*;
pub use timer::*;
