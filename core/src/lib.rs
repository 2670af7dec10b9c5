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

//! # autorun_core
//!
//! The cooperative concurrency core of the `autorun` automation-script runtime: a
//! single-threaded scheduler that owns a pool of suspendable tasks, an event reactor
//! that drives timers and asynchronous wake-ups, a thread-safe notification bridge that
//! lets background worker threads wake the reactor, and two supporting substrates — an
//! in-place overwritable ring buffer of byte records, and index-linked intrusive
//! containers used for the scheduler's bookkeeping.
//!
//! ## Scheduling model
//!
//! Everything runs on one designated thread. A coroutine is either *busy* (will be
//! resumed on the next scheduler pass) or *wait* (parked until some reactor callback
//! flips it back). The idiomatic way for a task to block on an event:
//!
//! 1. arrange for a reactor callback (timer fire, notifier activation, gate call) to
//!    call [`Scheduler::set_state`] with [`CoroStatus::Busy`] when the event happens;
//! 2. call [`TaskCtx::set_wait`];
//! 3. return [`TaskStep::Yield`].
//!
//! [`sleep`] packages exactly that pattern over a one-shot [`Timer`].
//!
//! Background OS threads interact with the core through two bridges only: the
//! [`NotifySender`] wake-up and the [`GateCaller`] cross-thread call gate. Everything
//! else is thread-confined; the [`Runtime`] façade wires the pieces together and owns
//! the teardown order.
//!
//! ## Quick start
//!
//! ```
//! use autorun_core::{Runtime, RuntimeOptions, TaskCtx, TaskStep, sleep};
//! use std::time::Duration;
//!
//! let runtime = Runtime::init(RuntimeOptions::default());
//! let mut parked = false;
//! runtime.scheduler().spawn(move |cx: &mut TaskCtx<'_>| {
//!     if parked {
//!         return TaskStep::Complete(Default::default());
//!     }
//!     parked = true;
//!     sleep(cx, Duration::from_millis(1));
//!     TaskStep::Yield
//! });
//! runtime.run().unwrap();
//! ```

// Attach sources.
pub mod collections;
pub mod gate;
pub mod log;
pub mod reactor;
pub mod ring;
pub mod runtime;
pub mod sched;
pub mod sync;

// Re-export.
pub use collections::*;
pub use gate::*;
pub use log::*;
pub use reactor::*;
pub use ring::*;
pub use runtime::*;
pub use sched::*;
pub use sync::*;
