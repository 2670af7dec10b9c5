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

//! The runtime façade the embedding layer talks to. See [`Runtime`] for details.

use crate::gate::{CallGate, GateCaller};
use crate::reactor::Reactor;
use crate::sched::{Scheduler, SchedulerError, SchedulerStopper};
use std::fmt::Debug;

/// Thread-safe cancellation handle; see [`Runtime::stopper`].
pub type RuntimeStopper = SchedulerStopper;

/// Knobs the embedding layer may set before [`Runtime::init`].
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Capacity of the cross-thread call gate's FIFO.
    pub gate_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self { Self { gate_capacity: 256 } }
}

/// One reactor + one scheduler + one cross-thread call gate, wired together with the
/// teardown order the design requires: pending gate calls are drained (with the
/// cancelled sentinel) *before* the gate's notifier closes, then every reactor handle
/// is dropped.
///
/// Construct on the thread that will run it; only [`stopper`](Self::stopper) and
/// [`gate_caller`](Self::gate_caller) hand out handles usable from other threads.
pub struct Runtime {
    reactor: Reactor,
    sched: Scheduler,
    gate: Option<CallGate>,
}

impl Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("sched", &self.sched)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    #[must_use]
    pub fn init(options: RuntimeOptions) -> Self {
        let reactor = Reactor::new();
        let sched = Scheduler::new(&reactor);
        let gate = CallGate::new(&sched, options.gate_capacity);
        Self {
            reactor,
            sched,
            gate: Some(gate),
        }
    }

    #[must_use]
    pub fn reactor(&self) -> &Reactor { &self.reactor }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler { &self.sched }

    /// Handle for background threads that need to execute on the scheduler thread.
    #[must_use]
    pub fn gate_caller(&self) -> GateCaller {
        self.gate
            .as_ref()
            .expect("gate lives until the runtime is torn down")
            .caller()
    }

    /// Thread-safe handle that triggers cooperative cancellation.
    #[must_use]
    pub fn stopper(&self) -> RuntimeStopper { self.sched.stopper() }

    /// Drive the scheduler until the coroutine set drains, a task error surfaces, or a
    /// stopper fires — then tear everything down. A runtime runs once.
    pub fn run(mut self) -> Result<(), SchedulerError> {
        let result = self.sched.run();
        self.teardown();
        result
    }

    fn teardown(&mut self) {
        if let Some(gate) = self.gate.take() {
            tracing::debug!("runtime teardown: draining the call gate");
            gate.close();
        }
        // Covers drop-without-run: coroutines that never got to finish are cancelled.
        self.sched.teardown_remaining();
        self.reactor.close_all();
    }
}

impl Drop for Runtime {
    fn drop(&mut self) { self.teardown(); }
}
