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

//! Cross-thread call gate: run a closure on the scheduler thread on behalf of a
//! blocked background thread. See [`CallGate`] for details.

use crate::reactor::{Notifier, NotifySender};
use crate::sched::{Scheduler, Value};
use crate::sync::Semaphore;
use std::{collections::VecDeque,
          fmt::Debug,
          sync::{Arc, Mutex}};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The bounded FIFO is at capacity; the call was not enqueued.
    #[error("call gate is full")]
    Full,
    /// The gate was torn down before this call ran.
    #[error("call was cancelled by gate teardown")]
    Cancelled,
}

type GateJob = Box<dyn FnOnce(&Scheduler) -> Value + Send>;

struct CallRecord {
    job: GateJob,
    reply: Arc<ReplySlot>,
}

/// One call's reply slot: a single-use binary semaphore plus the result cell. Lives
/// only for the duration of one cross-thread call.
struct ReplySlot {
    result: Mutex<Option<Result<Value, GateError>>>,
    done: Semaphore,
}

impl ReplySlot {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            done: Semaphore::new(0),
        }
    }

    fn post(&self, result: Result<Value, GateError>) {
        *self.result.lock().expect("reply mutex") = Some(result);
        self.done.post();
    }

    fn take(&self) -> Result<Value, GateError> {
        self.done.wait();
        self.result
            .lock()
            .expect("reply mutex")
            .take()
            .expect("reply posted before semaphore")
    }
}

struct GateShared {
    queue: Mutex<VecDeque<CallRecord>>,
    capacity: usize,
}

/// Scheduler-thread side of the gate. Owns the notifier; create with
/// [`new`](Self::new) on the scheduler thread, hand [`caller`](Self::caller) clones to
/// background threads, and [`close`](Self::close) during runtime teardown — which
/// drains still-pending calls with [`GateError::Cancelled`] *before* destroying the
/// notifier, so no caller is left blocked.
///
/// Ordering: calls from one background thread execute on the scheduler thread in their
/// enqueue order. Nothing is promised across different background threads.
pub struct CallGate {
    shared: Arc<GateShared>,
    notifier: Notifier,
}

impl Debug for CallGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallGate")
            .field("capacity", &self.shared.capacity)
            .field(
                "pending",
                &self.shared.queue.lock().expect("gate mutex").len(),
            )
            .finish_non_exhaustive()
    }
}

impl CallGate {
    #[must_use]
    pub fn new(sched: &Scheduler, capacity: usize) -> Self {
        let shared = Arc::new(GateShared {
            queue: Mutex::new(VecDeque::new()),
            capacity,
        });
        let drain_shared = Arc::clone(&shared);
        let drain_sched = sched.clone();
        let notifier = Notifier::create(sched.reactor(), move || {
            Self::drain(&drain_shared, &drain_sched);
        });
        Self { shared, notifier }
    }

    /// A `Send + Sync` handle for background threads.
    #[must_use]
    pub fn caller(&self) -> GateCaller {
        GateCaller {
            shared: Arc::clone(&self.shared),
            sender: self.notifier.sender(),
        }
    }

    /// Fail every pending call with [`GateError::Cancelled`] and release its caller.
    pub fn cancel_all(&self) {
        loop {
            let record = self.shared.queue.lock().expect("gate mutex").pop_front();
            let Some(record) = record else { break };
            record.reply.post(Err(GateError::Cancelled));
        }
    }

    /// Teardown: drain pending calls, then destroy the notifier. Scheduler thread only.
    pub fn close(self) {
        self.cancel_all();
        self.notifier.destroy();
    }

    /// Notifier activation: pop and execute every pending record in FIFO order. One
    /// activation services arbitrarily many sends — wake-ups coalesce.
    fn drain(shared: &GateShared, sched: &Scheduler) {
        loop {
            let record = shared.queue.lock().expect("gate mutex").pop_front();
            let Some(record) = record else { break };
            tracing::trace!("gate call executing on scheduler thread");
            let value = (record.job)(sched);
            record.reply.post(Ok(value));
        }
    }
}

/// Background-thread side of the gate.
#[derive(Clone)]
pub struct GateCaller {
    shared: Arc<GateShared>,
    sender: NotifySender,
}

impl Debug for GateCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateCaller").finish_non_exhaustive()
    }
}

impl GateCaller {
    /// Run `job` on the scheduler thread and block this thread until it finishes.
    /// The job receives the scheduler handle and may freely mutate coroutine state
    /// (flip wait/busy, register coroutines, arm timers through the reactor).
    pub fn call(
        &self,
        job: impl FnOnce(&Scheduler) -> Value + Send + 'static,
    ) -> Result<Value, GateError> {
        let reply = Arc::new(ReplySlot::new());
        {
            let mut queue = self.shared.queue.lock().expect("gate mutex");
            if queue.len() >= self.shared.capacity {
                return Err(GateError::Full);
            }
            queue.push_back(CallRecord {
                job: Box::new(job),
                reply: Arc::clone(&reply),
            });
        }
        self.sender.send();
        reply.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::{Reactor, RunMode};
    use crate::sync::spawn_joinable;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn fixture() -> (Reactor, Scheduler) {
        let reactor = Reactor::new();
        let sched = Scheduler::new(&reactor);
        (reactor, sched)
    }

    /// Drive the reactor with non-blocking passes until the background worker flips
    /// `done`. Polling keeps the test deterministic: the worker's last reply happens
    /// after its final gate send, so there is no wake-up left to block on.
    fn drive_until_done(reactor: &Reactor, done: &AtomicBool) {
        while !done.load(Ordering::SeqCst) {
            reactor.run_once(RunMode::Poll);
            std::thread::yield_now();
        }
    }

    /// Calls from one background thread run on the reactor thread in enqueue order,
    /// and the caller observes the results in the same order.
    #[test]
    fn calls_from_one_thread_execute_in_fifo_order() {
        let (reactor, sched) = fixture();
        let gate = CallGate::new(&sched, 16);
        let caller = gate.caller();

        let done = Arc::new(AtomicBool::new(false));
        let done_in_thread = Arc::clone(&done);
        let worker = spawn_joinable("caller", move || {
            for i in 0..3_i64 {
                let value = caller.call(move |_sched| Value::Int(i * 10)).unwrap();
                assert_eq!(value, Value::Int(i * 10));
            }
            done_in_thread.store(true, Ordering::SeqCst);
        })
        .unwrap();

        drive_until_done(&reactor, &done);
        worker.join();
        gate.close();
    }

    #[test]
    fn job_runs_on_the_reactor_thread_with_scheduler_access() {
        let (reactor, sched) = fixture();
        let gate = CallGate::new(&sched, 16);
        let caller = gate.caller();

        let reactor_thread = std::thread::current().id();
        let done = Arc::new(AtomicBool::new(false));
        let done_in_thread = Arc::clone(&done);
        let worker = spawn_joinable("caller", move || {
            let value = caller
                .call(move |sched| {
                    assert_eq!(std::thread::current().id(), reactor_thread);
                    Value::Int(sched.coroutine_count() as i64)
                })
                .unwrap();
            assert_eq!(value, Value::Int(0));
            done_in_thread.store(true, Ordering::SeqCst);
        })
        .unwrap();

        drive_until_done(&reactor, &done);
        worker.join();
        gate.close();
    }

    #[test]
    fn full_gate_rejects_the_call() {
        let (_reactor, sched) = fixture();
        let gate = CallGate::new(&sched, 1);
        let caller = gate.caller();

        // Fill the single slot without ever draining it.
        gate.shared
            .queue
            .lock()
            .unwrap()
            .push_back(CallRecord {
                job: Box::new(|_| Value::Nil),
                reply: Arc::new(ReplySlot::new()),
            });

        let worker = std::thread::spawn(move || caller.call(|_| Value::Nil));
        assert_eq!(worker.join().unwrap(), Err(GateError::Full));
        gate.cancel_all();
    }

    #[test]
    fn cancel_all_releases_blocked_callers_with_the_cancelled_sentinel() {
        let (_reactor, sched) = fixture();
        let gate = CallGate::new(&sched, 16);
        let caller = gate.caller();

        let done = Arc::new(AtomicBool::new(false));
        let done_in_thread = Arc::clone(&done);
        let worker = spawn_joinable("caller", move || {
            let result = caller.call(|_| Value::Nil);
            assert_eq!(result, Err(GateError::Cancelled));
            done_in_thread.store(true, Ordering::SeqCst);
        })
        .unwrap();

        // Wait for the worker to enqueue, then cancel without ever draining.
        while gate.shared.queue.lock().unwrap().is_empty() {
            std::thread::yield_now();
        }
        gate.cancel_all();
        worker.join();
        assert!(done.load(Ordering::SeqCst));
    }
}
