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

//! Portable single-threaded event loop: timers, cross-thread wake-ups, one-shot work
//! items. See [`Reactor`] for details.

use crate::collections::SlotKey;
use slab::Slab;
use std::{cell::RefCell,
          cmp::Reverse,
          collections::{BinaryHeap, HashSet, VecDeque},
          fmt::Debug,
          rc::Rc,
          sync::{Arc, Condvar, Mutex},
          time::{Duration, Instant}};

/// How long one [`Reactor::run_once`] pass may wait for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Process whatever is ready, never block.
    Poll,
    /// Block until at least one event is ready (or the next timer is due), process
    /// once, return.
    BlockOnce,
    /// Keep taking blocking passes until no live handles remain.
    BlockForever,
}

/// Two-state handle destruction: `destroy()` moves a handle to [`Closing`]; the backing
/// slot (and its callback) is only reclaimed on the next reactor pass, so a callback
/// that is in flight while `destroy()` runs completes safely.
///
/// [`Closing`]: HandleState::Closing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandleState {
    Alive,
    Closing,
}

pub(crate) struct TimerEntry {
    pub(crate) callback: Option<Box<dyn FnMut(super::TimerRef<'_>)>>,
    pub(crate) state: HandleState,
    pub(crate) armed: Option<ArmedTimer>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ArmedTimer {
    pub(crate) due_ns: u64,
    pub(crate) repeat_ns: u64,
    /// Unique per `start()` call; stale heap items are detected by mismatch.
    pub(crate) generation: u64,
}

pub(crate) struct NotifierEntry {
    pub(crate) callback: Option<Box<dyn FnMut()>>,
    pub(crate) state: HandleState,
}

/// Heap item ordering: earliest deadline first, then submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TimerDeadline {
    pub(crate) due_ns: u64,
    pub(crate) seq: u64,
    pub(crate) key: SlotKey,
    pub(crate) generation: u64,
}

pub(crate) struct ReactorCore {
    pub(crate) timers: Slab<TimerEntry>,
    pub(crate) timer_queue: BinaryHeap<Reverse<TimerDeadline>>,
    pub(crate) timer_seq: u64,
    pub(crate) next_generation: u64,
    pub(crate) notifiers: Slab<NotifierEntry>,
    pub(crate) work: VecDeque<Box<dyn FnOnce()>>,
}

impl ReactorCore {
    /// Earliest deadline among currently-armed timers, pruning stale heap items on the
    /// way.
    fn next_deadline(&mut self) -> Option<u64> {
        loop {
            let item = *self.timer_queue.peek().map(|Reverse(item)| item)?;
            if self.deadline_is_current(item) {
                return Some(item.due_ns);
            }
            self.timer_queue.pop();
        }
    }

    fn deadline_is_current(&self, item: TimerDeadline) -> bool {
        self.timers
            .get(item.key)
            .and_then(|entry| entry.armed.as_ref())
            .is_some_and(|armed| {
                armed.generation == item.generation && armed.due_ns == item.due_ns
            })
    }

    fn has_live_handles(&self) -> bool {
        let armed_timer = self
            .timers
            .iter()
            .any(|(_, entry)| entry.state == HandleState::Alive && entry.armed.is_some());
        let live_notifier = self
            .notifiers
            .iter()
            .any(|(_, entry)| entry.state == HandleState::Alive);
        armed_timer || live_notifier || !self.work.is_empty()
    }
}

/// State shared with other threads: the wake bit and the set of notifiers with a
/// pending activation. Protected by one mutex; the condvar is what a blocked
/// [`Reactor::run_once`] sleeps on.
pub(crate) struct ReactorShared {
    pub(crate) wake: Mutex<WakeState>,
    pub(crate) wake_cond: Condvar,
}

#[derive(Debug, Default)]
pub(crate) struct WakeState {
    pub(crate) pending: HashSet<SlotKey>,
    pub(crate) poked: bool,
}

/// Thread-safe handle that wakes a blocked reactor without any notifier attached. Used
/// by cooperative cancellation: flip your flag, then [`wake`](Self::wake).
#[derive(Clone)]
pub struct ReactorWaker {
    shared: Arc<ReactorShared>,
}

impl Debug for ReactorWaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorWaker").finish_non_exhaustive()
    }
}

impl ReactorWaker {
    pub fn wake(&self) {
        let mut wake = self.shared.wake.lock().expect("reactor wake mutex");
        wake.poked = true;
        self.shared.wake_cond.notify_one();
    }
}

/// The per-thread event loop that drives everything else in this crate: timer
/// callbacks, [`Notifier`](super::Notifier) activations, and one-shot work items all
/// run on the thread that calls [`run_once`](Self::run_once).
///
/// `Reactor` is a cheap clonable handle (`Rc` inside); it is deliberately `!Send`. The
/// only cross-thread entry points are [`NotifySender::send`](super::NotifySender::send)
/// and [`ReactorWaker::wake`].
///
/// Within one pass the expired-timer and pending-wake sets are snapshotted once:
/// callbacks scheduled during the pass run in the same pass only if they were ready
/// before the reactor returned from blocking.
#[derive(Clone)]
pub struct Reactor {
    pub(crate) core: Rc<RefCell<ReactorCore>>,
    pub(crate) shared: Arc<ReactorShared>,
    epoch: Instant,
}

impl Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.core.borrow();
        f.debug_struct("Reactor")
            .field("timers", &core.timers.len())
            .field("notifiers", &core.notifiers.len())
            .field("work", &core.work.len())
            .finish_non_exhaustive()
    }
}

impl Default for Reactor {
    fn default() -> Self { Self::new() }
}

impl Reactor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Rc::new(RefCell::new(ReactorCore {
                timers: Slab::new(),
                timer_queue: BinaryHeap::new(),
                timer_seq: 0,
                next_generation: 0,
                notifiers: Slab::new(),
                work: VecDeque::new(),
            })),
            shared: Arc::new(ReactorShared {
                wake: Mutex::new(WakeState::default()),
                wake_cond: Condvar::new(),
            }),
            epoch: Instant::now(),
        }
    }

    /// Monotonic nanoseconds since this reactor was created.
    #[must_use]
    pub fn now_ns(&self) -> u64 { self.epoch.elapsed().as_nanos() as u64 }

    #[must_use]
    pub fn waker(&self) -> ReactorWaker {
        ReactorWaker {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Submit a closure to run on the reactor thread during a later pass.
    pub fn submit(&self, work: impl FnOnce() + 'static) {
        self.core.borrow_mut().work.push_back(Box::new(work));
    }

    /// Take one scheduling pass (or, for [`RunMode::BlockForever`], passes until the
    /// loop drains). Returns whether live handles remain.
    pub fn run_once(&self, mode: RunMode) -> bool {
        match mode {
            RunMode::Poll => { self.turn(false); }
            RunMode::BlockOnce => { self.turn(true); }
            RunMode::BlockForever => {
                while self.turn(true) {}
            }
        }
        self.core.borrow().has_live_handles()
    }

    /// One pass: reap closed handles, (optionally) block, then fire expired timers,
    /// pending notifier activations, and queued work — in that order. Returns whether
    /// live handles remain.
    fn turn(&self, block: bool) -> bool {
        let deadline_ns = {
            let mut core = self.core.borrow_mut();
            core.timers.retain(|_, entry| entry.state == HandleState::Alive);
            core.notifiers
                .retain(|_, entry| entry.state == HandleState::Alive);
            core.next_deadline()
        };

        let pending = self.wait_for_events(block, deadline_ns);

        // Snapshot the work queue before any callback runs: work submitted during this
        // pass was not ready when the reactor returned from blocking, so it waits for
        // the next pass.
        let work_batch: Vec<_> = {
            let mut core = self.core.borrow_mut();
            core.work.drain(..).collect()
        };

        let now = self.now_ns();
        self.fire_timers(now);
        self.fire_notifiers(pending);
        for work in work_batch {
            work();
        }

        self.core.borrow().has_live_handles()
    }

    /// Block until a wake-up arrives or the earliest timer is due. Never blocks when the
    /// loop holds no live handles (there would be nothing left to wake it). Returns the
    /// drained set of pending notifier activations.
    fn wait_for_events(&self, block: bool, deadline_ns: Option<u64>) -> Vec<SlotKey> {
        let block = block && self.core.borrow().has_live_handles();
        let has_work = !self.core.borrow().work.is_empty();

        let mut wake = self.shared.wake.lock().expect("reactor wake mutex");
        if block && !has_work {
            loop {
                if !wake.pending.is_empty() || wake.poked {
                    break;
                }
                match deadline_ns {
                    Some(due) => {
                        let now = self.now_ns();
                        if due <= now {
                            break;
                        }
                        let (guard, result) = self
                            .shared
                            .wake_cond
                            .wait_timeout(wake, Duration::from_nanos(due - now))
                            .expect("reactor wake mutex");
                        wake = guard;
                        if result.timed_out() {
                            break;
                        }
                    }
                    None => {
                        wake = self
                            .shared
                            .wake_cond
                            .wait(wake)
                            .expect("reactor wake mutex");
                    }
                }
            }
        }
        wake.poked = false;
        wake.pending.drain().collect()
    }

    fn fire_timers(&self, now: u64) {
        // Snapshot the due set first; repeats re-armed below land strictly after `now`
        // and wait for the next pass.
        let due = {
            let mut core = self.core.borrow_mut();
            let mut due = vec![];
            loop {
                let Some(item) = core.timer_queue.peek().map(|Reverse(item)| *item) else {
                    break;
                };
                if item.due_ns > now && core.deadline_is_current(item) {
                    break;
                }
                core.timer_queue.pop();
                if item.due_ns <= now && core.deadline_is_current(item) {
                    due.push(item);
                }
            }
            due
        };

        for item in due {
            let callback = {
                let mut core_guard = self.core.borrow_mut();
                let core = &mut *core_guard;
                let Some(entry) = core.timers.get_mut(item.key) else {
                    continue;
                };
                if entry.state != HandleState::Alive {
                    continue;
                }
                let Some(armed) = entry.armed else { continue };
                if armed.generation != item.generation {
                    continue;
                }
                if armed.repeat_ns > 0 {
                    let rearmed = ArmedTimer {
                        due_ns: now + armed.repeat_ns,
                        ..armed
                    };
                    entry.armed = Some(rearmed);
                    let seq = core.timer_seq;
                    core.timer_seq += 1;
                    core.timer_queue.push(Reverse(TimerDeadline {
                        due_ns: rearmed.due_ns,
                        seq,
                        key: item.key,
                        generation: rearmed.generation,
                    }));
                } else {
                    entry.armed = None;
                }
                entry.callback.take()
            };
            let Some(mut callback) = callback else { continue };
            callback(super::TimerRef::new(self, item.key));
            // A callback may have re-armed itself with a fresh closure or destroyed its
            // own handle; only put the old closure back into an empty, live slot.
            let mut core = self.core.borrow_mut();
            if let Some(entry) = core.timers.get_mut(item.key) {
                if entry.callback.is_none() {
                    entry.callback = Some(callback);
                }
            }
        }
    }

    fn fire_notifiers(&self, pending: Vec<SlotKey>) {
        for key in pending {
            let callback = {
                let mut core = self.core.borrow_mut();
                match core.notifiers.get_mut(key) {
                    Some(entry) if entry.state == HandleState::Alive => entry.callback.take(),
                    _ => None,
                }
            };
            let Some(mut callback) = callback else { continue };
            callback();
            let mut core = self.core.borrow_mut();
            if let Some(entry) = core.notifiers.get_mut(key) {
                if entry.callback.is_none() {
                    entry.callback = Some(callback);
                }
            }
        }
    }

    /// Drop every handle and queued work item. Used at runtime teardown; this is also
    /// what breaks `Rc` cycles formed by callbacks that captured a [`Reactor`] clone.
    pub(crate) fn close_all(&self) {
        tracing::debug!("reactor teardown: dropping all handles");
        let mut core = self.core.borrow_mut();
        core.timers.clear();
        core.timer_queue.clear();
        core.notifiers.clear();
        core.work.clear();
        self.shared
            .wake
            .lock()
            .expect("reactor wake mutex")
            .pending
            .clear();
    }
}
