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

//! Timer handles over the [`Reactor`]. See [`Timer`] for details.

use super::event_loop::{ArmedTimer, HandleState, Reactor, TimerDeadline, TimerEntry};
use crate::collections::SlotKey;
use std::{cmp::Reverse, fmt::Debug, time::Duration};

/// One timer owned by the reactor.
///
/// Lifecycle mirrors the reactor's other handles: [`create`](Self::create) →
/// [`start`](Self::start)/[`stop`](Self::stop) any number of times →
/// [`destroy`](Self::destroy). Destruction is asynchronous: the backing slot is
/// reclaimed on the next reactor pass, and the callback is guaranteed not to fire once
/// `destroy` has returned.
///
/// Dropping the handle without `destroy` leaks the slot until the reactor is torn down;
/// handles are deliberately explicit-destroy so that a callback can outlive the handle
/// that armed it (the callback reaches its own timer through [`TimerRef`]).
pub struct Timer {
    reactor: Reactor,
    key: SlotKey,
}

impl Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer").field("key", &self.key).finish()
    }
}

impl Timer {
    #[must_use]
    pub fn create(reactor: &Reactor) -> Self {
        let key = reactor.core.borrow_mut().timers.insert(TimerEntry {
            callback: None,
            state: HandleState::Alive,
            armed: None,
        });
        Self {
            reactor: reactor.clone(),
            key,
        }
    }

    /// Arm the timer: `callback` fires on the reactor thread once `timeout` elapses,
    /// then again every `repeat` when `repeat` is non-zero. A zero `timeout` fires on
    /// the next reactor pass. Re-starting an armed timer supersedes the previous arming
    /// and callback.
    pub fn start(
        &self,
        timeout: Duration,
        repeat: Duration,
        callback: impl FnMut(TimerRef<'_>) + 'static,
    ) {
        self.reactor
            .timer_start(self.key, timeout, repeat, Box::new(callback));
    }

    /// Disarm without destroying; [`start`](Self::start) may re-arm later.
    pub fn stop(&self) { self.reactor.timer_stop(self.key); }

    pub fn destroy(self) { self.reactor.timer_destroy(self.key); }
}

/// Borrowed control handle passed to a firing timer callback, so the callback can stop,
/// re-arm, or destroy its own timer without capturing the owning [`Timer`].
#[derive(Debug)]
pub struct TimerRef<'a> {
    reactor: &'a Reactor,
    key: SlotKey,
}

impl<'a> TimerRef<'a> {
    pub(crate) fn new(reactor: &'a Reactor, key: SlotKey) -> Self { Self { reactor, key } }

    pub fn stop(&self) { self.reactor.timer_stop(self.key); }

    pub fn restart(
        &self,
        timeout: Duration,
        repeat: Duration,
        callback: impl FnMut(TimerRef<'_>) + 'static,
    ) {
        self.reactor
            .timer_start(self.key, timeout, repeat, Box::new(callback));
    }

    pub fn destroy(&self) { self.reactor.timer_destroy(self.key); }
}

impl Reactor {
    fn timer_start(
        &self,
        key: SlotKey,
        timeout: Duration,
        repeat: Duration,
        callback: Box<dyn FnMut(TimerRef<'_>)>,
    ) {
        let due_ns = self.now_ns() + timeout.as_nanos() as u64;
        let mut core_guard = self.core.borrow_mut();
        let core = &mut *core_guard;
        let Some(entry) = core.timers.get_mut(key) else {
            return;
        };
        if entry.state != HandleState::Alive {
            return;
        }
        let generation = core.next_generation;
        core.next_generation += 1;
        entry.armed = Some(ArmedTimer {
            due_ns,
            repeat_ns: repeat.as_nanos() as u64,
            generation,
        });
        entry.callback = Some(callback);
        let seq = core.timer_seq;
        core.timer_seq += 1;
        core.timer_queue.push(Reverse(TimerDeadline {
            due_ns,
            seq,
            key,
            generation,
        }));
    }

    fn timer_stop(&self, key: SlotKey) {
        if let Some(entry) = self.core.borrow_mut().timers.get_mut(key) {
            entry.armed = None;
        }
    }

    fn timer_destroy(&self, key: SlotKey) {
        if let Some(entry) = self.core.borrow_mut().timers.get_mut(key) {
            entry.state = HandleState::Closing;
            entry.armed = None;
            entry.callback = None;
        }
    }
}
