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

//! Thread-safe "wake the reactor" bridge. See [`Notifier`] for details.

use super::event_loop::{HandleState, NotifierEntry, Reactor, ReactorShared};
use crate::collections::SlotKey;
use std::{fmt::Debug, sync::Arc};

/// A one-bit cross-thread wake-up attached to the reactor.
///
/// Construction binds a callback that the reactor fires **on its own thread** whenever
/// at least one [`send`](NotifySender::send) happened since the last pass. Repeated
/// sends coalesce into a single activation; consumers must drain their backing queue
/// until empty on each activation rather than counting activations.
///
/// The `Notifier` itself stays on the reactor thread (it can [`destroy`](Self::destroy)
/// the handle); hand [`NotifySender`] clones to background threads. Destruction order
/// is the caller's contract: stop all senders first, then destroy on the reactor
/// thread.
pub struct Notifier {
    reactor: Reactor,
    key: SlotKey,
}

impl Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").field("key", &self.key).finish()
    }
}

impl Notifier {
    #[must_use]
    pub fn create(reactor: &Reactor, callback: impl FnMut() + 'static) -> Self {
        let key = reactor.core.borrow_mut().notifiers.insert(NotifierEntry {
            callback: Some(Box::new(callback)),
            state: HandleState::Alive,
        });
        Self {
            reactor: reactor.clone(),
            key,
        }
    }

    /// A `Send + Sync` handle for background threads.
    #[must_use]
    pub fn sender(&self) -> NotifySender {
        NotifySender {
            shared: Arc::clone(&self.reactor.shared),
            key: self.key,
        }
    }

    /// Request an activation from the reactor thread itself.
    pub fn send(&self) { self.sender().send(); }

    /// Mark for destruction; the slot is reclaimed on the next reactor pass and the
    /// callback never fires again. Reactor thread only.
    pub fn destroy(self) {
        if let Some(entry) = self.reactor.core.borrow_mut().notifiers.get_mut(self.key) {
            entry.state = HandleState::Closing;
            entry.callback = None;
        }
        self.reactor
            .shared
            .wake
            .lock()
            .expect("reactor wake mutex")
            .pending
            .remove(&self.key);
    }
}

/// Cloneable cross-thread side of a [`Notifier`]. [`send`](Self::send) is safe from any
/// thread and never blocks beyond the wake mutex.
#[derive(Clone)]
pub struct NotifySender {
    shared: Arc<ReactorShared>,
    key: SlotKey,
}

impl Debug for NotifySender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySender")
            .field("key", &self.key)
            .finish()
    }
}

impl NotifySender {
    pub fn send(&self) {
        let mut wake = self.shared.wake.lock().expect("reactor wake mutex");
        wake.pending.insert(self.key);
        self.shared.wake_cond.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::RunMode;
    use std::{cell::Cell, rc::Rc, thread, time::Duration};

    #[test]
    fn send_from_background_thread_wakes_a_blocked_reactor() {
        let reactor = Reactor::new();
        let fired = Rc::new(Cell::new(0_u32));

        let fired_in_cb = Rc::clone(&fired);
        let notifier = Notifier::create(&reactor, move || {
            fired_in_cb.set(fired_in_cb.get() + 1);
        });

        let sender = notifier.sender();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            sender.send();
        });

        while fired.get() == 0 {
            reactor.run_once(RunMode::BlockOnce);
        }
        producer.join().unwrap();
        assert_eq!(fired.get(), 1);
        notifier.destroy();
    }

    #[test]
    fn sends_between_passes_coalesce_into_one_activation() {
        let reactor = Reactor::new();
        let fired = Rc::new(Cell::new(0_u32));

        let fired_in_cb = Rc::clone(&fired);
        let notifier = Notifier::create(&reactor, move || {
            fired_in_cb.set(fired_in_cb.get() + 1);
        });

        notifier.send();
        notifier.send();
        notifier.send();
        reactor.run_once(RunMode::Poll);
        assert_eq!(fired.get(), 1, "burst of sends must coalesce");

        reactor.run_once(RunMode::Poll);
        assert_eq!(fired.get(), 1, "no activation without a new send");

        notifier.send();
        reactor.run_once(RunMode::Poll);
        assert_eq!(fired.get(), 2);
        notifier.destroy();
    }

    #[test]
    fn destroyed_notifier_never_fires_again() {
        let reactor = Reactor::new();
        let fired = Rc::new(Cell::new(0_u32));

        let fired_in_cb = Rc::clone(&fired);
        let notifier = Notifier::create(&reactor, move || {
            fired_in_cb.set(fired_in_cb.get() + 1);
        });

        notifier.send();
        notifier.destroy();
        reactor.run_once(RunMode::Poll);
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn waker_unblocks_without_any_notifier() {
        let reactor = Reactor::new();
        // Keep the loop alive so BlockOnce actually blocks.
        let notifier = Notifier::create(&reactor, || {});
        let waker = reactor.waker();

        let poker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            waker.wake();
        });

        reactor.run_once(RunMode::BlockOnce);
        poker.join().unwrap();
        notifier.destroy();
    }

    #[test]
    fn submitted_work_runs_on_the_next_pass_only() {
        let reactor = Reactor::new();
        let order = Rc::new(std::cell::RefCell::new(vec![]));

        let order_outer = Rc::clone(&order);
        let reactor_in_work = reactor.clone();
        reactor.submit(move || {
            order_outer.borrow_mut().push("first");
            let order_inner = Rc::clone(&order_outer);
            reactor_in_work.submit(move || {
                order_inner.borrow_mut().push("second");
            });
        });

        reactor.run_once(RunMode::Poll);
        assert_eq!(*order.borrow(), vec!["first"]);
        reactor.run_once(RunMode::Poll);
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }
}
