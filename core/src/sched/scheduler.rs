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

//! The cooperative scheduler: owns the coroutine set, partitions it into busy/wait
//! queues, and drives the reactor. See [`Scheduler`] for details.

use super::coroutine::{CoroEntry, CoroId, CoroStatus, HookEvent, HookToken};
use super::task::{Outputs, Task, TaskError, TaskStep, Value};
use crate::collections::{ListAdapter, ListLink, SlotKey, SlotList, SlotTree, TreeAdapter,
                         TreeLink};
use crate::reactor::{Reactor, ReactorWaker, RunMode};
use slab::Slab;
use std::{cell::RefCell,
          fmt::Debug,
          rc::Rc,
          sync::{atomic::{AtomicBool, Ordering},
                 Arc}};

#[derive(Debug)]
pub(crate) struct RunQueueAdapter;

impl ListAdapter for RunQueueAdapter {
    type Node = CoroEntry;
    fn link(node: &CoroEntry) -> &ListLink { &node.run_link }
    fn link_mut(node: &mut CoroEntry) -> &mut ListLink { &mut node.run_link }
}

#[derive(Debug)]
pub(crate) struct IdentityAdapter;

impl TreeAdapter for IdentityAdapter {
    type Node = CoroEntry;
    type Key = CoroId;
    fn key(node: &CoroEntry) -> CoroId { node.id }
    fn link(node: &CoroEntry) -> &TreeLink { &node.tree_link }
    fn link_mut(node: &mut CoroEntry) -> &mut TreeLink { &mut node.tree_link }
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SchedulerError {
    /// A resumed task raised an error; it is surfaced once, after terminal hooks fired
    /// and the remaining coroutines were torn down.
    #[error("{id} failed: {source}")]
    #[diagnostic(code(autorun_core::sched::task_failed))]
    TaskFailed {
        id: CoroId,
        #[source]
        source: TaskError,
    },

    /// [`Scheduler::register`] was called with an identity that is already live.
    #[error("{id} is already registered")]
    #[diagnostic(
        code(autorun_core::sched::duplicate_identity),
        help("identities handed to register() must be unique among live coroutines")
    )]
    DuplicateIdentity { id: CoroId },
}

pub(crate) struct SchedCore {
    arena: Slab<CoroEntry>,
    busy: SlotList<RunQueueAdapter>,
    wait: SlotList<RunQueueAdapter>,
    index: SlotTree<IdentityAdapter>,
    next_id: u64,
    first_error: Option<(CoroId, TaskError)>,
}

/// Single-threaded cooperative scheduler.
///
/// `Scheduler` is a cheap clonable handle (`Rc` inside) confined to the reactor
/// thread. The main loop is:
///
/// ```text
/// while running and coroutine set is non-empty:
///     one_pass()
///     reactor.run_once(if busy queue empty { BlockOnce } else { Poll })
/// ```
///
/// `one_pass` resumes the busy coroutines in FIFO order *as observed at pass start*: a
/// coroutine moved from wait to busy mid-pass is not resumed until the next pass, and
/// coroutines destroyed mid-pass are skipped, never re-read.
///
/// Cancellation is cooperative: [`SchedulerStopper::stop`] (thread-safe) clears the
/// running flag and wakes the reactor; the loop notices between resumes and tears the
/// remaining coroutines down with a cancelled terminal hook each.
#[derive(Clone)]
pub struct Scheduler {
    core: Rc<RefCell<SchedCore>>,
    reactor: Reactor,
    running: Arc<AtomicBool>,
}

impl Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.core.borrow();
        f.debug_struct("Scheduler")
            .field("coroutines", &core.arena.len())
            .field("busy", &core.busy.len())
            .field("wait", &core.wait.len())
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Thread-safe cancellation handle for [`Scheduler::run`].
#[derive(Clone, Debug)]
pub struct SchedulerStopper {
    running: Arc<AtomicBool>,
    waker: ReactorWaker,
}

impl SchedulerStopper {
    /// Request cooperative teardown: clear the running flag, then wake the reactor. The
    /// atomic plus the reactor's own wake primitive provide the happens-before edge; no
    /// further synchronization is needed.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.waker.wake();
    }
}

/// What a resumed [`Task`](super::Task) sees of the world: its own identity plus the
/// scheduler and reactor handles.
#[derive(Debug)]
pub struct TaskCtx<'a> {
    sched: &'a Scheduler,
    id: CoroId,
}

impl<'a> TaskCtx<'a> {
    #[must_use]
    pub fn id(&self) -> CoroId { self.id }

    #[must_use]
    pub fn scheduler(&self) -> &'a Scheduler { self.sched }

    #[must_use]
    pub fn reactor(&self) -> &'a Reactor { self.sched.reactor() }

    /// Move this coroutine to *wait* before yielding. Some reactor callback must later
    /// flip it back to *busy*; that flip is the only way a suspended coroutine becomes
    /// eligible to resume.
    pub fn set_wait(&self) { self.sched.set_state(self.id, CoroStatus::Wait); }
}

impl Scheduler {
    #[must_use]
    pub fn new(reactor: &Reactor) -> Self {
        Self {
            core: Rc::new(RefCell::new(SchedCore {
                arena: Slab::new(),
                busy: SlotList::new(),
                wait: SlotList::new(),
                index: SlotTree::new(),
                next_id: 1,
                first_error: None,
            })),
            reactor: reactor.clone(),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    #[must_use]
    pub fn reactor(&self) -> &Reactor { &self.reactor }

    #[must_use]
    pub fn stopper(&self) -> SchedulerStopper {
        SchedulerStopper {
            running: Arc::clone(&self.running),
            waker: self.reactor.waker(),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }

    /// Register a task under a caller-chosen identity; it starts *busy*. Fails without
    /// mutating anything when the identity is already live.
    pub fn register(&self, id: CoroId, task: Box<dyn Task>) -> Result<(), SchedulerError> {
        let mut core_guard = self.core.borrow_mut();
        let core = &mut *core_guard;
        if core.index.find(&core.arena, &id).is_some() {
            return Err(SchedulerError::DuplicateIdentity { id });
        }
        let key = core.arena.insert(CoroEntry::new(id, task));
        core.index
            .insert(&mut core.arena, key)
            .expect("identity was pre-checked");
        core.busy.push_back(&mut core.arena, key);
        tracing::debug!(%id, "coroutine registered");
        Ok(())
    }

    /// Register a task under a fresh scheduler-assigned identity. Identities taken by
    /// external [`register`](Self::register) calls are skipped over.
    pub fn spawn(&self, task: impl Task + 'static) -> CoroId {
        let id = {
            let mut core_guard = self.core.borrow_mut();
            let core = &mut *core_guard;
            loop {
                let id = CoroId::from_raw(core.next_id);
                core.next_id += 1;
                if core.index.find(&core.arena, &id).is_none() {
                    break id;
                }
            }
        };
        self.register(id, Box::new(task))
            .expect("freshly allocated identity is unique");
        id
    }

    #[must_use]
    pub fn contains(&self, id: CoroId) -> bool { self.status_of(id).is_some() }

    /// Status of a live coroutine, or [`None`] once destroyed / never registered.
    #[must_use]
    pub fn status_of(&self, id: CoroId) -> Option<CoroStatus> {
        let core = self.core.borrow();
        let key = core.index.find(&core.arena, &id)?;
        Some(core.arena[key].status)
    }

    #[must_use]
    pub fn coroutine_count(&self) -> usize { self.core.borrow().arena.len() }

    #[must_use]
    pub fn busy_count(&self) -> usize { self.core.borrow().busy.len() }

    #[must_use]
    pub fn wait_count(&self) -> usize { self.core.borrow().wait.len() }

    #[must_use]
    pub fn hook_count(&self, id: CoroId) -> usize {
        let core = self.core.borrow();
        core.index
            .find(&core.arena, &id)
            .map_or(0, |key| core.arena[key].hooks.len())
    }

    /// Append a schedule hook; it fires on every observable state change of the
    /// coroutine, including termination. Returns [`None`] for a dead identity.
    pub fn hook(&self, id: CoroId, callback: impl FnMut(&HookEvent<'_>) + 'static) -> Option<HookToken> {
        let mut core_guard = self.core.borrow_mut();
        let core = &mut *core_guard;
        let key = core.index.find(&core.arena, &id)?;
        let hook = core.arena[key].hooks.add(Box::new(callback));
        Some(HookToken { coro: id, hook })
    }

    /// Remove a hook. Legal from inside a firing hook, for any hook including itself
    /// and the next one scheduled to fire.
    pub fn unhook(&self, token: HookToken) {
        let mut core_guard = self.core.borrow_mut();
        let core = &mut *core_guard;
        let Some(key) = core.index.find(&core.arena, &token.coro) else {
            return;
        };
        core.arena[key].hooks.remove(token.hook);
    }

    /// Move a coroutine between *busy* and *wait*. Setting the already-current state is
    /// a no-op; terminal states cannot be set from outside.
    pub fn set_state(&self, id: CoroId, state: CoroStatus) {
        debug_assert!(
            !state.is_terminal(),
            "set_state only accepts Busy and Wait"
        );
        let moved = {
            let mut core_guard = self.core.borrow_mut();
            let core = &mut *core_guard;
            let Some(key) = core.index.find(&core.arena, &id) else {
                return;
            };
            let status = core.arena[key].status;
            if status == state || status.is_terminal() || state.is_terminal() {
                return;
            }
            match state {
                CoroStatus::Busy => {
                    core.wait.erase(&mut core.arena, key);
                    core.busy.push_back(&mut core.arena, key);
                }
                CoroStatus::Wait => {
                    core.busy.erase(&mut core.arena, key);
                    core.wait.push_back(&mut core.arena, key);
                }
                CoroStatus::Done | CoroStatus::Failed => unreachable!(),
            }
            core.arena[key].status = state;
            let firing = core.arena[key].firing;
            (key, firing)
        };
        tracing::trace!(%id, %state, "schedule state changed");
        let (key, firing) = moved;
        if !firing {
            self.fire_hooks(key, id, state, false);
        }
    }

    /// Run until the coroutine set drains, a task error surfaces, or a stopper fires.
    pub fn run(&self) -> Result<(), SchedulerError> {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            self.one_pass();

            if let Some((id, source)) = self.core.borrow_mut().first_error.take() {
                tracing::debug!(%id, error = %source, "task failed; unwinding scheduler");
                self.teardown_remaining();
                return Err(SchedulerError::TaskFailed { id, source });
            }

            if self.core.borrow().arena.is_empty() {
                break;
            }

            let mode = if self.core.borrow().busy.is_empty() {
                RunMode::BlockOnce
            } else {
                RunMode::Poll
            };
            self.reactor.run_once(mode);
        }

        if !self.running.load(Ordering::SeqCst) {
            tracing::debug!("scheduler cancelled; tearing down remaining coroutines");
            self.teardown_remaining();
        }
        Ok(())
    }

    /// Resume every coroutine that was busy at pass start, in FIFO order. Entries that
    /// were destroyed or moved to *wait* in the meantime are revalidated and skipped.
    fn one_pass(&self) {
        let snapshot: Vec<(SlotKey, CoroId)> = {
            let core = self.core.borrow();
            let mut out = Vec::with_capacity(core.busy.len());
            let mut cursor = core.busy.head();
            while let Some(key) = cursor {
                out.push((key, core.arena[key].id));
                cursor = core.busy.next(&core.arena, key);
            }
            out
        };

        for (key, id) in snapshot {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            if self.core.borrow().first_error.is_some() {
                break;
            }

            let task = {
                let mut core = self.core.borrow_mut();
                match core.arena.get_mut(key) {
                    Some(entry) if entry.id == id && entry.status == CoroStatus::Busy => {
                        entry.task.take()
                    }
                    _ => None,
                }
            };
            let Some(mut task) = task else { continue };

            let step = task.resume(&mut TaskCtx { sched: self, id });

            match step {
                TaskStep::Yield => {
                    let mut core = self.core.borrow_mut();
                    if let Some(entry) = core.arena.get_mut(key) {
                        if entry.id == id {
                            entry.task = Some(task);
                        }
                    }
                }
                TaskStep::Complete(outputs) => {
                    self.finish(key, id, Ok(outputs));
                }
                TaskStep::Fail(error) => {
                    self.finish(key, id, Err(error.clone()));
                    self.core
                        .borrow_mut()
                        .first_error
                        .get_or_insert((id, error));
                }
            }
        }
    }

    /// Terminal path: record the result, fire the terminal hooks, destroy the entry.
    fn finish(&self, key: SlotKey, id: CoroId, result: Result<Outputs, TaskError>) {
        let status = if result.is_ok() {
            CoroStatus::Done
        } else {
            CoroStatus::Failed
        };
        // The task may have parked itself in the wait queue before completing; remember
        // which queue holds the entry, since the terminal status freezes membership.
        let queue = {
            let mut core = self.core.borrow_mut();
            let entry = &mut core.arena[key];
            let queue = entry.status;
            entry.result = Some(result);
            entry.status = status;
            queue
        };
        tracing::debug!(%id, %status, "coroutine finished");
        self.fire_hooks(key, id, status, false);
        self.destroy(key, queue);
    }

    /// Fire the hook list once for one event. The firing cursor lives on the coroutine,
    /// so hooks may add/remove hooks (including themselves and the next-to-fire one)
    /// while the walk is in progress. Callbacks run with no scheduler borrow held.
    fn fire_hooks(&self, key: SlotKey, id: CoroId, status: CoroStatus, cancelled: bool) {
        let result = {
            let mut core = self.core.borrow_mut();
            let Some(entry) = core.arena.get_mut(key) else {
                return;
            };
            if entry.hooks.len() == 0 {
                return;
            }
            entry.firing = true;
            entry.hooks.begin_fire();
            entry.result.take()
        };
        let (error, outputs): (Option<&TaskError>, &[Value]) = match &result {
            Some(Ok(outputs)) => (None, outputs.as_slice()),
            Some(Err(error)) => (Some(error), &[]),
            None => (None, &[]),
        };

        loop {
            let next = {
                let mut core = self.core.borrow_mut();
                let Some(entry) = core.arena.get_mut(key) else {
                    break;
                };
                entry.hooks.next_to_fire()
            };
            let Some((hook_key, callback)) = next else { break };
            let Some(mut callback) = callback else { continue };

            let event = HookEvent {
                id,
                status,
                cancelled,
                error,
                outputs,
            };
            callback(&event);

            let mut core = self.core.borrow_mut();
            if let Some(entry) = core.arena.get_mut(key) {
                entry.hooks.put_back(hook_key, callback);
            }
        }

        let mut core = self.core.borrow_mut();
        if let Some(entry) = core.arena.get_mut(key) {
            entry.hooks.end_fire();
            entry.firing = false;
            entry.result = result;
        }
    }

    /// Unlink an entry from its run queue and the identity index, then drop it.
    /// `fallback_queue` covers entries whose status is already terminal (their queue
    /// membership froze when the terminal status was set).
    fn destroy(&self, key: SlotKey, fallback_queue: CoroStatus) {
        let mut core_guard = self.core.borrow_mut();
        let core = &mut *core_guard;
        let Some(entry) = core.arena.get(key) else {
            return;
        };
        let queue = if entry.status.is_terminal() {
            fallback_queue
        } else {
            entry.status
        };
        match queue {
            CoroStatus::Wait => core.wait.erase(&mut core.arena, key),
            _ => core.busy.erase(&mut core.arena, key),
        }
        core.index.erase(&mut core.arena, key);
        core.arena.remove(key);
    }

    /// Cancelled teardown: flip every waiter to busy (one O(1) splice), then destroy
    /// the whole set, delivering a cancelled terminal hook to each. Hooks may keep
    /// moving survivors around, so sweep until the arena drains.
    pub(crate) fn teardown_remaining(&self) {
        loop {
            {
                let mut core_guard = self.core.borrow_mut();
                let core = &mut *core_guard;
                if core.arena.is_empty() {
                    break;
                }
                let waiters = core.wait.keys(&core.arena);
                for key in waiters {
                    core.arena[key].status = CoroStatus::Busy;
                }
                let mut wait = std::mem::take(&mut core.wait);
                core.busy.migrate(&mut core.arena, &mut wait);
            }

            loop {
                let head = {
                    let core = self.core.borrow();
                    core.busy.head().map(|key| (key, core.arena[key].id))
                };
                let Some((key, id)) = head else { break };
                {
                    let mut core = self.core.borrow_mut();
                    core.arena[key].status = CoroStatus::Failed;
                }
                tracing::debug!(%id, "coroutine cancelled");
                self.fire_hooks(key, id, CoroStatus::Failed, true);
                self.destroy(key, CoroStatus::Busy);
            }
        }
    }
}
