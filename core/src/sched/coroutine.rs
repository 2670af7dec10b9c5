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

//! Coroutine identity, status, and the schedule-hook list. See [`CoroId`],
//! [`CoroStatus`], and the scheduler for the operations over them.

use super::task::{Outputs, Task, TaskError, Value};
use crate::collections::{ListAdapter, ListLink, SlotKey, SlotList, TreeLink};
use slab::Slab;
use std::fmt::Debug;

/// Stable opaque identity of one coroutine. Never recycled within a scheduler's
/// lifetime; usable as a map key by the embedding layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoroId(u64);

impl CoroId {
    /// Wrap an externally-chosen identity (e.g. derived from a script-object handle).
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self { Self(raw) }

    #[must_use]
    pub const fn as_raw(self) -> u64 { self.0 }
}

impl std::fmt::Display for CoroId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "coro#{}", self.0)
    }
}

/// Coroutine status. `Busy` and `Wait` are the two live, schedulable states; `Done` and
/// `Failed` are terminal and only ever observed by hooks (the coroutine is destroyed
/// right after the terminal hooks fire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum CoroStatus {
    /// Will be resumed on the next scheduler pass.
    Busy,
    /// Blocked on some event; a reactor callback flips it back to `Busy`.
    Wait,
    /// Finished normally.
    Done,
    /// Finished with an error — or was cancelled (see [`HookEvent::cancelled`]).
    Failed,
}

impl CoroStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool { matches!(self, CoroStatus::Done | CoroStatus::Failed) }
}

/// What a schedule hook observes: one state change of one coroutine. For terminal
/// events the captured return values or error payload are visible; `cancelled` marks
/// teardown by [`runtime_stop`](crate::runtime::Runtime) rather than by the task
/// itself.
#[derive(Debug)]
pub struct HookEvent<'a> {
    pub id: CoroId,
    pub status: CoroStatus,
    pub cancelled: bool,
    pub error: Option<&'a TaskError>,
    pub outputs: &'a [Value],
}

/// Opaque handle to one registered hook, for
/// [`Scheduler::unhook`](super::Scheduler::unhook).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookToken {
    pub(crate) coro: CoroId,
    pub(crate) hook: SlotKey,
}

pub(crate) type HookFn = Box<dyn FnMut(&HookEvent<'_>)>;

pub(crate) struct HookSlot {
    pub(crate) callback: Option<HookFn>,
    pub(crate) link: ListLink,
}

#[derive(Debug)]
pub(crate) struct HookAdapter;

impl ListAdapter for HookAdapter {
    type Node = HookSlot;
    fn link(node: &HookSlot) -> &ListLink { &node.link }
    fn link_mut(node: &mut HookSlot) -> &mut ListLink { &mut node.link }
}

/// Ordered hook list with an explicit *next-to-fire* cursor.
///
/// The cursor is what makes concurrent mutation during firing safe: removing the hook
/// the cursor points at advances the cursor first, so a hook may unhook any hook —
/// itself included — while the list is being walked.
pub(crate) struct HookList {
    arena: Slab<HookSlot>,
    list: SlotList<HookAdapter>,
    cursor: Option<SlotKey>,
}

impl HookList {
    pub(crate) fn new() -> Self {
        Self {
            arena: Slab::new(),
            list: SlotList::new(),
            cursor: None,
        }
    }

    pub(crate) fn len(&self) -> usize { self.list.len() }

    pub(crate) fn add(&mut self, callback: HookFn) -> SlotKey {
        let key = self.arena.insert(HookSlot {
            callback: Some(callback),
            link: ListLink::default(),
        });
        self.list.push_back(&mut self.arena, key);
        key
    }

    /// Remove a hook. Legal at any time, including from inside a firing hook; if the
    /// removed hook is the next one to fire, the cursor advances past it.
    pub(crate) fn remove(&mut self, key: SlotKey) {
        if !self.arena.contains(key) {
            return;
        }
        if self.cursor == Some(key) {
            self.cursor = self.list.next(&self.arena, key);
        }
        self.list.erase(&mut self.arena, key);
        self.arena.remove(key);
    }

    pub(crate) fn begin_fire(&mut self) { self.cursor = self.list.head(); }

    /// Advance the cursor and hand out the current hook's callback. The callback is
    /// moved out for the duration of the call so the list can be mutated underneath it.
    pub(crate) fn next_to_fire(&mut self) -> Option<(SlotKey, Option<HookFn>)> {
        let key = self.cursor?;
        self.cursor = self.list.next(&self.arena, key);
        let callback = self.arena[key].callback.take();
        Some((key, callback))
    }

    /// Return a callback after its call, unless its slot was unhooked (or re-used by a
    /// hook registered during the call) in the meantime.
    pub(crate) fn put_back(&mut self, key: SlotKey, callback: HookFn) {
        if let Some(slot) = self.arena.get_mut(key) {
            if slot.callback.is_none() {
                slot.callback = Some(callback);
            }
        }
    }

    pub(crate) fn end_fire(&mut self) { self.cursor = None; }
}

impl Debug for HookList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookList")
            .field("len", &self.list.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// One live coroutine as the scheduler tracks it: queue link (busy XOR wait), identity
/// index link, the suspended task, its hooks, and — once terminal — its result.
pub(crate) struct CoroEntry {
    pub(crate) id: CoroId,
    pub(crate) status: CoroStatus,
    pub(crate) task: Option<Box<dyn Task>>,
    pub(crate) hooks: HookList,
    pub(crate) result: Option<Result<Outputs, TaskError>>,
    /// Guards against re-entrant hook firing for the same coroutine.
    pub(crate) firing: bool,
    pub(crate) run_link: ListLink,
    pub(crate) tree_link: TreeLink,
}

impl CoroEntry {
    pub(crate) fn new(id: CoroId, task: Box<dyn Task>) -> Self {
        Self {
            id,
            status: CoroStatus::Busy,
            task: Some(task),
            hooks: HookList::new(),
            result: None,
            firing: false,
            run_link: ListLink::default(),
            tree_link: TreeLink::default(),
        }
    }
}

impl Debug for CoroEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoroEntry")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
