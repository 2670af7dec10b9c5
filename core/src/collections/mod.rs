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

//! Index-linked intrusive containers over [`slab::Slab`] arenas.
//!
//! A node that embeds both a [`ListLink`] and a [`TreeLink`] can live in a queue and an
//! ordered index at the same time with no allocation beyond its arena slot; this is the
//! backbone of the scheduler's coroutine bookkeeping.

// Attach sources.
pub mod slot_list;
pub mod slot_tree;

// Re-export.
pub use slot_list::*;
pub use slot_tree::*;

/// Key of a node inside its backing [`slab::Slab`] arena.
pub type SlotKey = usize;
