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

//! The resumable-task protocol between the scheduler and the scripting seam. See
//! [`Task`] for details.

use super::scheduler::TaskCtx;
use smallvec::SmallVec;

/// Dynamic value traded across the scripting seam: coroutine return values and
/// cross-thread call replies.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

/// Return values captured when a task completes. Most tasks return zero or one value.
pub type Outputs = SmallVec<[Value; 2]>;

/// Error payload captured when a task fails. The embedding layer decides what goes in
/// the message (script traceback, diagnostics, ...).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    pub message: String,
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self { Self { message } }
}

/// Outcome of one [`Task::resume`] call.
#[derive(Debug)]
pub enum TaskStep {
    /// The task suspended; it stays eligible for the next pass unless it moved itself
    /// to *wait* via [`TaskCtx::set_wait`].
    Yield,
    /// The task finished normally with its return values.
    Complete(Outputs),
    /// The task raised an error.
    Fail(TaskError),
}

/// One suspendable unit of user work, driven by the scheduler.
///
/// `resume` runs on the scheduler thread with no scheduler locks held: the task may
/// freely call back into the scheduler through `cx` (move itself to *wait*, arm timers
/// through the reactor, spawn siblings).
pub trait Task {
    fn resume(&mut self, cx: &mut TaskCtx<'_>) -> TaskStep;
}

/// Closures with the right signature are tasks; handy for tests and small embeddings.
impl<F> Task for F
where
    F: FnMut(&mut TaskCtx<'_>) -> TaskStep,
{
    fn resume(&mut self, cx: &mut TaskCtx<'_>) -> TaskStep { self(cx) }
}
