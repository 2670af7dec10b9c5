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

//! The canonical suspension pattern, packaged: park the coroutine, arm a one-shot
//! timer, let the timer callback flip it back to busy.

use crate::reactor::{Timer, TimerRef};
use crate::sched::{CoroStatus, TaskCtx};
use std::time::Duration;

/// Park the calling coroutine for at least `timeout`. The task must yield right after
/// calling this; the scheduler resumes it on the first pass after the timer fires.
///
/// Exactly one timer is created, and it destroys itself from inside its own callback.
pub fn sleep(cx: &TaskCtx<'_>, timeout: Duration) {
    let sched = cx.scheduler().clone();
    let id = cx.id();

    let timer = Timer::create(cx.reactor());
    timer.start(timeout, Duration::ZERO, move |this: TimerRef<'_>| {
        sched.set_state(id, CoroStatus::Busy);
        this.destroy();
    });

    cx.set_wait();
}
