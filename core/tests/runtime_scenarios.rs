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

//! End-to-end scenarios over the assembled [`Runtime`]: sleep/wake timing,
//! cross-thread call ordering, and cancellation during wait.

use autorun_core::{
    sleep, CoroStatus, Runtime, RuntimeOptions, TaskCtx, TaskStep, Timer, TimerRef, Value,
};
use std::{
    cell::RefCell,
    rc::Rc,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

/// A coroutine that sleeps 10ms is resumed on the first pass after the timer fires,
/// with at least the requested time elapsed.
#[test]
#[serial_test::serial]
fn sleeping_coroutine_wakes_after_the_timeout() {
    let runtime = Runtime::init(RuntimeOptions::default());
    let started = Instant::now();
    let woke_after = Rc::new(RefCell::new(None));

    let woke_in_task = Rc::clone(&woke_after);
    let mut parked = false;
    runtime.scheduler().spawn(move |cx: &mut TaskCtx<'_>| {
        if parked {
            *woke_in_task.borrow_mut() = Some(started.elapsed());
            return TaskStep::Complete(Default::default());
        }
        parked = true;
        sleep(cx, Duration::from_millis(10));
        TaskStep::Yield
    });

    runtime.run().unwrap();

    let elapsed = woke_after.borrow().expect("coroutine resumed after sleep");
    assert!(elapsed >= Duration::from_millis(10), "woke after {elapsed:?}");
}

/// Three calls from one background thread execute on the scheduler thread in enqueue
/// order; the caller observes the replies in the same order.
#[test]
fn cross_thread_calls_preserve_per_thread_fifo_order() {
    let runtime = Runtime::init(RuntimeOptions::default());

    // A server coroutine keeps the runtime alive until the background thread is done:
    // it parks once and completes on its post-wake resume.
    let mut parked = false;
    let served = runtime.scheduler().spawn(move |cx: &mut TaskCtx<'_>| {
        if parked {
            return TaskStep::Complete(Default::default());
        }
        parked = true;
        cx.set_wait();
        TaskStep::Yield
    });

    let executed = Arc::new(Mutex::new(Vec::<i64>::new()));
    let caller = runtime.gate_caller();

    let executed_in_thread = Arc::clone(&executed);
    let worker = thread::spawn(move || {
        let mut replies = vec![];
        for i in 1..=3_i64 {
            let executed_in_job = Arc::clone(&executed_in_thread);
            let reply = caller
                .call(move |_sched| {
                    executed_in_job.lock().unwrap().push(i);
                    Value::Int(i)
                })
                .unwrap();
            replies.push(reply);
        }
        // Final call releases the server coroutine so the runtime can drain.
        caller
            .call(move |sched| {
                sched.set_state(served, CoroStatus::Busy);
                Value::Nil
            })
            .unwrap();
        replies
    });

    runtime.run().unwrap();
    let replies = worker.join().unwrap();

    assert_eq!(*executed.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(
        replies,
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
}

/// Cancelling a runtime whose only coroutine is waiting delivers a cancelled terminal
/// hook, exits the loop, and suppresses every later timer callback.
#[test]
#[serial_test::serial]
fn stop_during_wait_cancels_cleanly_and_silences_timers() {
    let runtime = Runtime::init(RuntimeOptions::default());

    let id = runtime.scheduler().spawn(|cx: &mut TaskCtx<'_>| {
        cx.set_wait();
        TaskStep::Yield
    });

    let saw_cancel = Rc::new(RefCell::new(false));
    let saw_cancel_in_hook = Rc::clone(&saw_cancel);
    runtime
        .scheduler()
        .hook(id, move |event| {
            if event.status == CoroStatus::Failed && event.cancelled {
                *saw_cancel_in_hook.borrow_mut() = true;
            }
        })
        .unwrap();

    // A timer far in the future; it must never fire once the runtime is torn down.
    let late_fired = Arc::new(AtomicBool::new(false));
    let late_fired_in_cb = Arc::clone(&late_fired);
    let late_timer = Timer::create(runtime.reactor());
    late_timer.start(
        Duration::from_millis(100),
        Duration::ZERO,
        move |_this: TimerRef<'_>| {
            late_fired_in_cb.store(true, Ordering::SeqCst);
        },
    );

    let stopper = runtime.stopper();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        stopper.stop();
    });

    runtime.run().unwrap();
    canceller.join().unwrap();

    assert!(*saw_cancel.borrow(), "terminal hook must carry the cancelled marker");
    thread::sleep(Duration::from_millis(120));
    assert!(
        !late_fired.load(Ordering::SeqCst),
        "no timer callback may fire after teardown"
    );
}
