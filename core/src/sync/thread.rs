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

//! Background-thread spawning for script embeddings.
//!
//! Background threads never touch scheduler state directly; their only ways back into
//! coroutine-land are [`NotifySender::send`](crate::NotifySender::send) and
//! [`GateCaller::call`](crate::GateCaller::call).

use std::{io, thread};

/// Joinable handle over one background OS thread.
#[derive(Debug)]
pub struct ThreadHandle {
    inner: thread::JoinHandle<()>,
}

impl ThreadHandle {
    /// Block until the thread finishes. Panics in the thread are surfaced here.
    pub fn join(self) {
        self.inner.join().expect("background thread panicked");
    }
}

/// Spawn a named background thread.
pub fn spawn_joinable(
    name: impl Into<String>,
    body: impl FnOnce() + Send + 'static,
) -> io::Result<ThreadHandle> {
    let inner = thread::Builder::new().name(name.into()).spawn(body)?;
    Ok(ThreadHandle { inner })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    #[test]
    fn spawned_thread_runs_and_joins() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_thread = Arc::clone(&ran);

        let handle = spawn_joinable("worker", move || {
            ran_in_thread.store(true, Ordering::SeqCst);
        })
        .unwrap();

        handle.join();
        assert!(ran.load(Ordering::SeqCst));
    }
}
