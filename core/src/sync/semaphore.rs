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

//! Counting semaphore on std primitives. See [`Semaphore`] for details.

use std::sync::{Condvar, Mutex};

/// Counting semaphore: [`wait`](Self::wait) blocks until the count is positive and
/// decrements it; [`post`](Self::post) increments and wakes one waiter.
///
/// The cross-thread call gate uses one of these per call record as a single-use binary
/// semaphore; script embeddings can also hand them out as a host primitive.
#[derive(Debug)]
pub struct Semaphore {
    count: Mutex<u32>,
    available: Condvar,
}

impl Semaphore {
    #[must_use]
    pub fn new(initial: u32) -> Self {
        Self {
            count: Mutex::new(initial),
            available: Condvar::new(),
        }
    }

    pub fn wait(&self) {
        let mut count = self.count.lock().expect("semaphore mutex");
        while *count == 0 {
            count = self.available.wait(count).expect("semaphore mutex");
        }
        *count -= 1;
    }

    /// Non-blocking variant: take a permit if one is available.
    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock().expect("semaphore mutex");
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    pub fn post(&self) {
        let mut count = self.count.lock().expect("semaphore mutex");
        *count += 1;
        self.available.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread, time::Duration};

    #[test]
    fn wait_consumes_initial_permits() {
        let sem = Semaphore::new(2);
        sem.wait();
        sem.wait();
        assert!(!sem.try_wait());
    }

    #[test]
    fn post_unblocks_a_waiting_thread() {
        let sem = Arc::new(Semaphore::new(0));
        let sem_in_thread = Arc::clone(&sem);

        let waiter = thread::spawn(move || {
            sem_in_thread.wait();
            true
        });

        thread::sleep(Duration::from_millis(5));
        sem.post();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn try_wait_never_blocks() {
        let sem = Semaphore::new(0);
        assert!(!sem.try_wait());
        sem.post();
        assert!(sem.try_wait());
        assert!(!sem.try_wait());
    }
}
