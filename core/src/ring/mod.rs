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

//! Bounded byte FIFO with reserve/commit/consume tokens and overwrite-under-pressure.
//! See [`RingBuffer`] for details.
//!
//! The typical use is capturing a byte stream from a producer that must never block
//! (e.g. a child process's standard output) while the consumer is suspended: under
//! [`ReservePolicy::Overwrite`] the producer reclaims the oldest committed records
//! instead of stalling.

// Attach sources.
pub mod ring_buffer;

// Re-export.
pub use ring_buffer::*;
