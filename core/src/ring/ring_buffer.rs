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

//! In-place, overwritable FIFO of variable-length byte records. See [`RingBuffer`] for
//! details.

use std::fmt::Debug;

/// Offset value that means "no record". Offset `0` can never address a record because
/// the first record starts at [`BASE`].
const NIL: usize = 0;

/// Offset of the first record in the arena. The first [`BASE`] bytes are dead space so
/// that offset `0` stays free to act as [`NIL`].
const BASE: usize = 8;

/// Encoded record header: physical next/prev, temporal newer/older, state, payload
/// length. Six little-endian `u64` fields.
const HEADER_BYTES: usize = 48;

const FIELD_PHYS_NEXT: usize = 0;
const FIELD_PHYS_PREV: usize = 8;
const FIELD_NEWER: usize = 16;
const FIELD_OLDER: usize = 24;
const FIELD_STATE: usize = 32;
const FIELD_LEN: usize = 40;

/// Lifecycle state of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum RecordState {
    /// Reserved, payload being filled in.
    Writing,
    /// Committed, eligible for [`RingBuffer::consume`].
    Committed,
    /// Handed to a consumer, not yet released.
    Reading,
}

impl RecordState {
    fn encode(self) -> u64 {
        match self {
            RecordState::Writing => 0,
            RecordState::Committed => 1,
            RecordState::Reading => 2,
        }
    }

    fn try_decode(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(RecordState::Writing),
            1 => Some(RecordState::Committed),
            2 => Some(RecordState::Reading),
            _ => None,
        }
    }
}

/// Value written into the state field of deleted records, so that a stale token is
/// rejected instead of misread.
const STATE_TOMBSTONE: u64 = u64::MAX;

/// Per-state record counts. [`total`](Self::total) is the number of live records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingCounters {
    pub committed: usize,
    pub writing: usize,
    pub reading: usize,
}

impl RingCounters {
    #[must_use]
    pub fn total(&self) -> usize { self.committed + self.writing + self.reading }
}

/// What [`RingBuffer::reserve`] may do when the arena is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservePolicy {
    /// Fail the reservation.
    Reject,
    /// Reclaim the oldest contiguous committed records to make room.
    Overwrite,
}

/// How [`RingBuffer::commit`] releases a token.
///
/// On a *writing* token, `Commit` publishes the record and `Discard`/`Abandon` delete it
/// as though the reservation never happened. On a *reading* token, `Commit` destroys the
/// record, `Discard` returns it to *committed* (refused while a newer record is being
/// read, because re-queueing it would break FIFO order), and `Abandon` is `Discard` that
/// falls back to destruction instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    Commit,
    Discard,
    Abandon,
}

/// Opaque handle to one record. Valid until committed; after that the underlying bytes
/// may be reused by later reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingToken {
    off: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    #[error("a newer record is being read; un-reading this one would break FIFO order")]
    NewerReaderActive,
    #[error("token does not reference a writing or reading record")]
    InvalidToken,
}

/// A bytes-in / bytes-out bounded FIFO over a fixed arena, with three-stage record
/// lifecycle (reserve → commit → consume) and optional overwrite of the oldest committed
/// records under pressure.
///
/// Records carry their own metadata inside the arena and are linked into two rings by
/// byte offset: the *physical* ring (arena layout order, cyclic) and the *temporal* ring
/// (commit order, nil-terminated at both ends). Three cursors are maintained: `head`
/// (newest record), `tail` (oldest live record), and `reserve` (oldest record not yet
/// handed to a consumer).
///
/// All operations are single-threaded; wrap the buffer if producer and consumer live on
/// different threads.
pub struct RingBuffer {
    arena: Vec<u8>,
    capacity: usize,
    head: usize,
    tail: usize,
    reserve: usize,
    counters: RingCounters,
}

impl Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("reserve", &self.reserve)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl RingBuffer {
    /// Create a buffer with `capacity` usable bytes. Fails when even a zero-length
    /// record would not fit.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Option<Self> {
        if capacity < Self::record_cost(0) {
            return None;
        }
        Some(Self {
            arena: vec![0; BASE + capacity],
            capacity,
            head: NIL,
            tail: NIL,
            reserve: NIL,
            counters: RingCounters::default(),
        })
    }

    /// Arena bytes one record of `len` payload bytes occupies (header + payload,
    /// 8-aligned).
    #[must_use]
    pub const fn record_cost(len: usize) -> usize { (HEADER_BYTES + len + 7) & !7 }

    #[must_use]
    pub fn capacity(&self) -> usize { self.capacity }

    #[must_use]
    pub fn count(&self) -> RingCounters { self.counters }

    /// Allocate a record of `len` payload bytes. The returned token is in *writing*
    /// state; fill the payload through [`writable`](Self::writable) and publish it with
    /// [`commit`](Self::commit).
    ///
    /// Placement: physically after the current head when the right-hand gap is large
    /// enough; otherwise at the arena start when the left-hand prefix (before the
    /// physically-first record) is large enough; otherwise, under
    /// [`ReservePolicy::Overwrite`], by reclaiming the oldest contiguous committed
    /// records; otherwise the reservation fails.
    pub fn reserve(&mut self, len: usize, policy: ReservePolicy) -> Option<RingToken> {
        let record_size = Self::record_cost(len);
        if self.tail == NIL {
            return self.reserve_empty(len, record_size);
        }
        self.reserve_non_empty(len, record_size, policy)
    }

    /// Release a token. See [`CommitMode`] for the per-state meanings.
    pub fn commit(&mut self, token: RingToken, mode: CommitMode) -> Result<(), RingError> {
        if !self.is_live_record(token.off) {
            return Err(RingError::InvalidToken);
        }
        let Some(state) = RecordState::try_decode(self.field(token.off, FIELD_STATE) as u64)
        else {
            return Err(RingError::InvalidToken);
        };
        match state {
            RecordState::Writing => {
                self.counters.writing -= 1;
                match mode {
                    CommitMode::Commit => {
                        self.counters.committed += 1;
                        self.set_state(token.off, RecordState::Committed);
                    }
                    CommitMode::Discard | CommitMode::Abandon => self.delete_record(token.off),
                }
                Ok(())
            }
            RecordState::Reading => match mode {
                CommitMode::Commit => {
                    self.counters.reading -= 1;
                    self.delete_record(token.off);
                    Ok(())
                }
                CommitMode::Discard => self.unread(token.off, false),
                CommitMode::Abandon => self.unread(token.off, true),
            },
            RecordState::Committed => Err(RingError::InvalidToken),
        }
    }

    /// Take the oldest committed record for reading, advancing the reserve cursor.
    /// Returns records strictly in commit order.
    pub fn consume(&mut self) -> Option<RingToken> {
        let off = self.reserve;
        if off == NIL || self.state(off) != RecordState::Committed {
            return None;
        }
        self.counters.committed -= 1;
        self.counters.reading += 1;
        self.reserve = self.older_to_newer(off);
        self.set_state(off, RecordState::Reading);
        Some(RingToken { off })
    }

    /// Oldest committed record, for non-destructive iteration toward the head via
    /// [`next`](Self::next).
    #[must_use]
    pub fn begin(&self) -> Option<RingToken> {
        let mut cursor = self.tail;
        while cursor != NIL {
            if self.state(cursor) == RecordState::Committed {
                return Some(RingToken { off: cursor });
            }
            cursor = self.older_to_newer(cursor);
        }
        None
    }

    /// Next committed record after `token`, temporally newer.
    #[must_use]
    pub fn next(&self, token: RingToken) -> Option<RingToken> {
        let mut cursor = self.older_to_newer(token.off);
        while cursor != NIL {
            if self.state(cursor) == RecordState::Committed {
                return Some(RingToken { off: cursor });
            }
            cursor = self.older_to_newer(cursor);
        }
        None
    }

    /// Mutable payload of a *writing* record.
    pub fn writable(&mut self, token: RingToken) -> &mut [u8] {
        debug_assert_eq!(self.state(token.off), RecordState::Writing);
        let len = self.payload_len(token);
        let start = token.off + HEADER_BYTES;
        &mut self.arena[start..start + len]
    }

    /// Payload of a record (any state).
    #[must_use]
    pub fn readable(&self, token: RingToken) -> &[u8] {
        let len = self.payload_len(token);
        let start = token.off + HEADER_BYTES;
        &self.arena[start..start + len]
    }

    #[must_use]
    pub fn payload_len(&self, token: RingToken) -> usize { self.field(token.off, FIELD_LEN) }

    #[must_use]
    pub fn state_of(&self, token: RingToken) -> RecordState { self.state(token.off) }

    fn reserve_empty(&mut self, len: usize, record_size: usize) -> Option<RingToken> {
        if record_size > self.capacity {
            return None;
        }
        let off = BASE;
        self.set_field(off, FIELD_PHYS_NEXT, off);
        self.set_field(off, FIELD_PHYS_PREV, off);
        self.set_field(off, FIELD_NEWER, NIL);
        self.set_field(off, FIELD_OLDER, NIL);
        self.set_field(off, FIELD_LEN, len);
        self.set_state(off, RecordState::Writing);
        self.head = off;
        self.tail = off;
        self.reserve = off;
        self.counters.writing += 1;
        Some(RingToken { off })
    }

    fn reserve_non_empty(
        &mut self,
        len: usize,
        record_size: usize,
        policy: ReservePolicy,
    ) -> Option<RingToken> {
        let head = self.head;
        let next_possible = head + self.cost_at(head);
        let head_phys_next = self.field(head, FIELD_PHYS_NEXT);

        // A record exists physically to the right of head: use the gap before it.
        if head_phys_next > head {
            if head_phys_next - next_possible >= record_size {
                return Some(self.insert_record(next_possible, len));
            }
            return match policy {
                ReservePolicy::Overwrite => self.try_overwrite(len, record_size),
                ReservePolicy::Reject => None,
            };
        }

        // Head is physically rightmost: use the remaining right-hand space.
        if self.capacity - (next_possible - BASE) >= record_size {
            return Some(self.insert_record(next_possible, len));
        }

        // Wrap: use the left-hand prefix before the physically-first record.
        if head_phys_next - BASE >= record_size {
            return Some(self.insert_record(BASE, len));
        }

        match policy {
            ReservePolicy::Overwrite => self.try_overwrite(len, record_size),
            ReservePolicy::Reject => None,
        }
    }

    /// Link a fresh *writing* record at `off`, physically and temporally after the
    /// current head.
    fn insert_record(&mut self, off: usize, len: usize) -> RingToken {
        let head = self.head;
        let head_phys_next = self.field(head, FIELD_PHYS_NEXT);

        self.set_field(off, FIELD_LEN, len);
        self.set_state(off, RecordState::Writing);

        self.set_field(off, FIELD_PHYS_NEXT, head_phys_next);
        self.set_field(off, FIELD_PHYS_PREV, head);
        self.set_field(head_phys_next, FIELD_PHYS_PREV, off);
        self.set_field(head, FIELD_PHYS_NEXT, off);

        self.set_field(off, FIELD_NEWER, NIL);
        self.set_field(off, FIELD_OLDER, head);
        self.set_field(head, FIELD_NEWER, off);
        self.head = off;

        if self.reserve == NIL {
            self.reserve = off;
        }
        self.counters.writing += 1;
        RingToken { off }
    }

    /// Reclaim the oldest contiguous committed records to fit a new one. Walks forward
    /// from the reserve record across records that are committed, physically as well as
    /// temporally contiguous, and on the same side of the arena wrap point.
    fn try_overwrite(&mut self, len: usize, record_size: usize) -> Option<RingToken> {
        let reserve = self.reserve;
        if reserve == NIL || self.state(reserve) != RecordState::Committed {
            return None;
        }

        // Sole record: if the whole arena suffices, start over from scratch.
        if self.field(reserve, FIELD_PHYS_NEXT) == reserve {
            if self.capacity < record_size {
                return None;
            }
            self.reinit();
            return self.reserve_empty(len, record_size);
        }

        // Where the reclaimed span starts: right behind the physically-previous record,
        // or at the arena start when the reserve record is physically first.
        let backward = self.field(reserve, FIELD_PHYS_PREV);
        let span_start = if backward < reserve {
            backward + self.cost_at(backward)
        } else {
            BASE
        };

        // Accumulate contiguous committed records until the span is large enough.
        let mut span_size;
        let mut reclaimed = 1_usize;
        let mut span_end = reserve;
        loop {
            span_size = span_end + self.cost_at(span_end) - span_start;
            let forward = self.field(span_end, FIELD_PHYS_NEXT);
            let extend = span_size < record_size
                && self.state(forward) == RecordState::Committed
                && self.field(span_end, FIELD_PHYS_NEXT) == self.field(span_end, FIELD_NEWER)
                && forward > span_end;
            if !extend {
                break;
            }
            span_end = forward;
            reclaimed += 1;
        }
        if span_size < record_size {
            return None;
        }

        // Walk reclaimed every live record: offsets into the excised span must not be
        // re-linked, so start over from scratch instead.
        if self.field(reserve, FIELD_OLDER) == NIL && self.field(span_end, FIELD_NEWER) == NIL {
            self.reinit();
            return self.reserve_empty(len, record_size);
        }

        Some(self.perform_overwrite(span_start, reserve, span_end, reclaimed, len))
    }

    fn perform_overwrite(
        &mut self,
        span_start: usize,
        first: usize,
        last: usize,
        reclaimed: usize,
        len: usize,
    ) -> RingToken {
        // The new record may alias `first`'s header bytes; read every needed field
        // before the first write.
        let newer_of_last = self.field(last, FIELD_NEWER);
        let older_of_first = self.field(first, FIELD_OLDER);
        let phys_after = self.field(last, FIELD_PHYS_NEXT);
        let phys_before = self.field(first, FIELD_PHYS_PREV);

        // The reclaimed records were the oldest committed ones: reserve (and tail, when
        // no reader is older) advance past them.
        if self.tail == self.reserve {
            self.tail = newer_of_last;
        }
        self.reserve = newer_of_last;

        let off = span_start;

        // Physical ring: the new record takes the span's place.
        self.set_field(off, FIELD_PHYS_NEXT, phys_after);
        self.set_field(phys_after, FIELD_PHYS_PREV, off);
        self.set_field(off, FIELD_PHYS_PREV, phys_before);
        self.set_field(phys_before, FIELD_PHYS_NEXT, off);

        // Temporal ring: excise the span, then link the new record as newest.
        if older_of_first != NIL {
            self.set_field(older_of_first, FIELD_NEWER, newer_of_last);
        }
        if newer_of_last != NIL {
            self.set_field(newer_of_last, FIELD_OLDER, older_of_first);
        } else {
            // The span reached the old head; the newest survivor is on the older side.
            self.head = older_of_first;
        }
        self.set_field(off, FIELD_NEWER, NIL);
        self.set_field(off, FIELD_OLDER, self.head);
        self.set_field(self.head, FIELD_NEWER, off);
        self.head = off;

        if self.reserve == NIL {
            self.reserve = off;
        }

        self.counters.committed -= reclaimed;
        self.counters.writing += 1;
        self.set_field(off, FIELD_LEN, len);
        self.set_state(off, RecordState::Writing);
        RingToken { off }
    }

    /// Remove a record from both rings, fixing up head/tail/reserve.
    fn delete_record(&mut self, off: usize) {
        let at = off + FIELD_STATE;
        self.arena[at..at + 8].copy_from_slice(&STATE_TOMBSTONE.to_le_bytes());
        if self.field(off, FIELD_PHYS_NEXT) == off {
            self.reinit();
            return;
        }

        let phys_prev = self.field(off, FIELD_PHYS_PREV);
        let phys_next = self.field(off, FIELD_PHYS_NEXT);
        self.set_field(phys_prev, FIELD_PHYS_NEXT, phys_next);
        self.set_field(phys_next, FIELD_PHYS_PREV, phys_prev);

        let older = self.field(off, FIELD_OLDER);
        let newer = self.field(off, FIELD_NEWER);
        if older != NIL {
            self.set_field(older, FIELD_NEWER, newer);
        }
        if newer != NIL {
            self.set_field(newer, FIELD_OLDER, older);
        }

        if self.reserve == off {
            self.reserve = newer;
        }
        if older == NIL {
            self.tail = newer;
            return;
        }
        if newer == NIL {
            self.head = older;
        }
    }

    /// Return a *reading* record to *committed*, provided FIFO order survives. With
    /// `abandon`, fall back to destroying the record instead of failing.
    fn unread(&mut self, off: usize, abandon: bool) -> Result<(), RingError> {
        let newer = self.field(off, FIELD_NEWER);
        if newer != NIL && self.state(newer) == RecordState::Reading {
            if abandon {
                self.counters.reading -= 1;
                self.delete_record(off);
                return Ok(());
            }
            return Err(RingError::NewerReaderActive);
        }

        self.counters.reading -= 1;
        self.counters.committed += 1;
        self.set_state(off, RecordState::Committed);

        // Move the reserve cursor back onto this record.
        if newer == NIL || (self.reserve != NIL && self.field(self.reserve, FIELD_OLDER) == off) {
            self.reserve = off;
        } else if self.reserve == NIL {
            self.reserve = off;
        }
        Ok(())
    }

    fn reinit(&mut self) {
        self.head = NIL;
        self.tail = NIL;
        self.reserve = NIL;
        self.counters = RingCounters::default();
    }

    fn older_to_newer(&self, off: usize) -> usize { self.field(off, FIELD_NEWER) }

    fn cost_at(&self, off: usize) -> usize { Self::record_cost(self.field(off, FIELD_LEN)) }

    fn state(&self, off: usize) -> RecordState {
        RecordState::try_decode(self.field(off, FIELD_STATE) as u64)
            .expect("live record has a valid state")
    }

    fn set_state(&mut self, off: usize, state: RecordState) {
        self.set_field(off, FIELD_STATE, state.encode() as usize);
    }

    fn field(&self, off: usize, field: usize) -> usize {
        let at = off + field;
        let raw: [u8; 8] = self.arena[at..at + 8]
            .try_into()
            .expect("field slice is 8 bytes");
        u64::from_le_bytes(raw) as usize
    }

    fn set_field(&mut self, off: usize, field: usize, value: usize) {
        let at = off + field;
        self.arena[at..at + 8].copy_from_slice(&(value as u64).to_le_bytes());
    }

    /// Cheap token sanity check: a live record must sit between [`BASE`] and the arena
    /// end, and the temporal chain from the tail must reach it. Only the range check is
    /// done here; the chain membership is implied by state dispatch in `commit`.
    fn is_live_record(&self, off: usize) -> bool {
        self.tail != NIL && off >= BASE && off + HEADER_BYTES <= self.arena.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    /// Reserve, fill with `tag`, commit.
    fn push(rb: &mut RingBuffer, len: usize, tag: u8) -> RingToken {
        let token = rb
            .reserve(len, ReservePolicy::Reject)
            .expect("reservation fits");
        rb.writable(token).fill(tag);
        rb.commit(token, CommitMode::Commit).unwrap();
        token
    }

    /// Walks both chains and cross-checks them against the counters. Mirrors the
    /// documented structural invariants: the temporal walk from the tail visits every
    /// live record exactly once, and the physical ring closes on itself within the same
    /// number of steps.
    fn assert_chains_consistent(rb: &RingBuffer) {
        let live = rb.count().total();
        if live == 0 {
            assert_eq!(rb.tail, NIL);
            assert_eq!(rb.head, NIL);
            assert_eq!(rb.reserve, NIL);
            return;
        }

        // Temporal: tail → head via newer links, with older links mirroring.
        let mut seen = vec![];
        let mut cursor = rb.tail;
        let mut prior = NIL;
        while cursor != NIL {
            assert_eq!(rb.field(cursor, FIELD_OLDER), prior, "older link mirrors");
            seen.push(cursor);
            prior = cursor;
            cursor = rb.field(cursor, FIELD_NEWER);
            assert!(seen.len() <= live, "temporal chain longer than live count");
        }
        assert_eq!(seen.len(), live);
        assert_eq!(*seen.last().unwrap(), rb.head);

        // Physical: any record returns to itself in exactly `live` steps, with prev
        // links mirroring.
        let start = rb.tail;
        let mut cursor = start;
        for step in 1..=live {
            let next = rb.field(cursor, FIELD_PHYS_NEXT);
            assert_eq!(rb.field(next, FIELD_PHYS_PREV), cursor, "prev link mirrors");
            cursor = next;
            if cursor == start {
                assert_eq!(step, live, "physical ring closed early");
                break;
            }
        }
        assert_eq!(cursor, start, "physical ring did not close");
    }

    fn committed_tags(rb: &RingBuffer) -> Vec<u8> {
        let mut out = vec![];
        let mut cursor = rb.begin();
        while let Some(token) = cursor {
            out.push(rb.readable(token)[0]);
            cursor = rb.next(token);
        }
        out
    }

    #[test]
    fn capacity_below_one_empty_record_is_rejected() {
        assert!(RingBuffer::with_capacity(RingBuffer::record_cost(0) - 1).is_none());
        assert!(RingBuffer::with_capacity(RingBuffer::record_cost(0)).is_some());
    }

    #[test]
    fn capacity_of_exactly_one_record_accepts_exactly_one_reservation() {
        let cost = RingBuffer::record_cost(100);
        let mut rb = RingBuffer::with_capacity(cost).unwrap();

        let token = rb.reserve(100, ReservePolicy::Reject).unwrap();
        assert!(rb.reserve(1, ReservePolicy::Reject).is_none());
        rb.commit(token, CommitMode::Commit).unwrap();
        assert!(rb.reserve(1, ReservePolicy::Reject).is_none());
        assert_chains_consistent(&rb);
    }

    #[test]
    fn consume_returns_records_in_commit_order() {
        let mut rb = RingBuffer::with_capacity(4 * RingBuffer::record_cost(16)).unwrap();
        for tag in [1_u8, 2, 3] {
            push(&mut rb, 16, tag);
        }
        assert_chains_consistent(&rb);

        for expected in [1_u8, 2, 3] {
            let token = rb.consume().unwrap();
            assert_eq!(rb.readable(token), vec![expected; 16].as_slice());
            rb.commit(token, CommitMode::Commit).unwrap();
        }
        assert!(rb.consume().is_none());
        assert_eq!(rb.count().total(), 0);
    }

    #[test]
    fn consume_on_empty_or_all_writing_returns_none() {
        let mut rb = RingBuffer::with_capacity(2 * RingBuffer::record_cost(8)).unwrap();
        assert!(rb.consume().is_none());
        let token = rb.reserve(8, ReservePolicy::Reject).unwrap();
        assert!(rb.consume().is_none());
        rb.commit(token, CommitMode::Commit).unwrap();
        assert!(rb.consume().is_some());
    }

    #[test]
    fn discard_of_writing_record_restores_prior_state() {
        let mut rb = RingBuffer::with_capacity(4 * RingBuffer::record_cost(16)).unwrap();
        push(&mut rb, 16, 1);
        push(&mut rb, 16, 2);
        let before = rb.count();

        let token = rb.reserve(16, ReservePolicy::Reject).unwrap();
        rb.writable(token).fill(9);
        rb.commit(token, CommitMode::Discard).unwrap();

        assert_eq!(rb.count(), before);
        assert_eq!(committed_tags(&rb), vec![1, 2]);
        assert_chains_consistent(&rb);

        // The buffer must still behave as if the reservation never happened.
        push(&mut rb, 16, 3);
        assert_eq!(committed_tags(&rb), vec![1, 2, 3]);
    }

    #[test]
    fn reserve_without_overwrite_never_reclaims() {
        let mut rb = RingBuffer::with_capacity(2 * RingBuffer::record_cost(32)).unwrap();
        push(&mut rb, 32, 1);
        push(&mut rb, 32, 2);

        assert!(rb.reserve(32, ReservePolicy::Reject).is_none());
        assert_eq!(committed_tags(&rb), vec![1, 2]);
        assert_chains_consistent(&rb);
    }

    /// The documented overwrite scenario: three committed records A/B/C, then a
    /// reservation that needs the A+B span. A and B are reclaimed, C survives, and
    /// consumption order is C then the new record.
    #[test]
    fn overwrite_reclaims_oldest_contiguous_span() {
        let mut rb = RingBuffer::with_capacity(3 * RingBuffer::record_cost(100)).unwrap();
        push(&mut rb, 100, b'A');
        push(&mut rb, 100, b'B');
        push(&mut rb, 100, b'C');

        let token = rb.reserve(250, ReservePolicy::Overwrite).unwrap();
        rb.writable(token).fill(b'D');
        rb.commit(token, CommitMode::Commit).unwrap();

        assert_eq!(rb.count().committed, 2);
        assert_eq!(committed_tags(&rb), vec![b'C', b'D']);
        assert_chains_consistent(&rb);

        let first = rb.consume().unwrap();
        assert_eq!(rb.readable(first)[0], b'C');
        let second = rb.consume().unwrap();
        assert_eq!(rb.readable(second)[0], b'D');
        assert_eq!(rb.readable(second).len(), 250);
    }

    #[test]
    fn overwrite_fails_when_reserve_record_is_being_read() {
        let cost = RingBuffer::record_cost(64);
        let mut rb = RingBuffer::with_capacity(cost).unwrap();
        push(&mut rb, 64, 1);
        let reading = rb.consume().unwrap();
        let before = rb.count();

        // Single *reading* record at the tail; an oversized overwrite must not touch it.
        assert!(rb.reserve(64, ReservePolicy::Overwrite).is_none());
        assert_eq!(rb.count(), before);
        assert_eq!(rb.state_of(reading), RecordState::Reading);
        assert_eq!(rb.readable(reading), vec![1; 64].as_slice());
        assert_chains_consistent(&rb);
    }

    #[test]
    fn overwrite_of_sole_committed_record_reinitializes() {
        let mut rb = RingBuffer::with_capacity(RingBuffer::record_cost(200)).unwrap();
        push(&mut rb, 10, 1);

        // The sole record's span is too small, but the whole arena fits the request.
        let token = rb.reserve(200, ReservePolicy::Overwrite).unwrap();
        rb.writable(token).fill(2);
        rb.commit(token, CommitMode::Commit).unwrap();

        assert_eq!(rb.count().committed, 1);
        assert_eq!(committed_tags(&rb), vec![2]);
        assert_chains_consistent(&rb);
    }

    #[test]
    fn overwrite_stops_at_reading_records() {
        let mut rb = RingBuffer::with_capacity(3 * RingBuffer::record_cost(100)).unwrap();
        push(&mut rb, 100, 1);
        push(&mut rb, 100, 2);
        push(&mut rb, 100, 3);
        let reading = rb.consume().unwrap();

        // Only records 2 and 3 are committed; they fit a 250-byte request, and the
        // reading record must survive untouched.
        let token = rb.reserve(250, ReservePolicy::Overwrite).unwrap();
        rb.commit(token, CommitMode::Commit).unwrap();
        assert_eq!(rb.state_of(reading), RecordState::Reading);
        assert_eq!(rb.readable(reading), vec![1; 100].as_slice());
        assert_eq!(rb.count().reading, 1);
        assert_eq!(rb.count().committed, 1);
        assert_chains_consistent(&rb);
    }

    #[test]
    fn wrap_places_record_in_left_prefix() {
        let cost = RingBuffer::record_cost(32);
        let mut rb = RingBuffer::with_capacity(3 * cost).unwrap();
        push(&mut rb, 32, 1);
        push(&mut rb, 32, 2);
        push(&mut rb, 32, 3);

        // Free the first record: the only room left is the left-hand prefix.
        let token = rb.consume().unwrap();
        rb.commit(token, CommitMode::Commit).unwrap();
        push(&mut rb, 32, 4);

        assert_eq!(committed_tags(&rb), vec![2, 3, 4]);
        assert_chains_consistent(&rb);

        for expected in [2_u8, 3, 4] {
            let token = rb.consume().unwrap();
            assert_eq!(rb.readable(token)[0], expected);
            rb.commit(token, CommitMode::Commit).unwrap();
        }
    }

    #[test]
    fn unread_returns_record_to_consumers() {
        let mut rb = RingBuffer::with_capacity(3 * RingBuffer::record_cost(8)).unwrap();
        push(&mut rb, 8, 1);
        push(&mut rb, 8, 2);

        let token = rb.consume().unwrap();
        rb.commit(token, CommitMode::Discard).unwrap();

        // The discarded read is observable again, in the original order.
        assert_eq!(committed_tags(&rb), vec![1, 2]);
        let again = rb.consume().unwrap();
        assert_eq!(rb.readable(again)[0], 1);
        assert_chains_consistent(&rb);
    }

    #[test]
    fn unread_behind_newer_reader_is_refused_unless_abandoned() {
        let mut rb = RingBuffer::with_capacity(3 * RingBuffer::record_cost(8)).unwrap();
        push(&mut rb, 8, 1);
        push(&mut rb, 8, 2);

        let older = rb.consume().unwrap();
        let newer = rb.consume().unwrap();

        assert_eq!(
            rb.commit(older, CommitMode::Discard),
            Err(RingError::NewerReaderActive)
        );
        assert_eq!(rb.count().reading, 2);

        // Abandon falls back to destroying the older record.
        rb.commit(older, CommitMode::Abandon).unwrap();
        assert_eq!(rb.count().reading, 1);
        rb.commit(newer, CommitMode::Commit).unwrap();
        assert_eq!(rb.count().total(), 0);
    }

    #[test]
    fn commit_on_committed_token_is_an_error() {
        let mut rb = RingBuffer::with_capacity(2 * RingBuffer::record_cost(8)).unwrap();
        let token = rb.reserve(8, ReservePolicy::Reject).unwrap();
        rb.commit(token, CommitMode::Commit).unwrap();
        assert_eq!(
            rb.commit(token, CommitMode::Commit),
            Err(RingError::InvalidToken)
        );
    }

    #[test_case(0; "empty payload")]
    #[test_case(1; "one byte")]
    #[test_case(7; "below alignment")]
    #[test_case(8; "exact alignment")]
    #[test_case(100; "typical")]
    fn record_cost_is_aligned_and_covers_header(len: usize) {
        let cost = RingBuffer::record_cost(len);
        assert_eq!(cost % 8, 0);
        assert!(cost >= HEADER_BYTES + len);
        assert!(cost < HEADER_BYTES + len + 8);
    }

    /// Random reserve/commit/consume/discard storm; the structural invariants must hold
    /// after every step.
    #[test]
    fn randomized_lifecycle_shaker_keeps_chains_consistent() {
        use rand::Rng;
        let mut rng = rand::rng();
        let mut rb = RingBuffer::with_capacity(1024).unwrap();
        let mut writing: Vec<RingToken> = vec![];
        let mut reading: Vec<RingToken> = vec![];

        for _ in 0..2000 {
            match rng.random_range(0..5) {
                0 => {
                    let len = rng.random_range(0..64);
                    let policy = if writing.is_empty() && reading.is_empty() {
                        ReservePolicy::Overwrite
                    } else {
                        ReservePolicy::Reject
                    };
                    if let Some(token) = rb.reserve(len, policy) {
                        writing.push(token);
                    }
                }
                1 => {
                    if let Some(token) = writing.pop() {
                        rb.commit(token, CommitMode::Commit).unwrap();
                    }
                }
                2 => {
                    if let Some(token) = writing.pop() {
                        rb.commit(token, CommitMode::Discard).unwrap();
                    }
                }
                3 => {
                    if let Some(token) = rb.consume() {
                        reading.push(token);
                    }
                }
                _ => {
                    // Release the newest reader first so Discard stays legal.
                    if let Some(token) = reading.pop() {
                        let mode = if rng.random_bool(0.5) {
                            CommitMode::Commit
                        } else {
                            CommitMode::Discard
                        };
                        if rb.commit(token, mode).is_err() {
                            rb.commit(token, CommitMode::Abandon).unwrap();
                        }
                    }
                }
            }
            assert_chains_consistent(&rb);
            let counters = rb.count();
            assert_eq!(counters.writing, writing.len());
            assert_eq!(counters.reading, reading.len());
        }
    }
}
