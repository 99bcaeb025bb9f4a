// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexPay.
//
// PlexPay is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexPay is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexPay. If not, see <https://www.gnu.org/licenses/>.

//! Packed 64-bit breaker state and its CAS helpers.
//!
//! Layout, least significant bits first:
//!
//! | field | bits |
//! |---|---|
//! | state | 2 |
//! | failure count | 10 |
//! | success count | 10 |
//! | openedAt (unix seconds) | 31 |
//!
//! A CAS loser re-reads the word and reevaluates; an operation that finds the
//! state no longer eligible for its transition reports that instead of
//! spinning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const STATE_BITS: u32 = 2;
const FAILURE_BITS: u32 = 10;
const SUCCESS_BITS: u32 = 10;
const OPENED_AT_BITS: u32 = 31;

const STATE_SHIFT: u32 = 0;
const FAILURE_SHIFT: u32 = STATE_SHIFT + STATE_BITS; // 2
const SUCCESS_SHIFT: u32 = FAILURE_SHIFT + FAILURE_BITS; // 12
const OPENED_AT_SHIFT: u32 = SUCCESS_SHIFT + SUCCESS_BITS; // 22

const STATE_MASK: u64 = (1 << STATE_BITS) - 1;
const FAILURE_MASK: u64 = (1 << FAILURE_BITS) - 1;
const SUCCESS_MASK: u64 = (1 << SUCCESS_BITS) - 1;
const OPENED_AT_MASK: u64 = (1 << OPENED_AT_BITS) - 1;

/// Saturation limit of the consecutive-failure counter.
pub const MAX_FAILURE_COUNT: u32 = (1 << FAILURE_BITS) - 1; // 1023
/// Saturation limit of the consecutive-success counter.
pub const MAX_SUCCESS_COUNT: u32 = (1 << SUCCESS_BITS) - 1; // 1023

/// The three breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; requests pass through.
    Closed = 0,
    /// Upstream fenced off; requests are rejected until the recovery timeout.
    Open = 1,
    /// Probing recovery; successes accumulate toward closing.
    HalfOpen = 2,
}

impl CircuitState {
    fn from_bits(bits: u64) -> CircuitState {
        match bits {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            other => panic!("invalid circuit state bits: {other}"),
        }
    }
}

/// Pack the four fields into one word.
///
/// Panics when a counter exceeds its bit width; that indicates a bug, not a
/// runtime condition. `opened_at` is truncated to its 31 bits.
pub fn pack(state: CircuitState, failure: u32, success: u32, opened_at: i64) -> u64 {
    if failure > MAX_FAILURE_COUNT {
        panic!("invalid circuit breaker failure count: {failure}");
    }
    if success > MAX_SUCCESS_COUNT {
        panic!("invalid circuit breaker success count: {success}");
    }

    ((state as u64) << STATE_SHIFT)
        | ((failure as u64) << FAILURE_SHIFT)
        | ((success as u64) << SUCCESS_SHIFT)
        | (((opened_at as u64) & OPENED_AT_MASK) << OPENED_AT_SHIFT)
}

/// Unpack a word into `(state, failure, success, opened_at)`.
pub fn unpack(word: u64) -> (CircuitState, u32, u32, i64) {
    let state = CircuitState::from_bits((word >> STATE_SHIFT) & STATE_MASK);
    let failure = ((word >> FAILURE_SHIFT) & FAILURE_MASK) as u32;
    let success = ((word >> SUCCESS_SHIFT) & SUCCESS_MASK) as u32;
    let opened_at = ((word >> OPENED_AT_SHIFT) & OPENED_AT_MASK) as i64;
    (state, failure, success, opened_at)
}

pub(crate) fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// The packed breaker word plus the thresholds its transitions consult.
///
/// The single `AtomicU64` is the only mutable state; every transition is a
/// compare-and-swap against it.
pub struct PackedBreakerState {
    word: AtomicU64,
    failure_threshold: u32,
    recovery_attempts: u32,
    recovery_timeout_secs: i64,
}

impl PackedBreakerState {
    /// New state in `Closed` with zeroed counters.
    pub fn new(failure_threshold: u32, recovery_attempts: u32, recovery_timeout_secs: i64) -> Self {
        Self {
            word: AtomicU64::new(pack(CircuitState::Closed, 0, 0, 0)),
            failure_threshold,
            recovery_attempts,
            recovery_timeout_secs,
        }
    }

    /// Atomic snapshot of `(state, failure, success, opened_at)`.
    pub fn snapshot(&self) -> (CircuitState, u32, u32, i64) {
        unpack(self.word.load(Ordering::Acquire))
    }

    /// Current state only.
    pub fn circuit_state(&self) -> CircuitState {
        self.snapshot().0
    }

    /// Whether an `Open` breaker's recovery timeout has elapsed.
    pub fn past_recovery_timeout(&self, opened_at: i64) -> bool {
        now_unix_secs() - opened_at >= self.recovery_timeout_secs
    }

    fn cas(&self, old: u64, new: u64) -> bool {
        self.word
            .compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Transition to `Open` from `Closed` or `HalfOpen`, stamping
    /// `opened_at = now` and zeroing the success counter.
    ///
    /// Returns `true` only when this call performed the transition; an
    /// already-`Open` breaker returns `false`.
    pub fn set_open(&self) -> bool {
        loop {
            let old = self.word.load(Ordering::Acquire);
            let (state, failure, _success, _opened_at) = unpack(old);
            if state == CircuitState::Open {
                return false;
            }

            let new = pack(CircuitState::Open, failure, 0, now_unix_secs());
            if self.cas(old, new) {
                return true;
            }
        }
    }

    /// Transition `Open → HalfOpen` once the recovery timeout has elapsed,
    /// zeroing the success counter and preserving failure count and
    /// `opened_at`.
    ///
    /// Returns `false` when the state is not `Open`, the timeout has not
    /// elapsed, or another caller won the race.
    pub fn set_half_open(&self) -> bool {
        loop {
            let old = self.word.load(Ordering::Acquire);
            let (state, failure, _success, opened_at) = unpack(old);
            if state != CircuitState::Open {
                return false;
            }
            if !self.past_recovery_timeout(opened_at) {
                return false;
            }

            let new = pack(CircuitState::HalfOpen, failure, 0, opened_at);
            if self.cas(old, new) {
                return true;
            }
        }
    }

    /// Record a failure while `Closed`; at the failure threshold the breaker
    /// trips to `Open` with `opened_at = now`.
    ///
    /// Returns the state stored by this call, or `None` when the breaker was
    /// not `Closed` at decision time.
    pub fn increment_failure(&self) -> Option<CircuitState> {
        loop {
            let old = self.word.load(Ordering::Acquire);
            let (state, failure, success, mut opened_at) = unpack(old);
            if state != CircuitState::Closed {
                return None;
            }

            let count = (failure + 1).min(MAX_FAILURE_COUNT);
            let next_state = if count >= self.failure_threshold {
                opened_at = now_unix_secs();
                CircuitState::Open
            } else {
                CircuitState::Closed
            };

            let new = pack(next_state, count, success, opened_at);
            if self.cas(old, new) {
                return Some(next_state);
            }
        }
    }

    /// Record a success while `HalfOpen`; at the recovery-attempt threshold
    /// the breaker closes with both counters zeroed.
    ///
    /// Returns the state stored by this call, or `None` when the breaker was
    /// not `HalfOpen` at decision time.
    pub fn increment_success(&self) -> Option<CircuitState> {
        loop {
            let old = self.word.load(Ordering::Acquire);
            let (state, failure, success, opened_at) = unpack(old);
            if state != CircuitState::HalfOpen {
                return None;
            }

            let count = (success + 1).min(MAX_SUCCESS_COUNT);
            let new = if count >= self.recovery_attempts {
                pack(CircuitState::Closed, 0, 0, opened_at)
            } else {
                pack(CircuitState::HalfOpen, failure, count, opened_at)
            };

            if self.cas(old, new) {
                let (stored, ..) = unpack(new);
                return Some(stored);
            }
        }
    }
}
