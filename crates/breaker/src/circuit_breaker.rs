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

//! Circuit breaker admission gate and outcome recording.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use plexpay_common::config::{env_duration, env_parse};
use tracing::debug;

use crate::packed_state::{CircuitState, PackedBreakerState};

/// Breaker thresholds, read from `CB_*` environment variables.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Time an `Open` breaker waits before admitting a probe.
    pub recovery_timeout: Duration,
    /// Consecutive `HalfOpen` successes required to close.
    pub recovery_attempts: u32,
    /// Consecutive `Closed` failures required to open.
    pub failure_threshold: u32,
}

impl CircuitBreakerConfig {
    /// Load from `CB_RECOVERY_TIMEOUT`, `CB_RECOVERY_ATTEMPTS`,
    /// `CB_FAILURE_THRESHOLD`; unset or unparsable values fall back with a
    /// warning.
    pub fn from_env() -> Self {
        Self {
            recovery_timeout: env_duration("CB_RECOVERY_TIMEOUT", Duration::from_secs(2)),
            recovery_attempts: env_parse("CB_RECOVERY_ATTEMPTS", 5u32),
            failure_threshold: env_parse("CB_FAILURE_THRESHOLD", 5u32),
        }
    }
}

/// Error surfaced by [`CircuitBreaker::execute`].
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError<E> {
    /// The breaker denied the request without invoking the upstream.
    #[error("circuit breaker is open")]
    CircuitOpen,
    /// The wrapped call failed; the breaker has recorded the failure.
    #[error("{0}")]
    Upstream(E),
}

struct BreakerInner {
    state: PackedBreakerState,
    /// Mirrors `state == Open` for lock-free peeks by the replica selector.
    circuit_open: AtomicBool,
    recovery_timeout: Duration,
}

/// Per-replica circuit breaker.
///
/// Cheap to clone; all clones share one packed word.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker in `Closed` with the given thresholds.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Arc::new(BreakerInner {
                state: PackedBreakerState::new(
                    config.failure_threshold,
                    config.recovery_attempts,
                    config.recovery_timeout.as_secs() as i64,
                ),
                circuit_open: AtomicBool::new(false),
                recovery_timeout: config.recovery_timeout,
            }),
        }
    }

    /// Fast read of the mirror flag: was the breaker recently seen `Open`?
    ///
    /// The flag is set on every entry to `Open` and cleared by a timer after
    /// the recovery timeout; it may briefly lag the packed state.
    pub fn circuit_open(&self) -> bool {
        self.inner.circuit_open.load(Ordering::Acquire)
    }

    /// Current state, unpacked from the word.
    pub fn state(&self) -> CircuitState {
        self.inner.state.circuit_state()
    }

    /// Admission check.
    ///
    /// `Closed` and `HalfOpen` always admit. `Open` admits only past the
    /// recovery timeout, and only through the CAS to `HalfOpen`: the winner
    /// is admitted as the probe, losers re-read the word and find `HalfOpen`
    /// (admitted) or a fresh `Open` (denied).
    pub fn allow_request(&self) -> bool {
        loop {
            let (state, _, _, opened_at) = self.inner.state.snapshot();
            match state {
                CircuitState::Closed | CircuitState::HalfOpen => return true,
                CircuitState::Open => {
                    if !self.inner.state.past_recovery_timeout(opened_at) {
                        return false;
                    }
                    if self.inner.state.set_half_open() {
                        debug!("circuit breaker probing: Open -> HalfOpen");
                        return true;
                    }
                    // CAS lost: somebody else moved the state; reevaluate.
                }
            }
        }
    }

    /// Run `f` under the breaker.
    ///
    /// Returns [`ExecuteError::CircuitOpen`] without invoking `f` when the
    /// admission check denies. Otherwise the outcome is recorded through a
    /// spawned state update, so the next caller may observe the previous
    /// state for one task hop.
    pub async fn execute<T, E, F, Fut>(&self, f: F) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.allow_request() {
            return Err(ExecuteError::CircuitOpen);
        }

        let result = f().await;
        let success = result.is_ok();

        let breaker = self.clone();
        tokio::spawn(async move {
            breaker.update_state(success);
        });

        result.map_err(ExecuteError::Upstream)
    }

    /// Apply one call outcome to the state machine.
    ///
    /// Public so tests can drive transitions deterministically; production
    /// code goes through [`CircuitBreaker::execute`].
    pub fn update_state(&self, success: bool) {
        match self.inner.state.circuit_state() {
            CircuitState::Closed => {
                if success {
                    return;
                }
                if self.inner.state.increment_failure() == Some(CircuitState::Open) {
                    self.arm_open_window();
                }
            }
            CircuitState::HalfOpen => {
                if success {
                    self.inner.state.increment_success();
                    return;
                }
                if self.inner.state.set_open() {
                    self.arm_open_window();
                }
            }
            // The recovery timeout governs the exit from Open.
            CircuitState::Open => {}
        }
    }

    /// Set the mirror flag and schedule its clearing after the recovery
    /// timeout.
    fn arm_open_window(&self) {
        debug!("circuit breaker opened");
        self.inner.circuit_open.store(true, Ordering::Release);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.recovery_timeout).await;
            inner.circuit_open.store(false, Ordering::Release);
            debug!("circuit breaker mirror flag cleared");
        });
    }
}
