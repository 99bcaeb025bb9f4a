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

//! A replica: one upstream processor plus its breaker and latency stats.

use std::sync::{Arc, RwLock};

use plexpay_breaker::{CircuitBreaker, CircuitBreakerConfig};
use plexpay_common::ProcessorKind;

/// The default processor starts ahead so early traffic prefers the cheaper
/// upstream until evidence accumulates.
const DEFAULT_INITIAL_ALPHA: f64 = 1.5;
const FALLBACK_INITIAL_ALPHA: f64 = 1.0;
const INITIAL_BETA: f64 = 1.0;

/// Beta-distribution parameters tracking a replica's latency quality.
///
/// Both parameters are strictly positive and only ever grow; see
/// [`update_latency`](crate::update_latency) for the reward function.
#[derive(Debug, Clone, Copy)]
pub struct ReplicaStats {
    /// Evidence of fast, successful calls.
    pub latency_alpha: f64,
    /// Evidence of slow or failed calls.
    pub latency_beta: f64,
}

/// One upstream processor with its breaker and stats.
///
/// Cheap to clone; clones share the breaker word and the stats cell.
#[derive(Clone)]
pub struct Replica {
    kind: ProcessorKind,
    stats: Arc<RwLock<ReplicaStats>>,
    breaker: CircuitBreaker,
}

impl Replica {
    /// Create a replica with the initial Beta parameters for its kind.
    pub fn new(kind: ProcessorKind, breaker_config: CircuitBreakerConfig) -> Self {
        let latency_alpha = match kind {
            ProcessorKind::Default => DEFAULT_INITIAL_ALPHA,
            ProcessorKind::Fallback => FALLBACK_INITIAL_ALPHA,
        };

        Self {
            kind,
            stats: Arc::new(RwLock::new(ReplicaStats {
                latency_alpha,
                latency_beta: INITIAL_BETA,
            })),
            breaker: CircuitBreaker::new(breaker_config),
        }
    }

    /// Which upstream this replica fronts.
    pub fn kind(&self) -> ProcessorKind {
        self.kind
    }

    /// The replica's circuit breaker.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Snapshot of `(α, β)`.
    pub fn stats(&self) -> ReplicaStats {
        *self.stats_handle().read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn stats_handle(&self) -> &Arc<RwLock<ReplicaStats>> {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn breaker_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            recovery_timeout: Duration::from_secs(2),
            recovery_attempts: 5,
            failure_threshold: 5,
        }
    }

    #[test]
    fn test_initial_stats_bias_default() {
        let default = Replica::new(ProcessorKind::Default, breaker_config());
        let fallback = Replica::new(ProcessorKind::Fallback, breaker_config());

        assert_eq!(default.stats().latency_alpha, 1.5);
        assert_eq!(default.stats().latency_beta, 1.0);
        assert_eq!(fallback.stats().latency_alpha, 1.0);
        assert_eq!(fallback.stats().latency_beta, 1.0);
    }
}
