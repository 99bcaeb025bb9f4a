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

//! Replica selection, failover, and the global fence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use plexpay_breaker::{CircuitBreakerConfig, ExecuteError};
use plexpay_client::{ClientError, PostOutcome, ProcessorClient};
use plexpay_common::config::{env_duration, env_parse};
use plexpay_common::ProcessorKind;
use rand::Rng;
use rand_distr::{Beta, Distribution};
use tracing::{debug, info, warn};

use crate::replica::{Replica, ReplicaStats};

/// Balancer tunables, read from the environment.
#[derive(Debug, Clone, Copy)]
pub struct BalancerConfig {
    /// Penalty applied to the fallback's sampled score; clamped to
    /// `[0, 0.99]` at construction.
    pub cost_weight: f64,
    /// Response time above which a successful call still counts against the
    /// replica.
    pub latency_threshold: Duration,
    /// Per-upstream-call deadline.
    pub request_timeout: Duration,
    /// How long the global fence stays up once opened.
    pub circuit_timeout: Duration,
    /// Thresholds for both per-replica breakers.
    pub breaker: CircuitBreakerConfig,
}

impl BalancerConfig {
    /// Load from `COST_WEIGHT`, `LATENCY_LIMIT`, `PROCESSOR_REQ_TIMEOUT`,
    /// `LB_CIRCUIT_TIMEOUT` and the `CB_*` variables.
    pub fn from_env() -> Self {
        Self {
            cost_weight: env_parse("COST_WEIGHT", 0.5f64),
            latency_threshold: env_duration("LATENCY_LIMIT", Duration::from_millis(100)),
            request_timeout: env_duration("PROCESSOR_REQ_TIMEOUT", Duration::from_millis(500)),
            circuit_timeout: env_duration("LB_CIRCUIT_TIMEOUT", Duration::from_millis(500)),
            breaker: CircuitBreakerConfig::from_env(),
        }
    }
}

/// Terminal outcomes of [`LoadBalancer::make_request`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BalancerError {
    /// The upstream has already recorded this correlation ID (422). Terminal
    /// success: no publish, no requeue.
    #[error("request has already been processed upstream")]
    AlreadyProcessed,
    /// Every admissible replica was tried and denied or failed.
    #[error("all replicas failed")]
    AllReplicasFailed,
}

/// Routes payments across the two replicas and raises the global fence when
/// both are down.
pub struct LoadBalancer {
    default_replica: Replica,
    fallback_replica: Replica,
    /// `1.0 − clamped cost weight`: multiplier on the fallback's sampled
    /// score.
    fallback_weight: f64,
    latency_threshold_nanos: i64,
    request_timeout: Duration,
    circuit_timeout: Duration,
    client: Arc<dyn ProcessorClient>,
    circuit_open: Arc<AtomicBool>,
}

impl LoadBalancer {
    /// Build the balancer and its two replicas.
    pub fn new(client: Arc<dyn ProcessorClient>, config: BalancerConfig) -> Self {
        let cost_weight = if config.cost_weight < 0.0 {
            // Cost is not relevant for the score.
            0.0
        } else if config.cost_weight >= 1.0 {
            // Cost dominates the score.
            0.99
        } else {
            config.cost_weight
        };

        Self {
            default_replica: Replica::new(ProcessorKind::Default, config.breaker),
            fallback_replica: Replica::new(ProcessorKind::Fallback, config.breaker),
            fallback_weight: 1.0 - cost_weight,
            latency_threshold_nanos: config.latency_threshold.as_nanos() as i64,
            request_timeout: config.request_timeout,
            circuit_timeout: config.circuit_timeout,
            client,
            circuit_open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The default (preferred) replica.
    pub fn default_replica(&self) -> &Replica {
        &self.default_replica
    }

    /// The fallback replica.
    pub fn fallback_replica(&self) -> &Replica {
        &self.fallback_replica
    }

    #[cfg(test)]
    pub(crate) fn fallback_weight(&self) -> f64 {
        self.fallback_weight
    }

    /// Whether the dispatcher may keep pulling work.
    pub fn allow_work(&self) -> bool {
        !self.circuit_open.load(Ordering::Acquire)
    }

    /// How long the dispatcher should pause when the fence is up.
    pub fn circuit_timeout(&self) -> Duration {
        self.circuit_timeout
    }

    /// Dispatch `body` to a replica, failing over to the other on error.
    ///
    /// Returns the kind of the replica that accepted the payment. Keeps
    /// alternating between replicas while each attempt fails and the other
    /// breaker still admits; when a breaker denies the switch, the global
    /// fence opens and [`BalancerError::AllReplicasFailed`] is returned.
    pub async fn make_request(&self, body: &[u8]) -> Result<ProcessorKind, BalancerError> {
        let Some(mut replica) = self.select_replica() else {
            debug!("no replica available for selection");
            return Err(BalancerError::AllReplicasFailed);
        };

        loop {
            let kind = replica.kind();
            let outcome = replica
                .breaker()
                .execute(|| self.client.post_payment(kind, body, self.request_timeout))
                .await;

            match outcome {
                Ok(PostOutcome::Delivered(elapsed_nanos)) => {
                    self.spawn_update_latency(&replica, elapsed_nanos);
                    return Ok(kind);
                }
                // Terminal: the upstream owns this payment already.
                Ok(PostOutcome::AlreadyProcessed) => {
                    return Err(BalancerError::AlreadyProcessed);
                }
                Err(err) => {
                    match &err {
                        // The failure is the breaker itself; no stats update.
                        ExecuteError::CircuitOpen => {}
                        ExecuteError::Upstream(e) => {
                            if matches!(e, ClientError::Timeout) {
                                debug!(%kind, "upstream request timed out");
                            }
                            self.spawn_update_latency(&replica, -1);
                        }
                    }

                    let other = self.other_replica(kind);
                    if !other.breaker().allow_request() {
                        self.open_circuit();
                        return Err(BalancerError::AllReplicasFailed);
                    }
                    replica = other;
                }
            }
        }
    }

    /// Pick a replica by Thompson-style sampling, short-circuiting on the
    /// breakers' mirror flags.
    fn select_replica(&self) -> Option<Replica> {
        let default_open = self.default_replica.breaker().circuit_open();
        let fallback_open = self.fallback_replica.breaker().circuit_open();

        match (default_open, fallback_open) {
            (true, true) => return None,
            (true, false) => return Some(self.fallback_replica.clone()),
            (false, true) => return Some(self.default_replica.clone()),
            (false, false) => {}
        }

        let default_stats = self.default_replica.stats();
        let fallback_stats = self.fallback_replica.stats();

        let mut rng = rand::thread_rng();
        let score_default = sample_beta(&default_stats, &mut rng);
        let score_fallback = sample_beta(&fallback_stats, &mut rng) * self.fallback_weight;

        if score_default > score_fallback {
            Some(self.default_replica.clone())
        } else {
            Some(self.fallback_replica.clone())
        }
    }

    fn other_replica(&self, kind: ProcessorKind) -> Replica {
        match kind {
            ProcessorKind::Default => self.fallback_replica.clone(),
            ProcessorKind::Fallback => self.default_replica.clone(),
        }
    }

    fn spawn_update_latency(&self, replica: &Replica, response_time_nanos: i64) {
        let stats = Arc::clone(replica.stats_handle());
        let threshold = self.latency_threshold_nanos;
        tokio::spawn(async move {
            update_latency(&stats, threshold, response_time_nanos);
        });
    }

    /// Raise the global fence and arm the single clearing timer.
    ///
    /// Idempotent while the fence is up: a concurrent opener observes the
    /// swapped flag and arms nothing, so the open window is never extended.
    fn open_circuit(&self) {
        if self.circuit_open.swap(true, Ordering::AcqRel) {
            return;
        }

        warn!(pause = ?self.circuit_timeout, "all upstreams failing: pausing work intake");

        let flag = Arc::clone(&self.circuit_open);
        let timeout = self.circuit_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            flag.store(false, Ordering::Release);
            info!("work intake resumed");
        });
    }
}

fn sample_beta<R: Rng>(stats: &ReplicaStats, rng: &mut R) -> f64 {
    Beta::new(stats.latency_alpha, stats.latency_beta)
        .map(|dist| dist.sample(rng))
        .unwrap_or(0.5)
}

/// Apply one call outcome to a replica's Beta parameters.
///
/// `response_time_nanos < 0` marks a failed call (penalty-only update). A
/// successful call slower than the threshold still increases β
/// proportionally to the overshoot; a call at or under the threshold lifts α
/// by up to 1.0 and β by at most 0.5 depending on how close to instant it
/// was.
pub fn update_latency(
    stats: &RwLock<ReplicaStats>,
    latency_threshold_nanos: i64,
    response_time_nanos: i64,
) {
    if response_time_nanos < 0 || response_time_nanos > latency_threshold_nanos {
        let inc = if response_time_nanos > latency_threshold_nanos {
            // Proportional to the overshoot: (0.5, ~1.5).
            (response_time_nanos - latency_threshold_nanos) as f64 / response_time_nanos as f64
                + 0.5
        } else {
            1.0
        };

        let mut s = stats.write().unwrap_or_else(|e| e.into_inner());
        s.latency_beta += inc;
        return;
    }

    // Normalized closeness to instant: [0, 1], 1.0 is best.
    let latency_score = if latency_threshold_nanos > 0 {
        (latency_threshold_nanos - response_time_nanos).max(0) as f64
            / latency_threshold_nanos as f64
    } else {
        0.0
    };

    let alpha_increment = 0.1 + 0.9 * latency_score;
    let beta_increment = 0.1 + 0.4 * (1.0 - latency_score);

    let mut s = stats.write().unwrap_or_else(|e| e.into_inner());
    s.latency_alpha += alpha_increment;
    s.latency_beta += beta_increment;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted client: a fixed response per processor kind.
    struct ScriptedClient {
        default_result: Mutex<Box<dyn Fn() -> Result<PostOutcome, ClientError> + Send>>,
        fallback_result: Mutex<Box<dyn Fn() -> Result<PostOutcome, ClientError> + Send>>,
    }

    impl ScriptedClient {
        fn new(
            default_result: impl Fn() -> Result<PostOutcome, ClientError> + Send + 'static,
            fallback_result: impl Fn() -> Result<PostOutcome, ClientError> + Send + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                default_result: Mutex::new(Box::new(default_result)),
                fallback_result: Mutex::new(Box::new(fallback_result)),
            })
        }
    }

    #[async_trait]
    impl ProcessorClient for ScriptedClient {
        async fn post_payment(
            &self,
            processor: ProcessorKind,
            _body: &[u8],
            _deadline: Duration,
        ) -> Result<PostOutcome, ClientError> {
            match processor {
                ProcessorKind::Default => (self.default_result.lock().unwrap())(),
                ProcessorKind::Fallback => (self.fallback_result.lock().unwrap())(),
            }
        }
    }

    fn test_config() -> BalancerConfig {
        BalancerConfig {
            cost_weight: 0.5,
            latency_threshold: Duration::from_millis(100),
            request_timeout: Duration::from_millis(500),
            circuit_timeout: Duration::from_millis(50),
            breaker: CircuitBreakerConfig {
                recovery_timeout: Duration::from_secs(60),
                recovery_attempts: 5,
                failure_threshold: 1,
            },
        }
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_failover_to_fallback() {
        let client = ScriptedClient::new(
            || Err(ClientError::ServerError),
            || Ok(PostOutcome::Delivered(40_000_000)),
        );
        let lb = LoadBalancer::new(client, test_config());

        let processor = lb.make_request(b"{}").await.expect("fallback succeeds");
        assert_eq!(processor, ProcessorKind::Fallback);

        // The penalty update is spawned; wait for β to move.
        let default = lb.default_replica().clone();
        wait_for(move || default.stats().latency_beta > 1.0).await;
    }

    // Multi-threaded runtime: the retry loop alternates replicas without an
    // intervening yield, so the spawned breaker updates must land on another
    // worker for the loop to terminate.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_both_down_opens_the_fence_and_clears_once() {
        let client = ScriptedClient::new(
            || Err(ClientError::ServerError),
            || Err(ClientError::ServerError),
        );
        let lb = Arc::new(LoadBalancer::new(client, test_config()));

        let err = lb.make_request(b"{}").await.expect_err("both down");
        assert_eq!(err, BalancerError::AllReplicasFailed);
        assert!(!lb.allow_work(), "fence must be up");

        // The single timer clears the fence after circuit_timeout.
        let lb2 = Arc::clone(&lb);
        wait_for(move || lb2.allow_work()).await;
    }

    #[tokio::test]
    async fn test_already_processed_is_terminal_and_not_a_failure() {
        let client = ScriptedClient::new(
            || Ok(PostOutcome::AlreadyProcessed),
            || Ok(PostOutcome::Delivered(1)),
        );
        let lb = LoadBalancer::new(client, test_config());

        // Pin selection to the default replica by flagging the fallback
        // breaker open.
        lb.fallback_replica().breaker().update_state(false);

        let err = lb.make_request(b"{}").await.expect_err("terminal");
        assert_eq!(err, BalancerError::AlreadyProcessed);

        // A 422 is success as far as the breaker is concerned.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!lb.default_replica().breaker().circuit_open());
        assert_eq!(lb.default_replica().stats().latency_alpha, 1.5);
    }

    #[tokio::test]
    async fn test_open_default_forces_fallback_selection() {
        let client = ScriptedClient::new(
            || Ok(PostOutcome::Delivered(1)),
            || Ok(PostOutcome::Delivered(1)),
        );
        let lb = LoadBalancer::new(client, test_config());

        lb.default_replica().breaker().update_state(false);
        assert!(lb.default_replica().breaker().circuit_open());

        for _ in 0..10 {
            let processor = lb.make_request(b"{}").await.expect("fallback serves");
            assert_eq!(processor, ProcessorKind::Fallback);
        }
    }

    #[tokio::test]
    async fn test_cost_weight_clamping() {
        let client = ScriptedClient::new(
            || Ok(PostOutcome::Delivered(1)),
            || Ok(PostOutcome::Delivered(1)),
        );

        let mut config = test_config();
        config.cost_weight = -3.0;
        let no_penalty = LoadBalancer::new(Arc::clone(&client) as Arc<dyn ProcessorClient>, config);
        assert_eq!(no_penalty.fallback_weight(), 1.0);

        let mut config = test_config();
        config.cost_weight = 1.5;
        let full_penalty = LoadBalancer::new(client, config);
        assert!((full_penalty.fallback_weight() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_update_latency_penalty_on_failure() {
        let stats = RwLock::new(ReplicaStats {
            latency_alpha: 1.0,
            latency_beta: 1.0,
        });
        update_latency(&stats, 100, -1);
        let s = stats.read().unwrap();
        assert_eq!(s.latency_alpha, 1.0);
        assert_eq!(s.latency_beta, 2.0);
    }

    #[test]
    fn test_update_latency_slow_success_penalizes_proportionally() {
        let stats = RwLock::new(ReplicaStats {
            latency_alpha: 1.0,
            latency_beta: 1.0,
        });
        // Twice the threshold: increment = (200-100)/200 + 0.5 = 1.0.
        update_latency(&stats, 100, 200);
        let s = stats.read().unwrap();
        assert_eq!(s.latency_alpha, 1.0);
        assert!((s.latency_beta - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_latency_fast_success_lifts_alpha() {
        let stats = RwLock::new(ReplicaStats {
            latency_alpha: 1.0,
            latency_beta: 1.0,
        });
        // Instant call: score 1.0 → α += 1.0, β += 0.1.
        update_latency(&stats, 100, 0);
        let s = stats.read().unwrap();
        assert!((s.latency_alpha - 2.0).abs() < 1e-9);
        assert!((s.latency_beta - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_update_latency_mid_range() {
        let stats = RwLock::new(ReplicaStats {
            latency_alpha: 1.0,
            latency_beta: 1.0,
        });
        // Half the threshold: score 0.5 → α += 0.55, β += 0.3.
        update_latency(&stats, 100, 50);
        let s = stats.read().unwrap();
        assert!((s.latency_alpha - 1.55).abs() < 1e-9);
        assert!((s.latency_beta - 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_update_latency_zero_threshold_does_not_divide_by_zero() {
        let stats = RwLock::new(ReplicaStats {
            latency_alpha: 1.0,
            latency_beta: 1.0,
        });
        update_latency(&stats, 0, 0);
        let s = stats.read().unwrap();
        assert!(s.latency_alpha.is_finite());
        assert!(s.latency_beta.is_finite());
        assert!(s.latency_alpha >= 1.0);
        assert!(s.latency_beta >= 1.0);
    }
}
