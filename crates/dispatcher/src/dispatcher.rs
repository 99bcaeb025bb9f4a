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

//! The dispatcher: durable-queue pop loop feeding the idle worker pool.

use std::sync::Arc;
use std::time::Duration;

use plexpay_balancer::LoadBalancer;
use plexpay_common::config::env_parse;
use plexpay_store::PaymentStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dedup::DedupStore;
use crate::work::Work;
use crate::worker::Worker;

/// Hard cap on the worker pool.
pub const WORKERS_LIMIT: usize = 20;

/// Blocking-pop timeout on the durable queue; paces the loop when idle.
const QUEUE_POP_TIMEOUT: Duration = Duration::from_secs(1);

/// Dispatcher tunables.
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Worker count; capped at [`WORKERS_LIMIT`].
    pub max_workers: usize,
}

impl DispatcherConfig {
    /// Load from `MAX_WORKERS`.
    pub fn from_env() -> Self {
        Self {
            max_workers: env_parse("MAX_WORKERS", 10usize),
        }
    }
}

/// Pulls raw payloads off the durable queue and hands each to an idle
/// worker, honoring the balancer's global fence.
pub struct WorkDispatcher {
    idle_workers: mpsc::Receiver<mpsc::Sender<Work>>,
    balancer: Arc<LoadBalancer>,
    store: Arc<dyn PaymentStore>,
}

impl WorkDispatcher {
    /// Create the dispatcher and spawn its workers.
    ///
    /// Workers park their handles in a bounded idle pool sized to the worker
    /// count; when all are busy the pool is empty and the dispatcher stops
    /// pulling, letting the durable queue buffer bursts.
    pub fn new(
        balancer: Arc<LoadBalancer>,
        store: Arc<dyn PaymentStore>,
        config: DispatcherConfig,
    ) -> Self {
        let max_workers = config.max_workers.clamp(1, WORKERS_LIMIT);
        let (idle_tx, idle_rx) = mpsc::channel(max_workers);
        let dedup = Arc::new(DedupStore::new());

        for id in 0..max_workers {
            Worker::new(
                id,
                idle_tx.clone(),
                Arc::clone(&balancer),
                Arc::clone(&store),
                Arc::clone(&dedup),
            )
            .start();
        }
        info!(max_workers, "workers registered");

        Self {
            idle_workers: idle_rx,
            balancer,
            store,
        }
    }

    /// Spawn the dispatch loop.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!("starting dispatcher");

        loop {
            if !self.balancer.allow_work() {
                let pause = self.balancer.circuit_timeout();
                debug!(?pause, "load balancer circuit is open, dispatcher sleeping");
                tokio::time::sleep(pause).await;
                continue;
            }

            let raw = match self.store.dequeue(QUEUE_POP_TIMEOUT).await {
                Ok(Some(raw)) => raw,
                // Empty pop is not an error; keep polling.
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "failed to consume from work queue");
                    continue;
                }
            };

            // Blocks until some worker is idle.
            let Some(worker) = self.idle_workers.recv().await else {
                warn!("all workers stopped, dispatcher exiting");
                return;
            };

            if worker.send(Work::new(raw)).await.is_err() {
                warn!("idle worker vanished before handoff");
            }
        }
    }
}
