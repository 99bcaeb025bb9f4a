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

//! A worker: parse, dedup, stamp, dispatch, publish or requeue.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use plexpay_balancer::{BalancerError, LoadBalancer};
use plexpay_store::PaymentStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dedup::DedupStore;
use crate::work::{Work, WorkPayload};

/// Deadline for pushing a failed payment back onto the durable queue.
const REQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

/// Long-lived task consuming one work item at a time.
pub struct Worker {
    id: usize,
    idle_pool: mpsc::Sender<mpsc::Sender<Work>>,
    balancer: Arc<LoadBalancer>,
    store: Arc<dyn PaymentStore>,
    dedup: Arc<DedupStore>,
}

impl Worker {
    /// Create a worker that will park itself in `idle_pool` between items.
    pub fn new(
        id: usize,
        idle_pool: mpsc::Sender<mpsc::Sender<Work>>,
        balancer: Arc<LoadBalancer>,
        store: Arc<dyn PaymentStore>,
        dedup: Arc<DedupStore>,
    ) -> Self {
        Self {
            id,
            idle_pool,
            balancer,
            store,
            dedup,
        }
    }

    /// Spawn the worker loop.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let (work_tx, mut work_rx) = mpsc::channel::<Work>(1);

        loop {
            // Park in the idle pool, then block for the next item. The pool
            // closing means the dispatcher is gone and the worker retires.
            if self.idle_pool.send(work_tx.clone()).await.is_err() {
                debug!(worker = self.id, "idle pool closed, worker stopping");
                return;
            }

            let Some(work) = work_rx.recv().await else {
                return;
            };

            self.process(work).await;
        }
    }

    async fn process(&self, mut work: Work) {
        let mut payload = match WorkPayload::parse(&work.raw) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(worker = self.id, error = %e, "dropping unparsable work payload");
                return;
            }
        };

        if self.dedup.contains(&payload.correlation_id) {
            debug!(
                correlation_id = %payload.correlation_id,
                "payment already processed, discarding"
            );
            return;
        }
        self.dedup.mark(&payload.correlation_id);

        let dispatched_at = Utc::now();
        payload.stamp(dispatched_at);

        let body = match payload.to_bytes() {
            Ok(body) => body,
            Err(e) => {
                warn!(worker = self.id, error = %e, "failed to serialize work payload");
                self.handle_processing_failure(&payload.correlation_id, &work.raw);
                return;
            }
        };

        work.payload = Some(payload.clone());

        match self.balancer.make_request(&body).await {
            Ok(processor) => {
                let store = Arc::clone(&self.store);
                let amount = payload.amount;
                let timestamp_ms = dispatched_at.timestamp_millis();
                tokio::spawn(async move {
                    if let Err(e) = store.record_result(processor, timestamp_ms, amount).await {
                        // The upstream accepted the payment; counter drift is
                        // preferable to double-counting, so no retry.
                        error!(error = %e, %processor, timestamp_ms, amount, "failed to publish worker result");
                    }
                });
            }
            // The upstream already owns this payment: nothing to publish,
            // nothing to retry.
            Err(BalancerError::AlreadyProcessed) => {}
            Err(e) => {
                warn!(worker = self.id, error = %e, correlation_id = %payload.correlation_id, "failed to execute work");
                self.handle_processing_failure(&payload.correlation_id, &work.raw);
            }
        }
    }

    /// Unmark the dedup entry and push the original raw bytes back onto the
    /// queue tail so the retry replays the client's submission bit-for-bit.
    fn handle_processing_failure(&self, correlation_id: &str, raw: &[u8]) {
        let store = Arc::clone(&self.store);
        let dedup = Arc::clone(&self.dedup);
        let correlation_id = correlation_id.to_string();
        let raw = raw.to_vec();

        tokio::spawn(async move {
            dedup.unmark(&correlation_id);

            match tokio::time::timeout(REQUEUE_TIMEOUT, store.enqueue(&raw)).await {
                Ok(Ok(())) => {
                    info!(%correlation_id, "processing failed, payment sent back to work queue")
                }
                Ok(Err(e)) => {
                    // The payment is lost from our tracking, though the
                    // upstream may still have accepted an earlier attempt.
                    error!(%correlation_id, error = %e, "failed to push payment back to work queue")
                }
                Err(_) => {
                    error!(%correlation_id, "timed out pushing payment back to work queue")
                }
            }
        });
    }
}
