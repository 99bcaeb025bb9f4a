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

//! In-memory [`PaymentStore`] with the same observable semantics as the
//! Redis backend. Single-process only; used by engine tests and local runs
//! without Redis.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use plexpay_common::ProcessorKind;
use tokio::sync::{Mutex, Notify};

use crate::{PaymentStore, ProcessorSummary, StoreResult, SummaryRange};

#[derive(Default)]
struct Bucket {
    count: i64,
    amount: f64,
}

/// In-memory queue plus counter buckets.
#[derive(Default)]
pub struct MemoryPaymentStore {
    queue: Mutex<VecDeque<Vec<u8>>>,
    queued: Notify,
    buckets: RwLock<HashMap<(ProcessorKind, i64), Bucket>>,
}

impl MemoryPaymentStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items currently queued.
    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn enqueue(&self, raw: &[u8]) -> StoreResult<()> {
        self.queue.lock().await.push_back(raw.to_vec());
        self.queued.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> StoreResult<Option<Vec<u8>>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(raw) = self.queue.lock().await.pop_front() {
                return Ok(Some(raw));
            }

            let queued = self.queued.notified();
            tokio::select! {
                _ = queued => {}
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
            }
        }
    }

    async fn record_result(
        &self,
        processor: ProcessorKind,
        timestamp_ms: i64,
        amount: f64,
    ) -> StoreResult<()> {
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        let bucket = buckets.entry((processor, timestamp_ms)).or_default();
        bucket.count += 1;
        bucket.amount += amount;
        Ok(())
    }

    async fn summary(
        &self,
        processor: ProcessorKind,
        range: SummaryRange,
    ) -> StoreResult<ProcessorSummary> {
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        let mut summary = ProcessorSummary::default();
        for ((kind, timestamp_ms), bucket) in buckets.iter() {
            if *kind == processor && range.contains(*timestamp_ms) {
                summary.total_requests += bucket.count;
                summary.total_amount += bucket.amount;
            }
        }
        Ok(summary)
    }
}
