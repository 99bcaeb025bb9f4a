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

//! # PlexPay Store
//!
//! ## Purpose
//! The engine's view of the external key-value service: the durable work
//! queue payments flow through, and the per-processor, per-millisecond
//! counter buckets that back payment summaries.
//!
//! ## Architecture Context
//! Everything above this crate talks to the [`PaymentStore`] trait. The
//! production backend is [`RedisPaymentStore`] (list `RPUSH`/`BLPOP` for the
//! queue, one server-side Lua script for the paired counter increments,
//! `MGET`/`SCAN` for summary reads). [`MemoryPaymentStore`] implements the
//! same observable semantics in process memory and carries the engine's
//! integration tests.
//!
//! ## Key Components
//! - [`PaymentStore`]: queue + counters trait seam
//! - [`RedisPaymentStore`]: Redis backend over async connection managers
//! - [`MemoryPaymentStore`]: in-memory backend for tests
//! - [`StoreError`]: backend-agnostic error vocabulary

#![warn(clippy::all)]

mod error;
mod keys;
mod memory;
mod redis_store;

pub use error::*;
pub use keys::*;
pub use memory::*;
pub use redis_store::*;

use std::time::Duration;

use async_trait::async_trait;
use plexpay_common::ProcessorKind;

/// Millisecond-bucket summary time range. `None` on a side means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryRange {
    /// Inclusive lower bound, UTC milliseconds.
    pub from_ms: Option<i64>,
    /// Inclusive upper bound, UTC milliseconds.
    pub to_ms: Option<i64>,
}

impl SummaryRange {
    /// Whether a bucket timestamp falls inside the range.
    pub fn contains(&self, timestamp_ms: i64) -> bool {
        self.from_ms.is_none_or(|from| timestamp_ms >= from)
            && self.to_ms.is_none_or(|to| timestamp_ms <= to)
    }
}

/// Aggregate totals for one processor over a range.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessorSummary {
    /// Number of payments recorded.
    pub total_requests: i64,
    /// Sum of recorded amounts.
    pub total_amount: f64,
}

/// The external store as the dispatch engine sees it.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Append raw payment bytes to the tail of the durable work queue.
    async fn enqueue(&self, raw: &[u8]) -> StoreResult<()>;

    /// Blocking-pop one item from the head of the work queue.
    ///
    /// Returns `Ok(None)` when the queue stayed empty for `timeout`; an
    /// empty pop is not an error.
    async fn dequeue(&self, timeout: Duration) -> StoreResult<Option<Vec<u8>>>;

    /// Atomically increment the count and amount buckets for
    /// `(processor, timestamp_ms)`. The two increments commit together.
    async fn record_result(
        &self,
        processor: ProcessorKind,
        timestamp_ms: i64,
        amount: f64,
    ) -> StoreResult<()>;

    /// Total requests and amount for a processor over `range`. Missing
    /// buckets contribute zero.
    async fn summary(
        &self,
        processor: ProcessorKind,
        range: SummaryRange,
    ) -> StoreResult<ProcessorSummary>;
}
