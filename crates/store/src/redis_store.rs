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

//! Redis-backed [`PaymentStore`].
//!
//! ## Design Decisions
//! - **ConnectionManager**: automatic reconnection over a multiplexed
//!   connection; a small round-robin set of managers spreads data traffic
//!   the way the original deployment sized its connection pool.
//! - **Dedicated blocking connection**: `BLPOP` parks its connection for up
//!   to a second, so queue pops get a manager of their own and never stall
//!   counter updates or summary reads.
//! - **Single Lua script**: the count and amount increments for a bucket
//!   must commit together; `EVAL` gives both in one atomic step.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use plexpay_common::ProcessorKind;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use crate::keys::{
    amount_key_prefix, bucket_keys_in_range, counter_key_prefix, parse_bucket_timestamp,
    WORK_QUEUE_KEY,
};
use crate::{PaymentStore, ProcessorSummary, StoreError, StoreResult, SummaryRange};

/// Upper bound on keys per `MGET` so summary reads over wide ranges stay
/// within sane request sizes.
const MGET_CHUNK: usize = 10_000;

/// `SCAN` batch hint for open-ended summary reads.
const SCAN_COUNT: usize = 100;

const RECORD_RESULT_SCRIPT: &str = r#"
local counterKeyPrefix = KEYS[1]
local amountKeyPrefix = KEYS[2]
local timestamp = tonumber(ARGV[1])
local amountValue = tonumber(ARGV[2])
local incrementVal = tonumber(ARGV[3])

local counterKey = counterKeyPrefix .. ":" .. timestamp
local amountKey = amountKeyPrefix .. ":" .. timestamp

local newAmount = redis.call('INCRBYFLOAT', amountKey, amountValue)
local newCount = redis.call('INCRBY', counterKey, incrementVal)

return {newAmount, newCount}
"#;

/// Redis-backed queue and counter store.
pub struct RedisPaymentStore {
    data: Vec<ConnectionManager>,
    cursor: AtomicUsize,
    blocking: ConnectionManager,
    record_script: Script,
}

impl RedisPaymentStore {
    /// Connect to Redis at `url` with `pool_size` data connections (plus one
    /// dedicated blocking connection).
    ///
    /// ## Errors
    /// - [`StoreError::ConnectionFailed`]: the server is unreachable
    pub async fn connect(url: &str, pool_size: usize) -> StoreResult<Self> {
        let client =
            Client::open(url).map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let mut data = Vec::with_capacity(pool_size.max(1));
        for _ in 0..pool_size.max(1) {
            data.push(ConnectionManager::new(client.clone()).await?);
        }
        let blocking = ConnectionManager::new(client).await?;

        Ok(Self {
            data,
            cursor: AtomicUsize::new(0),
            blocking,
            record_script: Script::new(RECORD_RESULT_SCRIPT),
        })
    }

    /// Round-trip health check.
    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.data_conn();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn data_conn(&self) -> ConnectionManager {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.data.len();
        self.data[index].clone()
    }

    /// `MGET` the given keys in bounded chunks and fold the present values
    /// with `parse`.
    async fn sum_values<T, F>(
        &self,
        conn: &mut ConnectionManager,
        keys: &[String],
        mut parse: F,
    ) -> StoreResult<T>
    where
        T: Default + std::ops::AddAssign,
        F: FnMut(&str) -> StoreResult<T>,
    {
        let mut total = T::default();
        for chunk in keys.chunks(MGET_CHUNK) {
            let values: Vec<Option<String>> = conn.mget(chunk).await?;
            for value in values.into_iter().flatten() {
                total += parse(&value)?;
            }
        }
        Ok(total)
    }

    /// Collect bucket keys under `prefix` whose timestamp suffix falls in
    /// `range`, via a full cursor walk of `SCAN prefix:*`.
    async fn scan_keys_in_range(
        &self,
        conn: &mut ConnectionManager,
        prefix: &str,
        range: SummaryRange,
    ) -> StoreResult<Vec<String>> {
        let pattern = format!("{prefix}:*");
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(conn)
                .await?;

            for key in batch {
                if let Some(timestamp_ms) = parse_bucket_timestamp(&key, prefix) {
                    if range.contains(timestamp_ms) {
                        keys.push(key);
                    }
                }
            }

            cursor = next;
            if cursor == 0 {
                return Ok(keys);
            }
        }
    }

    /// Keys to read for one prefix: closed ranges enumerate every bucket,
    /// any open side falls back to a prefix scan.
    async fn keys_for_range(
        &self,
        conn: &mut ConnectionManager,
        prefix: &str,
        range: SummaryRange,
    ) -> StoreResult<Vec<String>> {
        match (range.from_ms, range.to_ms) {
            (Some(from), Some(to)) => Ok(bucket_keys_in_range(prefix, from, to)),
            _ => self.scan_keys_in_range(conn, prefix, range).await,
        }
    }
}

#[async_trait]
impl PaymentStore for RedisPaymentStore {
    async fn enqueue(&self, raw: &[u8]) -> StoreResult<()> {
        let mut conn = self.data_conn();
        let _: i64 = conn.rpush(WORK_QUEUE_KEY, raw).await?;
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.blocking.clone();
        let popped: Option<(String, Vec<u8>)> =
            conn.blpop(WORK_QUEUE_KEY, timeout.as_secs_f64()).await?;
        Ok(popped.map(|(_key, raw)| raw))
    }

    async fn record_result(
        &self,
        processor: ProcessorKind,
        timestamp_ms: i64,
        amount: f64,
    ) -> StoreResult<()> {
        let mut conn = self.data_conn();
        let _: redis::Value = self
            .record_script
            .key(counter_key_prefix(processor))
            .key(amount_key_prefix(processor))
            .arg(timestamp_ms)
            .arg(amount)
            .arg(1)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn summary(
        &self,
        processor: ProcessorKind,
        range: SummaryRange,
    ) -> StoreResult<ProcessorSummary> {
        let counter_prefix = counter_key_prefix(processor);
        let amount_prefix = amount_key_prefix(processor);

        let mut conn = self.data_conn();

        let counter_keys = self.keys_for_range(&mut conn, &counter_prefix, range).await?;
        let amount_keys = self.keys_for_range(&mut conn, &amount_prefix, range).await?;

        let total_requests: i64 = self
            .sum_values(&mut conn, &counter_keys, |value| {
                value
                    .parse::<i64>()
                    .map_err(|e| StoreError::MalformedValue(format!("count bucket: {e}")))
            })
            .await?;

        let total_amount: f64 = self
            .sum_values(&mut conn, &amount_keys, |value| {
                value
                    .parse::<f64>()
                    .map_err(|e| StoreError::MalformedValue(format!("amount bucket: {e}")))
            })
            .await?;

        Ok(ProcessorSummary {
            total_requests,
            total_amount,
        })
    }
}
