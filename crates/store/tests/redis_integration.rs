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

//! Integration tests against a live Redis.
//!
//! Run with a local server:
//! ```bash
//! REDIS_TEST_URL=redis://localhost:6379 cargo test -p plexpay-store -- --ignored
//! ```

use std::time::Duration;

use plexpay_common::ProcessorKind;
use plexpay_store::{PaymentStore, RedisPaymentStore, SummaryRange};

fn test_url() -> String {
    std::env::var("REDIS_TEST_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_queue_round_trip() {
    let store = RedisPaymentStore::connect(&test_url(), 2).await.expect("connect");
    store.ping().await.expect("ping");

    store.enqueue(b"integration-payload").await.expect("enqueue");
    let popped = store.dequeue(Duration::from_secs(1)).await.expect("dequeue");
    assert_eq!(popped, Some(b"integration-payload".to_vec()));
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_record_and_summary() {
    let store = RedisPaymentStore::connect(&test_url(), 2).await.expect("connect");

    // A bucket timestamp far in the past keeps this test's keys away from
    // production-shaped data in a shared instance.
    let ts = 1_000_000 + (std::process::id() as i64);
    store
        .record_result(ProcessorKind::Default, ts, 12.34)
        .await
        .expect("record");
    store
        .record_result(ProcessorKind::Default, ts, 1.0)
        .await
        .expect("record");

    let summary = store
        .summary(
            ProcessorKind::Default,
            SummaryRange { from_ms: Some(ts), to_ms: Some(ts) },
        )
        .await
        .expect("summary");

    assert_eq!(summary.total_requests % 2, 0, "both increments landed together");
    assert!(summary.total_amount >= 13.34);
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_empty_pop_is_not_an_error() {
    let store = RedisPaymentStore::connect(&test_url(), 1).await.expect("connect");
    // Nothing queued under an unlikely-to-exist key state: drain first.
    while store
        .dequeue(Duration::from_millis(100))
        .await
        .expect("drain")
        .is_some()
    {}

    let popped = store.dequeue(Duration::from_secs(1)).await.expect("empty pop");
    assert_eq!(popped, None);
}
