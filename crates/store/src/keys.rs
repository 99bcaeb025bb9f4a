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

//! Key naming for the work queue and counter buckets.
//!
//! Bucket keys are `<prefix>:<millis>` where the prefix is
//! `{default|fallback}:counter` for counts and
//! `amount:{default|fallback}:counter` for sums.

use plexpay_common::ProcessorKind;

/// List key holding raw payment payloads.
pub const WORK_QUEUE_KEY: &str = "work_queue";

/// Prefix of a processor's per-millisecond count buckets.
pub fn counter_key_prefix(processor: ProcessorKind) -> String {
    format!("{processor}:counter")
}

/// Prefix of a processor's per-millisecond amount buckets.
pub fn amount_key_prefix(processor: ProcessorKind) -> String {
    format!("amount:{processor}:counter")
}

/// Full bucket key for a prefix and timestamp.
pub fn bucket_key(prefix: &str, timestamp_ms: i64) -> String {
    format!("{prefix}:{timestamp_ms}")
}

/// Keys of every bucket in the inclusive `[from_ms, to_ms]` range.
///
/// An inverted range yields no keys.
pub fn bucket_keys_in_range(prefix: &str, from_ms: i64, to_ms: i64) -> Vec<String> {
    if from_ms > to_ms {
        return Vec::new();
    }
    (from_ms..=to_ms).map(|ts| bucket_key(prefix, ts)).collect()
}

/// Parse the millisecond suffix out of a bucket key, if `key` belongs to
/// `prefix`.
pub fn parse_bucket_timestamp(key: &str, prefix: &str) -> Option<i64> {
    key.strip_prefix(prefix)?
        .strip_prefix(':')?
        .parse::<i64>()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(counter_key_prefix(ProcessorKind::Default), "default:counter");
        assert_eq!(counter_key_prefix(ProcessorKind::Fallback), "fallback:counter");
        assert_eq!(
            amount_key_prefix(ProcessorKind::Default),
            "amount:default:counter"
        );
    }

    #[test]
    fn test_bucket_keys_in_range() {
        let keys = bucket_keys_in_range("default:counter", 100, 102);
        assert_eq!(
            keys,
            vec![
                "default:counter:100".to_string(),
                "default:counter:101".to_string(),
                "default:counter:102".to_string(),
            ]
        );

        assert_eq!(bucket_keys_in_range("default:counter", 100, 100).len(), 1);
        assert!(bucket_keys_in_range("default:counter", 101, 100).is_empty());
    }

    #[test]
    fn test_parse_bucket_timestamp() {
        assert_eq!(
            parse_bucket_timestamp("default:counter:1720000000123", "default:counter"),
            Some(1720000000123)
        );
        assert_eq!(
            parse_bucket_timestamp("amount:default:counter:5", "amount:default:counter"),
            Some(5)
        );
        assert_eq!(parse_bucket_timestamp("default:counter:", "default:counter"), None);
        assert_eq!(
            parse_bucket_timestamp("default:counter:abc", "default:counter"),
            None
        );
        assert_eq!(parse_bucket_timestamp("other:counter:5", "default:counter"), None);
    }
}
