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

//! Payment work items and their wire payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `requestedAt` wire format: RFC3339 UTC with millisecond precision.
const REQUESTED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// A payment intent as submitted by a client.
///
/// `requested_at` is overwritten by the worker just before dispatch; any
/// client-supplied value is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkPayload {
    /// Opaque, globally unique payment identifier.
    pub correlation_id: String,
    /// Non-negative amount with two significant fractional digits.
    pub amount: f64,
    /// Dispatch timestamp, stamped by the worker.
    #[serde(default)]
    pub requested_at: String,
}

impl WorkPayload {
    /// Parse a raw queue item. Malformed input (including a missing
    /// `correlationId`) is not retriable and is dropped by the caller.
    pub fn parse(raw: &[u8]) -> Result<WorkPayload, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Stamp `requested_at` with the dispatch time.
    pub fn stamp(&mut self, at: DateTime<Utc>) {
        self.requested_at = at.format(REQUESTED_AT_FORMAT).to_string();
    }

    /// Serialize for the upstream POST body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// One unit of work pulled off the durable queue.
///
/// The raw bytes are preserved verbatim so a requeued item replays exactly
/// what the client submitted, with no re-serialization drift.
#[derive(Debug)]
pub struct Work {
    /// Original queue bytes.
    pub raw: Vec<u8>,
    /// Parsed payload, filled in by the worker.
    pub payload: Option<WorkPayload>,
}

impl Work {
    /// Wrap raw queue bytes.
    pub fn new(raw: Vec<u8>) -> Self {
        Self { raw, payload: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_payload() {
        let raw = br#"{"correlationId":"c1","amount":10.0,"requestedAt":"2025-01-01T00:00:00.000Z"}"#;
        let payload = WorkPayload::parse(raw).unwrap();
        assert_eq!(payload.correlation_id, "c1");
        assert_eq!(payload.amount, 10.0);
        assert_eq!(payload.requested_at, "2025-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_parse_without_requested_at() {
        let raw = br#"{"correlationId":"c2","amount":3.5}"#;
        let payload = WorkPayload::parse(raw).unwrap();
        assert_eq!(payload.correlation_id, "c2");
        assert_eq!(payload.requested_at, "");
    }

    #[test]
    fn test_parse_rejects_missing_correlation_id() {
        assert!(WorkPayload::parse(br#"{"amount":1.0}"#).is_err());
        assert!(WorkPayload::parse(b"not json").is_err());
    }

    #[test]
    fn test_stamp_overwrites_client_timestamp() {
        let mut payload =
            WorkPayload::parse(br#"{"correlationId":"c3","amount":1.0,"requestedAt":"bogus"}"#)
                .unwrap();

        let at = DateTime::parse_from_rfc3339("2025-06-01T12:30:45.123Z")
            .unwrap()
            .with_timezone(&Utc);
        payload.stamp(at);
        assert_eq!(payload.requested_at, "2025-06-01T12:30:45.123Z");
    }

    #[test]
    fn test_correlation_id_survives_stamp_and_reserialize() {
        let raw = br#"{"correlationId":"11111111-2222-3333-4444-555555555555","amount":9.99}"#;
        let mut payload = WorkPayload::parse(raw).unwrap();
        payload.stamp(Utc::now());

        let body = payload.to_bytes().unwrap();
        let round_tripped = WorkPayload::parse(&body).unwrap();
        assert_eq!(
            round_tripped.correlation_id,
            "11111111-2222-3333-4444-555555555555"
        );
        assert_eq!(round_tripped.amount, 9.99);
    }
}
