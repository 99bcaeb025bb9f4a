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

//! HTTP ingress: payment submission and summary queries.
//!
//! Submission is fire-and-forget: the 204 goes out before the payload is
//! enqueued, so ingress never blocks on store availability. Summary queries
//! read the counter buckets and render amounts with exactly two fractional
//! digits.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::Json;
use axum::routing::{any, get};
use axum::Router;
use chrono::DateTime;
use plexpay_common::ProcessorKind;
use plexpay_store::{PaymentStore, ProcessorSummary, SummaryRange};
use serde::{Deserialize, Serialize, Serializer};
use tracing::error;

/// Shared ingress state.
#[derive(Clone)]
pub struct AppState {
    /// Store used for enqueueing payments and reading summaries.
    pub store: Arc<dyn PaymentStore>,
}

/// Build the ingress router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/payments", any(handle_payment))
        .route("/payments-summary", get(handle_summary))
        .with_state(state)
}

async fn handle_payment(State(state): State<AppState>, method: Method, body: Bytes) -> StatusCode {
    if method == Method::POST {
        let store = Arc::clone(&state.store);
        tokio::spawn(async move {
            if let Err(e) = store.enqueue(&body).await {
                error!(error = %e, "failed to push request to work queue");
            }
        });
    }

    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct SummaryParams {
    from: Option<String>,
    to: Option<String>,
}

/// Summary body for one processor; the amount is rendered with exactly two
/// fractional digits.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorSummaryBody {
    /// Number of payments recorded over the range.
    pub total_requests: i64,
    /// Sum of amounts over the range.
    #[serde(serialize_with = "serialize_two_decimals")]
    pub total_amount: f64,
}

impl From<ProcessorSummary> for ProcessorSummaryBody {
    fn from(summary: ProcessorSummary) -> Self {
        Self {
            total_requests: summary.total_requests,
            total_amount: summary.total_amount,
        }
    }
}

/// `GET /payments-summary` response.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    /// Totals routed to the default processor.
    pub default: ProcessorSummaryBody,
    /// Totals routed to the fallback processor.
    pub fallback: ProcessorSummaryBody,
}

fn serialize_two_decimals<S: Serializer>(amount: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    let literal = format!("{amount:.2}");
    let raw = serde_json::value::RawValue::from_string(literal).map_err(serde::ser::Error::custom)?;
    raw.serialize(serializer)
}

fn parse_bound(param: &Option<String>) -> Result<Option<i64>, StatusCode> {
    match param.as_deref() {
        None | Some("") => Ok(None),
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|at| Some(at.timestamp_millis()))
            .map_err(|_| StatusCode::BAD_REQUEST),
    }
}

async fn handle_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<SummaryResponse>, (StatusCode, String)> {
    let range = SummaryRange {
        from_ms: parse_bound(&params.from)
            .map_err(|code| (code, "invalid query param: from".to_string()))?,
        to_ms: parse_bound(&params.to)
            .map_err(|code| (code, "invalid query param: to".to_string()))?,
    };

    let default = state
        .store
        .summary(ProcessorKind::Default, range)
        .await
        .map_err(summary_failure)?;
    let fallback = state
        .store
        .summary(ProcessorKind::Fallback, range)
        .await
        .map_err(summary_failure)?;

    Ok(Json(SummaryResponse {
        default: default.into(),
        fallback: fallback.into(),
    }))
}

fn summary_failure(err: plexpay_store::StoreError) -> (StatusCode, String) {
    error!(error = %err, "failed to retrieve payment summary");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amounts_render_with_two_fractional_digits() {
        let response = SummaryResponse {
            default: ProcessorSummaryBody {
                total_requests: 1,
                total_amount: 10.0,
            },
            fallback: ProcessorSummaryBody {
                total_requests: 0,
                total_amount: 0.0,
            },
        };

        let rendered = serde_json::to_string(&response).unwrap();
        assert_eq!(
            rendered,
            r#"{"default":{"totalRequests":1,"totalAmount":10.00},"fallback":{"totalRequests":0,"totalAmount":0.00}}"#
        );
    }

    #[test]
    fn test_amount_rounding() {
        let body = ProcessorSummaryBody {
            total_requests: 3,
            total_amount: 12.345,
        };
        let rendered = serde_json::to_string(&body).unwrap();
        assert_eq!(rendered, r#"{"totalRequests":3,"totalAmount":12.35}"#);
    }

    #[test]
    fn test_parse_bound() {
        assert_eq!(parse_bound(&None).unwrap(), None);
        assert_eq!(parse_bound(&Some(String::new())).unwrap(), None);

        let millis = parse_bound(&Some("2025-01-01T00:00:00.500Z".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(millis % 1000, 500);

        assert_eq!(
            parse_bound(&Some("yesterday".to_string())).unwrap_err(),
            StatusCode::BAD_REQUEST
        );
    }
}
