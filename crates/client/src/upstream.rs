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

//! ProcessorClient trait and the reqwest-backed implementation.

use std::time::Duration;

use async_trait::async_trait;
use plexpay_common::ProcessorKind;
use tokio::time::Instant;
use tracing::warn;

/// Per-host idle connection capacity of the keep-alive pool.
const MAX_IDLE_CONNS_PER_HOST: usize = 2048;

/// Successful outcome of a payment POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// Upstream accepted the payment (2xx). Carries elapsed wall-clock time
    /// of the request in nanoseconds, measured with a monotonic clock.
    Delivered(i64),
    /// Upstream replied 422: it has already seen this correlation ID. The
    /// payment is owned by the upstream; callers must not requeue or publish.
    AlreadyProcessed,
}

/// Failure outcome of a payment POST.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Upstream replied 500.
    #[error("upstream responded with status 500")]
    ServerError,

    /// Any status outside 2xx, 422 and 500.
    #[error("upstream request failed with status {0}")]
    UnexpectedStatus(u16),

    /// The per-request deadline elapsed.
    #[error("upstream request timed out")]
    Timeout,

    /// Connect/read/write failure below the HTTP layer.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The client could not be constructed (bad endpoint URL, TLS setup).
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

/// Seam between the load balancer and HTTP.
///
/// The production implementation is [`HttpProcessorClient`]; tests inject
/// scripted implementations to drive failover and breaker paths.
#[async_trait]
pub trait ProcessorClient: Send + Sync {
    /// POST `body` to the given processor's payments endpoint.
    ///
    /// `deadline` bounds the whole call; expiry maps to
    /// [`ClientError::Timeout`].
    async fn post_payment(
        &self,
        processor: ProcessorKind,
        body: &[u8],
        deadline: Duration,
    ) -> Result<PostOutcome, ClientError>;
}

/// reqwest-backed [`ProcessorClient`].
///
/// One shared client serves both processors; reqwest keeps a distinct
/// keep-alive pool per host, so the two upstreams never compete for
/// connections.
pub struct HttpProcessorClient {
    client: reqwest::Client,
    default_url: String,
    fallback_url: String,
}

impl HttpProcessorClient {
    /// Build a client for the two upstream payments endpoints.
    ///
    /// ## Errors
    /// - [`ClientError::InvalidConfig`]: the underlying HTTP client could not
    ///   be constructed
    pub fn new(default_url: impl Into<String>, fallback_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(MAX_IDLE_CONNS_PER_HOST)
            .build()
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            default_url: default_url.into(),
            fallback_url: fallback_url.into(),
        })
    }

    fn endpoint(&self, processor: ProcessorKind) -> &str {
        match processor {
            ProcessorKind::Default => &self.default_url,
            ProcessorKind::Fallback => &self.fallback_url,
        }
    }
}

#[async_trait]
impl ProcessorClient for HttpProcessorClient {
    async fn post_payment(
        &self,
        processor: ProcessorKind,
        body: &[u8],
        deadline: Duration,
    ) -> Result<PostOutcome, ClientError> {
        let request = self
            .client
            .post(self.endpoint(processor))
            .header(reqwest::header::CONTENT_TYPE, "application/json; charset=utf-8")
            .timeout(deadline)
            .body(body.to_vec());

        let start = Instant::now();
        let response = request.send().await;
        let elapsed_nanos = start.elapsed().as_nanos() as i64;

        let response = match response {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return Err(ClientError::Timeout),
            Err(e) => {
                warn!(%processor, error = %e, "upstream transport failure");
                return Err(ClientError::Transport(e.to_string()));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(PostOutcome::Delivered(elapsed_nanos));
        }

        match status.as_u16() {
            422 => Ok(PostOutcome::AlreadyProcessed),
            500 => Err(ClientError::ServerError),
            code => {
                warn!(%processor, status = code, "unexpected upstream status");
                Err(ClientError::UnexpectedStatus(code))
            }
        }
    }
}
