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

//! Store error vocabulary.

/// Errors surfaced by [`PaymentStore`](crate::PaymentStore) backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Could not establish the backend connection.
    #[error("store connection failed: {0}")]
    ConnectionFailed(String),

    /// The backend rejected or failed an operation.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A value read from the backend did not parse as its expected type.
    #[error("malformed value in store: {0}")]
    MalformedValue(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() {
            StoreError::ConnectionFailed(err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}
