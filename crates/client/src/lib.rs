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

//! # PlexPay Upstream Client
//!
//! ## Purpose
//! Issues `POST` calls to one of the two upstream payment processors and
//! translates the HTTP response into the outcome vocabulary the rest of the
//! engine reasons about (delivered, already-processed, transient failure,
//! timeout, transport failure).
//!
//! ## Architecture Context
//! The load balancer never touches HTTP directly; it goes through the
//! [`ProcessorClient`] trait so the selection and breaker logic can be tested
//! with a scripted client. [`HttpProcessorClient`] is the production
//! implementation backed by a shared keep-alive `reqwest` pool.
//!
//! ## Key Components
//! - [`ProcessorClient`]: trait seam between the balancer and HTTP
//! - [`HttpProcessorClient`]: reqwest-backed implementation
//! - [`PostOutcome`] / [`ClientError`]: the status-code vocabulary
//!
//! ## Status code contract
//! | Upstream response | Result |
//! |---|---|
//! | 2xx | `PostOutcome::Delivered(elapsed_nanos)` |
//! | 422 | `PostOutcome::AlreadyProcessed` (terminal success) |
//! | 500 | `ClientError::ServerError` |
//! | other | `ClientError::UnexpectedStatus` |
//! | deadline exceeded | `ClientError::Timeout` |
//! | connect/read/write failure | `ClientError::Transport` |

#![warn(clippy::all)]

mod upstream;

pub use upstream::*;
