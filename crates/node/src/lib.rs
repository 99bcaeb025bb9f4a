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

//! # PlexPay Node
//!
//! ## Purpose
//! The deployable unit: HTTP ingress for payment submission and summary
//! queries, plus the wiring that assembles client, balancer, dispatcher and
//! store into one process.
//!
//! ## External Surface
//! - `POST /payments`: fire-and-forget enqueue, always `204 No Content`
//! - `GET /payments-summary?from&to`: per-processor totals over a range

#![warn(clippy::all)]

pub mod config;
pub mod http_router;
pub mod tracing_setup;
