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

//! # PlexPay Load Balancer
//!
//! ## Purpose
//! Routes each payment to one of the two upstream replicas under latency and
//! failure uncertainty, fails over to the other replica, and raises a
//! process-wide fence when both are believed down.
//!
//! ## Architecture Context
//! Selection is Thompson-sampling-style: each replica carries a Beta(α, β)
//! latency-quality distribution, one sample per replica per decision, the
//! higher sampled score wins. The fallback's score is discounted by the
//! configured cost weight because it is the more expensive processor. Each
//! replica is fenced by its own circuit breaker; the balancer adds a global
//! fence observed by the dispatcher.
//!
//! ## Key Components
//! - [`Replica`] / [`ReplicaStats`]: per-upstream Beta parameters + breaker
//! - [`LoadBalancer`]: selection, failover retry, global fence
//! - [`update_latency`]: the α/β reward function
//!
//! ## Ownership
//! The balancer owns its two replicas; each replica owns its breaker and
//! stats. Workers hold a shared reference to the balancer and nothing points
//! back.

#![warn(clippy::all)]

mod balancer;
mod replica;

pub use balancer::*;
pub use replica::*;
