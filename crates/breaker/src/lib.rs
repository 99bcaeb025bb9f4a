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

//! # PlexPay Circuit Breaker
//!
//! ## Purpose
//! Per-replica circuit breaker fencing a single upstream payment processor.
//! Prevents a degraded upstream from absorbing worker capacity and gives it
//! room to recover before probe traffic resumes.
//!
//! ## Architecture Context
//! Each replica owns one breaker. The whole breaker state lives in a single
//! 64-bit word mutated exclusively by compare-and-swap, so transitions are
//! atomic with respect to one another and the hot-path admission check is a
//! single atomic load.
//!
//! ### State Machine
//! ```text
//!            failure >= threshold
//!   Closed ──────────────────────▶ Open
//!     ▲                             │ after recovery_timeout
//!     │ success >= attempts         ▼
//!   HalfOpen ◀───────────── (first admitted caller wins the CAS)
//!     │ any failure
//!     └────────────────────────────▶ Open
//! ```
//!
//! ## Key Components
//! - [`PackedBreakerState`]: the packed word plus typed CAS helpers
//! - [`CircuitBreaker`]: admission gate, outcome recording, mirror flag
//!
//! ## Design Notes
//! - Bit widths (2 state / 10 failure / 10 success / 31 openedAt-seconds)
//!   are part of the contract; counters saturate at 1023.
//! - State updates after `execute` are spawned, so the state observed by the
//!   next caller may lag the previous outcome by one task hop.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod circuit_breaker;
mod packed_state;

pub use circuit_breaker::*;
pub use packed_state::*;
