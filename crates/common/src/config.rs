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

//! Environment-driven configuration helpers.
//!
//! Every tunable in PlexPay comes from the environment. The policy is the
//! same everywhere: an unset or unparsable variable logs a warning and the
//! component starts with its built-in default. Startup never fails on a bad
//! tunable; only a missing external dependency (Redis) is fatal.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Read an environment variable, falling back to `fallback` with a warning
/// when it is unset or empty.
pub fn env_or(key: &str, fallback: &str) -> String {
    match std::env::var(key) {
        Ok(val) if !val.is_empty() => val,
        _ => {
            warn!(key, fallback, "env var not defined, using fallback value");
            fallback.to_string()
        }
    }
}

/// Read and parse an environment variable with [`FromStr`], falling back to
/// `fallback` with a warning when it is unset, empty, or unparsable.
pub fn env_parse<T: FromStr + Copy + std::fmt::Debug>(key: &str, fallback: T) -> T {
    match std::env::var(key) {
        Ok(val) if !val.is_empty() => match val.parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(key, value = %val, ?fallback, "failed to parse env var, using fallback value");
                fallback
            }
        },
        _ => {
            warn!(key, ?fallback, "env var not defined, using fallback value");
            fallback
        }
    }
}

/// Read a duration-valued environment variable ("500ms", "2s", "1m"),
/// falling back to `fallback` with a warning when unset or unparsable.
pub fn env_duration(key: &str, fallback: Duration) -> Duration {
    match std::env::var(key) {
        Ok(val) if !val.is_empty() => match humantime::parse_duration(&val) {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(key, value = %val, ?fallback, "failed to parse duration env var, using fallback value");
                fallback
            }
        },
        _ => {
            warn!(key, ?fallback, "env var not defined, using fallback value");
            fallback
        }
    }
}
