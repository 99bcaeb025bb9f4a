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

//! Node-level configuration: listener, Redis, upstream endpoints.

use plexpay_common::config::{env_or, env_parse};

/// Process-level settings read once at startup.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Ingress bind address.
    pub listen_addr: String,
    /// Redis connection URL.
    pub redis_url: String,
    /// Data connection count for the store.
    pub redis_pool_size: usize,
    /// Default processor payments endpoint.
    pub default_url: String,
    /// Fallback processor payments endpoint.
    pub fallback_url: String,
}

impl NodeConfig {
    /// Load from the environment with deployment defaults.
    pub fn from_env() -> Self {
        Self {
            listen_addr: env_or("LISTEN_ADDR", "0.0.0.0:8081"),
            redis_url: env_or("REDIS_URL", "redis://redis:6379"),
            redis_pool_size: env_parse("DISPATCHER_REDIS_POOL", 50usize),
            default_url: env_or(
                "PROCESSOR_DEFAULT_URL",
                "http://payment-processor-default:8080/payments",
            ),
            fallback_url: env_or(
                "PROCESSOR_FALLBACK_URL",
                "http://payment-processor-fallback:8080/payments",
            ),
        }
    }
}
