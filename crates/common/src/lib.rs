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

//! # PlexPay Common
//!
//! ## Purpose
//! Small shared vocabulary for the PlexPay dispatch engine: the two upstream
//! processor identifiers and environment-driven configuration helpers.
//!
//! ## Key Components
//! - [`ProcessorKind`]: which upstream a payment was (or will be) routed to
//! - [`config`]: `env_or` / `env_parse` / `env_duration` helpers with the
//!   fall-back-and-warn policy every component uses at startup
//!
//! ## Dependents
//! Every other PlexPay crate depends on this one; it depends on nothing but
//! `tracing` and `humantime`.

#![warn(clippy::all)]

pub mod config;

use std::fmt;

/// Identifies one of the two upstream payment processors.
///
/// The default processor is preferred (cheaper per call); the fallback is
/// only selected when the default is degraded or fenced off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorKind {
    /// Primary, cheaper upstream.
    Default,
    /// Secondary, more expensive upstream.
    Fallback,
}

impl ProcessorKind {
    /// Wire/key name of the processor ("default" or "fallback").
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorKind::Default => "default",
            ProcessorKind::Fallback => "fallback",
        }
    }

    /// The other processor.
    pub fn other(&self) -> ProcessorKind {
        match self {
            ProcessorKind::Default => ProcessorKind::Fallback,
            ProcessorKind::Fallback => ProcessorKind::Default,
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processor_kind_names() {
        assert_eq!(ProcessorKind::Default.as_str(), "default");
        assert_eq!(ProcessorKind::Fallback.as_str(), "fallback");
        assert_eq!(ProcessorKind::Default.to_string(), "default");
    }

    #[test]
    fn test_processor_kind_other() {
        assert_eq!(ProcessorKind::Default.other(), ProcessorKind::Fallback);
        assert_eq!(ProcessorKind::Fallback.other(), ProcessorKind::Default);
    }
}
