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

//! In-process correlation-ID dedup set.

use std::collections::HashMap;
use std::sync::RwLock;

/// Marks correlation IDs currently in flight or completed by this process.
///
/// Entries are never deleted: a processing failure flips the entry to
/// unmarked so the retry passes the check, keeping the key as a tombstone.
/// Not shared across processes; a restart forgets everything, which is why
/// delivery is at-least-once overall.
#[derive(Default)]
pub struct DedupStore {
    entries: RwLock<HashMap<String, bool>>,
}

impl DedupStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the ID is currently marked as seen.
    pub fn contains(&self, correlation_id: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(correlation_id)
            .copied()
            .unwrap_or(false)
    }

    /// Mark an ID as seen.
    pub fn mark(&self, correlation_id: &str) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(correlation_id.to_string(), true);
    }

    /// Unmark an ID after a processing failure so a retry is admitted.
    pub fn unmark(&self, correlation_id: &str) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(correlation_id.to_string(), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_id_is_not_contained() {
        let store = DedupStore::new();
        assert!(!store.contains("c1"));
    }

    #[test]
    fn test_mark_then_contains() {
        let store = DedupStore::new();
        store.mark("c1");
        assert!(store.contains("c1"));
        assert!(!store.contains("c2"));
    }

    #[test]
    fn test_unmark_admits_retry() {
        let store = DedupStore::new();
        store.mark("c1");
        store.unmark("c1");
        assert!(!store.contains("c1"));

        // The retry marks it again.
        store.mark("c1");
        assert!(store.contains("c1"));
    }
}
