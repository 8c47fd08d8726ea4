// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! Path constants and utilities for the file-backed storage layout.

use std::path::{Path, PathBuf};

use crate::config::DEFAULT_DATA_DIR;

/// Storage path utilities for the persistent store.
#[derive(Debug, Clone)]
pub struct StorePaths {
    root: PathBuf,
}

impl Default for StorePaths {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl StorePaths {
    /// Create a new StorePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all persisted data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Wallet Paths ==========

    /// Directory containing all wallet records.
    pub fn wallets_dir(&self) -> PathBuf {
        self.root.join("wallets")
    }

    /// Path to a wallet record, keyed by checksummed address.
    pub fn wallet(&self, address: &str) -> PathBuf {
        self.wallets_dir().join(format!("{address}.json"))
    }

    // ========== Transaction Paths ==========

    /// Directory containing all transaction records.
    pub fn transactions_dir(&self) -> PathBuf {
        self.root.join("transactions")
    }

    /// Path to a transaction record, keyed by id.
    pub fn transaction(&self, tx_id: &str) -> PathBuf {
        self.transactions_dir().join(format!("{tx_id}.json"))
    }

    // ========== Policy Paths ==========

    /// Directory containing all policy records.
    pub fn policies_dir(&self) -> PathBuf {
        self.root.join("policies")
    }

    /// Path to a policy record, keyed by id.
    pub fn policy(&self, policy_id: &str) -> PathBuf {
        self.policies_dir().join(format!("{policy_id}.json"))
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StorePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
    }

    #[test]
    fn custom_root_for_testing() {
        let paths = StorePaths::new("/tmp/test-data");
        assert_eq!(paths.root(), Path::new("/tmp/test-data"));
        assert_eq!(
            paths.wallet("0xAbC"),
            PathBuf::from("/tmp/test-data/wallets/0xAbC.json")
        );
    }

    #[test]
    fn entity_paths_are_correct() {
        let paths = StorePaths::default();
        assert_eq!(paths.wallets_dir(), PathBuf::from("/data/wallets"));
        assert_eq!(
            paths.transaction("tx-1"),
            PathBuf::from("/data/transactions/tx-1.json")
        );
        assert_eq!(
            paths.policy("p-1"),
            PathBuf::from("/data/policies/p-1.json")
        );
        assert_eq!(
            paths.audit_events_file("2026-08-06"),
            PathBuf::from("/data/audit/2026-08-06/events.jsonl")
        );
    }
}
