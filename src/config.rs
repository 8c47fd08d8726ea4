// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custodia Project

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup and passed to
//! components explicitly; nothing reads ambient state after construction.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `MASTER_KEY` | 32-byte hex master secret (64 chars) | Required |
//! | `DATA_DIR` | Root directory for file-backed stores | `/data` |
//! | `RPC_URL` | EVM JSON-RPC endpoint | Required for chain operations |
//! | `CHAIN_ID` | Chain identifier | `11155111` (Sepolia) |
//! | `CHAIN_CALL_TIMEOUT_SECS` | Bound on every outbound chain call | `30` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;
use std::time::Duration;

use crate::custody::{MasterKey, MasterKeyError};

/// Default root for file-backed persistent storage.
pub const DEFAULT_DATA_DIR: &str = "/data";

/// Default chain target (Sepolia).
pub const DEFAULT_CHAIN_ID: u64 = 11155111;

/// Default bound on outbound chain calls.
pub const DEFAULT_CHAIN_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error(transparent)]
    MasterKey(#[from] MasterKeyError),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Process configuration, resolved once at startup.
pub struct Config {
    /// Master secret for key custody. Supplied out of band; never
    /// generated or derived at runtime.
    pub master_key: MasterKey,
    /// Root directory for the file-backed stores.
    pub data_dir: PathBuf,
    /// JSON-RPC endpoint. Absent when the embedder supplies its own
    /// chain client implementation.
    pub rpc_url: Option<String>,
    /// Chain identifier for built transactions.
    pub chain_id: u64,
    /// Mandatory bound applied to every outbound chain call.
    pub chain_call_timeout: Duration,
}

impl Config {
    /// Load configuration from the environment, failing fast on invalid
    /// values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let master_key_hex =
            std::env::var("MASTER_KEY").map_err(|_| ConfigError::Missing("MASTER_KEY"))?;
        let master_key = MasterKey::from_hex(&master_key_hex)?;

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

        let rpc_url = std::env::var("RPC_URL").ok();

        let chain_id = match std::env::var("CHAIN_ID") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                var: "CHAIN_ID",
                reason: e.to_string(),
            })?,
            Err(_) => DEFAULT_CHAIN_ID,
        };

        let chain_call_timeout = match std::env::var("CHAIN_CALL_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs = raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                    var: "CHAIN_CALL_TIMEOUT_SECS",
                    reason: e.to_string(),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        var: "CHAIN_CALL_TIMEOUT_SECS",
                        reason: "timeout must be non-zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            Err(_) => DEFAULT_CHAIN_CALL_TIMEOUT,
        };

        Ok(Self {
            master_key,
            data_dir,
            rpc_url,
            chain_id,
            chain_call_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_key_must_be_64_hex_chars() {
        assert!(MasterKey::from_hex("deadbeef").is_err());
        assert!(MasterKey::from_hex(&"0".repeat(64)).is_ok());
        assert!(MasterKey::from_hex(&"z".repeat(64)).is_err());
    }

    #[test]
    fn defaults_are_sane() {
        assert_eq!(DEFAULT_CHAIN_ID, 11155111);
        assert_eq!(DEFAULT_CHAIN_CALL_TIMEOUT, Duration::from_secs(30));
        assert_eq!(DEFAULT_DATA_DIR, "/data");
    }
}
