// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![warn(missing_docs)]

//! # Relayer Configuration Module 🕸️
//!
//! A module for configuring the relayer.
//!
//! ## Overview
//!
//! The configuration is read once at startup from config file(s) (`.toml` or
//! `.json`) and `RELAYER_*` environment variables, the environment always
//! wins. Possible configuration include:
//! * `rpc_url`, `private_key`, `registry_address`, `token_address`: required.
//! * `reward_per_win`: whole tokens minted per victory. Defaults to 10.
//! * `max_retries` / `backoff_ms`: mint retry policy. Defaults to 3 / 1000.
//! * `cache_path` / `cache_max_entries`: processed events log.
//! * `health_*`: health server and health snapshot file.
//! * `log_*`: optional rotated JSON log file.

/// CLI configuration
#[cfg(feature = "cli")]
pub mod cli;
/// Default values of the optional configuration entries.
pub mod defaults;
/// A size rotated log file.
#[cfg(feature = "cli")]
pub mod log_file;
/// Utils for processing configuration
pub mod utils;

use std::path::PathBuf;
use std::time::Duration;

use ethers::types::Address;
use serde::Deserialize;
use worboo_relayer_types::{PrivateKey, RpcUrl, TokenAmount};
use worboo_relayer_utils::retry::RetryPolicy;

/// Values of `health_cors_origin` that turn CORS off.
const CORS_DISABLED: [&str; 3] = ["disable", "disabled", "off"];

/// WorbooRelayerConfig is the configuration for the worboo reward relayer.
///
/// Every key is also accepted in camelCase, and in the lowercased form config
/// files are read with.
#[derive(Debug, Clone, Deserialize)]
pub struct WorbooRelayerConfig {
    /// JSON-RPC endpoint of the chain.
    #[serde(default, alias = "rpcUrl", alias = "rpcurl")]
    pub rpc_url: Option<RpcUrl>,
    /// Operator key used to sign the mint transactions.
    #[serde(default, alias = "privateKey", alias = "privatekey")]
    pub private_key: Option<PrivateKey>,
    /// Address of the `WorbooRegistry` contract.
    #[serde(default, alias = "registryAddress", alias = "registryaddress")]
    pub registry_address: Option<Address>,
    /// Address of the `WorbooToken` contract.
    #[serde(default, alias = "tokenAddress", alias = "tokenaddress")]
    pub token_address: Option<Address>,
    /// Tokens minted for every victory.
    ///
    /// default to 10 tokens.
    #[serde(
        default = "defaults::reward_per_win",
        alias = "rewardPerWin",
        alias = "rewardperwin"
    )]
    pub reward_per_win: TokenAmount,
    /// How many times a failed mint is retried.
    #[serde(
        default = "defaults::max_retries",
        alias = "maxRetries",
        alias = "maxretries"
    )]
    pub max_retries: u32,
    /// Delay between two mint attempts, in milliseconds.
    #[serde(
        default = "defaults::backoff_ms",
        alias = "backoffMs",
        alias = "backoffms"
    )]
    pub backoff_ms: u64,
    /// Where the processed events log lives.
    #[serde(
        default = "defaults::cache_path",
        alias = "cachePath",
        alias = "cachepath"
    )]
    pub cache_path: PathBuf,
    /// Retention bound of the processed events log, unbounded if missing or 0.
    #[serde(default, alias = "cacheMaxEntries", alias = "cachemaxentries")]
    pub cache_max_entries: Option<usize>,
    /// Where the health snapshot is persisted.
    #[serde(
        default = "defaults::health_path",
        alias = "healthPath",
        alias = "healthpath"
    )]
    pub health_path: PathBuf,
    /// Interface the health server binds to.
    #[serde(
        default = "defaults::health_host",
        alias = "healthHost",
        alias = "healthhost"
    )]
    pub health_host: String,
    /// Port of the health server.
    #[serde(
        default = "defaults::health_port",
        alias = "healthPort",
        alias = "healthport"
    )]
    pub health_port: u16,
    /// Allowed CORS origin of the health server, see [`Self::cors_origin`].
    #[serde(
        default = "defaults::health_cors_origin",
        alias = "healthCorsOrigin",
        alias = "healthcorsorigin"
    )]
    pub health_cors_origin: String,
    /// Optional JSON log file.
    #[serde(
        default,
        alias = "logFilePath",
        alias = "logfilepath",
        alias = "log_file"
    )]
    pub log_file_path: Option<PathBuf>,
    /// Size after which the log file is rotated.
    #[serde(
        default = "defaults::log_max_bytes",
        alias = "logMaxBytes",
        alias = "logmaxbytes"
    )]
    pub log_max_bytes: u64,
    /// How many rotated log files are kept.
    #[serde(
        default = "defaults::log_backup_count",
        alias = "logBackupCount",
        alias = "logbackupcount",
        alias = "log_backups"
    )]
    pub log_backup_count: usize,
    /// How often the registry is polled for new events, in milliseconds.
    #[serde(
        default = "defaults::polling_interval_ms",
        alias = "pollingIntervalMs",
        alias = "pollingintervalms"
    )]
    pub polling_interval_ms: u64,
    /// Block range queried at once.
    #[serde(
        default = "defaults::max_blocks_per_step",
        alias = "maxBlocksPerStep",
        alias = "maxblocksperstep"
    )]
    pub max_blocks_per_step: u64,
    /// First block to scan, the latest block if missing.
    #[serde(default, alias = "startBlock", alias = "startblock")]
    pub start_block: Option<u64>,
    /// How many events are handled at the same time.
    #[serde(
        default = "defaults::max_concurrent_events",
        alias = "maxConcurrentEvents",
        alias = "maxconcurrentevents"
    )]
    pub max_concurrent_events: usize,
}

impl WorbooRelayerConfig {
    /// Makes sure every required value is present.
    ///
    /// Returns the first missing one as [`Error::MissingConfig`].
    ///
    /// [`Error::MissingConfig`]: worboo_relayer_utils::Error::MissingConfig
    pub fn verify(&self) -> worboo_relayer_utils::Result<()> {
        use worboo_relayer_utils::Error::MissingConfig;
        if self.rpc_url.is_none() {
            return Err(MissingConfig { field: "rpc_url" });
        }
        if self.private_key.is_none() {
            return Err(MissingConfig {
                field: "private_key",
            });
        }
        if self.registry_address.is_none() {
            return Err(MissingConfig {
                field: "registry_address",
            });
        }
        if self.token_address.is_none() {
            return Err(MissingConfig {
                field: "token_address",
            });
        }
        Ok(())
    }

    /// The CORS origin of the health server, `None` when disabled.
    pub fn cors_origin(&self) -> Option<&str> {
        let origin = self.health_cors_origin.trim();
        let disabled = origin.is_empty()
            || CORS_DISABLED.iter().any(|d| origin.eq_ignore_ascii_case(d));
        (!disabled).then_some(origin)
    }

    /// Retry policy of the mint action.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.backoff_ms),
        )
    }

    /// Retention bound of the processed events log.
    pub fn cache_max_entries(&self) -> Option<usize> {
        self.cache_max_entries.filter(|max| *max > 0)
    }

    /// Polling interval of the registry watcher.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Address the health server listens on.
    pub fn health_addr(&self) -> String {
        format!("{}:{}", self.health_host, self.health_port)
    }
}
