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

//! # Relayer Store Module 🕸️
//!
//! A module for remembering which chain events were already rewarded.
//!
//! ## Overview
//!
//! Every handled event is identified by a key (`<tx hash>:<log index>`). Once
//! the reward for it is minted, the key is recorded together with the mint
//! transaction hash, so redelivered events are never rewarded twice, even
//! across restarts.
//!
//! Lookups are always answered from memory. Writes go through a single
//! writer task so they land on disk in the order they were submitted.

use std::path::Path;

use serde::{Deserialize, Serialize};
use worboo_relayer_utils::health::StoreInfo;
use worboo_relayer_utils::Result;

mod index;
/// A store backed by an append-only JSON lines file.
pub mod jsonl;
/// A module for managing in-memory storage of the relayer.
pub mod mem;

/// A store that keeps processed events in a JSON lines file.
pub use jsonl::JsonlStore;
/// A store that uses in memory data structures as the backend.
pub use mem::InMemoryStore;

/// A single processed event, one line of the on-disk log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEventRecord {
    /// The dedup key of the event.
    pub key: String,
    /// Hash of the mint transaction.
    #[serde(rename = "txHash")]
    pub tx_hash: String,
    /// Epoch millis of when the record was committed.
    #[serde(rename = "mintedAt")]
    pub minted_at: u64,
}

/// What is known about a processed event when it is marked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedEventMetadata {
    /// Hash of the mint transaction.
    pub tx_hash: String,
    /// Defaults to now.
    pub minted_at: Option<u64>,
}

impl ProcessedEventMetadata {
    /// Metadata for a mint that happened just now.
    pub fn new(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            minted_at: None,
        }
    }

    pub(crate) fn into_record(self, key: &str) -> ProcessedEventRecord {
        ProcessedEventRecord {
            key: key.to_owned(),
            tx_hash: self.tx_hash,
            minted_at: self
                .minted_at
                .unwrap_or_else(worboo_relayer_utils::now_millis),
        }
    }
}

/// A store of events that were already handled.
#[async_trait::async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Whether `key` was already processed. Never waits on I/O.
    fn has_processed(&self, key: &str) -> bool;

    /// Records `key` as processed.
    ///
    /// Does nothing if the key is already known. Otherwise the key is
    /// visible to [`Self::has_processed`] right away, and the returned
    /// future resolves once the record was written.
    async fn mark_processed(
        &self,
        key: &str,
        meta: ProcessedEventMetadata,
    ) -> Result<()>;

    /// Number of processed events kept.
    fn size(&self) -> usize;

    /// Backing file, if any.
    fn path(&self) -> Option<&Path>;

    /// Retention bound, `None` means unbounded.
    fn max_entries(&self) -> Option<usize>;

    /// Waits for every queued write to finish and stops accepting new ones.
    async fn close(&self) -> Result<()>;

    /// Store metadata for the health snapshot.
    fn info(&self) -> StoreInfo {
        StoreInfo {
            path: self.path().map(Path::to_path_buf),
            size: self.size(),
            max_entries: self.max_entries(),
        }
    }
}

/// `0` and `None` both mean no retention bound.
pub(crate) fn normalize_max_entries(
    max_entries: Option<usize>,
) -> Option<usize> {
    max_entries.filter(|max| *max > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_uses_the_log_field_names() {
        let record = ProcessedEventMetadata {
            tx_hash: String::from("0xmint"),
            minted_at: Some(42),
        }
        .into_record("0xabc:1");
        let line = serde_json::to_string(&record).unwrap();
        assert_eq!(line, r#"{"key":"0xabc:1","txHash":"0xmint","mintedAt":42}"#);
    }

    #[test]
    fn minted_at_defaults_to_now() {
        let before = worboo_relayer_utils::now_millis();
        let record = ProcessedEventMetadata::new("0xmint").into_record("k");
        assert!(record.minted_at >= before);
    }

    #[test]
    fn zero_max_entries_is_unbounded() {
        assert_eq!(normalize_max_entries(Some(0)), None);
        assert_eq!(normalize_max_entries(None), None);
        assert_eq!(normalize_max_entries(Some(3)), Some(3));
    }
}
