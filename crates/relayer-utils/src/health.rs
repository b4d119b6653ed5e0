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

//! # Health Reporter
//!
//! Process wide counters and last-known-good timestamps, updated by the
//! event handler through the [`RewardObserver`] trait and read by the health
//! server. Nothing in here affects how events are handled.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::metric::Metrics;
use crate::{now_millis, Error};

/// Receives the outcome of every step of the reward pipeline.
pub trait RewardObserver: Send + Sync {
    /// A victorious game was received.
    fn record_game_victory(&self);
    /// An event was skipped without minting.
    fn record_event_skipped(&self) {}
    /// A single mint attempt failed, it may still be retried.
    fn record_mint_attempt_failure(&self, _attempt: usize, _error: &Error) {}
    /// A mint was confirmed and recorded.
    fn record_mint_success(&self);
    /// A mint was given up on after all retries.
    fn record_mint_failure(&self, error: &Error);
    /// A mint was confirmed but recording it failed.
    fn record_commit_failure(&self, error: &Error);
}

/// Metadata of the processed events store, as shown in the health snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInfo {
    /// Where the store lives on disk, `None` for in-memory stores.
    pub path: Option<PathBuf>,
    /// Number of processed events currently kept.
    pub size: usize,
    /// Retention bound, `None` when unbounded.
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone, Default)]
struct HealthState {
    victories_seen: u64,
    mints_succeeded: u64,
    mints_failed: u64,
    commit_failures: u64,
    last_victory_at: Option<u64>,
    last_mint_success_at: Option<u64>,
    last_mint_failure_at: Option<u64>,
    last_error: Option<String>,
}

/// A point in time view of the relayer health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    /// Always `"ok"` while the process is able to answer.
    pub status: String,
    /// Epoch millis of the relayer start.
    pub started_at: u64,
    /// Epoch millis when this snapshot was taken.
    pub timestamp: u64,
    /// Milliseconds since start.
    pub uptime_ms: u64,
    pub victories_seen: u64,
    pub mints_succeeded: u64,
    pub mints_failed: u64,
    pub commit_failures: u64,
    pub last_victory_at: Option<u64>,
    pub last_mint_success_at: Option<u64>,
    pub last_mint_failure_at: Option<u64>,
    pub last_error: Option<String>,
    /// Processed events store metadata.
    pub store: StoreInfo,
}

/// The relayer health reporter.
///
/// Counters are kept here and mirrored into the prometheus [`Metrics`].
#[derive(Debug)]
pub struct HealthReporter {
    started_at: u64,
    state: RwLock<HealthState>,
    metrics: Metrics,
}

impl HealthReporter {
    /// Creates a new reporter, counting from zero.
    pub fn new(metrics: Metrics) -> Self {
        Self {
            started_at: now_millis(),
            state: RwLock::new(HealthState::default()),
            metrics,
        }
    }

    /// The prometheus metrics this reporter feeds.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Takes a snapshot of the counters, together with the given store info.
    pub fn snapshot(&self, store: StoreInfo) -> HealthSnapshot {
        self.metrics.processed_events_stored.set(store.size as f64);
        let state = self.state.read().clone();
        let timestamp = now_millis();
        HealthSnapshot {
            status: String::from("ok"),
            started_at: self.started_at,
            timestamp,
            uptime_ms: timestamp.saturating_sub(self.started_at),
            victories_seen: state.victories_seen,
            mints_succeeded: state.mints_succeeded,
            mints_failed: state.mints_failed,
            commit_failures: state.commit_failures,
            last_victory_at: state.last_victory_at,
            last_mint_success_at: state.last_mint_success_at,
            last_mint_failure_at: state.last_mint_failure_at,
            last_error: state.last_error,
            store,
        }
    }

    /// Writes a snapshot as pretty JSON to `path`.
    ///
    /// The file is replaced atomically, readers never see a partial snapshot.
    pub async fn persist<P: AsRef<Path>>(
        &self,
        path: P,
        store: StoreInfo,
    ) -> crate::Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(dir).await?;
        }
        let snapshot = self.snapshot(store);
        let json = serde_json::to_vec_pretty(&snapshot)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        tracing::event!(
            target: crate::probe::TARGET,
            tracing::Level::TRACE,
            kind = %crate::probe::Kind::Health,
            path = %path.display(),
            persisted = true,
        );
        Ok(())
    }
}

impl RewardObserver for HealthReporter {
    fn record_game_victory(&self) {
        let mut state = self.state.write();
        state.victories_seen += 1;
        state.last_victory_at = Some(now_millis());
        self.metrics.victories_seen.inc();
    }

    fn record_event_skipped(&self) {
        self.metrics.events_skipped.inc();
    }

    fn record_mint_attempt_failure(&self, _attempt: usize, _error: &Error) {
        self.metrics.mint_attempts_failed.inc();
    }

    fn record_mint_success(&self) {
        let mut state = self.state.write();
        state.mints_succeeded += 1;
        state.last_mint_success_at = Some(now_millis());
        self.metrics.mints_succeeded.inc();
    }

    fn record_mint_failure(&self, error: &Error) {
        let mut state = self.state.write();
        state.mints_failed += 1;
        state.last_mint_failure_at = Some(now_millis());
        state.last_error = Some(error.to_string());
        self.metrics.mints_failed.inc();
    }

    fn record_commit_failure(&self, error: &Error) {
        let mut state = self.state.write();
        state.commit_failures += 1;
        state.last_error = Some(error.to_string());
        self.metrics.commit_failures.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_info() -> StoreInfo {
        StoreInfo {
            path: Some(PathBuf::from("/tmp/events.jsonl")),
            size: 7,
            max_entries: Some(100),
        }
    }

    #[test]
    fn counters_show_up_in_the_snapshot() {
        let reporter = HealthReporter::new(Metrics::new().unwrap());
        reporter.record_game_victory();
        reporter.record_game_victory();
        reporter.record_mint_success();
        reporter.record_mint_failure(&Error::Mint("reverted".into()));

        let snapshot = reporter.snapshot(store_info());
        assert_eq!(snapshot.status, "ok");
        assert_eq!(snapshot.victories_seen, 2);
        assert_eq!(snapshot.mints_succeeded, 1);
        assert_eq!(snapshot.mints_failed, 1);
        assert_eq!(snapshot.commit_failures, 0);
        assert!(snapshot.last_victory_at.is_some());
        assert!(snapshot.last_mint_success_at.is_some());
        assert_eq!(snapshot.last_error.as_deref(), Some("Mint failed: reverted"));
        assert_eq!(snapshot.store.size, 7);
        assert_eq!(reporter.metrics().processed_events_stored.get(), 7.0);
        assert_eq!(reporter.metrics().mints_failed.get(), 1.0);
    }

    #[test]
    fn snapshot_serializes_in_camel_case() {
        let reporter = HealthReporter::new(Metrics::new().unwrap());
        let value = serde_json::to_value(reporter.snapshot(store_info()))
            .unwrap();
        assert_eq!(value["victoriesSeen"], 0);
        assert_eq!(value["store"]["maxEntries"], 100);
        assert!(value["lastMintFailureAt"].is_null());
    }

    #[tokio::test]
    async fn persists_snapshot_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("health.json");
        let reporter = HealthReporter::new(Metrics::new().unwrap());
        reporter.record_game_victory();
        reporter.persist(&path, store_info()).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let snapshot: HealthSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(snapshot.victories_seen, 1);
    }
}
