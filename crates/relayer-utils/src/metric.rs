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

use prometheus::core::{AtomicF64, GenericCounter, GenericGauge};
use prometheus::{
    register_counter_with_registry, register_gauge_with_registry, Encoder,
    Registry, TextEncoder,
};

/// A struct definition for collecting metrics in the relayer.
///
/// Each instance owns its own [`Registry`], so several relayers (or tests)
/// can live in the same process.
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    /// Registry watcher back off metric
    pub watcher_back_off: GenericCounter<AtomicF64>,
    /// Victorious `GameRecorded` events seen by the relayer
    pub victories_seen: GenericCounter<AtomicF64>,
    /// Events skipped because they were already processed or not rewardable
    pub events_skipped: GenericCounter<AtomicF64>,
    /// Reward mints confirmed on chain
    pub mints_succeeded: GenericCounter<AtomicF64>,
    /// Reward mints given up on after all retries
    pub mints_failed: GenericCounter<AtomicF64>,
    /// Single mint attempts that failed, retried or not
    pub mint_attempts_failed: GenericCounter<AtomicF64>,
    /// Confirmed mints that could not be written to the processed events store
    pub commit_failures: GenericCounter<AtomicF64>,
    /// Number of records currently held by the processed events store
    pub processed_events_stored: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Instantiates the various metrics and their counters, also creates a registry for the counters and
    /// registers the counters
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("worboo_relayer".into()), None)?;

        let watcher_back_off = register_counter_with_registry!(
            "watcher_back_off",
            "specifies how many times the registry watcher backed off",
            registry
        )?;

        let victories_seen = register_counter_with_registry!(
            "victories_seen",
            "The total number of victorious games seen",
            registry
        )?;

        let events_skipped = register_counter_with_registry!(
            "events_skipped",
            "The total number of events skipped without minting",
            registry
        )?;

        let mints_succeeded = register_counter_with_registry!(
            "mints_succeeded",
            "The total number of reward mints confirmed on chain",
            registry
        )?;

        let mints_failed = register_counter_with_registry!(
            "mints_failed",
            "The total number of reward mints given up after all retries",
            registry
        )?;

        let mint_attempts_failed = register_counter_with_registry!(
            "mint_attempts_failed",
            "The total number of failed mint attempts",
            registry
        )?;

        let commit_failures = register_counter_with_registry!(
            "commit_failures",
            "Mints confirmed on chain but not recorded in the store",
            registry
        )?;

        let processed_events_stored = register_gauge_with_registry!(
            "processed_events_stored",
            "The number of processed events kept in the store",
            registry
        )?;

        Ok(Self {
            registry,
            watcher_back_off,
            victories_seen,
            events_skipped,
            mints_succeeded,
            mints_failed,
            mint_attempts_failed,
            commit_failures,
            processed_events_stored,
        })
    }

    /// Gathers the whole relayer metrics in the prometheus text format.
    pub fn gather_metrics(&self) -> Result<String, GatherMetricsError> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        // Gather the metrics.
        let metric_families = self.registry.gather();
        // Encode them to send.
        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatherMetricsError {
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    #[error(transparent)]
    FromUtf8Error(#[from] std::string::FromUtf8Error),
}
