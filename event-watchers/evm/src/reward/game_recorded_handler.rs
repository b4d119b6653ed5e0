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

use std::sync::Arc;

use ethers::types::{Address, U256};
use worboo_event_watcher_traits::{
    EventHandler, EventIdentity, GameRecordedEvent, HandleOutcome,
    MintAction, SkipReason,
};
use worboo_relayer_store::{ProcessedEventMetadata, ProcessedEventStore};
use worboo_relayer_utils::health::RewardObserver;
use worboo_relayer_utils::probe;
use worboo_relayer_utils::retry::{retry_with_observer, RetryPolicy};
use worboo_relayer_utils::Error;

/// What should happen with a single recorded game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Nothing to do.
    Skip(SkipReason),
    /// Mint `amount` to `to`, then record `key`.
    Mint {
        key: String,
        to: Address,
        amount: U256,
    },
}

/// Decides what to do with `event`.
///
/// Lost games are never rewarded nor recorded, so they are checked before
/// the store is.
pub fn plan(
    event: &GameRecordedEvent,
    key: String,
    already_processed: bool,
    reward: U256,
) -> Plan {
    if !event.victory {
        Plan::Skip(SkipReason::NotAVictory)
    } else if already_processed {
        Plan::Skip(SkipReason::AlreadyProcessed)
    } else {
        Plan::Mint {
            key,
            to: event.player,
            amount: reward,
        }
    }
}

/// Rewards every victorious `GameRecorded` event exactly once, as far as
/// the processed events store can tell.
#[derive(typed_builder::TypedBuilder)]
pub struct GameRecordedHandler {
    /// Reward per victory, in base units.
    #[builder(setter(into))]
    reward: U256,
    store: Arc<dyn ProcessedEventStore>,
    mint_action: Arc<dyn MintAction>,
    retry_policy: RetryPolicy,
    observer: Arc<dyn RewardObserver>,
}

impl std::fmt::Debug for GameRecordedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameRecordedHandler")
            .field("reward", &self.reward)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl EventHandler for GameRecordedHandler {
    type Event = GameRecordedEvent;

    #[tracing::instrument(
        skip_all,
        fields(key = %identity.dedup_key(), player = %format!("{:#x}", event.player))
    )]
    async fn handle_event(
        &self,
        event: Self::Event,
        identity: EventIdentity,
    ) -> HandleOutcome {
        tracing::info!(
            victory = event.victory,
            streak = %event.streak,
            total_wins = %event.total_wins,
            "GameRecorded received",
        );
        if event.victory {
            self.observer.record_game_victory();
        }
        let key = identity.dedup_key();
        let already_processed = self.store.has_processed(&key);
        let (key, to, amount) =
            match plan(&event, key, already_processed, self.reward) {
                Plan::Skip(reason) => {
                    tracing::debug!(%reason, "Skipping event");
                    self.observer.record_event_skipped();
                    return HandleOutcome::Skipped(reason);
                }
                Plan::Mint { key, to, amount } => (key, to, amount),
            };

        let mint_action = self.mint_action.clone();
        let result = retry_with_observer(
            self.retry_policy.to_backoff(),
            || {
                let mint_action = mint_action.clone();
                async move { mint_action.mint(to, amount).await }
            },
            |attempt, error| {
                tracing::warn!(attempt, %error, "Mint attempt failed");
                self.observer.record_mint_attempt_failure(attempt, error);
            },
        )
        .await;

        let tx_hash = match result {
            Ok(tx_hash) => tx_hash,
            Err(error) => {
                let attempts = match &error {
                    Error::RetryExhausted { attempts, .. } => *attempts,
                    _ => 1,
                };
                tracing::error!(
                    tx = %format!("{:#x}", identity.transaction_hash),
                    log_index = identity.log_index,
                    %error,
                    "Failed to mint reward",
                );
                self.observer.record_mint_failure(&error);
                return HandleOutcome::Failed { attempts };
            }
        };

        let tx_hash_hex = format!("{tx_hash:#x}");
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Mint,
            key = %key,
            tx_hash = %tx_hash_hex,
            amount = %amount,
        );
        match self
            .store
            .mark_processed(&key, ProcessedEventMetadata::new(&tx_hash_hex))
            .await
        {
            Ok(()) => {
                tracing::info!(
                    tx_hash = %tx_hash_hex,
                    %amount,
                    "Minted reward",
                );
                self.observer.record_mint_success();
                HandleOutcome::Done { tx_hash }
            }
            Err(error) => {
                tracing::error!(
                    %key,
                    player = %format!("{to:#x}"),
                    tx_hash = %tx_hash_hex,
                    %error,
                    "Reward minted but could not be recorded, replay manually",
                );
                self.observer.record_commit_failure(&error);
                HandleOutcome::CommitFailed { tx_hash }
            }
        }
    }
}
