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
//! # Relayer Events Watcher Module 🕸️
//!
//! A module that listens for events on a given chain.
//!
//! ## Overview
//!
//! Event watchers poll a contract for logs in block windows and push every
//! decoded event, together with its [`EventIdentity`], into a channel.
//! Event handlers consume that channel and decide what to do with each event.
//! Delivery is at-least-once, handlers are expected to deduplicate by
//! [`EventIdentity::dedup_key`].

/// EVM event watching traits.
pub mod evm;
pub use evm::{EventWatcher, WatchableContract};

#[cfg(test)]
mod tests;

use ethers::types::{Address, TxHash, H256, U256};

/// Where an event was emitted, used to tell redeliveries apart from new
/// events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventIdentity {
    /// Hash of the transaction that emitted the event.
    pub transaction_hash: H256,
    /// Index of the log inside its block.
    pub log_index: u64,
}

impl EventIdentity {
    /// The dedup key of the event: `<0x prefixed lower case tx hash>:<log index>`.
    pub fn dedup_key(&self) -> String {
        format!("{:#x}:{}", self.transaction_hash, self.log_index)
    }
}

impl From<&ethers::contract::LogMeta> for EventIdentity {
    fn from(meta: &ethers::contract::LogMeta) -> Self {
        Self {
            transaction_hash: meta.transaction_hash,
            log_index: meta.log_index.low_u64(),
        }
    }
}

/// An event as delivered by an [`EventWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent<E> {
    /// The decoded event.
    pub event: E,
    /// Where it was emitted.
    pub identity: EventIdentity,
    /// Block that contains the event.
    pub block_number: u64,
}

/// A finished game, as recorded by the `WorbooRegistry` contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecordedEvent {
    /// The player of the game.
    pub player: Address,
    /// Day of the puzzle.
    pub day_id: U256,
    /// Commitment to the solution word.
    pub word_hash: [u8; 32],
    /// Number of guesses used.
    pub guesses: u8,
    /// Whether the player found the word.
    pub victory: bool,
    /// Current win streak of the player.
    pub streak: U256,
    /// Games played by the player so far.
    pub total_games: U256,
    /// Games won by the player so far.
    pub total_wins: U256,
}

/// The side effect performed for every rewarded event.
#[async_trait::async_trait]
pub trait MintAction: Send + Sync {
    /// Mints `amount` base units of the reward token to `to`, resolves once
    /// the transaction is confirmed.
    async fn mint(
        &self,
        to: Address,
        amount: U256,
    ) -> worboo_relayer_utils::Result<TxHash>;
}

/// Terminal state of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Nothing was minted, the reason is attached.
    Skipped(SkipReason),
    /// Minted and recorded.
    Done {
        /// Hash of the mint transaction.
        tx_hash: TxHash,
    },
    /// Minted, but recording it failed. The event may be minted again if it
    /// is redelivered.
    CommitFailed {
        /// Hash of the mint transaction.
        tx_hash: TxHash,
    },
    /// Every mint attempt failed, the event stays unprocessed.
    Failed {
        /// How many attempts were made.
        attempts: usize,
    },
}

/// Why an event was not rewarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The dedup key is already recorded.
    AlreadyProcessed,
    /// The game was lost.
    NotAVictory,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyProcessed => write!(f, "already processed"),
            SkipReason::NotAVictory => write!(f, "not a victory"),
        }
    }
}

/// A trait that defines a handler for a specific event type.
///
/// The handlers are implemented separately from the watchers, the watcher
/// only pushes events into a channel.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    /// The type of event this handler is for.
    type Event: Send + Sync + 'static;

    /// Handles a single event, to a terminal state. Never fails, failures
    /// are part of the outcome.
    async fn handle_event(
        &self,
        event: Self::Event,
        identity: EventIdentity,
    ) -> HandleOutcome;
}
