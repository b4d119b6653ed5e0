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

//! # Worboo EVM Event Watchers 🕸️
//!
//! Watches the `WorbooRegistry` contract for `GameRecorded` events and mints
//! `WorbooToken` rewards for every victory.

use std::ops;
use std::sync::Arc;
use std::time::Duration;

use ethers::contract::Contract;
use ethers::prelude::Middleware;
use ethers::types::Address;

use worboo_event_watcher_traits::evm::{
    EthersClient, EventWatcher, WatchableContract,
};
use worboo_event_watcher_traits::GameRecordedEvent;

/// Contract bindings of the Worboo contracts.
pub mod contracts;
/// The token mint side effect.
pub mod mint;
/// Handlers that turn recorded games into rewards.
pub mod reward;

#[cfg(test)]
mod tests;

pub use contracts::worboo_registry::{GameRecordedFilter, WorbooRegistry};
pub use contracts::worboo_token::WorbooToken;
pub use mint::TokenMintAction;
pub use reward::{plan, GameRecordedHandler, Plan};

/// RegistryContractWrapper contains the `WorbooRegistry` contract along
/// with the polling configuration of its watcher.
#[derive(Clone, Debug)]
pub struct RegistryContractWrapper<M>
where
    M: Middleware,
{
    /// The watched registry contract.
    pub contract: WorbooRegistry<M>,
    start_block: Option<u64>,
    polling_interval: Duration,
    max_blocks_per_step: u64,
}

impl<M> RegistryContractWrapper<M>
where
    M: Middleware,
{
    /// Creates a new RegistryContractWrapper from the relayer configuration.
    pub fn new(
        address: Address,
        config: &worboo_relayer_config::WorbooRelayerConfig,
        client: Arc<M>,
    ) -> Self {
        Self {
            contract: WorbooRegistry::new(address, client),
            start_block: config.start_block,
            polling_interval: config.polling_interval(),
            max_blocks_per_step: config.max_blocks_per_step,
        }
    }
}

impl<M> ops::Deref for RegistryContractWrapper<M>
where
    M: Middleware,
{
    type Target = Contract<M>;

    fn deref(&self) -> &Self::Target {
        &self.contract
    }
}

impl<M> WatchableContract for RegistryContractWrapper<M>
where
    M: Middleware,
{
    fn start_block(&self) -> Option<u64> {
        self.start_block
    }

    fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    fn max_blocks_per_step(&self) -> u64 {
        self.max_blocks_per_step
    }
}

/// A Registry Contract Watcher that watches for `GameRecorded` events.
#[derive(Copy, Clone, Debug, Default)]
pub struct GameRecordedWatcher;

#[async_trait::async_trait]
impl EventWatcher for GameRecordedWatcher {
    const TAG: &'static str = "Worboo Registry Watcher";

    type Contract = RegistryContractWrapper<EthersClient>;

    type Events = GameRecordedFilter;
}

impl From<GameRecordedFilter> for GameRecordedEvent {
    fn from(event: GameRecordedFilter) -> Self {
        Self {
            player: event.player,
            day_id: event.day_id,
            word_hash: event.word_hash,
            guesses: event.guesses,
            victory: event.victory,
            streak: event.streak,
            total_games: event.total_games,
            total_wins: event.total_wins,
        }
    }
}
