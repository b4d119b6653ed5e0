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
use std::time::Duration;

use ethers::contract::EthEvent;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, U256};
use tokio::sync::mpsc;
use worboo_event_watcher_traits::evm::{EventWatcher, WatchableContract};
use worboo_event_watcher_traits::GameRecordedEvent;
use worboo_relayer_config::WorbooRelayerConfig;
use worboo_relayer_context::RelayerContext;
use worboo_relayer_store::InMemoryStore;

use crate::{GameRecordedFilter, GameRecordedWatcher, RegistryContractWrapper};

fn config(rpc_url: &str) -> WorbooRelayerConfig {
    serde_json::from_value(serde_json::json!({
        "rpc_url": rpc_url,
        "private_key": "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
        "registry_address": "0x1111111111111111111111111111111111111111",
        "token_address": "0x2222222222222222222222222222222222222222",
        "start_block": 120,
        "max_blocks_per_step": 50,
        "polling_interval_ms": 250,
    }))
    .unwrap()
}

#[test]
fn game_recorded_signature() {
    assert_eq!(
        GameRecordedFilter::abi_signature(),
        "GameRecorded(address,uint256,bytes32,uint8,bool,uint256,uint256,uint256)"
    );
}

#[test]
fn filter_converts_to_game_event() {
    let filter = GameRecordedFilter {
        player: Address::repeat_byte(0x42),
        day_id: U256::from(19_500),
        word_hash: [0x09; 32],
        guesses: 3,
        victory: true,
        streak: U256::from(5),
        total_games: U256::from(12),
        total_wins: U256::from(9),
    };
    let event = GameRecordedEvent::from(filter);
    assert_eq!(event.player, Address::repeat_byte(0x42));
    assert_eq!(event.day_id, U256::from(19_500));
    assert_eq!(event.guesses, 3);
    assert!(event.victory);
    assert_eq!(event.total_wins, U256::from(9));
}

#[test]
fn wrapper_takes_polling_settings_from_config() {
    let config = config("http://127.0.0.1:8545");
    let client =
        Arc::new(Provider::<Http>::try_from("http://127.0.0.1:8545").unwrap());
    let wrapper = RegistryContractWrapper::new(
        Address::repeat_byte(0x11),
        &config,
        client,
    );
    assert_eq!(wrapper.start_block(), Some(120));
    assert_eq!(wrapper.max_blocks_per_step(), 50);
    assert_eq!(wrapper.polling_interval(), Duration::from_millis(250));
    assert_eq!(wrapper.address(), Address::repeat_byte(0x11));
}

#[tokio::test]
async fn watcher_stops_on_shutdown_while_node_is_down() {
    // nothing listens on port 1, every poll fails.
    let rpc_url = "http://127.0.0.1:1";
    let ctx = Arc::new(
        RelayerContext::new(config(rpc_url), Arc::new(InMemoryStore::default()))
            .unwrap(),
    );
    let client = Arc::new(Provider::<Http>::try_from(rpc_url).unwrap());
    let wrapper = RegistryContractWrapper::new(
        Address::repeat_byte(0x11),
        &ctx.config,
        client.clone(),
    );
    let (tx, mut rx) = mpsc::channel(8);

    let watcher_ctx = ctx.clone();
    let handle = tokio::spawn(async move {
        GameRecordedWatcher
            .run(client, wrapper, tx, &watcher_ctx)
            .await
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    ctx.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("watcher did not stop")
        .unwrap();
    assert!(result.is_ok());
    assert!(rx.recv().await.is_none());
    assert!(ctx.metrics().watcher_back_off.get() >= 1.0);
}
