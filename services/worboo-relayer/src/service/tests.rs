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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, H256, U256};
use tokio::sync::mpsc;
use worboo_event_watcher_traits::{
    EventHandler, EventIdentity, GameRecordedEvent, HandleOutcome, SkipReason,
    WatchedEvent,
};
use worboo_ew_evm::GameRecordedFilter;
use worboo_relayer_config::WorbooRelayerConfig;
use worboo_relayer_context::RelayerContext;
use worboo_relayer_store::InMemoryStore;

use super::evm::start_reward_handler;
use super::{build_web_services, cors_layer};

fn context(extra: serde_json::Value) -> RelayerContext {
    let mut value = serde_json::json!({
        "rpc_url": "http://127.0.0.1:8545",
        "private_key": "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
        "registry_address": "0x1111111111111111111111111111111111111111",
        "token_address": "0x2222222222222222222222222222222222222222",
        "health_host": "127.0.0.1",
        "health_port": 0,
    });
    if let (Some(base), Some(extra)) =
        (value.as_object_mut(), extra.as_object())
    {
        base.extend(extra.clone());
    }
    let config: WorbooRelayerConfig = serde_json::from_value(value).unwrap();
    RelayerContext::new(config, Arc::new(InMemoryStore::default())).unwrap()
}

fn watched(log_index: u64) -> WatchedEvent<GameRecordedFilter> {
    WatchedEvent {
        event: GameRecordedFilter {
            player: Address::repeat_byte(0x33),
            day_id: U256::from(19_000),
            word_hash: [0u8; 32],
            guesses: 2,
            victory: true,
            streak: U256::one(),
            total_games: U256::one(),
            total_wins: U256::one(),
        },
        identity: EventIdentity {
            transaction_hash: H256::repeat_byte(0x01),
            log_index,
        },
        block_number: 10,
    }
}

/// Counts events and optionally takes its time with each of them.
struct CountingHandler {
    handled: AtomicUsize,
    delay: Duration,
}

impl CountingHandler {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            handled: AtomicUsize::new(0),
            delay,
        })
    }
}

#[async_trait::async_trait]
impl EventHandler for CountingHandler {
    type Event = GameRecordedEvent;

    async fn handle_event(
        &self,
        event: Self::Event,
        _identity: EventIdentity,
    ) -> HandleOutcome {
        assert_eq!(event.player, Address::repeat_byte(0x33));
        tokio::time::sleep(self.delay).await;
        self.handled.fetch_add(1, Ordering::SeqCst);
        HandleOutcome::Skipped(SkipReason::AlreadyProcessed)
    }
}

#[tokio::test]
async fn every_event_is_handled_before_the_channel_closes() {
    let ctx = context(serde_json::json!({}));
    let handler = CountingHandler::new(Duration::from_millis(5));
    let (tx, rx) = mpsc::channel(8);
    let task = start_reward_handler(
        &ctx,
        handler.clone(),
        rx,
        2,
        Duration::from_secs(5),
    );
    for i in 0..6 {
        tx.send(watched(i)).await.unwrap();
    }
    drop(tx);
    task.await.unwrap();
    assert_eq!(handler.handled.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_at_most_the_grace_period() {
    let ctx = context(serde_json::json!({}));
    let handler = CountingHandler::new(Duration::from_secs(3_600));
    let (tx, rx) = mpsc::channel(8);
    let task = start_reward_handler(
        &ctx,
        handler.clone(),
        rx,
        4,
        Duration::from_secs(10),
    );
    tx.send(watched(0)).await.unwrap();
    // let the handler pick the event up.
    tokio::time::sleep(Duration::from_millis(10)).await;
    let started = tokio::time::Instant::now();
    ctx.shutdown();
    task.await.unwrap();
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(10));
    assert!(waited < Duration::from_secs(11));
    assert_eq!(handler.handled.load(Ordering::SeqCst), 0);
    // nothing is taken after shutdown.
    assert!(tx.send(watched(1)).await.is_err());
}

#[test]
fn cors_can_be_disabled_or_pinned() {
    assert!(cors_layer(None).unwrap().is_none());
    assert!(cors_layer(Some("*")).unwrap().is_some());
    assert!(cors_layer(Some("https://worboo.app")).unwrap().is_some());
    assert!(cors_layer(Some("bad\norigin")).is_err());
}

#[tokio::test]
async fn health_server_answers_and_stops_on_shutdown() {
    let ctx = context(serde_json::json!({
        "health_cors_origin": "https://worboo.app",
    }));
    let (addr, server) = build_web_services(ctx.clone()).unwrap();
    let server = tokio::spawn(server);

    let client = hyper::Client::new();
    let request = hyper::Request::get(format!("http://{addr}/health"))
        .header("Origin", "https://worboo.app")
        .body(hyper::Body::empty())
        .unwrap();
    let response = client.request(request).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://worboo.app"
    );
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let snapshot: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot["status"], "ok");
    assert_eq!(snapshot["store"]["size"], 0);

    let response = client
        .get(format!("http://{addr}/metrics").parse().unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    drop(client);

    ctx.shutdown();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
