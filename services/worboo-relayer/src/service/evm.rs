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

use ethers::types::Address;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use worboo_event_watcher_traits::evm::{EthersClient, EventWatcher};
use worboo_event_watcher_traits::{
    EventHandler, GameRecordedEvent, HandleOutcome, WatchedEvent,
};
use worboo_ew_evm::{
    GameRecordedFilter, GameRecordedHandler, GameRecordedWatcher,
    RegistryContractWrapper, TokenMintAction,
};
use worboo_relayer_context::RelayerContext;
use worboo_relayer_utils::Error;

/// Events buffered between the watcher and the reward handler.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
/// How long in-flight events may take to finish once shutdown starts.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);
/// How often the health snapshot is written to disk.
pub const HEALTH_PERSIST_INTERVAL: Duration = Duration::from_secs(10);

/// Handles of the background tasks of the relayer.
#[derive(Debug)]
pub struct RewardServices {
    /// Polls the registry for `GameRecorded` events.
    pub watcher: JoinHandle<()>,
    /// Hands every event to the reward handler.
    pub handler: JoinHandle<()>,
    /// Writes the health snapshot to disk.
    pub health: JoinHandle<()>,
}

impl RewardServices {
    /// Waits for every task to stop, after shutdown was signalled.
    ///
    /// The reward handler gets its grace period for in-flight events, the
    /// other tasks are expected to stop right away.
    pub async fn join(self) {
        for (name, task) in [
            ("watcher", self.watcher),
            ("handler", self.handler),
            ("health", self.health),
        ] {
            if let Err(e) = task.await {
                tracing::error!(task = name, error = %e, "Task stopped abnormally");
            }
        }
    }
}

/// Fires up the registry watcher and the reward handler.
///
/// Returns once both are spawned.
///
/// # Arguments
///
/// * `ctx` - RelayContext reference that holds the configuration
pub async fn ignite(ctx: &RelayerContext) -> crate::Result<RewardServices> {
    let registry = ctx.config.registry_address.ok_or(Error::MissingConfig {
        field: "registry_address",
    })?;
    let token = ctx.config.token_address.ok_or(Error::MissingConfig {
        field: "token_address",
    })?;
    let client = Arc::new(ctx.evm_provider()?);
    let signer = ctx.signer_client().await?;

    let handler = GameRecordedHandler::builder()
        .reward(ctx.config.reward_per_win.base_units())
        .store(ctx.store())
        .mint_action(Arc::new(TokenMintAction::new(token, signer)))
        .retry_policy(ctx.config.retry_policy())
        .observer(ctx.health.clone())
        .build();

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let watcher = start_registry_watcher(ctx, registry, client, tx);
    let handler = start_reward_handler(
        ctx,
        Arc::new(handler),
        rx,
        ctx.config.max_concurrent_events,
        SHUTDOWN_GRACE_PERIOD,
    );
    let health = start_health_persister(ctx, HEALTH_PERSIST_INTERVAL);
    Ok(RewardServices {
        watcher,
        handler,
        health,
    })
}

/// Starts the `GameRecorded` event watcher of the registry at `address`.
fn start_registry_watcher(
    ctx: &RelayerContext,
    address: Address,
    client: Arc<EthersClient>,
    sink: mpsc::Sender<WatchedEvent<GameRecordedFilter>>,
) -> JoinHandle<()> {
    let wrapper =
        RegistryContractWrapper::new(address, &ctx.config, client.clone());
    let my_ctx = ctx.clone();
    tokio::spawn(async move {
        tracing::debug!(%address, "Registry events watcher started");
        let result = GameRecordedWatcher
            .run(client, wrapper, sink, &my_ctx)
            .await;
        match result {
            Ok(()) => tracing::debug!(%address, "Registry events watcher stopped"),
            Err(e) => tracing::error!(
                %address,
                error = %e,
                "Registry events watcher failed",
            ),
        }
    })
}

/// Hands every received event to `handler`, at most `max_concurrent` at a
/// time.
///
/// Stops taking new events on shutdown or once the watcher is gone, then
/// waits up to `grace` for the events already being handled.
pub fn start_reward_handler<H>(
    ctx: &RelayerContext,
    handler: Arc<H>,
    mut events: mpsc::Receiver<WatchedEvent<GameRecordedFilter>>,
    max_concurrent: usize,
    grace: Duration,
) -> JoinHandle<()>
where
    H: EventHandler<Event = GameRecordedEvent> + 'static,
{
    let permits = max_concurrent.max(1);
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut shutdown = ctx.shutdown_signal();
    tokio::spawn(async move {
        loop {
            let watched = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                watched = events.recv() => match watched {
                    Some(watched) => watched,
                    None => break,
                },
            };
            let permit = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let handler = handler.clone();
            tokio::spawn(async move {
                let key = watched.identity.dedup_key();
                let outcome = handler
                    .handle_event(watched.event.into(), watched.identity)
                    .await;
                match outcome {
                    HandleOutcome::Failed { .. }
                    | HandleOutcome::CommitFailed { .. } => {
                        tracing::warn!(%key, ?outcome, "Event not settled");
                    }
                    _ => tracing::debug!(%key, ?outcome, "Event handled"),
                }
                drop(permit);
            });
        }
        let in_flight = permits - semaphore.available_permits();
        if in_flight > 0 {
            tracing::info!(
                in_flight,
                grace_ms = grace.as_millis() as u64,
                "Waiting for in-flight events",
            );
        }
        let drained = tokio::time::timeout(
            grace,
            semaphore.acquire_many(permits as u32),
        )
        .await;
        if drained.is_err() {
            tracing::warn!("Grace period elapsed with events still in flight");
        }
    })
}

/// Writes the health snapshot every `every`, until shutdown.
fn start_health_persister(
    ctx: &RelayerContext,
    every: Duration,
) -> JoinHandle<()> {
    let my_ctx = ctx.clone();
    let mut shutdown = ctx.shutdown_signal();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = interval.tick() => {
                    if let Err(e) = my_ctx.persist_health().await {
                        tracing::warn!(error = %e, "Failed to persist health snapshot");
                    }
                }
            }
        }
    })
}
