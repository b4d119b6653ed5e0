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

use super::*;

/// A watchable contract is a contract used in the [EventWatcher]
pub trait WatchableContract: Send + Sync {
    /// First block to scan, `None` starts at the latest block.
    fn start_block(&self) -> Option<u64>;

    /// How often this contract should be polled for events.
    fn polling_interval(&self) -> Duration;

    /// How many blocks to query at one request.
    fn max_blocks_per_step(&self) -> u64;
}

/// The next inclusive block range to query, starting at `next_block` and
/// spanning at most `step` blocks. `None` when there is nothing new yet.
pub fn next_window(
    next_block: u64,
    latest: u64,
    step: u64,
) -> Option<(u64, u64)> {
    if next_block > latest {
        return None;
    }
    let step = step.max(1);
    let to = next_block.saturating_add(step - 1).min(latest);
    Some((next_block, to))
}

type TaskError = backoff::Error<worboo_relayer_utils::Error>;

fn transient<E>(e: E) -> TaskError
where
    E: Into<worboo_relayer_utils::Error>,
{
    backoff::Error::transient(e.into())
}

/// A trait for watching events from a watchable contract.
#[async_trait::async_trait]
pub trait EventWatcher: Send + Sync {
    /// A Helper tag used to identify the event watcher during the logs.
    const TAG: &'static str;
    /// The contract that this event watcher is watching.
    type Contract: Deref<Target = contract::Contract<EthersClient>>
        + WatchableContract;
    /// The event that this event watcher is interested in.
    type Events: contract::EthEvent + Clone + Send + Sync + 'static;

    /// Polls the contract until shutdown, sending every found event into
    /// `sink`.
    ///
    /// Errors while talking to the node restart the polling after a second,
    /// without losing the position. The position is only kept in memory, a
    /// restarted relayer relies on deduplication for redelivered events.
    #[tracing::instrument(
        skip_all,
        fields(
            address = %contract.address(),
            tag = %Self::TAG,
        ),
    )]
    async fn run(
        &self,
        client: Arc<EthersClient>,
        contract: Self::Contract,
        sink: mpsc::Sender<WatchedEvent<Self::Events>>,
        ctx: &RelayerContext,
    ) -> worboo_relayer_utils::Result<()> {
        let backoff = backoff::backoff::Constant::new(Duration::from_secs(1));
        let step = contract.max_blocks_per_step();
        // next block to scan, survives restarts of the task below.
        let cursor = parking_lot::Mutex::new(contract.start_block());
        let task = || async {
            loop {
                let latest = client
                    .get_block_number()
                    .map_err(transient)
                    .await?
                    .as_u64();
                let next_block = cursor.lock().unwrap_or(latest);
                if let Some((from, to)) = next_window(next_block, latest, step)
                {
                    let found_events = contract
                        .event::<Self::Events>()
                        .from_block(from)
                        .to_block(to)
                        .query_with_meta()
                        .map_err(transient)
                        .await?;
                    tracing::trace!("Found #{} events", found_events.len());
                    for (event, meta) in found_events {
                        let watched = WatchedEvent {
                            event,
                            identity: EventIdentity::from(&meta),
                            block_number: meta.block_number.as_u64(),
                        };
                        if sink.send(watched).await.is_err() {
                            tracing::debug!("Event channel closed, stopping");
                            return Ok::<(), TaskError>(());
                        }
                    }
                    *cursor.lock() = Some(to + 1);
                    tracing::event!(
                        target: worboo_relayer_utils::probe::TARGET,
                        tracing::Level::TRACE,
                        kind = %worboo_relayer_utils::probe::Kind::Sync,
                        from_block = from,
                        to_block = to,
                        latest_block = latest,
                    );
                    // still behind, keep going without waiting.
                    if to < latest {
                        continue;
                    }
                }
                let duration = contract.polling_interval();
                tracing::trace!("Cooldown a bit for {}ms", duration.as_millis());
                tokio::time::sleep(duration).await;
            }
        };
        let notify = |e: worboo_relayer_utils::Error, after: Duration| {
            ctx.metrics().watcher_back_off.inc();
            tracing::warn!(
                error = %e,
                retry_in_ms = after.as_millis() as u64,
                "Event watcher failed, restarting",
            );
        };

        let mut shutdown = ctx.shutdown_signal();
        tokio::select! {
            result = backoff::future::retry_notify(backoff, task, notify) => {
                result?;
            }
            _ = shutdown.recv() => {
                tracing::debug!("Event watcher stopped");
            }
        }
        Ok(())
    }
}
