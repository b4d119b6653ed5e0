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
//! # Relayer Context Module 🕸️
//!
//! A module for managing the context of the relayer.
use std::convert::TryFrom;
use std::sync::Arc;

use ethers::middleware::NonceManagerMiddleware;
use ethers::prelude::*;
use tokio::sync::broadcast;

use worboo_relayer_config::WorbooRelayerConfig;
use worboo_relayer_store::ProcessedEventStore;
use worboo_relayer_utils::health::{HealthReporter, HealthSnapshot};
use worboo_relayer_utils::metric::Metrics;
use worboo_relayer_utils::SignerClient;

/// RelayerContext contains Relayer's configuration and shutdown signal.
#[derive(Clone)]
pub struct RelayerContext {
    /// The configuration of the relayer.
    pub config: WorbooRelayerConfig,
    /// Broadcasts a shutdown signal to all active tasks.
    ///
    /// When a task is spawned, it is passed a broadcast receiver handle.
    /// When a graceful shutdown is initiated, a `()` value is sent via the
    /// broadcast::Sender. Each task receives it, reaches a safe terminal
    /// state, and completes.
    notify_shutdown: broadcast::Sender<()>,
    /// Counters of the reward pipeline, also feeding the prometheus metrics.
    pub health: Arc<HealthReporter>,
    store: Arc<dyn ProcessedEventStore>,
}

impl RelayerContext {
    /// Creates a new RelayerContext.
    pub fn new(
        config: WorbooRelayerConfig,
        store: Arc<dyn ProcessedEventStore>,
    ) -> worboo_relayer_utils::Result<Self> {
        let (notify_shutdown, _) = broadcast::channel(2);
        let health = Arc::new(HealthReporter::new(Metrics::new()?));
        Ok(Self {
            config,
            notify_shutdown,
            health,
            store,
        })
    }
    /// Returns a broadcast receiver handle for the shutdown signal.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }
    /// Sends a shutdown signal to all subscribed tasks.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }
    /// Returns a new `EthereumProvider` for the configured chain.
    pub fn evm_provider(&self) -> worboo_relayer_utils::Result<Provider<Http>> {
        let rpc_url = self.config.rpc_url.as_ref().ok_or(
            worboo_relayer_utils::Error::MissingConfig { field: "rpc_url" },
        )?;
        let provider = Provider::<Http>::try_from(rpc_url.as_str())?
            .interval(self.config.polling_interval());
        Ok(provider)
    }
    /// The operator wallet, without a chain id.
    pub fn operator_wallet(&self) -> worboo_relayer_utils::Result<LocalWallet> {
        let private_key = self
            .config
            .private_key
            .as_ref()
            .ok_or(worboo_relayer_utils::Error::MissingSecrets)?;
        let wallet = LocalWallet::from_bytes(private_key.as_bytes())?;
        Ok(wallet)
    }
    /// Sets up and returns the operator wallet, bound to the chain id
    /// reported by the provider.
    pub async fn evm_wallet(
        &self,
    ) -> worboo_relayer_utils::Result<LocalWallet> {
        let chain_id = self.evm_provider()?.get_chainid().await?;
        let wallet = self.operator_wallet()?.with_chain_id(chain_id.as_u64());
        Ok(wallet)
    }
    /// A client that signs transactions with the operator wallet.
    pub async fn signer_client(
        &self,
    ) -> worboo_relayer_utils::Result<Arc<SignerClient>> {
        let provider = self.evm_provider()?;
        let wallet = self.evm_wallet().await?;
        Ok(Arc::new(nonce_managed_client(provider, wallet)))
    }

    /// Returns the processed events store.
    pub fn store(&self) -> Arc<dyn ProcessedEventStore> {
        self.store.clone()
    }

    /// Returns the prometheus metrics of the relayer.
    pub fn metrics(&self) -> &Metrics {
        self.health.metrics()
    }

    /// Current health of the relayer.
    pub fn health_snapshot(&self) -> HealthSnapshot {
        self.health.snapshot(self.store.info())
    }

    /// Writes the current health snapshot to the configured `health_path`.
    pub async fn persist_health(&self) -> worboo_relayer_utils::Result<()> {
        self.health
            .persist(&self.config.health_path, self.store.info())
            .await
    }
}

/// Signs with `wallet` and hands out nonces from a local counter, concurrent
/// mints never share a nonce. The counter is synced from the chain on first
/// use and after a failed send.
pub fn nonce_managed_client(
    provider: Provider<Http>,
    wallet: LocalWallet,
) -> SignerClient {
    let address = wallet.address();
    let signer = SignerMiddleware::new(provider, wallet);
    NonceManagerMiddleware::new(signer, address)
}

/// Listens for the server shutdown signal.
///
/// Shutdown is signalled using a `broadcast::Receiver`. Only a single value is
/// ever sent. Once a value has been sent via the broadcast channel, the server
/// should shutdown.
///
/// The `Shutdown` struct listens for the signal and tracks that the signal has
/// been received. Callers may query for whether the shutdown signal has been
/// received or not.
#[derive(Debug)]
pub struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,

    /// The receive half of the channel used to listen for shutdown.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Returns `true` if the shutdown signal has been received.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub async fn recv(&mut self) {
        // If the shutdown signal has already been received, then return
        // immediately.
        if self.shutdown {
            return;
        }

        // Cannot receive a "lag error" as only one value is ever sent.
        let _ = self.notify.recv().await;

        // Remember that the signal has been received.
        self.shutdown = true;
    }
}
