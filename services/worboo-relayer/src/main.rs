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

//! Worboo Relayer Binary.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use ethers::signers::Signer;
use tokio::signal::unix;
use worboo_relayer::service;
use worboo_relayer_config::cli::{create_store, load_config, setup_logger, Opts};
use worboo_relayer_context::RelayerContext;
use worboo_relayer_store::ProcessedEventStore;

/// The main entry point for the relayer.
///
/// # Arguments
///
/// * `args` - The command line arguments.
#[paw::main]
#[tokio::main]
async fn main(args: Opts) -> anyhow::Result<()> {
    // the environment may carry the configuration, load it first.
    let dotenv = dotenv::dotenv();

    // The configuration is validated and configured from the given directory
    let config = load_config(args.config_dir.clone())?;
    setup_logger(args.verbose, Some(&config))?;
    match dotenv {
        Ok(_) => {
            tracing::trace!("Loaded .env file");
        }
        Err(e) => {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }

    // persistent storage for the relayer
    let store = create_store(&args, &config).await?;

    // The RelayerContext takes a configuration, and populates objects that are needed
    // throughout the lifetime of the relayer.
    let ctx = RelayerContext::new(config, store.clone())?;
    let operator = ctx.operator_wallet()?.address();
    let config = &ctx.config;
    tracing::info!(
        registry = ?config.registry_address,
        token = ?config.token_address,
        reward = %config.reward_per_win.to_tokens(),
        operator = ?operator,
        retries = config.max_retries,
        backoff_ms = config.backoff_ms,
        cache = ?store.path(),
        health_path = %config.health_path.display(),
        health_port = config.health_port,
        health_cors_origin = config.cors_origin().unwrap_or("disabled"),
        "Starting Worboo reward relayer",
    );

    // the health server, bound before anything touches the chain.
    let (addr, server) = service::build_web_services(ctx.clone())?;
    tracing::info!("Starting the health server on {}", addr);
    let server_handle = tokio::spawn(server);

    // start all background services.
    // this does not block, will fire the services on background tasks.
    let services = service::ignite(&ctx).await?;
    tracing::event!(
        target: worboo_relayer_utils::probe::TARGET,
        tracing::Level::DEBUG,
        kind = %worboo_relayer_utils::probe::Kind::Lifecycle,
        started = true
    );

    // watch for signals
    let mut ctrlc_signal = unix::signal(unix::SignalKind::interrupt())?;
    let mut termination_signal = unix::signal(unix::SignalKind::terminate())?;
    let mut quit_signal = unix::signal(unix::SignalKind::quit())?;
    tokio::select! {
        _ = ctrlc_signal.recv() => {
            tracing::warn!("Interrupted (Ctrl+C) ...");
        },
        _ = termination_signal.recv() => {
            tracing::warn!("Got Terminate signal ...");
        },
        _ = quit_signal.recv() => {
            tracing::warn!("Quitting ...");
        },
    }

    tracing::event!(
        target: worboo_relayer_utils::probe::TARGET,
        tracing::Level::DEBUG,
        kind = %worboo_relayer_utils::probe::Kind::Lifecycle,
        shutdown = true
    );
    tracing::warn!("Shutting down...");
    // send shutdown signal to all of the application.
    ctx.shutdown();
    services.join().await;
    if let Err(e) = store.close().await {
        tracing::error!(error = %e, "Failed to flush the processed events log");
    }
    if let Err(e) = ctx.persist_health().await {
        tracing::error!(error = %e, "Failed to persist health snapshot");
    }
    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Health server failed"),
        Err(e) => tracing::error!(error = %e, "Health server task failed"),
    }
    tracing::info!("Clean Exit ..");
    Ok(())
}
