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

//! # Relayer Service Module 🕸️
//!
//! A module for starting long-running tasks for event watching.
//!
//! ## Overview
//!
//! Services are tasks which the relayer constantly runs throughout its lifetime.
//! Services handle keeping up to date with the registry contract and serving
//! the health endpoints.

use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use worboo_relayer_context::RelayerContext;
use worboo_relayer_handlers::routes::{
    handle_health, handle_metric_info, handle_relayer_info,
};
use worboo_relayer_utils::Error;

/// EVM Specific Services
pub mod evm;

pub use evm::RewardServices;

#[cfg(test)]
mod tests;

/// CORS layer of the health server, `None` when CORS is disabled.
pub fn cors_layer(origin: Option<&str>) -> crate::Result<Option<CorsLayer>> {
    let Some(origin) = origin else {
        return Ok(None);
    };
    let allow_origin = if origin == "*" {
        AllowOrigin::any()
    } else {
        let value = HeaderValue::from_str(origin)
            .map_err(|_| Error::Generic("invalid health_cors_origin"))?;
        AllowOrigin::exact(value)
    };
    let layer = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS]);
    Ok(Some(layer))
}

/// Sets up the health server of the relayer.
///
/// The listener is bound right away, so a taken port is reported before
/// anything else starts. Returns the bound address and the server future,
/// which resolves once the relayer shuts down.
///
/// # Arguments
///
/// * `ctx` - RelayContext reference that holds the configuration
pub fn build_web_services(
    ctx: RelayerContext,
) -> crate::Result<(SocketAddr, impl Future<Output = crate::Result<()>>)> {
    let mut app = Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metric_info))
        .route("/info", get(handle_relayer_info));
    if let Some(cors) = cors_layer(ctx.config.cors_origin())? {
        app = app.layer(cors);
    }
    let mut shutdown_signal = ctx.shutdown_signal();
    let app = app
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(ctx.clone()))
        .into_make_service();

    let listener = TcpListener::bind(ctx.config.health_addr())?;
    let server = axum::Server::from_tcp(listener)?.serve(app);
    let addr = server.local_addr();
    let server = server.with_graceful_shutdown(async move {
        shutdown_signal.recv().await;
    });
    Ok((addr, async move { server.await.map_err(Into::into) }))
}

/// Starts all background services.
///
/// Returns once every service is spawned, the handles of the spawned tasks
/// are returned so shutdown can wait for them.
///
/// # Arguments
///
/// * `ctx` - RelayContext reference that holds the configuration
pub async fn ignite(ctx: &RelayerContext) -> crate::Result<RewardServices> {
    tracing::trace!(
        registry = ?ctx.config.registry_address,
        token = ?ctx.config.token_address,
        "Starting background services",
    );
    evm::ignite(ctx).await
}
