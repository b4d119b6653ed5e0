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

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use ethers::signers::Signer;
use ethers::types::Address;
use serde::Serialize;
use worboo_relayer_context::RelayerContext;
use worboo_relayer_utils::HandlerError;

/// Everything about the running relayer that is safe to show.
///
/// The private key is never part of it and the RPC url has its password
/// masked.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayerInformationResponse {
    /// The RPC endpoint, with any password masked.
    pub rpc_url: Option<String>,
    /// Address of the `WorbooRegistry` contract.
    pub registry: Option<Address>,
    /// Address of the `WorbooToken` contract.
    pub token: Option<Address>,
    /// Address of the operator wallet that signs the mints.
    pub operator: Address,
    /// Reward per victory, in whole tokens.
    pub reward: String,
    /// Reward per victory, in base units.
    pub reward_base_units: String,
    /// Mint attempts before an event is given up.
    pub max_retries: u32,
    /// Base delay between mint attempts, in milliseconds.
    pub backoff_ms: u64,
    /// Where processed events are persisted.
    pub cache_path: PathBuf,
    /// Cap on persisted processed events, if any.
    pub cache_max_entries: Option<usize>,
    /// Where the health snapshot is written.
    pub health_path: PathBuf,
    /// Port of the HTTP health server.
    pub health_port: u16,
    /// Origin allowed by CORS, if any.
    pub cors_origin: Option<String>,
    /// Delay between polls of the registry, in milliseconds.
    pub polling_interval_ms: u64,
    /// Largest block range queried per poll.
    pub max_blocks_per_step: u64,
    /// First block to watch, if configured.
    pub start_block: Option<u64>,
    /// Events handled at the same time.
    pub max_concurrent_events: usize,
}

impl RelayerInformationResponse {
    /// Collects the information from the relayer context.
    pub fn from_context(
        ctx: &RelayerContext,
    ) -> worboo_relayer_utils::Result<Self> {
        let config = &ctx.config;
        let operator = ctx.operator_wallet()?.address();
        Ok(Self {
            rpc_url: config.rpc_url.as_ref().map(ToString::to_string),
            registry: config.registry_address,
            token: config.token_address,
            operator,
            reward: config.reward_per_win.to_tokens(),
            reward_base_units: config.reward_per_win.to_string(),
            max_retries: config.max_retries,
            backoff_ms: config.backoff_ms,
            cache_path: config.cache_path.clone(),
            cache_max_entries: config.cache_max_entries(),
            health_path: config.health_path.clone(),
            health_port: config.health_port,
            cors_origin: config.cors_origin().map(ToOwned::to_owned),
            polling_interval_ms: config.polling_interval_ms,
            max_blocks_per_step: config.max_blocks_per_step,
            start_block: config.start_block,
            max_concurrent_events: config.max_concurrent_events,
        })
    }
}

/// Handles the `/info` request.
pub async fn handle_relayer_info(
    State(ctx): State<Arc<RelayerContext>>,
) -> Result<Json<RelayerInformationResponse>, HandlerError> {
    let info = RelayerInformationResponse::from_context(&ctx)?;
    Ok(Json(info))
}
