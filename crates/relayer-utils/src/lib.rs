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

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ethers::middleware::NonceManagerMiddleware;
use ethers::prelude::{Http, LocalWallet, Provider, SignerMiddleware};

/// Health and liveness reporting.
pub mod health;
/// Metrics functionality
pub mod metric;
/// A module used for debugging relayer lifecycle, mint state, or other
/// relayer state.
pub mod probe;
/// Retry functionality
pub mod retry;

/// The ethers client used to sign and send transactions, nonces are
/// assigned locally.
pub type SignerClient =
    NonceManagerMiddleware<SignerMiddleware<Provider<Http>, LocalWallet>>;

/// An enum of all possible errors that could be encountered during the
/// execution of the Worboo Relayer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while iterating over a glob pattern.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Error from Glob Iterator.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// HTTP Error
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    /// Error in Http Provider (ethers client).
    #[error(transparent)]
    EthersProvider(#[from] ethers::providers::ProviderError),
    /// Smart contract error.
    #[error(transparent)]
    EthersContractCall(
        #[from] ethers::contract::ContractError<Provider<Http>>,
    ),
    /// Smart contract error.
    #[error(transparent)]
    EthersContractCallWithSigner(
        #[from] ethers::contract::ContractError<SignerClient>,
    ),
    /// Ether wallet errors.
    #[error(transparent)]
    EtherWalletError(#[from] ethers::signers::WalletError),
    /// Prometheus registry error.
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
    /// Error while parsing the config files.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// A required configuration value is missing.
    #[error("Missing required configuration value: {}", field)]
    MissingConfig {
        /// The name of the missing field.
        field: &'static str,
    },
    /// Missing Secrets in the config, the private key.
    #[error("Missing required private-key in the config")]
    MissingSecrets,
    /// A line of the processed events log could not be parsed.
    #[error("Failed to parse processed event entry at line {line}: {reason}")]
    CorruptStore {
        /// 1-based line number in the log file.
        line: usize,
        /// Why the entry was rejected.
        reason: String,
    },
    /// The store writer task is gone, no more writes can be made.
    #[error("Processed event store writer is closed")]
    StoreWriterClosed,
    /// The mint action failed.
    #[error("Mint failed: {}", _0)]
    Mint(String),
    /// All attempts of a retried action failed.
    #[error("Gave up after {attempts} attempt(s): {last_error}")]
    RetryExhausted {
        /// How many times the action was attempted.
        attempts: usize,
        /// The error of the final attempt.
        last_error: Box<Error>,
    },
    /// a background task failed and stopped Abnormally.
    #[error("Task Stopped Apnormally")]
    TaskStoppedAbnormally,
}

/// A type alias for the result for worboo relayer, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Milliseconds elapsed since the unix epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl From<Error> for HandlerError {
    fn from(value: Error) -> Self {
        HandlerError(StatusCode::INTERNAL_SERVER_ERROR, value.to_string())
    }
}

/// Error type for HTTP handlers
pub struct HandlerError(
    /// HTTP status code for response
    pub StatusCode,
    /// Response message
    pub String,
);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}
