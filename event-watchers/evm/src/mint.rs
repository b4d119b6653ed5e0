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

use ethers::types::{Address, TxHash, U256, U64};
use worboo_event_watcher_traits::MintAction;
use worboo_relayer_utils::{Error, SignerClient};

use crate::WorbooToken;

/// Mints reward tokens by calling `WorbooToken.mint` with the operator
/// wallet, then waits for the receipt.
#[derive(Debug, Clone)]
pub struct TokenMintAction {
    token: WorbooToken<SignerClient>,
}

impl TokenMintAction {
    /// Creates a new TokenMintAction for the token at `address`.
    pub fn new(address: Address, client: Arc<SignerClient>) -> Self {
        Self {
            token: WorbooToken::new(address, client),
        }
    }
}

#[async_trait::async_trait]
impl MintAction for TokenMintAction {
    #[tracing::instrument(skip(self), fields(token = %self.token.address()))]
    async fn mint(
        &self,
        to: Address,
        amount: U256,
    ) -> worboo_relayer_utils::Result<TxHash> {
        let call = self.token.mint(to, amount);
        let pending = call.send().await?;
        let tx_hash = *pending;
        tracing::debug!(tx_hash = %format!("{tx_hash:#x}"), "Mint submitted");
        let receipt = pending.await?.ok_or_else(|| {
            Error::Mint(format!("no receipt for transaction {tx_hash:#x}"))
        })?;
        if receipt.status == Some(U64::zero()) {
            return Err(Error::Mint(format!(
                "transaction {tx_hash:#x} reverted"
            )));
        }
        Ok(receipt.transaction_hash)
    }
}
