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

use ethers::types::U256;
use ethers::utils::{format_units, parse_units, ConversionError};
use serde::{Deserialize, Serialize};

/// Decimals of the reward token.
pub const TOKEN_DECIMALS: u32 = 18;

/// An amount of reward tokens, stored in base units.
///
/// Deserialized from a whole-token decimal like `"42.5"` (or a plain number),
/// serialized back as the base unit integer string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAmount(U256);

impl TokenAmount {
    /// Parses a whole-token decimal string.
    pub fn from_tokens(value: &str) -> Result<Self, ConversionError> {
        let units = parse_units(value.trim(), TOKEN_DECIMALS)?;
        Ok(Self(units.into()))
    }

    /// The amount in base units.
    pub fn base_units(&self) -> U256 {
        self.0
    }
}

impl From<U256> for TokenAmount {
    fn from(units: U256) -> Self {
        Self(units)
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TokenAmount {
    /// Human readable amount in whole tokens, for logs.
    pub fn to_tokens(&self) -> String {
        format_units(self.0, TOKEN_DECIMALS)
            .unwrap_or_else(|_| self.0.to_string())
    }
}

impl Serialize for TokenAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct TokenAmountVisitor;
        impl<'de> serde::de::Visitor<'de> for TokenAmountVisitor {
            type Value = TokenAmount;

            fn expecting(
                &self,
                formatter: &mut std::fmt::Formatter,
            ) -> std::fmt::Result {
                formatter.write_str("a token amount like \"10\" or \"42.5\"")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let resolved = crate::env::resolve::<E>(value)?;
                TokenAmount::from_tokens(&resolved)
                    .map_err(|e| E::custom(format!("{value}: {e}")))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&value.to_string())
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if value < 0 {
                    return Err(E::custom("token amount cannot be negative"));
                }
                self.visit_str(&value.to_string())
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&value.to_string())
            }
        }

        deserializer.deserialize_any(TokenAmountVisitor)
    }
}
