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

use std::str::FromStr;

use ethereum_types::Secret;
use serde::Deserialize;

/// PrivateKey represents the operator key used to sign mint transactions.
///
/// Never printed, [`Debug`] only shows the type name.
#[derive(Clone)]
pub struct PrivateKey(Secret);

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PrivateKey").finish()
    }
}

impl From<Secret> for PrivateKey {
    fn from(secret: Secret) -> Self {
        PrivateKey(secret)
    }
}

impl std::ops::Deref for PrivateKey {
    type Target = Secret;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct PrivateKeyVistor;
        impl<'de> serde::de::Visitor<'de> for PrivateKeyVistor {
            type Value = Secret;

            fn expecting(
                &self,
                formatter: &mut std::fmt::Formatter,
            ) -> std::fmt::Result {
                formatter.write_str(
                    "hex string or an env var containing a hex string in it",
                )
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let resolved = crate::env::resolve::<E>(value)?;
                let hex = resolved.trim();
                if !hex.starts_with("0x") {
                    return Err(E::custom(
                        "expected a 0x prefixed hex private key",
                    ));
                }
                Secret::from_str(hex).map_err(|e| {
                    E::custom(format!(
                        "{e}\n expected a 66 chars string (including the 0x prefix) but found {} chars",
                        hex.len()
                    ))
                })
            }
        }

        let secret = deserializer.deserialize_str(PrivateKeyVistor)?;
        Ok(Self(secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str =
        "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn parses_hex_literal() {
        let key: PrivateKey =
            serde_json::from_value(serde_json::json!(KEY)).unwrap();
        assert_eq!(format!("{:#x}", *key), KEY);
        assert_eq!(format!("{key:?}"), "PrivateKey");
    }

    #[test]
    fn reads_key_from_env() {
        std::env::set_var("WORBOO_TEST_OPERATOR_KEY", KEY);
        let key: PrivateKey = serde_json::from_value(serde_json::json!(
            "$WORBOO_TEST_OPERATOR_KEY"
        ))
        .unwrap();
        assert_eq!(format!("{:#x}", *key), KEY);
    }

    #[test]
    fn rejects_short_keys() {
        let result: Result<PrivateKey, _> =
            serde_json::from_value(serde_json::json!("0xbeef"));
        assert!(result.is_err());
    }
}
