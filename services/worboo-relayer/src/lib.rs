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

#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Worboo Relayer Crate 🕸️
//!
//! A crate that rewards Worboo players for their victories.
//!
//! ## Overview
//!
//! Every finished game is recorded on chain by the `WorbooRegistry` contract,
//! which emits a `GameRecorded` event. The relayer watches these events and,
//! for every victory, mints a fixed amount of `WorbooToken` to the player
//! using the operator wallet.
//!
//! The relayer is composed of three parts:
//!
//!   1. The registry watcher, polling the chain for `GameRecorded` events.
//!   2. The reward handler, minting with retries and remembering which events
//!      were already rewarded in an append-only log, so a redelivered event is
//!      never paid twice.
//!   3. The health server, exposing `/health`, `/metrics` and `/info`.
//!
//! A health snapshot is also written to disk periodically and at shutdown,
//! for tools that can only read files.

/// A module for starting long-running tasks for event watching.
pub mod service;

pub use worboo_relayer_utils::{Error, Result};
