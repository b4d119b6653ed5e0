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

//! # EVM Events Watcher Traits 🕸️

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use ethers::{
    contract,
    providers::{self, Middleware},
};
use futures::prelude::*;
use tokio::sync::mpsc;
use worboo_relayer_context::RelayerContext;

use crate::{EventIdentity, WatchedEvent};

/// Event watching traits
mod event_watcher;

pub use event_watcher::*;

/// The read only client the watchers poll with.
pub type EthersClient = providers::Provider<providers::Http>;
