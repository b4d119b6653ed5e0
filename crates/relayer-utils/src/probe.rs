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

use derive_more::Display;
/// Target for logger
pub const TARGET: &str = "worboo_probe";

/// The Kind of the Probe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// When the Lifecycle of the Relayer changes, like starting or shutting down.
    #[display(fmt = "lifecycle")]
    Lifecycle,
    /// Relayer Sync state of the registry watcher.
    #[display(fmt = "sync")]
    Sync,
    /// A reward mint was attempted, confirmed or given up on.
    #[display(fmt = "mint")]
    Mint,
    /// Processed events store state.
    #[display(fmt = "store")]
    Store,
    /// When the relayer will retry to do something.
    #[display(fmt = "retry")]
    Retry,
    /// Health server and health snapshot updates.
    #[display(fmt = "health")]
    Health,
}
