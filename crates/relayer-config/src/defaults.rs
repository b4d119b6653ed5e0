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

use ethers::types::U256;
use worboo_relayer_types::TokenAmount;

/// 10 tokens, with 18 decimals.
pub fn reward_per_win() -> TokenAmount {
    TokenAmount::from(U256::exp10(19))
}
/// The max retries of a mint is set to `3` by default.
pub const fn max_retries() -> u32 {
    3
}
/// The backoff between mint attempts is set to `1_000` ms by default.
pub const fn backoff_ms() -> u64 {
    1_000
}
/// `.cache/processed-events.jsonl` relative to the working directory.
pub fn cache_path() -> PathBuf {
    PathBuf::from(".cache").join("processed-events.jsonl")
}
/// `.cache/relayer-health.json` relative to the working directory.
pub fn health_path() -> PathBuf {
    PathBuf::from(".cache").join("relayer-health.json")
}
/// Listen on every interface by default.
pub fn health_host() -> String {
    String::from("0.0.0.0")
}
/// The default port the health server will listen on. Defaults to 8787.
pub const fn health_port() -> u16 {
    8787
}
/// Any origin is allowed by default.
pub fn health_cors_origin() -> String {
    String::from("*")
}
/// 5 MiB.
pub const fn log_max_bytes() -> u64 {
    5 * 1024 * 1024
}
/// Five rotated log files are kept by default.
pub const fn log_backup_count() -> usize {
    5
}
/// The registry is polled every `4_000` ms by default.
pub const fn polling_interval_ms() -> u64 {
    4_000
}
/// The maximum blocks per step is set to `500` by default.
pub const fn max_blocks_per_step() -> u64 {
    500
}
/// Up to `16` events are handled at the same time by default.
pub const fn max_concurrent_events() -> usize {
    16
}
