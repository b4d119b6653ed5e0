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

use ethers::contract::LogMeta;
use ethers::types::{H256, U256, U64};

use crate::evm::next_window;
use crate::{EventIdentity, SkipReason};

#[test]
fn dedup_key_is_lower_case_hash_and_log_index() {
    let identity = EventIdentity {
        transaction_hash: H256::repeat_byte(0xab),
        log_index: 7,
    };
    assert_eq!(
        identity.dedup_key(),
        format!("0x{}:7", "ab".repeat(32))
    );
}

#[test]
fn identity_is_taken_from_the_log_meta() {
    let meta = LogMeta {
        address: Default::default(),
        block_number: U64::from(42),
        block_hash: H256::zero(),
        transaction_hash: H256::repeat_byte(0x01),
        transaction_index: U64::from(3),
        log_index: U256::from(12),
    };
    let identity = EventIdentity::from(&meta);
    assert_eq!(identity.transaction_hash, H256::repeat_byte(0x01));
    assert_eq!(identity.log_index, 12);
    assert!(identity.dedup_key().ends_with(":12"));
}

#[test]
fn windows_are_bounded_by_step_and_latest_block() {
    assert_eq!(next_window(100, 1_000, 500), Some((100, 599)));
    assert_eq!(next_window(600, 1_000, 500), Some((600, 1_000)));
    assert_eq!(next_window(1_000, 1_000, 500), Some((1_000, 1_000)));
    assert_eq!(next_window(1_001, 1_000, 500), None);
    // a zero step still makes progress.
    assert_eq!(next_window(5, 10, 0), Some((5, 5)));
}

#[test]
fn skip_reasons_read_well_in_logs() {
    assert_eq!(SkipReason::AlreadyProcessed.to_string(), "already processed");
    assert_eq!(SkipReason::NotAVictory.to_string(), "not a victory");
}
