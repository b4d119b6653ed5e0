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

#![allow(missing_docs, clippy::all)]

ethers::contract::abigen!(
    WorbooRegistry,
    r#"[
        event GameRecorded(address indexed player, uint256 indexed dayId, bytes32 wordHash, uint8 guesses, bool victory, uint256 streak, uint256 totalGames, uint256 totalWins)
    ]"#,
);

ethers::contract::abigen!(
    WorbooToken,
    r#"[
        function mint(address to, uint256 amount) external
    ]"#,
);
