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

use axum::extract::State;
use axum::Json;
use worboo_relayer_context::RelayerContext;
use worboo_relayer_utils::health::HealthSnapshot;

/// Handles the `/health` request, a live snapshot of the reward counters and
/// the processed events store.
pub async fn handle_health(
    State(ctx): State<Arc<RelayerContext>>,
) -> Json<HealthSnapshot> {
    Json(ctx.health_snapshot())
}
