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

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::index::ProcessedIndex;
use crate::{
    normalize_max_entries, ProcessedEventMetadata, ProcessedEventStore,
};

/// InMemoryStore is a store that keeps processed events in memory only.
///
/// Everything is lost on restart, so it is only used by tests and the
/// `--tmp` mode.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    index: Arc<RwLock<ProcessedIndex>>,
    max_entries: Option<usize>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish()
    }
}

impl InMemoryStore {
    /// An in memory store with an optional retention bound.
    pub fn with_max_entries(max_entries: Option<usize>) -> Self {
        Self {
            index: Default::default(),
            max_entries: normalize_max_entries(max_entries),
        }
    }
}

#[async_trait::async_trait]
impl ProcessedEventStore for InMemoryStore {
    fn has_processed(&self, key: &str) -> bool {
        self.index.read().contains(key)
    }

    #[tracing::instrument(skip(self, meta))]
    async fn mark_processed(
        &self,
        key: &str,
        meta: ProcessedEventMetadata,
    ) -> worboo_relayer_utils::Result<()> {
        let mut guard = self.index.write();
        if guard.insert(meta.into_record(key)) {
            if let Some(max) = self.max_entries {
                guard.trim_to(max);
            }
        }
        Ok(())
    }

    fn size(&self) -> usize {
        self.index.read().len()
    }

    fn path(&self) -> Option<&Path> {
        None
    }

    fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }

    async fn close(&self) -> worboo_relayer_utils::Result<()> {
        Ok(())
    }
}
