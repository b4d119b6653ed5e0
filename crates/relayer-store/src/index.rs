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

use std::collections::{HashMap, VecDeque};

use crate::ProcessedEventRecord;

/// Processed keys in insertion order, with their records.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProcessedIndex {
    order: VecDeque<String>,
    records: HashMap<String, ProcessedEventRecord>,
}

impl ProcessedIndex {
    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns false if the key was already there, the record is dropped then.
    pub fn insert(&mut self, record: ProcessedEventRecord) -> bool {
        if self.records.contains_key(&record.key) {
            return false;
        }
        self.order.push_back(record.key.clone());
        self.records.insert(record.key.clone(), record);
        true
    }

    /// Drops the oldest entries until at most `max` are left.
    pub fn trim_to(&mut self, max: usize) -> usize {
        let mut evicted = 0;
        while self.order.len() > max {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.records.remove(&oldest);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }

    pub fn records(&self) -> impl Iterator<Item = &ProcessedEventRecord> {
        self.order.iter().filter_map(|key| self.records.get(key))
    }
}
