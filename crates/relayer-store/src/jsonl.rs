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

use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use worboo_relayer_utils::{probe, Error, Result};

use crate::index::ProcessedIndex;
use crate::{
    normalize_max_entries, ProcessedEventMetadata, ProcessedEventRecord,
    ProcessedEventStore,
};

struct WriteRequest {
    record: ProcessedEventRecord,
    reply: oneshot::Sender<Result<()>>,
}

/// JsonlStore keeps processed events in an append-only, newline delimited
/// JSON file, one [`ProcessedEventRecord`] per line.
///
/// The whole log is loaded into memory on [`JsonlStore::open`]. When a
/// retention bound is set, the oldest records are dropped first and the file
/// is rewritten compactly.
pub struct JsonlStore {
    path: PathBuf,
    max_entries: Option<usize>,
    index: RwLock<ProcessedIndex>,
    writer: Mutex<Option<mpsc::UnboundedSender<WriteRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for JsonlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlStore")
            .field("path", &self.path)
            .field("max_entries", &self.max_entries)
            .field("size", &self.size())
            .finish()
    }
}

impl JsonlStore {
    /// Opens the log at `path`, creating it (and its directory) if needed.
    ///
    /// Fails with [`Error::CorruptStore`] if any non blank line is not a
    /// valid record. Must be called from within a tokio runtime, the writer
    /// task is spawned here.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open<P: AsRef<Path>>(
        path: P,
        max_entries: Option<usize>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let max_entries = normalize_max_entries(max_entries);
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(dir).await?;
        }

        let mut index = ProcessedIndex::default();
        // appends must start on a fresh line.
        let mut unterminated = false;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let duplicates = load_into(&mut index, &contents)?;
                if duplicates > 0 {
                    tracing::debug!(duplicates, "Ignored repeated records");
                }
                unterminated =
                    !contents.is_empty() && !contents.ends_with('\n');
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::write(&path, "").await?;
            }
            Err(e) => return Err(e.into()),
        }

        let mut evicted = 0;
        if let Some(max) = max_entries {
            if index.len() > max {
                evicted = index.trim_to(max);
            }
        }
        if evicted > 0 || unterminated {
            replace_file(&path, &render(index.records())?).await?;
        }
        if evicted > 0 {
            tracing::info!(
                evicted,
                max = ?max_entries,
                "Trimmed processed events log",
            );
        }

        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Store,
            path = %path.display(),
            loaded = index.len(),
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = Writer {
            path: path.clone(),
            max_entries,
            on_disk: index.clone(),
        };
        let worker = tokio::spawn(writer.run(rx));

        Ok(Self {
            path,
            max_entries,
            index: RwLock::new(index),
            writer: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }
}

#[async_trait::async_trait]
impl ProcessedEventStore for JsonlStore {
    fn has_processed(&self, key: &str) -> bool {
        self.index.read().contains(key)
    }

    #[tracing::instrument(skip(self, meta))]
    async fn mark_processed(
        &self,
        key: &str,
        meta: ProcessedEventMetadata,
    ) -> Result<()> {
        let record = meta.into_record(key);
        {
            let mut index = self.index.write();
            if !index.insert(record.clone()) {
                tracing::trace!("Already processed");
                return Ok(());
            }
            if let Some(max) = self.max_entries {
                index.trim_to(max);
            }
        }

        let (reply, done) = oneshot::channel();
        let sent = self
            .writer
            .lock()
            .as_ref()
            .map(|writer| writer.send(WriteRequest { record, reply }).is_ok())
            .unwrap_or(false);
        if !sent {
            return Err(Error::StoreWriterClosed);
        }
        done.await.map_err(|_| Error::StoreWriterClosed)?
    }

    fn size(&self) -> usize {
        self.index.read().len()
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }

    async fn close(&self) -> Result<()> {
        // dropping the sender lets the writer drain what is queued and exit.
        drop(self.writer.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.await.map_err(|_| Error::TaskStoppedAbnormally)?;
            tracing::debug!(path = %self.path.display(), "Store writer drained");
        }
        Ok(())
    }
}

/// The single consumer of write requests. Keeps its own view of what is on
/// disk, which may lag behind the in-memory index of the store.
struct Writer {
    path: PathBuf,
    max_entries: Option<usize>,
    on_disk: ProcessedIndex,
}

impl Writer {
    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<WriteRequest>,
    ) {
        while let Some(WriteRequest { record, reply }) = requests.recv().await
        {
            let result = self.write(&record).await;
            if let Err(e) = &result {
                tracing::warn!(
                    key = %record.key,
                    error = %e,
                    "Failed to persist processed event",
                );
            }
            // the caller may have gone away, the write happened regardless.
            let _ = reply.send(result);
        }
    }

    async fn write(&mut self, record: &ProcessedEventRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        self.on_disk.insert(record.clone());

        if let Some(max) = self.max_entries {
            if self.on_disk.len() > max {
                let evicted = self.on_disk.trim_to(max);
                replace_file(&self.path, &render(self.on_disk.records())?)
                    .await?;
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %probe::Kind::Store,
                    evicted,
                    compacted = true,
                );
            }
        }
        Ok(())
    }
}

/// Loads every record of `contents` into `index`, returns how many records
/// were ignored because their key was already seen.
fn load_into(index: &mut ProcessedIndex, contents: &str) -> Result<usize> {
    let mut duplicates = 0;
    for (i, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: ProcessedEventRecord = serde_json::from_str(line)
            .map_err(|e| Error::CorruptStore {
                line: i + 1,
                reason: e.to_string(),
            })?;
        if record.key.is_empty() {
            return Err(Error::CorruptStore {
                line: i + 1,
                reason: String::from("empty key"),
            });
        }
        if !index.insert(record) {
            duplicates += 1;
        }
    }
    Ok(duplicates)
}

fn render<'a>(
    records: impl Iterator<Item = &'a ProcessedEventRecord>,
) -> Result<String> {
    let mut contents = String::new();
    for record in records {
        contents.push_str(&serde_json::to_string(record)?);
        contents.push('\n');
    }
    Ok(contents)
}

/// Replaces the file at `path` with `contents` through a temporary file, so a
/// crash never leaves a half written log behind.
async fn replace_file(path: &Path, contents: &str) -> Result<()> {
    let tmp = match path.file_name() {
        Some(name) => {
            let mut name = name.to_os_string();
            name.push(".tmp");
            path.with_file_name(name)
        }
        None => path.with_extension("tmp"),
    };
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn read_log(path: &Path) -> Vec<ProcessedEventRecord> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn keys(records: &[ProcessedEventRecord]) -> Vec<&str> {
        records.iter().map(|r| r.key.as_str()).collect()
    }

    fn meta(tx_hash: &str) -> ProcessedEventMetadata {
        ProcessedEventMetadata {
            tx_hash: tx_hash.into(),
            minted_at: Some(1_700_000_000_000),
        }
    }

    #[tokio::test]
    async fn creates_missing_directories_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("processed-events.jsonl");
        let store = JsonlStore::open(&path, None).await.unwrap();
        assert!(path.exists());
        assert_eq!(store.size(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn marking_twice_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let store = JsonlStore::open(&path, None).await.unwrap();

        store.mark_processed("0xabc:1", meta("0x01")).await.unwrap();
        store.mark_processed("0xabc:1", meta("0x02")).await.unwrap();
        store.close().await.unwrap();

        let records = read_log(&path);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tx_hash, "0x01");
        assert_eq!(store.size(), 1);
    }

    #[tokio::test]
    async fn processed_events_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let store = JsonlStore::open(&path, None).await.unwrap();
        store
            .mark_processed("0xabc:1", ProcessedEventMetadata::new("0xmint"))
            .await
            .unwrap();
        store.close().await.unwrap();
        drop(store);

        let reopened = JsonlStore::open(&path, None).await.unwrap();
        assert!(reopened.has_processed("0xabc:1"));
        assert!(!reopened.has_processed("0xabc:2"));
        assert_eq!(reopened.size(), 1);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with('\n'));
        let value: serde_json::Value =
            serde_json::from_str(raw.trim()).unwrap();
        assert_eq!(value["key"], "0xabc:1");
        assert_eq!(value["txHash"], "0xmint");
        assert!(value["mintedAt"].is_u64());
    }

    #[tokio::test]
    async fn oldest_entries_are_evicted_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let store = JsonlStore::open(&path, Some(2)).await.unwrap();

        for key in ["a:0", "b:0", "c:0"] {
            store.mark_processed(key, meta("0x01")).await.unwrap();
        }

        assert!(!store.has_processed("a:0"));
        assert!(store.has_processed("b:0"));
        assert!(store.has_processed("c:0"));
        assert_eq!(store.size(), 2);
        store.close().await.unwrap();
        assert_eq!(keys(&read_log(&path)), ["b:0", "c:0"]);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn oversized_log_is_trimmed_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let lines = ["a:0", "b:0", "c:0", "d:0"]
            .iter()
            .map(|key| {
                format!(r#"{{"key":"{key}","txHash":"0x01","mintedAt":1}}"#)
            })
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&path, lines).unwrap();

        let store = JsonlStore::open(&path, Some(2)).await.unwrap();
        assert_eq!(store.size(), 2);
        assert!(!store.has_processed("b:0"));
        assert!(store.has_processed("d:0"));
        assert_eq!(keys(&read_log(&path)), ["c:0", "d:0"]);
        assert!(logs_contain("Trimmed processed events log"));
    }

    #[tokio::test]
    async fn blank_lines_and_repeated_keys_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"key":"a:0","txHash":"0x01","mintedAt":1}"#,
                "\n\n   \n",
                r#"{"key":"a:0","txHash":"0x02","mintedAt":2}"#,
                "\n",
                r#"{"key":"b:0","txHash":"0x03","mintedAt":3}"#,
                "\n",
            ),
        )
        .unwrap();

        let store = JsonlStore::open(&path, None).await.unwrap();
        assert_eq!(store.size(), 2);
        assert!(store.has_processed("a:0"));
        assert!(store.has_processed("b:0"));
    }

    #[tokio::test]
    async fn appends_after_an_unterminated_last_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(&path, r#"{"key":"a:0","txHash":"0x01","mintedAt":1}"#)
            .unwrap();

        let store = JsonlStore::open(&path, None).await.unwrap();
        store.mark_processed("b:0", meta("0x02")).await.unwrap();
        store.close().await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.ends_with('\n'));
        let reopened = JsonlStore::open(&path, None).await.unwrap();
        assert_eq!(reopened.size(), 2);
        assert!(reopened.has_processed("a:0"));
        assert!(reopened.has_processed("b:0"));
    }

    #[tokio::test]
    async fn corrupt_line_fails_the_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"key":"a:0","txHash":"0x01","mintedAt":1}"#,
                "\n",
                "{not json\n",
            ),
        )
        .unwrap();

        let err = JsonlStore::open(&path, None).await.unwrap_err();
        assert!(matches!(err, Error::CorruptStore { line: 2, .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_marks_write_one_line_each() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let store = Arc::new(JsonlStore::open(&path, None).await.unwrap());

        let tasks = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let key = format!("0x{i:02x}:0");
                    store.mark_processed(&key, meta("0x01")).await
                })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        store.close().await.unwrap();

        let records = read_log(&path);
        assert_eq!(records.len(), 32);
        let unique = records
            .iter()
            .map(|r| r.key.clone())
            .collect::<std::collections::HashSet<_>>();
        assert_eq!(unique.len(), 32);
    }

    #[tokio::test]
    async fn failed_write_does_not_block_later_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let store = JsonlStore::open(&path, None).await.unwrap();

        // a directory in place of the log makes the append fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        let failed = store.mark_processed("a:0", meta("0x01")).await;
        assert!(matches!(failed, Err(Error::Io(_))));
        // memory stays ahead of disk.
        assert!(store.has_processed("a:0"));

        std::fs::remove_dir(&path).unwrap();
        store.mark_processed("b:0", meta("0x02")).await.unwrap();
        store.close().await.unwrap();
        assert_eq!(keys(&read_log(&path)), ["b:0"]);
    }

    #[tokio::test]
    async fn writes_after_close_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let store = JsonlStore::open(&path, None).await.unwrap();
        store.close().await.unwrap();

        let result = store.mark_processed("a:0", meta("0x01")).await;
        assert!(matches!(result, Err(Error::StoreWriterClosed)));
        // closing twice is fine.
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn info_reports_store_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let store = JsonlStore::open(&path, Some(0)).await.unwrap();
        store.mark_processed("a:0", meta("0x01")).await.unwrap();

        let info = store.info();
        assert_eq!(info.path.as_deref(), Some(path.as_path()));
        assert_eq!(info.size, 1);
        assert_eq!(info.max_entries, None);
    }
}
