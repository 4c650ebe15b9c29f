// src/store/shared.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::{GoalweaverError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::store::persist::{merge_and_write, read_document};

const LOGS: &str = "logs";
const ARTIFACTS: &str = "artifacts";
const METRICS: &str = "metrics";

/// Top-level keys this store owns in the state document.
pub const OWNED_NAMESPACES: [&str; 3] = [LOGS, ARTIFACTS, METRICS];

#[derive(Debug, Default)]
struct StoreState {
    logs: Vec<Value>,
    artifacts: Map<String, Value>,
    metrics: BTreeMap<String, i64>,
    /// Generic slots (e.g. `world`); kept in memory only.
    slots: Map<String, Value>,
}

impl StoreState {
    fn owned_sections(&self) -> Map<String, Value> {
        let mut sections = Map::new();
        sections.insert(LOGS.to_string(), Value::Array(self.logs.clone()));
        sections.insert(ARTIFACTS.to_string(), Value::Object(self.artifacts.clone()));
        let metrics = self
            .metrics
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(*v)))
            .collect();
        sections.insert(METRICS.to_string(), Value::Object(metrics));
        sections
    }
}

/// Namespaced key-value store shared by the orchestrator and agents.
///
/// Every operation runs under one exclusive lock, including the
/// read-merge-write of the state file, so writes of the file from this
/// process never interleave. Persistence is best-effort: failures are logged
/// and never surface to callers.
#[derive(Debug)]
pub struct SharedStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    state: Mutex<StoreState>,
}

impl SharedStore {
    /// Open a store backed by the real filesystem.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_fs(Arc::new(RealFileSystem), path)
    }

    /// Open a store, adopting `logs`, `artifacts` and `metrics` from a prior
    /// snapshot at `path` when they have the expected shape.
    pub fn with_fs(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut state = StoreState::default();
        let mut doc = read_document(fs.as_ref(), &path);

        if let Some(Value::Array(logs)) = doc.remove(LOGS) {
            state.logs = logs;
        }
        if let Some(Value::Object(artifacts)) = doc.remove(ARTIFACTS) {
            state.artifacts = artifacts;
        }
        if let Some(Value::Object(metrics)) = doc.remove(METRICS) {
            state.metrics = metrics
                .into_iter()
                .filter_map(|(k, v)| v.as_i64().map(|n| (k, n)))
                .collect();
        }

        debug!(
            path = %path.display(),
            logs = state.logs.len(),
            artifacts = state.artifacts.len(),
            metrics = state.metrics.len(),
            "shared store opened"
        );

        Self {
            path,
            fs,
            state: Mutex::new(state),
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.path
    }

    /// Generic slot lookup. Reserved namespaces read back as JSON.
    pub async fn get(&self, key: &str, default: Value) -> Value {
        let state = self.state.lock().await;
        match key {
            LOGS => Value::Array(state.logs.clone()),
            ARTIFACTS => Value::Object(state.artifacts.clone()),
            METRICS => state
                .owned_sections()
                .remove(METRICS)
                .unwrap_or(default),
            _ => state.slots.get(key).cloned().unwrap_or(default),
        }
    }

    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        if OWNED_NAMESPACES.contains(&key) {
            return Err(GoalweaverError::ReservedKey(key.to_string()));
        }
        let mut state = self.state.lock().await;
        state.slots.insert(key.to_string(), value);
        self.persist(&state).await;
        Ok(())
    }

    pub async fn append_log(&self, entry: Value) {
        let mut state = self.state.lock().await;
        state.logs.push(entry);
        self.persist(&state).await;
    }

    pub async fn record_artifact(&self, name: &str, value: Value) {
        let mut state = self.state.lock().await;
        state.artifacts.insert(name.to_string(), value);
        self.persist(&state).await;
    }

    pub async fn bump_metric(&self, name: &str, delta: i64) {
        let mut state = self.state.lock().await;
        *state.metrics.entry(name.to_string()).or_insert(0) += delta;
        self.persist(&state).await;
    }

    /// Copy of the log sequence.
    pub async fn export_logs(&self) -> Vec<Value> {
        self.state.lock().await.logs.clone()
    }

    pub async fn artifact(&self, name: &str) -> Option<Value> {
        self.state.lock().await.artifacts.get(name).cloned()
    }

    pub async fn metric(&self, name: &str) -> i64 {
        self.state
            .lock()
            .await
            .metrics
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Write the orchestrator's snapshot (`goals` plus the current `logs`)
    /// into the document at `path`, under this store's lock so it never
    /// interleaves with the store's own persistence. Best-effort.
    pub async fn write_snapshot(&self, path: &Path, goals: Value) {
        let state = self.state.lock().await;
        let mut sections = Map::new();
        sections.insert("goals".to_string(), goals);
        sections.insert(LOGS.to_string(), Value::Array(state.logs.clone()));
        self.write_sections(path.to_path_buf(), sections, "snapshot write failed; continuing")
            .await;
    }

    async fn persist(&self, state: &StoreState) {
        self.write_sections(
            self.path.clone(),
            state.owned_sections(),
            "state persist failed; continuing",
        )
        .await;
    }

    /// Read-merge-write on the blocking pool. Callers hold the state lock
    /// for the whole write.
    async fn write_sections(&self, path: PathBuf, sections: Map<String, Value>, what: &str) {
        let fs = Arc::clone(&self.fs);
        let target = path.clone();
        let written =
            tokio::task::spawn_blocking(move || merge_and_write(fs.as_ref(), &target, sections))
                .await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(path = %path.display(), error = %err, "{what}"),
            Err(err) => warn!(path = %path.display(), error = %err, "{what}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use serde_json::json;

    fn mock_store() -> (MockFileSystem, SharedStore) {
        let fs = MockFileSystem::new();
        let store = SharedStore::with_fs(Arc::new(fs.clone()), "state.json");
        (fs, store)
    }

    #[tokio::test]
    async fn slots_and_reserved_keys() {
        let (_fs, store) = mock_store();
        assert_eq!(store.get("world", json!({})).await, json!({}));

        store.set("world", json!({"facts": 1})).await.unwrap();
        assert_eq!(store.get("world", Value::Null).await, json!({"facts": 1}));

        let err = store.set("logs", json!([])).await.unwrap_err();
        assert!(matches!(err, GoalweaverError::ReservedKey(_)));
    }

    #[tokio::test]
    async fn metrics_accumulate() {
        let (fs, store) = mock_store();
        store.bump_metric("runs_completed", 1).await;
        store.bump_metric("runs_completed", 2).await;
        assert_eq!(store.metric("runs_completed").await, 3);
        assert_eq!(store.metric("never").await, 0);

        let doc: Value = serde_json::from_str(&fs.contents("state.json").unwrap()).unwrap();
        assert_eq!(doc["metrics"]["runs_completed"], json!(3));
    }

    #[tokio::test]
    async fn failed_persist_keeps_in_memory_state() {
        let (fs, store) = mock_store();
        fs.set_fail_writes(true);

        store.append_log(json!({"goal": "g1"})).await;
        store.record_artifact("x", json!(42)).await;

        assert_eq!(store.export_logs().await.len(), 1);
        assert_eq!(store.artifact("x").await, Some(json!(42)));
        assert_eq!(fs.write_count(), 0);
    }

    #[tokio::test]
    async fn slow_writes_do_not_stall_other_tasks() {
        let (fs, store) = mock_store();
        fs.set_write_delay(std::time::Duration::from_millis(100));

        let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
            })
        };
        tokio::task::yield_now().await;

        store.append_log(json!({"goal": "g1"})).await;
        let seen = ticks.load(std::sync::atomic::Ordering::SeqCst);
        ticker.abort();

        assert!(seen >= 3, "ticker only advanced {seen} time(s) during the write");
        assert_eq!(fs.write_count(), 1);
    }

    #[tokio::test]
    async fn mistyped_namespaces_on_disk_are_ignored() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "state.json",
            r#"{"logs": {"bad": true}, "artifacts": [], "metrics": {"ok": 2, "bad": "x"}}"#,
        );
        let store = SharedStore::with_fs(Arc::new(fs), "state.json");

        assert!(store.export_logs().await.is_empty());
        assert_eq!(store.get("artifacts", Value::Null).await, json!({}));
        assert_eq!(store.metric("ok").await, 2);
        assert_eq!(store.metric("bad").await, 0);
    }
}
