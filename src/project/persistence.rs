// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Durable project persistence
//!
//! One JSON document per project id under the storage root. Saves are
//! debounced and coalescing; the actual writes are serialized through an
//! async mutex so a write never starts before the previous one for the
//! same store has finished.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::Settings;
use crate::debounce::Debouncer;
use crate::error::{Result, SpecforgeError, StorageError};
use crate::project::{ProjectState, SaveStatus};

/// Durable store for project documents
pub struct ProjectStore {
    root: PathBuf,
    debouncer: Debouncer,
    write_gate: Arc<Mutex<()>>,
}

impl ProjectStore {
    /// Store rooted at an explicit directory
    pub fn new(root: impl Into<PathBuf>, debounce_window: Duration) -> Self {
        Self {
            root: root.into(),
            debouncer: Debouncer::new(debounce_window),
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Store under the default home location, windows from settings
    pub fn open_default(settings: &Settings) -> Self {
        Self::new(
            Settings::specforge_home().join("projects"),
            Duration::from_millis(settings.persistence.save_debounce_ms),
        )
    }

    /// Path of a project's document
    pub fn path_for(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Write a project document immediately, serialized behind the gate.
    pub async fn save_now(&self, state: &ProjectState) -> Result<()> {
        write_document(
            self.write_gate.clone(),
            self.path_for(state.id),
            state.clone(),
        )
        .await
    }

    /// Schedule a debounced save of this snapshot. Overlapping schedules
    /// coalesce to the latest snapshot; `on_status` observes the
    /// `Saving -> Saved | Error` transition when the write finally runs.
    pub fn schedule_save<F>(&self, state: &ProjectState, on_status: F)
    where
        F: Fn(SaveStatus) + Send + Sync + 'static,
    {
        let gate = self.write_gate.clone();
        let path = self.path_for(state.id);
        let snapshot = state.clone();

        self.debouncer.schedule(move || async move {
            on_status(SaveStatus::Saving);
            match write_document(gate, path, snapshot).await {
                Ok(()) => on_status(SaveStatus::Saved),
                Err(err) => {
                    tracing::error!(error = %err, "durable save failed");
                    on_status(SaveStatus::Error);
                }
            }
        });
    }

    /// Drop a pending scheduled save.
    pub fn cancel_pending(&self) {
        self.debouncer.cancel();
    }

    /// Load a project by id. Documents from older schema versions load with
    /// missing fields defaulted; unknown keys are ignored.
    pub fn load(&self, id: Uuid) -> Result<Option<ProjectState>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| SpecforgeError::Storage(StorageError::ReadFailed(e.to_string())))?;
        let mut state: ProjectState = serde_json::from_str(&content)
            .map_err(|e| SpecforgeError::Storage(StorageError::ReadFailed(e.to_string())))?;
        state.normalize();
        Ok(Some(state))
    }

    /// List stored projects as (id, name)
    pub fn list(&self) -> Result<Vec<(Uuid, String)>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut projects = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(state) = read_header(&path) {
                projects.push(state);
            }
        }
        projects.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(projects)
    }

    /// Delete a stored project document
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        Ok(true)
    }
}

/// Minimal parse for listing without deserializing whole documents
fn read_header(path: &Path) -> Option<(Uuid, String)> {
    let content = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&content).ok()?;
    let id: Uuid = value["id"].as_str()?.parse().ok()?;
    let name = value["name"].as_str().unwrap_or_default().to_string();
    Some((id, name))
}

async fn write_document(gate: Arc<Mutex<()>>, path: PathBuf, state: ProjectState) -> Result<()> {
    // Holds until the previous write for this store has completed.
    let _guard = gate.lock().await;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SpecforgeError::Storage(StorageError::from_write_io(e)))?;
    }

    let json = serde_json::to_string_pretty(&state)?;
    std::fs::write(&path, json)
        .map_err(|e| SpecforgeError::Storage(StorageError::from_write_io(e)))?;

    tracing::debug!(project = %state.id, path = %path.display(), "project saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::Stage;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    fn store(dir: &tempfile::TempDir) -> ProjectStore {
        ProjectStore::new(dir.path(), Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let mut project = ProjectState::new("roundtrip");
        project.set_answer("goal", "persist me");
        project.artifacts.commit(Stage::Research, "findings");
        store.save_now(&project).await.unwrap();

        let loaded = store.load(project.id).unwrap().unwrap();
        assert_eq!(loaded.name, "roundtrip");
        assert_eq!(
            loaded.artifacts.current_content(Stage::Research),
            Some("findings")
        );
        // normalize() marks a freshly loaded project saved
        assert_eq!(loaded.save_status, SaveStatus::Saved);
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert!(store.load(Uuid::new_v4()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_tolerates_old_schema() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let id = Uuid::new_v4();
        let old_doc = format!(r#"{{"id": "{id}", "name": "legacy", "retired_field": 7}}"#);
        std::fs::write(store.path_for(id), old_doc).unwrap();

        let loaded = store.load(id).unwrap().unwrap();
        assert_eq!(loaded.name, "legacy");
        assert!(loaded.answers.is_empty());
    }

    #[tokio::test]
    async fn test_load_rejects_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let id = Uuid::new_v4();
        std::fs::write(store.path_for(id), "{not json").unwrap();

        let err = store.load(id).unwrap_err();
        assert!(matches!(
            err,
            SpecforgeError::Storage(StorageError::ReadFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_save_writes_after_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let project = ProjectState::new("debounced");

        let statuses = Arc::new(StdMutex::new(Vec::new()));
        let statuses_clone = statuses.clone();
        store.schedule_save(&project, move |s| {
            statuses_clone.lock().unwrap().push(s);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!store.path_for(project.id).exists());

        tokio::time::sleep(Duration::from_millis(100)).await;
        // Let the spawned write run to completion on the paused runtime
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(store.path_for(project.id).exists());
        assert_eq!(
            *statuses.lock().unwrap(),
            vec![SaveStatus::Saving, SaveStatus::Saved]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_schedules_writes_last_snapshot_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let mut project = ProjectState::new("burst");
        let writes = Arc::new(AtomicU32::new(0));

        for content in ["one", "two", "three"] {
            project.artifacts.commit(Stage::Prd, content);
            let writes = writes.clone();
            store.schedule_save(&project, move |s| {
                if s == SaveStatus::Saved {
                    writes.fetch_add(1, Ordering::SeqCst);
                }
            });
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(writes.load(Ordering::SeqCst), 1);
        let loaded = store.load(project.id).unwrap().unwrap();
        assert_eq!(loaded.artifacts.current_content(Stage::Prd), Some("three"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_reports_error_status() {
        let dir = tempfile::tempdir().unwrap();
        // Root is a file, so creating the directory fails
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "occupied").unwrap();
        let store = ProjectStore::new(blocked.join("projects"), Duration::from_millis(50));

        let project = ProjectState::new("doomed");
        let last_status = Arc::new(StdMutex::new(None));
        let last_clone = last_status.clone();
        store.schedule_save(&project, move |s| {
            *last_clone.lock().unwrap() = Some(s);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(*last_status.lock().unwrap(), Some(SaveStatus::Error));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let a = ProjectState::new("alpha");
        let b = ProjectState::new("beta");
        store.save_now(&a).await.unwrap();
        store.save_now(&b).await.unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].1, "alpha");
        assert_eq!(listed[1].1, "beta");

        assert!(store.delete(a.id).unwrap());
        assert!(!store.delete(a.id).unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path().join("nothing-here"), Duration::from_millis(50));
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sequential_saves_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store(&dir));
        let project = ProjectState::new("serial");

        // Concurrent save_now calls contend on the write gate; both finish
        // and the document stays parseable.
        let s1 = store.clone();
        let p1 = project.clone();
        let s2 = store.clone();
        let p2 = project.clone();
        let (r1, r2) = tokio::join!(
            async move { s1.save_now(&p1).await },
            async move { s2.save_now(&p2).await }
        );
        r1.unwrap();
        r2.unwrap();

        assert!(store.load(project.id).unwrap().is_some());
    }
}
