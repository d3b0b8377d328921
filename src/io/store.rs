use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::model::task::{Task, TaskId, TaskPatch};
use crate::sync::service::{ServiceError, TaskService, TaskSource};

/// Error type for snapshot file I/O
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not serialize tasks: {0}")]
    SerializeError(#[from] serde_json::Error),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        ServiceError::Storage(e.to_string())
    }
}

/// On-disk layout: either `{"tasks": [...]}` or a bare array
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Wrapped { tasks: Vec<Task> },
    Bare(Vec<Task>),
}

#[derive(Serialize)]
struct SnapshotOut<'a> {
    tasks: &'a [Task],
}

/// Read a task snapshot from a JSON file
pub fn read_snapshot(path: &Path) -> Result<Vec<Task>, StoreError> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let parsed: SnapshotFile = serde_json::from_str(&text).map_err(|e| StoreError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(match parsed {
        SnapshotFile::Wrapped { tasks } | SnapshotFile::Bare(tasks) => tasks,
    })
}

/// Write a snapshot atomically (temp file + rename)
pub fn write_snapshot(path: &Path, tasks: &[Task]) -> Result<(), StoreError> {
    let mut content = serde_json::to_string_pretty(&SnapshotOut { tasks })?;
    content.push('\n');
    atomic_write(path, content.as_bytes()).map_err(|e| StoreError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Task service backed by a JSON snapshot file.
///
/// Every call re-reads the file so edits made by other processes are
/// picked up; updates stamp `updated_at` and rewrite the whole file.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update_sync(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, ServiceError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ServiceError::Storage("store lock poisoned".into()))?;
        let mut tasks = read_snapshot(&self.path)?;
        let task = tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        patch.apply(task);
        task.updated_at = Some(Utc::now());
        let updated = task.clone();
        write_snapshot(&self.path, &tasks)?;
        Ok(updated)
    }

    fn delete_sync(&self, id: &TaskId) -> Result<(), ServiceError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ServiceError::Storage("store lock poisoned".into()))?;
        let mut tasks = read_snapshot(&self.path)?;
        let before = tasks.len();
        tasks.retain(|t| &t.id != id);
        if tasks.len() == before {
            return Err(ServiceError::NotFound(id.clone()));
        }
        write_snapshot(&self.path, &tasks)?;
        Ok(())
    }
}

#[async_trait]
impl TaskService for FileStore {
    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, ServiceError> {
        self.update_sync(id, &patch)
    }

    async fn delete(&self, id: &TaskId) -> Result<(), ServiceError> {
        self.delete_sync(id)
    }
}

#[async_trait]
impl TaskSource for FileStore {
    async fn list_all(&self) -> Result<Vec<Task>, ServiceError> {
        Ok(read_snapshot(&self.path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::TaskStatus;
    use tempfile::TempDir;

    #[test]
    fn reads_wrapped_and_bare_layouts() {
        let dir = TempDir::new().unwrap();
        let wrapped = dir.path().join("wrapped.json");
        fs::write(&wrapped, r#"{"tasks": [{"id": 1, "title": "One"}]}"#).unwrap();
        let bare = dir.path().join("bare.json");
        fs::write(&bare, r#"[{"id": 1, "title": "One"}]"#).unwrap();

        assert_eq!(read_snapshot(&wrapped).unwrap(), read_snapshot(&bare).unwrap());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        let err = read_snapshot(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, StoreError::ReadError { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "not json {{{").unwrap();
        assert!(matches!(
            read_snapshot(&path).unwrap_err(),
            StoreError::ParseError { .. }
        ));
    }

    #[tokio::test]
    async fn update_rewrites_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        write_snapshot(&path, &[Task::new(1, "One"), Task::new(2, "Two").with_parent(1)]).unwrap();

        let store = FileStore::new(&path);
        let updated = store
            .update(&TaskId::from(2), TaskPatch::status(TaskStatus::Done))
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Done);
        assert!(updated.updated_at.is_some());

        let on_disk = read_snapshot(&path).unwrap();
        assert_eq!(on_disk[1].status, TaskStatus::Done);
        assert_eq!(on_disk[1].parent_id, Some(TaskId::from(1)));
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""completed": true"#));
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        write_snapshot(&path, &[Task::new(1, "One")]).unwrap();
        let store = FileStore::new(&path);

        let err = store
            .update(&TaskId::from(9), TaskPatch::status(TaskStatus::Done))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound(TaskId::from(9)));
        assert_eq!(
            store.delete(&TaskId::from(9)).await.unwrap_err(),
            ServiceError::NotFound(TaskId::from(9))
        );
        store.delete(&TaskId::from(1)).await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
