use std::ffi::OsString;
use std::path::Path;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;

use crate::sync::listener::RealtimeEvent;

/// Watches a snapshot file and pushes [`RealtimeEvent::Invalidated`] into
/// a listener channel whenever it changes on disk. Watcher errors are
/// reported as a disconnect; the next successful event reconnects.
pub struct SnapshotWatcher {
    _watcher: RecommendedWatcher,
}

impl SnapshotWatcher {
    /// Start watching `path`. The parent directory is watched so that
    /// atomic replaces (write temp + rename) are seen.
    pub fn start(path: &Path, tx: UnboundedSender<RealtimeEvent>) -> Result<Self, notify::Error> {
        let mut filter = SnapshotEvents::new(path);
        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                if let Some(event) = filter.translate(result) {
                    let _ = tx.send(event);
                }
            },
            Config::default(),
        )?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        Ok(SnapshotWatcher { _watcher: watcher })
    }
}

/// Turns raw directory events into listener events for one file
struct SnapshotEvents {
    file_name: Option<OsString>,
    broken: bool,
}

impl SnapshotEvents {
    fn new(path: &Path) -> Self {
        SnapshotEvents {
            file_name: path.file_name().map(|n| n.to_os_string()),
            broken: false,
        }
    }

    fn translate(&mut self, result: Result<Event, notify::Error>) -> Option<RealtimeEvent> {
        let event = match result {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "snapshot watcher error");
                self.broken = true;
                return Some(RealtimeEvent::Disconnected);
            }
        };

        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
            _ => return None,
        }

        let touches_target = event
            .paths
            .iter()
            .any(|p| p.file_name().map(|n| n.to_os_string()) == self.file_name);
        if !touches_target {
            return None;
        }

        if self.broken {
            self.broken = false;
            Some(RealtimeEvent::Reconnected)
        } else {
            Some(RealtimeEvent::Invalidated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use notify::event::{AccessKind, ModifyKind};
    use tempfile::TempDir;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio::time::timeout;

    fn modified(path: &Path) -> Result<Event, notify::Error> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.to_path_buf()))
    }

    #[test]
    fn error_then_change_reconnects() {
        let target = Path::new("/data/tasks.json");
        let mut events = SnapshotEvents::new(target);

        assert_eq!(events.translate(modified(target)), Some(RealtimeEvent::Invalidated));
        assert_eq!(
            events.translate(Err(notify::Error::generic("queue overflow"))),
            Some(RealtimeEvent::Disconnected)
        );
        assert_eq!(events.translate(modified(target)), Some(RealtimeEvent::Reconnected));
        assert_eq!(events.translate(modified(target)), Some(RealtimeEvent::Invalidated));
    }

    #[test]
    fn other_files_and_reads_are_ignored() {
        let target = Path::new("/data/tasks.json");
        let mut events = SnapshotEvents::new(target);

        assert_eq!(events.translate(modified(Path::new("/data/notes.json"))), None);
        let read = Event::new(EventKind::Access(AccessKind::Any)).add_path(target.to_path_buf());
        assert_eq!(events.translate(Ok(read)), None);
    }

    #[tokio::test]
    async fn writing_the_snapshot_invalidates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, "[]").unwrap();

        let (tx, mut rx) = unbounded_channel();
        let _watcher = SnapshotWatcher::start(&path, tx).unwrap();

        // a sibling in the same directory says nothing
        fs::write(dir.path().join("notes.json"), "{}").unwrap();
        assert!(timeout(Duration::from_millis(300), rx.recv()).await.is_err());

        fs::write(&path, r#"[{"id": 1, "title": "A"}]"#).unwrap();
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, RealtimeEvent::Invalidated);
    }
}
