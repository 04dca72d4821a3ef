//! Debounced watching of supporting directories.

use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::time::Duration;

use notify::{RecursiveMode, Watcher};

use crate::debouncer::EventDebouncer;
use crate::{StorageError, StorageErrorKind, StorageOp, WatchEventKind, WatchEventReceiver, WatchHandle};

const BACKEND: &str = "Fs";

/// How often the drain thread polls the debouncer.
const DRAIN_INTERVAL: Duration = Duration::from_millis(50);

/// Watch `roots` recursively and report debounced changes.
///
/// Roots that do not exist are skipped. Changes to hidden files (any path
/// component starting with `.`) are ignored. Events carry absolute paths.
///
/// # Errors
///
/// Returns [`StorageError`] with [`StorageErrorKind::Watch`] if the watcher
/// cannot be created or a root cannot be watched.
pub fn watch_paths(
    roots: &[PathBuf],
    debounce: Duration,
) -> Result<(WatchEventReceiver, WatchHandle), StorageError> {
    let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let debouncer = Arc::new(EventDebouncer::new(debounce));
    let recorder = Arc::clone(&debouncer);
    let watched: Vec<PathBuf> = roots.iter().filter(|r| r.is_dir()).cloned().collect();
    let filter_roots = watched.clone();

    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        let Ok(event) = res else {
            return;
        };
        let kind = match event.kind {
            notify::EventKind::Create(_) => WatchEventKind::Created,
            notify::EventKind::Modify(_) => WatchEventKind::Modified,
            notify::EventKind::Remove(_) => WatchEventKind::Removed,
            _ => return,
        };
        for path in event.paths {
            let Some(root) = filter_roots.iter().find(|r| path.starts_with(r)) else {
                continue;
            };
            let hidden = path.strip_prefix(root).is_ok_and(|rel| {
                rel.components()
                    .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
            });
            if !hidden {
                recorder.record(path, kind);
            }
        }
    })
    .map_err(|e| {
        StorageError::new(StorageErrorKind::Watch)
            .during(StorageOp::Watch)
            .with_backend(BACKEND)
            .with_source(e)
    })?;

    for root in &watched {
        watcher.watch(root, RecursiveMode::Recursive).map_err(|e| {
            StorageError::new(StorageErrorKind::Watch)
                .during(StorageOp::Watch)
                .with_path(root)
                .with_backend(BACKEND)
                .with_source(e)
        })?;
        tracing::debug!(path = %root.display(), "Watching");
    }

    std::thread::spawn(move || {
        // The watcher stops when this thread drops it.
        let _watcher = watcher;
        loop {
            match shutdown_rx.recv_timeout(DRAIN_INTERVAL) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
            for event in debouncer.drain_ready() {
                if event_tx.send(event).is_err() {
                    return;
                }
            }
        }
    });

    Ok((WatchEventReceiver::new(event_rx), WatchHandle::new(shutdown_tx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_reports_change_in_watched_root() {
        let temp = tempfile::tempdir().unwrap();
        let layouts = temp.path().join("layouts");
        fs::create_dir_all(&layouts).unwrap();

        let (mut rx, _handle) =
            watch_paths(&[layouts.clone(), temp.path().join("missing")], Duration::from_millis(20))
                .unwrap();

        // Give the backend a moment to register the watch.
        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(layouts.join("default.html"), "{{body}}").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within timeout")
            .expect("channel closed");
        assert!(event.path.starts_with(&layouts));
    }

    #[tokio::test]
    async fn test_stop_closes_channel() {
        let temp = tempfile::tempdir().unwrap();
        let (mut rx, handle) =
            watch_paths(&[temp.path().to_path_buf()], Duration::from_millis(20)).unwrap();
        handle.stop();

        let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("channel not closed within timeout");
        assert!(closed.is_none());
    }
}
