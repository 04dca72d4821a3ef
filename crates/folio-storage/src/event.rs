//! Watch event types.
//!
//! Events are produced by [`watch_paths`](crate::watch_paths) after
//! debouncing and delivered through a tokio channel so async refresh loops
//! can await them.

use std::path::PathBuf;
use std::sync::mpsc;

use tokio::sync::mpsc::UnboundedReceiver;

/// Kind of file-system change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchEventKind {
    /// File was created.
    Created,
    /// File was modified.
    Modified,
    /// File was removed.
    Removed,
}

/// A debounced file-system change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEvent {
    /// Absolute path of the changed file.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: WatchEventKind,
}

/// Receiver for watch events.
pub struct WatchEventReceiver {
    rx: UnboundedReceiver<WatchEvent>,
}

impl WatchEventReceiver {
    pub(crate) fn new(rx: UnboundedReceiver<WatchEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once watching has stopped.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    /// Take an already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<WatchEvent> {
        self.rx.try_recv().ok()
    }

    /// Discard every queued event, returning how many were dropped.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.try_recv().is_some() {
            drained += 1;
        }
        drained
    }
}

/// Handle to stop watching for changes.
///
/// Dropping the handle stops watching: the internal shutdown sender is
/// dropped and the drain thread exits on its next poll.
pub struct WatchHandle {
    _shutdown: Option<mpsc::Sender<()>>,
}

impl WatchHandle {
    pub(crate) fn new(shutdown: mpsc::Sender<()>) -> Self {
        Self {
            _shutdown: Some(shutdown),
        }
    }

    /// Stop watching immediately (consumes the handle).
    pub fn stop(mut self) {
        self._shutdown.take();
    }
}
