//! Event debouncing for asset watching.
//!
//! Editors often emit several events per save. The debouncer keeps one
//! pending change per path and only releases it once the path has been quiet
//! for the debounce window.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::{WatchEvent, WatchEventKind};

struct Pending {
    kind: WatchEventKind,
    deadline: Instant,
}

/// Thread-safe per-path event debouncer.
pub(crate) struct EventDebouncer {
    pending: Mutex<HashMap<PathBuf, Pending>>,
    window: Duration,
}

impl EventDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Record a raw event, merging it with any pending change for the path.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn record(&self, path: PathBuf, kind: WatchEventKind) {
        let mut pending = self.pending.lock().unwrap();
        let deadline = Instant::now() + self.window;

        let merged = match pending.get(&path) {
            None => Some(kind),
            Some(existing) => merge(existing.kind, kind),
        };
        match merged {
            Some(kind) => {
                pending.insert(path, Pending { kind, deadline });
            }
            None => {
                pending.remove(&path);
            }
        }
    }

    /// Remove and return every change whose window has elapsed.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn drain_ready(&self) -> Vec<WatchEvent> {
        let mut pending = self.pending.lock().unwrap();
        let now = Instant::now();
        let mut ready = Vec::new();
        pending.retain(|path, change| {
            if change.deadline <= now {
                ready.push(WatchEvent {
                    path: path.clone(),
                    kind: change.kind,
                });
                false
            } else {
                true
            }
        });
        ready
    }
}

/// Merge a new change into a pending one.
///
/// Returns `None` when the pair cancels out (created then removed).
#[allow(clippy::match_same_arms)]
fn merge(pending: WatchEventKind, new: WatchEventKind) -> Option<WatchEventKind> {
    use WatchEventKind::{Created, Modified, Removed};

    match (pending, new) {
        (Created, Removed) => None,
        (Created, _) => Some(Created),
        (Modified, kind) => Some(kind),
        (Removed, Created) => Some(Modified),
        (Removed, _) => Some(Removed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use WatchEventKind::{Created, Modified, Removed};

    fn settled(debouncer: &EventDebouncer) -> Vec<WatchEvent> {
        thread::sleep(Duration::from_millis(15));
        debouncer.drain_ready()
    }

    #[test]
    fn test_event_held_until_window_elapses() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));
        let path = PathBuf::from("/site/layouts/default.html");
        debouncer.record(path.clone(), Modified);

        assert!(debouncer.drain_ready().is_empty());

        let events = settled(&debouncer);
        assert_eq!(
            events,
            vec![WatchEvent {
                path,
                kind: Modified
            }]
        );
        assert!(debouncer.drain_ready().is_empty());
    }

    #[test]
    fn test_burst_of_saves_coalesces() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));
        let path = PathBuf::from("/site/data/nav.yml");
        for _ in 0..5 {
            debouncer.record(path.clone(), Modified);
        }
        let events = settled(&debouncer);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, Modified);
    }

    #[test]
    fn test_created_then_removed_cancels() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));
        let path = PathBuf::from("/site/partials/tmp.html");
        debouncer.record(path.clone(), Created);
        debouncer.record(path, Removed);
        assert!(settled(&debouncer).is_empty());
    }

    #[test]
    fn test_paths_are_independent() {
        let debouncer = EventDebouncer::new(Duration::from_millis(10));
        debouncer.record(PathBuf::from("/a.html"), Modified);
        debouncer.record(PathBuf::from("/b.html"), Created);
        assert_eq!(settled(&debouncer).len(), 2);
    }

    #[test]
    fn test_merge_table() {
        assert_eq!(merge(Created, Created), Some(Created));
        assert_eq!(merge(Created, Modified), Some(Created));
        assert_eq!(merge(Created, Removed), None);
        assert_eq!(merge(Modified, Created), Some(Created));
        assert_eq!(merge(Modified, Modified), Some(Modified));
        assert_eq!(merge(Modified, Removed), Some(Removed));
        assert_eq!(merge(Removed, Created), Some(Modified));
        assert_eq!(merge(Removed, Modified), Some(Removed));
        assert_eq!(merge(Removed, Removed), Some(Removed));
    }
}
