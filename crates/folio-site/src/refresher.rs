//! Readiness-gated render context cache.
//!
//! [`Refresher`] owns the current [`RenderContext`] snapshot and rebuilds it
//! on demand. While a refresh runs the cache is *not ready*: callers of
//! [`Refresher::on_ready`] suspend until the last queued refresh finishes.
//!
//! # Thread Safety
//!
//! - `RwLock<Arc<RenderContext>>` holds the snapshot; readers clone the `Arc`
//!   and never block a refresh
//! - `tokio::sync::Mutex<()>` serializes refreshes
//! - a `watch<bool>` channel broadcasts readiness

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use tokio::sync::watch;

use crate::context::RenderContext;
use crate::loader::{ContextLoader, elapsed_ms};

/// Render context cache with hot refresh.
pub struct Refresher {
    loader: Arc<dyn ContextLoader>,
    current: RwLock<Arc<RenderContext>>,
    ready: watch::Sender<bool>,
    /// Serializes refreshes.
    refresh_lock: tokio::sync::Mutex<()>,
    /// Refreshes requested but not yet finished.
    pending: Mutex<usize>,
}

impl Refresher {
    /// Create a refresher holding `initial`. It starts not ready.
    #[must_use]
    pub fn new(loader: Arc<dyn ContextLoader>, initial: RenderContext) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            loader,
            current: RwLock::new(Arc::new(initial)),
            ready,
            refresh_lock: tokio::sync::Mutex::new(()),
            pending: Mutex::new(0),
        }
    }

    /// Current snapshot, ready or not.
    ///
    /// # Panics
    ///
    /// Panics if the internal `RwLock` is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RenderContext> {
        Arc::clone(&self.current.read().unwrap())
    }

    /// Whether the context is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until the context is ready and return its snapshot.
    ///
    /// Resolves immediately when ready.
    pub async fn on_ready(&self) -> Arc<RenderContext> {
        let mut ready = self.ready.subscribe();
        if ready.wait_for(|ready| *ready).await.is_err() {
            tracing::warn!("Readiness channel closed");
        }
        self.snapshot()
    }

    /// Rebuild the context and swap it in.
    ///
    /// Marks the cache not ready immediately. Refreshes run one at a time;
    /// readiness returns only when the last queued refresh finishes. If the
    /// loader panics the previous context is kept.
    ///
    /// Cancelling the returned future still releases its hold on readiness.
    /// A load already running on the blocking pool is then discarded.
    ///
    /// # Panics
    ///
    /// Panics if the snapshot lock is poisoned.
    pub async fn refresh(&self) -> Arc<RenderContext> {
        let _pending = self.begin_refresh();

        let _guard = self.refresh_lock.lock().await;
        let start = Instant::now();
        let loader = Arc::clone(&self.loader);
        match tokio::task::spawn_blocking(move || loader.load()).await {
            Ok(context) => {
                *self.current.write().unwrap() = Arc::new(context);
                tracing::debug!(elapsed_ms = elapsed_ms(start), "Render context swapped");
            }
            Err(e) => {
                tracing::error!(error = %e, "Render context load failed, keeping previous context");
            }
        }
        self.snapshot()
    }

    /// Count a refresh in and flip readiness off.
    fn begin_refresh(&self) -> PendingRefresh<'_> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        *pending += 1;
        self.ready.send_replace(false);
        PendingRefresh { refresher: self }
    }
}

/// Counts a refresh back out when dropped, completed or cancelled.
struct PendingRefresh<'a> {
    refresher: &'a Refresher,
}

impl Drop for PendingRefresh<'_> {
    fn drop(&mut self) {
        let mut pending = self
            .refresher
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *pending -= 1;
        if *pending == 0 {
            self.refresher.ready.send_replace(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use folio_render::{HandlebarsRenderer, RenderOptions, Renderer};

    use super::*;

    static_assertions::assert_impl_all!(Refresher: Send, Sync);

    /// Loader that blocks until released and counts its loads.
    struct GatedLoader {
        gate: Mutex<mpsc::Receiver<()>>,
        loads: AtomicUsize,
    }

    impl ContextLoader for GatedLoader {
        fn load(&self) -> RenderContext {
            self.gate.lock().unwrap().recv().unwrap();
            let n = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
            let mut templates = HandlebarsRenderer::new(RenderOptions::default()).template_set();
            templates.add_layout(&format!("v{n}"), "{{body}}").unwrap();
            RenderContext::new(templates)
        }
    }

    struct PanickingLoader;

    impl ContextLoader for PanickingLoader {
        fn load(&self) -> RenderContext {
            panic!("loader exploded");
        }
    }

    /// Loader that takes a while on the blocking pool.
    struct SlowLoader(Duration);

    impl ContextLoader for SlowLoader {
        fn load(&self) -> RenderContext {
            std::thread::sleep(self.0);
            empty()
        }
    }

    fn empty() -> RenderContext {
        RenderContext::empty(&HandlebarsRenderer::new(RenderOptions::default()))
    }

    fn gated() -> (Arc<Refresher>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let loader = Arc::new(GatedLoader {
            gate: Mutex::new(rx),
            loads: AtomicUsize::new(0),
        });
        (Arc::new(Refresher::new(loader, empty())), tx)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_on_ready_waits_for_refresh() {
        let (refresher, gate) = gated();
        assert!(!refresher.is_ready());

        let waiter = {
            let refresher = Arc::clone(&refresher);
            tokio::spawn(async move { refresher.on_ready().await })
        };
        let refresh = {
            let refresher = Arc::clone(&refresher);
            tokio::spawn(async move { refresher.refresh().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        assert!(!refresher.is_ready());

        gate.send(()).unwrap();
        let context = waiter.await.unwrap();
        refresh.await.unwrap();
        assert!(refresher.is_ready());
        assert!(context.templates().has_layout("v1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_ready_only_after_last_queued_refresh() {
        let (refresher, gate) = gated();
        let first = {
            let refresher = Arc::clone(&refresher);
            tokio::spawn(async move { refresher.refresh().await })
        };
        let second = {
            let refresher = Arc::clone(&refresher);
            tokio::spawn(async move { refresher.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        gate.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!refresher.is_ready());

        gate.send(()).unwrap();
        first.await.unwrap();
        second.await.unwrap();
        assert!(refresher.is_ready());
        assert!(refresher.on_ready().await.templates().has_layout("v2"));
    }

    #[tokio::test]
    async fn test_on_ready_immediate_when_ready() {
        let (refresher, gate) = gated();
        gate.send(()).unwrap();
        refresher.refresh().await;
        let context = tokio::time::timeout(Duration::from_millis(100), refresher.on_ready())
            .await
            .unwrap();
        assert!(context.templates().has_layout("v1"));
    }

    #[tokio::test]
    async fn test_panicking_loader_keeps_previous_context() {
        let refresher = Refresher::new(Arc::new(PanickingLoader), empty());
        let before = refresher.snapshot();
        let after = refresher.refresh().await;
        assert!(Arc::ptr_eq(&before, &after));
        assert!(refresher.is_ready());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_refresh_releases_readiness() {
        let refresher = Refresher::new(Arc::new(SlowLoader(Duration::from_millis(200))), empty());

        let cancelled = tokio::time::timeout(Duration::from_millis(20), refresher.refresh()).await;
        assert!(cancelled.is_err());
        assert!(refresher.is_ready());

        refresher.refresh().await;
        assert!(refresher.is_ready());
        tokio::time::timeout(Duration::from_millis(100), refresher.on_ready())
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_refresh_does_not_release_queued_one() {
        let (refresher, gate) = gated();
        let running = {
            let refresher = Arc::clone(&refresher);
            tokio::spawn(async move { refresher.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let queued = tokio::time::timeout(Duration::from_millis(20), refresher.refresh()).await;
        assert!(queued.is_err());
        assert!(!refresher.is_ready());

        gate.send(()).unwrap();
        running.await.unwrap();
        assert!(refresher.is_ready());
    }
}
