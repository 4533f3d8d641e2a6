use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::store::PolicyStore;

/// Quiescence window for coalescing rapid successive file events
/// (editor rename-dance) before triggering a reload.
const DEBOUNCE_MS: u64 = 100;

/// Watches `store.dir()` for filesystem events and re-runs `load()`
/// after each debounced burst. Runs independently of admissions; an
/// evaluation in flight keeps the snapshot it already holds.
pub struct PolicyWatcher {
    started: AtomicBool,
}

impl Default for PolicyWatcher {
    fn default() -> Self {
        PolicyWatcher {
            started: AtomicBool::new(false),
        }
    }
}

impl PolicyWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the background watcher task and the filesystem listener
    /// thread. Idempotent: a second call is a no-op.
    pub fn start(self: &Arc<Self>, store: PolicyStore) {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let store_dir = store.dir().to_path_buf();
        let (reload_tx, mut reload_rx) = mpsc::unbounded_channel::<()>();

        tokio::spawn(async move {
            while reload_rx.recv().await.is_some() {
                tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS)).await;
                while reload_rx.try_recv().is_ok() {}
                store.load();
            }
        });

        let dir = store_dir.clone();
        std::thread::spawn(move || watch(dir, reload_tx));
    }
}

fn watch(dir: std::path::PathBuf, reload_tx: mpsc::UnboundedSender<()>) {
    let tx = reload_tx.clone();
    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(_event) => {
                let _ = tx.send(());
            }
            Err(err) => {
                tracing::error!(error = %err, "policy watcher error");
            }
        },
        notify::Config::default(),
    ) {
        Ok(w) => w,
        Err(err) => {
            tracing::error!(error = %err, "failed to create policy watcher");
            return;
        }
    };

    if let Err(err) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
        tracing::error!(dir = %dir.display(), error = %err, "failed to watch policy directory");
        return;
    }

    tracing::info!(dir = %dir.display(), "policy watcher started");
    // Park this thread; `watcher` must stay alive for events to keep
    // flowing, and this thread owns it.
    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}
