//! Filesystem hot-reload: watch `base_dir` and call
//! [`ConfigRegistry::incremental_load`] on change, debounced.

use std::{
    sync::{mpsc, Arc},
    time::Duration,
};

use notify::{RecursiveMode, Watcher};
use tracing::{error, info, warn};

use crate::registry::ConfigRegistry;

/// A running hot-reload watcher. Dropping this stops the watch.
pub struct ReloadWatcher {
    _watcher: notify::RecommendedWatcher,
    _handle: std::thread::JoinHandle<()>,
}

/// Start watching `registry.base_dir()` for changes and re-run
/// `incremental_load(pattern)` on each debounced batch of events.
///
/// # Errors
///
/// Returns an error if the underlying OS file-watch cannot be
/// established (e.g. the directory doesn't exist).
pub fn watch(registry: Arc<ConfigRegistry>, pattern: String, debounce: Duration) -> notify::Result<ReloadWatcher> {
    let (tx, rx) = mpsc::channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Err(e) = tx.send(res) {
            error!(error = %e, "config watcher channel closed");
        }
    })?;
    watcher.watch(registry.base_dir(), RecursiveMode::Recursive)?;

    let handle = std::thread::spawn(move || {
        loop {
            let Ok(first) = rx.recv() else { break };
            // Drain any further events that land inside the debounce
            // window so a burst of writes triggers exactly one reload.
            let mut events = vec![first];
            while let Ok(next) = rx.recv_timeout(debounce) {
                events.push(next);
            }
            if events.iter().any(|e| e.is_err()) {
                for e in events.into_iter().filter_map(Result::err) {
                    warn!(error = %e, "config watch error");
                }
                continue;
            }
            info!(pattern = %pattern, "config tree changed; reloading");
            let report = registry.incremental_load(&pattern);
            if !report.warnings.is_empty() {
                warn!(warnings = ?report.warnings, "config reload had skipped entries");
            }
        }
    });

    Ok(ReloadWatcher { _watcher: watcher, _handle: handle })
}
