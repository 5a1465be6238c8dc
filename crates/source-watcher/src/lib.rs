//! Debounced source-file watcher.
//!
//! Editors emit several filesystem events per logical save, so raw events are
//! only timestamped into a pending set; a fixed-period tick promotes entries
//! older than the debounce window into one batch. Per-event timers would leak
//! under heavy edit bursts; the tick scan bounds memory instead.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Directories never worth watching.
const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "vendor",
    ".cache",
    "coverage",
    "__pycache__",
];

/// Source extensions relevant to flow discovery.
const SOURCE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "py", "rb", "go", "rs", "java", "php", "html", "vue",
    "svelte",
];

pub type ChangeCallback = Arc<dyn Fn(Vec<PathBuf>) + Send + Sync>;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("cannot watch project root {root}: {source}")]
    RootWatch {
        root: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("filesystem event stream closed")]
    StreamClosed,
}

/// Watcher tuning knobs.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// How long a path must stay quiet before it is promoted
    pub debounce_window: Duration,

    /// Scan period for the pending set
    pub tick_period: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(500),
            tick_period: Duration::from_millis(200),
        }
    }
}

/// Debounced recursive watcher over a project root.
pub struct SourceWatcher {
    root: PathBuf,
    config: WatcherConfig,
    callback: Mutex<Option<ChangeCallback>>,
    gitignore: Gitignore,
}

impl SourceWatcher {
    pub fn new(root: impl Into<PathBuf>, config: WatcherConfig) -> Self {
        let root = root.into();
        let gitignore = build_gitignore(&root);
        Self {
            root,
            config,
            callback: Mutex::new(None),
            gitignore,
        }
    }

    /// Register the batch callback invoked once per promoted batch.
    pub fn set_change_callback(&self, callback: ChangeCallback) {
        *self.callback.lock() = Some(callback);
    }

    /// Watch until cancellation or fatal stream closure.
    ///
    /// Subdirectories that cannot be watched are logged and skipped; only
    /// failure to watch the root itself is an immediate error.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), WatcherError> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = self.register_watches(event_tx)?;

        let mut pending: HashMap<PathBuf, Instant> = HashMap::new();
        let mut ticker = tokio::time::interval(self.config.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(target: "source-watcher", root = %self.root.display(), "watching for source changes");

        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(target: "source-watcher", "cancellation requested");
                    break Ok(());
                }
                event = event_rx.recv() => {
                    match event {
                        Some(event) => self.record_event(event, &mut pending),
                        // Stream closed: fatal to this watcher only.
                        None => break Err(WatcherError::StreamClosed),
                    }
                }
                _ = ticker.tick() => {
                    let batch = promote_ready(&mut pending, self.config.debounce_window, Instant::now());
                    if !batch.is_empty() {
                        self.dispatch(batch);
                    }
                }
            }
        };

        // Release watch handles on every exit path.
        let _ = watcher.unwatch(&self.root);
        result
    }

    fn register_watches(
        &self,
        event_tx: mpsc::UnboundedSender<Event>,
    ) -> Result<RecommendedWatcher, WatcherError> {
        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(err) => {
                    warn!(target: "source-watcher", %err, "watch backend error");
                }
            })
            .map_err(|source| WatcherError::RootWatch {
                root: self.root.clone(),
                source,
            })?;

        // Watch the root shallowly, then each eligible subdirectory
        // recursively so one unwatchable subtree is non-fatal.
        watcher
            .watch(&self.root, RecursiveMode::NonRecursive)
            .map_err(|source| WatcherError::RootWatch {
                root: self.root.clone(),
                source,
            })?;

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(target: "source-watcher", %err, "cannot enumerate project root");
                return Ok(watcher);
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() || self.is_excluded(&path) {
                continue;
            }
            if let Err(err) = watcher.watch(&path, RecursiveMode::Recursive) {
                warn!(
                    target: "source-watcher",
                    path = %path.display(),
                    %err,
                    "cannot watch subdirectory, skipping"
                );
            }
        }

        Ok(watcher)
    }

    fn record_event(&self, event: Event, pending: &mut HashMap<PathBuf, Instant>) {
        if !event.kind.is_create() && !event.kind.is_modify() && !event.kind.is_remove() {
            return;
        }
        let now = Instant::now();
        for path in event.paths {
            if self.is_relevant(&path) {
                pending.insert(path, now);
            }
        }
    }

    /// Build/vendor/cache directories, dotfiles, gitignored paths and
    /// non-source extensions are all filtered out.
    fn is_relevant(&self, path: &Path) -> bool {
        if self.is_excluded(path) {
            return false;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        for component in relative.components() {
            let name = component.as_os_str().to_string_lossy();
            if name.starts_with('.') || EXCLUDED_DIRS.contains(&name.as_ref()) {
                return true;
            }
        }
        self.gitignore
            .matched_path_or_any_parents(relative, path.is_dir())
            .is_ignore()
    }

    fn dispatch(&self, batch: Vec<PathBuf>) {
        debug!(target: "source-watcher", count = batch.len(), "change batch ready");
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback(batch);
        }
    }
}

/// Promote pending entries older than the debounce window, sorted for stable
/// batches.
fn promote_ready(
    pending: &mut HashMap<PathBuf, Instant>,
    window: Duration,
    now: Instant,
) -> Vec<PathBuf> {
    let mut ready: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, &seen)| now.duration_since(seen) >= window)
        .map(|(path, _)| path.clone())
        .collect();
    for path in &ready {
        pending.remove(path);
    }
    ready.sort();
    ready
}

fn build_gitignore(root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    builder.add(root.join(".gitignore"));
    builder.build().unwrap_or_else(|err| {
        warn!(target: "source-watcher", %err, "cannot parse .gitignore, continuing without it");
        Gitignore::empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn watcher_in(dir: &Path) -> SourceWatcher {
        SourceWatcher::new(dir, WatcherConfig::default())
    }

    #[test]
    fn filters_to_source_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let w = watcher_in(dir.path());
        assert!(w.is_relevant(&dir.path().join("src/login.ts")));
        assert!(w.is_relevant(&dir.path().join("app/routes.py")));
        assert!(!w.is_relevant(&dir.path().join("readme.md")));
        assert!(!w.is_relevant(&dir.path().join("binary")));
    }

    #[test]
    fn excludes_build_dirs_and_dotfiles() {
        let dir = tempfile::tempdir().unwrap();
        let w = watcher_in(dir.path());
        assert!(!w.is_relevant(&dir.path().join("node_modules/pkg/index.js")));
        assert!(!w.is_relevant(&dir.path().join("target/debug/out.rs")));
        assert!(!w.is_relevant(&dir.path().join(".git/hooks/pre-commit.py")));
        assert!(!w.is_relevant(&dir.path().join(".env.js")));
    }

    #[test]
    fn respects_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "generated/\n*.gen.ts\n").unwrap();
        let w = watcher_in(dir.path());
        assert!(!w.is_relevant(&dir.path().join("generated/api.ts")));
        assert!(!w.is_relevant(&dir.path().join("src/client.gen.ts")));
        assert!(w.is_relevant(&dir.path().join("src/client.ts")));
    }

    #[test]
    fn repeated_events_coalesce_into_one_entry() {
        let mut pending = HashMap::new();
        let path = PathBuf::from("/p/src/login.ts");
        let base = Instant::now();

        // N write events inside one debounce window: the map keeps one entry.
        for _ in 0..5 {
            pending.insert(path.clone(), base);
        }
        assert_eq!(pending.len(), 1);

        let batch = promote_ready(
            &mut pending,
            Duration::from_millis(500),
            base + Duration::from_millis(600),
        );
        assert_eq!(batch, vec![path]);
        assert!(pending.is_empty());
    }

    #[test]
    fn young_entries_stay_pending() {
        let mut pending = HashMap::new();
        let base = Instant::now();
        pending.insert(PathBuf::from("/p/a.ts"), base);
        pending.insert(PathBuf::from("/p/b.ts"), base + Duration::from_millis(400));

        let batch = promote_ready(
            &mut pending,
            Duration::from_millis(500),
            base + Duration::from_millis(500),
        );
        assert_eq!(batch, vec![PathBuf::from("/p/a.ts")]);
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn debounced_save_fires_callback_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();

        let watcher = Arc::new(SourceWatcher::new(
            dir.path(),
            WatcherConfig {
                debounce_window: Duration::from_millis(100),
                tick_period: Duration::from_millis(25),
            },
        ));
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let fired = fired.clone();
            watcher.set_change_callback(Arc::new(move |batch| {
                assert!(batch.iter().any(|p| p.ends_with("src/login.ts")));
                fired.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let cancel = CancellationToken::new();
        let task = {
            let watcher = watcher.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { watcher.run(cancel).await })
        };

        // Give the watch registration a moment, then emit a burst of saves.
        tokio::time::sleep(Duration::from_millis(150)).await;
        let file = src.join("login.ts");
        for i in 0..4 {
            std::fs::write(&file, format!("export const v = {i};")).unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        cancel.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_the_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher_in(dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();
        watcher.run(cancel).await.unwrap();
    }
}
