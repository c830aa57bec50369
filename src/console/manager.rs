//! Console management for crowd-input.
//!
//! This module handles:
//! - Loading console catalogs from TOML files
//! - Loading priority: built-in < user-global < workspace < custom
//! - File watching for live reload
//! - Publishing each load as an immutable registry snapshot

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, RwLock};

use super::registry::{parse_console_content, ConsolePriority, ConsoleRegistry, LoadedConsole};
use super::schema::Console;
use crate::config;

/// Events from the file watcher
#[derive(Debug)]
enum WatcherEvent {
    ConsoleFileChanged(PathBuf),
    WatcherError(notify::Error),
}

/// Loads, watches and serves console catalogs
///
/// Readers take a [`snapshot`](Self::snapshot); a reload swaps in a new
/// registry and never mutates one that was handed out.
pub struct ConsoleManager {
    registry: Arc<RwLock<Arc<ConsoleRegistry>>>,
    /// Directories to load, each with the priority of its files
    console_dirs: Vec<(PathBuf, ConsolePriority)>,
    /// Console requested by the user
    default_console: String,
    _watcher: Option<RecommendedWatcher>,
    watcher_rx: Option<mpsc::UnboundedReceiver<WatcherEvent>>,
}

impl ConsoleManager {
    /// Create a console manager from the CLI configuration
    pub fn new(config: &config::Config) -> Self {
        Self::with_dirs(config.console_dirs.clone(), config.console.clone())
    }

    pub fn with_dirs(
        console_dirs: Vec<(PathBuf, ConsolePriority)>,
        default_console: impl Into<String>,
    ) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Arc::new(ConsoleRegistry::new()))),
            console_dirs,
            default_console: default_console.into(),
            _watcher: None,
            watcher_rx: None,
        }
    }

    /// Load every console and optionally start watching the directories
    pub async fn initialize(&mut self, watch: bool) -> Result<()> {
        self.load().await?;

        if watch {
            self.start_watching()?;
        }

        Ok(())
    }

    /// Reload all consoles and publish a new snapshot
    pub async fn load(&self) -> Result<usize> {
        let registry = Self::build_registry(&self.console_dirs, &self.default_console).await?;
        let count = registry.len();

        *self.registry.write().await = Arc::new(registry);
        log::info!("Loaded {} consoles", count);

        Ok(count)
    }

    /// Build a registry from the embedded consoles and the given directories
    async fn build_registry(
        console_dirs: &[(PathBuf, ConsolePriority)],
        default_console: &str,
    ) -> Result<ConsoleRegistry> {
        let mut registry = ConsoleRegistry::new();
        registry.add_embedded_consoles();

        for (dir, priority) in console_dirs {
            Self::load_consoles_from_directory(dir, *priority, &mut registry).await?;
        }

        if !registry.set_active_console(default_console) {
            log::warn!(
                "Console '{}' not found, available: {}",
                default_console,
                registry.list_consoles().join(", ")
            );
        }

        Ok(registry)
    }

    /// Load consoles from a specific directory
    async fn load_consoles_from_directory(
        dir: &Path,
        priority: ConsolePriority,
        registry: &mut ConsoleRegistry,
    ) -> Result<()> {
        if !dir.exists() {
            return Ok(());
        }

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read console directory: {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_console_file(&path) {
                continue;
            }

            match Self::load_console_file(&path, priority).await {
                Ok(loaded) => {
                    let name = loaded.console.name.clone();
                    if !registry.add_loaded(loaded) {
                        log::debug!(
                            "Skipping {}: console '{}' already loaded with higher priority",
                            path.display(),
                            name
                        );
                    }
                }
                Err(e) => {
                    log::warn!("Failed to load console file {}: {:#}", path.display(), e);
                }
            }
        }

        Ok(())
    }

    /// Load a single console file
    async fn load_console_file(path: &Path, priority: ConsolePriority) -> Result<LoadedConsole> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read console file: {}", path.display()))?;

        let console = parse_console_content(&content, Some(path))?;

        Ok(LoadedConsole {
            console: Arc::new(console),
            priority,
            source_path: Some(path.to_path_buf()),
        })
    }

    /// Start file watching for console directories
    fn start_watching(&mut self) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watcher_rx = Some(rx);

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if let EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) =
                        event.kind
                    {
                        for path in event.paths {
                            if is_console_file(&path) {
                                let _ = tx.send(WatcherEvent::ConsoleFileChanged(path));
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatcherEvent::WatcherError(e));
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;

        for (dir, _) in &self.console_dirs {
            if dir.exists() {
                watcher
                    .watch(dir, RecursiveMode::NonRecursive)
                    .with_context(|| format!("Failed to watch {}", dir.display()))?;
            }
        }

        self._watcher = Some(watcher);
        self.start_watcher_task();

        Ok(())
    }

    /// Start the background task that processes file watcher events
    fn start_watcher_task(&mut self) {
        let Some(mut rx) = self.watcher_rx.take() else {
            return;
        };
        let registry = self.registry.clone();
        let console_dirs = self.console_dirs.clone();
        let default_console = self.default_console.clone();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    WatcherEvent::ConsoleFileChanged(path) => {
                        log::info!("Console file changed: {}", path.display());

                        // Any change rebuilds the whole registry so priorities stay consistent
                        match Self::build_registry(&console_dirs, &default_console).await {
                            Ok(fresh) => {
                                *registry.write().await = Arc::new(fresh);
                                log::info!("Consoles reloaded due to file changes");
                            }
                            Err(e) => log::warn!("Failed to reload consoles: {:#}", e),
                        }
                    }
                    WatcherEvent::WatcherError(e) => {
                        log::warn!("Console file watcher error: {}", e);
                    }
                }
            }
        });
    }

    /// The current registry; later reloads do not affect it
    pub async fn snapshot(&self) -> Arc<ConsoleRegistry> {
        self.registry.read().await.clone()
    }

    /// Get a console by name
    pub async fn get_console(&self, name: &str) -> Option<Arc<Console>> {
        self.snapshot().await.get_console(name).cloned()
    }

    pub async fn get_loaded(&self, name: &str) -> Option<LoadedConsole> {
        self.snapshot().await.get_loaded(name).cloned()
    }

    /// List all available console names
    pub async fn list_console_names(&self) -> Vec<String> {
        self.snapshot()
            .await
            .list_consoles()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// The requested console, or the first one by name when it is missing
    pub async fn get_effective_default_console(&self) -> Option<Arc<Console>> {
        let registry = self.snapshot().await;
        if let Some(console) = registry.get_active_console() {
            return Some(console.clone());
        }

        registry
            .list_consoles()
            .first()
            .and_then(|name| registry.get_console(name))
            .cloned()
    }
}

fn is_console_file(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("toml")
}
