use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::cache::{Cache, CachedError};
use crate::codegen::InstructionMap;
use crate::compiler::{CompileResult, Compiler, Environment};
use crate::symbol::SymbolTable;
use crate::utils::normalise_path;

/// Name of the project description file inside the project root.
pub const PROJECT_FILE: &str = "project.json";

/// Configuration of a project, persisted as JSON in the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Display name of the project.
    pub name: String,
    /// Source directory, relative to the project root.
    pub source_dir: PathBuf,
    /// Cache file, relative to the project root.
    pub cache_file: PathBuf,
    /// How often the background flusher checks for unsaved changes.
    pub flush_interval_secs: u64,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "untitled".to_string(),
            source_dir: PathBuf::from("scripts"),
            cache_file: PathBuf::from("project.cache"),
            flush_interval_secs: 5,
        }
    }
}

impl ProjectConfig {
    /// Load the configuration, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => config,
                Err(err) => {
                    warn!("failed to parse {}: {}", path.display(), err);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("creating project file {}", path.display()))?;
        serde_json::to_writer_pretty(file, self).context("writing project configuration")?;
        Ok(())
    }
}

/// An editor-hosted project: the compiler, the global symbol table and the
/// cache, plus a background flusher persisting the cache when it is dirty.
///
/// Compilation always runs on the caller's thread; the cache mutex only
/// exists so the flusher can serialize a consistent snapshot.
pub struct Project {
    root: PathBuf,
    config: ProjectConfig,
    compiler: Compiler,
    symbols: SymbolTable,
    cache: Arc<Mutex<Cache>>,
    flusher: Option<CacheFlusher>,
}

impl Project {
    /// Open a project rooted at `root`: load the configuration and cache,
    /// register the environment, diff the sources and start the flusher.
    pub fn open(
        root: impl Into<PathBuf>,
        environment: &Environment,
        instruction_map: InstructionMap,
    ) -> Result<Self> {
        let root = root.into();
        let config = ProjectConfig::load_or_default(&root.join(PROJECT_FILE));
        info!("opening project '{}' at {}", config.name, root.display());
        let mut symbols = SymbolTable::new();
        environment.register_into(&mut symbols)?;
        let compiler = Compiler::new(instruction_map);
        let cache_path = root.join(&config.cache_file);
        let cache = Cache::load_or_create(&cache_path).unwrap_or_else(|err| {
            warn!("failed to load the project cache, starting fresh: {}", err);
            Cache::new()
        });
        let mut project = Self {
            root,
            config,
            compiler,
            symbols,
            cache: Arc::new(Mutex::new(cache)),
            flusher: None,
        };
        project.diff()?;
        project.flusher = Some(CacheFlusher::start(
            project.cache.clone(),
            cache_path,
            Duration::from_secs(project.config.flush_interval_secs),
        ));
        Ok(project)
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.config.source_dir)
    }

    fn cache_path(&self) -> PathBuf {
        self.root.join(&self.config.cache_file)
    }

    /// Shared handle to the cache; the flusher holds the other reference.
    pub fn cache(&self) -> Arc<Mutex<Cache>> {
        self.cache.clone()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Diff the cache against the source directory, recompiling whatever
    /// changed on disk. Returns whether anything changed.
    pub fn diff(&mut self) -> Result<bool> {
        let source_dir = self.source_dir();
        let mut cache = lock_cache(&self.cache)?;
        cache.diff(&self.compiler, &mut self.symbols, &source_dir)
    }

    /// Recompile a file from its current bytes on disk.
    pub fn recompile(&mut self, path: &Path) -> Result<CompileResult> {
        let data =
            fs::read(path).with_context(|| format!("reading source file {}", path.display()))?;
        self.recompile_with(path, &data)
    }

    /// Recompile a file from the given buffer, fanning out to dependents.
    pub fn recompile_with(&mut self, path: &Path, data: &[u8]) -> Result<CompileResult> {
        let source_dir = self.source_dir();
        let mut cache = lock_cache(&self.cache)?;
        Ok(cache.recompile(&self.compiler, &mut self.symbols, &source_dir, path, data))
    }

    /// Compile a candidate buffer for preview without touching the cache.
    pub fn recompile_non_persistent(&mut self, path: &Path, data: &[u8]) -> Result<CompileResult> {
        let source_dir = self.source_dir();
        let cache = lock_cache(&self.cache)?;
        Ok(cache.recompile_non_persistent(
            &self.compiler,
            &mut self.symbols,
            &source_dir,
            path,
            data,
        ))
    }

    /// The remembered errors of a file, for the editor to decorate.
    pub fn errors_for(&self, path: &Path) -> Result<Vec<CachedError>> {
        let key = normalise_path(&self.source_dir(), path);
        let cache = lock_cache(&self.cache)?;
        Ok(cache.errors_for(&key))
    }

    /// Persist the cache immediately and clear the dirty flag.
    pub fn save_cache(&self) -> Result<()> {
        let mut cache = lock_cache(&self.cache)?;
        cache.save(&self.cache_path())?;
        cache.clear_dirty();
        Ok(())
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.root.join(PROJECT_FILE))
    }

    /// Stop the flusher and write out any unsaved cache state.
    pub fn close(mut self) -> Result<()> {
        if let Some(flusher) = self.flusher.take() {
            flusher.stop();
        }
        self.save_cache()
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        if let Some(flusher) = self.flusher.take() {
            flusher.stop();
        }
    }
}

fn lock_cache(cache: &Arc<Mutex<Cache>>) -> Result<MutexGuard<'_, Cache>> {
    cache
        .lock()
        .map_err(|_| anyhow!("the project cache lock is poisoned"))
}

/// Periodic background task persisting the cache while it is dirty.
///
/// Wakes on a fixed interval, checks the dirty flag under the cache mutex
/// and delegates to [`Cache::save`]. Stopped through a channel message so
/// shutdown never waits for a full interval's worth of work.
struct CacheFlusher {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl CacheFlusher {
    fn start(cache: Arc<Mutex<Cache>>, path: PathBuf, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let mut cache = match cache.lock() {
                        Ok(cache) => cache,
                        Err(_) => {
                            error!("the cache lock is poisoned, stopping the flusher");
                            return;
                        }
                    };
                    if !cache.is_dirty() {
                        continue;
                    }
                    match cache.save(&path) {
                        Ok(()) => cache.clear_dirty(),
                        Err(err) => error!("failed to flush the project cache: {}", err),
                    }
                }
                _ => return,
            }
        });
        Self { stop_tx, handle }
    }

    fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.handle.join();
    }
}
