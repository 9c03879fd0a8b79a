mod io;
mod types;

pub use io::{CacheReader, CacheWriter};
pub use types::{CachedError, CachedFile};

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::compiler::{CompileInput, CompileResult, Compiler};
use crate::deps::DependencyGraph;
use crate::symbol::{ScriptInfo, SymbolTable};
use crate::utils::{calculate_crc32, normalise_path};

/// The project cache: per-file compilation state, the declaration index and
/// the dependency graph, orchestrating incremental recompilation.
///
/// Invariants held after every operation:
/// - every script of every cached file is indexed in `files_by_declaration`,
/// - the dependency graph's edge sets stay mutually transposed,
/// - a file's stored CRC matches the bytes last handed to the compiler.
#[derive(Debug, Default)]
pub struct Cache {
    files_by_path: BTreeMap<String, CachedFile>,
    files_by_declaration: BTreeMap<String, String>,
    dependencies: DependencyGraph<String>,
    dirty: bool,
    /// How often each file has been recompiled this session.
    recompile_counts: HashMap<String, u32>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a cache from disk or create an empty one if the file is absent.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("loading project cache from {}", path.display());
            let file = fs::File::open(path)
                .with_context(|| format!("opening cache file {}", path.display()))?;
            let mut cache = Self::new();
            cache.read(file)?;
            info!(
                "loaded project cache with {} files and {} dependency nodes",
                cache.files_by_path.len(),
                cache.dependencies.size()
            );
            Ok(cache)
        } else {
            info!("creating new project cache");
            Ok(Self::new())
        }
    }

    /// Persist the cache, writing to a temporary sibling first so a crash
    /// mid-write never corrupts the previous cache.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp_path = path.with_extension("tmp");
        let file = fs::File::create(&tmp_path)
            .with_context(|| format!("creating cache file {}", tmp_path.display()))?;
        self.write(file)?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("replacing cache file {}", path.display()))?;
        info!(
            "saved project cache with {} files to {}",
            self.files_by_path.len(),
            path.display()
        );
        Ok(())
    }

    /// Deserialize the cache content from a stream.
    pub fn read<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut reader = CacheReader::new(reader);
        let file_count = reader.read_i32()?;
        for _ in 0..file_count {
            let file = CachedFile::read(&mut reader)?;
            let key = file.full_path();
            for script in &file.scripts {
                self.files_by_declaration
                    .insert(script.full_name(), key.clone());
            }
            self.files_by_path.insert(key, file);
        }
        let node_count = reader.read_i32()?;
        for _ in 0..node_count {
            let key = reader.read_utf()?;
            let dependency_count = reader.read_u16()?;
            if dependency_count == 0 {
                self.dependencies.find_or_create(key.clone());
            }
            for _ in 0..dependency_count {
                let dependency = reader.read_utf()?;
                self.dependencies.add_dependency(key.clone(), dependency);
            }
        }
        Ok(())
    }

    /// Serialize the cache content into a stream.
    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = CacheWriter::new(writer);
        writer.write_i32(self.files_by_path.len() as i32)?;
        for file in self.files_by_path.values() {
            file.write(&mut writer)?;
        }
        writer.write_i32(self.dependencies.size() as i32)?;
        for node in self.dependencies.nodes() {
            writer.write_utf(node.key())?;
            writer.write_u16(node.depends_on().len() as u16)?;
            for dependency in node.depends_on() {
                writer.write_utf(dependency)?;
            }
        }
        Ok(())
    }

    /// Compare the cache against the content of a source directory and
    /// recompile whatever differs. Returns whether anything changed.
    pub fn diff(
        &mut self,
        compiler: &Compiler,
        symbols: &mut SymbolTable,
        source_dir: &Path,
    ) -> Result<bool> {
        info!("diffing project sources in {}", source_dir.display());
        let mut visited = HashSet::new();
        let mut input = CompileInput::new();
        let mut modified = false;
        for entry in WalkDir::new(source_dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let key = normalise_path(source_dir, entry.path());
            visited.insert(key.clone());
            if !self.files_by_path.contains_key(&key) {
                self.files_by_path
                    .insert(key.clone(), CachedFile::from_key(&key));
            }
            let data = fs::read(entry.path())
                .with_context(|| format!("reading source file {}", entry.path().display()))?;
            let crc = calculate_crc32(&data);
            let unchanged = self
                .files_by_path
                .get(&key)
                .map_or(false, |file| file.crc == crc);
            if unchanged {
                debug!("skipping unchanged file {}", key);
                continue;
            }
            self.undeclare_symbols_of(&key, symbols);
            self.clear_cached_file(&key);
            if let Some(file) = self.files_by_path.get_mut(&key) {
                file.crc = crc;
            }
            input.add_source_code(key, data);
            modified = true;
        }
        if !input.is_empty() {
            let result = compiler.compile(symbols, input, Some(&mut self.dependencies));
            self.apply_result(&result);
        }
        let deleted: Vec<String> = self
            .files_by_path
            .keys()
            .filter(|key| !visited.contains(*key))
            .cloned()
            .collect();
        modified |= !deleted.is_empty();
        for key in deleted {
            info!("removing deleted file {} from the cache", key);
            self.undeclare_symbols_of(&key, symbols);
            self.remove_cached_file(&key);
        }
        self.declare_all(symbols);
        if modified {
            self.dirty = true;
        }
        Ok(modified)
    }

    /// Recompile one edited file and fan out to every dependent whose view
    /// of the file's declarations changed.
    pub fn recompile(
        &mut self,
        compiler: &Compiler,
        symbols: &mut SymbolTable,
        source_dir: &Path,
        path: &Path,
        data: &[u8],
    ) -> CompileResult {
        let mut visited = HashSet::new();
        self.recompile_inner(compiler, symbols, source_dir, path, data, &mut visited)
    }

    fn recompile_inner(
        &mut self,
        compiler: &Compiler,
        symbols: &mut SymbolTable,
        source_dir: &Path,
        path: &Path,
        data: &[u8],
        visited: &mut HashSet<String>,
    ) -> CompileResult {
        let key = normalise_path(source_dir, path);
        visited.insert(key.clone());
        *self.recompile_counts.entry(key.clone()).or_insert(0) += 1;
        debug!("recompiling {}", key);
        if !self.files_by_path.contains_key(&key) {
            self.files_by_path
                .insert(key.clone(), CachedFile::from_key(&key));
        }
        let mut previous: HashMap<String, ScriptInfo> = self
            .files_by_path
            .get(&key)
            .map(|file| file.scripts.clone())
            .unwrap_or_default()
            .into_iter()
            .map(|script| (script.full_name(), script))
            .collect();
        self.undeclare_symbols_of(&key, symbols);
        self.clear_cached_file(&key);
        let result = compiler.compile(
            symbols,
            CompileInput::of(key.clone(), data.to_vec()),
            Some(&mut self.dependencies),
        );
        for compiled in &result.scripts {
            self.add_script(&key, compiled.info.clone());
            let full_name = compiled.info.full_name();
            let signature_unchanged = previous
                .get(&full_name)
                .map_or(false, |prev| prev.equal_signature(&compiled.info));
            if signature_unchanged {
                previous.remove(&full_name);
            }
        }
        // what is left in `previous` changed signature or disappeared
        if !previous.is_empty() {
            let mut affected = BTreeSet::new();
            for full_name in previous.keys() {
                if let Some(node) = self.dependencies.find(full_name) {
                    affected.extend(node.used_by().iter().cloned());
                }
            }
            let affected_files: BTreeSet<String> = affected
                .iter()
                .filter_map(|script| self.files_by_declaration.get(script).cloned())
                .collect();
            for file_key in affected_files {
                if visited.contains(&file_key) {
                    continue;
                }
                let file_path = source_dir.join(&file_key);
                if !file_path.exists() {
                    continue;
                }
                match fs::read(&file_path) {
                    Ok(bytes) => {
                        info!(
                            "signature change in {} requires recompiling {}",
                            key, file_key
                        );
                        self.recompile_inner(
                            compiler, symbols, source_dir, &file_path, &bytes, visited,
                        );
                    }
                    Err(err) => {
                        error!(
                            "failed to read '{}' for dependent recompilation: {}",
                            file_key, err
                        );
                    }
                }
            }
        }
        for compile_error in &result.errors {
            if let Some(file) = self.files_by_path.get_mut(&compile_error.key) {
                file.errors.push(CachedError::new(
                    compile_error.range,
                    compile_error.message.clone(),
                ));
            }
        }
        self.declare_symbols_of(&key, symbols);
        if let Some(file) = self.files_by_path.get_mut(&key) {
            file.crc = calculate_crc32(data);
        }
        self.dirty = true;
        result
    }

    /// Compile a candidate buffer without mutating the cache or the graph.
    ///
    /// The file's current declarations are shelved for the duration of the
    /// compilation and restored before returning, whatever the outcome.
    pub fn recompile_non_persistent(
        &self,
        compiler: &Compiler,
        symbols: &mut SymbolTable,
        source_dir: &Path,
        path: &Path,
        data: &[u8],
    ) -> CompileResult {
        let key = normalise_path(source_dir, path);
        let previous: Vec<ScriptInfo> = self
            .files_by_path
            .get(&key)
            .map(|file| file.scripts.clone())
            .unwrap_or_default();
        for script in &previous {
            symbols.undefine_script(&script.trigger, &script.name);
        }
        let result = compiler.compile(symbols, CompileInput::of(key, data.to_vec()), None);
        for compiled in &result.scripts {
            symbols.undefine_script(&compiled.info.trigger, &compiled.info.name);
        }
        for script in previous {
            if let Err(err) = symbols.define_script(script) {
                warn!("failed to restore a shelved declaration: {}", err);
            }
        }
        result
    }

    /// Declare every script of a cached file, skipping ones already known.
    pub fn declare_symbols_of(&self, key: &str, symbols: &mut SymbolTable) {
        let Some(file) = self.files_by_path.get(key) else {
            return;
        };
        for script in &file.scripts {
            if symbols.lookup_script(&script.trigger, &script.name).is_none() {
                // cannot fail: the key was just checked to be free
                let _ = symbols.define_script(script.clone());
            }
        }
    }

    /// Undeclare every script of a cached file and detach its graph nodes.
    fn undeclare_symbols_of(&mut self, key: &str, symbols: &mut SymbolTable) {
        let scripts: Vec<(String, String, String)> = match self.files_by_path.get(key) {
            Some(file) => file
                .scripts
                .iter()
                .map(|s| (s.trigger.clone(), s.name.clone(), s.full_name()))
                .collect(),
            None => return,
        };
        for (trigger, name, full_name) in scripts {
            symbols.undefine_script(&trigger, &name);
            self.dependencies.remove(&full_name);
        }
    }

    fn declare_all(&self, symbols: &mut SymbolTable) {
        let keys: Vec<String> = self.files_by_path.keys().cloned().collect();
        for key in keys {
            self.declare_symbols_of(&key, symbols);
        }
    }

    fn apply_result(&mut self, result: &CompileResult) {
        for compile_error in &result.errors {
            if let Some(file) = self.files_by_path.get_mut(&compile_error.key) {
                file.errors.push(CachedError::new(
                    compile_error.range,
                    compile_error.message.clone(),
                ));
            }
        }
        for compiled in &result.scripts {
            self.add_script(&compiled.key, compiled.info.clone());
        }
    }

    fn add_script(&mut self, key: &str, info: ScriptInfo) {
        self.files_by_declaration
            .insert(info.full_name(), key.to_string());
        if let Some(file) = self.files_by_path.get_mut(key) {
            file.scripts.push(info);
        }
    }

    fn clear_cached_file(&mut self, key: &str) {
        if let Some(file) = self.files_by_path.get_mut(key) {
            for script in &file.scripts {
                self.files_by_declaration.remove(&script.full_name());
            }
            file.scripts.clear();
            file.errors.clear();
        }
    }

    fn remove_cached_file(&mut self, key: &str) {
        if let Some(file) = self.files_by_path.remove(key) {
            for script in &file.scripts {
                self.files_by_declaration.remove(&script.full_name());
            }
        }
    }

    pub fn file(&self, key: &str) -> Option<&CachedFile> {
        self.files_by_path.get(key)
    }

    pub fn files(&self) -> impl Iterator<Item = &CachedFile> {
        self.files_by_path.values()
    }

    pub fn file_count(&self) -> usize {
        self.files_by_path.len()
    }

    /// The key of the file owning a declaration, if any.
    pub fn file_of_declaration(&self, full_name: &str) -> Option<&str> {
        self.files_by_declaration.get(full_name).map(|s| s.as_str())
    }

    pub fn graph(&self) -> &DependencyGraph<String> {
        &self.dependencies
    }

    /// The remembered errors of a file, empty when the file is unknown.
    pub fn errors_for(&self, key: &str) -> Vec<CachedError> {
        self.files_by_path
            .get(key)
            .map(|file| file.errors.clone())
            .unwrap_or_default()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// How many times a file has been recompiled in this session.
    pub fn recompile_count(&self, key: &str) -> u32 {
        self.recompile_counts.get(key).copied().unwrap_or(0)
    }
}
