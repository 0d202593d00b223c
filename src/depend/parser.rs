//! Dependency parser & cache (component F).
//!
//! Each script is invoked in a sandboxed "metadata" mode (verb `depend`) that has no
//! side effects; its relation-declaring primitives (`need`, `use`, `want`, `after`,
//! `before`, `provide`, `keyword`) are expected to each print one line of the form
//! `<type> <peer> [peer...]` to stdout. The [`MetadataProvider`] trait is the seam
//! that makes this swappable — tests supply an in-memory fixture instead of spawning
//! real scripts.

use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::Path,
    process::Command,
    time::SystemTime,
};

use tracing::{debug, trace, warn};

use crate::{constants::VERB_DEPEND, error::RcError, paths::Paths, resolver::Resolver};

use super::{DependencyRecord, DependencyTree, RelationType};

/// Produces the raw `type peer...` lines a script's `depend` invocation declares.
pub trait MetadataProvider: Send + Sync {
    /// Invokes `service` (whose resolved script is `script`) in metadata mode and
    /// returns its declared relation lines.
    fn collect_relations(&self, service: &str, script: &Path) -> Result<Vec<String>, RcError>;
}

/// Default [`MetadataProvider`]: spawns `script depend` and captures stdout.
///
/// This is a simplification of the historical "shell-sourced primitives writing to a
/// collecting pipe" mechanism that keeps the sandboxing contract — `depend` has no
/// side effects — without requiring a custom file-descriptor protocol; see DESIGN.md
/// for the tradeoff.
pub struct ScriptMetadataProvider;

impl MetadataProvider for ScriptMetadataProvider {
    fn collect_relations(&self, service: &str, script: &Path) -> Result<Vec<String>, RcError> {
        let output = Command::new(script).arg(VERB_DEPEND).output().map_err(|e| {
            RcError::DependencyParseError {
                service: service.to_string(),
                reason: format!("failed to spawn '{}': {e}", script.display()),
            }
        })?;

        if !output.status.success() {
            return Err(RcError::DependencyParseError {
                service: service.to_string(),
                reason: format!("depend exited with status {:?}", output.status.code()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }
}

/// Parses and caches the full dependency tree for an init-script directory.
pub struct DependencyParser<'p> {
    paths: &'p Paths,
    provider: Box<dyn MetadataProvider>,
}

impl<'p> DependencyParser<'p> {
    /// Builds a parser using the default, script-spawning provider.
    pub fn new(paths: &'p Paths) -> Self {
        DependencyParser {
            paths,
            provider: Box::new(ScriptMetadataProvider),
        }
    }

    /// Builds a parser with an explicit [`MetadataProvider`], e.g. a test fixture.
    pub fn with_provider(paths: &'p Paths, provider: Box<dyn MetadataProvider>) -> Self {
        DependencyParser { paths, provider }
    }

    /// Whether the cache is stale: any script (or the init directory itself) has a
    /// newer mtime than the cache file.
    pub fn is_stale(&self) -> Result<bool, RcError> {
        let cache_mtime = match fs::metadata(&self.paths.deptree_cache).and_then(|m| m.modified())
        {
            Ok(mtime) => mtime,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(io_err(&self.paths.deptree_cache, e)),
        };

        let init_dir_mtime = dir_mtime(&self.paths.init_dir)?;
        if init_dir_mtime > Some(cache_mtime) {
            return Ok(true);
        }

        for name in list_scripts(&self.paths.init_dir)? {
            let script_mtime = dir_mtime(&self.paths.script_path(&name))?;
            if script_mtime > Some(cache_mtime) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Rebuilds the cache from the init directory, unless it is fresh and `force`
    /// is false. Returns whether a rebuild actually happened.
    pub fn update(&self, force: bool) -> Result<bool, RcError> {
        if !force && !self.is_stale()? {
            trace!("dependency cache is fresh, skipping rebuild");
            return Ok(false);
        }

        let resolver = Resolver::new(self.paths);
        let mut records: HashMap<String, DependencyRecord> = HashMap::new();

        for name in list_scripts(&self.paths.init_dir)? {
            let Some(script) = resolver.resolve(&name) else {
                continue;
            };

            let lines = self.provider.collect_relations(&name, &script)?;
            let mut record = DependencyRecord::default();
            for line in lines {
                let mut parts = line.split_whitespace();
                let Some(type_token) = parts.next() else {
                    continue;
                };
                let Ok(relation) = type_token.parse::<RelationType>() else {
                    warn!(service = %name, token = type_token, "ignoring unknown relation type");
                    continue;
                };
                for peer in parts {
                    record.push(relation, peer.to_string());
                }
            }
            records.insert(name, record);
        }

        let providers = resolve_providers(&records);
        let mut tree = DependencyTree {
            records,
            providers,
            fingerprint: String::new(),
        };
        tree.stamp_fingerprint();

        self.write_cache(&tree)?;
        debug!(services = tree.records.len(), "rebuilt dependency cache");
        Ok(true)
    }

    /// Loads the cached tree, rebuilding first if it is stale. Also rebuilds if the
    /// on-disk cache's fingerprint no longer matches its own records, which catches a
    /// truncated or hand-edited cache file that a pure mtime check would miss.
    pub fn load(&self) -> Result<DependencyTree, RcError> {
        self.update(false)?;
        let tree = self.read_cache()?;
        if tree.is_intact() {
            return Ok(tree);
        }

        warn!("dependency cache fingerprint mismatch, forcing rebuild");
        self.update(true)?;
        self.read_cache()
    }

    fn read_cache(&self) -> Result<DependencyTree, RcError> {
        let content = fs::read_to_string(&self.paths.deptree_cache)
            .map_err(|e| io_err(&self.paths.deptree_cache, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_cache(&self, tree: &DependencyTree) -> Result<(), RcError> {
        if let Some(parent) = self.paths.deptree_cache.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let encoded = serde_json::to_string(tree)?;
        let tmp_path = self.paths.deptree_cache.with_extension("tmp");
        fs::write(&tmp_path, encoded).map_err(|e| io_err(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.paths.deptree_cache)
            .map_err(|e| io_err(&self.paths.deptree_cache, e))?;
        Ok(())
    }
}

/// Builds the virtual -> providers map from each record's `provide` relations,
/// preserving declaration order and leaving the choice among multiple providers to
/// the graph/ordering stage.
fn resolve_providers(records: &HashMap<String, DependencyRecord>) -> HashMap<String, Vec<String>> {
    let mut providers: HashMap<String, Vec<String>> = HashMap::new();
    let mut names: Vec<&String> = records.keys().collect();
    names.sort();
    for name in names {
        for virtual_name in &records[name].provide {
            providers
                .entry(virtual_name.clone())
                .or_default()
                .push(name.clone());
        }
    }
    providers
}

fn list_scripts(init_dir: &Path) -> Result<Vec<String>, RcError> {
    let entries = match fs::read_dir(init_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(init_dir, e)),
    };
    Ok(entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect())
}

fn dir_mtime(path: &Path) -> Result<Option<SystemTime>, RcError> {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(mtime) => Ok(Some(mtime)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path, e)),
    }
}

fn io_err(path: &Path, source: std::io::Error) -> RcError {
    RcError::StateStoreError(crate::error::StateStoreError::MarkerIo {
        path: path.display().to_string(),
        source,
    })
}
