//! Service resolver (component B): maps a bare service name to its script path.

use std::path::{Path, PathBuf};

use crate::paths::Paths;

/// Resolves service names to script paths under a [`Paths`] layout.
pub struct Resolver<'p> {
    paths: &'p Paths,
}

impl<'p> Resolver<'p> {
    /// Builds a resolver over `paths`.
    pub fn new(paths: &'p Paths) -> Self {
        Resolver { paths }
    }

    /// Resolves `name` to an absolute script path.
    ///
    /// If `name` is already absolute and names an executable regular file, it is
    /// returned as-is. Otherwise it is looked up directly inside the configured init
    /// directory — no recursion into subdirectories.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let candidate = Path::new(name);
        if candidate.is_absolute() {
            return is_executable_file(candidate).then(|| candidate.to_path_buf());
        }

        if name.contains(std::path::MAIN_SEPARATOR) {
            return None;
        }

        let script = self.paths.script_path(name);
        is_executable_file(&script).then_some(script)
    }

    /// Whether `name` resolves to a real, executable script.
    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}
