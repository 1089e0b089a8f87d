//! Explicit command lookup for scheduler backends
//!
//! Backends never read `PATH` themselves. The binary builds a [`Toolchain`]
//! from its environment and hands it to the backend constructors; tests
//! point it at a directory of fake commands instead.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toolchain {
    search_path: Option<OsString>,
}

impl Toolchain {
    /// Use the process `PATH`
    pub fn from_env() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Use an explicit list of directories
    pub fn with_search_path<I, P>(directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let dirs: Vec<PathBuf> = directories.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        Self {
            search_path: std::env::join_paths(dirs).ok(),
        }
    }

    /// Absolute path of an executable `command`, if it can be found
    ///
    /// A command containing a path separator is checked as given.
    pub fn resolve(&self, command: &str) -> Option<PathBuf> {
        let direct = Path::new(command);
        if direct.components().count() > 1 {
            return is_executable(direct).then(|| direct.to_path_buf());
        }

        let search_path = self.search_path.as_ref()?;
        std::env::split_paths(search_path)
            .map(|dir| dir.join(command))
            .find(|candidate| is_executable(candidate))
    }

    /// True if every command in `commands` resolves
    pub fn provides(&self, commands: &[&str]) -> bool {
        commands.iter().all(|command| self.resolve(command).is_some())
    }
}

/// `path` anchored at the current directory when it is relative
///
/// Spawned jobs change directory, so every path handed to them must be absolute.
pub fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_resolve_in_search_path() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_file(first.path(), "qstat", 0o644);
        let expected = write_file(second.path(), "qstat", 0o755);

        let toolchain = Toolchain::with_search_path([first.path(), second.path()]);
        assert_eq!(toolchain.resolve("qstat"), Some(expected));
        assert_eq!(toolchain.resolve("qsub"), None);
        assert!(!toolchain.provides(&["qstat", "qsub"]));
    }

    #[test]
    fn test_resolve_explicit_path() {
        let dir = TempDir::new().unwrap();
        let script = write_file(dir.path(), "run.sh", 0o755);

        let toolchain = Toolchain::default();
        assert_eq!(toolchain.resolve(script.to_str().unwrap()), Some(script));
        assert_eq!(toolchain.resolve("run.sh"), None);
    }

    #[test]
    fn test_absolute_path_anchors_relative_paths() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            absolute_path(Path::new("cases/stage001.01_x")).unwrap(),
            cwd.join("cases/stage001.01_x")
        );
        assert_eq!(absolute_path(Path::new("/tmp/run.sh")).unwrap(), PathBuf::from("/tmp/run.sh"));
    }
}
