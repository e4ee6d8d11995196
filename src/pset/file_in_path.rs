//! Deferred file references.
//!
//! A `FileInPath` parameter only records a relative (or absolute) file
//! name when the configuration is loaded. It is resolved against a
//! [`SearchPath`] by the component that consumes it, so a missing file
//! fails that component's initialization and nothing else.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use super::ParameterError;

/// Environment variable holding extra search directories (colon separated).
pub const SEARCH_PATH_ENV: &str = "EVPROC_SEARCH_PATH";

/// A file name to be looked up along the search path at consumption time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileInPath {
    name: String,
}

impl FileInPath {
    pub fn new(name: impl Into<String>) -> Self {
        FileInPath { name: name.into() }
    }

    /// The file name exactly as configured.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Resolve the file against `search`.
    ///
    /// Absolute names are used verbatim. Relative names are tried against
    /// every search directory in order, then against the current directory.
    /// The first existing regular file wins.
    pub fn resolve(&self, search: &SearchPath) -> Result<PathBuf, ParameterError> {
        let path = Path::new(&self.name);

        if path.is_absolute() {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            return Err(self.not_found(search));
        }

        for dir in search.dirs() {
            let candidate = dir.join(path);
            if candidate.is_file() {
                log::debug!("Resolved '{}' to {}", self.name, candidate.display());
                return Ok(candidate);
            }
        }

        if path.is_file() {
            return Ok(path.to_path_buf());
        }

        Err(self.not_found(search))
    }

    fn not_found(&self, search: &SearchPath) -> ParameterError {
        ParameterError::FileNotFound {
            file: self.name.clone(),
            searched: search.to_string(),
        }
    }
}

impl fmt::Display for FileInPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Ordered list of directories used to resolve [`FileInPath`] values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    /// An empty search path (only the current directory is consulted).
    pub fn new() -> Self {
        SearchPath { dirs: Vec::new() }
    }

    /// Search path seeded from [`SEARCH_PATH_ENV`].
    pub fn from_env() -> Self {
        let mut search = SearchPath::new();
        if let Ok(value) = env::var(SEARCH_PATH_ENV) {
            for dir in value.split(':').filter(|d| !d.trim().is_empty()) {
                search.push(dir.trim());
            }
        }
        search
    }

    /// Append a directory; duplicates are ignored.
    pub fn push(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.dirs.contains(&dir) {
            self.dirs.push(dir);
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl fmt::Display for SearchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.dirs.iter().map(|d| d.display().to_string()).collect();
        write!(f, "{}", parts.join(":"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_in_search_dir() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::create_dir_all(second.path().join("Geometry/gdml")).unwrap();
        fs::write(second.path().join("Geometry/gdml/ndos.gdml"), "<gdml/>").unwrap();

        let mut search = SearchPath::new();
        search.push(first.path());
        search.push(second.path());

        let file = FileInPath::new("Geometry/gdml/ndos.gdml");
        let resolved = file.resolve(&search).unwrap();
        assert_eq!(resolved, second.path().join("Geometry/gdml/ndos.gdml"));
    }

    #[test]
    fn test_first_match_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(first.path().join("a.txt"), "1").unwrap();
        fs::write(second.path().join("a.txt"), "2").unwrap();

        let mut search = SearchPath::new();
        search.push(first.path());
        search.push(second.path());

        let resolved = FileInPath::new("a.txt").resolve(&search).unwrap();
        assert_eq!(resolved, first.path().join("a.txt"));
    }

    #[test]
    fn test_absolute_path_used_verbatim() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("abs.gdml");
        fs::write(&file, "x").unwrap();

        let fip = FileInPath::new(file.to_string_lossy().to_string());
        assert_eq!(fip.resolve(&SearchPath::new()).unwrap(), file);
    }

    #[test]
    fn test_missing_file_reports_search_path() {
        let dir = TempDir::new().unwrap();
        let mut search = SearchPath::new();
        search.push(dir.path());

        let err = FileInPath::new("nope/missing.gdml").resolve(&search).unwrap_err();
        match err {
            ParameterError::FileNotFound { file, searched } => {
                assert_eq!(file, "nope/missing.gdml");
                assert!(searched.contains(&dir.path().display().to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_push_ignores_duplicates() {
        let mut search = SearchPath::new();
        search.push("/a");
        search.push("/b");
        search.push("/a");
        assert_eq!(search.dirs().len(), 2);
        assert_eq!(search.to_string(), "/a:/b");
    }
}
