//! Directory scanning.

use crate::candidate::Candidate;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("None of the target directories exist: {}", format_paths(.0))]
    NoValidRoots(Vec<PathBuf>),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Collects regular files under a set of roots.
#[derive(Debug, Clone)]
pub struct Scanner {
    roots: Vec<PathBuf>,
    recursive: bool,
    extensions: Option<HashSet<String>>,
}

impl Scanner {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            recursive: false,
            extensions: None,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Restricts the scan to these extensions, compared case-insensitively.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: HashSet<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self.extensions = (!set.is_empty()).then_some(set);
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        match &self.extensions {
            None => true,
            Some(allowed) => path
                .extension()
                .is_some_and(|e| allowed.contains(&e.to_string_lossy().to_lowercase())),
        }
    }

    /// Snapshots every matching file, sorted by path.
    ///
    /// Missing roots are logged and skipped; the scan fails only if none exist.
    pub fn scan(&self) -> Result<Vec<Candidate>, ScanError> {
        let existing: Vec<&PathBuf> = self
            .roots
            .iter()
            .filter(|root| {
                let ok = root.is_dir();
                if !ok {
                    tracing::warn!("target directory not found: {}", root.display());
                }
                ok
            })
            .collect();
        if existing.is_empty() {
            return Err(ScanError::NoValidRoots(self.roots.clone()));
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for root in existing {
            for entry in WalkDir::new(root).min_depth(1).max_depth(max_depth) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!("skipping unreadable entry: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !self.accepts(entry.path()) {
                    continue;
                }
                if !seen.insert(entry.path().to_path_buf()) {
                    continue;
                }
                match Candidate::from_path(entry.path()) {
                    Ok(candidate) => candidates.push(candidate),
                    Err(e) => tracing::warn!("cannot stat {}: {}", entry.path().display(), e),
                }
            }
        }

        candidates.sort_by(|a, b| a.path().cmp(b.path()));
        tracing::debug!("scanned {} files", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.PNG"), "x").unwrap();
        fs::write(temp.path().join("a.txt"), "x").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/c.png"), "x").unwrap();
        temp
    }

    fn names(candidates: &[Candidate]) -> Vec<String> {
        candidates.iter().map(Candidate::file_name).collect()
    }

    #[test]
    fn test_flat_scan_is_sorted_and_skips_dirs() {
        let temp = setup();
        let found = Scanner::new(vec![temp.path().to_path_buf()]).scan().unwrap();
        assert_eq!(names(&found), vec!["a.txt", "b.PNG"]);
    }

    #[test]
    fn test_recursive_with_extensions() {
        let temp = setup();
        let found = Scanner::new(vec![temp.path().to_path_buf()])
            .recursive(true)
            .with_extensions([".png"])
            .scan()
            .unwrap();
        assert_eq!(names(&found), vec!["b.PNG", "c.png"]);
    }

    #[test]
    fn test_overlapping_roots_are_deduplicated() {
        let temp = setup();
        let found = Scanner::new(vec![temp.path().to_path_buf(), temp.path().join("sub")])
            .recursive(true)
            .scan()
            .unwrap();
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn test_missing_roots() {
        let temp = setup();
        let missing = temp.path().join("nope");
        assert!(matches!(
            Scanner::new(vec![missing.clone()]).scan(),
            Err(ScanError::NoValidRoots(_))
        ));
        let found = Scanner::new(vec![missing, temp.path().to_path_buf()]).scan().unwrap();
        assert_eq!(found.len(), 2);
    }
}
