use std::collections::BTreeSet;
use std::path::Path;

/// Joins paths in the persisted `files` preference.
pub const SEPARATOR: char = '$';

/// Set of image paths that have been ingested before.
///
/// Paths containing [`SEPARATOR`] are refused so that
/// `deserialize(serialize())` always reproduces the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownFileRegistry {
    paths: BTreeSet<String>,
}

impl KnownFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Add one path. Returns `true` if it was not known yet.
    pub fn add(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if path.is_empty() {
            return false;
        }
        if path.contains(SEPARATOR) {
            tracing::warn!(%path, "not remembering path containing '{SEPARATOR}'");
            return false;
        }
        self.paths.insert(path)
    }

    /// Merge `paths` into the registry, returning how many were new.
    pub fn add_all<I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        paths.into_iter().map(|p| self.add(p)).filter(|&added| added).count()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// `$`-joined form stored under the `files` preference key.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (i, path) in self.paths.iter().enumerate() {
            if i > 0 {
                out.push(SEPARATOR);
            }
            out.push_str(path);
        }
        out
    }

    /// Parse the `$`-joined form, discarding empty segments.
    pub fn deserialize(value: &str) -> Self {
        let mut registry = Self::new();
        registry.add_all(value.split(SEPARATOR).filter(|segment| !segment.is_empty()));
        registry
    }
}

/// Registry key for `path`: made absolute against the working directory.
/// Returns `None` for paths that are not valid UTF-8.
pub fn normalize_path(path: &Path) -> Option<String> {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute.to_str().map(str::to_owned)
}
