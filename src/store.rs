use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::registry::KnownFileRegistry;

/// Preference key holding the `$`-joined known file list.
pub const FILES_KEY: &str = "files";

/// Persisted state the ingestion pipeline loads at startup and rewrites
/// after every batch.
pub trait PreferenceStore {
    fn load(&self) -> Result<KnownFileRegistry>;
    fn save(&self, registry: &KnownFileRegistry) -> Result<()>;
}

impl<T: PreferenceStore + ?Sized> PreferenceStore for &T {
    fn load(&self) -> Result<KnownFileRegistry> {
        (**self).load()
    }

    fn save(&self, registry: &KnownFileRegistry) -> Result<()> {
        (**self).save(registry)
    }
}

/// Key-value preferences kept as a flat JSON object of strings.
///
/// Keys other than [`FILES_KEY`] are carried through untouched on save. A
/// file that is not a JSON object is moved to `<path>.bak` before being
/// replaced.
#[derive(Debug, Clone)]
pub struct JsonPreferences {
    path: PathBuf,
}

impl JsonPreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/swatchpick/preferences.json`
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir().ok_or_else(|| Error::Store {
            path: PathBuf::from("~"),
            message: "could not determine the user configuration directory".into(),
        })?;
        Ok(Self::new(dir.join("swatchpick").join("preferences.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(Error::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(self.store_error("expected a JSON object")),
            Err(e) => Err(self.store_error(format!("failed to parse: {e}"))),
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }

    fn store_error(&self, message: impl Into<String>) -> Error {
        Error::Store {
            path: self.path.clone(),
            message: message.into(),
        }
    }
}

impl PreferenceStore for JsonPreferences {
    fn load(&self) -> Result<KnownFileRegistry> {
        let map = self.read_map()?;
        let files = map.get(FILES_KEY).and_then(Value::as_str).unwrap_or_default();
        let registry = KnownFileRegistry::deserialize(files);
        tracing::debug!(path = %self.path.display(), known = registry.len(), "loaded preferences");
        Ok(registry)
    }

    fn save(&self, registry: &KnownFileRegistry) -> Result<()> {
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(Error::Store { message, .. }) => {
                let backup = self.backup_path();
                tracing::warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    %message,
                    "replacing unreadable preferences"
                );
                fs::rename(&self.path, &backup).map_err(|source| Error::Io {
                    path: backup.clone(),
                    source,
                })?;
                Map::new()
            }
            Err(error) => return Err(error),
        };
        map.insert(FILES_KEY.to_owned(), Value::String(registry.serialize()));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|e| self.store_error(format!("failed to serialize: {e}")))?;
        fs::write(&self.path, content).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), known = registry.len(), "saved preferences");
        Ok(())
    }
}

/// In-memory store holding the raw `files` value; used when nothing should
/// touch disk.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    files: RefCell<String>,
}

impl MemoryPreferences {
    pub fn new(files: impl Into<String>) -> Self {
        Self {
            files: RefCell::new(files.into()),
        }
    }

    /// The stored `files` value.
    pub fn files(&self) -> String {
        self.files.borrow().clone()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self) -> Result<KnownFileRegistry> {
        Ok(KnownFileRegistry::deserialize(&self.files.borrow()))
    }

    fn save(&self, registry: &KnownFileRegistry) -> Result<()> {
        *self.files.borrow_mut() = registry.serialize();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_empty_registry() {
        let dir = TempDir::new().unwrap();
        let store = JsonPreferences::new(dir.path().join("prefs.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonPreferences::new(dir.path().join("nested").join("prefs.json"));

        let mut registry = KnownFileRegistry::new();
        registry.add_all(["/pics/a.png", "/pics/b.jpg"]);
        store.save(&registry).unwrap();

        assert_eq!(store.load().unwrap(), registry);
        let raw = fs::read_to_string(store.path()).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[FILES_KEY], "/pics/a.png$/pics/b.jpg");
    }

    #[test]
    fn save_preserves_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, r#"{"theme": "dark", "files": "/old.png"}"#).unwrap();
        let store = JsonPreferences::new(&path);

        let mut registry = store.load().unwrap();
        assert!(registry.contains("/old.png"));
        registry.add("/new.png");
        store.save(&registry).unwrap();

        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["theme"], "dark");
        assert_eq!(value[FILES_KEY], "/new.png$/old.png");
    }

    #[test]
    fn malformed_file_is_store_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "[1, 2").unwrap();
        let result = JsonPreferences::new(&path).load();
        assert!(matches!(result, Err(Error::Store { .. })));
    }

    #[test]
    fn unreadable_file_is_backed_up_on_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonPreferences::new(&path);
        assert!(store.load().is_err());

        let mut registry = KnownFileRegistry::new();
        registry.add("/pics/a.png");
        store.save(&registry).unwrap();

        assert_eq!(store.load().unwrap(), registry);
        assert_eq!(fs::read_to_string(store.backup_path()).unwrap(), "{not json");
        assert_eq!(store.backup_path(), dir.path().join("prefs.json.bak"));
    }

    #[test]
    fn non_object_file_is_replaced_on_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "[1, 2]").unwrap();
        let store = JsonPreferences::new(&path);

        store.save(&KnownFileRegistry::new()).unwrap();

        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[FILES_KEY], "");
        assert!(store.backup_path().exists());
    }

    #[test]
    fn memory_store_keeps_serialized_form() {
        let store = MemoryPreferences::new("/a.png");
        let mut registry = store.load().unwrap();
        registry.add("/b.png");
        (&store).save(&registry).unwrap();
        assert_eq!(store.files(), "/a.png$/b.png");
    }
}
