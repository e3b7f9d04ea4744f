//! Append-merge JSON object files with atomic rewrites
// src/store.rs
use crate::constants;
use anyhow::{Context, Result, bail};
use log::debug;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Insertion-ordered contents of a store file
pub type Entries = Map<String, Value>;

/// A JSON object on disk mapping ids to values.
///
/// Single writer only: callers sequence access to one file.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    path: PathBuf,
}

impl ObjectStore {
    /// Open a store, creating an empty object (and parent directories) if absent
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into() };
        store.ensure()?;
        Ok(store)
    }

    /// Open a store that must already exist
    pub fn open_existing(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            bail!("store not found: {}", path.display());
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }
        self.save(&Entries::new())
    }

    /// Read the whole object. A zero-byte file counts as empty.
    pub fn load(&self) -> Result<Entries> {
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read store: {}", self.path.display()))?;

        if data.trim().is_empty() {
            return Ok(Entries::new());
        }

        let value: Value = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse store: {}", self.path.display()))?;

        match value {
            Value::Object(entries) => Ok(entries),
            other => bail!(
                "store {} holds a JSON {} instead of an object",
                self.path.display(),
                json_kind(&other)
            ),
        }
    }

    /// Replace the file contents atomically (temp file, fsync, rename)
    pub fn save(&self, entries: &Entries) -> Result<()> {
        let temp_path = constants::temp_path(&self.path);

        let mut json = serde_json::to_string_pretty(entries)
            .context("Failed to serialize store")?;
        json.push('\n');

        {
            let mut file = fs::File::create(&temp_path)
                .with_context(|| format!("Failed to create temp store: {}", temp_path.display()))?;
            file.write_all(json.as_bytes())
                .with_context(|| format!("Failed to write temp store: {}", temp_path.display()))?;
            file.sync_all()
                .with_context(|| format!("Failed to sync temp store: {}", temp_path.display()))?;
        }

        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to rename store: {}", self.path.display()))?;

        Ok(())
    }

    /// Add records whose ids are not present yet; returns how many were written.
    ///
    /// Existing entries keep their value and position. Within one call the
    /// first record for an id wins. The file is untouched when nothing is new.
    pub fn merge<I>(&self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut entries = self.load()?;
        let mut written = 0usize;

        for (id, value) in records {
            if entries.contains_key(&id) {
                continue;
            }
            entries.insert(id, value);
            written += 1;
        }

        if written > 0 {
            self.save(&entries)?;
        }

        debug!(
            "store merge: +{} into {} (total {})",
            written,
            self.path.display(),
            entries.len()
        );

        Ok(written)
    }

    /// Remove the given ids; returns how many were present
    pub fn remove<'a, I>(&self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut entries = self.load()?;
        let removed = remove_keys(&mut entries, ids);
        if removed > 0 {
            self.save(&entries)?;
        }
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.load()?.contains_key(id))
    }
}

/// Merge `records` into the store at `path`, creating it if needed
pub fn merge(path: impl Into<PathBuf>, records: Vec<(String, Value)>) -> Result<usize> {
    ObjectStore::open(path)?.merge(records)
}

/// Remove keys from an in-memory object, keeping the order of the rest
pub(crate) fn remove_keys<'a, I>(entries: &mut Entries, ids: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    ids.into_iter()
        .filter(|id| entries.shift_remove(*id).is_some())
        .count()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
