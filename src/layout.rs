//! On-disk layout of a tracking root: shard directory, archive, ledgers
use crate::constants;
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

/// Paths derived from a store root directory
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the active and final directories if missing
    pub fn init(&self) -> Result<()> {
        for dir in [self.active_dir(), self.final_dir()] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn active_dir(&self) -> PathBuf {
        self.root.join(constants::ACTIVE_DIR)
    }

    pub fn final_dir(&self) -> PathBuf {
        self.root.join(constants::FINAL_DIR)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.active_dir().join(constants::LEDGER_FILE)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.final_dir().join(constants::ARCHIVE_FILE)
    }

    pub fn pending_path(&self) -> PathBuf {
        self.final_dir().join(constants::PENDING_FILE)
    }

    pub fn dropped_path(&self) -> PathBuf {
        self.final_dir().join(constants::DROPPED_FILE)
    }

    /// Shard path for a logical store name, after validating the name
    pub fn shard_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(constants::shard_path(self.active_dir(), name))
    }

    /// Leftover temp files from interrupted writes, without deleting anything
    pub fn clean_preview(&self) -> Result<CleanPreview> {
        let mut preview = CleanPreview::default();

        for dir in [self.active_dir(), self.final_dir()] {
            if !dir.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(&dir)
                .with_context(|| format!("Failed to read directory: {}", dir.display()))?
            {
                let entry = entry?;
                let path = entry.path();
                let is_temp = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(constants::TEMP_SUFFIX));
                if !is_temp || !path.is_file() {
                    continue;
                }
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                preview.total_size += size;
                preview.files.push(TempFile { path, size });
            }
        }

        preview.files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(preview)
    }

    /// Delete every file listed by `clean_preview`
    pub fn clean(&self) -> Result<CleanResult> {
        let preview = self.clean_preview()?;
        let mut result = CleanResult::default();

        for file in preview.files {
            match std::fs::remove_file(&file.path) {
                Ok(()) => {
                    result.files_removed += 1;
                    result.bytes_freed += file.size;
                }
                Err(e) => result
                    .errors
                    .push(format!("{}: {}", file.path.display(), e)),
            }
        }

        Ok(result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempFile {
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CleanPreview {
    pub files: Vec<TempFile>,
    pub total_size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CleanResult {
    pub files_removed: usize,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
}

/// Store names become file names next to the duplicate ledger, so keep them plain
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("store name is empty");
    }
    if name.starts_with('.') {
        bail!("store name {:?} must not start with '.'", name);
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        bail!("store name {:?} contains invalid character {:?}", name, c);
    }
    if constants::shard_filename(name) == constants::LEDGER_FILE {
        bail!("store name {:?} is reserved for the duplicate ledger", name);
    }
    if name.ends_with(constants::TEMP_SUFFIX) {
        bail!("store name {:?} must not end with {}", name, constants::TEMP_SUFFIX);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = StoreLayout::new("/data");
        assert_eq!(layout.active_dir(), PathBuf::from("/data/active"));
        assert_eq!(layout.ledger_path(), PathBuf::from("/data/active/duplicates.json"));
        assert_eq!(layout.archive_path(), PathBuf::from("/data/final/archive.json"));
        assert_eq!(layout.pending_path(), PathBuf::from("/data/final/pending.json"));
        assert_eq!(layout.dropped_path(), PathBuf::from("/data/final/dropped.json"));
        assert_eq!(
            layout.shard_path("IPhone7s").unwrap(),
            PathBuf::from("/data/active/IPhone7s.json")
        );
    }

    #[test]
    fn test_clean_removes_only_temp_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let layout = StoreLayout::new(tmp.path());
        layout.init().unwrap();
        std::fs::write(layout.active_dir().join("a.json"), "{}").unwrap();
        std::fs::write(layout.active_dir().join("a.json.tmp"), "{\"x\"").unwrap();
        std::fs::write(layout.final_dir().join("archive.json.tmp"), "").unwrap();

        let preview = layout.clean_preview().unwrap();
        assert_eq!(preview.files.len(), 2);
        assert_eq!(preview.total_size, 4);

        let result = layout.clean().unwrap();
        assert_eq!(result.files_removed, 2);
        assert!(result.errors.is_empty());
        assert!(layout.active_dir().join("a.json").exists());
        assert!(layout.clean_preview().unwrap().files.is_empty());
    }

    #[test]
    fn test_rejects_bad_names() {
        for name in ["", ".hidden", "a/b", "..", "has space", "duplicates", "x.tmp"] {
            assert!(validate_name(name).is_err(), "accepted {:?}", name);
        }
        for name in ["IPhone7", "iphone_se", "cat-9355", "v1.2"] {
            assert!(validate_name(name).is_ok(), "rejected {:?}", name);
        }
    }
}
