//! Repository index persistence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::schema::RepositoryIndexFile;

/// Reads and writes one repository index file.
///
/// Writes go through a sibling temp file and a rename, so a reader sees
/// either the old document or the new one.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or empty file loads as an empty index.
    pub fn load(&self) -> anyhow::Result<RepositoryIndexFile> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(RepositoryIndexFile::new());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read repository index: {}", self.path.display())
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(RepositoryIndexFile::new());
        }

        serde_yaml::from_str(&content).with_context(|| {
            format!("Failed to parse repository index: {}", self.path.display())
        })
    }

    pub fn save(&self, index: &RepositoryIndexFile) -> anyhow::Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;

        let content =
            serde_yaml::to_string(index).context("Failed to serialize repository index")?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repositories.yaml".to_string());
        let tmp_path = dir.join(format!(".{}.tmp.{}", file_name, std::process::id()));

        let written = write_restricted(&tmp_path, content.as_bytes())
            .with_context(|| format!("Failed to write tmp index: {}", tmp_path.display()))
            .and_then(|()| {
                fs::rename(&tmp_path, &self.path).with_context(|| {
                    format!(
                        "Failed to replace repository index: {}",
                        self.path.display()
                    )
                })
            });
        if written.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        written
    }
}

#[cfg(unix)]
fn write_restricted(path: &Path, bytes: &[u8]) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .mode(0o600)
        .open(path)?;
    // mode() is ignored when the file already existed
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_restricted(path: &Path, bytes: &[u8]) -> io::Result<()> {
    fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::schema::RepositoryEntry;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_returns_empty_index() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path().join("repositories.yaml"));

        let index = store.load().unwrap();

        assert!(index.is_empty());
        assert_eq!(index.api_version, "v1");
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path().join("nested").join("repositories.yaml"));

        let mut index = RepositoryIndexFile::new();
        index.upsert(RepositoryEntry::new("influxdata", "https://helm.influxdata.com/"));
        store.save(&index).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_load_propagates_parse_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repositories.yaml");
        std::fs::write(&path, "repositories: [unterminated").unwrap();

        let err = IndexStore::new(path).load().unwrap_err();
        assert!(err.to_string().contains("Failed to parse repository index"));
    }

    #[test]
    fn test_failed_replace_leaves_no_tmp_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repositories.yaml");
        // a directory at the index path makes the rename fail
        std::fs::create_dir_all(&path).unwrap();

        let err = IndexStore::new(path.clone())
            .save(&RepositoryIndexFile::new())
            .unwrap_err();

        assert!(err.to_string().contains("Failed to replace repository index"));
        assert_eq!(leftover_tmp_files(temp.path()), Vec::<String>::new());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_tmp_write_leaves_no_tmp_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repositories.yaml");
        let tmp_path = temp
            .path()
            .join(format!(".repositories.yaml.tmp.{}", std::process::id()));
        // dangling link into a missing directory, so the open fails
        std::os::unix::fs::symlink(temp.path().join("missing").join("index"), &tmp_path)
            .unwrap();

        let err = IndexStore::new(path.clone())
            .save(&RepositoryIndexFile::new())
            .unwrap_err();

        assert!(err.to_string().contains("Failed to write tmp index"));
        assert!(std::fs::symlink_metadata(&tmp_path).is_err());
        assert!(!path.exists());
    }

    fn leftover_tmp_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".tmp."))
            .collect()
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_index_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repositories.yaml");
        IndexStore::new(path.clone())
            .save(&RepositoryIndexFile::new())
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
