use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use chrono::Local;

use super::disk::available_space;
use crate::error::StorageError;
use crate::gitops::GeneratedArtifact;

pub const DEFAULT_MIN_FREE_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_BACKUP_DIR: &str = ".gitops-backups";

type Result<T> = std::result::Result<T, StorageError>;
type SpaceCheck = Box<dyn Fn(&Path) -> io::Result<u64> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileManagerSettings {
    /// Free space that must remain after a write.
    pub min_free_bytes: u64,
    /// Backup directory, relative to the output root.
    pub backup_dir: String,
}

impl Default for FileManagerSettings {
    fn default() -> Self {
        Self {
            min_free_bytes: DEFAULT_MIN_FREE_BYTES,
            backup_dir: DEFAULT_BACKUP_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Created,
    /// Content differed; the previous file was copied to `backup` first.
    Updated { backup: PathBuf },
    Unchanged,
}

/// Writes artifacts below an output root, one atomic rename per file.
pub struct FileManager {
    root: PathBuf,
    settings: FileManagerSettings,
    run_stamp: String,
    written: Vec<PathBuf>,
    space_check: SpaceCheck,
}

impl std::fmt::Debug for FileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileManager")
            .field("root", &self.root)
            .field("settings", &self.settings)
            .field("run_stamp", &self.run_stamp)
            .field("written", &self.written.len())
            .finish()
    }
}

/// `YYYYmmdd_HHMMSS_micros_xxxxxxxx`: sortable by time, unique per run.
fn run_stamp() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", Local::now().format("%Y%m%d_%H%M%S_%6f"), &suffix[..8])
}

impl FileManager {
    pub fn new<P: AsRef<Path>>(root: P, settings: FileManagerSettings) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            settings,
            run_stamp: run_stamp(),
            written: Vec::new(),
            space_check: Box::new(available_space),
        }
    }

    /// Replaces the free-space query, e.g. to simulate a full disk.
    pub fn with_space_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Path) -> io::Result<u64> + Send + Sync + 'static,
    {
        self.space_check = Box::new(check);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths created or updated during this run, in write order.
    pub fn written_paths(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn backup_root(&self) -> PathBuf {
        self.root.join(&self.settings.backup_dir).join(&self.run_stamp)
    }

    pub fn write(&mut self, artifact: &GeneratedArtifact) -> Result<WriteResult> {
        check_relative(&artifact.relative_path)?;
        self.ensure_space(artifact.content.len() as u64)?;

        let target = self.root.join(&artifact.relative_path);
        let result = match read_existing(&target)? {
            Some(existing) if existing == artifact.content => {
                log::debug!("Unchanged: {}", artifact.relative_path.display());
                return Ok(WriteResult::Unchanged);
            }
            Some(_) => {
                let backup = self
                    .backup_if_exists(&artifact.relative_path)?
                    .unwrap_or_else(|| self.backup_root().join(&artifact.relative_path));
                WriteResult::Updated { backup }
            }
            None => WriteResult::Created,
        };

        if let Some(parent) = target.parent() {
            ensure_directory(parent)?;
        }
        atomic_write(&target, &artifact.content)?;

        log::debug!("Wrote {} ({:?})", artifact.relative_path.display(), result);
        self.written.push(target);
        Ok(result)
    }

    /// Copies an existing file into this run's backup directory, keeping its
    /// relative layout. Returns `None` when there is nothing to back up.
    pub fn backup_if_exists(&self, relative: &Path) -> Result<Option<PathBuf>> {
        check_relative(relative)?;
        let source = self.root.join(relative);
        if !source.is_file() {
            return Ok(None);
        }

        let backup = self.backup_root().join(relative);
        if let Some(parent) = backup.parent() {
            ensure_directory(parent)?;
        }
        fs::copy(&source, &backup).map_err(|e| StorageError::Backup {
            path: source.clone(),
            backup: backup.clone(),
            source: e,
        })?;
        log::info!("Backed up {} to {}", source.display(), backup.display());
        Ok(Some(backup))
    }

    fn ensure_space(&self, incoming: u64) -> Result<()> {
        let available = (self.space_check)(&self.root).map_err(|e| StorageError::DiskSpace {
            path: self.root.clone(),
            source: e,
        })?;
        let required = self.settings.min_free_bytes.saturating_add(incoming);
        if available < required {
            return Err(StorageError::InsufficientDiskSpace {
                path: self.root.clone(),
                available,
                required,
            });
        }
        Ok(())
    }
}

/// Only plain relative paths below the output root are accepted.
fn check_relative(path: &Path) -> Result<()> {
    let invalid = |reason: &str| StorageError::InvalidPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if path.as_os_str().is_empty() {
        return Err(invalid("empty path"));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(invalid("parent directory reference")),
            Component::RootDir | Component::Prefix(_) => return Err(invalid("absolute path")),
        }
    }
    Ok(())
}

fn read_existing(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// A temp file that removes itself unless [`TempFile::persist`] succeeds.
struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    fn beside(target: &Path) -> Self {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = target.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()));
        Self { path, armed: true }
    }

    fn write_synced(&self, bytes: &[u8]) -> Result<()> {
        let write = || -> io::Result<()> {
            let mut file = File::create(&self.path)?;
            file.write_all(bytes)?;
            file.flush()?;
            file.sync_all()
        };
        write().map_err(|e| StorageError::WriteFile {
            path: self.path.clone(),
            source: e,
        })
    }

    fn persist(mut self, target: &Path) -> Result<()> {
        fs::rename(&self.path, target).map_err(|e| StorageError::Rename {
            from: self.path.clone(),
            to: target.to_path_buf(),
            source: e,
        })?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn atomic_write(target: &Path, bytes: &[u8]) -> Result<()> {
    let temp = TempFile::beside(target);
    temp.write_synced(bytes)?;
    temp.persist(target)?;
    if let Some(parent) = target.parent() {
        sync_dir(parent)?;
    }
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::OpenOptions::new()
        .read(true)
        .open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| StorageError::SyncDirectory {
            path: dir.to_path_buf(),
            source: e,
        })
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitops::ArtifactKind;
    use tempfile::TempDir;

    fn artifact(path: &str, content: &str) -> GeneratedArtifact {
        GeneratedArtifact {
            relative_path: PathBuf::from(path),
            content: content.as_bytes().to_vec(),
            kind: ArtifactKind::Manifest,
        }
    }

    fn manager(dir: &TempDir) -> FileManager {
        FileManager::new(dir.path(), FileManagerSettings::default())
            .with_space_check(|_| Ok(u64::MAX))
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_create_then_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut fm = manager(&dir);
        let a = artifact("namespaces/app/README.md", "# app\n");

        assert_eq!(fm.write(&a).unwrap(), WriteResult::Created);
        assert_eq!(fm.write(&a).unwrap(), WriteResult::Unchanged);
        assert_eq!(
            fs::read_to_string(dir.path().join("namespaces/app/README.md")).unwrap(),
            "# app\n"
        );
        assert_eq!(fm.written_paths().len(), 1);
        assert!(!dir.path().join(DEFAULT_BACKUP_DIR).exists());
    }

    #[test]
    fn test_update_creates_backup() {
        let dir = TempDir::new().unwrap();
        let mut fm = manager(&dir);
        fm.write(&artifact("a/b.yaml", "old\n")).unwrap();

        let result = fm.write(&artifact("a/b.yaml", "new\n")).unwrap();
        let WriteResult::Updated { backup } = result else {
            panic!("expected update, got {:?}", result);
        };
        assert_eq!(fs::read_to_string(&backup).unwrap(), "old\n");
        assert!(backup.starts_with(dir.path().join(DEFAULT_BACKUP_DIR)));
        assert!(backup.ends_with("a/b.yaml"));
        assert_eq!(
            fs::read_to_string(dir.path().join("a/b.yaml")).unwrap(),
            "new\n"
        );
    }

    #[test]
    fn test_back_to_back_runs_get_distinct_backup_roots() {
        let dir = TempDir::new().unwrap();
        let mut first = manager(&dir);
        first.write(&artifact("a/b.yaml", "v1\n")).unwrap();
        let WriteResult::Updated { backup: first_backup } =
            first.write(&artifact("a/b.yaml", "v2\n")).unwrap()
        else {
            panic!("expected update");
        };

        let mut second = manager(&dir);
        assert_ne!(first.backup_root(), second.backup_root());
        let WriteResult::Updated { backup: second_backup } =
            second.write(&artifact("a/b.yaml", "v3\n")).unwrap()
        else {
            panic!("expected update");
        };

        assert_eq!(fs::read_to_string(&first_backup).unwrap(), "v1\n");
        assert_eq!(fs::read_to_string(&second_backup).unwrap(), "v2\n");
        assert_eq!(entries(&dir.path().join(DEFAULT_BACKUP_DIR)).len(), 2);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let mut fm = manager(&dir);
        fm.write(&artifact("out/x.yaml", "x\n")).unwrap();
        assert_eq!(entries(&dir.path().join("out")), vec!["x.yaml".to_string()]);
    }

    #[test]
    fn test_traversal_rejected_before_touching_disk() {
        let dir = TempDir::new().unwrap();
        let mut fm = manager(&dir);
        let err = fm.write(&artifact("../../etc/passwd", "root\n")).unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath { .. }));
        assert!(entries(dir.path()).is_empty());

        let err = fm.write(&artifact("/etc/passwd", "root\n")).unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath { .. }));
        assert!(fm.written_paths().is_empty());
    }

    #[test]
    fn test_insufficient_space_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut fm = FileManager::new(dir.path(), FileManagerSettings::default())
            .with_space_check(|_| Ok(DEFAULT_MIN_FREE_BYTES - 1));
        let err = fm.write(&artifact("a.yaml", "a")).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, StorageError::InsufficientDiskSpace { .. }));
        assert!(!dir.path().join("a.yaml").exists());
    }

    #[test]
    fn test_backup_if_exists_without_file() {
        let dir = TempDir::new().unwrap();
        let fm = manager(&dir);
        assert_eq!(fm.backup_if_exists(Path::new("missing.yaml")).unwrap(), None);
    }

    #[test]
    fn test_failed_rename_cleans_temp_file() {
        let dir = TempDir::new().unwrap();
        // A directory at the target path makes the rename fail.
        fs::create_dir_all(dir.path().join("blocked.yaml/inner")).unwrap();
        let err = atomic_write(&dir.path().join("blocked.yaml"), b"x").unwrap_err();
        assert!(matches!(err, StorageError::Rename { .. }));
        assert_eq!(entries(dir.path()), vec!["blocked.yaml".to_string()]);
    }
}
