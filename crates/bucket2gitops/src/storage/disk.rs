use std::io;
use std::path::Path;

/// Bytes available to unprivileged writers on the filesystem holding `path`.
/// A path that does not exist yet is measured at its nearest existing ancestor.
pub fn available_space(path: &Path) -> io::Result<u64> {
    let existing = path
        .ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .unwrap_or_else(|| Path::new("."));
    fs4::available_space(existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_available_space_of_existing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(available_space(dir.path()).unwrap() > 0);
    }

    #[test]
    fn test_missing_path_uses_ancestor() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("not/yet/created");
        assert!(available_space(&missing).unwrap() > 0);
    }

    #[test]
    fn test_relative_missing_path_measures_working_directory() {
        assert!(available_space(Path::new("no-such-output-dir/nested")).is_ok());
    }
}
