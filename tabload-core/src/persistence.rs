//! Atomic file replacement for raw downloads and staged tables.

use std::io;
use std::path::{Path, PathBuf};

/// Path of the scratch file written before the rename.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `data` to a `.tmp` sibling of `path`, then rename it into place.
///
/// Creates parent directories if they don't exist. A failed write leaves the
/// previous contents of `path` untouched and removes the scratch file.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    if let Err(e) = std::fs::write(&tmp, data).and_then(|_| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tmp_path_keeps_extension() {
        let tmp = tmp_path(Path::new("data/staged/iris_transformed.csv"));
        assert_eq!(tmp, PathBuf::from("data/staged/iris_transformed.csv.tmp"));
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("staged").join("out.csv");

        atomic_write(&path, b"a,b\n1,2\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_atomic_write_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        atomic_write(&path, b"old").unwrap();
        atomic_write(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }
}
