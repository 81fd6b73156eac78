//! Idempotent filesystem verbs.
//!
//! Writes are atomic: content goes to a uniquely named temporary file in the
//! destination directory, is synced, gets its mode, and is then renamed over
//! the target. Readers polling the directory (sudo, systemd) never observe a
//! partially written file. Removals treat "not found" as success.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::error::{OperatorError, OperatorResult};

/// Create `path` and any missing parents. Returns `true` if it was created.
pub fn ensure_dir(path: &Path) -> OperatorResult<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(path).map_err(|e| OperatorError::install_io(path, e))?;
    debug!(path = %path.display(), "Directory created");
    Ok(true)
}

/// Atomically replace `path` with `content`, setting `mode` on the new file.
pub fn write_atomic(path: &Path, content: &[u8], mode: u32) -> OperatorResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = temp_sibling(path);
    let result = write_temp(&temp_path, content, mode)
        .and_then(|()| fs::rename(&temp_path, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(OperatorError::install_io(path, e));
    }

    debug!(path = %path.display(), bytes = content.len(), mode = %format!("{:o}", mode), "File written");
    Ok(())
}

/// Atomically copy `src` over `dest`, setting `mode` on the new file.
pub fn copy_atomic(src: &Path, dest: &Path, mode: u32) -> OperatorResult<()> {
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = temp_sibling(dest);
    let result = fs::copy(src, &temp_path)
        .and_then(|_| fs::set_permissions(&temp_path, fs::Permissions::from_mode(mode)))
        .and_then(|()| fs::rename(&temp_path, dest));

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(OperatorError::install_io(dest, e));
    }

    debug!(src = %src.display(), dest = %dest.display(), "File copied");
    Ok(())
}

/// Remove a file. Returns `true` if something was removed.
pub fn remove_file_if_exists(path: &Path) -> OperatorResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "File removed");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(OperatorError::install_io(path, e)),
    }
}

/// Remove a directory tree. Returns `true` if something was removed.
pub fn remove_dir_if_exists(path: &Path) -> OperatorResult<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Directory removed");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(OperatorError::install_io(path, e)),
    }
}

/// Random suffix so a pre-created symlink cannot be used as the temp file.
fn temp_sibling(path: &Path) -> PathBuf {
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        Uuid::new_v4().simple()
    );
    path.with_file_name(temp_name)
}

fn write_temp(temp_path: &Path, content: &[u8], mode: u32) -> io::Result<()> {
    // create_new gives O_EXCL
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    fs::set_permissions(temp_path, fs::Permissions::from_mode(mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftover_temp_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count()
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sysconfig/ipmi_exporter");

        write_atomic(&path, b"listen_address=old\nstale=1\n", 0o644).unwrap();
        write_atomic(&path, b"listen_address=new\n", 0o644).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "listen_address=new\n");
        assert_eq!(leftover_temp_files(path.parent().unwrap()), 0);
    }

    #[test]
    fn test_write_atomic_sets_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grant");

        write_atomic(&path, b"rule\n", 0o440).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o440);
    }

    #[test]
    fn test_copy_atomic() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src-bin");
        let dest = dir.path().join("usr/bin/ipmi_exporter");
        fs::write(&src, b"#!/bin/sh\n").unwrap();

        copy_atomic(&src, &dest, 0o755).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"#!/bin/sh\n");
        let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }

    #[test]
    fn test_copy_atomic_missing_source() {
        let dir = TempDir::new().unwrap();
        let result = copy_atomic(&dir.path().join("absent"), &dir.path().join("dest"), 0o755);
        assert!(matches!(result, Err(OperatorError::InstallIo { .. })));
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn test_remove_absent_is_success() {
        let dir = TempDir::new().unwrap();
        assert!(!remove_file_if_exists(&dir.path().join("absent")).unwrap());
        assert!(!remove_dir_if_exists(&dir.path().join("absent-dir")).unwrap());
    }

    #[test]
    fn test_remove_present() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file");
        let tree = dir.path().join("var/lib/ipmi_exporter/textfile_collector");
        fs::write(&file, b"x").unwrap();
        fs::create_dir_all(&tree).unwrap();

        assert!(remove_file_if_exists(&file).unwrap());
        assert!(remove_dir_if_exists(&dir.path().join("var")).unwrap());
        assert!(!file.exists());
        assert!(!tree.exists());
    }

    #[test]
    fn test_ensure_dir_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etc/ipmi_exporter");
        assert!(ensure_dir(&path).unwrap());
        assert!(!ensure_dir(&path).unwrap());
    }
}
