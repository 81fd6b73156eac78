//! Release archive naming and extraction.

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::config::Architecture;
use crate::error::{OperatorError, OperatorResult};

/// Name of the executable inside the release archive.
pub const BINARY_NAME: &str = "ipmi_exporter";

/// Top-level directory of a release archive.
pub fn release_dir_name(version: &str, arch: Architecture) -> String {
    format!("{}-{}.linux-{}", BINARY_NAME, version, arch)
}

/// Deterministic download URL for a release.
pub fn download_url(base_url: &str, version: &str, arch: Architecture) -> String {
    format!(
        "{}/v{}/{}.tar.gz",
        base_url.trim_end_matches('/'),
        version,
        release_dir_name(version, arch)
    )
}

/// Unpack a gzipped tarball into `dest`.
///
/// Entries that would escape `dest` are refused by the tar crate.
pub fn unpack(archive: &Path, dest: &Path) -> OperatorResult<()> {
    let file = File::open(archive).map_err(|e| OperatorError::Archive {
        message: format!("Failed to open '{}': {}", archive.display(), e),
    })?;

    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball.set_preserve_permissions(true);
    tarball.unpack(dest).map_err(|e| OperatorError::Archive {
        message: format!("Failed to extract '{}': {}", archive.display(), e),
    })?;

    debug!(archive = %archive.display(), dest = %dest.display(), "Archive extracted");
    Ok(())
}

/// Path of the exporter binary within an extracted release.
pub fn locate_binary(extracted: &Path, version: &str, arch: Architecture) -> OperatorResult<PathBuf> {
    let binary = extracted
        .join(release_dir_name(version, arch))
        .join(BINARY_NAME);

    if !binary.is_file() {
        return Err(OperatorError::Archive {
            message: format!(
                "Archive does not contain '{}/{}'",
                release_dir_name(version, arch),
                BINARY_NAME
            ),
        });
    }
    Ok(binary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use tempfile::TempDir;

    fn build_archive(path: &Path, entry: &str, content: &[u8]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, entry, content).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_download_url() {
        assert_eq!(
            download_url(
                "https://github.com/prometheus-community/ipmi_exporter/releases/download/",
                "1.9.0",
                Architecture::Amd64
            ),
            "https://github.com/prometheus-community/ipmi_exporter/releases/download/v1.9.0/ipmi_exporter-1.9.0.linux-amd64.tar.gz"
        );
    }

    #[test]
    fn test_unpack_and_locate() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("release.tar.gz");
        build_archive(
            &archive,
            "ipmi_exporter-1.9.0.linux-arm64/ipmi_exporter",
            b"#!/bin/sh\n",
        );

        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        unpack(&archive, &out).unwrap();

        let binary = locate_binary(&out, "1.9.0", Architecture::Arm64).unwrap();
        assert_eq!(fs::read(binary).unwrap(), b"#!/bin/sh\n");
    }

    #[test]
    fn test_unexpected_layout() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("release.tar.gz");
        build_archive(&archive, "ipmi_exporter", b"bin");

        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        unpack(&archive, &out).unwrap();

        let err = locate_binary(&out, "1.9.0", Architecture::Amd64).unwrap_err();
        assert_eq!(err.code(), "ARCHIVE_ERROR");
    }

    #[test]
    fn test_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("release.tar.gz");
        fs::write(&archive, b"<html>Not Found</html>").unwrap();

        let err = unpack(&archive, dir.path()).unwrap_err();
        assert_eq!(err.code(), "ARCHIVE_ERROR");
    }
}
