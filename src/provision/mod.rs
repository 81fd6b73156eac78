//! Resource provisioner.
//!
//! Places the exporter binary and its supporting files on disk, and removes
//! them again on teardown.

mod archive;
mod package;

use std::io;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::{Architecture, PathsConfig};
use crate::error::{OperatorError, OperatorResult};
use crate::host::{fs, Host};
use crate::templates::{TemplateEngine, EXPORTER_CONFIG, SYSCONFIG};
use crate::validation::ListenAddress;

pub use archive::{download_url, locate_binary, release_dir_name, unpack, BINARY_NAME};
pub use package::PackageInstaller;

/// Collectors enabled in the default exporter module.
pub const DEFAULT_COLLECTORS: &[&str] = &["bmc", "ipmi", "chassis", "dcmi", "sel"];

const BINARY_MODE: u32 = 0o755;
const CONFIG_MODE: u32 = 0o644;

/// Owns every on-disk artifact of the exporter.
pub struct ResourceProvisioner<'a, H: Host> {
    host: &'a H,
    paths: &'a PathsConfig,
    base_url: &'a str,
}

impl<'a, H: Host> ResourceProvisioner<'a, H> {
    pub fn new(host: &'a H, paths: &'a PathsConfig, base_url: &'a str) -> Self {
        Self {
            host,
            paths,
            base_url,
        }
    }

    /// Download the release for `version`/`arch` and install its binary.
    ///
    /// The archive and the extraction live in one scratch directory that is
    /// removed before returning, whether or not the install succeeded.
    pub fn install(&self, version: &str, arch: Architecture) -> OperatorResult<PathBuf> {
        fs::ensure_dir(&self.paths.scratch_dir)?;
        let scratch = tempfile::Builder::new()
            .prefix("ipmi-exporter-")
            .tempdir_in(&self.paths.scratch_dir)
            .map_err(|e| OperatorError::install_io(&self.paths.scratch_dir, e))?;
        let scratch_path = scratch.path().to_path_buf();

        let result = self.install_from_scratch(&scratch_path, version, arch);

        if let Err(e) = scratch.close() {
            warn!(path = %scratch_path.display(), error = %e, "Failed to remove scratch directory");
        }

        result
    }

    fn install_from_scratch(
        &self,
        scratch: &std::path::Path,
        version: &str,
        arch: Architecture,
    ) -> OperatorResult<PathBuf> {
        let url = download_url(self.base_url, version, arch);
        let archive_path = scratch.join("release.tar.gz");
        info!(url = %url, version = %version, arch = %arch, "Downloading exporter release");
        self.host.fetch(&url, &archive_path)?;

        let extract_dir = scratch.join("extract");
        fs::ensure_dir(&extract_dir)?;
        unpack(&archive_path, &extract_dir)?;
        let binary = locate_binary(&extract_dir, version, arch)?;

        fs::copy_atomic(&binary, &self.paths.binary, BINARY_MODE)?;
        info!(path = %self.paths.binary.display(), version = %version, "Exporter binary installed");
        Ok(self.paths.binary.clone())
    }

    /// Write the exporter configuration YAML, creating its directory.
    pub fn write_exporter_config(&self, engine: &TemplateEngine) -> OperatorResult<()> {
        let content = engine.render(
            EXPORTER_CONFIG,
            &serde_json::json!({ "collectors": DEFAULT_COLLECTORS }),
        )?;
        fs::write_atomic(&self.paths.config_file, content.as_bytes(), CONFIG_MODE)?;
        info!(path = %self.paths.config_file.display(), "Exporter configuration written");
        Ok(())
    }

    /// Render the sysconfig file, replacing whatever was there before, and
    /// make sure the state directories exist and belong to the service account.
    pub fn write_sysconfig(
        &self,
        engine: &TemplateEngine,
        listen_address: &ListenAddress,
        user: &str,
        group: &str,
    ) -> OperatorResult<()> {
        let content = engine.render(
            SYSCONFIG,
            &serde_json::json!({ "listen_address": listen_address.to_string() }),
        )?;

        let textfile_dir = self.paths.textfile_dir();
        fs::ensure_dir(&textfile_dir)?;
        for dir in [&self.paths.state_dir, &textfile_dir] {
            self.host.chown(dir, user, group)?;
        }

        fs::write_atomic(&self.paths.sysconfig, content.as_bytes(), CONFIG_MODE)?;
        info!(
            path = %self.paths.sysconfig.display(),
            listen_address = %listen_address,
            "Sysconfig rendered"
        );
        Ok(())
    }

    /// Remove the binary and every provisioned file. Absent paths are fine.
    pub fn uninstall(&self) -> OperatorResult<()> {
        fs::remove_file_if_exists(&self.paths.binary)?;
        fs::remove_file_if_exists(&self.paths.config_file)?;
        self.remove_config_dir_if_empty()?;
        fs::remove_file_if_exists(&self.paths.sysconfig)?;
        fs::remove_dir_if_exists(&self.paths.state_dir)?;
        info!("Exporter artifacts removed");
        Ok(())
    }

    fn remove_config_dir_if_empty(&self) -> OperatorResult<()> {
        let dir = self.paths.config_dir();
        let mut entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(OperatorError::install_io(dir, e)),
        };
        if entries.next().is_some() {
            debug!(path = %dir.display(), "Config directory not empty, keeping it");
            return Ok(());
        }

        std::fs::remove_dir(dir).map_err(|e| OperatorError::install_io(dir, e))?;
        debug!(path = %dir.display(), "Config directory removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SubprocessResult;
    use crate::host::HostCommand;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::cell::RefCell;
    use std::fs::File;
    use std::path::Path;
    use tempfile::TempDir;

    /// Serves a fixed file for every download and records chowns.
    struct ArchiveHost {
        archive: Option<PathBuf>,
        chowned: RefCell<Vec<PathBuf>>,
    }

    impl Host for ArchiveHost {
        fn run(&self, _command: &HostCommand) -> OperatorResult<SubprocessResult> {
            unreachable!()
        }

        fn fetch(&self, url: &str, dest: &Path) -> OperatorResult<()> {
            match &self.archive {
                Some(archive) => {
                    std::fs::copy(archive, dest).unwrap();
                    Ok(())
                }
                None => Err(OperatorError::Download {
                    message: format!("HTTP 404 Not Found for {}", url),
                }),
            }
        }

        fn chown(&self, path: &Path, _user: &str, _group: &str) -> OperatorResult<()> {
            self.chowned.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    fn release_archive(dir: &Path, entry: &str) -> PathBuf {
        let path = dir.join("upstream.tar.gz");
        let file = File::create(&path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        let content = b"#!/bin/sh\necho 'ipmi_exporter, version 1.9.0'\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, entry, &content[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    fn scratch_is_empty(paths: &PathsConfig) -> bool {
        std::fs::read_dir(&paths.scratch_dir).unwrap().next().is_none()
    }

    #[test]
    fn test_install_places_binary_and_cleans_scratch() {
        let dir = TempDir::new().unwrap();
        let paths = PathsConfig::default().under_root(&dir.path().join("root"));
        let host = ArchiveHost {
            archive: Some(release_archive(
                dir.path(),
                "ipmi_exporter-1.9.0.linux-amd64/ipmi_exporter",
            )),
            chowned: RefCell::new(Vec::new()),
        };
        let provisioner = ResourceProvisioner::new(&host, &paths, "https://example.invalid");

        let binary = provisioner.install("1.9.0", Architecture::Amd64).unwrap();

        assert_eq!(binary, paths.binary);
        assert!(paths.binary.is_file());
        assert!(scratch_is_empty(&paths));
    }

    #[test]
    fn test_failed_extraction_cleans_scratch() {
        let dir = TempDir::new().unwrap();
        let paths = PathsConfig::default().under_root(&dir.path().join("root"));
        let host = ArchiveHost {
            archive: Some(release_archive(dir.path(), "wrong-dir/ipmi_exporter")),
            chowned: RefCell::new(Vec::new()),
        };
        let provisioner = ResourceProvisioner::new(&host, &paths, "https://example.invalid");

        let err = provisioner.install("1.9.0", Architecture::Amd64).unwrap_err();

        assert_eq!(err.code(), "ARCHIVE_ERROR");
        assert!(!paths.binary.exists());
        assert!(scratch_is_empty(&paths));
    }

    #[test]
    fn test_download_failure_cleans_scratch() {
        let dir = TempDir::new().unwrap();
        let paths = PathsConfig::default().under_root(&dir.path().join("root"));
        let host = ArchiveHost {
            archive: None,
            chowned: RefCell::new(Vec::new()),
        };
        let provisioner = ResourceProvisioner::new(&host, &paths, "https://example.invalid");

        let err = provisioner.install("1.9.0", Architecture::Amd64).unwrap_err();

        assert_eq!(err.code(), "DOWNLOAD_ERROR");
        assert!(scratch_is_empty(&paths));
    }

    #[test]
    fn test_sysconfig_is_replaced_not_merged() {
        let dir = TempDir::new().unwrap();
        let paths = PathsConfig::default().under_root(dir.path());
        let host = ArchiveHost {
            archive: None,
            chowned: RefCell::new(Vec::new()),
        };
        let engine = TemplateEngine::builtin().unwrap();
        let provisioner = ResourceProvisioner::new(&host, &paths, "https://example.invalid");

        std::fs::create_dir_all(paths.sysconfig.parent().unwrap()).unwrap();
        std::fs::write(&paths.sysconfig, "listen_address=1.2.3.4:1\nSTALE=yes\n").unwrap();

        let address: ListenAddress = "0.0.0.0:9290".parse().unwrap();
        provisioner
            .write_sysconfig(&engine, &address, "ipmi_exporter", "ipmi_exporter")
            .unwrap();

        let content = std::fs::read_to_string(&paths.sysconfig).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), vec!["listen_address=0.0.0.0:9290"]);
        assert!(paths.textfile_dir().is_dir());
        assert_eq!(
            *host.chowned.borrow(),
            vec![paths.state_dir.clone(), paths.textfile_dir()]
        );
    }

    #[test]
    fn test_uninstall_twice() {
        let dir = TempDir::new().unwrap();
        let paths = PathsConfig::default().under_root(dir.path());
        let host = ArchiveHost {
            archive: None,
            chowned: RefCell::new(Vec::new()),
        };
        let engine = TemplateEngine::builtin().unwrap();
        let provisioner = ResourceProvisioner::new(&host, &paths, "https://example.invalid");

        provisioner.write_exporter_config(&engine).unwrap();
        std::fs::create_dir_all(paths.textfile_dir()).unwrap();

        provisioner.uninstall().unwrap();
        provisioner.uninstall().unwrap();

        assert!(!paths.config_file.exists());
        assert!(!paths.config_dir().exists());
        assert!(!paths.state_dir.exists());
    }
}
