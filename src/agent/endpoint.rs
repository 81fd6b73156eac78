//! Metrics endpoint publication.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{MetricsConfig, PathsConfig};
use crate::error::OperatorResult;
use crate::host::fs;
use crate::validation::ListenAddress;

/// Where consumers scrape the exporter, plus the dashboard and alert-rule
/// bundle shipped with the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedEndpoint {
    #[serde(rename = "hostname")]
    pub host: String,
    pub port: u16,
    #[serde(rename = "metrics_path")]
    pub path: String,
    pub dashboards_dir: PathBuf,
    pub prometheus_rules_dir: PathBuf,
    pub loki_rules_dir: PathBuf,
}

impl PublishedEndpoint {
    /// Derive the endpoint from the exporter's listen address.
    ///
    /// A wildcard listen host is replaced by the ingress address when one is
    /// configured.
    pub fn derive(listen: &ListenAddress, metrics: &MetricsConfig, paths: &PathsConfig) -> Self {
        let host = match (&metrics.ingress_address, listen.is_unspecified()) {
            (Some(ingress), true) => ingress.clone(),
            _ => listen.host().to_string(),
        };

        Self {
            host,
            port: listen.port(),
            path: metrics.path.clone(),
            dashboards_dir: paths.dashboards_dir.clone(),
            prometheus_rules_dir: paths.prometheus_rules_dir.clone(),
            loki_rules_dir: paths.loki_rules_dir.clone(),
        }
    }
}

/// Hands the endpoint to the metrics-consumption side.
pub trait EndpointPublisher {
    fn publish(&self, endpoint: &PublishedEndpoint) -> OperatorResult<()>;

    /// Retract a previously published endpoint. Nothing published is fine.
    fn withdraw(&self) -> OperatorResult<()>;
}

/// Publishes the endpoint as a JSON document on disk.
pub struct FileEndpointPublisher {
    path: PathBuf,
}

impl FileEndpointPublisher {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read back the currently published endpoint.
    pub fn current(&self) -> OperatorResult<Option<PublishedEndpoint>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl EndpointPublisher for FileEndpointPublisher {
    fn publish(&self, endpoint: &PublishedEndpoint) -> OperatorResult<()> {
        let json = serde_json::to_vec_pretty(endpoint)?;
        fs::write_atomic(&self.path, &json, 0o644)?;
        info!(
            host = %endpoint.host,
            port = endpoint.port,
            path = %endpoint.path,
            "Metrics endpoint published"
        );
        Ok(())
    }

    fn withdraw(&self) -> OperatorResult<()> {
        if fs::remove_file_if_exists(&self.path)? {
            info!("Metrics endpoint withdrawn");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_derive_uses_listen_host() {
        let listen: ListenAddress = "127.0.0.1:9999".parse().unwrap();
        let endpoint =
            PublishedEndpoint::derive(&listen, &MetricsConfig::default(), &PathsConfig::default());
        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, 9999);
        assert_eq!(endpoint.path, "/metrics");
    }

    #[test]
    fn test_derive_wildcard_uses_ingress() {
        let listen: ListenAddress = "0.0.0.0:9290".parse().unwrap();
        let metrics = MetricsConfig {
            ingress_address: Some("10.1.2.3".to_string()),
            ..MetricsConfig::default()
        };
        let endpoint = PublishedEndpoint::derive(&listen, &metrics, &PathsConfig::default());
        assert_eq!(endpoint.host, "10.1.2.3");
        assert_eq!(endpoint.port, 9290);

        let endpoint =
            PublishedEndpoint::derive(&listen, &MetricsConfig::default(), &PathsConfig::default());
        assert_eq!(endpoint.host, "0.0.0.0");
    }

    #[test]
    fn test_publish_and_withdraw() {
        let dir = TempDir::new().unwrap();
        let publisher = FileEndpointPublisher::new(&dir.path().join("state/endpoint.json"));
        assert_eq!(publisher.current().unwrap(), None);

        let listen: ListenAddress = "0.0.0.0:9290".parse().unwrap();
        let endpoint =
            PublishedEndpoint::derive(&listen, &MetricsConfig::default(), &PathsConfig::default());
        publisher.publish(&endpoint).unwrap();

        let raw: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("state/endpoint.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(raw["hostname"], "0.0.0.0");
        assert_eq!(raw["metrics_path"], "/metrics");
        assert_eq!(publisher.current().unwrap(), Some(endpoint));

        publisher.withdraw().unwrap();
        publisher.withdraw().unwrap();
        assert_eq!(publisher.current().unwrap(), None);
    }
}
