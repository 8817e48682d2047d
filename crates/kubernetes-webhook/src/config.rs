//! Configuration for the webhook service.

use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Default location of the mounted service-account key.
const DEFAULT_SERVICE_ACCOUNT_FILE: &str = "/etc/apiai-kubernetes-webhook/service-account.json";

/// Webhook service configuration, read once at startup.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// Basic-Auth username expected on every webhook call.
    pub basic_auth_username: String,
    /// Basic-Auth password expected on every webhook call.
    pub basic_auth_password: String,
    /// Kubernetes namespace deployments are managed in.
    pub namespace: String,
    /// GKE cluster id.
    pub cluster_id: String,
    /// Google Cloud project id.
    pub project_id: String,
    /// Compute zone of the cluster.
    pub zone: String,
    /// Container registry host images are pulled from.
    pub registry: String,
    /// Path to the service-account JSON key.
    pub service_account_file: PathBuf,
    /// Base URL of the container (GKE) API.
    pub container_api_url: String,
    /// Base URL of the compute API.
    pub compute_api_url: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let (Some(basic_auth_username), Some(basic_auth_password)) =
            (get("BASIC_AUTH_USERNAME"), get("BASIC_AUTH_PASSWORD"))
        else {
            return Err(ConfigError::MissingCredentials);
        };

        let port = match get("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                value,
            })?,
            None => 8080,
        };

        Ok(Self {
            port,
            basic_auth_username,
            basic_auth_password,
            namespace: get("NAMESPACE").unwrap_or_else(|| "default".to_string()),
            cluster_id: get("CLUSTER_ID").ok_or(ConfigError::Missing("CLUSTER_ID"))?,
            project_id: get("PROJECT_ID").ok_or(ConfigError::Missing("PROJECT_ID"))?,
            zone: get("ZONE").unwrap_or_else(|| "us-central1-c".to_string()),
            registry: get("IMAGE_REGISTRY").unwrap_or_else(|| "gcr.io".to_string()),
            service_account_file: get("SERVICE_ACCOUNT_FILE")
                .map_or_else(|| PathBuf::from(DEFAULT_SERVICE_ACCOUNT_FILE), PathBuf::from),
            container_api_url: get("CONTAINER_API_URL")
                .unwrap_or_else(|| "https://container.googleapis.com".to_string()),
            compute_api_url: get("COMPUTE_API_URL")
                .unwrap_or_else(|| "https://compute.googleapis.com".to_string()),
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("basic_auth_username", &self.basic_auth_username)
            .field("basic_auth_password", &"<redacted>")
            .field("namespace", &self.namespace)
            .field("cluster_id", &self.cluster_id)
            .field("project_id", &self.project_id)
            .field("zone", &self.zone)
            .field("registry", &self.registry)
            .field("service_account_file", &self.service_account_file)
            .field("container_api_url", &self.container_api_url)
            .field("compute_api_url", &self.compute_api_url)
            .finish()
    }
}
