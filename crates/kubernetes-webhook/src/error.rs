//! Error types for the webhook.

use thiserror::Error;

/// Errors raised while reading configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Basic-Auth credentials are missing or empty.
    #[error("BASIC_AUTH_USERNAME and BASIC_AUTH_PASSWORD must both be set to non-empty values")]
    MissingCredentials,

    /// A required variable is missing or empty.
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    /// A variable could not be parsed.
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Errors raised while translating intent parameters.
///
/// The display text is spoken back to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    /// A parameter required by the action is absent.
    #[error("Missing required field: {0}")]
    MissingParameter(String),

    /// `replica_count` is not a non-negative integer.
    #[error("Invalid replica count: {0}")]
    InvalidReplicaCount(String),
}

/// Errors raised while obtaining Google Cloud access tokens.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// The service-account key file could not be read.
    #[error("Failed to read service account file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The service-account key file is not valid JSON.
    #[error("Failed to parse service account file: {0}")]
    Parse(#[from] serde_json::Error),

    /// The JWT assertion could not be signed.
    #[error("Failed to sign token assertion: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),

    /// The token endpoint rejected the assertion or was unreachable.
    #[error("Token exchange failed: {0}")]
    Exchange(String),
}

/// Errors raised by the cluster inventory (container and compute APIs).
#[derive(Debug, Error)]
pub enum ClusterApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Response body lacks a field the aggregation depends on.
    #[error("Response is missing field: {0}")]
    MissingField(&'static str),

    /// Reported node count and machine size overflow the capacity totals.
    #[error("Cluster capacity overflows: {nodes} nodes of {per_node} {unit}")]
    CapacityOverflow {
        nodes: i64,
        per_node: i64,
        unit: &'static str,
    },

    /// No access token could be obtained.
    #[error("Credentials error: {0}")]
    Credentials(#[from] CredentialsError),
}

/// Errors raised by the orchestration API for deployment writes.
#[derive(Debug, Error)]
pub enum DeploymentApiError {
    /// Kubernetes client error.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Any other failure (used by alternative client implementations).
    #[error("{0}")]
    Other(String),
}

/// Errors that escape the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The intent names an action this webhook does not handle.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// The cluster status read failed part way.
    #[error("Cluster status unavailable: {0}")]
    ClusterStatus(#[from] ClusterApiError),
}

impl DispatchError {
    /// Stable code recorded in logs for observability.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownAction(_) => "unknown_action",
            Self::ClusterStatus(_) => "cluster_status_unavailable",
        }
    }
}
