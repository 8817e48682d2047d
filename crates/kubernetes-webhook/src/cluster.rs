//! Cluster capacity reporting.
//!
//! Status is read in two dependent steps: the cluster descriptor names the
//! machine type, which is then looked up for its CPU and memory figures.
//! Nothing is cached because node pools can be resized at any time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::credentials::TokenSource;
use crate::error::ClusterApiError;
use crate::models::OperationResult;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Cluster metadata needed for capacity reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescriptor {
    pub cluster_id: String,
    pub current_node_count: i64,
    pub machine_type: String,
}

/// Compute capacity of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineTypeDescriptor {
    pub cpu_count: i64,
    pub memory_mb: i64,
}

/// Cluster-inventory API surface used by the status aggregator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterInventory: Send + Sync {
    /// Fetch the descriptor of a cluster.
    async fn cluster(
        &self,
        project_id: &str,
        zone: &str,
        cluster_id: &str,
    ) -> Result<ClusterDescriptor, ClusterApiError>;

    /// Fetch a machine type by name.
    async fn machine_type(
        &self,
        project_id: &str,
        zone: &str,
        machine_type: &str,
    ) -> Result<MachineTypeDescriptor, ClusterApiError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterResource {
    #[serde(default)]
    current_node_count: Option<i64>,
    #[serde(default)]
    node_config: Option<NodeConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeConfig {
    #[serde(default)]
    machine_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MachineTypeResource {
    #[serde(default)]
    guest_cpus: Option<i64>,
    #[serde(default)]
    memory_mb: Option<i64>,
}

/// [`ClusterInventory`] backed by the GKE container API and the compute API.
#[derive(Clone)]
pub struct GoogleCloudInventory {
    client: Client,
    tokens: Arc<dyn TokenSource>,
    container_api_url: String,
    compute_api_url: String,
}

impl GoogleCloudInventory {
    /// Create a new inventory client.
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        container_api_url: impl Into<String>,
        compute_api_url: impl Into<String>,
    ) -> Result<Self, ClusterApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            tokens,
            container_api_url: container_api_url.into().trim_end_matches('/').to_string(),
            compute_api_url: compute_api_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Make an authenticated GET request.
    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ClusterApiError> {
        debug!(url = %url, "GET request");
        let token = self.tokens.token().await?;

        let response = self.client.get(url).bearer_auth(token).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                ClusterApiError::Decode(e)
            })
        } else {
            Err(ClusterApiError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

#[async_trait]
impl ClusterInventory for GoogleCloudInventory {
    async fn cluster(
        &self,
        project_id: &str,
        zone: &str,
        cluster_id: &str,
    ) -> Result<ClusterDescriptor, ClusterApiError> {
        let url = format!(
            "{}/v1/projects/{project_id}/zones/{zone}/clusters/{cluster_id}",
            self.container_api_url
        );
        let resource: ClusterResource = self.get(&url).await?;

        Ok(ClusterDescriptor {
            cluster_id: cluster_id.to_string(),
            current_node_count: resource
                .current_node_count
                .ok_or(ClusterApiError::MissingField("currentNodeCount"))?,
            machine_type: resource
                .node_config
                .and_then(|c| c.machine_type)
                .ok_or(ClusterApiError::MissingField("nodeConfig.machineType"))?,
        })
    }

    async fn machine_type(
        &self,
        project_id: &str,
        zone: &str,
        machine_type: &str,
    ) -> Result<MachineTypeDescriptor, ClusterApiError> {
        let url = format!(
            "{}/compute/v1/projects/{project_id}/zones/{zone}/machineTypes/{machine_type}",
            self.compute_api_url
        );
        let resource: MachineTypeResource = self.get(&url).await?;

        Ok(MachineTypeDescriptor {
            cpu_count: resource
                .guest_cpus
                .ok_or(ClusterApiError::MissingField("guestCpus"))?,
            memory_mb: resource
                .memory_mb
                .ok_or(ClusterApiError::MissingField("memoryMb"))?,
        })
    }
}

/// Aggregate capacity across all nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterCapacity {
    pub total_cpus: i64,
    pub total_memory_gb: f64,
}

impl ClusterCapacity {
    /// Multiply per-node capacity by the node count. Memory is not rounded.
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(
        cluster: &ClusterDescriptor,
        machine: &MachineTypeDescriptor,
    ) -> Result<Self, ClusterApiError> {
        let nodes = cluster.current_node_count;
        let total = |per_node: i64, unit: &'static str| {
            nodes
                .checked_mul(per_node)
                .ok_or(ClusterApiError::CapacityOverflow {
                    nodes,
                    per_node,
                    unit,
                })
        };

        Ok(Self {
            total_cpus: total(machine.cpu_count, "CPUs")?,
            total_memory_gb: total(machine.memory_mb, "MB")? as f64 / 1024.0,
        })
    }
}

/// Read cluster and machine-type descriptors and report total capacity.
///
/// Remote failures are returned to the caller; there is no meaningful
/// sentence for a half-read cluster.
pub async fn get_cluster_status(
    inventory: &dyn ClusterInventory,
    cluster_id: &str,
    project_id: &str,
    zone: &str,
) -> Result<OperationResult, ClusterApiError> {
    let cluster = inventory.cluster(project_id, zone, cluster_id).await?;
    let machine = inventory
        .machine_type(project_id, zone, &cluster.machine_type)
        .await?;
    let capacity = ClusterCapacity::compute(&cluster, &machine)?;

    info!(
        cluster_id = %cluster_id,
        nodes = cluster.current_node_count,
        machine_type = %cluster.machine_type,
        total_cpus = capacity.total_cpus,
        total_memory_gb = capacity.total_memory_gb,
        "Read cluster status"
    );

    // `{:?}` keeps the fractional part on whole numbers ("45.0").
    Ok(OperationResult::say(format!(
        "The {} cluster is running with {} CPUs and {:?} gigs of ram.",
        cluster_id, capacity.total_cpus, capacity.total_memory_gb
    )))
}
