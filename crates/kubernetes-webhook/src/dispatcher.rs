//! Intent dispatch.
//!
//! Maps a recognized intent to its lifecycle operation or to the status
//! aggregator. The dispatcher holds no mutable state; concurrent requests
//! share it through an `Arc`.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cluster::{self, ClusterInventory};
use crate::config::Config;
use crate::deployments::{self, DeploymentApi};
use crate::error::DispatchError;
use crate::models::{IntentRequest, OperationResult};
use crate::translate::{translate, DeploymentRequest, ImageRegistry};

/// Cluster coordinates fixed at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterContext {
    /// Namespace deployments live in.
    pub namespace: String,
    /// GKE cluster id.
    pub cluster_id: String,
    /// Google Cloud project id.
    pub project_id: String,
    /// Compute zone of the cluster.
    pub zone: String,
    /// Container registry host.
    pub registry: String,
}

impl ClusterContext {
    fn image_registry(&self) -> ImageRegistry {
        ImageRegistry {
            host: self.registry.clone(),
            project_id: self.project_id.clone(),
        }
    }
}

impl From<&Config> for ClusterContext {
    fn from(config: &Config) -> Self {
        Self {
            namespace: config.namespace.clone(),
            cluster_id: config.cluster_id.clone(),
            project_id: config.project_id.clone(),
            zone: config.zone.clone(),
            registry: config.registry.clone(),
        }
    }
}

/// Routes intents to operations.
#[derive(Clone)]
pub struct Dispatcher {
    deployments: Arc<dyn DeploymentApi>,
    inventory: Arc<dyn ClusterInventory>,
    context: ClusterContext,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        deployments: Arc<dyn DeploymentApi>,
        inventory: Arc<dyn ClusterInventory>,
        context: ClusterContext,
    ) -> Self {
        Self {
            deployments,
            inventory,
            context,
        }
    }

    /// Cluster coordinates this dispatcher operates on.
    #[must_use]
    pub fn context(&self) -> &ClusterContext {
        &self.context
    }

    /// Execute an intent.
    ///
    /// Deployment writes always produce a sentence, even on failure.
    /// Only the status read can return an error.
    pub async fn dispatch(&self, intent: &IntentRequest) -> Result<OperationResult, DispatchError> {
        info!(action = %intent.action, "Dispatching intent");
        let ctx = &self.context;

        let request = match translate(intent, &ctx.image_registry()) {
            Ok(request) => request,
            Err(e) => {
                warn!(action = %intent.action, error = %e, "Rejected intent parameters");
                return Ok(OperationResult::say(e.to_string()));
            }
        };

        let result = match request {
            None => {
                cluster::get_cluster_status(
                    self.inventory.as_ref(),
                    &ctx.cluster_id,
                    &ctx.project_id,
                    &ctx.zone,
                )
                .await?
            }
            Some(DeploymentRequest::Create(params)) => {
                deployments::create_deployment(
                    self.deployments.as_ref(),
                    &ctx.namespace,
                    &ctx.cluster_id,
                    &params,
                )
                .await
            }
            Some(DeploymentRequest::Scale(params)) => {
                deployments::scale_deployment(self.deployments.as_ref(), &ctx.namespace, &params)
                    .await
            }
            Some(DeploymentRequest::Update(params)) => {
                deployments::update_deployment(self.deployments.as_ref(), &ctx.namespace, &params)
                    .await
            }
        };

        Ok(result)
    }
}
