//! Deployment lifecycle operations against the Kubernetes apps API.
//!
//! Each operation issues exactly one remote call. Failures are logged and
//! turned into an apology sentence; nothing is retried or rolled back.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec as KubeDeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{Api, Patch, PatchParams, PostParams};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::DeploymentApiError;
use crate::models::OperationResult;
use crate::translate::{CreateParams, ScaleParams, UpdateParams};

/// Orchestration API surface used by the lifecycle operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeploymentApi: Send + Sync {
    /// Create a deployment in `namespace`.
    async fn create(&self, namespace: &str, deployment: &Deployment)
        -> Result<(), DeploymentApiError>;

    /// Apply a patch to the deployment `name` in `namespace`.
    async fn patch(&self, name: &str, namespace: &str, patch: &Value)
        -> Result<(), DeploymentApiError>;
}

/// [`DeploymentApi`] backed by a Kubernetes client.
#[derive(Clone)]
pub struct KubeDeployments {
    client: kube::Client,
}

impl KubeDeployments {
    /// Wrap an initialized Kubernetes client.
    #[must_use]
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeploymentApi for KubeDeployments {
    async fn create(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), DeploymentApiError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), deployment).await?;
        Ok(())
    }

    async fn patch(
        &self,
        name: &str,
        namespace: &str,
        patch: &Value,
    ) -> Result<(), DeploymentApiError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        // Strategic merge so the container list merges by name.
        api.patch(name, &PatchParams::default(), &Patch::Strategic(patch))
            .await?;
        Ok(())
    }
}

/// Build the body for a new single-replica deployment.
#[must_use]
pub fn deployment_body(params: &CreateParams) -> Deployment {
    let name = &params.spec.name;
    let labels = BTreeMap::from([("app".to_string(), name.clone())]);

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(KubeDeploymentSpec {
            replicas: Some(params.spec.replica_count.unwrap_or(1)),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: name.clone(),
                        image: Some(params.spec.image()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Patch body that sets the replica count.
#[must_use]
pub fn scale_patch(params: &ScaleParams) -> Value {
    json!({
        "spec": {
            "replicas": params.replica_count
        }
    })
}

/// Patch body that swaps the image of the deployment's container.
#[must_use]
pub fn update_patch(params: &UpdateParams) -> Value {
    json!({
        "spec": {
            "template": {
                "spec": {
                    "containers": [
                        {
                            "name": params.spec.name,
                            "image": params.spec.image()
                        }
                    ]
                }
            }
        }
    })
}

/// Create a deployment from an image.
pub async fn create_deployment(
    api: &dyn DeploymentApi,
    namespace: &str,
    cluster_id: &str,
    params: &CreateParams,
) -> OperationResult {
    let spec = &params.spec;
    let body = deployment_body(params);

    match api.create(namespace, &body).await {
        Ok(()) => {
            info!(
                deployment = %spec.name,
                namespace = %namespace,
                image = %spec.image(),
                "Created deployment"
            );
            OperationResult::say(format!(
                "Deploying {} {} into the {} cluster.",
                spec.name, spec.image_tag, cluster_id
            ))
        }
        Err(e) => {
            error!(
                deployment = %spec.name,
                namespace = %namespace,
                error = %e,
                "Failed to create deployment"
            );
            OperationResult::say(format!(
                "There was an error while creating the {} deployment.",
                spec.name
            ))
        }
    }
}

/// Scale a deployment to a replica count.
pub async fn scale_deployment(
    api: &dyn DeploymentApi,
    namespace: &str,
    params: &ScaleParams,
) -> OperationResult {
    match api.patch(&params.name, namespace, &scale_patch(params)).await {
        Ok(()) => {
            info!(
                deployment = %params.name,
                namespace = %namespace,
                replicas = params.replica_count,
                "Scaled deployment"
            );
            OperationResult::say(format!(
                "Scaling the {} deployment to {}.",
                params.name, params.replica_count
            ))
        }
        Err(e) => {
            error!(
                deployment = %params.name,
                namespace = %namespace,
                error = %e,
                "Failed to scale deployment"
            );
            OperationResult::say(format!(
                "There was an error while scaling the {} deployment.",
                params.name
            ))
        }
    }
}

/// Roll a deployment to a new image tag.
pub async fn update_deployment(
    api: &dyn DeploymentApi,
    namespace: &str,
    params: &UpdateParams,
) -> OperationResult {
    let spec = &params.spec;

    match api.patch(&spec.name, namespace, &update_patch(params)).await {
        Ok(()) => {
            info!(
                deployment = %spec.name,
                namespace = %namespace,
                image = %spec.image(),
                "Updated deployment"
            );
            OperationResult::say(format!(
                "Updating the {} deployment to version {}.",
                spec.name, spec.image_tag
            ))
        }
        Err(e) => {
            error!(
                deployment = %spec.name,
                namespace = %namespace,
                error = %e,
                "Failed to update deployment"
            );
            OperationResult::say(format!(
                "There was an error updating the {} deployment.",
                spec.name
            ))
        }
    }
}
