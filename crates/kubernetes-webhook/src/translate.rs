//! Translation of intent parameters into typed deployment requests.

use crate::error::TranslationError;
use crate::models::{Action, IntentRequest};

/// Registry location images are pulled from: `<host>/<project_id>/<image>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRegistry {
    /// Registry host (e.g. `gcr.io`).
    pub host: String,
    /// Project namespace inside the registry.
    pub project_id: String,
}

impl ImageRegistry {
    /// Repository path for an image name.
    #[must_use]
    pub fn repository(&self, image_name: &str) -> String {
        format!("{}/{}/{}", self.host, self.project_id, image_name)
    }
}

/// Strongly-typed description of the deployment an intent targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSpec {
    /// Deployment (and container) name.
    pub name: String,
    /// Image repository without tag.
    pub image_repository: String,
    /// Image tag.
    pub image_tag: String,
    /// Desired replicas, when the action sets them.
    pub replica_count: Option<i32>,
}

impl DeploymentSpec {
    /// Full image reference, `repository:tag`.
    #[must_use]
    pub fn image(&self) -> String {
        format!("{}:{}", self.image_repository, self.image_tag)
    }
}

/// Create a deployment named after the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateParams {
    pub spec: DeploymentSpec,
}

/// Change the replica count of an existing deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleParams {
    pub name: String,
    pub replica_count: i32,
}

/// Roll an existing deployment to a new tag of its own image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateParams {
    pub spec: DeploymentSpec,
}

/// A validated lifecycle request, one variant per deployment action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentRequest {
    Create(CreateParams),
    Scale(ScaleParams),
    Update(UpdateParams),
}

/// Translate an intent into a deployment request.
///
/// Returns `Ok(None)` for actions that carry no deployment (cluster status).
/// Nothing is defaulted: every key the action needs must be present.
pub fn translate(
    intent: &IntentRequest,
    registry: &ImageRegistry,
) -> Result<Option<DeploymentRequest>, TranslationError> {
    let request = match intent.action {
        Action::ClusterStatus => return Ok(None),
        Action::CreateDeployment => {
            let image_name = required(intent, "image_name")?;
            let image_tag = required(intent, "image_tag")?;
            DeploymentRequest::Create(CreateParams {
                spec: DeploymentSpec {
                    name: image_name.to_string(),
                    image_repository: registry.repository(image_name),
                    image_tag: image_tag.to_string(),
                    replica_count: None,
                },
            })
        }
        Action::ScaleDeployment => {
            let name = required(intent, "deployment_name")?;
            let replica_count = parse_replica_count(required(intent, "replica_count")?)?;
            DeploymentRequest::Scale(ScaleParams {
                name: name.to_string(),
                replica_count,
            })
        }
        Action::UpdateDeployment => {
            // The container is assumed to carry the deployment's name.
            let name = required(intent, "deployment_name")?;
            let image_tag = required(intent, "image_tag")?;
            DeploymentRequest::Update(UpdateParams {
                spec: DeploymentSpec {
                    name: name.to_string(),
                    image_repository: registry.repository(name),
                    image_tag: image_tag.to_string(),
                    replica_count: None,
                },
            })
        }
    };
    Ok(Some(request))
}

fn required<'a>(intent: &'a IntentRequest, key: &str) -> Result<&'a str, TranslationError> {
    intent
        .parameter(key)
        .ok_or_else(|| TranslationError::MissingParameter(key.to_string()))
}

fn parse_replica_count(raw: &str) -> Result<i32, TranslationError> {
    let invalid = || TranslationError::InvalidReplicaCount(raw.to_string());

    // API.AI numbers arrive as "3.0" when the entity is @sys.number.
    let whole = match raw.split_once('.') {
        Some((int, frac)) if frac.bytes().all(|b| b == b'0') => int,
        Some(_) => return Err(invalid()),
        None => raw,
    };

    match whole.parse::<i32>() {
        Ok(count) if count >= 0 => Ok(count),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn registry() -> ImageRegistry {
        ImageRegistry {
            host: "gcr.io".to_string(),
            project_id: "my-project".to_string(),
        }
    }

    fn intent(action: Action, params: &[(&str, &str)]) -> IntentRequest {
        let parameters: BTreeMap<String, String> = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        IntentRequest::new(action, parameters)
    }

    #[test]
    fn test_create_builds_image_repository() {
        let request = translate(
            &intent(
                Action::CreateDeployment,
                &[("image_name", "foo"), ("image_tag", "v1")],
            ),
            &registry(),
        )
        .unwrap();

        let Some(DeploymentRequest::Create(params)) = request else {
            panic!("expected create request");
        };
        assert_eq!(params.spec.name, "foo");
        assert_eq!(params.spec.image_repository, "gcr.io/my-project/foo");
        assert_eq!(params.spec.image(), "gcr.io/my-project/foo:v1");
        assert_eq!(params.spec.replica_count, None);
    }

    #[test]
    fn test_create_missing_image_tag() {
        let err = translate(
            &intent(Action::CreateDeployment, &[("image_name", "foo")]),
            &registry(),
        )
        .unwrap_err();
        assert_eq!(err, TranslationError::MissingParameter("image_tag".to_string()));
    }

    #[test]
    fn test_scale_parses_replica_count() {
        let request = translate(
            &intent(
                Action::ScaleDeployment,
                &[("deployment_name", "nginx"), ("replica_count", "5")],
            ),
            &registry(),
        )
        .unwrap();
        assert_eq!(
            request,
            Some(DeploymentRequest::Scale(ScaleParams {
                name: "nginx".to_string(),
                replica_count: 5,
            }))
        );
    }

    #[test]
    fn test_scale_to_zero_allowed() {
        let request = translate(
            &intent(
                Action::ScaleDeployment,
                &[("deployment_name", "nginx"), ("replica_count", "0")],
            ),
            &registry(),
        )
        .unwrap();
        assert!(matches!(
            request,
            Some(DeploymentRequest::Scale(ScaleParams { replica_count: 0, .. }))
        ));
    }

    #[test]
    fn test_scale_accepts_whole_float() {
        assert_eq!(parse_replica_count("3.0"), Ok(3));
        assert_eq!(parse_replica_count("5.00"), Ok(5));
        assert!(parse_replica_count("2.5").is_err());
        assert!(parse_replica_count(".0").is_err());
    }

    #[test]
    fn test_scale_rejects_scientific_notation() {
        for raw in ["1e1", "1E2", "3.0e0"] {
            assert_eq!(
                parse_replica_count(raw),
                Err(TranslationError::InvalidReplicaCount(raw.to_string()))
            );
        }
    }

    #[test]
    fn test_scale_rejects_negative_and_non_numeric() {
        for raw in ["-1", "abc", "-0.5", "1e20", "NaN"] {
            let err = translate(
                &intent(
                    Action::ScaleDeployment,
                    &[("deployment_name", "nginx"), ("replica_count", raw)],
                ),
                &registry(),
            )
            .unwrap_err();
            assert_eq!(err, TranslationError::InvalidReplicaCount(raw.to_string()));
        }
    }

    #[test]
    fn test_scale_missing_deployment_name_reported_first() {
        let err = translate(&intent(Action::ScaleDeployment, &[]), &registry()).unwrap_err();
        assert_eq!(
            err,
            TranslationError::MissingParameter("deployment_name".to_string())
        );
    }

    #[test]
    fn test_update_reuses_deployment_name_as_image() {
        let request = translate(
            &intent(
                Action::UpdateDeployment,
                &[("deployment_name", "api"), ("image_tag", "v2")],
            ),
            &registry(),
        )
        .unwrap();
        let Some(DeploymentRequest::Update(params)) = request else {
            panic!("expected update request");
        };
        assert_eq!(params.spec.name, "api");
        assert_eq!(params.spec.image(), "gcr.io/my-project/api:v2");
    }

    #[test]
    fn test_cluster_status_needs_no_translation() {
        let request = translate(&intent(Action::ClusterStatus, &[]), &registry()).unwrap();
        assert_eq!(request, None);
    }
}
