//! Webhook wire types and the intent request model.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

/// Source identifier stamped on every response.
pub const RESPONSE_SOURCE: &str = "kubernetes-webhook";

/// Inbound webhook body: `{ "result": { "action": ..., "parameters": {...} } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRequest {
    /// Resolved intent.
    pub result: IntentResult,
}

/// The `result` object of an inbound webhook body.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentResult {
    /// Action name configured on the matched intent.
    pub action: String,
    /// Extracted slot values.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

/// Actions this webhook knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Report aggregate cluster capacity.
    ClusterStatus,
    /// Create a deployment from an image.
    CreateDeployment,
    /// Change the replica count of a deployment.
    ScaleDeployment,
    /// Roll a deployment to a new image tag.
    UpdateDeployment,
}

impl Action {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClusterStatus => "cluster_status",
            Self::CreateDeployment => "create_deployment",
            Self::ScaleDeployment => "scale_deployment",
            Self::UpdateDeployment => "update_deployment",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cluster_status" => Ok(Self::ClusterStatus),
            "create_deployment" => Ok(Self::CreateDeployment),
            "scale_deployment" => Ok(Self::ScaleDeployment),
            "update_deployment" => Ok(Self::UpdateDeployment),
            other => Err(DispatchError::UnknownAction(other.to_string())),
        }
    }
}

/// A recognized intent with its parameters normalized to strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    /// Requested action.
    pub action: Action,
    /// Parameter bag; absent, null and empty values are dropped.
    pub parameters: BTreeMap<String, String>,
}

impl IntentRequest {
    /// Create an intent request from already-normalized parameters.
    #[must_use]
    pub fn new(action: Action, parameters: BTreeMap<String, String>) -> Self {
        Self { action, parameters }
    }

    /// Convert an inbound webhook body, rejecting unknown actions.
    pub fn from_webhook(request: WebhookRequest) -> Result<Self, DispatchError> {
        let action = request.result.action.parse()?;
        let parameters = request
            .result
            .parameters
            .into_iter()
            .filter_map(|(key, value)| normalize_parameter(value).map(|v| (key, v)))
            .collect();
        Ok(Self { action, parameters })
    }

    /// Look up a parameter by key.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

/// API.AI sends slot values as strings or numbers depending on the entity type.
fn normalize_parameter(value: Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Uniform response envelope returned for every handled request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// Text read out by the voice assistant.
    pub speech: String,
    /// Text shown on screen; always equal to `speech`.
    pub display_text: String,
    /// Constant source identifier.
    pub source: String,
}

impl OperationResult {
    /// Build a response that says `text`.
    pub fn say(text: impl Into<String>) -> Self {
        let speech = text.into();
        Self {
            display_text: speech.clone(),
            speech,
            source: RESPONSE_SOURCE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_webhook_request() {
        let json = r#"{
            "id": "b340a1f7-abee-4e13-9bdd-5e8938a48b7d",
            "result": {
                "source": "agent",
                "resolvedQuery": "scale nginx to 3",
                "action": "scale_deployment",
                "parameters": {
                    "deployment_name": "nginx",
                    "replica_count": 3
                }
            }
        }"#;

        let request: WebhookRequest = serde_json::from_str(json).unwrap();
        let intent = IntentRequest::from_webhook(request).unwrap();
        assert_eq!(intent.action, Action::ScaleDeployment);
        assert_eq!(intent.parameter("deployment_name"), Some("nginx"));
        assert_eq!(intent.parameter("replica_count"), Some("3"));
    }

    #[test]
    fn test_missing_parameters_object_is_empty() {
        let json = r#"{"result": {"action": "cluster_status"}}"#;
        let request: WebhookRequest = serde_json::from_str(json).unwrap();
        let intent = IntentRequest::from_webhook(request).unwrap();
        assert_eq!(intent.action, Action::ClusterStatus);
        assert!(intent.parameters.is_empty());
    }

    #[test]
    fn test_empty_and_null_parameters_dropped() {
        let json = r#"{"result": {"action": "create_deployment",
            "parameters": {"image_name": "  ", "image_tag": null, "extra": "x"}}}"#;
        let request: WebhookRequest = serde_json::from_str(json).unwrap();
        let intent = IntentRequest::from_webhook(request).unwrap();
        assert_eq!(intent.parameter("image_name"), None);
        assert_eq!(intent.parameter("image_tag"), None);
        assert_eq!(intent.parameter("extra"), Some("x"));
    }

    #[test]
    fn test_unknown_action() {
        let json = r#"{"result": {"action": "delete_cluster", "parameters": {}}}"#;
        let request: WebhookRequest = serde_json::from_str(json).unwrap();
        let err = IntentRequest::from_webhook(request).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownAction(ref a) if a == "delete_cluster"));
    }

    #[test]
    fn test_action_names_round_trip() {
        for action in [
            Action::ClusterStatus,
            Action::CreateDeployment,
            Action::ScaleDeployment,
            Action::UpdateDeployment,
        ] {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
    }

    #[test]
    fn test_operation_result_serialization() {
        let result = OperationResult::say("Scaling the nginx deployment to 3.");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["speech"], "Scaling the nginx deployment to 3.");
        assert_eq!(value["displayText"], "Scaling the nginx deployment to 3.");
        assert_eq!(value["source"], "kubernetes-webhook");
    }
}
