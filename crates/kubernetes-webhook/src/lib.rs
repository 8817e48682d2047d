//! Conversational control surface for a single Kubernetes cluster.
//!
//! This crate provides:
//! - Basic-Auth protected webhook endpoint for API.AI style intents
//! - Translation of loosely-typed intent parameters into deployment requests
//! - Create, scale and update operations against the Kubernetes apps API
//! - Cluster capacity reporting backed by the Google Cloud container and compute APIs
//! - Service-account credentials for the Google Cloud APIs

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Most async API methods can fail

pub mod auth;
pub mod cluster;
pub mod config;
pub mod credentials;
pub mod deployments;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod server;
pub mod translate;

pub use cluster::{ClusterInventory, GoogleCloudInventory};
pub use config::Config;
pub use credentials::{ServiceAccountTokenSource, StaticTokenSource, TokenSource};
pub use deployments::{DeploymentApi, KubeDeployments};
pub use dispatcher::{ClusterContext, Dispatcher};
pub use error::{ClusterApiError, ConfigError, CredentialsError, DispatchError, TranslationError};
pub use models::{Action, IntentRequest, OperationResult, WebhookRequest};
