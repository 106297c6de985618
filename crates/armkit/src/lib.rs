//! # armkit
//!
//! Minimal blocking client for the Azure Resource Manager calls a Sentinel
//! deployment needs.
//!
//! This crate provides functionality for:
//! - Sentinel alert rules and their playbook actions
//! - Log Analytics saved searches (parser functions)
//! - Logic App workflow lookup and trigger callback URLs
//! - Bearer tokens from the Azure CLI or the environment
//!
//! ## Example
//!
//! ```no_run
//! use armkit::{AzureCliCredential, Clients, WorkspaceScope};
//!
//! let clients = Clients::connect(&AzureCliCredential::new(), "sub-id", None)
//!     .expect("could not authenticate");
//!
//! let scope = WorkspaceScope::new("sub-id", "rg-sec", "ws-main");
//! for rule in clients.insights.list_alert_rules(&scope).unwrap() {
//!     println!("{} {}", rule.name, rule.display_name().unwrap_or("-"));
//! }
//! ```
//!
//! ## Testing
//!
//! [`MockBackend`] implements both client traits in memory and enforces
//! etag preconditions, so deployment logic can be tested offline.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod credential;
pub mod error;
pub mod types;

pub use backend::{InsightsApi, MockBackend, WorkflowApi};
pub use credential::{AzureCliCredential, StaticToken, TokenSource};
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    Action, ActionRequest, AlertRule, AlertRuleKind, AlertRuleRequest, DEFAULT_TRIGGER_NAME,
    PARSER_CATEGORY, SavedSearch, SavedSearchProperties, SavedSearchRequest, Workflow,
    WorkspaceScope,
};

use backend::arm::{ArmBackend, DEFAULT_ENDPOINT};
use std::sync::Arc;

/// The pair of clients bound to one subscription.
#[derive(Clone)]
pub struct Clients {
    /// Sentinel and Log Analytics client.
    pub insights: Arc<dyn InsightsApi>,
    /// Logic Apps client.
    pub workflows: Arc<dyn WorkflowApi>,
}

impl Clients {
    /// Authenticate against `subscription_id` and build both clients.
    ///
    /// `endpoint` overrides the public management endpoint (sovereign clouds).
    pub fn connect(
        credential: &dyn TokenSource,
        subscription_id: &str,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        let backend = ArmBackend::connect_to(
            credential,
            subscription_id,
            endpoint.unwrap_or(DEFAULT_ENDPOINT),
        )?;
        Ok(Self::from_backend(backend))
    }

    /// Use one backend for both clients (useful for testing).
    #[must_use]
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: InsightsApi + WorkflowApi + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            insights: backend.clone(),
            workflows: backend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clients_share_mock_state() {
        let mock = MockBackend::new();
        let clients = Clients::from_backend(mock.clone());
        let scope = WorkspaceScope::new("sub-1", "rg", "ws");

        mock.insert_workflow("sub-1", "rg", "isolate");
        assert!(clients.workflows.get_workflow(&scope, "isolate").unwrap().is_some());
        assert!(clients.insights.list_alert_rules(&scope).unwrap().is_empty());
        assert_eq!(mock.calls().len(), 2);
    }

    #[test]
    fn test_clients_connect_with_static_token() {
        let clients = Clients::connect(&StaticToken::new("t"), "sub-1", Some("https://arm.test"));
        assert!(clients.is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_token_audience_follows_endpoint() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let args = dir.path().join("args");
        let az = dir.path().join("az");
        std::fs::write(
            &az,
            format!(
                "#!/bin/sh\necho \"$@\" > '{}'\necho '{{\"accessToken\":\"tok\"}}'\n",
                args.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&az, std::fs::Permissions::from_mode(0o755)).unwrap();

        let credential = AzureCliCredential::with_executable(az.display().to_string());
        Clients::connect(
            &credential,
            "sub-1",
            Some("https://management.usgovcloudapi.net"),
        )
        .unwrap();

        let recorded = std::fs::read_to_string(&args).unwrap();
        assert!(
            recorded.contains("--resource https://management.usgovcloudapi.net/ --subscription sub-1"),
            "{recorded}"
        );
    }
}
