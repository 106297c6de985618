//! Azure Resource Manager backend.
//!
//! This module provides [`ArmBackend`], which implements [`InsightsApi`] and
//! [`WorkflowApi`] against the public management endpoint for one
//! subscription. The bearer token is fetched once when the backend is
//! created.
//!
//! # Example
//!
//! ```no_run
//! use armkit::backend::arm::ArmBackend;
//! use armkit::backend::InsightsApi;
//! use armkit::{AzureCliCredential, WorkspaceScope};
//!
//! let backend = ArmBackend::connect(&AzureCliCredential::new(), "sub-id").unwrap();
//! let scope = WorkspaceScope::new("sub-id", "rg", "ws");
//! let rules = backend.list_alert_rules(&scope).unwrap();
//! println!("Found {} rules", rules.len());
//! ```

use crate::backend::{InsightsApi, WorkflowApi};
use crate::credential::{TokenSource, management_resource};
use crate::error::{Error, Result};
use crate::types::{
    Action, ActionRequest, AlertRule, AlertRuleRequest, CallbackUrl, Page, SavedSearch,
    SavedSearchRequest, Workflow, WorkspaceScope,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use ureq::Body;
use ureq::http::Response;

/// Public Azure management endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

const SECURITY_INSIGHTS_API_VERSION: &str = "2021-10-01";
const LOGIC_API_VERSION: &str = "2019-05-01";
const LOG_ANALYTICS_API_VERSION: &str = "2020-08-01";

/// Upper bound on `nextLink` pages followed by a single list call.
const MAX_PAGES: usize = 100;

const USER_AGENT: &str = concat!("sentinel-deploy/", env!("CARGO_PKG_VERSION"));

/// ARM backend bound to one subscription.
pub struct ArmBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Management endpoint, without trailing slash.
    endpoint: String,
    /// Subscription the token was issued for.
    subscription_id: String,
    /// `Bearer <token>` header value.
    authorization: String,
}

impl ArmBackend {
    /// Create a backend for `subscription_id`, fetching a token from `credential`.
    pub fn connect(credential: &dyn TokenSource, subscription_id: &str) -> Result<Self> {
        Self::connect_to(credential, subscription_id, DEFAULT_ENDPOINT)
    }

    /// Create a backend against a custom management endpoint.
    ///
    /// The token is requested for the endpoint's own audience.
    pub fn connect_to(
        credential: &dyn TokenSource,
        subscription_id: &str,
        endpoint: &str,
    ) -> Result<Self> {
        log::debug!("fetching ARM token for subscription {subscription_id}");
        let token = credential.token(subscription_id, &management_resource(endpoint))?;

        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(120)))
            .build();

        Ok(Self {
            agent: ureq::Agent::new_with_config(config),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            subscription_id: subscription_id.to_string(),
            authorization: format!("Bearer {token}"),
        })
    }

    /// Subscription this backend talks to.
    #[must_use]
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Management endpoint in use.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // ========================================================================
    // URL builders
    // ========================================================================

    fn alert_rules_url(&self, scope: &WorkspaceScope) -> String {
        format!(
            "{}/{}/providers/Microsoft.SecurityInsights/alertRules",
            self.endpoint,
            scope.workspace_path()
        )
    }

    fn alert_rule_url(&self, scope: &WorkspaceScope, rule_id: &str) -> String {
        format!("{}/{}", self.alert_rules_url(scope), rule_id)
    }

    fn actions_url(&self, scope: &WorkspaceScope, rule_id: &str) -> String {
        format!("{}/actions", self.alert_rule_url(scope, rule_id))
    }

    fn saved_searches_url(&self, scope: &WorkspaceScope) -> String {
        format!("{}/{}/savedSearches", self.endpoint, scope.workspace_path())
    }

    fn workflow_url(&self, scope: &WorkspaceScope, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Logic/workflows/{}",
            self.endpoint, scope.subscription_id, scope.resource_group, name
        )
    }

    // ========================================================================
    // HTTP helpers
    // ========================================================================

    fn get<T: DeserializeOwned>(&self, url: &str, api_version: &str) -> Result<Option<T>> {
        log::debug!("GET {url}");
        let mut response = self
            .agent
            .get(url)
            .query("api-version", api_version)
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", USER_AGENT)
            .call()?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        read_json(&mut response).map(Some)
    }

    fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        api_version: &str,
        body: &B,
    ) -> Result<T> {
        log::debug!("PUT {url}");
        let mut response = self
            .agent
            .put(url)
            .query("api-version", api_version)
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", USER_AGENT)
            .send_json(body)?;
        read_json(&mut response)
    }

    fn post_empty<T: DeserializeOwned>(&self, url: &str, api_version: &str) -> Result<T> {
        log::debug!("POST {url}");
        let mut response = self
            .agent
            .post(url)
            .query("api-version", api_version)
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", USER_AGENT)
            .send_empty()?;
        read_json(&mut response)
    }

    fn delete(&self, url: &str, api_version: &str) -> Result<()> {
        log::debug!("DELETE {url}");
        let mut response = self
            .agent
            .delete(url)
            .query("api-version", api_version)
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", USER_AGENT)
            .call()?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(());
        }
        let body = response.body_mut().read_to_string().unwrap_or_default();
        Err(Error::from_response(status, &body))
    }

    /// GET a list endpoint, following `nextLink` until exhausted.
    fn list<T: DeserializeOwned>(&self, url: &str, api_version: &str) -> Result<Vec<T>> {
        // Unlike a single get, a 404 here means the workspace itself is missing.
        log::debug!("GET {url}");
        let mut response = self
            .agent
            .get(url)
            .query("api-version", api_version)
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", USER_AGENT)
            .call()?;
        let mut page: Page<T> = read_json(&mut response)?;

        let mut items = Vec::new();

        for _ in 0..MAX_PAGES {
            items.append(&mut page.value);
            let Some(next) = page.next_link.take() else {
                return Ok(items);
            };
            // nextLink already carries the api-version and skip token.
            log::debug!("GET {next}");
            let mut response = self
                .agent
                .get(&next)
                .header("Authorization", self.authorization.as_str())
                .header("User-Agent", USER_AGENT)
                .call()?;
            page = read_json(&mut response)?;
        }

        log::warn!("stopped listing {url} after {MAX_PAGES} pages");
        Ok(items)
    }
}

/// Decode a JSON body, turning non-success statuses into errors.
fn read_json<T: DeserializeOwned>(response: &mut Response<Body>) -> Result<T> {
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string()?;
    if !(200..300).contains(&status) {
        return Err(Error::from_response(status, &body));
    }
    Ok(serde_json::from_str(&body)?)
}

impl InsightsApi for ArmBackend {
    fn get_alert_rule(&self, scope: &WorkspaceScope, rule_id: &str) -> Result<Option<AlertRule>> {
        self.get(&self.alert_rule_url(scope, rule_id), SECURITY_INSIGHTS_API_VERSION)
    }

    fn create_or_update_alert_rule(
        &self,
        scope: &WorkspaceScope,
        rule_id: &str,
        rule: &AlertRuleRequest,
    ) -> Result<AlertRule> {
        self.put(
            &self.alert_rule_url(scope, rule_id),
            SECURITY_INSIGHTS_API_VERSION,
            rule,
        )
    }

    fn list_alert_rules(&self, scope: &WorkspaceScope) -> Result<Vec<AlertRule>> {
        self.list(&self.alert_rules_url(scope), SECURITY_INSIGHTS_API_VERSION)
    }

    fn delete_alert_rule(&self, scope: &WorkspaceScope, rule_id: &str) -> Result<()> {
        self.delete(&self.alert_rule_url(scope, rule_id), SECURITY_INSIGHTS_API_VERSION)
    }

    fn list_actions(&self, scope: &WorkspaceScope, rule_id: &str) -> Result<Vec<Action>> {
        self.list(&self.actions_url(scope, rule_id), SECURITY_INSIGHTS_API_VERSION)
    }

    fn create_or_update_action(
        &self,
        scope: &WorkspaceScope,
        rule_id: &str,
        action_id: &str,
        action: &ActionRequest,
    ) -> Result<Action> {
        let url = format!("{}/{}", self.actions_url(scope, rule_id), action_id);
        self.put(&url, SECURITY_INSIGHTS_API_VERSION, action)
    }

    fn delete_action(&self, scope: &WorkspaceScope, rule_id: &str, action_id: &str) -> Result<()> {
        let url = format!("{}/{}", self.actions_url(scope, rule_id), action_id);
        self.delete(&url, SECURITY_INSIGHTS_API_VERSION)
    }

    fn get_saved_search(
        &self,
        scope: &WorkspaceScope,
        saved_search_id: &str,
    ) -> Result<Option<SavedSearch>> {
        let url = format!("{}/{}", self.saved_searches_url(scope), saved_search_id);
        self.get(&url, LOG_ANALYTICS_API_VERSION)
    }

    fn create_or_update_saved_search(
        &self,
        scope: &WorkspaceScope,
        saved_search_id: &str,
        search: &SavedSearchRequest,
    ) -> Result<SavedSearch> {
        let url = format!("{}/{}", self.saved_searches_url(scope), saved_search_id);
        self.put(&url, LOG_ANALYTICS_API_VERSION, search)
    }

    fn list_saved_searches(&self, scope: &WorkspaceScope) -> Result<Vec<SavedSearch>> {
        self.list(&self.saved_searches_url(scope), LOG_ANALYTICS_API_VERSION)
    }

    fn delete_saved_search(&self, scope: &WorkspaceScope, saved_search_id: &str) -> Result<()> {
        let url = format!("{}/{}", self.saved_searches_url(scope), saved_search_id);
        self.delete(&url, LOG_ANALYTICS_API_VERSION)
    }
}

impl WorkflowApi for ArmBackend {
    fn get_workflow(&self, scope: &WorkspaceScope, name: &str) -> Result<Option<Workflow>> {
        self.get(&self.workflow_url(scope, name), LOGIC_API_VERSION)
    }

    fn trigger_callback_url(
        &self,
        scope: &WorkspaceScope,
        workflow: &str,
        trigger: &str,
    ) -> Result<String> {
        let url = format!(
            "{}/triggers/{}/listCallbackUrl",
            self.workflow_url(scope, workflow),
            trigger
        );
        let callback: CallbackUrl = self.post_empty(&url, LOGIC_API_VERSION)?;
        Ok(callback.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::StaticToken;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    fn backend() -> ArmBackend {
        ArmBackend::connect_to(&StaticToken::new("t0k"), "sub-1", "https://arm.example/").unwrap()
    }

    /// Answer a single request; the handle yields its request line.
    fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            loop {
                let mut header = String::new();
                if reader.read_line(&mut header).unwrap() == 0 || header == "\r\n" {
                    break;
                }
            }
            write!(
                stream,
                "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            request_line
        });
        (endpoint, handle)
    }

    const NOT_FOUND: &str =
        r#"{"error":{"code":"ResourceNotFound","message":"Workspace ws-typo was not found"}}"#;

    #[test]
    fn test_connect_uses_token_and_trims_endpoint() {
        let backend = backend();
        assert_eq!(backend.endpoint(), "https://arm.example");
        assert_eq!(backend.subscription_id(), "sub-1");
        assert_eq!(backend.authorization, "Bearer t0k");
    }

    #[test]
    fn test_alert_rule_urls() {
        let backend = backend();
        let scope = WorkspaceScope::new("sub-1", "rg", "ws");
        assert_eq!(
            backend.alert_rule_url(&scope, "r1"),
            "https://arm.example/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.OperationalInsights/workspaces/ws/providers/Microsoft.SecurityInsights/alertRules/r1"
        );
        assert!(backend.actions_url(&scope, "r1").ends_with("/alertRules/r1/actions"));
    }

    #[test]
    fn test_saved_search_and_workflow_urls() {
        let backend = backend();
        let scope = WorkspaceScope::new("sub-2", "rg-auto", "ignored");
        assert!(
            backend
                .saved_searches_url(&scope)
                .ends_with("/workspaces/ignored/savedSearches")
        );
        assert_eq!(
            backend.workflow_url(&scope, "isolate"),
            "https://arm.example/subscriptions/sub-2/resourceGroups/rg-auto/providers/Microsoft.Logic/workflows/isolate"
        );
    }

    #[test]
    fn test_list_on_missing_workspace_is_an_error() {
        let (endpoint, server) = serve_once(404, NOT_FOUND);
        let backend = ArmBackend::connect_to(&StaticToken::new("t"), "sub-1", &endpoint).unwrap();
        let scope = WorkspaceScope::new("sub-1", "rg", "ws-typo");

        let err = backend.list_alert_rules(&scope).unwrap_err();
        assert!(matches!(err, Error::Api { status: 404, ref code, .. } if code == "ResourceNotFound"));
        assert!(server.join().unwrap().contains("/alertRules?api-version="));
    }

    #[test]
    fn test_get_missing_rule_is_none() {
        let (endpoint, server) = serve_once(404, NOT_FOUND);
        let backend = ArmBackend::connect_to(&StaticToken::new("t"), "sub-1", &endpoint).unwrap();
        let scope = WorkspaceScope::new("sub-1", "rg", "ws");

        assert!(backend.get_alert_rule(&scope, "r1").unwrap().is_none());
        assert!(server.join().unwrap().contains("/alertRules/r1?api-version="));
    }

    #[test]
    fn test_list_reads_single_page() {
        let (endpoint, server) = serve_once(
            200,
            r#"{"value":[{"name":"r1","kind":"Scheduled","properties":{"displayName":"Port scan"}}]}"#,
        );
        let backend = ArmBackend::connect_to(&StaticToken::new("t"), "sub-1", &endpoint).unwrap();
        let scope = WorkspaceScope::new("sub-1", "rg", "ws");

        let rules = backend.list_alert_rules(&scope).unwrap();
        server.join().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].display_name(), Some("Port scan"));
    }
}
