//! Wire models for the Sentinel, Logic Apps and Log Analytics APIs.
//!
//! Request types carry only what a client may send; response types keep
//! the rule `properties` as raw JSON so `show`/`list` can print whatever
//! the service returns.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource provider that hosts Sentinel workspaces.
pub const OPERATIONAL_INSIGHTS_PROVIDER: &str = "Microsoft.OperationalInsights";

/// Saved-search category used for parser functions.
pub const PARSER_CATEGORY: &str = "parser";

/// Trigger name of a Sentinel alert playbook.
pub const DEFAULT_TRIGGER_NAME: &str = "When_a_response_to_an_Azure_Sentinel_alert_is_triggered";

/// A Log Analytics workspace in a given subscription and resource group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkspaceScope {
    /// Subscription id.
    pub subscription_id: String,
    /// Resource group name.
    pub resource_group: String,
    /// Workspace name.
    pub workspace: String,
}

impl WorkspaceScope {
    /// Create a new scope.
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            workspace: workspace.into(),
        }
    }

    /// ARM path of the workspace, without a leading slash.
    #[must_use]
    pub fn workspace_path(&self) -> String {
        format!(
            "subscriptions/{}/resourceGroups/{}/providers/{}/workspaces/{}",
            self.subscription_id, self.resource_group, OPERATIONAL_INSIGHTS_PROVIDER, self.workspace
        )
    }

    /// Full resource id of a saved search in this workspace.
    #[must_use]
    pub fn saved_search_id(&self, saved_search: &str) -> String {
        format!("{}/savedSearches/{}", self.workspace_path(), saved_search)
    }
}

impl fmt::Display for WorkspaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.subscription_id, self.resource_group, self.workspace
        )
    }
}

// ============================================================================
// Alert rules
// ============================================================================

/// Kind discriminator of an alert rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertRuleKind {
    /// Query-based rule that runs on a schedule.
    Scheduled,
    /// Rule that turns alerts of a Microsoft security product into incidents.
    MicrosoftSecurityIncidentCreation,
    /// Fusion correlation rule (read-only here).
    Fusion,
    /// Any kind this client does not model.
    #[serde(other)]
    Other,
}

/// Alert rule as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Full ARM resource id.
    #[serde(default)]
    pub id: String,
    /// Rule id (last id segment).
    #[serde(default)]
    pub name: String,
    /// Concurrency token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Rule kind.
    pub kind: AlertRuleKind,
    /// Rule properties as sent by the service.
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl AlertRule {
    /// Display name from the rule properties, if any.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.properties.get("displayName").and_then(|v| v.as_str())
    }
}

/// Body of an alert rule create-or-update call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRuleRequest {
    /// Rule kind.
    pub kind: AlertRuleKind,
    /// Concurrency token of the existing rule, when updating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// camelCase rule properties.
    pub properties: serde_json::Value,
}

// ============================================================================
// Actions (alert rule → playbook links)
// ============================================================================

/// Properties of an action attached to an alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionProperties {
    /// Resource id of the linked Logic App.
    #[serde(default)]
    pub logic_app_resource_id: String,
    /// Workflow id reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
}

/// Action as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Full ARM resource id.
    #[serde(default)]
    pub id: String,
    /// Action name (last id segment).
    #[serde(default)]
    pub name: String,
    /// Concurrency token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Link properties.
    pub properties: ActionProperties,
}

/// Body of an action create-or-update call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRequest {
    /// Concurrency token, when replacing an existing action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Link properties.
    pub properties: ActionRequestProperties,
}

/// Properties of an action create-or-update call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequestProperties {
    /// Resource id of the Logic App to link.
    pub logic_app_resource_id: String,
    /// Callback URL of the Logic App trigger.
    pub trigger_uri: String,
}

impl ActionRequest {
    /// Build a request linking the given workflow through its trigger URL.
    pub fn link(logic_app_resource_id: impl Into<String>, trigger_uri: impl Into<String>) -> Self {
        Self {
            etag: None,
            properties: ActionRequestProperties {
                logic_app_resource_id: logic_app_resource_id.into(),
                trigger_uri: trigger_uri.into(),
            },
        }
    }
}

// ============================================================================
// Workflows (Logic Apps)
// ============================================================================

/// Logic App workflow, reduced to what linking needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Full ARM resource id.
    pub id: String,
    /// Workflow name.
    pub name: String,
    /// Azure region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Response of a `listCallbackUrl` call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallbackUrl {
    /// Trigger callback URL.
    pub value: String,
}

// ============================================================================
// Saved searches (parser functions)
// ============================================================================

/// Saved search properties, shared by requests and responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearchProperties {
    /// Category; parsers use [`PARSER_CATEGORY`].
    pub category: String,
    /// Display name.
    pub display_name: String,
    /// KQL query.
    pub query: String,
    /// Function alias the query is callable by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_alias: Option<String>,
}

/// Saved search as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSearch {
    /// Full ARM resource id.
    #[serde(default)]
    pub id: String,
    /// Saved search id (last id segment).
    #[serde(default)]
    pub name: String,
    /// Concurrency token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Search properties.
    pub properties: SavedSearchProperties,
}

/// Body of a saved search create-or-update call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedSearchRequest {
    /// Concurrency token of the existing search, when updating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Search properties.
    pub properties: SavedSearchProperties,
}

/// ARM list envelope: `{"value": [...], "nextLink": "..."}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    /// Items of this page.
    #[serde(default)]
    pub value: Vec<T>,
    /// Link to the next page, if any.
    #[serde(default)]
    pub next_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_workspace_path() {
        let scope = WorkspaceScope::new("sub-1", "rg-sec", "ws-main");
        assert_eq!(
            scope.workspace_path(),
            "subscriptions/sub-1/resourceGroups/rg-sec/providers/Microsoft.OperationalInsights/workspaces/ws-main"
        );
        assert!(scope.saved_search_id("ParseDns").ends_with("/workspaces/ws-main/savedSearches/ParseDns"));
        assert_eq!(scope.to_string(), "sub-1/rg-sec/ws-main");
    }

    #[test]
    fn test_alert_rule_request_omits_missing_etag() {
        let request = AlertRuleRequest {
            kind: AlertRuleKind::Scheduled,
            etag: None,
            properties: json!({"displayName": "x"}),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["kind"], "Scheduled");
        assert!(value.get("etag").is_none());
    }

    #[test]
    fn test_alert_rule_unknown_kind() {
        let rule: AlertRule = serde_json::from_value(json!({
            "id": "/x/alertRules/r1",
            "name": "r1",
            "kind": "MLBehaviorAnalytics",
            "properties": {"displayName": "ml"}
        }))
        .unwrap();
        assert_eq!(rule.kind, AlertRuleKind::Other);
        assert_eq!(rule.display_name(), Some("ml"));
        assert!(rule.etag.is_none());
    }

    #[test]
    fn test_action_request_wire_shape() {
        let request = ActionRequest::link("/subs/x/workflows/isolate", "https://callback");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["properties"]["logicAppResourceId"], "/subs/x/workflows/isolate");
        assert_eq!(value["properties"]["triggerUri"], "https://callback");
    }

    #[test]
    fn test_page_without_next_link() {
        let page: Page<Action> = serde_json::from_value(json!({
            "value": [{"name": "a1", "properties": {"logicAppResourceId": "/w"}}]
        }))
        .unwrap();
        assert_eq!(page.value.len(), 1);
        assert!(page.next_link.is_none());
    }
}
