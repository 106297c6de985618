//! Backend traits and implementations for the remote CRUD boundary.
//!
//! Two traits mirror the two clients a Sentinel deployment needs per
//! subscription: [`InsightsApi`] for workspace-scoped resources (alert
//! rules, their actions, saved searches) and [`WorkflowApi`] for Logic App
//! workflows. [`arm::ArmBackend`] implements both over HTTP.
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use armkit::backend::{InsightsApi, MockBackend};
//! use armkit::WorkspaceScope;
//!
//! let mock = MockBackend::new();
//! let scope = WorkspaceScope::new("sub", "rg", "ws");
//! assert!(mock.get_alert_rule(&scope, "missing").unwrap().is_none());
//! ```

pub mod arm;

use crate::error::{Error, Result};
use crate::types::{
    Action, ActionProperties, ActionRequest, AlertRule, AlertRuleKind, AlertRuleRequest,
    DEFAULT_TRIGGER_NAME, SavedSearch, SavedSearchRequest, Workflow, WorkspaceScope,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Workspace-scoped Sentinel and Log Analytics operations.
///
/// `get_*` calls return `Ok(None)` when the resource does not exist; every
/// other failure is an `Err`.
pub trait InsightsApi: Send + Sync {
    /// Fetch an alert rule by id.
    fn get_alert_rule(&self, scope: &WorkspaceScope, rule_id: &str) -> Result<Option<AlertRule>>;

    /// Create or replace an alert rule.
    fn create_or_update_alert_rule(
        &self,
        scope: &WorkspaceScope,
        rule_id: &str,
        rule: &AlertRuleRequest,
    ) -> Result<AlertRule>;

    /// List all alert rules in the workspace.
    fn list_alert_rules(&self, scope: &WorkspaceScope) -> Result<Vec<AlertRule>>;

    /// Delete an alert rule.
    fn delete_alert_rule(&self, scope: &WorkspaceScope, rule_id: &str) -> Result<()>;

    /// List the actions attached to an alert rule.
    fn list_actions(&self, scope: &WorkspaceScope, rule_id: &str) -> Result<Vec<Action>>;

    /// Create or replace an action under an alert rule.
    fn create_or_update_action(
        &self,
        scope: &WorkspaceScope,
        rule_id: &str,
        action_id: &str,
        action: &ActionRequest,
    ) -> Result<Action>;

    /// Delete an action from an alert rule.
    fn delete_action(&self, scope: &WorkspaceScope, rule_id: &str, action_id: &str) -> Result<()>;

    /// Fetch a saved search by id.
    fn get_saved_search(
        &self,
        scope: &WorkspaceScope,
        saved_search_id: &str,
    ) -> Result<Option<SavedSearch>>;

    /// Create or replace a saved search.
    fn create_or_update_saved_search(
        &self,
        scope: &WorkspaceScope,
        saved_search_id: &str,
        search: &SavedSearchRequest,
    ) -> Result<SavedSearch>;

    /// List all saved searches in the workspace.
    fn list_saved_searches(&self, scope: &WorkspaceScope) -> Result<Vec<SavedSearch>>;

    /// Delete a saved search.
    fn delete_saved_search(&self, scope: &WorkspaceScope, saved_search_id: &str) -> Result<()>;
}

/// Logic App operations. Workflows live in a resource group, so the
/// workspace part of the scope is ignored.
pub trait WorkflowApi: Send + Sync {
    /// Fetch a workflow by name.
    fn get_workflow(&self, scope: &WorkspaceScope, name: &str) -> Result<Option<Workflow>>;

    /// Get the callback URL of one of the workflow's triggers.
    fn trigger_callback_url(
        &self,
        scope: &WorkspaceScope,
        workflow: &str,
        trigger: &str,
    ) -> Result<String>;
}

// ============================================================================
// Mock backend
// ============================================================================

/// A call observed by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `get_alert_rule(rule_id)`
    GetAlertRule(String),
    /// `create_or_update_alert_rule(rule_id)`
    PutAlertRule(String),
    /// `list_alert_rules`
    ListAlertRules,
    /// `delete_alert_rule(rule_id)`
    DeleteAlertRule(String),
    /// `list_actions(rule_id)`
    ListActions(String),
    /// `create_or_update_action`
    PutAction {
        /// Owning rule.
        rule_id: String,
        /// Action name.
        action_id: String,
    },
    /// `delete_action`
    DeleteAction {
        /// Owning rule.
        rule_id: String,
        /// Action name.
        action_id: String,
    },
    /// `get_saved_search(id)`
    GetSavedSearch(String),
    /// `create_or_update_saved_search(id)`
    PutSavedSearch(String),
    /// `list_saved_searches`
    ListSavedSearches,
    /// `delete_saved_search(id)`
    DeleteSavedSearch(String),
    /// `get_workflow(name)`
    GetWorkflow(String),
    /// `trigger_callback_url`
    TriggerCallbackUrl {
        /// Workflow name.
        workflow: String,
        /// Trigger name.
        trigger: String,
    },
}

impl Call {
    /// Whether this call writes remote state.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::PutAlertRule(_)
                | Self::DeleteAlertRule(_)
                | Self::PutAction { .. }
                | Self::DeleteAction { .. }
                | Self::PutSavedSearch(_)
                | Self::DeleteSavedSearch(_)
        )
    }
}

type Key = (WorkspaceScope, String);

#[derive(Debug, Default)]
struct MockState {
    rules: BTreeMap<Key, AlertRule>,
    actions: BTreeMap<Key, Vec<Action>>,
    searches: BTreeMap<Key, SavedSearch>,
    workflows: BTreeMap<(String, String, String), Workflow>,
    calls: Vec<Call>,
    failures: Vec<(Call, u16)>,
    etag_counter: u64,
}

impl MockState {
    fn next_etag(&mut self) -> String {
        self.etag_counter += 1;
        format!("\"etag-{}\"", self.etag_counter)
    }

    /// Record a call and return the injected failure for it, if any.
    fn record(&mut self, call: Call) -> Result<()> {
        let failure = self
            .failures
            .iter()
            .find(|(c, _)| *c == call)
            .map(|(_, status)| *status);
        self.calls.push(call);
        match failure {
            Some(status) => Err(Error::from_response(status, "injected failure")),
            None => Ok(()),
        }
    }
}

/// In-memory backend for testing without network access.
///
/// Writes are checked the way ARM checks them: replacing an existing rule,
/// action or saved search requires its current etag, and creating one with
/// an etag fails with a precondition error. Every call is logged and can be
/// made to fail with [`MockBackend::fail`].
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

fn check_etag(existing: Option<&str>, sent: Option<&str>, what: &str) -> Result<()> {
    match (existing, sent) {
        (None, None) => Ok(()),
        (Some(current), Some(sent)) if current == sent => Ok(()),
        (Some(_), None) => Err(Error::Conflict {
            status: 409,
            message: format!("{what} already exists and no etag was supplied"),
        }),
        (None, Some(_)) => Err(Error::Conflict {
            status: 412,
            message: format!("{what} does not exist but an etag was supplied"),
        }),
        (Some(_), Some(_)) => Err(Error::Conflict {
            status: 412,
            message: format!("{what} etag is stale"),
        }),
    }
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every future occurrence of `call` fail with the given HTTP status.
    pub fn fail(&self, call: Call, status: u16) {
        self.state().failures.push((call, status));
    }

    /// All calls observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Forget the observed calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Seed an alert rule and return its etag.
    pub fn insert_alert_rule(
        &self,
        scope: &WorkspaceScope,
        rule_id: &str,
        kind: AlertRuleKind,
        properties: serde_json::Value,
    ) -> String {
        let mut state = self.state();
        let etag = state.next_etag();
        let rule = AlertRule {
            id: alert_rule_resource_id(scope, rule_id),
            name: rule_id.to_string(),
            etag: Some(etag.clone()),
            kind,
            properties,
        };
        state.rules.insert((scope.clone(), rule_id.to_string()), rule);
        etag
    }

    /// Seed an action linking `rule_id` to a Logic App.
    pub fn insert_action(
        &self,
        scope: &WorkspaceScope,
        rule_id: &str,
        action_id: &str,
        logic_app_resource_id: &str,
    ) {
        let mut state = self.state();
        let etag = state.next_etag();
        let action = Action {
            id: format!("{}/actions/{}", alert_rule_resource_id(scope, rule_id), action_id),
            name: action_id.to_string(),
            etag: Some(etag),
            properties: ActionProperties {
                logic_app_resource_id: logic_app_resource_id.to_string(),
                workflow_id: None,
            },
        };
        state
            .actions
            .entry((scope.clone(), rule_id.to_string()))
            .or_default()
            .push(action);
    }

    /// Seed a workflow with the default Sentinel alert trigger.
    pub fn insert_workflow(&self, subscription_id: &str, resource_group: &str, name: &str) -> Workflow {
        let workflow = Workflow {
            id: format!(
                "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Logic/workflows/{name}"
            ),
            name: name.to_string(),
            location: Some("westeurope".to_string()),
        };
        self.state().workflows.insert(
            (
                subscription_id.to_string(),
                resource_group.to_string(),
                name.to_string(),
            ),
            workflow.clone(),
        );
        workflow
    }

    /// Current state of an alert rule.
    #[must_use]
    pub fn alert_rule(&self, scope: &WorkspaceScope, rule_id: &str) -> Option<AlertRule> {
        self.state()
            .rules
            .get(&(scope.clone(), rule_id.to_string()))
            .cloned()
    }

    /// Actions currently attached to an alert rule.
    #[must_use]
    pub fn actions(&self, scope: &WorkspaceScope, rule_id: &str) -> Vec<Action> {
        self.state()
            .actions
            .get(&(scope.clone(), rule_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Current state of a saved search.
    #[must_use]
    pub fn saved_search(&self, scope: &WorkspaceScope, saved_search_id: &str) -> Option<SavedSearch> {
        self.state()
            .searches
            .get(&(scope.clone(), saved_search_id.to_string()))
            .cloned()
    }
}

fn alert_rule_resource_id(scope: &WorkspaceScope, rule_id: &str) -> String {
    format!(
        "/{}/providers/Microsoft.SecurityInsights/alertRules/{}",
        scope.workspace_path(),
        rule_id
    )
}

/// Callback URL the mock hands out for a workflow trigger.
#[must_use]
pub fn mock_callback_url(workflow: &str, trigger: &str) -> String {
    format!("https://prod-00.westeurope.logic.azure.com/workflows/{workflow}/triggers/{trigger}/paths/invoke")
}

impl InsightsApi for MockBackend {
    fn get_alert_rule(&self, scope: &WorkspaceScope, rule_id: &str) -> Result<Option<AlertRule>> {
        let mut state = self.state();
        state.record(Call::GetAlertRule(rule_id.to_string()))?;
        Ok(state.rules.get(&(scope.clone(), rule_id.to_string())).cloned())
    }

    fn create_or_update_alert_rule(
        &self,
        scope: &WorkspaceScope,
        rule_id: &str,
        rule: &AlertRuleRequest,
    ) -> Result<AlertRule> {
        let mut state = self.state();
        state.record(Call::PutAlertRule(rule_id.to_string()))?;

        let key = (scope.clone(), rule_id.to_string());
        let existing = state.rules.get(&key).and_then(|r| r.etag.clone());
        check_etag(existing.as_deref(), rule.etag.as_deref(), "alert rule")?;

        let stored = AlertRule {
            id: alert_rule_resource_id(scope, rule_id),
            name: rule_id.to_string(),
            etag: Some(state.next_etag()),
            kind: rule.kind,
            properties: rule.properties.clone(),
        };
        state.rules.insert(key, stored.clone());
        Ok(stored)
    }

    fn list_alert_rules(&self, scope: &WorkspaceScope) -> Result<Vec<AlertRule>> {
        let mut state = self.state();
        state.record(Call::ListAlertRules)?;
        Ok(state
            .rules
            .iter()
            .filter(|((s, _), _)| s == scope)
            .map(|(_, rule)| rule.clone())
            .collect())
    }

    fn delete_alert_rule(&self, scope: &WorkspaceScope, rule_id: &str) -> Result<()> {
        let mut state = self.state();
        state.record(Call::DeleteAlertRule(rule_id.to_string()))?;
        let key = (scope.clone(), rule_id.to_string());
        if state.rules.remove(&key).is_none() {
            return Err(Error::from_response(404, "alert rule not found"));
        }
        state.actions.remove(&key);
        Ok(())
    }

    fn list_actions(&self, scope: &WorkspaceScope, rule_id: &str) -> Result<Vec<Action>> {
        let mut state = self.state();
        state.record(Call::ListActions(rule_id.to_string()))?;
        Ok(state
            .actions
            .get(&(scope.clone(), rule_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn create_or_update_action(
        &self,
        scope: &WorkspaceScope,
        rule_id: &str,
        action_id: &str,
        action: &ActionRequest,
    ) -> Result<Action> {
        let mut state = self.state();
        state.record(Call::PutAction {
            rule_id: rule_id.to_string(),
            action_id: action_id.to_string(),
        })?;

        let key = (scope.clone(), rule_id.to_string());
        if !state.rules.contains_key(&key) {
            return Err(Error::from_response(404, "alert rule not found"));
        }

        let existing = state
            .actions
            .get(&key)
            .and_then(|actions| actions.iter().find(|a| a.name == action_id))
            .and_then(|a| a.etag.clone());
        check_etag(existing.as_deref(), action.etag.as_deref(), "action")?;

        let stored = Action {
            id: format!("{}/actions/{}", alert_rule_resource_id(scope, rule_id), action_id),
            name: action_id.to_string(),
            etag: Some(state.next_etag()),
            properties: ActionProperties {
                logic_app_resource_id: action.properties.logic_app_resource_id.clone(),
                workflow_id: None,
            },
        };
        let actions = state.actions.entry(key).or_default();
        actions.retain(|a| a.name != action_id);
        actions.push(stored.clone());
        Ok(stored)
    }

    fn delete_action(&self, scope: &WorkspaceScope, rule_id: &str, action_id: &str) -> Result<()> {
        let mut state = self.state();
        state.record(Call::DeleteAction {
            rule_id: rule_id.to_string(),
            action_id: action_id.to_string(),
        })?;
        let actions = state
            .actions
            .entry((scope.clone(), rule_id.to_string()))
            .or_default();
        let before = actions.len();
        actions.retain(|a| a.name != action_id);
        if actions.len() == before {
            return Err(Error::from_response(404, "action not found"));
        }
        Ok(())
    }

    fn get_saved_search(
        &self,
        scope: &WorkspaceScope,
        saved_search_id: &str,
    ) -> Result<Option<SavedSearch>> {
        let mut state = self.state();
        state.record(Call::GetSavedSearch(saved_search_id.to_string()))?;
        Ok(state
            .searches
            .get(&(scope.clone(), saved_search_id.to_string()))
            .cloned())
    }

    fn create_or_update_saved_search(
        &self,
        scope: &WorkspaceScope,
        saved_search_id: &str,
        search: &SavedSearchRequest,
    ) -> Result<SavedSearch> {
        let mut state = self.state();
        state.record(Call::PutSavedSearch(saved_search_id.to_string()))?;

        let key = (scope.clone(), saved_search_id.to_string());
        let existing = state.searches.get(&key).and_then(|s| s.etag.clone());
        check_etag(existing.as_deref(), search.etag.as_deref(), "saved search")?;

        let stored = SavedSearch {
            id: format!("/{}", scope.saved_search_id(saved_search_id)),
            name: saved_search_id.to_string(),
            etag: Some(state.next_etag()),
            properties: search.properties.clone(),
        };
        state.searches.insert(key, stored.clone());
        Ok(stored)
    }

    fn list_saved_searches(&self, scope: &WorkspaceScope) -> Result<Vec<SavedSearch>> {
        let mut state = self.state();
        state.record(Call::ListSavedSearches)?;
        Ok(state
            .searches
            .iter()
            .filter(|((s, _), _)| s == scope)
            .map(|(_, search)| search.clone())
            .collect())
    }

    fn delete_saved_search(&self, scope: &WorkspaceScope, saved_search_id: &str) -> Result<()> {
        let mut state = self.state();
        state.record(Call::DeleteSavedSearch(saved_search_id.to_string()))?;
        if state
            .searches
            .remove(&(scope.clone(), saved_search_id.to_string()))
            .is_none()
        {
            return Err(Error::from_response(404, "saved search not found"));
        }
        Ok(())
    }
}

impl WorkflowApi for MockBackend {
    fn get_workflow(&self, scope: &WorkspaceScope, name: &str) -> Result<Option<Workflow>> {
        let mut state = self.state();
        state.record(Call::GetWorkflow(name.to_string()))?;
        Ok(state
            .workflows
            .get(&(
                scope.subscription_id.clone(),
                scope.resource_group.clone(),
                name.to_string(),
            ))
            .cloned())
    }

    fn trigger_callback_url(
        &self,
        scope: &WorkspaceScope,
        workflow: &str,
        trigger: &str,
    ) -> Result<String> {
        let mut state = self.state();
        state.record(Call::TriggerCallbackUrl {
            workflow: workflow.to_string(),
            trigger: trigger.to_string(),
        })?;

        let known = state.workflows.contains_key(&(
            scope.subscription_id.clone(),
            scope.resource_group.clone(),
            workflow.to_string(),
        ));
        if !known || trigger != DEFAULT_TRIGGER_NAME {
            return Err(Error::NotFound {
                kind: "workflow trigger",
                name: format!("{workflow}/{trigger}"),
            });
        }
        Ok(mock_callback_url(workflow, trigger))
    }
}
