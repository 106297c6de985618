//! Resource types and their typed parameters.
//!
//! A resource document is a YAML file describing one remote resource. Every
//! document has an identity key (`id` for detections, `parser.function_id`
//! for data sources) that never changes over its lifetime, plus an etag
//! that is only ever filled in from the remote copy.

pub mod parser;

use anyhow::Result;
use armkit::{
    AlertRuleKind, AlertRuleRequest, DEFAULT_TRIGGER_NAME, PARSER_CATEGORY, SavedSearchProperties,
    SavedSearchRequest,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of resource documents this tool deploys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    ScheduledDetection,
    MicrosoftSecurityDetection,
    DataSource,
}

impl ResourceType {
    pub const ALL: [Self; 3] = [
        Self::ScheduledDetection,
        Self::MicrosoftSecurityDetection,
        Self::DataSource,
    ];

    /// Human-readable name, singular
    pub fn label(&self) -> &'static str {
        match self {
            Self::ScheduledDetection => "detection",
            Self::MicrosoftSecurityDetection => "Microsoft security detection",
            Self::DataSource => "data source",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Playbook reference
// ============================================================================

/// Where a detection's response playbook lives.
///
/// The playbook may sit in another subscription than the rule; the router
/// must have clients for `subscription_id` for the link to succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookInfo {
    pub name: String,
    pub subscription_id: String,
    pub resource_group_name: String,
    pub workspace_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_name: Option<String>,
}

impl PlaybookInfo {
    pub fn trigger(&self) -> &str {
        self.trigger_name.as_deref().unwrap_or(DEFAULT_TRIGGER_NAME)
    }
}

// ============================================================================
// Rule bodies
// ============================================================================
//
// Documents use snake_case keys; the service wants camelCase properties.
// Fields not listed here are dropped during parsing.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
    Low,
    Informational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerOperator {
    GreaterThan,
    LessThan,
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct GroupingConfiguration {
    pub enabled: bool,
    pub reopen_closed_incident: bool,
    pub lookback_duration: String,
    pub matching_method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by_entities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct IncidentConfiguration {
    pub create_incident: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping_configuration: Option<GroupingConfiguration>,
}

/// Body of a scheduled (query-based) alert rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct ScheduledRule {
    pub display_name: String,
    pub enabled: bool,
    pub suppression_duration: String,
    pub suppression_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_operator: Option<TriggerOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_rule_template_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tactics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_configuration: Option<IncidentConfiguration>,
}

/// Body of a rule that turns Microsoft security product alerts into incidents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct MicrosoftSecurityRule {
    pub display_name: String,
    pub enabled: bool,
    pub product_filter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_rule_template_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub severities_filter: Vec<Severity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub display_names_filter: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub display_names_exclude_filter: Vec<String>,
}

// ============================================================================
// Parameters
// ============================================================================

/// A parser function deployed as a saved search.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParserParams {
    pub function_id: String,
    pub display_name: String,
    pub query: String,
    #[serde(skip)]
    pub etag: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledDetectionParams {
    pub rule_id: String,
    pub etag: Option<String>,
    pub playbook: Option<PlaybookInfo>,
    pub additional_metadata: Option<serde_json::Value>,
    pub rule: ScheduledRule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MicrosoftSecurityDetectionParams {
    pub rule_id: String,
    pub etag: Option<String>,
    pub additional_metadata: Option<serde_json::Value>,
    pub rule: MicrosoftSecurityRule,
}

/// Parsed document, one variant per resource type.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceParams {
    Parser(ParserParams),
    Scheduled(ScheduledDetectionParams),
    MicrosoftSecurity(MicrosoftSecurityDetectionParams),
}

impl ResourceParams {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Parser(_) => ResourceType::DataSource,
            Self::Scheduled(_) => ResourceType::ScheduledDetection,
            Self::MicrosoftSecurity(_) => ResourceType::MicrosoftSecurityDetection,
        }
    }

    /// Identity key: rule id or parser function id
    pub fn identity(&self) -> &str {
        match self {
            Self::Parser(p) => &p.function_id,
            Self::Scheduled(p) => &p.rule_id,
            Self::MicrosoftSecurity(p) => &p.rule_id,
        }
    }

    pub fn etag(&self) -> Option<&str> {
        match self {
            Self::Parser(p) => p.etag.as_deref(),
            Self::Scheduled(p) => p.etag.as_deref(),
            Self::MicrosoftSecurity(p) => p.etag.as_deref(),
        }
    }

    pub fn set_etag(&mut self, etag: Option<String>) {
        match self {
            Self::Parser(p) => p.etag = etag,
            Self::Scheduled(p) => p.etag = etag,
            Self::MicrosoftSecurity(p) => p.etag = etag,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Parser(p) => &p.display_name,
            Self::Scheduled(p) => &p.rule.display_name,
            Self::MicrosoftSecurity(p) => &p.rule.display_name,
        }
    }

    /// Linked playbook, for scheduled detections only
    pub fn playbook(&self) -> Option<&PlaybookInfo> {
        match self {
            Self::Scheduled(p) => p.playbook.as_ref(),
            _ => None,
        }
    }

    /// Outgoing alert rule payload; `None` for parsers
    pub fn alert_rule_request(&self) -> Result<Option<AlertRuleRequest>> {
        let (kind, properties) = match self {
            Self::Parser(_) => return Ok(None),
            Self::Scheduled(p) => (AlertRuleKind::Scheduled, serde_json::to_value(&p.rule)?),
            Self::MicrosoftSecurity(p) => (
                AlertRuleKind::MicrosoftSecurityIncidentCreation,
                serde_json::to_value(&p.rule)?,
            ),
        };
        Ok(Some(AlertRuleRequest {
            kind,
            etag: self.etag().map(str::to_string),
            properties,
        }))
    }

    /// Outgoing saved search payload; `None` for detections
    pub fn saved_search_request(&self) -> Option<SavedSearchRequest> {
        let Self::Parser(p) = self else {
            return None;
        };
        Some(SavedSearchRequest {
            etag: p.etag.clone(),
            properties: SavedSearchProperties {
                category: PARSER_CATEGORY.to_string(),
                display_name: p.display_name.clone(),
                query: p.query.clone(),
                function_alias: Some(p.display_name.clone()),
            },
        })
    }
}
