//! Pass-through commands: show, delete and list.

use anyhow::{Context as _, Result};
use dialoguer::Confirm;

use crate::Context;
use crate::resource::ResourceType;
use crate::router::ExecutionContext;
use crate::ui;
use armkit::{AlertRuleKind, PARSER_CATEGORY};

fn rule_kind(resource_type: ResourceType) -> Option<AlertRuleKind> {
    match resource_type {
        ResourceType::ScheduledDetection => Some(AlertRuleKind::Scheduled),
        ResourceType::MicrosoftSecurityDetection => {
            Some(AlertRuleKind::MicrosoftSecurityIncidentCreation)
        }
        ResourceType::DataSource => None,
    }
}

/// The remote document for `id`, or a not-found error.
pub fn fetch(
    ctx: &ExecutionContext,
    resource_type: ResourceType,
    id: &str,
) -> Result<serde_json::Value> {
    let insights = &ctx.clients.insights;
    let value = match rule_kind(resource_type) {
        Some(_) => insights
            .get_alert_rule(&ctx.scope, id)?
            .map(serde_json::to_value)
            .transpose()?,
        None => insights
            .get_saved_search(&ctx.scope, id)?
            .map(serde_json::to_value)
            .transpose()?,
    };
    value.ok_or_else(|| {
        armkit::Error::NotFound {
            kind: resource_type.label(),
            name: id.to_string(),
        }
        .into()
    })
}

pub fn show(ctx: &ExecutionContext, resource_type: ResourceType, id: &str) -> Result<()> {
    ui::json(&fetch(ctx, resource_type, id)?);
    Ok(())
}

pub fn delete(
    app: &Context,
    ctx: &ExecutionContext,
    resource_type: ResourceType,
    id: &str,
    yes: bool,
) -> Result<()> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {resource_type} '{id}' from {}?", ctx.scope.workspace))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            ui::info("Cancelled");
            return Ok(());
        }
    }

    remove(ctx, resource_type, id)?;
    if !app.quiet {
        ui::success(&format!("Deleted {resource_type} '{id}'"));
    }
    Ok(())
}

pub fn remove(ctx: &ExecutionContext, resource_type: ResourceType, id: &str) -> Result<()> {
    let insights = &ctx.clients.insights;
    match rule_kind(resource_type) {
        Some(_) => insights.delete_alert_rule(&ctx.scope, id)?,
        None => insights.delete_saved_search(&ctx.scope, id)?,
    }
    log::info!("Deleted {resource_type} {id} from {}", ctx.scope);
    Ok(())
}

/// `(id, display name)` of every deployed resource of this type.
pub fn entries(ctx: &ExecutionContext, resource_type: ResourceType) -> Result<Vec<(String, String)>> {
    let insights = &ctx.clients.insights;
    let mut entries: Vec<(String, String)> = match rule_kind(resource_type) {
        Some(kind) => insights
            .list_alert_rules(&ctx.scope)?
            .into_iter()
            .filter(|rule| rule.kind == kind)
            .map(|rule| {
                let name = rule.display_name().unwrap_or_default().to_string();
                (rule.name, name)
            })
            .collect(),
        None => insights
            .list_saved_searches(&ctx.scope)?
            .into_iter()
            .filter(|search| search.properties.category.eq_ignore_ascii_case(PARSER_CATEGORY))
            .map(|search| (search.name, search.properties.display_name))
            .collect(),
    };
    entries.sort();
    Ok(entries)
}

pub fn list(app: &Context, ctx: &ExecutionContext, resource_type: ResourceType) -> Result<()> {
    let entries = entries(ctx, resource_type)?;
    if !app.quiet {
        ui::header(&format!("{} in {}", resource_type, ctx.scope.workspace));
    }
    if entries.is_empty() {
        ui::dim("none");
        return Ok(());
    }
    for (id, name) in &entries {
        ui::kv(id, name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::ClientRouter;
    use armkit::backend::Call;
    use armkit::{Clients, MockBackend, SavedSearchProperties, SavedSearchRequest};
    use serde_json::json;

    fn setup() -> (MockBackend, ExecutionContext) {
        let mock = MockBackend::new();
        let router = ClientRouter::new("sub-1", Clients::from_backend(mock.clone()));
        (mock, router.primary_context("rg", "ws"))
    }

    fn search(category: &str, name: &str) -> SavedSearchRequest {
        SavedSearchRequest {
            etag: None,
            properties: SavedSearchProperties {
                category: category.to_string(),
                display_name: name.to_string(),
                query: "Syslog".to_string(),
                function_alias: Some(name.to_string()),
            },
        }
    }

    #[test]
    fn test_entries_filter_by_rule_kind() {
        let (mock, ctx) = setup();
        mock.insert_alert_rule(
            &ctx.scope,
            "rule-b",
            AlertRuleKind::Scheduled,
            json!({"displayName": "Brute force"}),
        );
        mock.insert_alert_rule(
            &ctx.scope,
            "rule-a",
            AlertRuleKind::Scheduled,
            json!({"displayName": "Port scan"}),
        );
        mock.insert_alert_rule(
            &ctx.scope,
            "msft-1",
            AlertRuleKind::MicrosoftSecurityIncidentCreation,
            json!({"displayName": "Defender"}),
        );

        let scheduled = entries(&ctx, ResourceType::ScheduledDetection).unwrap();
        assert_eq!(
            scheduled,
            vec![
                ("rule-a".to_string(), "Port scan".to_string()),
                ("rule-b".to_string(), "Brute force".to_string()),
            ]
        );
        let msft = entries(&ctx, ResourceType::MicrosoftSecurityDetection).unwrap();
        assert_eq!(msft, vec![("msft-1".to_string(), "Defender".to_string())]);
    }

    #[test]
    fn test_data_source_entries_are_parsers_only() {
        let (_mock, ctx) = setup();
        let insights = &ctx.clients.insights;
        insights
            .create_or_update_saved_search(&ctx.scope, "sshd", &search("parser", "sshd"))
            .unwrap();
        insights
            .create_or_update_saved_search(&ctx.scope, "saved", &search("Hunting", "saved"))
            .unwrap();

        let found = entries(&ctx, ResourceType::DataSource).unwrap();
        assert_eq!(found, vec![("sshd".to_string(), "sshd".to_string())]);
    }

    #[test]
    fn test_fetch_missing_is_not_found() {
        let (_mock, ctx) = setup();
        let err = fetch(&ctx, ResourceType::ScheduledDetection, "nope").unwrap_err();
        let arm = err.downcast_ref::<armkit::Error>().unwrap();
        assert_eq!(arm.category(), armkit::ErrorCategory::NotFound);
    }

    #[test]
    fn test_fetch_and_remove_alert_rule() {
        let (mock, ctx) = setup();
        mock.insert_alert_rule(
            &ctx.scope,
            "rule-a",
            AlertRuleKind::Scheduled,
            json!({"displayName": "Port scan"}),
        );

        let doc = fetch(&ctx, ResourceType::ScheduledDetection, "rule-a").unwrap();
        assert_eq!(doc["properties"]["displayName"], "Port scan");

        remove(&ctx, ResourceType::ScheduledDetection, "rule-a").unwrap();
        assert!(mock.alert_rule(&ctx.scope, "rule-a").is_none());
        assert!(
            mock.calls()
                .contains(&Call::DeleteAlertRule("rule-a".to_string()))
        );
    }
}
