//! Playbook link protocol.
//!
//! The service models a rule's automation as a list of actions, but a
//! detection links at most one playbook: linking always unlinks everything
//! first.

use crate::resource::PlaybookInfo;
use crate::router::{ClientRouter, ExecutionContext};
use anyhow::{Context, Result};
use armkit::{Action, ActionRequest};

/// Resource id a linked action should point at.
pub fn workflow_resource_id(playbook: &PlaybookInfo) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Logic/workflows/{}",
        playbook.subscription_id, playbook.resource_group_name, playbook.name
    )
}

/// Whether `actions` is exactly one link to `playbook`.
pub fn is_linked(actions: &[Action], playbook: &PlaybookInfo) -> bool {
    let expected = workflow_resource_id(playbook);
    match actions {
        [action] => {
            action.name == playbook.name
                && action
                    .properties
                    .logic_app_resource_id
                    .eq_ignore_ascii_case(&expected)
        }
        _ => false,
    }
}

/// Delete every action on `rule_id`. Returns how many were removed.
pub fn unlink_all(ctx: &ExecutionContext, rule_id: &str) -> Result<usize> {
    let actions = ctx.clients.insights.list_actions(&ctx.scope, rule_id)?;
    unlink(ctx, rule_id, &actions)
}

/// Delete `actions`, already listed from `rule_id`.
pub fn unlink(ctx: &ExecutionContext, rule_id: &str, actions: &[Action]) -> Result<usize> {
    for action in actions {
        log::info!("Unlinking playbook {} from {}", action.name, rule_id);
        ctx.clients
            .insights
            .delete_action(&ctx.scope, rule_id, &action.name)?;
    }
    Ok(actions.len())
}

/// Replace whatever is linked to `rule_id` with `playbook`.
///
/// The workflow is looked up with the clients of its own subscription; the
/// action is created with the rule's.
pub fn link(
    router: &ClientRouter,
    ctx: &ExecutionContext,
    rule_id: &str,
    playbook: &PlaybookInfo,
) -> Result<Action> {
    let current = ctx.clients.insights.list_actions(&ctx.scope, rule_id)?;
    relink(router, ctx, rule_id, playbook, &current)
}

/// [`link`] with the rule's current actions already listed.
pub fn relink(
    router: &ClientRouter,
    ctx: &ExecutionContext,
    rule_id: &str,
    playbook: &PlaybookInfo,
    current: &[Action],
) -> Result<Action> {
    unlink(ctx, rule_id, current)?;

    let owner = router.context(
        &playbook.subscription_id,
        &playbook.resource_group_name,
        &playbook.workspace_name,
    )?;
    let workflow = owner
        .clients
        .workflows
        .get_workflow(&owner.scope, &playbook.name)?
        .ok_or_else(|| armkit::Error::NotFound {
            kind: "playbook",
            name: format!("{}/{}", playbook.resource_group_name, playbook.name),
        })?;
    let trigger_uri = owner
        .clients
        .workflows
        .trigger_callback_url(&owner.scope, &playbook.name, playbook.trigger())
        .with_context(|| format!("Could not read trigger '{}' of {}", playbook.trigger(), playbook.name))?;

    let request = ActionRequest::link(workflow.id, trigger_uri);
    let action = ctx
        .clients
        .insights
        .create_or_update_action(&ctx.scope, rule_id, &playbook.name, &request)?;
    log::info!("Linked playbook {} to {}", playbook.name, rule_id);
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use armkit::backend::Call;
    use armkit::{AlertRuleKind, Clients, DEFAULT_TRIGGER_NAME, MockBackend};
    use serde_json::json;

    fn playbook(subscription: &str) -> PlaybookInfo {
        PlaybookInfo {
            name: "isolate-host".to_string(),
            subscription_id: subscription.to_string(),
            resource_group_name: "rg-auto".to_string(),
            workspace_name: "ws-auto".to_string(),
            trigger_name: None,
        }
    }

    fn setup() -> (MockBackend, ClientRouter, ExecutionContext) {
        let mock = MockBackend::new();
        let router = ClientRouter::new("sub-1", Clients::from_backend(mock.clone()));
        let ctx = router.primary_context("rg", "ws");
        mock.insert_alert_rule(&ctx.scope, "rule-a", AlertRuleKind::Scheduled, json!({}));
        (mock, router, ctx)
    }

    #[test]
    fn test_unlink_all_without_actions_only_lists() {
        let (mock, _router, ctx) = setup();
        mock.clear_calls();

        assert_eq!(unlink_all(&ctx, "rule-a").unwrap(), 0);
        assert_eq!(mock.calls(), vec![Call::ListActions("rule-a".to_string())]);
    }

    #[test]
    fn test_unlink_all_deletes_each_action() {
        let (mock, _router, ctx) = setup();
        mock.insert_action(&ctx.scope, "rule-a", "old-1", "/w/old-1");
        mock.insert_action(&ctx.scope, "rule-a", "old-2", "/w/old-2");

        assert_eq!(unlink_all(&ctx, "rule-a").unwrap(), 2);
        assert!(mock.actions(&ctx.scope, "rule-a").is_empty());
    }

    #[test]
    fn test_link_leaves_exactly_one_action() {
        let (mock, router, ctx) = setup();
        mock.insert_action(&ctx.scope, "rule-a", "old-1", "/w/old-1");
        mock.insert_action(&ctx.scope, "rule-a", "old-2", "/w/old-2");
        mock.insert_workflow("sub-1", "rg-auto", "isolate-host");

        let info = playbook("sub-1");
        link(&router, &ctx, "rule-a", &info).unwrap();

        let actions = mock.actions(&ctx.scope, "rule-a");
        assert_eq!(actions.len(), 1);
        assert!(is_linked(&actions, &info));
        assert!(mock.calls().contains(&Call::TriggerCallbackUrl {
            workflow: "isolate-host".to_string(),
            trigger: DEFAULT_TRIGGER_NAME.to_string(),
        }));
    }

    #[test]
    fn test_link_missing_workflow_is_not_found() {
        let (mock, router, ctx) = setup();
        let err = link(&router, &ctx, "rule-a", &playbook("sub-1")).unwrap_err();
        let arm = err.downcast_ref::<armkit::Error>().unwrap();
        assert_eq!(arm.category(), armkit::ErrorCategory::NotFound);
        assert!(mock.actions(&ctx.scope, "rule-a").is_empty());
    }

    #[test]
    fn test_link_unknown_trigger_fails() {
        let (mock, router, ctx) = setup();
        mock.insert_workflow("sub-1", "rg-auto", "isolate-host");
        let mut info = playbook("sub-1");
        info.trigger_name = Some("manual".to_string());

        assert!(link(&router, &ctx, "rule-a", &info).is_err());
        assert!(mock.actions(&ctx.scope, "rule-a").is_empty());
    }

    #[test]
    fn test_is_linked_requires_single_matching_action() {
        let info = playbook("sub-1");
        let action = |name: &str, id: String| Action {
            id: String::new(),
            name: name.to_string(),
            etag: None,
            properties: armkit::types::ActionProperties {
                logic_app_resource_id: id,
                workflow_id: None,
            },
        };
        let good = action("isolate-host", workflow_resource_id(&info).to_uppercase());
        assert!(is_linked(std::slice::from_ref(&good), &info));
        assert!(!is_linked(&[], &info));
        assert!(!is_linked(&[good.clone(), good], &info));
        assert!(!is_linked(
            &[action("isolate-host", "/other".to_string())],
            &info
        ));
    }
}
