//! Reconciliation engine.
//!
//! For each resource file:
//! 1. Parse it; a file with nothing to deploy is skipped
//! 2. Fetch the remote copy, if any, and carry its etag forward
//! 3. Create or update the remote resource
//! 4. For scheduled detections, link or unlink the playbook
//!
//! Files are processed one at a time and the first failure ends the batch.
//! Nothing is rolled back.

pub mod playbook;

use crate::resource::{ResourceParams, ResourceType, parser};
use crate::router::{ClientRouter, ExecutionContext};
use anyhow::{Context, Result, anyhow};
use armkit::{AlertRule, SavedSearch};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Caller switches for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployOptions {
    /// Relink playbooks even when the link is already in place.
    pub force_link_playbook: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybookChange {
    None,
    Linked(String),
    AlreadyLinked(String),
    Unlinked(usize),
}

/// Remote resource returned by the create-or-update call.
#[derive(Debug, Clone, PartialEq)]
pub enum Deployed {
    AlertRule(AlertRule),
    SavedSearch(SavedSearch),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: Outcome,
    pub identity: Option<String>,
    pub deployed: Option<Deployed>,
    pub playbook: PlaybookChange,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeploySummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub linked: usize,
    pub unlinked: usize,
}

impl DeploySummary {
    pub fn record(&mut self, report: &FileReport) {
        match report.outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
        }
        match report.playbook {
            PlaybookChange::Linked(_) => self.linked += 1,
            PlaybookChange::Unlinked(n) => self.unlinked += n,
            PlaybookChange::None | PlaybookChange::AlreadyLinked(_) => {}
        }
    }

    pub fn deployed(&self) -> usize {
        self.created + self.updated
    }
}

// ============================================================================
// Per-kind operations
// ============================================================================

/// Remote state carried into the update.
struct Existing {
    etag: Option<String>,
}

type FetchFn = fn(&ExecutionContext, &str) -> armkit::Result<Option<Existing>>;
type DeployFn = fn(&ExecutionContext, &ResourceParams) -> Result<Deployed>;

struct KindOps {
    fetch: FetchFn,
    deploy: DeployFn,
}

static ALERT_RULE_OPS: KindOps = KindOps {
    fetch: fetch_alert_rule,
    deploy: deploy_alert_rule,
};

static SAVED_SEARCH_OPS: KindOps = KindOps {
    fetch: fetch_saved_search,
    deploy: deploy_saved_search,
};

fn ops(resource_type: ResourceType) -> &'static KindOps {
    match resource_type {
        ResourceType::ScheduledDetection | ResourceType::MicrosoftSecurityDetection => {
            &ALERT_RULE_OPS
        }
        ResourceType::DataSource => &SAVED_SEARCH_OPS,
    }
}

fn fetch_alert_rule(ctx: &ExecutionContext, id: &str) -> armkit::Result<Option<Existing>> {
    let rule = ctx.clients.insights.get_alert_rule(&ctx.scope, id)?;
    Ok(rule.map(|r| Existing { etag: r.etag }))
}

fn fetch_saved_search(ctx: &ExecutionContext, id: &str) -> armkit::Result<Option<Existing>> {
    let search = ctx.clients.insights.get_saved_search(&ctx.scope, id)?;
    Ok(search.map(|s| Existing { etag: s.etag }))
}

fn deploy_alert_rule(ctx: &ExecutionContext, params: &ResourceParams) -> Result<Deployed> {
    let request = params
        .alert_rule_request()?
        .ok_or_else(|| anyhow!("{} is not an alert rule", params.identity()))?;
    let rule = ctx
        .clients
        .insights
        .create_or_update_alert_rule(&ctx.scope, params.identity(), &request)?;
    Ok(Deployed::AlertRule(rule))
}

fn deploy_saved_search(ctx: &ExecutionContext, params: &ResourceParams) -> Result<Deployed> {
    let request = params
        .saved_search_request()
        .ok_or_else(|| anyhow!("{} is not a parser", params.identity()))?;
    let search = ctx
        .clients
        .insights
        .create_or_update_saved_search(&ctx.scope, params.identity(), &request)?;
    Ok(Deployed::SavedSearch(search))
}

// ============================================================================
// Deployment
// ============================================================================

/// Deploy a single resource file into `ctx`.
pub fn deploy_one(
    router: &ClientRouter,
    ctx: &ExecutionContext,
    resource_type: ResourceType,
    path: &Path,
    opts: DeployOptions,
) -> Result<FileReport> {
    let Some(mut params) = parser::parse(resource_type, path)? else {
        log::info!("{}: no parser block, nothing to deploy", path.display());
        return Ok(FileReport {
            path: path.to_path_buf(),
            outcome: Outcome::Skipped,
            identity: None,
            deployed: None,
            playbook: PlaybookChange::None,
        });
    };
    let ops = ops(resource_type);
    let identity = params.identity().to_string();

    let existing = (ops.fetch)(ctx, &identity)
        .map_err(|e| failure(path, e.into()))?;
    let outcome = match existing {
        Some(existing) => {
            log::debug!("{identity} exists in {}, updating", ctx.scope);
            params.set_etag(existing.etag);
            Outcome::Updated
        }
        None => {
            log::debug!("{identity} does not exist in {}, creating", ctx.scope);
            Outcome::Created
        }
    };

    let deployed = (ops.deploy)(ctx, &params).map_err(|e| failure(path, e))?;
    log::info!("Deployed {} {} from {}", resource_type, identity, path.display());

    let playbook = if resource_type == ResourceType::ScheduledDetection {
        reconcile_playbook(router, ctx, &params, opts).map_err(|e| failure(path, e))?
    } else {
        PlaybookChange::None
    };

    Ok(FileReport {
        path: path.to_path_buf(),
        outcome,
        identity: Some(identity),
        deployed: Some(deployed),
        playbook,
    })
}

fn reconcile_playbook(
    router: &ClientRouter,
    ctx: &ExecutionContext,
    params: &ResourceParams,
    opts: DeployOptions,
) -> Result<PlaybookChange> {
    let rule_id = params.identity();
    let Some(info) = params.playbook() else {
        let removed = playbook::unlink_all(ctx, rule_id)?;
        return Ok(if removed > 0 {
            PlaybookChange::Unlinked(removed)
        } else {
            PlaybookChange::None
        });
    };

    if opts.force_link_playbook {
        playbook::link(router, ctx, rule_id, info)?;
        return Ok(PlaybookChange::Linked(info.name.clone()));
    }

    let current = ctx.clients.insights.list_actions(&ctx.scope, rule_id)?;
    if playbook::is_linked(&current, info) {
        log::info!(
            "Playbook {} already linked to {}, pass --force-link-playbook to relink",
            info.name,
            rule_id
        );
        return Ok(PlaybookChange::AlreadyLinked(info.name.clone()));
    }

    playbook::relink(router, ctx, rule_id, info, &current)?;
    Ok(PlaybookChange::Linked(info.name.clone()))
}

fn failure(path: &Path, err: anyhow::Error) -> anyhow::Error {
    log::error!("Failed to deploy {}: {:#}", path.display(), err);
    err.context(format!("Failed to deploy {}", path.display()))
}

/// Deploy `files` in order, stopping at the first failure.
pub fn deploy_all(
    router: &ClientRouter,
    ctx: &ExecutionContext,
    resource_type: ResourceType,
    files: &[PathBuf],
    opts: DeployOptions,
    mut on_report: impl FnMut(usize, &FileReport),
) -> Result<DeploySummary> {
    let mut summary = DeploySummary::default();
    for (index, file) in files.iter().enumerate() {
        let report = deploy_one(router, ctx, resource_type, file, opts)
            .with_context(|| format!("Stopped after {index} of {} files", files.len()))?;
        summary.record(&report);
        on_report(index, &report);
    }
    Ok(summary)
}

/// Print the batch totals
pub fn print_summary(summary: &DeploySummary) {
    println!();
    if summary.deployed() > 0 {
        println!("  {} Deployment complete!", "✓".green().bold());
    } else {
        println!("  {} Nothing deployed", "ℹ".blue());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.skipped > 0 {
        println!("    • {} files skipped", summary.skipped);
    }
    if summary.linked > 0 {
        println!("    • {} playbooks linked", summary.linked);
    }
    if summary.unlinked > 0 {
        println!("    • {} playbooks unlinked", summary.unlinked);
    }
}
