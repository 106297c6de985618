use anyhow::Result;

use crate::Context;
use crate::cli::CreateArgs;
use crate::commands::Remote;
use crate::config::Settings;
use crate::engine::{self, DeployOptions, FileReport, Outcome, PlaybookChange};
use crate::resolver::{ConfigKind, Resolver};
use crate::resource::ResourceType;
use crate::ui;
use crate::validator::{ResourceTarget, SchemaValidator};

pub fn run(ctx: &Context, resource_type: ResourceType, args: CreateArgs) -> Result<()> {
    let target = ResourceTarget::from_flags(args.target.directory, args.target.file)?;
    let files = target.files()?;
    if files.is_empty() {
        ui::warn("No resource files found");
        return Ok(());
    }

    if args.enable_validation {
        let resolver = Resolver::from_env()?;
        let source = resolver.resolve(resource_type, ConfigKind::Schema, args.schema.as_deref());
        let validator = SchemaValidator::load(&source)?;
        for file in &files {
            validator.validate_file(file)?;
        }
        if !ctx.quiet {
            ui::success(&format!("{} files valid", files.len()));
        }
    }

    let settings = Settings::load()?.with_flags(&args.workspace);
    let remote = Remote::connect(&settings)?;

    if !ctx.quiet {
        ui::header(&format!("Deploying {} to {}", resource_type, remote.workspace.scope));
    }

    let opts = DeployOptions {
        force_link_playbook: args.force_link_playbook,
    };
    let total = files.len();
    let summary = engine::deploy_all(
        &remote.router,
        &remote.workspace,
        resource_type,
        &files,
        opts,
        |index, report| {
            if !ctx.quiet {
                ui::step(index + 1, total, &describe(report));
            }
        },
    )?;

    if !ctx.quiet {
        engine::print_summary(&summary);
    }
    Ok(())
}

fn describe(report: &FileReport) -> String {
    let file = report.path.display();
    let identity = report.identity.as_deref().unwrap_or("-");
    let mut line = match report.outcome {
        Outcome::Created => format!("{file}: created {identity}"),
        Outcome::Updated => format!("{file}: updated {identity}"),
        Outcome::Skipped => format!("{file}: nothing to deploy"),
    };
    match &report.playbook {
        PlaybookChange::Linked(name) => line.push_str(&format!(", linked {name}")),
        PlaybookChange::AlreadyLinked(name) => line.push_str(&format!(", {name} already linked")),
        PlaybookChange::Unlinked(0) | PlaybookChange::None => {}
        PlaybookChange::Unlinked(n) => line.push_str(&format!(", unlinked {n} playbooks")),
    }
    line
}
