pub mod config;
pub mod create;
pub mod generate;
pub mod remote;
pub mod validate;

use crate::Context;
use crate::cli::ResourceCommand;
use crate::config::Settings;
use crate::resource::ResourceType;
use crate::router::{ClientRouter, ExecutionContext};
use anyhow::{Context as _, Result};
use armkit::{AzureCliCredential, StaticToken, TokenSource};

/// Dispatch a resource subcommand.
pub fn run(ctx: &Context, resource_type: ResourceType, cmd: ResourceCommand) -> Result<()> {
    match cmd {
        ResourceCommand::Create(args) => create::run(ctx, resource_type, args),
        ResourceCommand::Validate(args) => validate::run(ctx, resource_type, args),
        ResourceCommand::Generate(args) => generate::run(ctx, resource_type, args),
        ResourceCommand::Show { id, workspace } => {
            let remote = Remote::connect(&Settings::load()?.with_flags(&workspace))?;
            remote::show(&remote.workspace, resource_type, &id)
        }
        ResourceCommand::Delete { id, yes, workspace } => {
            let remote = Remote::connect(&Settings::load()?.with_flags(&workspace))?;
            remote::delete(ctx, &remote.workspace, resource_type, &id, yes)
        }
        ResourceCommand::List { workspace } => {
            let remote = Remote::connect(&Settings::load()?.with_flags(&workspace))?;
            remote::list(ctx, &remote.workspace, resource_type)
        }
    }
}

// ============================================================================
// Remote connection
// ============================================================================

/// Authenticated router plus the target workspace on the primary subscription.
pub struct Remote {
    pub router: ClientRouter,
    pub workspace: ExecutionContext,
}

impl Remote {
    pub fn connect(settings: &Settings) -> Result<Self> {
        let (resource_group, workspace) = settings.workspace()?;
        let subscription = match &settings.subscription {
            Some(sub) => sub.clone(),
            None => AzureCliCredential::new()
                .default_subscription()
                .context("No subscription given and no active Azure CLI account")?,
        };

        let credential = credential();
        let router = ClientRouter::connect(
            credential.as_ref(),
            &subscription,
            &settings.aux_subscriptions,
            settings.management_endpoint.as_deref(),
        )?;
        let workspace = router.primary_context(resource_group, workspace);
        log::debug!("Target workspace {}", workspace.scope);
        Ok(Self { router, workspace })
    }
}

fn credential() -> Box<dyn TokenSource> {
    if let Some(token) = StaticToken::from_env() {
        log::debug!("Using access token from {}", armkit::credential::ENV_ACCESS_TOKEN);
        return Box::new(token);
    }
    Box::new(AzureCliCredential::new())
}
