use anyhow::Result;

use crate::Context;
use crate::cli::ValidateArgs;
use crate::resolver::Resolver;
use crate::resource::ResourceType;
use crate::ui;
use crate::validator::{self, ResourceTarget};

pub fn run(ctx: &Context, resource_type: ResourceType, args: ValidateArgs) -> Result<()> {
    let target = ResourceTarget::from_flags(args.target.directory, args.target.file)?;
    let resolver = Resolver::from_env()?;

    let count = validator::validate(resource_type, &target, args.schema.as_deref(), &resolver)?;
    if !ctx.quiet {
        ui::success(&format!("{count} {resource_type} files valid"));
    }
    Ok(())
}
