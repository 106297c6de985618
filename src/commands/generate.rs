use anyhow::Result;

use crate::Context;
use crate::cli::GenerateArgs;
use crate::generate::{self, GenerateOptions, TerminalPrompt};
use crate::resolver::Resolver;
use crate::resource::ResourceType;
use crate::ui;

pub fn run(ctx: &Context, resource_type: ResourceType, args: GenerateArgs) -> Result<()> {
    let opts = options(args);
    let resolver = Resolver::from_env()?;
    let generated = generate::generate(resource_type, &opts, &resolver, &mut TerminalPrompt)?;

    if !ctx.quiet {
        ui::success(&format!("Generated {resource_type}"));
        ui::kv("id", &generated.id);
        ui::kv("file", &generated.document.display().to_string());
        if let Some(doc) = &generated.documentation {
            ui::kv("docs", &doc.display().to_string());
        }
    }
    Ok(())
}

/// Toggles left off are asked for unless prompting is disabled.
fn options(args: GenerateArgs) -> GenerateOptions {
    let flag = |set: bool| set.then_some(true);
    GenerateOptions {
        directory: args.directory,
        name: args.name,
        create_subdirectory: flag(args.create_subdirectory),
        with_documentation: flag(args.with_documentation),
        skip_interactive: args.skip_interactive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_unset_toggles_stay_open() {
        let opts = options(GenerateArgs {
            directory: PathBuf::from("rules"),
            name: None,
            create_subdirectory: false,
            with_documentation: true,
            skip_interactive: false,
        });
        assert_eq!(opts.create_subdirectory, None);
        assert_eq!(opts.with_documentation, Some(true));
    }
}
