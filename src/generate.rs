//! Scaffolding for new resource documents.

use crate::error::DeployError;
use crate::resolver::{ConfigKind, Resolver};
use crate::resource::ResourceType;
use anyhow::{Context, Result, bail};
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9-]+$").unwrap_or_else(|e| unreachable!("invalid name pattern: {e}"))
});

/// Interactive questions asked for missing options.
pub trait Prompt {
    fn ask(&mut self, question: &str) -> Result<String>;
    fn ask_yes_no(&mut self, question: &str, default: bool) -> Result<bool>;
}

/// Prompts on the terminal.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn ask(&mut self, question: &str) -> Result<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(question)
            .interact_text()
            .context("Failed to read answer")
    }

    fn ask_yes_no(&mut self, question: &str, default: bool) -> Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(question)
            .default(default)
            .interact()
            .context("Failed to read answer")
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub directory: PathBuf,
    pub name: Option<String>,
    pub create_subdirectory: Option<bool>,
    pub with_documentation: Option<bool>,
    /// Never prompt; unset toggles default to off.
    pub skip_interactive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub id: String,
    pub document: PathBuf,
    pub documentation: Option<PathBuf>,
}

pub fn validate_name(name: &str) -> Result<()> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(DeployError::InvalidName(name.to_string()).into())
    }
}

/// Write a new resource document (and optional docs stub) from templates.
pub fn generate(
    resource_type: ResourceType,
    opts: &GenerateOptions,
    resolver: &Resolver,
    prompt: &mut dyn Prompt,
) -> Result<Generated> {
    let name = match (&opts.name, opts.skip_interactive) {
        (Some(name), _) => name.clone(),
        (None, false) => prompt.ask(&format!("Name of the {resource_type}"))?,
        (None, true) => return Err(DeployError::Usage("--name NAME".to_string()).into()),
    };
    let name = name.trim().to_string();
    validate_name(&name)?;

    let create_subdirectory = match opts.create_subdirectory {
        Some(value) => value,
        None if opts.skip_interactive => false,
        None => prompt.ask_yes_no("Create a subdirectory for it?", false)?,
    };
    let with_documentation = match opts.with_documentation {
        Some(value) => value,
        None if opts.skip_interactive => false,
        None => prompt.ask_yes_no("Add a documentation file?", true)?,
    };

    let id = uuid::Uuid::new_v4().to_string();
    let template = resolver
        .resolve(resource_type, ConfigKind::Template, None)
        .read()?;
    let documentation = if with_documentation {
        Some(
            resolver
                .resolve(resource_type, ConfigKind::Documentation, None)
                .read()?,
        )
    } else {
        None
    };

    fs::create_dir_all(&opts.directory)
        .with_context(|| format!("Could not create {}", opts.directory.display()))?;
    let target = if create_subdirectory {
        let dir = opts.directory.join(&name);
        fs::create_dir(&dir).with_context(|| format!("Could not create {}", dir.display()))?;
        dir
    } else {
        opts.directory.clone()
    };

    let document = target.join(format!("{name}.yaml"));
    let documentation = documentation.map(|body| (target.join(format!("{name}.md")), body));

    // Neither file is written unless both are free.
    let taken = std::iter::once(&document)
        .chain(documentation.as_ref().map(|(path, _)| path))
        .find(|path| path.exists());
    if let Some(path) = taken {
        bail!("{} already exists", path.display());
    }

    write_new(&document, &render(&template, &id, &name))?;
    log::info!("Wrote {}", document.display());

    let documentation = match documentation {
        Some((path, body)) => {
            write_new(&path, &format!("# {name}\n\n{body}"))?;
            log::info!("Wrote {}", path.display());
            Some(path)
        }
        None => None,
    };

    Ok(Generated {
        id,
        document,
        documentation,
    })
}

/// Fill the `{id}` and `{name}` placeholders.
fn render(template: &str, id: &str, name: &str) -> String {
    template.replace("{id}", id).replace("{name}", name)
}

fn write_new(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("Could not create {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Could not write {}", path.display()))
}
