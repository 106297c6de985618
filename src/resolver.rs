//! Schema, template and documentation lookup.
//!
//! Each resource type has three config files. A hidden override named after
//! the pair (e.g. `.detection_schema.json`) in the working directory or one
//! of its ancestors wins over the copy bundled into the binary. The upward
//! search stops below the home directory and the filesystem root: neither
//! is searched.

use crate::resource::ResourceType;
use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Guard on the number of ancestors visited.
const MAX_ANCESTORS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Schema,
    Template,
    Documentation,
}

struct DefaultEntry {
    resource: ResourceType,
    kind: ConfigKind,
    local: &'static str,
    bundled: &'static str,
    contents: &'static str,
}

macro_rules! default_entry {
    ($resource:expr, $kind:expr, $local:literal, $bundled:literal) => {
        DefaultEntry {
            resource: $resource,
            kind: $kind,
            local: $local,
            bundled: $bundled,
            contents: include_str!(concat!("defaults/", $bundled)),
        }
    };
}

static DEFAULTS: [DefaultEntry; 9] = [
    default_entry!(
        ResourceType::ScheduledDetection,
        ConfigKind::Schema,
        ".detection_schema.json",
        "detection_schema.json"
    ),
    default_entry!(
        ResourceType::ScheduledDetection,
        ConfigKind::Template,
        ".detection_template.yaml",
        "detection_template.yaml"
    ),
    default_entry!(
        ResourceType::ScheduledDetection,
        ConfigKind::Documentation,
        ".detection_documentation.md",
        "detection_documentation.md"
    ),
    default_entry!(
        ResourceType::MicrosoftSecurityDetection,
        ConfigKind::Schema,
        ".msft_security_detection_schema.json",
        "msft_security_detection_schema.json"
    ),
    default_entry!(
        ResourceType::MicrosoftSecurityDetection,
        ConfigKind::Template,
        ".msft_detection_template.yaml",
        "msft_security_detection_template.yaml"
    ),
    default_entry!(
        ResourceType::MicrosoftSecurityDetection,
        ConfigKind::Documentation,
        ".msft_security_detection_documentation.md",
        "msft_security_detection_documentation.md"
    ),
    default_entry!(
        ResourceType::DataSource,
        ConfigKind::Schema,
        ".data_source_schema.json",
        "data_source_schema.json"
    ),
    default_entry!(
        ResourceType::DataSource,
        ConfigKind::Template,
        ".data_source_template.yaml",
        "data_source_template.yaml"
    ),
    default_entry!(
        ResourceType::DataSource,
        ConfigKind::Documentation,
        ".data_source_documentation.md",
        "data_source_documentation.md"
    ),
];

fn entry(resource: ResourceType, kind: ConfigKind) -> &'static DefaultEntry {
    DEFAULTS
        .iter()
        .find(|e| e.resource == resource && e.kind == kind)
        .unwrap_or_else(|| unreachable!("no bundled {kind:?} for {resource}"))
}

/// Where a config file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Path given on the command line, used unchecked
    Explicit(PathBuf),
    /// Hidden override found by the upward search
    Override(PathBuf),
    /// Copy compiled into the binary
    Bundled {
        name: &'static str,
        contents: &'static str,
    },
}

impl ConfigSource {
    pub fn read(&self) -> Result<String> {
        match self {
            Self::Explicit(path) | Self::Override(path) => fs::read_to_string(path)
                .with_context(|| format!("Could not read {}", path.display())),
            Self::Bundled { contents, .. } => Ok((*contents).to_string()),
        }
    }

    pub fn is_bundled(&self) -> bool {
        matches!(self, Self::Bundled { .. })
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(path) | Self::Override(path) => write!(f, "{}", path.display()),
            Self::Bundled { name, .. } => write!(f, "bundled {name}"),
        }
    }
}

/// Resolves config files relative to a start directory.
#[derive(Debug, Clone)]
pub struct Resolver {
    start: PathBuf,
    home: Option<PathBuf>,
}

impl Resolver {
    /// Search from the current directory, stopping at the user's home.
    pub fn from_env() -> Result<Self> {
        let start = std::env::current_dir().context("Could not determine current directory")?;
        Ok(Self::new(start, dirs::home_dir()))
    }

    pub fn new(start: impl Into<PathBuf>, home: Option<PathBuf>) -> Self {
        Self {
            start: start.into(),
            home,
        }
    }

    pub fn resolve(
        &self,
        resource: ResourceType,
        kind: ConfigKind,
        preferred: Option<&Path>,
    ) -> ConfigSource {
        if let Some(path) = preferred {
            return ConfigSource::Explicit(path.to_path_buf());
        }

        let entry = entry(resource, kind);
        match self.find_override(entry.local) {
            Some(path) => {
                log::info!("Using {} from {}", entry.local, path.display());
                ConfigSource::Override(path)
            }
            None => {
                log::debug!("No {} override, using bundled {}", entry.local, entry.bundled);
                ConfigSource::Bundled {
                    name: entry.bundled,
                    contents: entry.contents,
                }
            }
        }
    }

    /// Nearest ancestor of the start directory holding `name`.
    pub fn find_override(&self, name: &str) -> Option<PathBuf> {
        for dir in self.start.ancestors().take(MAX_ANCESTORS) {
            if self.home.as_deref() == Some(dir) || dir.parent().is_none() {
                return None;
            }
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}
