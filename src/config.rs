use crate::cli::WorkspaceFlags;
use crate::paths;
use crate::router::parse_aux_subscriptions;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// Settings file
// ============================================================================

/// Defaults for the workspace flags, read from `config.toml`.
///
/// ```toml
/// subscription = "00000000-0000-0000-0000-000000000000"
/// resource_group = "rg-security"
/// workspace_name = "ws-sentinel"
/// aux_subscriptions = ["11111111-1111-1111-1111-111111111111"]
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub resource_group: Option<String>,
    #[serde(default)]
    pub workspace_name: Option<String>,
    #[serde(default)]
    pub aux_subscriptions: Vec<String>,
    #[serde(default)]
    pub management_endpoint: Option<String>,
}

impl Settings {
    /// Load the settings file, or empty settings if there is none
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings file at {}", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Apply command-line flags on top of the file; flags win.
    pub fn with_flags(mut self, flags: &WorkspaceFlags) -> Self {
        if let Some(sub) = &flags.subscription {
            self.subscription = Some(sub.clone());
        }
        if let Some(rg) = &flags.resource_group {
            self.resource_group = Some(rg.clone());
        }
        if let Some(ws) = &flags.workspace_name {
            self.workspace_name = Some(ws.clone());
        }
        if let Some(aux) = &flags.aux_subscriptions {
            self.aux_subscriptions = parse_aux_subscriptions(aux);
        }
        self
    }

    /// Resource group and workspace, both required for remote commands
    pub fn workspace(&self) -> Result<(&str, &str)> {
        let Some(rg) = self.resource_group.as_deref() else {
            bail!("No resource group given: pass --resource-group or set resource_group in config.toml");
        };
        let Some(ws) = self.workspace_name.as_deref() else {
            bail!("No workspace given: pass --workspace-name or set workspace_name in config.toml");
        };
        Ok((rg, ws))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn flags() -> WorkspaceFlags {
        WorkspaceFlags {
            subscription: None,
            resource_group: None,
            workspace_name: None,
            aux_subscriptions: None,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_and_flags_win() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "subscription = \"sub-file\"\nresource_group = \"rg-file\"\nworkspace_name = \"ws-file\"\naux_subscriptions = [\"sub-aux\"]\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.aux_subscriptions, vec!["sub-aux"]);

        let mut cli = flags();
        cli.resource_group = Some("rg-flag".to_string());
        cli.aux_subscriptions = Some("sub-x, sub-y".to_string());
        let merged = settings.with_flags(&cli);

        assert_eq!(merged.subscription.as_deref(), Some("sub-file"));
        assert_eq!(merged.workspace().unwrap(), ("rg-flag", "ws-file"));
        assert_eq!(merged.aux_subscriptions, vec!["sub-x", "sub-y"]);
    }

    #[test]
    fn test_workspace_required() {
        let err = Settings::default().workspace().unwrap_err();
        assert!(err.to_string().contains("--resource-group"));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "aux_subscriptions = \"not-a-list\"").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }
}
