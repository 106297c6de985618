//! Access-token sources.
//!
//! Authentication itself belongs to the Azure CLI: this module only asks it
//! for a bearer token scoped to a subscription, or uses a token handed in
//! through the environment.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::process::Command;

/// Environment variable holding a pre-issued bearer token.
pub const ENV_ACCESS_TOKEN: &str = "AZURE_ACCESS_TOKEN";

/// Token audience for a management endpoint, e.g.
/// `https://management.usgovcloudapi.net/` for the US Government cloud.
#[must_use]
pub fn management_resource(endpoint: &str) -> String {
    format!("{}/", endpoint.trim_end_matches('/'))
}

/// Source of ARM bearer tokens.
pub trait TokenSource: Send + Sync {
    /// Get a bearer token for `resource` valid in the given subscription.
    fn token(&self, subscription_id: &str, resource: &str) -> Result<String>;
}

/// Token source backed by `az account get-access-token`.
pub struct AzureCliCredential {
    /// Path to the az executable
    az_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenOutput {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AccountOutput {
    id: String,
}

impl AzureCliCredential {
    /// Create a credential that runs `az` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            az_path: "az".to_string(),
        }
    }

    /// Create a credential that runs a specific az executable.
    pub fn with_executable(az_path: impl Into<String>) -> Self {
        Self {
            az_path: az_path.into(),
        }
    }

    /// Subscription id of the active Azure CLI account.
    pub fn default_subscription(&self) -> Result<String> {
        let stdout = self.run_az(&["account", "show", "--output", "json"])?;
        let account: AccountOutput = serde_json::from_str(&stdout)?;
        Ok(account.id)
    }

    /// Run an az command and return its stdout.
    fn run_az(&self, args: &[&str]) -> Result<String> {
        log::debug!("running {} {}", self.az_path, args.join(" "));
        let output = Command::new(&self.az_path)
            .args(args)
            .output()
            .map_err(|e| Error::Credential(format!("failed to execute {}: {}", self.az_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Credential(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSource for AzureCliCredential {
    fn token(&self, subscription_id: &str, resource: &str) -> Result<String> {
        let stdout = self.run_az(&[
            "account",
            "get-access-token",
            "--resource",
            resource,
            "--subscription",
            subscription_id,
            "--output",
            "json",
        ])?;
        let token: AccessTokenOutput = serde_json::from_str(&stdout)?;
        Ok(token.access_token)
    }
}

/// A fixed token, typically from [`ENV_ACCESS_TOKEN`].
///
/// The same token is used for every subscription, so it must have been
/// issued for an identity that can reach all of them.
pub struct StaticToken(String);

impl StaticToken {
    /// Wrap a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Read the token from [`ENV_ACCESS_TOKEN`], if set and non-empty.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var(ENV_ACCESS_TOKEN)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .map(Self::new)
    }
}

impl TokenSource for StaticToken {
    fn token(&self, _subscription_id: &str, _resource: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token_ignores_subscription() {
        let source = StaticToken::new("abc");
        assert_eq!(source.token("sub-1", "https://arm.test/").unwrap(), "abc");
        assert_eq!(source.token("sub-2", "https://arm.test/").unwrap(), "abc");
    }

    #[test]
    fn test_missing_az_executable_is_credential_error() {
        let credential = AzureCliCredential::with_executable("/nonexistent/az-for-tests");
        let err = credential
            .token("sub-1", "https://management.azure.com/")
            .unwrap_err();
        assert!(matches!(err, Error::Credential(_)));
        assert_eq!(err.category(), crate::ErrorCategory::Credential);
    }

    #[test]
    fn test_management_resource() {
        assert_eq!(
            management_resource("https://management.azure.com"),
            "https://management.azure.com/"
        );
        assert_eq!(
            management_resource("https://management.chinacloudapi.cn/"),
            "https://management.chinacloudapi.cn/"
        );
    }

    #[test]
    fn test_access_token_output_parses() {
        let parsed: AccessTokenOutput = serde_json::from_str(
            r#"{"accessToken":"tok","expiresOn":"2026-01-01 00:00:00.000000","subscription":"s","tenant":"t","tokenType":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(parsed.access_token, "tok");
    }
}
