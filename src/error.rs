//! Deployment error taxonomy.
//!
//! Everything in the binary returns `anyhow::Result`; these variants are the
//! failures callers (and tests) need to tell apart, recovered with
//! `downcast_ref::<DeployError>()`. Remote failures stay `armkit::Error`.

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Conflicting or missing command-line arguments.
    #[error("incorrect usage: {0}")]
    Usage(String),

    /// A document violates its schema.
    #[error("{file}: {message}")]
    Validation { file: String, message: String },

    /// A document lacks its identity key.
    #[error("{file}: missing required field '{field}'")]
    MissingIdentity { file: String, field: &'static str },

    /// A `playbook` block is missing one of its fields.
    #[error(
        "{file}: playbook requires name, subscription_id, resource_group_name and workspace_name ({message})"
    )]
    PartialPlaybook { file: String, message: String },

    /// A document does not have the shape its resource type needs.
    #[error("{file}: {message}")]
    InvalidDocument { file: String, message: String },

    /// A resource lives in a subscription the router has no clients for.
    #[error(
        "subscription '{subscription}' is not configured, add it with --aux-subscriptions {subscription}"
    )]
    MissingSubscription { subscription: String },

    /// A generated resource name contains forbidden characters.
    #[error("invalid name '{0}': use only letters, digits and hyphens")]
    InvalidName(String),
}

impl DeployError {
    pub fn validation(file: &Path, message: impl Into<String>) -> Self {
        Self::Validation {
            file: file.display().to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_document(file: &Path, message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            file: file.display().to_string(),
            message: message.into(),
        }
    }
}
