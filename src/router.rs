//! Routes remote calls to the clients that own a subscription.

use crate::error::DeployError;
use anyhow::Result;
use armkit::{Clients, TokenSource, WorkspaceScope};
use std::collections::HashMap;

/// A workspace plus the clients authorised for its subscription.
#[derive(Clone)]
pub struct ExecutionContext {
    pub scope: WorkspaceScope,
    pub clients: Clients,
}

/// One primary client pair plus one per auxiliary subscription.
pub struct ClientRouter {
    primary_subscription: String,
    primary: Clients,
    auxiliary: HashMap<String, Clients>,
}

impl ClientRouter {
    pub fn new(primary_subscription: impl Into<String>, primary: Clients) -> Self {
        Self {
            primary_subscription: primary_subscription.into(),
            primary,
            auxiliary: HashMap::new(),
        }
    }

    pub fn with_auxiliary(mut self, subscription: impl Into<String>, clients: Clients) -> Self {
        self.auxiliary.insert(subscription.into(), clients);
        self
    }

    /// Authenticate the primary and every auxiliary subscription.
    pub fn connect(
        credential: &dyn TokenSource,
        primary_subscription: &str,
        aux_subscriptions: &[String],
        endpoint: Option<&str>,
    ) -> Result<Self> {
        let primary = Clients::connect(credential, primary_subscription, endpoint)?;
        let mut router = Self::new(primary_subscription, primary);

        for subscription in aux_subscriptions {
            if subscription == primary_subscription {
                continue;
            }
            log::debug!("Connecting auxiliary subscription {subscription}");
            let clients = Clients::connect(credential, subscription, endpoint)?;
            router = router.with_auxiliary(subscription.clone(), clients);
        }
        Ok(router)
    }

    pub fn primary_subscription(&self) -> &str {
        &self.primary_subscription
    }

    /// Context on the primary subscription.
    pub fn primary_context(&self, resource_group: &str, workspace: &str) -> ExecutionContext {
        ExecutionContext {
            scope: WorkspaceScope::new(&self.primary_subscription, resource_group, workspace),
            clients: self.primary.clone(),
        }
    }

    /// Context owning `subscription_id`; unknown subscriptions are a
    /// configuration error.
    pub fn context(
        &self,
        subscription_id: &str,
        resource_group: &str,
        workspace: &str,
    ) -> Result<ExecutionContext> {
        if subscription_id == self.primary_subscription {
            return Ok(self.primary_context(resource_group, workspace));
        }
        let clients = self.auxiliary.get(subscription_id).ok_or_else(|| {
            DeployError::MissingSubscription {
                subscription: subscription_id.to_string(),
            }
        })?;
        Ok(ExecutionContext {
            scope: WorkspaceScope::new(subscription_id, resource_group, workspace),
            clients: clients.clone(),
        })
    }
}

/// Split a comma-separated subscription list, dropping blanks and repeats.
pub fn parse_aux_subscriptions(raw: &str) -> Vec<String> {
    let mut subscriptions: Vec<String> = Vec::new();
    for sub in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !subscriptions.iter().any(|s| s == sub) {
            subscriptions.push(sub.to_string());
        }
    }
    subscriptions
}
