use anyhow::Result;

use crate::Context;
use crate::config::Settings;
use crate::paths;
use crate::ui;

pub fn show(_ctx: &Context) -> Result<()> {
    let path = paths::config_file()?;
    let settings = Settings::load_from(&path)?;

    ui::header("Settings");
    let status = if path.exists() { "" } else { " (not found)" };
    ui::kv("file", &format!("{}{status}", path.display()));

    let unset = || "-".to_string();
    ui::kv("subscription", &settings.subscription.clone().unwrap_or_else(unset));
    ui::kv("resource_group", &settings.resource_group.clone().unwrap_or_else(unset));
    ui::kv("workspace_name", &settings.workspace_name.clone().unwrap_or_else(unset));
    if settings.aux_subscriptions.is_empty() {
        ui::kv("aux_subscriptions", "-");
    } else {
        ui::kv("aux_subscriptions", &settings.aux_subscriptions.join(", "));
    }
    if let Some(endpoint) = &settings.management_endpoint {
        ui::kv("management_endpoint", endpoint);
    }
    Ok(())
}
