//! Resource document loading.

use super::{
    MicrosoftSecurityDetectionParams, ParserParams, PlaybookInfo, ResourceParams, ResourceType,
    ScheduledDetectionParams,
};
use crate::error::DeployError;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

const PLAYBOOK_KEY: &str = "playbook";
const ADDITIONAL_METADATA_KEY: &str = "additional_metadata";
const ID_KEY: &str = "id";
const ETAG_KEY: &str = "etag";
const PARSER_KEY: &str = "parser";
const FUNCTION_ID_KEY: &str = "function_id";

/// Load a YAML (or JSON) document as a JSON value.
pub fn load_document(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Invalid YAML in {}", path.display()))
}

/// Parse a resource file into typed parameters.
///
/// Returns `Ok(None)` for a data source without a `parser` block, which has
/// nothing to deploy.
pub fn parse(resource_type: ResourceType, path: &Path) -> Result<Option<ResourceParams>> {
    let document = load_document(path)?;
    parse_document(resource_type, path, document)
}

pub fn parse_document(
    resource_type: ResourceType,
    path: &Path,
    document: Value,
) -> Result<Option<ResourceParams>> {
    let Value::Object(map) = document else {
        return Err(DeployError::invalid_document(path, "expected a mapping at the top level").into());
    };

    match resource_type {
        ResourceType::DataSource => parse_data_source(path, map),
        ResourceType::ScheduledDetection => parse_scheduled(path, map).map(Some),
        ResourceType::MicrosoftSecurityDetection => parse_microsoft_security(path, map).map(Some),
    }
}

fn parse_data_source(path: &Path, mut map: Map<String, Value>) -> Result<Option<ResourceParams>> {
    let parser = match map.remove(PARSER_KEY) {
        None | Some(Value::Null) => {
            log::debug!("{} has no parser block", path.display());
            return Ok(None);
        }
        Some(Value::Object(parser)) => parser,
        Some(_) => {
            return Err(DeployError::invalid_document(path, "'parser' must be a mapping").into());
        }
    };

    if identity(parser.get(FUNCTION_ID_KEY)).is_none() {
        return Err(DeployError::MissingIdentity {
            file: path.display().to_string(),
            field: "parser.function_id",
        }
        .into());
    }

    let params: ParserParams = serde_json::from_value(Value::Object(parser))
        .map_err(|e| DeployError::invalid_document(path, format!("parser: {e}")))?;
    Ok(Some(ResourceParams::Parser(params)))
}

/// Fields shared by both detection kinds, removed from the rule body.
struct DetectionHead {
    rule_id: String,
    playbook: Option<PlaybookInfo>,
    additional_metadata: Option<Value>,
}

fn split_detection(path: &Path, map: &mut Map<String, Value>) -> Result<DetectionHead> {
    let rule_id = identity(map.get(ID_KEY)).ok_or_else(|| DeployError::MissingIdentity {
        file: path.display().to_string(),
        field: ID_KEY,
    })?;
    map.remove(ID_KEY);
    // The etag always comes from the remote copy.
    map.remove(ETAG_KEY);

    let playbook = match map.remove(PLAYBOOK_KEY) {
        None | Some(Value::Null) => None,
        Some(value) => Some(serde_json::from_value::<PlaybookInfo>(value).map_err(|e| {
            DeployError::PartialPlaybook {
                file: path.display().to_string(),
                message: e.to_string(),
            }
        })?),
    };
    let additional_metadata = map.remove(ADDITIONAL_METADATA_KEY).filter(|v| !v.is_null());

    Ok(DetectionHead {
        rule_id,
        playbook,
        additional_metadata,
    })
}

fn parse_scheduled(path: &Path, mut map: Map<String, Value>) -> Result<ResourceParams> {
    let head = split_detection(path, &mut map)?;
    let rule = serde_json::from_value(Value::Object(map))
        .map_err(|e| DeployError::invalid_document(path, e.to_string()))?;
    Ok(ResourceParams::Scheduled(ScheduledDetectionParams {
        rule_id: head.rule_id,
        etag: None,
        playbook: head.playbook,
        additional_metadata: head.additional_metadata,
        rule,
    }))
}

fn parse_microsoft_security(path: &Path, mut map: Map<String, Value>) -> Result<ResourceParams> {
    let head = split_detection(path, &mut map)?;
    if head.playbook.is_some() {
        log::warn!(
            "{}: playbooks are only linked for scheduled detections, ignoring",
            path.display()
        );
    }
    let rule = serde_json::from_value(Value::Object(map))
        .map_err(|e| DeployError::invalid_document(path, e.to_string()))?;
    Ok(ResourceParams::MicrosoftSecurity(MicrosoftSecurityDetectionParams {
        rule_id: head.rule_id,
        etag: None,
        additional_metadata: head.additional_metadata,
        rule,
    }))
}

/// Non-empty string (or number) identity value
fn identity(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const SCHEDULED: &str = r"
id: rule-a
display_name: Brute force
enabled: true
query: SecurityEvent | where EventID == 4625
query_frequency: PT1H
query_period: PT1H
severity: High
trigger_operator: GreaterThan
trigger_threshold: 5
suppression_duration: PT5H
suppression_enabled: false
owner_notes: local only
additional_metadata:
  owner: soc
";

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn deploy_error(err: &anyhow::Error) -> &DeployError {
        err.downcast_ref::<DeployError>()
            .unwrap_or_else(|| panic!("expected DeployError, got {err:?}"))
    }

    #[test]
    fn test_parse_scheduled_detection() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.yaml", SCHEDULED);

        let params = parse(ResourceType::ScheduledDetection, &path)
            .unwrap()
            .unwrap();
        let ResourceParams::Scheduled(detection) = &params else {
            panic!("expected scheduled params, got {params:?}");
        };
        assert_eq!(detection.rule_id, "rule-a");
        assert_eq!(detection.rule.trigger_threshold, Some(5));
        assert!(detection.playbook.is_none());
        assert_eq!(
            detection.additional_metadata.as_ref().unwrap()["owner"],
            "soc"
        );

        // Local-only fields never reach the payload.
        let request = params.alert_rule_request().unwrap().unwrap();
        assert!(request.properties.get("ownerNotes").is_none());
        assert!(request.properties.get("additionalMetadata").is_none());
        assert!(request.properties.get("id").is_none());
    }

    #[test]
    fn test_missing_id_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.yaml", &SCHEDULED.replace("id: rule-a\n", ""));

        let err = parse(ResourceType::ScheduledDetection, &path).unwrap_err();
        assert!(matches!(
            deploy_error(&err),
            DeployError::MissingIdentity { field: "id", .. }
        ));
    }

    #[test]
    fn test_partial_playbook_is_fatal() {
        let dir = TempDir::new().unwrap();
        let content = format!("{SCHEDULED}playbook:\n  name: isolate-host\n  subscription_id: sub-2\n");
        let path = write(&dir, "a.yaml", &content);

        let err = parse(ResourceType::ScheduledDetection, &path).unwrap_err();
        assert!(matches!(
            deploy_error(&err),
            DeployError::PartialPlaybook { .. }
        ));
    }

    #[test]
    fn test_full_playbook_is_extracted() {
        let dir = TempDir::new().unwrap();
        let content = format!(
            "{SCHEDULED}playbook:\n  name: isolate-host\n  subscription_id: sub-2\n  resource_group_name: rg-auto\n  workspace_name: ws-auto\n"
        );
        let path = write(&dir, "a.yaml", &content);

        let params = parse(ResourceType::ScheduledDetection, &path)
            .unwrap()
            .unwrap();
        let playbook = params.playbook().unwrap();
        assert_eq!(playbook.name, "isolate-host");
        assert_eq!(playbook.subscription_id, "sub-2");
        assert!(playbook.trigger_name.is_none());
    }

    #[test]
    fn test_local_etag_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.yaml", &format!("{SCHEDULED}etag: stale\n"));
        let params = parse(ResourceType::ScheduledDetection, &path)
            .unwrap()
            .unwrap();
        assert!(params.etag().is_none());
    }

    #[test]
    fn test_data_source_without_parser_is_none() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "ds.yaml", "id: ds-1\nname: sshd\n");
        assert!(parse(ResourceType::DataSource, &path).unwrap().is_none());
    }

    #[test]
    fn test_data_source_parser() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "ds.yaml",
            "id: ds-1\nname: sshd\nparser:\n  function_id: fn-sshd\n  display_name: SshdEvents\n  query: Syslog\n",
        );
        let params = parse(ResourceType::DataSource, &path).unwrap().unwrap();
        assert_eq!(params.identity(), "fn-sshd");
        assert_eq!(params.display_name(), "SshdEvents");
    }

    #[test]
    fn test_data_source_parser_without_function_id() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "ds.yaml",
            "name: sshd\nparser:\n  display_name: SshdEvents\n  query: Syslog\n",
        );
        let err = parse(ResourceType::DataSource, &path).unwrap_err();
        assert!(matches!(
            deploy_error(&err),
            DeployError::MissingIdentity {
                field: "parser.function_id",
                ..
            }
        ));
    }

    #[test]
    fn test_microsoft_security_detection() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "m.yaml",
            "id: msft-1\ndisplay_name: MDE incidents\nenabled: true\nproduct_filter: Microsoft Defender Advanced Threat Protection\nseverities_filter: [High]\n",
        );
        let params = parse(ResourceType::MicrosoftSecurityDetection, &path)
            .unwrap()
            .unwrap();
        let request = params.alert_rule_request().unwrap().unwrap();
        assert_eq!(
            request.kind,
            armkit::AlertRuleKind::MicrosoftSecurityIncidentCreation
        );
        assert_eq!(
            request.properties["productFilter"],
            "Microsoft Defender Advanced Threat Protection"
        );
        assert_eq!(request.properties["severitiesFilter"][0], "High");
    }

    #[test]
    fn test_top_level_list_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.yaml", "- id: rule-a\n");
        let err = parse(ResourceType::ScheduledDetection, &path).unwrap_err();
        assert!(matches!(
            deploy_error(&err),
            DeployError::InvalidDocument { .. }
        ));
    }
}
