//! JSON Schema validation of resource documents.

use crate::error::DeployError;
use crate::resolver::{ConfigKind, ConfigSource, Resolver};
use crate::resource::ResourceType;
use crate::resource::parser::load_document;
use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const USAGE: &str = "--directory DIRECTORY | --file FILE";

/// The files a command operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceTarget {
    Directory(PathBuf),
    File(PathBuf),
}

impl ResourceTarget {
    /// Exactly one of the two flags must be set.
    pub fn from_flags(directory: Option<PathBuf>, file: Option<PathBuf>) -> Result<Self> {
        match (directory, file) {
            (Some(dir), None) => Ok(Self::Directory(dir)),
            (None, Some(file)) => Ok(Self::File(file)),
            _ => Err(DeployError::Usage(USAGE.to_string()).into()),
        }
    }

    /// Resource files in scan order: sorted by name, depth first.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let dir = match self {
            Self::File(file) => return Ok(vec![file.clone()]),
            Self::Directory(dir) => dir,
        };
        if !dir.is_dir() {
            anyhow::bail!("{} is not a directory", dir.display());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Could not scan {}", dir.display()))?;
            if entry.file_type().is_file() && is_yaml(entry.path()) {
                files.push(entry.into_path());
            }
        }
        log::debug!("Found {} resource files under {}", files.len(), dir.display());
        Ok(files)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

/// A compiled schema.
pub struct SchemaValidator {
    validator: jsonschema::Validator,
    source: String,
}

impl SchemaValidator {
    pub fn load(source: &ConfigSource) -> Result<Self> {
        if !source.is_bundled() {
            log::info!("Validating against {source}");
        }
        let text = source.read()?;
        let schema: Value = serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid schema document in {source}"))?;
        Self::from_value(&schema, source.to_string())
    }

    pub fn from_value(schema: &Value, source: String) -> Result<Self> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| anyhow!("Invalid schema in {source}: {e}"))?;
        Ok(Self { validator, source })
    }

    /// Fails on the first violation.
    pub fn validate(&self, file: &Path, document: &Value) -> Result<()> {
        if let Some(error) = self.validator.iter_errors(document).next() {
            let location = error.instance_path.to_string();
            let message = if location.is_empty() {
                error.to_string()
            } else {
                format!("{location}: {error}")
            };
            return Err(DeployError::validation(file, message).into());
        }
        Ok(())
    }

    pub fn validate_file(&self, file: &Path) -> Result<()> {
        let document = load_document(file)?;
        self.validate(file, &document)?;
        log::info!("Validated {} against {}", file.display(), self.source);
        Ok(())
    }
}

/// Validate every file of `target`, stopping at the first failure.
///
/// Returns the number of files validated.
pub fn validate(
    resource_type: ResourceType,
    target: &ResourceTarget,
    schema: Option<&Path>,
    resolver: &Resolver,
) -> Result<usize> {
    let source = resolver.resolve(resource_type, ConfigKind::Schema, schema);
    let validator = SchemaValidator::load(&source)?;

    let files = target.files()?;
    for file in &files {
        validator.validate_file(file)?;
    }
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const VALID: &str = r"
id: rule-a
display_name: Brute force
enabled: true
query: SecurityEvent
query_frequency: PT1H
query_period: PT1H
severity: High
trigger_operator: GreaterThan
trigger_threshold: 0
suppression_duration: PT5H
suppression_enabled: false
";

    fn resolver(dir: &TempDir) -> Resolver {
        Resolver::new(dir.path(), None)
    }

    #[test]
    fn test_usage_errors() {
        for (dir, file) in [
            (None, None),
            (Some(PathBuf::from("d")), Some(PathBuf::from("f"))),
        ] {
            let err = ResourceTarget::from_flags(dir, file).unwrap_err();
            let err = err.downcast_ref::<DeployError>().unwrap();
            assert!(matches!(err, DeployError::Usage(_)));
            assert!(err.to_string().starts_with("incorrect usage"));
        }
    }

    #[test]
    fn test_files_scan_order_and_extensions() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.yaml"), "").unwrap();
        fs::write(dir.path().join("a.yaml"), "").unwrap();
        fs::write(dir.path().join("nested").join("c.yml"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();

        let target = ResourceTarget::Directory(dir.path().to_path_buf());
        let names: Vec<_> = target
            .files()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.yaml", "b.yaml", "c.yml"]);
    }

    #[test]
    fn test_valid_document_passes() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.yaml");
        fs::write(&file, VALID).unwrap();

        let count = validate(
            ResourceType::ScheduledDetection,
            &ResourceTarget::File(file),
            None,
            &resolver(&dir),
        )
        .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_missing_required_field_names_violation() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.yaml");
        fs::write(&file, VALID.replace("enabled: true\n", "")).unwrap();

        let err = validate(
            ResourceType::ScheduledDetection,
            &ResourceTarget::File(file),
            None,
            &resolver(&dir),
        )
        .unwrap_err();
        let err = err.downcast_ref::<DeployError>().unwrap();
        assert!(matches!(err, DeployError::Validation { .. }));
        assert!(err.to_string().contains("enabled"));
    }

    #[test]
    fn test_fail_fast_on_first_invalid_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.yaml"), "id: only-an-id\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "also: [broken").unwrap();

        let err = validate(
            ResourceType::ScheduledDetection,
            &ResourceTarget::Directory(dir.path().to_path_buf()),
            None,
            &resolver(&dir),
        )
        .unwrap_err();
        let err = err.downcast_ref::<DeployError>().unwrap();
        assert!(err.to_string().contains("a.yaml"));
    }

    #[test]
    fn test_explicit_schema_override() {
        let dir = TempDir::new().unwrap();
        let schema = dir.path().join("strict.json");
        fs::write(
            &schema,
            r#"{"type":"object","required":["owner"],"properties":{"owner":{"type":"string"}}}"#,
        )
        .unwrap();
        let file = dir.path().join("a.yaml");
        fs::write(&file, VALID).unwrap();

        let result = validate(
            ResourceType::ScheduledDetection,
            &ResourceTarget::File(file),
            Some(&schema),
            &resolver(&dir),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_bundled_templates_validate_against_bundled_schemas() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir);
        for resource in ResourceType::ALL {
            let schema = SchemaValidator::load(&resolver.resolve(
                resource,
                ConfigKind::Schema,
                None,
            ))
            .unwrap();
            let template = resolver
                .resolve(resource, ConfigKind::Template, None)
                .read()
                .unwrap()
                .replace("{id}", "00000000-0000-4000-8000-000000000000")
                .replace("{name}", "sample-resource");
            let document: Value = serde_yaml::from_str(&template).unwrap();
            schema
                .validate(Path::new("template.yaml"), &document)
                .unwrap_or_else(|e| panic!("{resource} template: {e}"));
        }
    }
}
