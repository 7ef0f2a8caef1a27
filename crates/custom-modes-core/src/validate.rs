//! Mode schema validation
//!
//! Validation is a seam: the engine only needs something that turns a raw
//! parsed record into a typed [`ModeConfig`] or a list of field errors.
//! [`SchemaValidator`] is the built-in implementation.

use std::collections::HashSet;
use std::fmt;

use serde_yaml::{Mapping, Value};

use crate::error::{ModesError, Result};
use crate::mode::{ModeConfig, ModeSource, ToolGroup};

/// One field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Turns a raw record into a validated mode
pub trait ModeValidator {
    fn validate(&self, raw: &Value) -> std::result::Result<ModeConfig, Vec<FieldError>>;
}

/// Default schema: required `slug`/`name`/`roleDefinition`/`groups`,
/// known tool groups without repeats, optional string extras.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl ModeValidator for SchemaValidator {
    fn validate(&self, raw: &Value) -> std::result::Result<ModeConfig, Vec<FieldError>> {
        let Some(map) = raw.as_mapping() else {
            return Err(vec![FieldError::new("(root)", "expected a mapping")]);
        };

        let mut errors = Vec::new();

        if let Some(slug) = required_string(map, "slug", &mut errors) {
            if !is_valid_slug(&slug) {
                errors.push(FieldError::new(
                    "slug",
                    "must contain only letters, digits and hyphens",
                ));
            }
        }
        required_string(map, "name", &mut errors);
        required_string(map, "roleDefinition", &mut errors);
        check_groups(map.get("groups"), &mut errors);

        if let Some(source) = map.get("source") {
            match source.as_str() {
                Some(s) if ModeSource::all().iter().any(|source| source.id() == s) => {}
                _ => errors.push(FieldError::new("source", "must be 'project' or 'global'")),
            }
        }

        for key in ["whenToUse", "description", "customInstructions"] {
            if let Some(value) = map.get(key) {
                if !value.is_string() && !value.is_null() {
                    errors.push(FieldError::new(key, "must be a string"));
                }
            }
        }

        if let Some(rules) = map.get("rules") {
            match rules.as_sequence() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        if !item.is_string() {
                            errors.push(FieldError::new(format!("rules[{}]", i), "must be a string"));
                        }
                    }
                }
                None if rules.is_null() => {}
                None => errors.push(FieldError::new("rules", "must be a list of strings")),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        serde_yaml::from_value(raw.clone())
            .map_err(|e| vec![FieldError::new("(root)", e.to_string())])
    }
}

fn required_string(map: &Mapping, key: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    match map.get(key) {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(key, "is required"));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.push(FieldError::new(key, "must not be empty"));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(FieldError::new(key, "must be a string"));
            None
        }
    }
}

fn check_groups(groups: Option<&Value>, errors: &mut Vec<FieldError>) {
    let entries = match groups {
        None | Some(Value::Null) => {
            errors.push(FieldError::new("groups", "is required"));
            return;
        }
        Some(Value::Sequence(entries)) => entries,
        Some(_) => {
            errors.push(FieldError::new("groups", "must be a list"));
            return;
        }
    };

    let mut seen = HashSet::new();
    for (i, entry) in entries.iter().enumerate() {
        let field = format!("groups[{}]", i);
        let name = match entry {
            Value::String(name) => Some(name.as_str()),
            Value::Sequence(pair) if pair.len() == 2 && pair[1].is_mapping() => {
                check_group_options(&pair[1], &field, errors);
                pair[0].as_str()
            }
            _ => None,
        };

        let Some(name) = name else {
            errors.push(FieldError::new(
                field,
                "must be a group name or [group, options]",
            ));
            continue;
        };

        match name.parse::<ToolGroup>() {
            Ok(group) => {
                if !seen.insert(group) {
                    errors.push(FieldError::new(field, format!("duplicate group '{}'", group)));
                }
            }
            Err(message) => errors.push(FieldError::new(field, message)),
        }
    }
}

fn check_group_options(options: &Value, field: &str, errors: &mut Vec<FieldError>) {
    for key in ["fileRegex", "description"] {
        if let Some(value) = options.get(key) {
            if !value.is_string() {
                errors.push(FieldError::new(
                    format!("{}.{}", field, key),
                    "must be a string",
                ));
            }
        }
    }
}

/// Slugs are non-empty and limited to ASCII letters, digits and `-`
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(ModesError::InvalidSlug {
            slug: slug.to_string(),
        })
    }
}

/// Parse one mode record from YAML text, failing on any field error
pub fn parse_mode(text: &str, validator: &dyn ModeValidator) -> Result<ModeConfig> {
    let raw: Value = serde_yaml::from_str(text)?;
    validator.validate(&raw).map_err(|errors| ModesError::InvalidMode {
        slug: raw
            .get("slug")
            .and_then(Value::as_str)
            .unwrap_or("(unknown)")
            .to_string(),
        errors: errors.iter().map(ToString::to_string).collect(),
    })
}

/// Run a typed config back through the validator before it is persisted
pub fn validate_config(validator: &dyn ModeValidator, config: &ModeConfig) -> Result<ModeConfig> {
    let raw = serde_yaml::to_value(config)?;
    validator
        .validate(&raw)
        .map_err(|errors| ModesError::InvalidMode {
            slug: config.slug.clone(),
            errors: errors.iter().map(ToString::to_string).collect(),
        })
}
