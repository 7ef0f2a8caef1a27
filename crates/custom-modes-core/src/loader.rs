//! Single mode file loading.
//!
//! Content problems (bad encoding, bad YAML, wrong shape, schema violations)
//! are logged and turn into `None`. Only I/O failures are returned as errors.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde_yaml::Value;
use tracing::warn;

use crate::error::Result;
use crate::mode::ModeConfig;
use crate::validate::ModeValidator;

/// Load and validate one per-mode file
pub fn load_mode_file(path: &Path, validator: &dyn ModeValidator) -> Result<Option<ModeConfig>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        // Removed between the scan and the read
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            warn!(path = %path.display(), "skipping mode file: not valid UTF-8");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let value: Value = match serde_yaml::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping mode file: invalid YAML");
            return Ok(None);
        }
    };

    if !value.is_mapping() {
        warn!(
            path = %path.display(),
            kind = value_kind(&value),
            "skipping mode file: expected a mapping"
        );
        return Ok(None);
    }

    Ok(validate_record(&value, &path.display().to_string(), validator))
}

/// Validate one raw record, logging field errors against `origin`
pub fn validate_record(
    value: &Value,
    origin: &str,
    validator: &dyn ModeValidator,
) -> Option<ModeConfig> {
    match validator.validate(value) {
        Ok(mode) => Some(mode),
        Err(errors) => {
            let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
            warn!(
                origin = %origin,
                errors = %errors.join("; "),
                "skipping invalid mode"
            );
            None
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "empty document",
        Value::Bool(_) | Value::Number(_) | Value::String(_) => "scalar",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
