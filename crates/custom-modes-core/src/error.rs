use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModesError {
    #[error("Duplicate slug '{slug}' in one source: defined in {first} and {second}")]
    DuplicateSlug {
        slug: String,
        first: String,
        second: String,
    },

    #[error("Mode not found: {slug}")]
    ModeNotFound { slug: String },

    #[error("Invalid mode slug: '{slug}' - must contain only alphanumeric characters and hyphens")]
    InvalidSlug { slug: String },

    #[error("Invalid mode '{slug}': {}", .errors.join("; "))]
    InvalidMode { slug: String, errors: Vec<String> },

    #[error("Refusing to rewrite malformed file {path}: {message}")]
    MalformedSource { path: PathBuf, message: String },

    #[error("Invalid import bundle: {message}")]
    InvalidBundle { message: String },

    #[error("Rule file path escapes the rules directory: {path}")]
    UnsafeRulePath { path: String },

    #[error("No project root is available for project-scoped modes")]
    NoProjectRoot,

    #[error("Config parse error in {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Unknown config key: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ModesError>;

impl ModesError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ModeNotFound { .. } => 2,
            Self::DuplicateSlug { .. } => 3,
            Self::InvalidSlug { .. } | Self::InvalidMode { .. } => 4,
            Self::InvalidBundle { .. } | Self::UnsafeRulePath { .. } => 5,
            Self::MalformedSource { .. } => 6,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_slug_message_names_both_origins() {
        let err = ModesError::DuplicateSlug {
            slug: "review".to_string(),
            first: "/p/.kilocode/modes/a.yaml".to_string(),
            second: "/p/.kilocode/modes/b.yaml".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("/p/.kilocode/modes/a.yaml"));
        assert!(message.contains("/p/.kilocode/modes/b.yaml"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn invalid_mode_joins_field_errors() {
        let err = ModesError::InvalidMode {
            slug: "x".to_string(),
            errors: vec!["name: must not be empty".to_string(), "groups: missing".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Invalid mode 'x': name: must not be empty; groups: missing"
        );
    }
}
