//! Aggregation of one configuration source.
//!
//! A source is a (scope, representation) pair: a directory of per-mode files
//! or one monolithic file holding a `customModes` list.
//!
//! Duplicate slugs are fatal *within* a source and expected *across* sources.
//! Two definitions of one slug inside the same directory tree or the same
//! file mean the source itself is corrupted or mis-edited, so the whole
//! resolution fails and names both origins. The same slug in different
//! sources is a layered override and is settled by precedence in
//! [`crate::resolver`].

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::error::{ModesError, Result};
use crate::loader::{load_mode_file, validate_record};
use crate::mode::{ModeConfig, ModeSource};
use crate::scanner::{scan, ScanRules};
use crate::validate::ModeValidator;

/// Top-level key of a monolithic modes file
pub const MODES_KEY: &str = "customModes";

/// How a source encodes its modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    /// One file per mode below a directory root
    Directory,
    /// A single file with a `customModes` list
    File,
}

/// One physical configuration source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub scope: ModeSource,
    pub representation: Representation,
    pub location: PathBuf,
}

impl ConfigSource {
    pub fn new(scope: ModeSource, representation: Representation, location: PathBuf) -> Self {
        Self {
            scope,
            representation,
            location,
        }
    }

    /// Load every mode this source contributes
    pub fn load(&self, rules: &ScanRules, validator: &dyn ModeValidator) -> Result<SourceModes> {
        match self.representation {
            Representation::Directory => {
                load_directory(&self.location, self.scope, rules, validator)
            }
            Representation::File => load_modes_file(&self.location, self.scope, validator),
        }
    }
}

/// Where a mode was defined inside its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeOrigin {
    File(PathBuf),
    Entry { path: PathBuf, index: usize },
}

impl ModeOrigin {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(path) | Self::Entry { path, .. } => path,
        }
    }
}

impl fmt::Display for ModeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Entry { path, index } => {
                write!(f, "{} ({}[{}])", path.display(), MODES_KEY, index)
            }
        }
    }
}

/// A validated mode together with its origin
#[derive(Debug, Clone)]
pub struct LoadedMode {
    pub config: ModeConfig,
    pub origin: ModeOrigin,
}

/// Slug-keyed modes of a single source. Iteration order is unspecified.
#[derive(Debug, Clone, Default)]
pub struct SourceModes {
    modes: HashMap<String, LoadedMode>,
}

impl SourceModes {
    /// Add a mode, stamping its scope. A slug seen twice is fatal.
    fn insert(&mut self, mut config: ModeConfig, scope: ModeSource, origin: ModeOrigin) -> Result<()> {
        if let Some(existing) = self.modes.get(&config.slug) {
            return Err(ModesError::DuplicateSlug {
                slug: config.slug,
                first: existing.origin.to_string(),
                second: origin.to_string(),
            });
        }

        config.source = Some(scope);
        self.modes
            .insert(config.slug.clone(), LoadedMode { config, origin });
        Ok(())
    }

    pub fn get(&self, slug: &str) -> Option<&LoadedMode> {
        self.modes.get(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.modes.contains_key(slug)
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadedMode> {
        self.modes.values()
    }

    pub fn into_modes(self) -> impl Iterator<Item = LoadedMode> {
        self.modes.into_values()
    }
}

/// Aggregate a directory of per-mode files
pub fn load_directory(
    root: &Path,
    scope: ModeSource,
    rules: &ScanRules,
    validator: &dyn ModeValidator,
) -> Result<SourceModes> {
    let mut modes = SourceModes::default();

    for file in scan(root, rules) {
        if let Some(config) = load_mode_file(&file.path, validator)? {
            modes.insert(config, scope, ModeOrigin::File(file.path))?;
        }
    }

    debug!(root = %root.display(), scope = %scope, count = modes.len(), "loaded mode directory");
    Ok(modes)
}

/// Aggregate a monolithic modes file. A missing file contributes nothing.
pub fn load_modes_file(
    path: &Path,
    scope: ModeSource,
    validator: &dyn ModeValidator,
) -> Result<SourceModes> {
    let mut modes = SourceModes::default();

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(modes),
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            warn!(path = %path.display(), "skipping modes file: not valid UTF-8");
            return Ok(modes);
        }
        Err(e) => return Err(e.into()),
    };

    let document = match parse_modes_document(&content) {
        Ok(document) => document,
        Err(message) => {
            warn!(path = %path.display(), error = %message, "skipping modes file");
            return Ok(modes);
        }
    };

    for (index, entry) in mode_entries(&document).iter().enumerate() {
        let origin = ModeOrigin::Entry {
            path: path.to_path_buf(),
            index,
        };
        if let Some(config) = validate_record(entry, &origin.to_string(), validator) {
            modes.insert(config, scope, origin)?;
        }
    }

    debug!(path = %path.display(), scope = %scope, count = modes.len(), "loaded modes file");
    Ok(modes)
}

/// Parse a monolithic file body into its top-level mapping.
///
/// Empty content is an empty document. The mapping keeps every key so that
/// rewrites only touch `customModes`.
pub(crate) fn parse_modes_document(content: &str) -> std::result::Result<Mapping, String> {
    if content.trim().is_empty() {
        return Ok(Mapping::new());
    }

    match serde_yaml::from_str::<Value>(content) {
        Ok(Value::Null) => Ok(Mapping::new()),
        Ok(Value::Mapping(map)) => {
            let list_shaped = matches!(
                map.get(MODES_KEY),
                None | Some(Value::Null) | Some(Value::Sequence(_))
            );
            if list_shaped {
                Ok(map)
            } else {
                Err(format!("'{}' must be a list", MODES_KEY))
            }
        }
        Ok(_) => Err(format!("expected a mapping with a '{}' list", MODES_KEY)),
        Err(e) => Err(e.to_string()),
    }
}

/// Raw entries of the `customModes` list
pub(crate) fn mode_entries(document: &Mapping) -> &[Value] {
    document
        .get(MODES_KEY)
        .and_then(Value::as_sequence)
        .map(|entries| entries.as_slice())
        .unwrap_or(&[])
}
