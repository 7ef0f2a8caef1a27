//! Portable mode bundles: modes plus the rule text files that go with them.
//!
//! ```yaml
//! customModes:
//!   - slug: reviewer
//!     name: Reviewer
//!     roleDefinition: You review pull requests.
//!     groups: [read]
//!     rulesFiles:
//!       - relativePath: checklist.md
//!         content: "# Checklist"
//! ```
//!
//! Rule files are written below `<root>/.kilocode/rules-<slug>/`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{ModesError, Result};
use crate::mode::{ModeConfig, ModeSource, RuleFile};
use crate::paths::{safe_relative_path, ModePaths};
use crate::scanner::ScanRules;
use crate::source::{mode_entries, parse_modes_document};
use crate::store::{ModeStore, UpdateOptions};
use crate::validate::ModeValidator;

/// Serialized import/export payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeBundle {
    pub custom_modes: Vec<ModeConfig>,
}

impl ModeBundle {
    /// Parse and validate bundle text. Any invalid mode rejects the bundle.
    pub fn parse(text: &str, validator: &dyn ModeValidator) -> Result<Self> {
        let document =
            parse_modes_document(text).map_err(|message| ModesError::InvalidBundle { message })?;

        let entries = mode_entries(&document);
        if entries.is_empty() {
            return Err(ModesError::InvalidBundle {
                message: "bundle contains no modes".to_string(),
            });
        }

        let mut custom_modes = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let mode = validator.validate(entry).map_err(|errors| {
                let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
                ModesError::InvalidBundle {
                    message: format!("mode #{}: {}", index, errors.join("; ")),
                }
            })?;

            for rule in &mode.rules_files {
                safe_relative_path(&rule.relative_path)?;
            }
            custom_modes.push(mode);
        }

        Ok(Self { custom_modes })
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn slugs(&self) -> Vec<String> {
        self.custom_modes.iter().map(|m| m.slug.clone()).collect()
    }
}

/// Outcome of an import, for callers that report rather than propagate
#[derive(Debug, Default)]
pub struct ImportResult {
    pub success: bool,
    /// The error that stopped the import
    pub error: Option<ModesError>,
    /// Slugs written before success or failure
    pub imported: Vec<String>,
}

/// Materialize every mode of a bundle in `scope`, then its rule files.
///
/// Stops at the first failing write. Files already written stay in place;
/// the slugs completed so far are passed to `on_imported` as they finish.
pub fn import_bundle(
    store: &ModeStore<'_>,
    paths: &ModePaths,
    bundle: &ModeBundle,
    scope: ModeSource,
    options: UpdateOptions,
    mut on_imported: impl FnMut(&str),
) -> Result<()> {
    for mode in &bundle.custom_modes {
        let config = mode.clone().with_source(scope);
        store.update(&mode.slug, &config, options)?;

        if !mode.rules_files.is_empty() {
            let rules_dir = paths.rules_dir(scope, &mode.slug)?;
            for rule in &mode.rules_files {
                let target = rules_dir.join(safe_relative_path(&rule.relative_path)?);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, &rule.content)?;
            }
        }

        info!(
            slug = %mode.slug,
            scope = %scope,
            rule_files = mode.rules_files.len(),
            "imported mode"
        );
        on_imported(&mode.slug);
    }

    Ok(())
}

/// Build a single-mode bundle from a resolved mode and its rule directory
pub fn export_bundle(paths: &ModePaths, rules: &ScanRules, mode: &ModeConfig) -> Result<ModeBundle> {
    let scope = mode.source.unwrap_or(ModeSource::Global);
    let rules_dir = paths.rules_dir(scope, &mode.slug)?;

    let mut exported = mode.clone();
    // The importer decides the scope
    exported.source = None;
    exported.rules_files = collect_rule_files(&rules_dir, rules)?;

    Ok(ModeBundle {
        custom_modes: vec![exported],
    })
}

fn collect_rule_files(rules_dir: &Path, rules: &ScanRules) -> Result<Vec<RuleFile>> {
    if !rules_dir.is_dir() {
        return Ok(Vec::new());
    }

    let walker = WalkDir::new(rules_dir)
        .max_depth(rules.max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            entry.depth() == 0 || !rules.excluded_names.iter().any(|n| *n == name)
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = match entry.path().strip_prefix(rules_dir) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        match fs::read_to_string(entry.path()) {
            Ok(content) => files.push(RuleFile {
                relative_path,
                content,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!(path = %entry.path().display(), "skipping non-UTF-8 rule file");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(files)
}
