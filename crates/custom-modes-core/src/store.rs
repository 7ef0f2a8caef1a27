//! Persistence of mode mutations.
//!
//! Writes go either to a per-mode file in the scope's modes directory or to
//! the scope's monolithic file. Overwrites are unconditional and every I/O
//! failure is returned to the caller.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

use crate::error::{ModesError, Result};
use crate::mode::{ModeConfig, ModeSource};
use crate::paths::{ModePaths, MODE_FILE_EXTENSION};
use crate::scanner::{scan, ScanRules};
use crate::source::{mode_entries, parse_modes_document, MODES_KEY};
use crate::validate::{validate_config, validate_slug, ModeValidator};

/// Where an update should land
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// `Some(true)`: per-mode file. `Some(false)`: monolithic file.
    /// `None`: per-mode file if one already holds the slug, else monolithic.
    pub to_directory: Option<bool>,
}

impl UpdateOptions {
    pub fn directory() -> Self {
        Self {
            to_directory: Some(true),
        }
    }

    pub fn file() -> Self {
        Self {
            to_directory: Some(false),
        }
    }
}

/// Files touched by a delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Per-mode files removed
    pub removed: Vec<PathBuf>,
    /// Monolithic files rewritten without the slug
    pub rewritten: Vec<PathBuf>,
}

impl DeleteOutcome {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.rewritten.is_empty()
    }
}

/// Create/update/delete against the physical mode sources
pub struct ModeStore<'a> {
    paths: &'a ModePaths,
    rules: &'a ScanRules,
    validator: &'a dyn ModeValidator,
}

impl<'a> ModeStore<'a> {
    pub fn new(paths: &'a ModePaths, rules: &'a ScanRules, validator: &'a dyn ModeValidator) -> Self {
        Self {
            paths,
            rules,
            validator,
        }
    }

    /// Write `config` under `slug`. The scope comes from `config.source`
    /// (global when unset). Returns the file written.
    pub fn update(&self, slug: &str, config: &ModeConfig, options: UpdateOptions) -> Result<PathBuf> {
        validate_slug(slug)?;

        let scope = config.source.unwrap_or(ModeSource::Global);
        let mut config = config.to_persisted();
        config.slug = slug.to_string();
        config.source = Some(scope);
        let config = validate_config(self.validator, &config)?.to_persisted();

        let existing = self.directory_files(scope, slug)?;
        let to_directory = options.to_directory.unwrap_or(!existing.is_empty());

        let path = if to_directory {
            // Reuse the file already holding the slug so the directory never
            // ends up with two definitions of it
            let path = match existing.into_iter().next() {
                Some(path) => path,
                None => self.vacant_mode_file(scope, slug)?,
            };
            write_mode_file(&path, &config)?;
            path
        } else {
            if let Some(shadowing) = existing.first() {
                warn!(
                    slug = %slug,
                    scope = %scope,
                    shadowed_by = %shadowing.display(),
                    "mode written to modes file is shadowed by a per-mode file"
                );
            }
            let path = self.paths.modes_file(scope)?;
            upsert_in_modes_file(&path, &config)?;
            path
        };

        info!(slug = %slug, scope = %scope, path = %path.display(), "saved mode");
        Ok(path)
    }

    /// Remove `slug` from every source that defines it. Absence everywhere
    /// is a no-op.
    pub fn delete(&self, slug: &str) -> Result<DeleteOutcome> {
        let mut outcome = DeleteOutcome::default();

        for &scope in ModeSource::all() {
            if self.paths.root(scope).is_err() {
                continue;
            }

            for path in self.directory_files(scope, slug)? {
                match fs::remove_file(&path) {
                    Ok(()) => outcome.removed.push(path),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }

            for path in self.paths.all_modes_files(scope)? {
                if remove_from_modes_file(&path, slug)? {
                    outcome.rewritten.push(path);
                }
            }
        }

        if outcome.is_noop() {
            info!(slug = %slug, "mode not present in any source, nothing to delete");
        } else {
            info!(
                slug = %slug,
                removed = outcome.removed.len(),
                rewritten = outcome.rewritten.len(),
                "deleted mode"
            );
        }
        Ok(outcome)
    }

    /// `<slug>.yaml`, or the first free `<slug>-<n>.yaml` when that name is
    /// taken by a file declaring something else
    fn vacant_mode_file(&self, scope: ModeSource, slug: &str) -> Result<PathBuf> {
        let canonical = self.paths.mode_file(scope, slug)?;
        if !canonical.exists() {
            return Ok(canonical);
        }

        let dir = self.paths.modes_dir(scope)?;
        let mut n = 2;
        loop {
            let candidate = dir.join(format!("{}-{}.{}", slug, n, MODE_FILE_EXTENSION));
            if !candidate.exists() {
                warn!(
                    slug = %slug,
                    occupied = %canonical.display(),
                    path = %candidate.display(),
                    "canonical mode file holds another mode, writing alongside it"
                );
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Per-mode files of a scope whose `slug` field equals `slug`
    pub fn directory_files(&self, scope: ModeSource, slug: &str) -> Result<Vec<PathBuf>> {
        let root = self.paths.modes_dir(scope)?;
        let mut matches = Vec::new();

        for file in scan(&root, self.rules) {
            if declared_slug(&file.path)?.as_deref() == Some(slug) {
                matches.push(file.path);
            }
        }

        // Prefer the canonical `<slug>.yaml` when several files match
        let canonical = self.paths.mode_file(scope, slug)?;
        matches.sort_by_key(|path| *path != canonical);
        Ok(matches)
    }
}

/// Read just the `slug` field of a mode file, ignoring unreadable content
fn declared_slug(path: &Path) -> Result<Option<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::InvalidData) => {
            return Ok(None)
        }
        Err(e) => return Err(e.into()),
    };

    Ok(serde_yaml::from_str::<Value>(&content)
        .ok()
        .and_then(|value| value.get("slug").and_then(Value::as_str).map(String::from)))
}

fn write_mode_file(path: &Path, config: &ModeConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_yaml::to_string(config)?;
    fs::write(path, content)?;
    Ok(())
}

/// Load a monolithic file for rewriting. `None` when it does not exist.
fn read_modes_document(path: &Path) -> Result<Option<Mapping>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            return Err(ModesError::MalformedSource {
                path: path.to_path_buf(),
                message: "not valid UTF-8".to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    parse_modes_document(&content)
        .map(Some)
        .map_err(|message| ModesError::MalformedSource {
            path: path.to_path_buf(),
            message,
        })
}

fn write_modes_document(path: &Path, mut document: Mapping, entries: Vec<Value>) -> Result<()> {
    document.insert(Value::from(MODES_KEY), Value::Sequence(entries));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_yaml::to_string(&document)?)?;
    Ok(())
}

fn entry_slug(entry: &Value) -> Option<&str> {
    entry.get("slug").and_then(Value::as_str)
}

/// Insert or replace the entry for `config.slug`, keeping its position and
/// every other key of the file
fn upsert_in_modes_file(path: &Path, config: &ModeConfig) -> Result<()> {
    let document = read_modes_document(path)?.unwrap_or_default();
    let record = serde_yaml::to_value(config)?;

    let mut entries = Vec::new();
    let mut replaced = false;
    for entry in mode_entries(&document) {
        if entry_slug(entry) == Some(config.slug.as_str()) {
            if !replaced {
                entries.push(record.clone());
                replaced = true;
            }
            continue;
        }
        entries.push(entry.clone());
    }
    if !replaced {
        entries.push(record);
    }

    debug!(path = %path.display(), slug = %config.slug, replaced, "upserting mode entry");
    write_modes_document(path, document, entries)
}

/// Drop every entry for `slug`. Returns whether the file changed.
fn remove_from_modes_file(path: &Path, slug: &str) -> Result<bool> {
    let document = match read_modes_document(path) {
        Ok(Some(document)) => document,
        Ok(None) => return Ok(false),
        Err(ModesError::MalformedSource { path, message }) => {
            // Contributes nothing to resolution, so there is nothing to remove
            warn!(path = %path.display(), error = %message, "leaving malformed modes file untouched");
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let before = mode_entries(&document).len();
    let entries: Vec<Value> = mode_entries(&document)
        .iter()
        .filter(|entry| entry_slug(entry) != Some(slug))
        .cloned()
        .collect();

    if entries.len() == before {
        return Ok(false);
    }

    write_modes_document(path, document, entries)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ToolGroup;
    use crate::paths::StaticPaths;
    use crate::resolver::resolve;
    use crate::validate::SchemaValidator;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        paths: ModePaths,
        rules: ScanRules,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let paths = ModePaths::from_provider(&StaticPaths::new(
                Some(temp.path().join("project")),
                temp.path().join("global"),
            ));
            Self {
                _temp: temp,
                paths,
                rules: ScanRules::default(),
            }
        }

        fn store(&self) -> ModeStore<'_> {
            ModeStore::new(&self.paths, &self.rules, &SchemaValidator)
        }

        fn resolve(&self) -> Vec<ModeConfig> {
            resolve(&self.paths.sources(), &self.rules, &SchemaValidator).unwrap()
        }
    }

    fn mode(slug: &str, name: &str, scope: ModeSource) -> ModeConfig {
        ModeConfig::new(slug, name, "Does things", vec![ToolGroup::Read.into()]).with_source(scope)
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn update_to_directory_round_trips() {
        let fx = Fixture::new();
        let mut cfg = mode("writer", "Writer", ModeSource::Project);
        cfg.when_to_use = Some("Prose".to_string());
        cfg.rules = vec!["Be concise".to_string()];

        let path = fx.store().update("writer", &cfg, UpdateOptions::directory()).unwrap();
        assert_eq!(path, fx.paths.mode_file(ModeSource::Project, "writer").unwrap());

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("source: project"));

        let modes = fx.resolve();
        assert_eq!(modes, vec![cfg]);
    }

    #[test]
    fn update_to_file_upserts_in_place_and_keeps_other_keys() {
        let fx = Fixture::new();
        let file = fx.paths.modes_file(ModeSource::Global).unwrap();
        write(
            &file,
            "version: 1\ncustomModes:\n  - {slug: a, name: A, roleDefinition: r, groups: [read]}\n  - {slug: b, name: B, roleDefinition: r, groups: [read]}\n",
        );

        fx.store()
            .update("a", &mode("a", "A2", ModeSource::Global), UpdateOptions::file())
            .unwrap();
        fx.store()
            .update("c", &mode("c", "C", ModeSource::Global), UpdateOptions::file())
            .unwrap();

        let document = read_modes_document(&file).unwrap().unwrap();
        assert!(document.contains_key("version"));
        let slugs: Vec<_> = mode_entries(&document).iter().filter_map(entry_slug).collect();
        assert_eq!(slugs, vec!["a", "b", "c"]);

        let modes = fx.resolve();
        assert_eq!(modes[0].name, "A2");
    }

    #[test]
    fn update_without_intent_follows_existing_directory_file() {
        let fx = Fixture::new();
        let custom = fx.paths.modes_dir(ModeSource::Project).unwrap().join("renamed.yaml");
        write(&custom, "slug: m\nname: Old\nroleDefinition: r\ngroups: [read]\n");

        let path = fx
            .store()
            .update("m", &mode("m", "New", ModeSource::Project), UpdateOptions::default())
            .unwrap();
        assert_eq!(path, custom);

        // Still a single definition in the directory source
        let modes = fx.resolve();
        assert_eq!(modes.len(), 1);
        assert_eq!(modes[0].name, "New");
    }

    #[test]
    fn update_without_intent_defaults_to_modes_file() {
        let fx = Fixture::new();
        let path = fx
            .store()
            .update("m", &mode("m", "M", ModeSource::Project), UpdateOptions::default())
            .unwrap();
        assert_eq!(path, fx.paths.modes_file(ModeSource::Project).unwrap());
    }

    #[test]
    fn update_rejects_invalid_config_before_writing() {
        let fx = Fixture::new();
        let cfg = mode("m", "  ", ModeSource::Global);
        let result = fx.store().update("m", &cfg, UpdateOptions::directory());
        assert!(matches!(result, Err(ModesError::InvalidMode { .. })));
        assert!(!fx.paths.mode_file(ModeSource::Global, "m").unwrap().exists());

        let result = fx.store().update("bad slug", &mode("x", "X", ModeSource::Global), UpdateOptions::directory());
        assert!(matches!(result, Err(ModesError::InvalidSlug { .. })));
    }

    #[test]
    fn update_refuses_to_clobber_malformed_modes_file() {
        let fx = Fixture::new();
        let file = fx.paths.modes_file(ModeSource::Project).unwrap();
        write(&file, "customModes: [\n");

        let result = fx
            .store()
            .update("m", &mode("m", "M", ModeSource::Project), UpdateOptions::file());
        assert!(matches!(result, Err(ModesError::MalformedSource { .. })));
        assert_eq!(fs::read_to_string(&file).unwrap(), "customModes: [\n");
    }

    #[test]
    fn delete_removes_slug_from_every_source() {
        let fx = Fixture::new();
        let store = fx.store();
        for scope in [ModeSource::Project, ModeSource::Global] {
            store.update("x", &mode("x", "Dir", scope), UpdateOptions::directory()).unwrap();
            store.update("x", &mode("x", "File", scope), UpdateOptions::file()).unwrap();
        }
        write(
            &fx.paths.legacy_modes_file().unwrap(),
            "customModes:\n  - {slug: x, name: Legacy, roleDefinition: r, groups: [read]}\n  - {slug: keep, name: Keep, roleDefinition: r, groups: [read]}\n",
        );

        let outcome = store.delete("x").unwrap();
        assert_eq!(outcome.removed.len(), 2);
        assert_eq!(outcome.rewritten.len(), 3);

        let modes = fx.resolve();
        let slugs: Vec<_> = modes.iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(slugs, vec!["keep"]);
    }

    #[test]
    fn delete_finds_renamed_directory_files() {
        let fx = Fixture::new();
        let custom = fx.paths.modes_dir(ModeSource::Global).unwrap().join("team/other-name.yml");
        write(&custom, "slug: x\nname: X\nroleDefinition: r\ngroups: [read]\n");

        let outcome = fx.store().delete("x").unwrap();
        assert_eq!(outcome.removed, vec![custom.clone()]);
        assert!(!custom.exists());
    }

    #[test]
    fn update_to_directory_keeps_mode_occupying_canonical_name() {
        let fx = Fixture::new();
        let occupied = fx.paths.mode_file(ModeSource::Project, "a").unwrap();
        write(&occupied, "slug: b\nname: B\nroleDefinition: r\ngroups: [read]\n");

        let path = fx
            .store()
            .update("a", &mode("a", "A", ModeSource::Project), UpdateOptions::directory())
            .unwrap();
        assert_ne!(path, occupied);
        assert_eq!(path.file_name().unwrap(), "a-2.yaml");

        let modes = fx.resolve();
        let slugs: Vec<_> = modes.iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "b"]);

        // A second update finds the relocated file instead of adding another
        let again = fx
            .store()
            .update("a", &mode("a", "A2", ModeSource::Project), UpdateOptions::directory())
            .unwrap();
        assert_eq!(again, path);
    }

    #[test]
    fn update_to_file_still_writes_when_shadowed_by_directory() {
        let fx = Fixture::new();
        let store = fx.store();
        let dir_file = store
            .update("s", &mode("s", "Dir", ModeSource::Global), UpdateOptions::directory())
            .unwrap();
        let file = store
            .update("s", &mode("s", "File", ModeSource::Global), UpdateOptions::file())
            .unwrap();
        assert_eq!(file, fx.paths.modes_file(ModeSource::Global).unwrap());
        assert!(dir_file.exists());
        // Directory representation keeps precedence within the scope
        assert_eq!(fx.resolve()[0].name, "Dir");
    }

    #[test]
    fn badly_encoded_files_do_not_block_delete() {
        let fx = Fixture::new();
        let store = fx.store();
        store
            .update("good", &mode("good", "Good", ModeSource::Project), UpdateOptions::directory())
            .unwrap();
        let modes_dir = fx.paths.modes_dir(ModeSource::Project).unwrap();
        fs::write(modes_dir.join("latin1.yaml"), b"slug: caf\xe9\n").unwrap();
        let legacy = fx.paths.legacy_modes_file().unwrap();
        fs::write(&legacy, b"customModes:\n  - slug: caf\xe9\n").unwrap();

        assert_eq!(fx.resolve().len(), 1);

        let outcome = store.delete("good").unwrap();
        assert_eq!(outcome.removed.len(), 1);
        assert!(outcome.rewritten.is_empty());
        assert!(modes_dir.join("latin1.yaml").exists());
        assert!(fx.resolve().is_empty());
    }

    #[test]
    fn update_refuses_badly_encoded_modes_file() {
        let fx = Fixture::new();
        let file = fx.paths.modes_file(ModeSource::Global).unwrap();
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"customModes: []\n# caf\xe9\n").unwrap();

        let result = fx
            .store()
            .update("m", &mode("m", "M", ModeSource::Global), UpdateOptions::file());
        assert!(matches!(result, Err(ModesError::MalformedSource { .. })));
    }

    #[test]
    fn delete_of_unknown_slug_is_noop() {
        let fx = Fixture::new();
        let outcome = fx.store().delete("ghost").unwrap();
        assert!(outcome.is_noop());
    }

    #[test]
    fn delete_skips_missing_project_root() {
        let temp = TempDir::new().unwrap();
        let paths = ModePaths::from_provider(&StaticPaths::new(None, temp.path().to_path_buf()));
        let rules = ScanRules::default();
        let store = ModeStore::new(&paths, &rules, &SchemaValidator);
        store
            .update("g", &mode("g", "G", ModeSource::Global), UpdateOptions::directory())
            .unwrap();
        assert_eq!(store.delete("g").unwrap().removed.len(), 1);
    }
}
