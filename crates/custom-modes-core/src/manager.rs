use std::path::Path;

use tracing::{debug, warn};

use crate::bundle::{export_bundle, import_bundle, ImportResult, ModeBundle};
use crate::config::EngineConfig;
use crate::error::{ModesError, Result};
use crate::mode::{ModeConfig, ModeSource};
use crate::paths::{ModePaths, PathProvider};
use crate::resolver::resolve;
use crate::scanner::ScanRules;
use crate::store::{DeleteOutcome, ModeStore, UpdateOptions};
use crate::validate::{ModeValidator, SchemaValidator};

type ModesListener = Box<dyn Fn(&[ModeConfig])>;

/// Entry point for reading and mutating custom modes.
///
/// Every call works on a fresh view of the filesystem: host roots are asked
/// for again, sources are re-read, nothing is cached between calls.
pub struct ModeManager {
    provider: Box<dyn PathProvider>,
    validator: Box<dyn ModeValidator>,
    config: Option<EngineConfig>,
    listener: Option<ModesListener>,
}

impl ModeManager {
    pub fn new(provider: impl PathProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            validator: Box::new(SchemaValidator),
            config: None,
            listener: None,
        }
    }

    /// Replace the schema validator
    pub fn with_validator(mut self, validator: impl ModeValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Use a fixed engine config instead of `<globalStorage>/settings/custom-modes.toml`
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Called with the re-resolved list after every successful mutation
    pub fn on_modes_changed(mut self, listener: impl Fn(&[ModeConfig]) + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn paths(&self) -> ModePaths {
        ModePaths::from_provider(self.provider.as_ref())
    }

    fn scan_rules(&self, paths: &ModePaths) -> Result<ScanRules> {
        match &self.config {
            Some(config) => Ok(config.to_scan_rules()),
            None => Ok(EngineConfig::load(&paths.settings_dir())?.to_scan_rules()),
        }
    }

    /// Resolve all sources into the merged, slug-sorted list
    pub fn get_custom_modes(&self) -> Result<Vec<ModeConfig>> {
        let paths = self.paths();
        let rules = self.scan_rules(&paths)?;
        let modes = resolve(&paths.sources(), &rules, self.validator.as_ref())?;
        debug!(count = modes.len(), "resolved custom modes");
        Ok(modes)
    }

    pub fn get_mode(&self, slug: &str) -> Result<ModeConfig> {
        self.get_custom_modes()?
            .into_iter()
            .find(|m| m.slug == slug)
            .ok_or_else(|| ModesError::ModeNotFound {
                slug: slug.to_string(),
            })
    }

    /// Create or replace a mode. `config.source` picks the scope.
    pub fn update_custom_mode(
        &self,
        slug: &str,
        config: &ModeConfig,
        options: UpdateOptions,
    ) -> Result<()> {
        let paths = self.paths();
        let rules = self.scan_rules(&paths)?;
        ModeStore::new(&paths, &rules, self.validator.as_ref()).update(slug, config, options)?;
        self.refresh();
        Ok(())
    }

    /// Remove a mode from every source that defines it
    pub fn delete_custom_mode(&self, slug: &str) -> Result<DeleteOutcome> {
        let paths = self.paths();
        let rules = self.scan_rules(&paths)?;
        let outcome = ModeStore::new(&paths, &rules, self.validator.as_ref()).delete(slug)?;
        if !outcome.is_noop() {
            self.refresh();
        }
        Ok(outcome)
    }

    /// Import a bundle into `scope`, reporting failure instead of returning it
    pub fn import_mode_with_rules(
        &self,
        bundle_text: &str,
        scope: ModeSource,
        options: UpdateOptions,
    ) -> ImportResult {
        let mut imported = Vec::new();
        let outcome = self.try_import(bundle_text, scope, options, &mut imported);

        if !imported.is_empty() {
            self.refresh();
        }

        match outcome {
            Ok(()) => ImportResult {
                success: true,
                error: None,
                imported,
            },
            Err(e) => {
                warn!(error = %e, imported = imported.len(), "mode import failed");
                ImportResult {
                    success: false,
                    error: Some(e),
                    imported,
                }
            }
        }
    }

    fn try_import(
        &self,
        bundle_text: &str,
        scope: ModeSource,
        options: UpdateOptions,
        imported: &mut Vec<String>,
    ) -> Result<()> {
        let paths = self.paths();
        let rules = self.scan_rules(&paths)?;
        let bundle = ModeBundle::parse(bundle_text, self.validator.as_ref())?;
        let store = ModeStore::new(&paths, &rules, self.validator.as_ref());

        import_bundle(&store, &paths, &bundle, scope, options, |slug| {
            imported.push(slug.to_string())
        })
    }

    /// Serialize a resolved mode and its rule files as bundle YAML
    pub fn export_mode_with_rules(&self, slug: &str) -> Result<String> {
        let paths = self.paths();
        let rules = self.scan_rules(&paths)?;
        let mode = self.get_mode(slug)?;
        export_bundle(&paths, &rules, &mode)?.to_yaml()
    }

    /// Whether a watcher event for `path` should trigger a new resolution
    pub fn is_config_path(&self, path: &Path) -> bool {
        self.paths().is_config_path(path)
    }

    /// Re-resolve after a mutation. The mutation already succeeded, so a
    /// failing resolution is only logged.
    fn refresh(&self) {
        match self.get_custom_modes() {
            Ok(modes) => {
                debug!(count = modes.len(), "modes refreshed after change");
                if let Some(listener) = &self.listener {
                    listener(&modes);
                }
            }
            Err(e) => warn!(error = %e, "failed to re-resolve modes after change"),
        }
    }
}
