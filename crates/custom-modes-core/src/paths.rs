//! Filesystem conventions for mode sources
//!
//! | Source             | Location                                     |
//! |--------------------|----------------------------------------------|
//! | project directory  | `<project>/.kilocode/modes/<slug>.yaml`      |
//! | project file       | `<project>/.kilocodemodes`                   |
//! | legacy project file| `<project>/.roomodes`                        |
//! | global directory   | `<globalStorage>/.kilocode/modes/<slug>.yaml`|
//! | global file        | `<globalStorage>/settings/customModes.yaml`  |
//!
//! Rule text for a mode lives in `<root>/.kilocode/rules-<slug>/`.

use std::path::{Component, Path, PathBuf};

use crate::error::{ModesError, Result};
use crate::mode::ModeSource;
use crate::source::{ConfigSource, Representation};

pub const CONFIG_DIR: &str = ".kilocode";
pub const MODES_DIR: &str = "modes";
pub const PROJECT_MODES_FILE: &str = ".kilocodemodes";
pub const LEGACY_PROJECT_MODES_FILE: &str = ".roomodes";
pub const SETTINGS_DIR: &str = "settings";
pub const GLOBAL_MODES_FILE: &str = "customModes.yaml";
pub const MODE_FILE_EXTENSION: &str = "yaml";
const RULES_DIR_PREFIX: &str = "rules-";

/// Host-supplied roots
pub trait PathProvider {
    /// Active project root, if a project is open
    fn project_root(&self) -> Option<PathBuf>;

    /// User-wide storage root
    fn global_storage(&self) -> PathBuf;
}

/// Fixed roots, for hosts that know them up front (and tests)
#[derive(Debug, Clone)]
pub struct StaticPaths {
    pub project_root: Option<PathBuf>,
    pub global_storage: PathBuf,
}

impl StaticPaths {
    pub fn new(project_root: Option<PathBuf>, global_storage: PathBuf) -> Self {
        Self {
            project_root,
            global_storage,
        }
    }
}

impl PathProvider for StaticPaths {
    fn project_root(&self) -> Option<PathBuf> {
        self.project_root.clone()
    }

    fn global_storage(&self) -> PathBuf {
        self.global_storage.clone()
    }
}

/// Concrete source locations for one snapshot of the host roots
#[derive(Debug, Clone)]
pub struct ModePaths {
    project_root: Option<PathBuf>,
    global_storage: PathBuf,
}

impl ModePaths {
    pub fn from_provider(provider: &dyn PathProvider) -> Self {
        Self {
            project_root: provider.project_root(),
            global_storage: provider.global_storage(),
        }
    }

    /// Root directory of a scope
    pub fn root(&self, scope: ModeSource) -> Result<&Path> {
        match scope {
            ModeSource::Project => self.project_root.as_deref().ok_or(ModesError::NoProjectRoot),
            ModeSource::Global => Ok(&self.global_storage),
        }
    }

    pub fn settings_dir(&self) -> PathBuf {
        self.global_storage.join(SETTINGS_DIR)
    }

    /// Directory holding per-mode files
    pub fn modes_dir(&self, scope: ModeSource) -> Result<PathBuf> {
        Ok(self.root(scope)?.join(CONFIG_DIR).join(MODES_DIR))
    }

    /// Canonical per-mode file path for a slug
    pub fn mode_file(&self, scope: ModeSource, slug: &str) -> Result<PathBuf> {
        Ok(self
            .modes_dir(scope)?
            .join(format!("{}.{}", slug, MODE_FILE_EXTENSION)))
    }

    /// Monolithic file a scope writes to
    pub fn modes_file(&self, scope: ModeSource) -> Result<PathBuf> {
        match scope {
            ModeSource::Project => Ok(self.root(scope)?.join(PROJECT_MODES_FILE)),
            ModeSource::Global => Ok(self.settings_dir().join(GLOBAL_MODES_FILE)),
        }
    }

    pub fn legacy_modes_file(&self) -> Option<PathBuf> {
        self.project_root
            .as_ref()
            .map(|root| root.join(LEGACY_PROJECT_MODES_FILE))
    }

    /// Every monolithic file of a scope, current one first
    pub fn all_modes_files(&self, scope: ModeSource) -> Result<Vec<PathBuf>> {
        let mut files = vec![self.modes_file(scope)?];
        if scope == ModeSource::Project {
            files.extend(self.legacy_modes_file());
        }
        Ok(files)
    }

    pub fn rules_dir(&self, scope: ModeSource, slug: &str) -> Result<PathBuf> {
        Ok(self
            .root(scope)?
            .join(CONFIG_DIR)
            .join(format!("{}{}", RULES_DIR_PREFIX, slug)))
    }

    /// All sources in precedence order, highest first.
    ///
    /// Project sources are omitted when no project is open.
    pub fn sources(&self) -> Vec<ConfigSource> {
        let mut sources = Vec::new();

        if let Some(root) = &self.project_root {
            sources.push(ConfigSource::new(
                ModeSource::Project,
                Representation::Directory,
                root.join(CONFIG_DIR).join(MODES_DIR),
            ));
            sources.push(ConfigSource::new(
                ModeSource::Project,
                Representation::File,
                root.join(PROJECT_MODES_FILE),
            ));
            sources.push(ConfigSource::new(
                ModeSource::Project,
                Representation::File,
                root.join(LEGACY_PROJECT_MODES_FILE),
            ));
        }

        sources.push(ConfigSource::new(
            ModeSource::Global,
            Representation::Directory,
            self.global_storage.join(CONFIG_DIR).join(MODES_DIR),
        ));
        sources.push(ConfigSource::new(
            ModeSource::Global,
            Representation::File,
            self.settings_dir().join(GLOBAL_MODES_FILE),
        ));

        sources
    }

    /// Whether a changed path can affect resolution or rule text
    pub fn is_config_path(&self, path: &Path) -> bool {
        let roots = self
            .project_root
            .iter()
            .chain(std::iter::once(&self.global_storage));

        for root in roots {
            let config_dir = root.join(CONFIG_DIR);
            if let Ok(rest) = path.strip_prefix(&config_dir) {
                let first = rest.components().next();
                return match first {
                    Some(Component::Normal(name)) => {
                        let name = name.to_string_lossy();
                        name == MODES_DIR || name.starts_with(RULES_DIR_PREFIX)
                    }
                    _ => false,
                };
            }
        }

        self.sources()
            .iter()
            .filter(|s| s.representation == Representation::File)
            .any(|s| s.location == path)
    }
}

/// Reject rule paths that are absolute or climb out of the rules directory
pub fn safe_relative_path(relative: &str) -> Result<PathBuf> {
    let path = Path::new(relative);
    let safe = !relative.trim().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    if safe {
        Ok(path.to_path_buf())
    } else {
        Err(ModesError::UnsafeRulePath {
            path: relative.to_string(),
        })
    }
}
