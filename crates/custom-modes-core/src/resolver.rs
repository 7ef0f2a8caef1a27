//! Precedence merge of all mode sources.
//!
//! Sources are consulted highest precedence first:
//! project directory, project file, legacy project file, global directory,
//! global file. The first source defining a slug wins; lower sources never
//! overwrite it. The merged list is sorted by slug so the output does not
//! depend on filesystem iteration order.

use std::collections::HashMap;

use tracing::debug;

use crate::error::Result;
use crate::mode::ModeConfig;
use crate::scanner::ScanRules;
use crate::source::{ConfigSource, LoadedMode, SourceModes};
use crate::validate::ModeValidator;

/// Merge already-aggregated sources given in precedence order
pub fn merge(sources: Vec<SourceModes>) -> Vec<LoadedMode> {
    let mut merged: HashMap<String, LoadedMode> = HashMap::new();

    for source in sources {
        for mode in source.into_modes() {
            if merged.contains_key(&mode.config.slug) {
                debug!(
                    slug = %mode.config.slug,
                    shadowed = %mode.origin,
                    "mode overridden by higher-precedence source"
                );
                continue;
            }
            merged.insert(mode.config.slug.clone(), mode);
        }
    }

    let mut modes: Vec<LoadedMode> = merged.into_values().collect();
    modes.sort_by(|a, b| a.config.slug.cmp(&b.config.slug));
    modes
}

/// Load every source and merge them. Any fatal source error aborts the
/// whole resolution.
pub fn resolve_with_origins(
    sources: &[ConfigSource],
    rules: &ScanRules,
    validator: &dyn ModeValidator,
) -> Result<Vec<LoadedMode>> {
    let loaded = sources
        .iter()
        .map(|source| source.load(rules, validator))
        .collect::<Result<Vec<_>>>()?;

    Ok(merge(loaded))
}

/// Resolve the merged, slug-sorted mode list
pub fn resolve(
    sources: &[ConfigSource],
    rules: &ScanRules,
    validator: &dyn ModeValidator,
) -> Result<Vec<ModeConfig>> {
    Ok(resolve_with_origins(sources, rules, validator)?
        .into_iter()
        .map(|mode| mode.config)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModesError;
    use crate::mode::ModeSource;
    use crate::paths::{ModePaths, StaticPaths};
    use crate::validate::SchemaValidator;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        paths: ModePaths,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let paths = ModePaths::from_provider(&StaticPaths::new(
                Some(temp.path().join("project")),
                temp.path().join("global"),
            ));
            Self { _temp: temp, paths }
        }

        fn dir_mode(&self, scope: ModeSource, file: &str, slug: &str, name: &str) {
            let path = self.paths.modes_dir(scope).unwrap().join(file);
            write(&path, &entry(slug, name, ""));
        }

        fn file_modes(&self, path: &Path, modes: &[(&str, &str)]) {
            let mut content = String::from("customModes:\n");
            for (slug, name) in modes {
                content.push_str(&entry(slug, name, "  "));
            }
            write(path, &content);
        }

        fn resolve(&self) -> Result<Vec<ModeConfig>> {
            resolve(&self.paths.sources(), &ScanRules::default(), &SchemaValidator)
        }
    }

    fn entry(slug: &str, name: &str, indent: &str) -> String {
        let lead = if indent.is_empty() { "" } else { "- " };
        format!(
            "{indent}{lead}slug: {slug}\n{indent}{pad}name: {name}\n{indent}{pad}roleDefinition: role\n{indent}{pad}groups: [read]\n",
            indent = indent,
            lead = lead,
            pad = if indent.is_empty() { "" } else { "  " },
            slug = slug,
            name = name,
        )
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn find<'a>(modes: &'a [ModeConfig], slug: &str) -> &'a ModeConfig {
        modes.iter().find(|m| m.slug == slug).unwrap()
    }

    #[test]
    fn project_directory_wins_over_every_other_source() {
        let fx = Fixture::new();
        fx.dir_mode(ModeSource::Project, "all.yaml", "all", "All ProjectDir");
        fx.file_modes(
            &fx.paths.modes_file(ModeSource::Project).unwrap(),
            &[("all", "All ProjectFile")],
        );
        fx.dir_mode(ModeSource::Global, "all.yaml", "all", "All GlobalDir");
        fx.file_modes(
            &fx.paths.modes_file(ModeSource::Global).unwrap(),
            &[("all", "All GlobalSettings")],
        );

        let modes = fx.resolve().unwrap();
        assert_eq!(modes.len(), 1);
        assert_eq!(modes[0].name, "All ProjectDir");
        assert_eq!(modes[0].source, Some(ModeSource::Project));
    }

    #[test]
    fn each_source_fills_in_its_unique_slugs() {
        let fx = Fixture::new();
        fx.dir_mode(ModeSource::Project, "pd.yaml", "pd", "PD");
        fx.file_modes(&fx.paths.modes_file(ModeSource::Project).unwrap(), &[("pf", "PF")]);
        fx.file_modes(&fx.paths.legacy_modes_file().unwrap(), &[("legacy", "Legacy")]);
        fx.dir_mode(ModeSource::Global, "gd.yaml", "gd", "GD");
        fx.file_modes(&fx.paths.modes_file(ModeSource::Global).unwrap(), &[("gs", "GS")]);

        let modes = fx.resolve().unwrap();
        let slugs: Vec<_> = modes.iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(slugs, vec!["gd", "gs", "legacy", "pd", "pf"]);
        assert_eq!(find(&modes, "pd").source, Some(ModeSource::Project));
        assert_eq!(find(&modes, "pf").source, Some(ModeSource::Project));
        assert_eq!(find(&modes, "legacy").source, Some(ModeSource::Project));
        assert_eq!(find(&modes, "gd").source, Some(ModeSource::Global));
        assert_eq!(find(&modes, "gs").source, Some(ModeSource::Global));
    }

    #[test]
    fn current_project_file_shadows_legacy_file() {
        let fx = Fixture::new();
        fx.file_modes(&fx.paths.modes_file(ModeSource::Project).unwrap(), &[("m", "Current")]);
        fx.file_modes(&fx.paths.legacy_modes_file().unwrap(), &[("m", "Legacy")]);

        let modes = fx.resolve().unwrap();
        assert_eq!(find(&modes, "m").name, "Current");
    }

    #[test]
    fn global_directory_wins_over_global_file() {
        let fx = Fixture::new();
        fx.dir_mode(ModeSource::Global, "m.yaml", "m", "Dir");
        fx.file_modes(&fx.paths.modes_file(ModeSource::Global).unwrap(), &[("m", "File")]);

        let modes = fx.resolve().unwrap();
        assert_eq!(find(&modes, "m").name, "Dir");
        assert_eq!(find(&modes, "m").source, Some(ModeSource::Global));
    }

    #[test]
    fn duplicate_across_sources_resolves_but_within_source_fails() {
        let fx = Fixture::new();
        fx.dir_mode(ModeSource::Project, "a.yaml", "same", "Project");
        fx.dir_mode(ModeSource::Global, "a.yaml", "same", "Global");
        assert_eq!(fx.resolve().unwrap().len(), 1);

        fx.dir_mode(ModeSource::Global, "b.yaml", "same", "Global again");
        let result = fx.resolve();
        assert!(matches!(result, Err(ModesError::DuplicateSlug { .. })));
    }

    #[test]
    fn resolution_is_deterministic_across_creation_order() {
        let first = Fixture::new();
        let second = Fixture::new();
        let names = ["zeta", "alpha", "mid", "beta"];

        for name in names {
            first.dir_mode(ModeSource::Project, &format!("{}.yaml", name), name, name);
        }
        for name in names.iter().rev() {
            second.dir_mode(ModeSource::Project, &format!("{}.yaml", name), name, name);
        }

        let render = |fx: &Fixture| {
            let modes = fx.resolve().unwrap();
            serde_yaml::to_string(&modes).unwrap()
        };
        assert_eq!(render(&first), render(&second));
        assert_eq!(render(&first), render(&first));
    }

    #[test]
    fn no_sources_yield_empty_list() {
        let fx = Fixture::new();
        assert!(fx.resolve().unwrap().is_empty());
    }
}
