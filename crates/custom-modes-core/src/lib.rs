pub mod bundle;
pub mod config;
pub mod error;
pub mod loader;
pub mod manager;
pub mod mode;
pub mod paths;
pub mod resolver;
pub mod scanner;
pub mod source;
pub mod store;
pub mod validate;

pub use bundle::{export_bundle, import_bundle, ImportResult, ModeBundle};
pub use config::{EngineConfig, ScanConfig};
pub use error::{ModesError, Result};
pub use loader::load_mode_file;
pub use manager::ModeManager;
pub use mode::{GroupEntry, GroupOptions, ModeConfig, ModeSource, RuleFile, ToolGroup};
pub use paths::{ModePaths, PathProvider, StaticPaths};
pub use resolver::{merge, resolve, resolve_with_origins};
pub use scanner::{scan, ScanRules, ScannedFile};
pub use source::{
    load_directory, load_modes_file, ConfigSource, LoadedMode, ModeOrigin, Representation,
    SourceModes,
};
pub use store::{DeleteOutcome, ModeStore, UpdateOptions};
pub use validate::{parse_mode, FieldError, ModeValidator, SchemaValidator};
