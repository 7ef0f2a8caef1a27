use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use custom_modes_core::{
    parse_mode, EngineConfig, ModeConfig, ModeManager, ModeSource, ModesError, Result,
    SchemaValidator, StaticPaths, UpdateOptions,
};

mod args;
use args::{Cli, Commands, ConfigAction, Scope, Shell};

const HOME_ENV: &str = "CUSTOM_MODES_HOME";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let paths = StaticPaths::new(
        resolve_project_root(cli.project, cli.no_project),
        resolve_global_storage(cli.global_storage),
    );

    debug!(
        project = ?paths.project_root,
        global_storage = %paths.global_storage.display(),
        "resolved host roots"
    );

    let manager = || ModeManager::new(paths.clone());

    let result = match cli.command {
        Commands::List { json } => handle_list(&manager(), json),
        Commands::Show { slug } => handle_show(&manager(), &slug),
        Commands::Set {
            file,
            slug,
            scope,
            to_directory,
            to_file,
        } => handle_set(&manager(), &file, slug, scope, to_directory, to_file),
        Commands::Delete { slug } => handle_delete(&manager(), &slug),
        Commands::Export { slug, output } => handle_export(&manager(), &slug, output.as_deref()),
        Commands::Import {
            file,
            scope,
            to_directory,
        } => handle_import(&manager(), &file, scope, to_directory),
        Commands::Config { action } => handle_config(action, &paths.global_storage),
        Commands::Completions { shell } => {
            handle_completions(shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn resolve_project_root(cli_project: Option<PathBuf>, no_project: bool) -> Option<PathBuf> {
    if no_project {
        return None;
    }
    cli_project.or_else(|| std::env::current_dir().ok())
}

fn resolve_global_storage(cli_global: Option<PathBuf>) -> PathBuf {
    if let Some(global) = cli_global {
        return global;
    }

    if let Ok(home) = std::env::var(HOME_ENV) {
        return PathBuf::from(home);
    }

    dirs::data_dir()
        .map(|d| d.join("custom-modes"))
        .unwrap_or_else(|| PathBuf::from(".custom-modes"))
}

fn to_source(scope: Scope) -> ModeSource {
    match scope {
        Scope::Project => ModeSource::Project,
        Scope::Global => ModeSource::Global,
    }
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "custom-modes", &mut io::stdout());
}

fn handle_config(action: ConfigAction, global_storage: &Path) -> Result<()> {
    let settings_dir = global_storage.join(custom_modes_core::paths::SETTINGS_DIR);

    match action {
        ConfigAction::Get { key } => {
            let config = EngineConfig::load(&settings_dir)?;
            match config.get(&key) {
                Some(value) => println!("{}", value),
                None => return Err(ModesError::ConfigKeyNotFound { key }),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = EngineConfig::load(&settings_dir)?;
            config.set(&key, &value)?;
            config.save(&settings_dir)?;
            println!("{} {} = {}", "Set:".green(), key, value);
        }
        ConfigAction::List => {
            let config = EngineConfig::load(&settings_dir)?;
            println!();
            for (key, value) in config.list() {
                println!("{} = {}", key.cyan(), value);
            }
            println!();
        }
        ConfigAction::Path => {
            println!("{}", EngineConfig::path(&settings_dir).display());
        }
        ConfigAction::Init => {
            let path = EngineConfig::init(&settings_dir)?;
            println!("{} {}", "Initialized:".green(), path.display());
        }
    }

    Ok(())
}

fn handle_list(manager: &ModeManager, json: bool) -> Result<()> {
    let modes = manager.get_custom_modes()?;
    if json {
        let rendered = serde_json::to_string_pretty(&modes)
            .map_err(|e| ModesError::Io(io::Error::other(e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    if modes.is_empty() {
        println!("No custom modes found.");
        println!();
        println!("Create one with: custom-modes set <file.yaml>");
        return Ok(());
    }

    println!();
    for mode in &modes {
        print_mode_line(mode);
    }
    println!();
    println!("{} mode(s)", modes.len());
    Ok(())
}

fn handle_show(manager: &ModeManager, slug: &str) -> Result<()> {
    let mode = manager.get_mode(slug)?;
    print_mode(&mode);
    Ok(())
}

fn handle_set(
    manager: &ModeManager,
    file: &Path,
    slug: Option<String>,
    scope: Option<Scope>,
    to_directory: bool,
    to_file: bool,
) -> Result<()> {
    let text = fs::read_to_string(file)?;
    let mut mode = parse_mode(&text, &SchemaValidator)?;
    if let Some(scope) = scope {
        mode.source = Some(to_source(scope));
    }
    let slug = slug.unwrap_or_else(|| mode.slug.clone());

    let options = UpdateOptions {
        to_directory: match (to_directory, to_file) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
    };

    manager.update_custom_mode(&slug, &mode, options)?;
    println!(
        "{} {} ({})",
        "Saved:".green(),
        slug.cyan().bold(),
        mode.source.unwrap_or(ModeSource::Global)
    );
    Ok(())
}

fn handle_delete(manager: &ModeManager, slug: &str) -> Result<()> {
    let outcome = manager.delete_custom_mode(slug)?;
    if outcome.is_noop() {
        println!(
            "{} '{}' is not defined in any source.",
            "Nothing to delete:".yellow(),
            slug
        );
        return Ok(());
    }

    println!();
    for path in &outcome.removed {
        println!("{} {}", "Removed:".red(), path.display());
    }
    for path in &outcome.rewritten {
        println!("{} {}", "Updated:".yellow(), path.display());
    }
    Ok(())
}

fn handle_export(manager: &ModeManager, slug: &str, output: Option<&Path>) -> Result<()> {
    let bundle = manager.export_mode_with_rules(slug)?;
    match output {
        Some(path) => {
            fs::write(path, bundle)?;
            println!("{} {}", "Exported:".green(), path.display());
        }
        None => print!("{}", bundle),
    }
    Ok(())
}

fn handle_import(manager: &ModeManager, file: &Path, scope: Scope, to_directory: bool) -> Result<()> {
    let text = fs::read_to_string(file)?;
    let options = UpdateOptions {
        to_directory: Some(to_directory),
    };
    let result = manager.import_mode_with_rules(&text, to_source(scope), options);

    for slug in &result.imported {
        println!("{} {}", "Imported:".green(), slug.cyan());
    }
    match result.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn print_mode_line(mode: &ModeConfig) {
    let groups: Vec<String> = mode.groups.iter().map(|g| g.group().to_string()).collect();
    let source = mode.source.map(|s| s.to_string()).unwrap_or_default();
    println!(
        "  {} {} {} [{}]",
        mode.slug.cyan().bold(),
        mode.name,
        format!("({})", source).dimmed(),
        groups.join(", ")
    );
}

fn print_mode(mode: &ModeConfig) {
    println!();
    println!("Mode: {}", mode.slug.cyan().bold());
    println!("Name: {}", mode.name);
    if let Some(source) = mode.source {
        println!("Source: {}", source);
    }
    if let Some(when) = &mode.when_to_use {
        println!("When to use: {}", when);
    }
    if let Some(description) = &mode.description {
        println!("Description: {}", description);
    }
    println!();
    println!("Groups:");
    for entry in &mode.groups {
        match entry.options().and_then(|o| o.file_regex.as_deref()) {
            Some(regex) => println!("  {} (files: {})", entry.group(), regex),
            None => println!("  {}", entry.group()),
        }
    }
    println!();
    println!("--- Role ---");
    println!("{}", mode.role_definition);
    if let Some(instructions) = &mode.custom_instructions {
        println!();
        println!("--- Custom instructions ---");
        println!("{}", instructions);
    }
    if !mode.rules.is_empty() {
        println!();
        println!("--- Rules ---");
        for rule in &mode.rules {
            println!("  - {}", rule);
        }
    }
}
