//! Strata CLI
//!
//! Entry point for the `strata` command-line tool.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use strata::config::{existing_sources, ConfigError, DocumentSource, CONFIGURATION_FILES};
use strata::{is_generic_name, ConfigurationReader, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Layered profile configuration reader", version)]
struct Cli {
    /// Log resolution steps to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve profiles and print the configuration
    Read {
        /// Profile to read (repeatable, later ones win)
        #[arg(long, short = 'p')]
        profile: Vec<String>,

        /// Directory holding the configuration files (default: current)
        #[arg(long, short = 'd')]
        dir: Option<PathBuf>,

        /// Configuration file (repeatable, default: strata.yml, strata.user.yml, strata.override.yml)
        #[arg(long, short = 'f')]
        file: Vec<String>,

        /// Print a single field (dot-separated path)
        #[arg(long)]
        field: Option<String>,

        /// Output in human-readable format instead of JSON
        #[arg(long)]
        human: bool,
    },

    /// List the declared profiles
    Profiles {
        /// Directory holding the configuration files (default: current)
        #[arg(long, short = 'd')]
        dir: Option<PathBuf>,

        /// Configuration file (repeatable)
        #[arg(long, short = 'f')]
        file: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Read {
            profile,
            dir,
            file,
            field,
            human,
        } => {
            run_read(&profile, dir.as_deref(), &file, field.as_deref(), human);
        }
        Commands::Profiles { dir, file } => {
            run_profiles(dir.as_deref(), &file);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "strata=debug" } else { "strata=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Explicit files must exist; the standard files are skipped when missing.
fn load_sources(dir: Option<&Path>, files: &[String]) -> Result<Vec<DocumentSource>, ConfigError> {
    if files.is_empty() {
        return existing_sources(CONFIGURATION_FILES, dir);
    }

    files
        .iter()
        .map(|f| match dir {
            Some(dir) => dir.join(f),
            None => PathBuf::from(f),
        })
        .map(|path| DocumentSource::from_file(&path))
        .collect()
}

fn run_read(profile: &[String], dir: Option<&Path>, files: &[String], field: Option<&str>, human: bool) {
    let sources = match load_sources(dir, files) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    let config = match ConfigurationReader::new(sources).read(profile) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    if let Some(path) = field {
        let value = match config.get_path(path) {
            Some(v) => v,
            None => {
                eprintln!("No such field {}", path);
                process::exit(1);
            }
        };
        if human {
            println!("{}", value);
        } else {
            print_json(value);
        }
        return;
    }

    if human {
        println!("Profile: {}", config.profile.join(", "));
        println!();
        for (name, value) in &config.fields {
            print_field(name, value, 1);
        }
    } else {
        print_json(&config);
    }
}

fn print_field(name: &str, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Mapping(map) if !map.is_empty() => {
            println!("{}{}:", indent, name);
            for (key, child) in map {
                print_field(key, child, depth + 1);
            }
        }
        _ => println!("{}{}: {}", indent, name, value),
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_profiles(dir: Option<&Path>, files: &[String]) {
    let table = match load_sources(dir, files)
        .and_then(|sources| ConfigurationReader::new(sources).profile_table())
    {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    println!("Declared profiles ({} total):\n", table.len());
    for name in table.names() {
        if is_generic_name(name) {
            println!("  {} (generic)", name);
        } else {
            println!("  {}", name);
        }
    }
}
