//! Command-line interface for dynaplug plugin libraries.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dynaplug_core::config::env_vars;
use dynaplug_core::{LoaderConfig, PluginLoader};

/// Inspect and smoke-test dynaplug plugin libraries.
#[derive(Parser, Debug)]
#[command(name = "dynaplug")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Loader configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Load libraries and print every known interface and plugin.
    Inspect {
        /// Plugin libraries to load, after the configured preloads.
        libraries: Vec<PathBuf>,
    },
    /// Create an instance of a plugin and report which interfaces resolve.
    Instantiate {
        /// Library providing the plugin.
        #[arg(required = true)]
        library: PathBuf,
        /// Plugin name, in any spelling.
        #[arg(required = true)]
        plugin: String,
    },
    /// List the plugins implementing an interface.
    Implementing {
        /// Interface name, in any spelling.
        #[arg(required = true)]
        interface: String,
        /// Plugin libraries to load, after the configured preloads.
        libraries: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut loader = PluginLoader::with_config(load_config(args.config.as_ref())?);
    loader.load_configured();

    match args.command {
        Command::Inspect { libraries } => {
            let failed = load_all(&mut loader, &libraries);
            print!("{loader}");
            if failed > 0 {
                bail!("{failed} of {} libraries failed to load", libraries.len());
            }
        }
        Command::Instantiate { library, plugin } => {
            loader
                .try_load_library(&library)
                .with_context(|| format!("cannot use library {}", library.display()))?;
            instantiate(&loader, &plugin)?;
        }
        Command::Implementing {
            interface,
            libraries,
        } => {
            let failed = load_all(&mut loader, &libraries);
            let plugins: BTreeSet<String> =
                loader.plugins_implementing(&interface).into_iter().collect();
            for plugin in &plugins {
                println!("{plugin}");
            }
            if failed > 0 {
                bail!("{failed} of {} libraries failed to load", libraries.len());
            }
        }
    }

    Ok(())
}

/// File settings first, environment on top.
fn load_config(path: Option<&PathBuf>) -> Result<LoaderConfig> {
    let config = match path {
        Some(path) => LoaderConfig::from_file(path)
            .with_context(|| format!("cannot read config {}", path.display()))?,
        None => LoaderConfig::default(),
    };
    config.with_env_overrides().with_context(|| {
        format!(
            "invalid {} / {} / {} setting",
            env_vars::DUPLICATE_POLICY,
            env_vars::PRELOAD,
            env_vars::WARN_OUTDATED_ABI
        )
    })
}

/// Loads every library, reporting failures. Returns how many failed.
fn load_all(loader: &mut PluginLoader, libraries: &[PathBuf]) -> usize {
    let mut failed = 0;
    for library in libraries {
        if let Err(err) = loader.try_load_library(library) {
            eprintln!("error: {err}");
            failed += 1;
        }
    }
    failed
}

fn instantiate(loader: &PluginLoader, plugin: &str) -> Result<()> {
    let handle = loader.instantiate(plugin);
    let Some(info) = handle.plugin_info() else {
        bail!("plugin {plugin} is not provided by the loaded libraries");
    };

    println!("Instantiated {info}");
    for interface in info.interfaces() {
        let status = if handle.has_interface(interface) {
            "resolved"
        } else {
            "unavailable"
        };
        println!("\t{interface}: {status}");
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var("DYNAPLUG_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_level = if verbose { "dynaplug=debug" } else { "dynaplug=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}
