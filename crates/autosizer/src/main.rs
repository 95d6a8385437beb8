// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Autosizer - a budget-enforcing proxy in front of Ollama.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;

use std::path::PathBuf;

use autosizer_config::{AutosizerConfig, ConfigError};
use clap::{Parser, Subcommand};

/// Autosizer - a budget-enforcing proxy in front of Ollama.
#[derive(Parser, Debug)]
#[command(name = "autosizer", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Start the proxy (default).
    Serve,
    /// Validate the configuration and exit.
    CheckConfig,
    /// Print the effective merged configuration as TOML.
    ShowConfig,
}

fn load(path: Option<&PathBuf>) -> Result<AutosizerConfig, Vec<ConfigError>> {
    match path {
        Some(path) => autosizer_config::load_and_validate_path(path),
        None => autosizer_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            autosizer_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("autosizer: {e}");
                std::process::exit(1);
            }
        }
        Commands::CheckConfig => {
            println!(
                "autosizer: config OK (upstream={}, listen={}:{})",
                config.upstream.base_url, config.server.host, config.server.port
            );
        }
        Commands::ShowConfig => match toml::to_string_pretty(&config) {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                eprintln!("autosizer: failed to render config: {e}");
                std::process::exit(1);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_defaults_to_serve() {
        let cli = Cli::parse_from(["autosizer"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn cli_parses_config_after_subcommand() {
        let cli = Cli::parse_from(["autosizer", "check-config", "--config", "/tmp/a.toml"]);
        assert_eq!(cli.command, Some(Commands::CheckConfig));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/a.toml")));
    }

    #[test]
    fn default_config_renders_as_toml() {
        let rendered = toml::to_string_pretty(&AutosizerConfig::default()).unwrap();
        assert!(rendered.contains("[upstream]"));
        assert!(rendered.contains("base_url = \"http://ollama:11434\""));
        let reparsed = autosizer_config::load_and_validate_str(&rendered).unwrap();
        assert_eq!(reparsed.server.port, 8089);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let errors = load(Some(&PathBuf::from("/nonexistent/autosizer.toml"))).unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
