// src/cli.rs

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use liboutbox::config::{Config, TransportConfig};

pub mod check;
pub mod config;
pub mod once;
pub mod watch;

/// Output format for commands that print results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Text,
    Json,
}

/// Outbox – push files dropped into a folder to a remote target in batches
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Config file (otherwise $OUTBOX_CONFIG, the user config dir, ./outbox.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory to watch, overrides `watch.dir`
    #[arg(long, global = true)]
    pub dir: Option<String>,

    /// Name pattern, overrides `watch.pattern`
    #[arg(long, global = true)]
    pub pattern: Option<String>,

    /// Destination folder; selects the directory transport
    #[arg(long, global = true)]
    pub target: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text, global = true)]
    pub format: Format,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transfer existing files, then watch until Ctrl+C
    ///
    /// While running, type `flush` to transfer now or `status` for counters.
    Watch,

    /// Transfer existing matching files once and exit
    Once,

    /// Report whether file names match the pattern
    ///
    /// Example:
    ///     outbox check --pattern _up report_up.pdf notes.txt
    Check {
        /// File names (or paths) to test
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Print the resolved configuration
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Load the config file and apply command-line overrides.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut cfg = Config::load(self.config.as_deref())?;
        if let Some(dir) = &self.dir {
            cfg.watch.dir = dir.clone();
        }
        if let Some(pattern) = &self.pattern {
            cfg.watch.pattern = pattern.clone();
        }
        if let Some(target) = &self.target {
            cfg.transport = Some(TransportConfig::Directory {
                target: target.clone(),
            });
        }
        Ok(cfg)
    }
}
