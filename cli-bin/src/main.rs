//! Outbox CLI entry-point
//!
//! All heavy lifting lives in the `liboutbox` crate; this file handles
//! argument parsing, logging and dispatch.

use std::{env, io};

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;

use liboutbox::logging;
use outbox_cli::cli::{self, Cli, Commands};

fn main() -> Result<()> {
    /* ── CLI parsing & logging ────────────────────────────────── */
    let args = Cli::parse();
    if args.verbose {
        env::set_var("RUST_LOG", "debug");
    }
    logging::init();

    /* ── shell-completion shortcut ────────────────────────────── */
    if let Commands::Completions { shell } = &args.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "outbox", &mut io::stdout());
        return Ok(());
    }

    let cfg = args.resolve_config()?;

    /* ── command dispatch ────────────────────────────────────── */
    match &args.command {
        Commands::Completions { .. } => {} // handled above
        Commands::Watch => cli::watch::run(cfg, args.format)?,
        Commands::Once => cli::once::run(cfg, args.format)?,
        Commands::Check { names } => cli::check::run(&cfg, names, args.format)?,
        Commands::Config => cli::config::run(&cfg, args.format)?,
    }

    Ok(())
}
