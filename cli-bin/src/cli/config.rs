//! `outbox config` – show what the other commands would run with.

use anyhow::Result;
use tracing::warn;

use crate::cli::Format;
use liboutbox::config::Config;

pub fn run(cfg: &Config, fmt: Format) -> Result<()> {
    if let Err(e) = cfg.validate() {
        warn!("configuration is not usable yet: {e}");
    }
    match fmt {
        Format::Text => {
            match &cfg.source {
                Some(p) => println!("# loaded from {}", p.display()),
                None => println!("# built-in defaults"),
            }
            print!("{}", toml::to_string_pretty(cfg)?);
        }
        Format::Json => println!("{}", serde_json::to_string_pretty(cfg)?),
    }
    Ok(())
}
