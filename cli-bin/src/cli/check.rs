//! `outbox check …` – dry-run the name filter.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::cli::Format;
use liboutbox::config::Config;
use liboutbox::utils::base_name;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub base: String,
    pub matches: bool,
}

/// Evaluate every name against the configured pattern.
pub fn check(cfg: &Config, names: &[String]) -> Result<Vec<CheckResult>> {
    let filter = cfg.name_filter()?;
    Ok(names
        .iter()
        .map(|n| {
            let path = Path::new(n);
            CheckResult {
                name: n.clone(),
                base: base_name(path).unwrap_or_default(),
                matches: filter.matches_path(path),
            }
        })
        .collect())
}

pub fn run(cfg: &Config, names: &[String], fmt: Format) -> Result<()> {
    let results = check(cfg, names)?;
    match fmt {
        Format::Text => {
            for r in &results {
                let verdict = if r.matches { "match" } else { "no match" };
                println!("{}\t{verdict}", r.name);
            }
        }
        Format::Json => println!("{}", serde_json::to_string_pretty(&results)?),
    }
    Ok(())
}
