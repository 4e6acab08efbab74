use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::{Error, Result};
use crate::filter::NameFilter;
use crate::transfer::TransferPolicy;
use crate::utils::{canonicalize_lossy, expand_path};
use crate::watcher::WatcherConfig;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "OUTBOX_CONFIG";

/// Runtime configuration, deserialised from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub watch: WatchSection,
    pub timing: TimingSection,
    pub transfer: TransferSection,
    pub transport: Option<TransportConfig>,

    /// File the values were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchSection {
    /// Directory to watch (non-recursive). `~` and `$VARS` are expanded.
    pub dir: String,
    /// Regex matched against the end of each file stem.
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingSection {
    pub stability_wait_ms: u64,
    pub quiet_period_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            stability_wait_ms: 500,
            quiet_period_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferSection {
    pub max_wait_ms: u64,
    pub poll_interval_ms: u64,
    pub post_transfer_wait_ms: u64,
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            max_wait_ms: 300_000,
            poll_interval_ms: 500,
            post_transfer_wait_ms: 0,
        }
    }
}

/// Which remote session implementation to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Copy into a (synced or mounted) destination folder.
    Directory { target: String },
    /// Run a program once per file; `{file}` and `{name}` are substituted.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Config {
    /// Resolve configuration.
    ///
    /// Priority:
    /// 1. `explicit` path (e.g. `--config`), must exist
    /// 2. `OUTBOX_CONFIG` env-var, must exist
    /// 3. `<platform config dir>/outbox/config.toml` when present
    /// 4. `./outbox.toml` when present
    /// 5. built-in defaults (callers then supply dir/pattern/transport)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::from_file(p);
        }

        if let Some(val) = std::env::var_os(CONFIG_ENV) {
            return Self::from_file(Path::new(&val));
        }

        if let Some(dirs) = ProjectDirs::from("io", "Outbox", "outbox") {
            let p = dirs.config_dir().join("config.toml");
            if p.is_file() {
                return Self::from_file(&p);
            }
        }

        let local = PathBuf::from("outbox.toml");
        if local.is_file() {
            return Self::from_file(&local);
        }

        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let mut cfg = Self::from_toml_str(&raw)?;
        cfg.source = Some(path.to_path_buf());
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Reject configurations the watcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.validate_watch()?;
        self.validate_transport()
    }

    /// Everything except the `[transport]` table.
    pub fn validate_watch(&self) -> Result<()> {
        if self.watch.dir.trim().is_empty() {
            return Err(Error::Config("watch.dir is not set".into()));
        }
        let dir = self.watch_dir();
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "watched directory does not exist: {}",
                dir.display()
            )));
        }

        self.name_filter()?;

        if self.transfer.poll_interval_ms == 0 {
            return Err(Error::Config("transfer.poll_interval_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn validate_transport(&self) -> Result<()> {
        match &self.transport {
            None => Err(Error::Config("no [transport] configured".into())),
            Some(TransportConfig::Directory { target }) if target.trim().is_empty() => {
                Err(Error::Config("transport.target is empty".into()))
            }
            // publishing onto itself would confirm and then delete the only copy
            Some(TransportConfig::Directory { target })
                if canonicalize_lossy(expand_path(target)) == canonicalize_lossy(self.watch_dir()) =>
            {
                Err(Error::Config(format!(
                    "transport.target {target} is the watched directory"
                )))
            }
            Some(TransportConfig::Command { program, .. }) if program.trim().is_empty() => {
                Err(Error::Config("transport.program is empty".into()))
            }
            Some(_) => Ok(()),
        }
    }

    pub fn watch_dir(&self) -> PathBuf {
        expand_path(&self.watch.dir)
    }

    pub fn name_filter(&self) -> Result<NameFilter> {
        NameFilter::new(&self.watch.pattern)
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.timing.quiet_period_ms)
    }

    pub fn transfer_policy(&self) -> TransferPolicy {
        TransferPolicy {
            max_wait: Duration::from_millis(self.transfer.max_wait_ms),
            poll_interval: Duration::from_millis(self.transfer.poll_interval_ms),
            post_transfer_wait: Duration::from_millis(self.transfer.post_transfer_wait_ms),
        }
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            stability_wait_ms: self.timing.stability_wait_ms,
            ..Default::default()
        }
    }
}
