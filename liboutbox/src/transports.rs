//! Concrete [`Transport`] implementations.
//!
//! * [`DirTransport`] publishes into a destination folder (a mounted share or
//!   a folder some sync client uploads).
//! * [`CommandTransport`] runs an external uploader once per file.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use tracing::debug;

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::transfer::{Session, Transport};
use crate::utils::{canonicalize_lossy, display_name, expand_path};

/// Build the transport described by the config.
pub fn from_config(cfg: &TransportConfig) -> Arc<dyn Transport> {
    match cfg {
        TransportConfig::Directory { target } => Arc::new(DirTransport::new(expand_path(target))),
        TransportConfig::Command { program, args } => Arc::new(CommandTransport::new(
            expand_path(program).to_string_lossy().into_owned(),
            args.clone(),
        )),
    }
}

// ────── directory drop ───────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct DirTransport {
    target: PathBuf,
}

impl DirTransport {
    pub fn new(target: PathBuf) -> Self {
        Self { target }
    }
}

impl Transport for DirTransport {
    fn name(&self) -> &str {
        "directory"
    }

    fn open(&self) -> Result<Box<dyn Session>> {
        if !self.target.is_dir() {
            return Err(Error::Session(format!(
                "target directory {} is not available",
                self.target.display()
            )));
        }
        Ok(Box::new(DirSession {
            target: self.target.clone(),
            sent: HashMap::new(),
        }))
    }
}

struct DirSession {
    target: PathBuf,
    /// source → (published path, expected size)
    sent: HashMap<PathBuf, (PathBuf, u64)>,
}

impl Session for DirSession {
    fn submit(&mut self, path: &Path) -> Result<()> {
        if !self.target.is_dir() {
            return Err(Error::Session(format!(
                "target directory {} disappeared",
                self.target.display()
            )));
        }
        let name = path
            .file_name()
            .ok_or_else(|| Error::file(path, "path has no file name"))?;
        if path.parent().map(canonicalize_lossy) == Some(canonicalize_lossy(&self.target)) {
            return Err(Error::file(path, "target directory is the source directory"));
        }
        let size = fs::metadata(path)
            .map_err(|e| Error::file(path, e.to_string()))?
            .len();

        let dest = self.target.join(name);
        let part = self
            .target
            .join(format!(".{}.part", name.to_string_lossy()));

        if let Err(e) = fs::copy(path, &part).and_then(|_| fs::rename(&part, &dest)) {
            let _ = fs::remove_file(&part);
            return Err(Error::file(path, e.to_string()));
        }
        debug!(file = %display_name(path), dest = %dest.display(), "published");
        self.sent.insert(path.to_path_buf(), (dest, size));
        Ok(())
    }

    fn confirmed(&mut self, path: &Path) -> Result<bool> {
        let (dest, size) = self
            .sent
            .get(path)
            .ok_or_else(|| Error::file(path, "confirmation requested before submit"))?;
        Ok(fs::metadata(dest).map(|m| m.len() == *size).unwrap_or(false))
    }

    fn close(&mut self) -> Result<()> {
        self.sent.clear();
        Ok(())
    }
}

// ────── external command ─────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct CommandTransport {
    program: String,
    args: Vec<String>,
}

impl CommandTransport {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Substitute `{file}` / `{name}`; append the path if `{file}` is absent.
    fn argv(&self, path: &Path) -> Vec<String> {
        let file = path.to_string_lossy();
        let name = display_name(path);
        let mut argv: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{file}", &file).replace("{name}", &name))
            .collect();
        if !self.args.iter().any(|a| a.contains("{file}")) {
            argv.push(file.into_owned());
        }
        argv
    }
}

impl Transport for CommandTransport {
    fn name(&self) -> &str {
        "command"
    }

    fn open(&self) -> Result<Box<dyn Session>> {
        Ok(Box::new(CommandSession {
            transport: self.clone(),
            running: HashMap::new(),
        }))
    }
}

struct CommandSession {
    transport: CommandTransport,
    running: HashMap<PathBuf, Child>,
}

impl Session for CommandSession {
    fn submit(&mut self, path: &Path) -> Result<()> {
        let argv = self.transport.argv(path);
        debug!(program = %self.transport.program, args = ?argv, "spawning uploader");
        let child = Command::new(&self.transport.program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::Session(format!(
                    "uploader `{}` not found",
                    self.transport.program
                )),
                _ => Error::file(path, e.to_string()),
            })?;
        self.running.insert(path.to_path_buf(), child);
        Ok(())
    }

    fn confirmed(&mut self, path: &Path) -> Result<bool> {
        let child = self
            .running
            .get_mut(path)
            .ok_or_else(|| Error::file(path, "confirmation requested before submit"))?;
        match child.try_wait() {
            Ok(None) => Ok(false),
            Ok(Some(status)) => {
                self.running.remove(path);
                if status.success() {
                    Ok(true)
                } else {
                    Err(Error::file(path, format!("uploader exited with {status}")))
                }
            }
            Err(e) => {
                self.running.remove(path);
                Err(Error::file(path, e.to_string()))
            }
        }
    }

    fn abandon(&mut self, path: &Path) {
        if let Some(mut child) = self.running.remove(path) {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn close(&mut self) -> Result<()> {
        for (_, mut child) in self.running.drain() {
            let _ = child.kill();
            let _ = child.wait();
        }
        Ok(())
    }
}
