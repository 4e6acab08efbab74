use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

use crate::error::{Error, Result};
use crate::transfer::{Session, Transport};
use crate::utils::display_name;

lazy_static! {
    /// Global mutex to serialize environment-variable modifications in tests.
    pub static ref ENV_MUTEX: Mutex<()> = Mutex::new(());
}

/// Per-file behaviour of [`ScriptedTransport`], keyed by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Confirm on the first poll (the default).
    Confirm,
    /// Confirm once `n` polls have come back negative.
    ConfirmAfter(usize),
    /// Never confirm; the executor has to time out.
    Never,
    /// `submit` fails with a per-file error.
    FailSubmit,
    /// `submit` reports the session as lost.
    LoseSession,
}

#[derive(Default)]
struct Log {
    opens: usize,
    closes: usize,
    submitted: Vec<PathBuf>,
    abandoned: Vec<PathBuf>,
}

/// In-memory transport driven by a per-file script.
#[derive(Default, Clone)]
pub struct ScriptedTransport {
    scripts: HashMap<String, Script>,
    fail_open: bool,
    log: Arc<Mutex<Log>>,
}

impl ScriptedTransport {
    pub fn with(mut self, name: &str, script: Script) -> Self {
        self.scripts.insert(name.to_string(), script);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn opens(&self) -> usize {
        self.log.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }

    pub fn submitted(&self) -> Vec<PathBuf> {
        self.log.lock().unwrap().submitted.clone()
    }

    pub fn abandoned(&self) -> Vec<PathBuf> {
        self.log.lock().unwrap().abandoned.clone()
    }
}

impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open(&self) -> Result<Box<dyn Session>> {
        if self.fail_open {
            return Err(Error::Session("scripted open failure".into()));
        }
        self.log.lock().unwrap().opens += 1;
        Ok(Box::new(ScriptedSession {
            scripts: self.scripts.clone(),
            polls: HashMap::new(),
            log: self.log.clone(),
        }))
    }
}

struct ScriptedSession {
    scripts: HashMap<String, Script>,
    polls: HashMap<PathBuf, usize>,
    log: Arc<Mutex<Log>>,
}

impl ScriptedSession {
    fn script(&self, path: &Path) -> Script {
        self.scripts
            .get(&display_name(path))
            .copied()
            .unwrap_or(Script::Confirm)
    }
}

impl Session for ScriptedSession {
    fn submit(&mut self, path: &Path) -> Result<()> {
        self.log.lock().unwrap().submitted.push(path.to_path_buf());
        match self.script(path) {
            Script::FailSubmit => Err(Error::file(path, "scripted failure")),
            Script::LoseSession => Err(Error::Session("scripted session loss".into())),
            _ => Ok(()),
        }
    }

    fn confirmed(&mut self, path: &Path) -> Result<bool> {
        let script = self.script(path);
        let polls = self.polls.entry(path.to_path_buf()).or_insert(0);
        *polls += 1;
        Ok(match script {
            Script::Confirm => true,
            Script::ConfirmAfter(n) => *polls > n,
            _ => false,
        })
    }

    fn abandon(&mut self, path: &Path) {
        self.log.lock().unwrap().abandoned.push(path.to_path_buf());
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}
