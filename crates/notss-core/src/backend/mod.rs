//! Execution backends.
//!
//! A backend turns an ordered list of command strings into side effects on
//! some target. The set is closed: NRPE agent queries, one SSH session, or
//! a local shell. Selection happens once, in [`BackendConfig::build`].
//!
//! ```text
//! BackendConfig ──build──▶ Box<dyn Backend>
//!                               │ connect()   preconditions, connection setup
//!                               ▼
//!                          Box<dyn Session>
//!                               │ run(cmd)    once per command, in order
//!                               ▼
//!                          CommandOutcome
//! ```

pub mod nrpe;
pub(crate) mod process;
pub mod shell;
pub mod ssh;

use serde::Serialize;
use std::time::Duration;

use crate::error::BackendError;
use crate::types::CommandOutcome;

pub use nrpe::{NrpeBackend, NrpeConfig};
pub use shell::{ShellBackend, ShellConfig};
pub use ssh::{HostKeyPolicy, SshAuth, SshBackend, SshConfig};

/// An execution mechanism able to open a [`Session`] for one action batch.
pub trait Backend {
    fn name(&self) -> &'static str;

    /// Check preconditions and set up whatever connection the batch needs.
    /// An error here means no command runs.
    fn connect(&self) -> Result<Box<dyn Session + '_>, BackendError>;
}

/// An open batch. Commands are run one at a time, in call order.
pub trait Session {
    /// Run one command.
    ///
    /// Command-level failures come back as an outcome with a failing
    /// verdict. `Err` is reserved for transport failures that make the rest
    /// of the batch impossible.
    fn run(&mut self, command: &str) -> Result<CommandOutcome, BackendError>;
}

/// Upper bound for every external call a backend makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandTimeout {
    /// Wait as long as the command or remote end takes.
    #[default]
    Unbounded,
    After(Duration),
}

impl CommandTimeout {
    pub fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            Some(s) if s > 0 => CommandTimeout::After(Duration::from_secs(s)),
            _ => CommandTimeout::Unbounded,
        }
    }

    pub fn duration(self) -> Option<Duration> {
        match self {
            CommandTimeout::Unbounded => None,
            CommandTimeout::After(d) => Some(d),
        }
    }
}

/// The closed set of backends, with their settings.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Nrpe(NrpeConfig),
    Ssh(SshConfig),
    Shell(ShellConfig),
}

impl BackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::Nrpe(_) => nrpe::NAME,
            BackendConfig::Ssh(_) => ssh::NAME,
            BackendConfig::Shell(_) => shell::NAME,
        }
    }

    pub fn build(self) -> Box<dyn Backend> {
        match self {
            BackendConfig::Nrpe(cfg) => Box::new(NrpeBackend::new(cfg)),
            BackendConfig::Ssh(cfg) => Box::new(SshBackend::new(cfg)),
            BackendConfig::Shell(cfg) => Box::new(ShellBackend::new(cfg)),
        }
    }
}
