//! Remote actions through NRPE: every command becomes a `check_nrpe` query.

use serde::Serialize;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, error, info};

use super::process::{outcome, run_captured};
use super::{Backend, CommandTimeout, Session};
use crate::error::BackendError;
use crate::types::{CommandOutcome, Verdict};

pub(crate) const NAME: &str = "nrpe";

pub const DEFAULT_NRPE_PLUGIN: &str = "/opt/plugins/check_nrpe";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NrpeConfig {
    /// Host running the NRPE agent.
    pub host: String,
    pub plugin: PathBuf,
    /// Leave out `-n`. Note the polarity: the flag is passed unless insecure.
    pub insecure: bool,
    /// Discard status and output; for remote commands that report nothing useful.
    pub ignore_output: bool,
    pub timeout: CommandTimeout,
}

impl NrpeConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            plugin: PathBuf::from(DEFAULT_NRPE_PLUGIN),
            insecure: false,
            ignore_output: false,
            timeout: CommandTimeout::Unbounded,
        }
    }

    /// Arguments passed to the plugin for one command.
    ///
    /// The command is split on whitespace so that `name -a arg` reaches the
    /// plugin as a command name followed by its arguments.
    pub fn plugin_args(&self, command: &str) -> Vec<String> {
        let mut args = vec!["-H".to_string(), self.host.clone()];
        if !self.insecure {
            args.push("-n".to_string());
        }
        args.push("-c".to_string());
        // Plain whitespace split: shell quotes are not honoured.
        args.extend(command.split_whitespace().map(str::to_string));
        args
    }
}

pub struct NrpeBackend {
    config: NrpeConfig,
}

impl NrpeBackend {
    pub fn new(config: NrpeConfig) -> Self {
        Self { config }
    }
}

impl Backend for NrpeBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn connect(&self) -> Result<Box<dyn Session + '_>, BackendError> {
        let cfg = &self.config;
        info!(host = %cfg.host, "running NRPE commands");
        if cfg.insecure {
            info!("NRPE session encryption has been disabled");
        }
        if cfg.ignore_output {
            info!("NRPE status output checking has been disabled");
        }

        if !cfg.plugin.is_file() {
            error!(plugin = %cfg.plugin.display(), "could not find the NRPE plugin");
            return Err(BackendError::Precondition(format!(
                "could not find the NRPE plugin at {}",
                cfg.plugin.display()
            )));
        }

        Ok(Box::new(NrpeSession { config: cfg }))
    }
}

struct NrpeSession<'a> {
    config: &'a NrpeConfig,
}

impl Session for NrpeSession<'_> {
    fn run(&mut self, command: &str) -> Result<CommandOutcome, BackendError> {
        info!(command, "running NRPE command");

        let mut cmd = Command::new(&self.config.plugin);
        cmd.args(self.config.plugin_args(command));

        let captured = match run_captured(&mut cmd, self.config.timeout) {
            Ok(c) => c,
            Err(e) => {
                error!(command, error = %e, "failed to start the NRPE plugin");
                return Ok(CommandOutcome::invocation_error(command, e));
            }
        };

        if captured.timed_out {
            error!(command, "NRPE command timed out and was killed");
            return Ok(outcome(command, captured, Verdict::Failure));
        }

        if self.config.ignore_output {
            debug!(
                command,
                exit_code = ?captured.exit_code,
                stdout = %captured.stdout.trim(),
                stderr = %captured.stderr.trim(),
                "ignoring NRPE command output"
            );
            return Ok(outcome(command, captured, Verdict::Ignored));
        }

        let verdict = if captured.exit_code == Some(0) {
            info!(command, output = %captured.stdout.trim(), "command execution successful");
            Verdict::Success
        } else {
            error!(
                command,
                exit_code = ?captured.exit_code,
                stdout = %captured.stdout.trim(),
                stderr = %captured.stderr.trim(),
                "error occurred while executing NRPE command"
            );
            Verdict::Failure
        };

        Ok(outcome(command, captured, verdict))
    }
}
