use serde::Serialize;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, error, info};

use super::process::{outcome, run_captured};
use super::{Backend, CommandTimeout, Session};
use crate::error::BackendError;
use crate::types::{CommandOutcome, Verdict};

pub(crate) const NAME: &str = "shell";

pub const DEFAULT_SHELL: &str = "/bin/sh";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellConfig {
    pub shell: PathBuf,
    /// Exit code that marks a command as successful. `None` disables checking.
    pub expected_code: Option<i32>,
    /// Keep command output out of the log.
    pub mute: bool,
    pub timeout: CommandTimeout,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            expected_code: None,
            mute: false,
            timeout: CommandTimeout::Unbounded,
        }
    }
}

/// Runs each action as `<shell> -c <action>` on the local machine.
pub struct ShellBackend {
    config: ShellConfig,
}

impl ShellBackend {
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }
}

impl Backend for ShellBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn connect(&self) -> Result<Box<dyn Session + '_>, BackendError> {
        let cfg = &self.config;
        info!(shell = %cfg.shell.display(), "executing commands with local shell");
        if cfg.mute {
            debug!("shell command output muting is enabled");
        }
        match cfg.expected_code {
            Some(code) => debug!(code, "verifying command success by return code"),
            None => debug!("command execution result checking is disabled"),
        }
        // The shell path is not checked here; a bad path shows up as an
        // invocation error on each command.
        Ok(Box::new(ShellSession { config: cfg }))
    }
}

struct ShellSession<'a> {
    config: &'a ShellConfig,
}

impl Session for ShellSession<'_> {
    fn run(&mut self, command: &str) -> Result<CommandOutcome, BackendError> {
        let cfg = self.config;
        info!(command, "executing shell command");

        let mut cmd = Command::new(&cfg.shell);
        cmd.arg("-c").arg(command);

        let captured = match run_captured(&mut cmd, cfg.timeout) {
            Ok(c) => c,
            Err(e) => {
                error!(command, shell = %cfg.shell.display(), error = %e, "failed to invoke shell");
                return Ok(CommandOutcome::invocation_error(command, e));
            }
        };

        if !cfg.mute {
            info!(
                command,
                stdout = %captured.stdout.trim(),
                stderr = %captured.stderr.trim(),
                "output of shell command"
            );
        }

        if captured.timed_out {
            error!(command, "shell command timed out and was killed");
            return Ok(outcome(command, captured, Verdict::Failure));
        }

        let Some(expected) = cfg.expected_code else {
            return Ok(outcome(command, captured, Verdict::Unchecked));
        };

        let verdict = if captured.exit_code == Some(expected) {
            info!(command, code = expected, "command executed successfully (return code matched)");
            Verdict::Success
        } else {
            error!(
                command,
                expected,
                actual = ?captured.exit_code,
                "command did not execute successfully (return code not matched)"
            );
            Verdict::Failure
        };

        Ok(outcome(command, captured, verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run_all(config: ShellConfig, commands: &[&str]) -> Vec<CommandOutcome> {
        let backend = ShellBackend::new(config);
        let mut session = backend.connect().unwrap();
        commands.iter().map(|c| session.run(c).unwrap()).collect()
    }

    #[test]
    fn expected_code_marks_success_and_failure() {
        let cfg = ShellConfig {
            expected_code: Some(3),
            ..Default::default()
        };
        let outcomes = run_all(cfg, &["exit 3", "exit 0", "true"]);
        assert_eq!(outcomes[0].verdict, Verdict::Success);
        assert_eq!(outcomes[1].verdict, Verdict::Failure);
        assert_eq!(outcomes[2].verdict, Verdict::Failure);
    }

    #[test]
    fn without_expected_code_everything_is_unchecked() {
        let outcomes = run_all(ShellConfig::default(), &["exit 0", "exit 1", "echo hi"]);
        assert!(outcomes.iter().all(|o| o.verdict == Verdict::Unchecked));
        assert_eq!(outcomes[1].exit_code, Some(1));
        assert_eq!(outcomes[2].stdout.trim(), "hi");
    }

    #[test]
    fn mute_still_captures_output() {
        let cfg = ShellConfig {
            mute: true,
            ..Default::default()
        };
        let outcomes = run_all(cfg, &["echo quiet"]);
        assert_eq!(outcomes[0].stdout.trim(), "quiet");
    }

    #[test]
    fn missing_shell_is_an_invocation_error_per_command() {
        let cfg = ShellConfig {
            shell: PathBuf::from("/nonexistent/shell"),
            expected_code: Some(0),
            ..Default::default()
        };
        let outcomes = run_all(cfg, &["true", "true"]);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.verdict == Verdict::InvocationError));
    }

    #[test]
    fn timed_out_command_fails_without_expected_code() {
        let cfg = ShellConfig {
            timeout: CommandTimeout::After(Duration::from_millis(200)),
            ..Default::default()
        };
        let started = std::time::Instant::now();
        let outcomes = run_all(cfg, &["sleep 5; true", "echo next"]);
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(outcomes[0].verdict, Verdict::Failure);
        assert!(outcomes[0].stderr.contains("timed out"));
        assert_eq!(outcomes[1].verdict, Verdict::Unchecked);
    }

    #[test]
    fn timed_out_command_fails_the_return_code_check() {
        let cfg = ShellConfig {
            expected_code: Some(0),
            timeout: CommandTimeout::After(Duration::from_millis(200)),
            ..Default::default()
        };
        let outcomes = run_all(cfg, &["exec sleep 5"]);
        assert_eq!(outcomes[0].verdict, Verdict::Failure);
        assert_eq!(outcomes[0].exit_code, None);
        assert!(outcomes[0].stderr.contains("timed out"));
    }
}
