//! Is this monitoring host the one that runs the check?
//!
//! In peered or poller setups every peer receives the same event, but only
//! the host that actually executed the check should act on it. op5 Monitor
//! exposes this as the `check_source` column, which reads `Core Worker …`
//! on the host that ran the check.

use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, error, info};

use crate::backend::process::run_captured;
use crate::backend::CommandTimeout;

pub const DEFAULT_MON_PATH: &str = "/usr/bin/mon";

const LOCAL_MARKER: &str = "Core Worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSource {
    Local,
    Remote,
    /// The oracle itself could not be consulted.
    Unknown,
}

pub trait CheckSourceOracle {
    fn check_source(&self, host_name: &str, service: &str) -> CheckSource;
}

/// Asks the op5 `mon` livestatus client, first for the service and then,
/// if the service has no recorded source, for the host.
pub struct MonCheckSource {
    pub mon: PathBuf,
    pub timeout: CommandTimeout,
}

impl Default for MonCheckSource {
    fn default() -> Self {
        Self {
            mon: PathBuf::from(DEFAULT_MON_PATH),
            timeout: CommandTimeout::Unbounded,
        }
    }
}

enum Answer {
    Local,
    Remote,
    Blank,
    QueryFailed,
    SpawnFailed,
}

impl MonCheckSource {
    fn query(&self, args: &[&str]) -> Answer {
        debug!(mon = %self.mon.display(), ?args, "querying check source");
        let mut cmd = Command::new(&self.mon);
        cmd.args(args);

        let captured = match run_captured(&mut cmd, self.timeout) {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "failed to run mon command");
                return Answer::SpawnFailed;
            }
        };

        if captured.exit_code != Some(0) {
            error!(
                exit_code = ?captured.exit_code,
                stdout = %captured.stdout.trim(),
                stderr = %captured.stderr.trim(),
                "mon command failed"
            );
            return Answer::QueryFailed;
        }

        debug!(stdout = %captured.stdout.trim(), "mon answered");
        if captured.stdout.contains(LOCAL_MARKER) {
            Answer::Local
        } else if captured.stdout.trim().is_empty() {
            Answer::Blank
        } else {
            Answer::Remote
        }
    }
}

impl CheckSourceOracle for MonCheckSource {
    fn check_source(&self, host_name: &str, service: &str) -> CheckSource {
        info!(host = host_name, service, "determining check source");

        let service_query = [
            "query", "ls", "services", "-c", "check_source", "host_name", "-e", host_name,
            "description", "-e", service,
        ];
        match self.query(&service_query) {
            Answer::Local => {
                info!("this host was found as the check source");
                return CheckSource::Local;
            }
            Answer::Remote | Answer::QueryFailed => {
                info!("this host was not found to be the check source");
                return CheckSource::Remote;
            }
            Answer::SpawnFailed => return CheckSource::Unknown,
            Answer::Blank => info!(service, "could not find source for service, trying host"),
        }

        let host_query = ["query", "ls", "hosts", "-c", "check_source", "name", "-e", host_name];
        match self.query(&host_query) {
            Answer::Local => {
                info!("this host was found as the check source");
                CheckSource::Local
            }
            Answer::Blank => {
                info!(host = host_name, "could not find source for host");
                CheckSource::Remote
            }
            Answer::Remote | Answer::QueryFailed => {
                info!("this host was not found to be the check source");
                CheckSource::Remote
            }
            Answer::SpawnFailed => CheckSource::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// A fake `mon` that prints `$SERVICES` for service queries and `$HOSTS`
    /// for host queries.
    fn fake_mon(dir: &TempDir, services: &str, hosts: &str) -> MonCheckSource {
        let path = dir.path().join("mon");
        let script = format!(
            "#!/bin/sh\ncase \"$3\" in\n  services) printf '%s' '{services}' ;;\n  hosts) printf '%s' '{hosts}' ;;\nesac\n"
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        MonCheckSource {
            mon: path,
            timeout: CommandTimeout::Unbounded,
        }
    }

    #[test]
    fn service_source_on_this_host_is_local() {
        let dir = TempDir::new().unwrap();
        let oracle = fake_mon(&dir, "Core Worker 1234\n", "");
        assert_eq!(oracle.check_source("web01", "HTTP"), CheckSource::Local);
    }

    #[test]
    fn service_source_elsewhere_is_remote() {
        let dir = TempDir::new().unwrap();
        let oracle = fake_mon(&dir, "Merlin peer monitor02\n", "Core Worker 1\n");
        assert_eq!(oracle.check_source("web01", "HTTP"), CheckSource::Remote);
    }

    #[test]
    fn blank_service_source_falls_back_to_host() {
        let dir = TempDir::new().unwrap();
        let oracle = fake_mon(&dir, "\n", "Core Worker 99\n");
        assert_eq!(oracle.check_source("web01", "HTTP"), CheckSource::Local);

        let dir = TempDir::new().unwrap();
        let oracle = fake_mon(&dir, "", "");
        assert_eq!(oracle.check_source("web01", "HTTP"), CheckSource::Remote);
    }

    #[test]
    fn missing_mon_binary_is_unknown() {
        let oracle = MonCheckSource {
            mon: PathBuf::from("/nonexistent/mon"),
            timeout: CommandTimeout::Unbounded,
        };
        assert_eq!(oracle.check_source("web01", "HTTP"), CheckSource::Unknown);
    }
}
