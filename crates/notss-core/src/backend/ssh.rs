//! Remote actions over a single SSH session.
//!
//! One connection serves the whole action list. Exit statuses are recorded
//! but not judged; only transport failures count as errors here, and they
//! end the batch because there is no connection left to run on.

use serde::{Serialize, Serializer};
use ssh2::{CheckResult, KnownHostFileKind, KnownHostKeyFormat};
use std::fmt;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use super::{Backend, CommandTimeout, Session};
use crate::error::BackendError;
use crate::types::{CommandOutcome, Verdict};

pub(crate) const NAME: &str = "ssh";

pub const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SshAuth {
    PrivateKey(PathBuf),
    Password(#[serde(serialize_with = "redacted")] String),
}

impl fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SshAuth::PrivateKey(path) => f.debug_tuple("PrivateKey").field(path).finish(),
            SshAuth::Password(_) => f.write_str("Password(********)"),
        }
    }
}

fn redacted<T, S: Serializer>(_: &T, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str("********")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Verify against an OpenSSH known hosts file; unknown keys are rejected.
    KnownHosts(PathBuf),
    /// Accept and remember any key not seen before.
    TrustUnconditionally,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: SshAuth,
    pub host_keys: HostKeyPolicy,
    pub timeout: CommandTimeout,
}

impl SshConfig {
    /// Assemble a config from loose options, enforcing that exactly one
    /// authentication method and exactly one host key policy are given.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        private_key: Option<PathBuf>,
        password: Option<String>,
        known_hosts: Option<PathBuf>,
        trust_host_key: bool,
        timeout: CommandTimeout,
    ) -> Result<Self, BackendError> {
        let auth = match (private_key, password) {
            (Some(key), None) => SshAuth::PrivateKey(key),
            (None, Some(pw)) => SshAuth::Password(pw),
            (Some(_), Some(_)) => {
                return Err(BackendError::Precondition(
                    "a private key and a password were both given; use one".into(),
                ))
            }
            (None, None) => {
                return Err(BackendError::Precondition(
                    "either a private key or a password is required".into(),
                ))
            }
        };
        let host_keys = match (known_hosts, trust_host_key) {
            (Some(path), false) => HostKeyPolicy::KnownHosts(path),
            (None, true) => HostKeyPolicy::TrustUnconditionally,
            (Some(_), true) => {
                return Err(BackendError::Precondition(
                    "a known hosts file and unconditional host key trust are exclusive".into(),
                ))
            }
            (None, false) => {
                return Err(BackendError::Precondition(
                    "either a known hosts file or unconditional host key trust is required"
                        .into(),
                ))
            }
        };
        Ok(Self {
            host: host.into(),
            port,
            user: user.into(),
            auth,
            host_keys,
            timeout,
        })
    }

    /// Host pattern as written in a known hosts file.
    fn known_hosts_entry(&self) -> String {
        if self.port == DEFAULT_SSH_PORT {
            self.host.clone()
        } else {
            format!("[{}]:{}", self.host, self.port)
        }
    }
}

pub struct SshBackend {
    config: SshConfig,
}

impl SshBackend {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    fn fail(&self, message: impl fmt::Display) -> BackendError {
        let err = BackendError::connection(&self.config.host, message);
        error!(error = %err, "failed to connect to host");
        err
    }

    fn open_tcp(&self) -> Result<TcpStream, BackendError> {
        let cfg = &self.config;
        let addrs = (cfg.host.as_str(), cfg.port)
            .to_socket_addrs()
            .map_err(|e| self.fail(format!("could not resolve address: {e}")))?;

        let mut last_err = None;
        for addr in addrs {
            let attempt = match cfg.timeout.duration() {
                Some(limit) => TcpStream::connect_timeout(&addr, limit),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(self.fail(match last_err {
            Some(e) => e.to_string(),
            None => "no addresses resolved".to_string(),
        }))
    }

    fn load_known_hosts(&self, session: &ssh2::Session) -> Result<ssh2::KnownHosts, BackendError> {
        let mut known = session
            .known_hosts()
            .map_err(|e| self.fail(format!("could not initialise host key store: {e}")))?;
        if let HostKeyPolicy::KnownHosts(path) = &self.config.host_keys {
            debug!(path = %path.display(), "loading known hosts file");
            known
                .read_file(path, KnownHostFileKind::OpenSSH)
                .map_err(|e| self.fail(format!("failed to load known hosts file: {e}")))?;
        }
        Ok(known)
    }

    fn verify_host_key(
        &self,
        session: &ssh2::Session,
        known: &mut ssh2::KnownHosts,
    ) -> Result<(), BackendError> {
        let cfg = &self.config;
        let (key, key_type) = session
            .host_key()
            .ok_or_else(|| self.fail("server presented no host key"))?;

        match known.check_port(&cfg.host, cfg.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::NotFound if cfg.host_keys == HostKeyPolicy::TrustUnconditionally => {
                let format: KnownHostKeyFormat = key_type.into();
                known
                    .add(&cfg.known_hosts_entry(), key, "added by notss-eh", format)
                    .map_err(|e| self.fail(format!("could not record host key: {e}")))?;
                debug!(host = %cfg.host, "recorded previously unseen host key");
                Ok(())
            }
            CheckResult::NotFound => Err(self.fail("host key not found in known hosts file")),
            CheckResult::Mismatch => Err(self.fail("host key does not match known hosts entry")),
            CheckResult::Failure => Err(self.fail("host key verification failed")),
        }
    }
}

impl Backend for SshBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn connect(&self) -> Result<Box<dyn Session + '_>, BackendError> {
        let cfg = &self.config;
        info!(host = %cfg.host, port = cfg.port, user = %cfg.user, "running SSH commands");
        match &cfg.auth {
            SshAuth::PrivateKey(_) => info!("using private key for user authentication"),
            SshAuth::Password(_) => info!("using password for user authentication"),
        }
        if cfg.host_keys == HostKeyPolicy::TrustUnconditionally {
            warn!("SSH host key verification has been disabled");
        }

        let mut session =
            ssh2::Session::new().map_err(|e| self.fail(format!("could not create session: {e}")))?;

        // Load before touching the network so a bad file never costs a connection.
        let mut known = self.load_known_hosts(&session)?;

        let tcp = self.open_tcp()?;
        session.set_tcp_stream(tcp);
        if let Some(limit) = cfg.timeout.duration() {
            session.set_timeout(u32::try_from(limit.as_millis()).unwrap_or(u32::MAX));
        }
        session
            .handshake()
            .map_err(|e| self.fail(format!("handshake failed: {e}")))?;

        self.verify_host_key(&session, &mut known)?;

        let auth = match &cfg.auth {
            SshAuth::PrivateKey(key) => session.userauth_pubkey_file(&cfg.user, None, key, None),
            SshAuth::Password(password) => session.userauth_password(&cfg.user, password),
        };
        auth.map_err(|e| self.fail(format!("authentication failed: {e}")))?;
        if !session.authenticated() {
            return Err(self.fail("authentication failed"));
        }

        Ok(Box::new(SshSession {
            host: cfg.host.clone(),
            session,
        }))
    }
}

struct SshSession {
    host: String,
    session: ssh2::Session,
}

impl SshSession {
    fn exec(&self, command: &str) -> Result<CommandOutcome, BackendError> {
        let transport = |e: &dyn fmt::Display| BackendError::connection(&self.host, e);

        let mut channel = self.session.channel_session().map_err(|e| transport(&e))?;
        channel.exec(command).map_err(|e| transport(&e))?;
        channel.send_eof().map_err(|e| transport(&e))?;

        let mut stdout = Vec::new();
        channel.read_to_end(&mut stdout).map_err(|e| transport(&e))?;
        let mut stderr = Vec::new();
        channel
            .stderr()
            .read_to_end(&mut stderr)
            .map_err(|e| transport(&e))?;

        channel.wait_close().map_err(|e| transport(&e))?;
        let exit_code = channel.exit_status().ok();

        Ok(CommandOutcome {
            command: command.to_string(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
            verdict: Verdict::Unchecked,
        })
    }
}

impl Session for SshSession {
    fn run(&mut self, command: &str) -> Result<CommandOutcome, BackendError> {
        info!(command, "executing command over SSH");
        let outcome = self.exec(command).inspect_err(|err| {
            error!(command, error = %err, "SSH transport failed");
        })?;
        info!(
            command,
            exit_code = ?outcome.exit_code,
            stdout = %outcome.stdout.trim(),
            stderr = %outcome.stderr.trim(),
            "output of SSH command"
        );
        Ok(outcome)
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        let _ = self
            .session
            .disconnect(None, "event handler finished", None);
    }
}
