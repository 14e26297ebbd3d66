use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand, ValueEnum};
use notss_core::backend::nrpe::DEFAULT_NRPE_PLUGIN;
use notss_core::backend::shell::DEFAULT_SHELL;
use notss_core::backend::ssh::DEFAULT_SSH_PORT;
use notss_core::backend::{NrpeConfig, ShellConfig, SshConfig};
use notss_core::check_source::DEFAULT_MON_PATH;
use notss_core::{
    ActionLists, BackendConfig, BackendError, CommandTimeout, HandlerConfig, MonitoringEvent,
    SkipPolicy, State, StateType, TriggerPolicy,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "notss-eh",
    about = "A not so simple event handler for Nagios-compatible monitoring systems",
    long_about = "Executes remediation actions for service events, through NRPE, SSH or the local shell.\n\
                  By default actions only run on HARD state changes.",
    version,
    disable_version_flag = true
)]
pub struct Cli {
    /// Host address
    #[arg(short = 'H', long)]
    pub host: String,

    /// Host name
    #[arg(short = 'n', long)]
    pub name: String,

    /// Service description
    #[arg(short = 'd', long)]
    pub description: String,

    /// Current state (OK, WARNING, CRITICAL, UNKNOWN)
    #[arg(short = 's', long)]
    pub state: State,

    /// State type (SOFT, HARD)
    #[arg(short = 't', long = "state-type")]
    pub state_type: StateType,

    /// Current check attempt
    #[arg(short = 'a', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub attempt: u32,

    /// Action(s) executing on OK
    #[arg(short = 'o', long = "ok", value_name = "ACTION")]
    pub ok: Vec<String>,

    /// Action(s) executing on WARNING (use "skip" to ignore the state)
    #[arg(short = 'w', long = "warning", value_name = "ACTION")]
    pub warning: Vec<String>,

    /// Action(s) executing on CRITICAL (use "skip" to ignore the state)
    #[arg(short = 'c', long = "critical", value_name = "ACTION")]
    pub critical: Vec<String>,

    /// Action(s) executing on UNKNOWN (use "skip" to ignore the state)
    #[arg(short = 'u', long = "unknown", value_name = "ACTION")]
    pub unknown: Vec<String>,

    /// Execute action(s) on soft state changes
    #[arg(short = 'S', long, conflicts_with = "attempt_exec")]
    pub soft: bool,

    /// Execute action(s) on the given check attempt only
    #[arg(
        short = 'A',
        long = "attempt-exec",
        value_name = "ATTEMPT",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub attempt_exec: Option<u32>,

    /// Seconds to sleep before each action
    #[arg(short = 'W', long, value_name = "SECONDS", default_value_t = 0)]
    pub wait: u64,

    /// Only act if this host is the check source for the service (peered setups)
    #[arg(short = 'C', long)]
    pub checksrc: bool,

    /// Location of the op5 "mon" command used for --checksrc
    #[arg(long = "mon-path", default_value = DEFAULT_MON_PATH)]
    pub mon_path: PathBuf,

    /// How an action list marks a state as "no action"
    #[arg(long = "skip-policy", value_enum, default_value_t = SkipArg::Sentinel)]
    pub skip_policy: SkipArg,

    /// Upper bound in seconds for each external command (default: wait forever)
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Logging destination
    #[arg(short = 'l', long, value_enum, default_value_t = LogDestination::Stream)]
    pub logging: LogDestination,

    /// Enable verbose logging
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Display program version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,

    #[arg(long, hide = true)]
    pub funk: bool,

    #[command(subcommand)]
    pub module: Option<Module>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogDestination {
    Stream,
    Syslog,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SkipArg {
    /// Empty list or a leading "skip" keyword means no action
    Sentinel,
    /// Only an empty list means no action
    EmptyOnly,
}

impl From<SkipArg> for SkipPolicy {
    fn from(arg: SkipArg) -> Self {
        match arg {
            SkipArg::Sentinel => SkipPolicy::Sentinel,
            SkipArg::EmptyOnly => SkipPolicy::EmptyOnly,
        }
    }
}

/// Action execution module.
#[derive(Subcommand, Debug)]
pub enum Module {
    /// Executes command(s) with NRPE queries
    Nrpe(NrpeArgs),
    /// Executes command(s) over SSH
    Ssh(SshArgs),
    /// Executes local shell command(s)
    Shell(ShellArgs),
}

#[derive(Args, Debug)]
pub struct NrpeArgs {
    /// Remote host for execution (default: the event's host address)
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Location of the "check_nrpe" executable
    #[arg(short = 'p', long = "nrpe-plugin", default_value = DEFAULT_NRPE_PLUGIN)]
    pub plugin: PathBuf,

    /// Disable encryption for the connection
    #[arg(short = 'i', long)]
    pub insecure: bool,

    /// Ignore NRPE status output (for plugins that return none)
    #[arg(short = 'I', long)]
    pub ignore: bool,
}

#[derive(Args, Debug)]
#[command(
    group(ArgGroup::new("auth").required(true).args(["private_key", "password"])),
    group(ArgGroup::new("host_keys").required(true).args(["known_hosts", "insecure"]))
)]
pub struct SshArgs {
    /// Username on the remote host
    #[arg(short = 'u', long)]
    pub user: String,

    /// Remote host for execution (default: the event's host address)
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// SSH port on the remote host
    #[arg(short = 'p', long, default_value_t = DEFAULT_SSH_PORT)]
    pub port: u16,

    /// OpenSSH compatible private key file for authentication
    #[arg(short = 'k', long = "private-key")]
    pub private_key: Option<PathBuf>,

    /// Password for authentication (not recommended)
    #[arg(short = 'P', long)]
    pub password: Option<String>,

    /// OpenSSH compatible known hosts file for host key verification
    #[arg(short = 'K', long = "known-hosts")]
    pub known_hosts: Option<PathBuf>,

    /// Automatically trust the host key (not recommended)
    #[arg(short = 'i', long)]
    pub insecure: bool,
}

#[derive(Args, Debug)]
pub struct ShellArgs {
    /// System shell
    #[arg(short = 's', long, default_value = DEFAULT_SHELL)]
    pub shell: PathBuf,

    /// Return code that marks successful execution of a command
    #[arg(short = 'r', long = "returncode")]
    pub return_code: Option<i32>,

    /// Mute the output of shell commands
    #[arg(short = 'm', long)]
    pub mute: bool,
}

impl Cli {
    pub fn timeout(&self) -> CommandTimeout {
        CommandTimeout::from_secs(self.timeout)
    }

    pub fn handler_config(&self) -> anyhow::Result<HandlerConfig> {
        let event = MonitoringEvent::new(
            &self.host,
            &self.name,
            &self.description,
            self.state,
            self.state_type,
            self.attempt,
        )?;
        let policy = TriggerPolicy::from_flags(self.soft, self.attempt_exec)?;
        Ok(HandlerConfig {
            event,
            policy,
            actions: ActionLists {
                ok: self.ok.clone(),
                warning: self.warning.clone(),
                critical: self.critical.clone(),
                unknown: self.unknown.clone(),
            },
            skip: self.skip_policy.into(),
            delay_secs: self.wait,
            verify_check_source: self.checksrc,
        })
    }
}

impl Module {
    /// Resolve the backend settings; `host` is the event's host address,
    /// used unless the module names its own execution host.
    pub fn into_config(
        self,
        host: &str,
        timeout: CommandTimeout,
    ) -> Result<BackendConfig, BackendError> {
        Ok(match self {
            Module::Nrpe(args) => BackendConfig::Nrpe(NrpeConfig {
                host: args.host.unwrap_or_else(|| host.to_string()),
                plugin: args.plugin,
                insecure: args.insecure,
                ignore_output: args.ignore,
                timeout,
            }),
            Module::Ssh(args) => BackendConfig::Ssh(SshConfig::from_parts(
                args.host.unwrap_or_else(|| host.to_string()),
                args.port,
                args.user,
                args.private_key,
                args.password,
                args.known_hosts,
                args.insecure,
                timeout,
            )?),
            Module::Shell(args) => BackendConfig::Shell(ShellConfig {
                shell: args.shell,
                expected_code: args.return_code,
                mute: args.mute,
                timeout,
            }),
        })
    }
}
