use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BackendError, EventError};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum State {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl State {
    pub fn all() -> &'static [State] {
        &[State::Ok, State::Warning, State::Critical, State::Unknown]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Ok => "OK",
            State::Warning => "WARNING",
            State::Critical => "CRITICAL",
            State::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for State {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(State::Ok),
            "WARNING" => Ok(State::Warning),
            "CRITICAL" => Ok(State::Critical),
            "UNKNOWN" => Ok(State::Unknown),
            _ => Err(EventError::InvalidState(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// StateType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StateType {
    Soft,
    Hard,
}

impl StateType {
    pub fn as_str(self) -> &'static str {
        match self {
            StateType::Soft => "SOFT",
            StateType::Hard => "HARD",
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StateType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SOFT" => Ok(StateType::Soft),
            "HARD" => Ok(StateType::Hard),
            _ => Err(EventError::InvalidStateType(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// MonitoringEvent
// ---------------------------------------------------------------------------

/// One notification from the monitoring daemon. Built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitoringEvent {
    pub host_address: String,
    pub host_name: String,
    pub service_description: String,
    pub state: State,
    pub state_type: StateType,
    pub attempt: u32,
}

impl MonitoringEvent {
    pub fn new(
        host_address: impl Into<String>,
        host_name: impl Into<String>,
        service_description: impl Into<String>,
        state: State,
        state_type: StateType,
        attempt: u32,
    ) -> crate::Result<Self> {
        if attempt == 0 {
            return Err(EventError::InvalidAttempt(attempt));
        }
        Ok(Self {
            host_address: host_address.into(),
            host_name: host_name.into(),
            service_description: service_description.into(),
            state,
            state_type,
            attempt,
        })
    }
}

// ---------------------------------------------------------------------------
// TriggerPolicy
// ---------------------------------------------------------------------------

/// Operator override of the default "HARD states only" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", content = "attempt", rename_all = "snake_case")]
pub enum TriggerPolicy {
    #[default]
    Default,
    OnSoft,
    OnAttempt(u32),
}

impl TriggerPolicy {
    /// Build a policy from the two command line overrides, rejecting the
    /// combination of both.
    pub fn from_flags(on_soft: bool, on_attempt: Option<u32>) -> crate::Result<Self> {
        match (on_soft, on_attempt) {
            (true, Some(n)) => Err(EventError::ConflictingTriggerPolicy(n)),
            (true, None) => Ok(TriggerPolicy::OnSoft),
            (false, Some(n)) => Ok(TriggerPolicy::OnAttempt(n)),
            (false, None) => Ok(TriggerPolicy::Default),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionLists / SkipPolicy
// ---------------------------------------------------------------------------

pub const SKIP_KEYWORD: &str = "skip";

/// Ordered command strings per state. Any list may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionLists {
    pub ok: Vec<String>,
    pub warning: Vec<String>,
    pub critical: Vec<String>,
    pub unknown: Vec<String>,
}

impl ActionLists {
    pub fn for_state(&self, state: State) -> &[String] {
        match state {
            State::Ok => &self.ok,
            State::Warning => &self.warning,
            State::Critical => &self.critical,
            State::Unknown => &self.unknown,
        }
    }
}

/// How an action list says "do nothing for this state".
///
/// Deployments differ here: some pass the `skip` keyword to explicitly
/// disable a state, others only ever omit the list. Both are supported and
/// the choice is made per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipPolicy {
    /// An empty list, or one whose first entry is `skip` (any case), is no action.
    #[default]
    Sentinel,
    /// Only an empty list is no action; `skip` is executed like any command.
    EmptyOnly,
}

impl SkipPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipPolicy::Sentinel => "sentinel",
            SkipPolicy::EmptyOnly => "empty-only",
        }
    }

    pub fn is_no_action(self, actions: &[String]) -> bool {
        match (self, actions.first()) {
            (_, None) => true,
            (SkipPolicy::Sentinel, Some(first)) => first.eq_ignore_ascii_case(SKIP_KEYWORD),
            (SkipPolicy::EmptyOnly, Some(_)) => false,
        }
    }
}

impl fmt::Display for SkipPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SkipPolicy {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sentinel" => Ok(SkipPolicy::Sentinel),
            "empty-only" => Ok(SkipPolicy::EmptyOnly),
            _ => Err(EventError::InvalidSkipPolicy(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandOutcome / RunReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Failure,
    /// The backend does not evaluate exit status for this command.
    Unchecked,
    /// Output and status were discarded on request.
    Ignored,
    /// The command could not be started at all.
    InvocationError,
}

impl Verdict {
    pub fn is_failure(self) -> bool {
        matches!(self, Verdict::Failure | Verdict::InvocationError)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal, timed out or never ran.
    pub exit_code: Option<i32>,
    pub verdict: Verdict,
}

impl CommandOutcome {
    pub fn invocation_error(command: &str, message: impl fmt::Display) -> Self {
        Self {
            command: command.to_string(),
            stdout: String::new(),
            stderr: message.to_string(),
            exit_code: None,
            verdict: Verdict::InvocationError,
        }
    }
}

/// Result of driving one backend over one action list.
#[derive(Debug)]
pub struct RunReport {
    pub backend: &'static str,
    pub outcomes: Vec<CommandOutcome>,
    /// Set when the batch stopped early, or never started.
    pub aborted: Option<BackendError>,
}

impl RunReport {
    pub fn new(backend: &'static str) -> Self {
        Self {
            backend,
            outcomes: Vec::new(),
            aborted: None,
        }
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.verdict.is_failure()).count()
    }

    pub fn succeeded(&self) -> bool {
        self.aborted.is_none() && self.failures() == 0
    }
}
