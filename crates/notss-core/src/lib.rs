//! `notss-core`: decision logic and execution backends for the notss event
//! handler.
//!
//! A monitoring daemon calls the handler once per service event. The
//! [`trigger`] resolver decides from state, state type and check attempt
//! whether remediation actions apply; the [`handler`] then drives one of the
//! [`backend`]s over the action list for that state, strictly in order.

pub mod backend;
pub mod check_source;
pub mod error;
pub mod handler;
pub mod trigger;
pub mod types;

pub use backend::{Backend, BackendConfig, CommandTimeout, Session};
pub use check_source::{CheckSource, CheckSourceOracle, MonCheckSource};
pub use error::{BackendError, EventError, Result};
pub use handler::{EventHandler, HandlerConfig, HandlerOutcome, Pacer, ThreadSleep};
pub use trigger::{resolve, select_actions, SuppressReason, TriggerDecision};
pub use types::{
    ActionLists, CommandOutcome, MonitoringEvent, RunReport, SkipPolicy, State, StateType,
    TriggerPolicy, Verdict,
};
