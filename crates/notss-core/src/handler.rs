//! One pass per monitoring event: decide, then drive the backend.
//!
//! ```text
//! check source? ──no──▶ NotCheckSource
//!      │yes
//! resolve ──suppressed──▶ Suppressed
//!      │triggered
//! select list ──empty/skip──▶ NoActions
//!      │
//! connect ──err──▶ Executed(aborted, nothing ran)
//!      │
//! for each command: pause(delay); run ──transport err──▶ abort rest
//! ```
//!
//! Every outcome maps to exit code 0. Command and connection failures are
//! reported through the log only; the monitoring daemon never sees them in
//! the exit status.

use serde::Serialize;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::check_source::{CheckSource, CheckSourceOracle};
use crate::trigger::{self, SuppressReason, TriggerDecision, TriggerReason};
use crate::types::{ActionLists, MonitoringEvent, RunReport, SkipPolicy, State, TriggerPolicy};

pub const EXIT_OK: i32 = 0;

/// Everything the handler needs to know about this invocation, fixed at startup.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerConfig {
    pub event: MonitoringEvent,
    pub policy: TriggerPolicy,
    pub actions: ActionLists,
    pub skip: SkipPolicy,
    /// Whole seconds to wait before each command; 0 disables pacing.
    pub delay_secs: u64,
    pub verify_check_source: bool,
}

/// Blocking wait between actions.
pub trait Pacer {
    fn pause(&self, secs: u64);
}

pub struct ThreadSleep;

impl Pacer for ThreadSleep {
    fn pause(&self, secs: u64) {
        thread::sleep(Duration::from_secs(secs));
    }
}

#[derive(Debug)]
pub enum HandlerOutcome {
    NotCheckSource(CheckSource),
    Suppressed(SuppressReason),
    NoActions(State),
    Executed(RunReport),
}

impl HandlerOutcome {
    /// Process exit code for this outcome.
    ///
    /// Always [`EXIT_OK`], even when commands or the connection failed. The
    /// handler only reports its own wiring problems to the monitoring daemon.
    pub fn exit_code(&self) -> i32 {
        EXIT_OK
    }

    pub fn commands_run(&self) -> usize {
        match self {
            HandlerOutcome::Executed(report) => report.outcomes.len(),
            _ => 0,
        }
    }
}

pub struct EventHandler {
    config: HandlerConfig,
    backend: Box<dyn Backend>,
    pacer: Box<dyn Pacer>,
    oracle: Option<Box<dyn CheckSourceOracle>>,
}

impl EventHandler {
    pub fn new(config: HandlerConfig, backend: Box<dyn Backend>) -> Self {
        Self {
            config,
            backend,
            pacer: Box::new(ThreadSleep),
            oracle: None,
        }
    }

    pub fn with_pacer(mut self, pacer: impl Pacer + 'static) -> Self {
        self.pacer = Box::new(pacer);
        self
    }

    pub fn with_check_source(mut self, oracle: impl CheckSourceOracle + 'static) -> Self {
        self.oracle = Some(Box::new(oracle));
        self
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn handle(&self) -> HandlerOutcome {
        let cfg = &self.config;
        let event = &cfg.event;

        if let Ok(json) = serde_json::to_string(cfg) {
            debug!(config = %json, "handler configuration");
        }

        if cfg.verify_check_source {
            let source = match &self.oracle {
                Some(oracle) => oracle.check_source(&event.host_name, &event.service_description),
                None => {
                    warn!("check source verification requested but no oracle configured");
                    CheckSource::Unknown
                }
            };
            if source != CheckSource::Local {
                info!(?source, "not the check source, nothing to do");
                return HandlerOutcome::NotCheckSource(source);
            }
        }

        info!("checking if any actions should be added to execution list");
        let decision = trigger::resolve(event.state, event.state_type, event.attempt, &cfg.policy);
        log_decision(event, &cfg.policy);

        let state = match decision {
            TriggerDecision::Suppressed(reason) => return HandlerOutcome::Suppressed(reason),
            TriggerDecision::Triggered(state) => state,
        };

        let Some(actions) = trigger::select_actions(decision, &cfg.actions, cfg.skip) else {
            info!(state = %state, "no actions for state have been provided");
            return HandlerOutcome::NoActions(state);
        };
        info!(count = actions.len(), "added action(s) to execution list");
        debug!(?actions, "actions for execution");

        HandlerOutcome::Executed(self.execute(actions))
    }

    fn execute(&self, actions: &[String]) -> RunReport {
        let mut report = RunReport::new(self.backend.name());

        let mut session = match self.backend.connect() {
            Ok(s) => s,
            Err(e) => {
                error!(backend = report.backend, error = %e, "backend could not start");
                report.aborted = Some(e);
                return report;
            }
        };

        for (i, command) in actions.iter().enumerate() {
            if self.config.delay_secs > 0 {
                debug!(seconds = self.config.delay_secs, "waiting before command execution");
                self.pacer.pause(self.config.delay_secs);
            }
            match session.run(command) {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    error!(
                        backend = report.backend,
                        command = %command,
                        skipped = actions.len() - i - 1,
                        error = %e,
                        "aborting remaining commands"
                    );
                    report.aborted = Some(e);
                    break;
                }
            }
        }

        if report.succeeded() {
            info!(
                backend = report.backend,
                commands = report.outcomes.len(),
                "action execution finished"
            );
        } else {
            error!(
                backend = report.backend,
                commands = report.outcomes.len(),
                failures = report.failures(),
                aborted = report.aborted.is_some(),
                "action execution finished with errors"
            );
        }
        report
    }
}

fn log_decision(event: &MonitoringEvent, policy: &TriggerPolicy) {
    let state = event.state;
    match trigger::explain(event.state_type, event.attempt, policy) {
        Ok(TriggerReason::SoftExecution) => {
            info!(%state, "adding actions since soft state execution is enabled")
        }
        Ok(TriggerReason::AttemptMatched) => {
            info!(%state, "adding actions since check attempt matches attempt execution number")
        }
        Ok(TriggerReason::HardState) => info!(%state, "adding actions since the state is hard"),
        Err(SuppressReason::AttemptMismatch { expected, actual }) => info!(
            expected,
            actual, "adding no actions since check attempt did not match attempt execution number"
        ),
        Err(SuppressReason::SoftState) => {
            info!("adding no actions since the state change was soft")
        }
    }
}
