use anyhow::Context;
use notss_core::{EventHandler, HandlerOutcome, MonCheckSource};
use tracing::{debug, error, info};

use crate::cli::Cli;

// ---------------------------------------------------------------------------
// HandlerExit: wiring failures with their own exit codes
// ---------------------------------------------------------------------------

pub const EXIT_WIRING: i32 = 1;
pub const EXIT_NO_MODULE: i32 = 2;
pub const EXIT_FUNK: i32 = 3;

#[derive(Debug)]
pub enum HandlerExit {
    /// No execution module was selected.
    NoModule,
    /// The selected module's settings are unusable.
    InvalidModule(String),
}

impl HandlerExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            HandlerExit::NoModule | HandlerExit::InvalidModule(_) => EXIT_NO_MODULE,
        }
    }
}

impl std::fmt::Display for HandlerExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerExit::NoModule => write!(f, "could not find an execution module; use nrpe, ssh or shell"),
            HandlerExit::InvalidModule(reason) => write!(f, "invalid execution module settings: {reason}"),
        }
    }
}

impl std::error::Error for HandlerExit {}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Build the handler from the command line, run it once, and return the
/// process exit code.
pub fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = cli.handler_config().context("invalid event")?;
    let timeout = cli.timeout();

    let user = std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    info!(
        user = %user,
        host = %config.event.host_name,
        service = %config.event.service_description,
        "event handler started"
    );

    // The backend is chosen once, before any decision is made.
    let module = cli.module.ok_or(HandlerExit::NoModule)?;
    let backend_config = module
        .into_config(&config.event.host_address, timeout)
        .map_err(|e| HandlerExit::InvalidModule(e.to_string()))?;
    if let Ok(json) = serde_json::to_string(&backend_config) {
        debug!(module = backend_config.name(), config = %json, "backend configuration");
    }
    let backend = backend_config.build();

    let mut handler = EventHandler::new(config, backend);
    if handler.config().verify_check_source {
        handler = handler.with_check_source(MonCheckSource {
            mon: cli.mon_path,
            timeout,
        });
    }

    let outcome = handler.handle();
    if let HandlerOutcome::Executed(report) = &outcome {
        for failed in report.outcomes.iter().filter(|o| o.verdict.is_failure()) {
            error!(command = %failed.command, exit_code = ?failed.exit_code, "action failed");
        }
    }
    Ok(outcome.exit_code())
}

/// Map an error from [`run`] to its exit code, logging it on the way.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<HandlerExit>() {
        Some(exit) => {
            error!("{exit}");
            exit.exit_code()
        }
        None => {
            error!("{err:#}");
            EXIT_WIRING
        }
    }
}
