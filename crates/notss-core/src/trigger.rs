//! Decides whether an event should fire its actions, and which list applies.
//!
//! By default only HARD (confirmed) state changes fire. Operators may opt
//! into firing on every soft re-check, or exactly once on a numbered check
//! attempt during the soft retry sequence.

use crate::types::{ActionLists, SkipPolicy, State, StateType, TriggerPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// An attempt override is configured and this is not that attempt.
    AttemptMismatch { expected: u32, actual: u32 },
    /// Soft state change without an override.
    SoftState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    Suppressed(SuppressReason),
    Triggered(State),
}

/// Why a [`TriggerDecision::Triggered`] fired; used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    SoftExecution,
    AttemptMatched,
    HardState,
}

/// Resolve the trigger decision for one event.
///
/// Branch order matters: an attempt override that does not match suppresses
/// the event even when the state is already HARD.
pub fn resolve(
    state: State,
    state_type: StateType,
    attempt: u32,
    policy: &TriggerPolicy,
) -> TriggerDecision {
    match explain(state_type, attempt, policy) {
        Ok(_) => TriggerDecision::Triggered(state),
        Err(reason) => TriggerDecision::Suppressed(reason),
    }
}

pub(crate) fn explain(
    state_type: StateType,
    attempt: u32,
    policy: &TriggerPolicy,
) -> Result<TriggerReason, SuppressReason> {
    match *policy {
        TriggerPolicy::OnSoft => Ok(TriggerReason::SoftExecution),
        TriggerPolicy::OnAttempt(n) if n == attempt => Ok(TriggerReason::AttemptMatched),
        TriggerPolicy::OnAttempt(n) => Err(SuppressReason::AttemptMismatch {
            expected: n,
            actual: attempt,
        }),
        TriggerPolicy::Default if state_type == StateType::Hard => Ok(TriggerReason::HardState),
        TriggerPolicy::Default => Err(SuppressReason::SoftState),
    }
}

/// The commands to run for a decision, or `None` when there is nothing to do.
///
/// Only the list of the triggered state is read.
pub fn select_actions(
    decision: TriggerDecision,
    lists: &ActionLists,
    skip: SkipPolicy,
) -> Option<&[String]> {
    let TriggerDecision::Triggered(state) = decision else {
        return None;
    };
    let actions = lists.for_state(state);
    if skip.is_no_action(actions) {
        None
    } else {
        Some(actions)
    }
}
