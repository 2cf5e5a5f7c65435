//! Action-chain interpreter
//!
//! A [`ChainRunner`] walks the steps of one control's chain as an explicit
//! state machine. Commands are carried out by a [`CommandHost`] (the
//! formset); anything asynchronous makes the host return a [`Suspension`],
//! the runner parks in `Suspended` and the driver later feeds a
//! [`Resolution`] back through [`ChainRunner::resume`].
//!
//! Guard semantics: for `cmd ~ proc` / `cmd !~ proc`, if the outcome so far
//! matches the guard, `proc` runs and the chain stops; otherwise `cmd` runs
//! and the chain carries on.

use crate::error::{FormsetError, FormsetResult, TransportError};
use crate::path::FieldPath;
use crate::sync::{SubmitRequest, SubmitResponse};
use crate::upload::HandleId;
use formset_parser::{ActionChain, Command, GuardKind};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn from_success(ok: bool) -> Self {
        if ok {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }

    fn matches(&self, guard: GuardKind) -> bool {
        matches!(
            (self, guard),
            (Outcome::Success, GuardKind::OnSuccess) | (Outcome::Failure, GuardKind::OnFailure)
        )
    }
}

/// What a suspended chain is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "handle", rename_all = "camelCase")]
pub enum Waiting {
    Submission,
    Delay,
    Upload(HandleId),
}

impl Waiting {
    pub fn describe(&self) -> &'static str {
        match self {
            Waiting::Submission => "a submission result",
            Waiting::Delay => "a delay",
            Waiting::Upload(_) => "an upload",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ChainState {
    Idle,
    Running { step: usize },
    Suspended { step: usize, waiting: Waiting },
    Completed { outcome: Outcome },
    Aborted { error: String },
}

/// Work the driver performs before resuming a chain
#[derive(Debug, Clone, PartialEq)]
pub enum Suspension {
    Submit(SubmitRequest),
    Delay(Duration),
    AwaitUpload(HandleId),
}

impl Suspension {
    pub fn waiting(&self) -> Waiting {
        match self {
            Suspension::Submit(_) => Waiting::Submission,
            Suspension::Delay(_) => Waiting::Delay,
            Suspension::AwaitUpload(id) => Waiting::Upload(*id),
        }
    }
}

/// Result of activating or resuming a chain
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// The chain was already in flight
    Ignored,
    Suspended(Suspension),
    Completed(Outcome),
    Aborted(String),
}

/// The driver's answer to a [`Suspension`]
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Submitted(Result<SubmitResponse, TransportError>),
    Elapsed,
    UploadSettled,
}

impl Resolution {
    pub fn describe(&self) -> &'static str {
        match self {
            Resolution::Submitted(_) => "a submission result",
            Resolution::Elapsed => "a delay",
            Resolution::UploadSettled => "an upload",
        }
    }
}

/// UI-side effect recorded for the host to render
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", content = "value", rename_all = "camelCase")]
pub enum EffectKind {
    Spinner,
    Okay,
    Bummer,
    ScrollToError(Option<FieldPath>),
    Navigate(String),
    Reload,
    Emit(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Effect {
    pub control: String,
    #[serde(flatten)]
    pub kind: EffectKind,
}

/// How one executed command left the chain
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    /// Keep going; `Some` replaces the outcome flag
    Continue(Option<Outcome>),
    Suspend(Suspension),
}

/// Carries out commands on behalf of a running chain
pub trait CommandHost {
    fn execute(&mut self, control: &str, command: &Command, prior: Outcome) -> FormsetResult<StepResult>;

    /// Turn the driver's answer into the outcome the chain continues with
    fn resolve(
        &mut self,
        control: &str,
        waiting: Waiting,
        resolution: Resolution,
        prior: Outcome,
    ) -> FormsetResult<Outcome>;
}

#[derive(Debug, Clone)]
pub struct ChainRunner {
    chain: ActionChain,
    state: ChainState,
    outcome: Outcome,
    /// The suspended step was a guarded proceeding; stop once it resolves
    halting: bool,
}

impl ChainRunner {
    pub fn new(chain: ActionChain) -> Self {
        Self {
            chain,
            state: ChainState::Idle,
            outcome: Outcome::Success,
            halting: false,
        }
    }

    pub fn chain(&self) -> &ActionChain {
        &self.chain
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self.state,
            ChainState::Running { .. } | ChainState::Suspended { .. }
        )
    }

    pub fn start(&mut self, control: &str, host: &mut impl CommandHost) -> Progress {
        if self.is_in_flight() {
            debug!(control, "activation ignored, chain in flight");
            return Progress::Ignored;
        }

        info!(control, chain = %self.chain, "chain started");
        self.outcome = Outcome::Success;
        self.halting = false;
        self.run_from(0, control, host)
    }

    pub fn resume(
        &mut self,
        control: &str,
        host: &mut impl CommandHost,
        resolution: Resolution,
    ) -> FormsetResult<Progress> {
        let ChainState::Suspended { step, waiting } = self.state else {
            return Err(FormsetError::NotSuspended(control.to_string()));
        };

        // a failed resolve leaves the chain suspended so the driver can retry
        self.outcome = host.resolve(control, waiting, resolution, self.outcome)?;
        debug!(control, step, outcome = ?self.outcome, "chain resumed");

        if self.halting {
            return Ok(self.finish(control));
        }
        Ok(self.run_from(step + 1, control, host))
    }

    fn run_from(&mut self, start: usize, control: &str, host: &mut impl CommandHost) -> Progress {
        for index in start..self.chain.steps.len() {
            self.state = ChainState::Running { step: index };

            let step = &self.chain.steps[index];
            let (command, halts) = match step.guard() {
                Some(guard) if self.outcome.matches(guard.kind) => (guard.proceeding.clone(), true),
                _ => (step.command().clone(), false),
            };

            match host.execute(control, &command, self.outcome) {
                Ok(StepResult::Continue(outcome)) => {
                    if let Some(outcome) = outcome {
                        self.outcome = outcome;
                    }
                    if halts {
                        return self.finish(control);
                    }
                }
                Ok(StepResult::Suspend(suspension)) => {
                    self.halting = halts;
                    self.state = ChainState::Suspended {
                        step: index,
                        waiting: suspension.waiting(),
                    };
                    debug!(control, step = index, command = %command, "chain suspended");
                    return Progress::Suspended(suspension);
                }
                Err(error) => {
                    let error = error.to_string();
                    info!(control, step = index, %error, "chain aborted");
                    self.state = ChainState::Aborted {
                        error: error.clone(),
                    };
                    return Progress::Aborted(error);
                }
            }
        }

        self.finish(control)
    }

    fn finish(&mut self, control: &str) -> Progress {
        info!(control, outcome = ?self.outcome, "chain completed");
        self.halting = false;
        self.state = ChainState::Completed {
            outcome: self.outcome,
        };
        Progress::Completed(self.outcome)
    }
}
