//! Sagas: ordered (forward, compensate) step pairs over resources that are
//! each atomic on their own but not together.
//!
//! A forward step either advances, halts with a reject reason, or fails.
//! On a halt, the compensations of the steps that already completed run
//! right to left. On a failure nothing is compensated: the failed write may
//! or may not have applied, and undoing the earlier steps blindly could
//! break the very invariant the saga protects.

use tracing::{debug, warn};

use crate::error::{CoordinatorError, Result};
use crate::types::{RejectReason, Stage};

/// What a forward step decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Advance,
    Halt(RejectReason),
}

type Forward<'a> = Box<dyn Fn() -> Result<StepOutcome> + 'a>;
type Compensate<'a> = Box<dyn Fn() -> Result<()> + 'a>;

struct SagaStep<'a> {
    stage: Stage,
    forward: Forward<'a>,
    compensate: Option<Compensate<'a>>,
}

#[derive(Debug)]
pub enum SagaOutcome {
    /// Every forward step advanced.
    Completed,
    /// A step halted and all completed steps were compensated.
    Halted { stage: Stage, reason: RejectReason },
    /// A forward step returned an error; nothing was compensated.
    Failed { stage: Stage, error: CoordinatorError },
    /// A step halted but undoing an earlier step failed.
    CompensationFailed {
        stage: Stage,
        reason: RejectReason,
        error: CoordinatorError,
    },
}

pub struct Saga<'a> {
    name: &'static str,
    steps: Vec<SagaStep<'a>>,
}

impl<'a> Saga<'a> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    /// A step with nothing to undo (reads, or writes that are terminal).
    pub fn step(mut self, stage: Stage, forward: impl Fn() -> Result<StepOutcome> + 'a) -> Self {
        self.steps.push(SagaStep {
            stage,
            forward: Box::new(forward),
            compensate: None,
        });
        self
    }

    pub fn compensated_step(
        mut self,
        stage: Stage,
        forward: impl Fn() -> Result<StepOutcome> + 'a,
        compensate: impl Fn() -> Result<()> + 'a,
    ) -> Self {
        self.steps.push(SagaStep {
            stage,
            forward: Box::new(forward),
            compensate: Some(Box::new(compensate)),
        });
        self
    }

    pub fn run(self) -> SagaOutcome {
        let saga = self.name;
        for (index, step) in self.steps.iter().enumerate() {
            match (step.forward)() {
                Ok(StepOutcome::Advance) => {
                    debug!(saga, stage = %step.stage, "saga step advanced");
                }
                Ok(StepOutcome::Halt(reason)) => {
                    debug!(saga, stage = %step.stage, ?reason, "saga halted");
                    return Self::unwind(saga, &self.steps[..index], step.stage, reason);
                }
                Err(error) => {
                    warn!(saga, stage = %step.stage, %error, "saga step failed");
                    return SagaOutcome::Failed {
                        stage: step.stage,
                        error,
                    };
                }
            }
        }
        SagaOutcome::Completed
    }

    fn unwind(
        saga: &'static str,
        completed: &[SagaStep<'a>],
        stage: Stage,
        reason: RejectReason,
    ) -> SagaOutcome {
        for done in completed.iter().rev() {
            let Some(compensate) = &done.compensate else {
                continue;
            };
            warn!(saga, stage = %done.stage, ?reason, "compensating");
            if let Err(error) = compensate() {
                return SagaOutcome::CompensationFailed {
                    stage: done.stage,
                    reason,
                    error,
                };
            }
        }
        SagaOutcome::Halted { stage, reason }
    }
}
