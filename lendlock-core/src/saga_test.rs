#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use crate::error::{CoordinatorError, StoreError};
    use crate::saga::{Saga, SagaOutcome, StepOutcome};
    use crate::types::{RejectReason, Stage};

    // =========================================================================
    // Helper: a journal of what ran, in order
    // =========================================================================
    struct Journal(RefCell<Vec<String>>);

    impl Journal {
        fn new() -> Self {
            Self(RefCell::new(Vec::new()))
        }

        fn note(&self, entry: &str) {
            self.0.borrow_mut().push(entry.to_string());
        }

        fn entries(&self) -> Vec<String> {
            self.0.borrow().clone()
        }
    }

    fn advance<'a>(
        journal: &'a Journal,
        name: &'static str,
    ) -> impl Fn() -> crate::Result<StepOutcome> + 'a {
        move || {
            journal.note(name);
            Ok(StepOutcome::Advance)
        }
    }

    fn undo<'a>(journal: &'a Journal, name: &'static str) -> impl Fn() -> crate::Result<()> + 'a {
        move || {
            journal.note(name);
            Ok(())
        }
    }

    #[test]
    fn runs_every_step_in_order() {
        let journal = Journal::new();
        let outcome = Saga::new("test")
            .compensated_step(Stage::Locking, advance(&journal, "lock"), undo(&journal, "unlock"))
            .step(Stage::Charging, advance(&journal, "charge"))
            .step(Stage::Recording, advance(&journal, "record"))
            .run();

        assert!(matches!(outcome, SagaOutcome::Completed));
        assert_eq!(journal.entries(), vec!["lock", "charge", "record"]);
    }

    #[test]
    fn halt_compensates_completed_steps_right_to_left() {
        let journal = Journal::new();
        let outcome = Saga::new("test")
            .compensated_step(Stage::Checking, advance(&journal, "a"), undo(&journal, "undo a"))
            .compensated_step(Stage::Locking, advance(&journal, "b"), undo(&journal, "undo b"))
            .compensated_step(
                Stage::Charging,
                || {
                    journal.note("c");
                    Ok(StepOutcome::Halt(RejectReason::QuotaExceeded))
                },
                undo(&journal, "undo c"),
            )
            .step(Stage::Recording, advance(&journal, "never"))
            .run();

        assert!(matches!(
            outcome,
            SagaOutcome::Halted {
                stage: Stage::Charging,
                reason: RejectReason::QuotaExceeded
            }
        ));
        // The halting step changed nothing, so it is not undone.
        assert_eq!(journal.entries(), vec!["a", "b", "c", "undo b", "undo a"]);
    }

    #[test]
    fn failure_compensates_nothing() {
        let journal = Journal::new();
        let outcome = Saga::new("test")
            .compensated_step(Stage::Locking, advance(&journal, "lock"), undo(&journal, "unlock"))
            .step(Stage::Charging, || {
                Err(CoordinatorError::Store(StoreError::Timeout {
                    operation: "conditional put",
                    key: "holders/alice".to_string(),
                }))
            })
            .run();

        match outcome {
            SagaOutcome::Failed { stage, error } => {
                assert_eq!(stage, Stage::Charging);
                assert!(error.is_transient());
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(journal.entries(), vec!["lock"]);
    }

    #[test]
    fn failed_compensation_is_reported() {
        let outcome = Saga::new("test")
            .compensated_step(
                Stage::Locking,
                || Ok(StepOutcome::Advance),
                || Err(CoordinatorError::invariant("item vanished")),
            )
            .step(Stage::Charging, || Ok(StepOutcome::Halt(RejectReason::QuotaExceeded)))
            .run();

        match outcome {
            SagaOutcome::CompensationFailed {
                stage,
                reason,
                error,
            } => {
                assert_eq!(stage, Stage::Locking);
                assert_eq!(reason, RejectReason::QuotaExceeded);
                assert!(error.is_invariant_violation());
            }
            other => panic!("expected CompensationFailed, got {:?}", other),
        }
    }
}
