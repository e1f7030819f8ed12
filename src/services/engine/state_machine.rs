//! The legal transition table for an order's lifecycle.
//!
//! This is a pure function of `(current status, target status)` — it knows
//! nothing about persistence, validation outcomes, or timing. The workflow
//! driver (`services::engine::workflow`) calls `transition` before writing
//! anything, so an illegal transition never reaches the store.

use std::fmt;

use crate::models::OrderStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

/// Checks whether `from -> to` is a legal edge in the order lifecycle graph.
/// Returns `Ok(())` if legal, `Err(TransitionError)` otherwise.
pub fn transition(from: OrderStatus, to: OrderStatus) -> Result<(), TransitionError> {
    use OrderStatus::*;

    let legal = matches!(
        (from, to),
        (New, Validating)
            | (Validating, Validated)
            | (Validating, Rejected)
            | (Validated, Executing)
            | (Executing, Filled)
            | (Executing, Rejected)
            | (Filled, Settled)
            | (New, Cancelled)
            | (Validated, Cancelled)
    );

    if legal {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// `Cancel` is legal only from these statuses.
pub fn can_cancel(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::New | OrderStatus::Validated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn happy_path_is_legal() {
        assert!(transition(New, Validating).is_ok());
        assert!(transition(Validating, Validated).is_ok());
        assert!(transition(Validated, Executing).is_ok());
        assert!(transition(Executing, Filled).is_ok());
        assert!(transition(Filled, Settled).is_ok());
    }

    #[test]
    fn rejection_paths_are_legal() {
        assert!(transition(Validating, Rejected).is_ok());
        assert!(transition(Executing, Rejected).is_ok());
    }

    #[test]
    fn cancel_only_from_new_or_validated() {
        assert!(transition(New, Cancelled).is_ok());
        assert!(transition(Validated, Cancelled).is_ok());
        assert!(transition(Executing, Cancelled).is_err());
        assert!(can_cancel(New));
        assert!(can_cancel(Validated));
        assert!(!can_cancel(Executing));
        assert!(!can_cancel(Filled));
    }

    #[test]
    fn terminal_states_reject_everything() {
        for terminal in [Rejected, Settled, Cancelled] {
            for target in [New, Validating, Validated, Executing, Filled, Settled, Rejected, Cancelled] {
                if terminal == target {
                    continue;
                }
                assert!(
                    transition(terminal, target).is_err(),
                    "{terminal} -> {target} should be illegal"
                );
            }
        }
    }

    #[test]
    fn no_skipping_states() {
        assert!(transition(New, Validated).is_err());
        assert!(transition(New, Executing).is_err());
        assert!(transition(Validated, Filled).is_err());
    }
}
