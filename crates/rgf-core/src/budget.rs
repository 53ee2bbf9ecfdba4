//! Iteration budgets, deadlines and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag checked between iterations and batches.
///
/// Cancellation is cooperative: setting the flag never interrupts a step in
/// flight, it only stops the next one from starting.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Reason a budget stopped a loop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStop {
    /// The iteration or sample cap was reached.
    IterationCap,
    /// The wall-clock deadline expired.
    Deadline,
    /// The caller requested cancellation.
    Cancelled,
}

impl BudgetStop {
    /// Stable label recorded in provenance notes.
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStop::IterationCap => "iteration-cap",
            BudgetStop::Deadline => "deadline",
            BudgetStop::Cancelled => "cancelled",
        }
    }
}

/// Explicit bound on every loop in the engine.
///
/// No component blocks indefinitely: Newton iteration, adaptive stepping and
/// Monte Carlo sampling all consult a budget between iterations and return a
/// partial result tagged incomplete when it stops them.
#[derive(Debug, Clone)]
pub struct Budget {
    max_iterations: usize,
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl Budget {
    /// Creates a budget bounded only by an iteration cap.
    pub fn iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            deadline: None,
            cancel: None,
        }
    }

    /// Adds a wall-clock deadline measured from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Attaches a shared cancellation token.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Iteration cap carried by the budget.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Checks whether the loop at `iteration` may continue.
    pub fn check(&self, iteration: usize) -> Option<BudgetStop> {
        if let Some(token) = &self.cancel {
            if token.is_cancelled() {
                return Some(BudgetStop::Cancelled);
            }
        }
        if iteration >= self.max_iterations {
            return Some(BudgetStop::IterationCap);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(BudgetStop::Deadline);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_cap_stops_the_loop() {
        let budget = Budget::iterations(3);
        assert_eq!(budget.check(2), None);
        assert_eq!(budget.check(3), Some(BudgetStop::IterationCap));
    }

    #[test]
    fn cancellation_wins_over_the_cap() {
        let token = CancelToken::new();
        let budget = Budget::iterations(10).with_cancel(token.clone());
        assert_eq!(budget.check(0), None);
        token.cancel();
        assert_eq!(budget.check(0), Some(BudgetStop::Cancelled));
    }

    #[test]
    fn expired_deadline_is_reported() {
        let budget = Budget::iterations(10).with_timeout(Duration::from_secs(0));
        assert_eq!(budget.check(0), Some(BudgetStop::Deadline));
    }
}
