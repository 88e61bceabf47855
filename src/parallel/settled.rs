//! Settled outcomes and their aggregation.

use std::error::Error;
use std::fmt;

use crate::timeout::TimeoutError;

/// Why a set of indexed outcomes could not be put back in input order.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SettleError {
    #[error("{} of {total} outcomes missing at indices {missing:?}", .missing.len())]
    Incomplete { total: usize, missing: Vec<usize> },

    #[error("outcome index {index} is out of range or recorded twice (batch of {total})")]
    UnexpectedIndex { index: usize, total: usize },
}

/// Why a task did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection<E> {
    /// The task itself failed; the error is passed through untouched.
    Task(E),
    /// The task never settled within its deadline windows.
    Timeout(TimeoutError),
}

impl<E> Rejection<E> {
    /// Returns true if the task was abandoned after its last deadline window.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Rejection::Timeout(_))
    }

    /// Returns the task's own error, if that is why it was rejected.
    pub fn task_error(&self) -> Option<&E> {
        match self {
            Rejection::Task(err) => Some(err),
            Rejection::Timeout(_) => None,
        }
    }

    /// Returns the timeout details, if the task timed out.
    pub fn timeout(&self) -> Option<&TimeoutError> {
        match self {
            Rejection::Task(_) => None,
            Rejection::Timeout(err) => Some(err),
        }
    }
}

impl<E: fmt::Display> fmt::Display for Rejection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Task(err) => fmt::Display::fmt(err, f),
            Rejection::Timeout(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl<E: Error + 'static> Error for Rejection<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Rejection::Task(err) => Some(err),
            Rejection::Timeout(err) => Some(err),
        }
    }
}

/// Terminal result of one task in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// The task produced a value.
    Fulfilled(T),
    /// The task failed or timed out.
    Rejected(Rejection<E>),
}

impl<T, E> Outcome<T, E> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Outcome::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }

    /// Stable lowercase label: `"fulfilled"` or `"rejected"`.
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Fulfilled(_) => "fulfilled",
            Outcome::Rejected(_) => "rejected",
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Fulfilled(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&Rejection<E>> {
        match self {
            Outcome::Fulfilled(_) => None,
            Outcome::Rejected(reason) => Some(reason),
        }
    }

    /// Converts into a `Result`, keeping the rejection reason.
    pub fn into_result(self) -> Result<T, Rejection<E>> {
        match self {
            Outcome::Fulfilled(value) => Ok(value),
            Outcome::Rejected(reason) => Err(reason),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Fulfilled(value),
            Err(err) => Outcome::Rejected(Rejection::Task(err)),
        }
    }
}

/// Counts of outcomes by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettledSummary {
    /// Number of tasks in the batch.
    pub total: usize,
    /// Tasks that produced a value.
    pub fulfilled: usize,
    /// Tasks that failed or timed out.
    pub rejected: usize,
    /// Subset of `rejected` that timed out.
    pub timed_out: usize,
}

impl SettledSummary {
    /// Summarizes a slice of outcomes.
    pub fn of<T, E>(outcomes: &[Outcome<T, E>]) -> Self {
        Self::tally(outcomes.len(), outcomes.iter())
    }

    fn tally<'a, T: 'a, E: 'a>(
        total: usize,
        outcomes: impl Iterator<Item = &'a Outcome<T, E>>,
    ) -> Self {
        let mut summary = Self {
            total,
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Fulfilled(_) => summary.fulfilled += 1,
                Outcome::Rejected(reason) => {
                    summary.rejected += 1;
                    if reason.is_timeout() {
                        summary.timed_out += 1;
                    }
                }
            }
        }
        summary
    }
}

/// Collects outcomes as they settle and hands them back in input order.
///
/// Outcomes may be recorded in any order. The first outcome recorded for an
/// index is final; later ones for the same index are ignored.
#[derive(Debug)]
pub struct SettledAggregator<T, E> {
    slots: Vec<Option<Outcome<T, E>>>,
    settled: usize,
}

impl<T, E> SettledAggregator<T, E> {
    /// Creates an aggregator expecting `len` outcomes.
    pub fn new(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || None);
        Self { slots, settled: 0 }
    }

    /// Records the outcome for `index`.
    ///
    /// Returns false if the index is out of range or already settled.
    pub fn record(&mut self, index: usize, outcome: Outcome<T, E>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if slot.is_none() => {
                *slot = Some(outcome);
                self.settled += 1;
                true
            }
            _ => false,
        }
    }

    /// Number of outcomes recorded so far.
    pub fn settled(&self) -> usize {
        self.settled
    }

    /// Returns true once every index has an outcome.
    pub fn is_complete(&self) -> bool {
        self.settled == self.slots.len()
    }

    /// Summary of the outcomes recorded so far.
    pub fn summary(&self) -> SettledSummary {
        SettledSummary::tally(self.slots.len(), self.slots.iter().flatten())
    }

    /// Indices that have no outcome yet, in ascending order.
    pub fn missing(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(index, _)| index)
            .collect()
    }

    /// Returns the outcomes ordered by index.
    ///
    /// Fails with [`SettleError::Incomplete`] unless every index was recorded;
    /// the result is never shorter than the batch.
    pub fn finish(self) -> Result<Vec<Outcome<T, E>>, SettleError> {
        if !self.is_complete() {
            return Err(SettleError::Incomplete {
                total: self.slots.len(),
                missing: self.missing(),
            });
        }
        Ok(self.slots.into_iter().flatten().collect())
    }

    /// Orders a complete set of indexed outcomes in one call.
    ///
    /// Every index in `0..len` must appear exactly once.
    pub fn collect<I>(len: usize, indexed: I) -> Result<Vec<Outcome<T, E>>, SettleError>
    where
        I: IntoIterator<Item = (usize, Outcome<T, E>)>,
    {
        let mut aggregator = Self::new(len);
        for (index, outcome) in indexed {
            if !aggregator.record(index, outcome) {
                return Err(SettleError::UnexpectedIndex { index, total: len });
            }
        }
        aggregator.finish()
    }
}
