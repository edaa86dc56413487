use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::store::WriteSummary;

/// Why an instrument ended in [`Outcome::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The source stayed unavailable for every attempt.
    #[error("source unavailable after {attempts} attempts: {message}")]
    SourceUnavailable { attempts: u32, message: String },

    /// The source answered with something unusable. Not retried.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// The write hit a uniqueness violation. Not retried.
    #[error("store conflict: {message}")]
    StoreConflict { message: String },

    /// Any other store failure during write.
    #[error("store error: {message}")]
    Store { message: String },

    /// The instrument row could not be looked up or created.
    #[error("could not resolve instrument: {message}")]
    Resolve { message: String },

    /// Another run holds this symbol.
    #[error("another run is ingesting this symbol")]
    LeaseHeld,
}

/// Terminal state of one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded { rows: usize, summary: WriteSummary },
    Failed { reason: FailureReason },
    /// The source had no data for the window, even after retrying.
    SkippedEmpty,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Outcome::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// What happened to one instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentReport {
    pub symbol: String,
    /// `None` when the run failed before the instrument was resolved.
    pub instrument_id: Option<i32>,
    /// Fetch attempts made.
    pub attempts: u32,
    /// Fetched rows dropped before writing (blank or outside the window).
    pub skipped_rows: usize,
    pub outcome: Outcome,
}

impl InstrumentReport {
    pub(crate) fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            instrument_id: None,
            attempts: 0,
            skipped_rows: 0,
            outcome: Outcome::SkippedEmpty,
        }
    }

    pub(crate) fn finish(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub(crate) fn fail(self, reason: FailureReason) -> Self {
        self.finish(Outcome::Failed { reason })
    }
}

/// Outcome of a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub reports: Vec<InstrumentReport>,
    /// Symbols that were never started because the batch was aborted.
    pub not_started: Vec<String>,
    pub aborted: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome == Outcome::SkippedEmpty)
            .count()
    }

    /// True when every instrument ran and none failed.
    pub fn is_clean(&self) -> bool {
        !self.aborted && self.failed() == 0
    }

    pub fn get(&self, symbol: &str) -> Option<&InstrumentReport> {
        self.reports.iter().find(|r| r.symbol == symbol)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .reports
            .iter()
            .map(|r| r.symbol.len())
            .max()
            .unwrap_or(0);

        for r in &self.reports {
            write!(f, "{:<width$}  ", r.symbol)?;
            match &r.outcome {
                Outcome::Succeeded { rows, summary } => writeln!(
                    f,
                    "ok       {rows} rows ({} inserted, {} updated, {} unchanged, {} deleted)",
                    summary.inserted, summary.updated, summary.unchanged, summary.deleted
                )?,
                Outcome::Failed { reason } => writeln!(f, "FAILED   {reason}")?,
                Outcome::SkippedEmpty => {
                    writeln!(f, "skipped  no data after {} attempts", r.attempts)?
                }
            }
        }
        if !self.not_started.is_empty() {
            writeln!(f, "not started: {}", self.not_started.join(", "))?;
        }
        write!(
            f,
            "{} succeeded, {} failed, {} skipped{}",
            self.succeeded(),
            self.failed(),
            self.skipped(),
            if self.aborted { " (aborted)" } else { "" }
        )
    }
}
