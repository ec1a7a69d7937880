//! Classifying what happened when a fine diff was applied to a target.
//!
//! [`classify`] reconciles the changes of a patch with the changes that
//! were observed after applying it and the changes that were expected.
//! [`evaluate_run`] does this for an unfiltered and a filtered patch of
//! the same source change and produces one [`PatchOutcome`] record.

use error_set::error_set;

mod classify;
mod report;

pub use classify::{ConditionCounts, ConditionTable, classify, classify_changes};
pub use report::{
    PatchAttempt, PatchOutcome, RunInput, RunMetadata, Summary, append_outcome, evaluate_run,
    load_outcomes, percentage,
};

error_set! {
    /// Bookkeeping that does not add up, which means a logic defect
    ClassificationError := {
        #[display("Classification invariant violated: {message}")]
        InvariantViolation { message: String },
    }

    /// Errors reading or writing the results file
    OutcomeIoError := {
        #[display("Failed to open {path}: {message}")]
        OpenFailed { path: String, message: String },
        #[display("Failed to write {path}: {message}")]
        WriteFailed { path: String, message: String },
        #[display("Failed to serialize outcome: {message}")]
        SerializeFailed { message: String },
        #[display("{path}:{line_number}: invalid outcome record: {message}")]
        InvalidRecord { path: String, line_number: usize, message: String },
    }
}
