//! Split unified diffs into single-change patches and evaluate how well
//! they transfer to another variant of the same product.

use error_set::error_set;

pub mod context;
pub mod diff;
pub mod filter;
pub mod outcome;
pub mod split;
pub mod tools;

pub use context::{ContextError, ContextProvider, DEFAULT_CONTEXT_SIZE, FileContextProvider};
pub use diff::{Change, DEFAULT_CHANGE_STRIP, Diff, FileDiff, Hunk, HunkLocation, Line, ParseError};
pub use filter::{FileFilter, KeepAll, LineFilter};
pub use outcome::{ClassificationError, OutcomeIoError, PatchOutcome};
pub use split::{split, split_all, split_with};
pub use tools::ToolError;

error_set! {
    /// Top-level error for finediff operations
    FineDiffError := {
        #[display("Failed to read {path}: {message}")]
        ReadFailed { path: String, message: String },
        #[display("Failed to write {path}: {message}")]
        WriteFailed { path: String, message: String },
        ParseError(ParseError),
        ContextError(ContextError),
        ClassificationError(ClassificationError),
        OutcomeIoError(OutcomeIoError),
        ToolError(ToolError),
    }
}
