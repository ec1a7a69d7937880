//! Structured model of unified diffs as produced by `diff -u -r -N -a`.
//!
//! A [`Diff`] is an ordered list of [`FileDiff`]s, each holding its raw
//! header and its [`Hunk`]s. Every type renders back to the exact text it
//! was parsed from, so a parsed diff can be handed to `patch` unchanged.

use error_set::error_set;

pub mod file;
pub mod full;
pub mod hunk;
pub mod line;

pub use file::FileDiff;
pub use full::{DEFAULT_CHANGE_STRIP, Diff};
pub use hunk::{Hunk, HunkLocation};
pub use line::{Change, Line, NO_NEWLINE_MARKER, strip_components};

error_set! {
    /// Errors from parsing unified diff text
    ParseError := {
        /// A line does not belong to any file diff
        #[display("Line {line_number}: expected a file diff to start, got '{line}'")]
        MalformedDiff { line_number: usize, line: String },
        /// A `@@` line that does not carry four line numbers
        #[display("Line {line_number}: invalid hunk header '{line}'")]
        InvalidHunkHeader { line_number: usize, line: String },
        /// A file diff header without its `---` or `+++` line
        #[display("Line {line_number}: file diff has no '{marker}' line")]
        MissingFileMarker { line_number: usize, marker: String },
        /// Hunk body disagrees with the lengths in its header
        #[display("Line {line_number}: hunk declares -{expected_source} +{expected_target} lines but contains -{actual_source} +{actual_target}")]
        HunkLengthMismatch {
            line_number: usize,
            expected_source: u32,
            actual_source: u32,
            expected_target: u32,
            actual_target: u32,
        },
    }
}
