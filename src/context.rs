//! Fresh context for single-change hunks.
//!
//! Once changes are filtered out of a patch, the context recorded in the
//! original hunk no longer matches what the target file will look like.
//! A [`ContextProvider`] rebuilds it from the files on disk, skipping
//! every line the active [`LineFilter`] excises.

use crate::diff::{FileDiff, Line};
use crate::filter::LineFilter;
use error_set::error_set;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

/// Number of context lines `diff -u` writes on each side of a change
pub const DEFAULT_CONTEXT_SIZE: usize = 3;

error_set! {
    /// Errors from reading files for context
    ContextError := {
        #[display("Failed to read {path}: {message}")]
        ReadFailed { path: String, message: String },
    }
}

/// Source of the context lines placed around a single change
pub trait ContextProvider {
    /// Context lines ending at `line` (1-based) of the new file, in file order
    fn leading_context(
        &self,
        filter: &mut dyn LineFilter,
        file: &FileDiff,
        line: u32,
    ) -> Result<Vec<Line>, ContextError>;

    /// Context lines starting at `line` (1-based) of the old file, in file
    /// order, followed by the no-newline marker if the end of the file was
    /// reached
    fn trailing_context(
        &self,
        filter: &mut dyn LineFilter,
        file: &FileDiff,
        line: u32,
    ) -> Result<Vec<Line>, ContextError>;
}

/// Reads context from the files below a working directory.
///
/// Diff paths are resolved against `root`, so `root` is the directory
/// `diff -r` was run from. A file that does not exist yields no context.
#[derive(Debug, Clone)]
pub struct FileContextProvider {
    root: PathBuf,
    size: usize,
}

impl FileContextProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_size(root, DEFAULT_CONTEXT_SIZE)
    }

    pub fn with_size(root: impl Into<PathBuf>, size: usize) -> Self {
        Self {
            root: root.into(),
            size,
        }
    }

    fn read_lines(&self, path: &Path) -> Result<Option<Vec<String>>, ContextError> {
        let full_path = self.root.join(path);
        if !full_path.exists() {
            log::debug!("No context from missing file {}", full_path.display());
            return Ok(None);
        }

        let read_failed = |message: String| {
            log::error!("Could not read {}: {message}", full_path.display());
            ContextError::ReadFailed {
                path: full_path.display().to_string(),
                message,
            }
        };
        let bytes = fs::read(&full_path).map_err(|e| read_failed(e.to_string()))?;
        // Replacing undecodable bytes would produce context the target lacks
        let text = String::from_utf8(bytes).map_err(|e| read_failed(e.to_string()))?;

        Ok(Some(text.lines().map(String::from).collect()))
    }
}

impl ContextProvider for FileContextProvider {
    fn leading_context(
        &self,
        filter: &mut dyn LineFilter,
        file: &FileDiff,
        line: u32,
    ) -> Result<Vec<Line>, ContextError> {
        let Some(lines) = self.read_lines(&file.new_file)? else {
            return Ok(Vec::new());
        };

        let mut context = VecDeque::with_capacity(self.size);
        let start = (line as usize).min(lines.len());
        for number in (1..=start).rev() {
            // Excised lines do not count towards the window
            if !filter.keep_context(&file.new_file, number as u32) {
                continue;
            }
            if context.len() >= self.size {
                break;
            }
            context.push_front(Line::context(&lines[number - 1]));
        }

        Ok(context.into())
    }

    fn trailing_context(
        &self,
        filter: &mut dyn LineFilter,
        file: &FileDiff,
        line: u32,
    ) -> Result<Vec<Line>, ContextError> {
        let Some(lines) = self.read_lines(&file.old_file)? else {
            return Ok(Vec::new());
        };

        let mut context = Vec::with_capacity(self.size + 1);
        let last = lines.len();
        for number in (line.max(1) as usize)..=last {
            if filter.keep_context(&file.old_file, number as u32) {
                if context.len() >= self.size {
                    break;
                }
                context.push(Line::context(&lines[number - 1]));
            }
            if number == last {
                context.push(Line::no_newline());
            }
        }

        Ok(context)
    }
}
