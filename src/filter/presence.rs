use super::{FileFilter, LineFilter};
use crate::diff::{FileDiff, strip_components};
use error_set::error_set;
use std::path::{Path, PathBuf};

error_set! {
    /// Lookups that found no presence condition
    PresenceConditionError := {
        #[display("No presence condition for file {path}")]
        NoFileCondition { path: String },
        #[display("No presence condition for line {line} of {path}")]
        NoLineCondition { path: String, line: u32 },
    }
}

/// Presence conditions of one version of a product's source tree.
///
/// Paths are relative to the version root, e.g. `src/main.c`.
pub trait Artefact {
    type Formula;

    fn presence_condition_of_file(&self, path: &Path)
    -> Result<Self::Formula, PresenceConditionError>;

    fn presence_condition_of_line(
        &self,
        path: &Path,
        line: u32,
    ) -> Result<Self::Formula, PresenceConditionError>;
}

/// A configuration that either satisfies a presence condition or not
pub trait Variant<F> {
    fn implements(&self, formula: &F) -> bool;
}

/// Keeps what the target variant would contain.
///
/// Removed lines are looked up in the old version's traces and added lines
/// in the new version's, chosen by matching the first component of the
/// diff path against the two version roots. A coordinate without a
/// presence condition is dropped.
#[derive(Debug)]
pub struct PresenceConditionFilter<'a, A, V> {
    old_traces: &'a A,
    new_traces: &'a A,
    target: &'a V,
    old_root: PathBuf,
    new_root: PathBuf,
    strip: usize,
}

impl<A, V> Clone for PresenceConditionFilter<'_, A, V> {
    fn clone(&self) -> Self {
        Self {
            old_traces: self.old_traces,
            new_traces: self.new_traces,
            target: self.target,
            old_root: self.old_root.clone(),
            new_root: self.new_root.clone(),
            strip: self.strip,
        }
    }
}

impl<'a, A, V> PresenceConditionFilter<'a, A, V>
where
    A: Artefact,
    V: Variant<A::Formula>,
{
    pub fn new(
        old_traces: &'a A,
        new_traces: &'a A,
        target: &'a V,
        old_root: impl Into<PathBuf>,
        new_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            old_traces,
            new_traces,
            target,
            old_root: old_root.into(),
            new_root: new_root.into(),
            strip: 0,
        }
    }

    /// Number of leading path components ignored when looking up conditions
    pub fn with_strip(mut self, strip: usize) -> Self {
        self.strip = strip;
        self
    }

    fn traces_for(&self, path: &Path) -> Option<&'a A> {
        let first = path.components().next()?;
        if self.old_root.ends_with(first) {
            Some(self.old_traces)
        } else if self.new_root.ends_with(first) {
            Some(self.new_traces)
        } else {
            None
        }
    }

    fn line_in(&self, traces: &A, path: &Path, line: u32) -> bool {
        let relative = strip_components(path, self.strip);
        match traces.presence_condition_of_line(&relative, line) {
            Ok(condition) => self.target.implements(&condition),
            Err(e) => {
                log::warn!("{e}");
                false
            }
        }
    }

    fn file_in(&self, traces: &A, path: &Path) -> bool {
        let relative = strip_components(path, self.strip);
        match traces.presence_condition_of_file(&relative) {
            Ok(condition) => self.target.implements(&condition),
            Err(e) => {
                log::warn!("{e}");
                false
            }
        }
    }
}

impl<A, V> FileFilter for PresenceConditionFilter<'_, A, V>
where
    A: Artefact,
    V: Variant<A::Formula>,
{
    fn keep_file(&self, file: &FileDiff) -> bool {
        // Kept if the file exists for the target in either version
        self.file_in(self.old_traces, &file.old_file) || self.file_in(self.new_traces, &file.new_file)
    }
}

impl<A, V> LineFilter for PresenceConditionFilter<'_, A, V>
where
    A: Artefact,
    V: Variant<A::Formula>,
{
    fn keep_change(&mut self, path: &Path, line: u32) -> bool {
        match self.traces_for(path) {
            Some(traces) => self.line_in(traces, path, line),
            None => {
                log::error!(
                    "Path '{}' matches neither {} nor {}",
                    path.display(),
                    self.old_root.display(),
                    self.new_root.display()
                );
                false
            }
        }
    }
}
