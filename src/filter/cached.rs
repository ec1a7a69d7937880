use super::{FileFilter, LineFilter};
use crate::diff::FileDiff;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Remembers every change decision of the wrapped filter.
///
/// Context queries are answered from the remembered decisions rather than
/// by asking the inner filter again: a coordinate that was judged as a
/// change keeps that verdict, every other coordinate is usable context.
/// One instance belongs to one split; decisions are keyed by the path as
/// written in the diff.
#[derive(Debug, Clone, Default)]
pub struct Cached<F> {
    inner: F,
    decisions: HashMap<(PathBuf, u32), bool>,
}

impl<F> Cached<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            decisions: HashMap::new(),
        }
    }

    /// Decision recorded for a coordinate, if it was ever queried as a change
    pub fn decision(&self, path: &Path, line: u32) -> Option<bool> {
        self.decisions.get(&(path.to_path_buf(), line)).copied()
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: LineFilter> LineFilter for Cached<F> {
    fn keep_change(&mut self, path: &Path, line: u32) -> bool {
        let keep = self.inner.keep_change(path, line);
        self.decisions.insert((path.to_path_buf(), line), keep);
        keep
    }

    fn keep_context(&mut self, path: &Path, line: u32) -> bool {
        self.decision(path, line).unwrap_or(true)
    }
}

impl<F: FileFilter> FileFilter for Cached<F> {
    fn keep_file(&self, file: &FileDiff) -> bool {
        self.inner.keep_file(file)
    }
}
