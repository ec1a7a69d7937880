//! Decisions about which parts of a diff survive splitting.
//!
//! A [`FileFilter`] accepts or rejects whole file diffs, a [`LineFilter`]
//! accepts or rejects single changed lines and says whether a line of
//! file content may still serve as context. [`KeepAll`] is the
//! pass-through default; [`Cached`], [`Inverse`] and [`IgnoreContext`]
//! decorate any other filter.

use crate::diff::FileDiff;
use std::path::Path;

mod cached;
mod inverse;
mod presence;

pub use cached::Cached;
pub use inverse::{IgnoreContext, Inverse};
pub use presence::{Artefact, PresenceConditionError, PresenceConditionFilter, Variant};

/// Decides whether a file diff takes part in splitting at all
pub trait FileFilter {
    fn keep_file(&self, file: &FileDiff) -> bool;
}

/// Decides line by line what stays in a split diff.
///
/// `path` is the path as written in the diff header (old file for removed
/// lines, new file for added lines) and `line` is 1-based.
pub trait LineFilter {
    /// Whether the change at this coordinate is kept
    fn keep_change(&mut self, path: &Path, line: u32) -> bool;

    /// Whether the file line at this coordinate may be used as context
    fn keep_context(&mut self, path: &Path, line: u32) -> bool {
        self.keep_change(path, line)
    }
}

impl<F: FileFilter + ?Sized> FileFilter for &F {
    fn keep_file(&self, file: &FileDiff) -> bool {
        (**self).keep_file(file)
    }
}

impl<F: FileFilter + ?Sized> FileFilter for &mut F {
    fn keep_file(&self, file: &FileDiff) -> bool {
        (**self).keep_file(file)
    }
}

impl<F: LineFilter + ?Sized> LineFilter for &mut F {
    fn keep_change(&mut self, path: &Path, line: u32) -> bool {
        (**self).keep_change(path, line)
    }

    fn keep_context(&mut self, path: &Path, line: u32) -> bool {
        (**self).keep_context(path, line)
    }
}

/// Keeps every file, change and context line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepAll;

impl FileFilter for KeepAll {
    fn keep_file(&self, _file: &FileDiff) -> bool {
        true
    }
}

impl LineFilter for KeepAll {
    fn keep_change(&mut self, _path: &Path, _line: u32) -> bool {
        true
    }
}
