use super::{FileFilter, LineFilter};
use crate::diff::FileDiff;
use std::path::Path;

/// Negates every decision of the wrapped filter, file decisions included
#[derive(Debug, Clone, Default)]
pub struct Inverse<F>(pub F);

impl<F: LineFilter> LineFilter for Inverse<F> {
    fn keep_change(&mut self, path: &Path, line: u32) -> bool {
        !self.0.keep_change(path, line)
    }

    fn keep_context(&mut self, path: &Path, line: u32) -> bool {
        !self.0.keep_context(path, line)
    }
}

impl<F: FileFilter> FileFilter for Inverse<F> {
    fn keep_file(&self, file: &FileDiff) -> bool {
        !self.0.keep_file(file)
    }
}

/// Judges changes like the wrapped filter but accepts every context line
#[derive(Debug, Clone, Default)]
pub struct IgnoreContext<F>(pub F);

impl<F: LineFilter> LineFilter for IgnoreContext<F> {
    fn keep_change(&mut self, path: &Path, line: u32) -> bool {
        self.0.keep_change(path, line)
    }

    fn keep_context(&mut self, _path: &Path, _line: u32) -> bool {
        true
    }
}

impl<F: FileFilter> FileFilter for IgnoreContext<F> {
    fn keep_file(&self, file: &FileDiff) -> bool {
        self.0.keep_file(file)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::diff::Diff;
    use crate::filter::KeepAll;
    use crate::filter::testing::DropLines;

    #[test]
    fn inverse_negates_line_decisions() {
        let mut filter = Inverse(DropLines::new([("a/f", 2)]));
        assert!(filter.keep_change(Path::new("a/f"), 2));
        assert!(!filter.keep_change(Path::new("a/f"), 3));
        assert!(filter.keep_context(Path::new("a/f"), 2));
        assert!(!filter.keep_context(Path::new("a/f"), 3));
    }

    #[test]
    fn inverse_negates_file_decisions() {
        let diff = Diff::parse("--- a/f\n+++ b/f\n@@ -1 +1 @@\n-x\n+y\n").unwrap();
        assert!(!Inverse(KeepAll).keep_file(&diff.files[0]));
        assert!(Inverse(Inverse(KeepAll)).keep_file(&diff.files[0]));
    }

    #[test]
    fn ignore_context_accepts_dropped_lines_as_context() {
        let mut filter = IgnoreContext(DropLines::new([("a/f", 2)]));
        assert!(!filter.keep_change(Path::new("a/f"), 2));
        assert!(filter.keep_context(Path::new("a/f"), 2));
        assert_eq!(filter.0.context_queries, 0);
    }
}
