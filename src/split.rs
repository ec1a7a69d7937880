//! Splitting a diff into single-change patches.
//!
//! Every added or removed line that survives the filters becomes its own
//! [`FileDiff`] holding one hunk: fresh leading context, the change, fresh
//! trailing context. Applying the resulting fine diff change by change
//! with `patch` reproduces the filtered part of the original diff.

use crate::context::{ContextError, ContextProvider};
use crate::diff::{Diff, FileDiff, Hunk, HunkLocation, Line};
use crate::filter::{FileFilter, KeepAll, LineFilter};

/// Split with separate file and line filters
pub fn split(
    diff: &Diff,
    file_filter: &dyn FileFilter,
    line_filter: &mut dyn LineFilter,
    context: &dyn ContextProvider,
) -> Result<Diff, ContextError> {
    let mut files = Vec::new();
    for file in &diff.files {
        if file_filter.keep_file(file) {
            files.extend(split_file(file, line_filter, context)?);
        } else {
            log::debug!("Skipping {}", file.old_file.display());
        }
    }
    Ok(Diff::new(files))
}

/// Split with one filter that decides both files and lines
pub fn split_with<F>(
    diff: &Diff,
    filter: &mut F,
    context: &dyn ContextProvider,
) -> Result<Diff, ContextError>
where
    F: FileFilter + LineFilter,
{
    let mut files = Vec::new();
    for file in &diff.files {
        if filter.keep_file(file) {
            files.extend(split_file(file, filter, context)?);
        } else {
            log::debug!("Skipping {}", file.old_file.display());
        }
    }
    Ok(Diff::new(files))
}

/// Split without filtering anything out
pub fn split_all(diff: &Diff, context: &dyn ContextProvider) -> Result<Diff, ContextError> {
    split_with(diff, &mut KeepAll, context)
}

fn split_file(
    file: &FileDiff,
    filter: &mut dyn LineFilter,
    context: &dyn ContextProvider,
) -> Result<Vec<FileDiff>, ContextError> {
    let mut fine = Vec::new();
    // Shift of later locations caused by earlier decisions in this file
    let mut offset: i64 = 0;

    for hunk in &file.hunks {
        let source = hunk.location.source;
        let target = hunk.location.target;
        let mut old_index = 0;
        let mut new_index = 0;

        for line in &hunk.lines {
            match line {
                Line::Context(_) => {
                    old_index += 1;
                    new_index += 1;
                }
                Line::Removed(_) => {
                    let number = source.saturating_add(old_index);
                    if filter.keep_change(&file.old_file, number) {
                        let leading = context.leading_context(
                            filter,
                            file,
                            target.saturating_add(new_index).saturating_sub(1),
                        )?;
                        let trailing =
                            context.trailing_context(filter, file, number.saturating_add(1))?;
                        let location =
                            HunkLocation::new(shift(number, offset), shift(number, offset));
                        fine.push(file.with_hunk(single_change(location, leading, line, trailing)));
                    } else {
                        // The target never had this line
                        offset -= 1;
                    }
                    old_index += 1;
                }
                Line::Added(_) => {
                    let number = target.saturating_add(new_index);
                    if filter.keep_change(&file.new_file, number) {
                        let leading =
                            context.leading_context(filter, file, number.saturating_sub(1))?;
                        let next_old = source.saturating_add(old_index);
                        let trailing = context.trailing_context(filter, file, next_old)?;
                        let location = HunkLocation::new(
                            shift(next_old, offset),
                            shift(number, offset),
                        );
                        fine.push(file.with_hunk(single_change(location, leading, line, trailing)));

                        // The first kept line of a created file makes the file exist
                        if source == 0 {
                            offset = 1;
                        }
                    }
                    new_index += 1;
                }
                Line::Meta(_) => {}
            }
        }
    }

    log::debug!(
        "Split {} into {} single-change patch(es)",
        file.old_file.display(),
        fine.len()
    );
    Ok(fine)
}

fn single_change(
    location: HunkLocation,
    mut leading: Vec<Line>,
    change: &Line,
    trailing: Vec<Line>,
) -> Hunk {
    leading.push(change.clone());
    leading.extend(trailing);
    Hunk::new(location, leading)
}

fn shift(line: u32, offset: i64) -> u32 {
    (i64::from(line) + offset).clamp(0, i64::from(u32::MAX)) as u32
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::context::FileContextProvider;
    use crate::context::testing::NoContext;
    use crate::diff::{Change, NO_NEWLINE_MARKER};
    use crate::filter::testing::{DropLines, Features, Traces};
    use crate::filter::{Cached, PresenceConditionFilter};
    use similar_asserts::assert_eq;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn tree(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        dir
    }

    fn locations(diff: &Diff) -> Vec<HunkLocation> {
        diff.files
            .iter()
            .flat_map(|f| f.hunks.iter().map(|h| h.location))
            .collect()
    }

    #[test]
    fn insertion_after_context_line() {
        let dir = tree(&[("old/f", "a\n"), ("new/f", "a\nfoo\n")]);
        let diff = Diff::parse("--- old/f\n+++ new/f\n@@ -1 +1,2 @@\n a\n+foo\n").unwrap();

        let fine = split_all(&diff, &FileContextProvider::new(dir.path())).unwrap();

        assert_eq!(fine.files.len(), 1);
        assert_eq!(locations(&fine), vec![HunkLocation::new(2, 2)]);
        assert_eq!(
            fine.to_string(),
            "--- old/f\n+++ new/f\n@@ -2 +2,2 @@\n a\n+foo\n"
        );
    }

    #[test]
    fn every_change_gets_its_own_file_diff() {
        let dir = tree(&[
            ("old/f", "one\ntwo\nthree\nfour\nfive\n"),
            ("new/f", "one\nTWO\nthree\nfour\nFIVE\n"),
        ]);
        let diff = Diff::parse(
            "--- old/f\n+++ new/f\n@@ -1,5 +1,5 @@\n one\n-two\n+TWO\n three\n four\n-five\n+FIVE\n",
        )
        .unwrap();

        let fine = split_all(&diff, &FileContextProvider::new(dir.path())).unwrap();

        assert_eq!(fine.files.len(), 4);
        for file in &fine.files {
            assert_eq!(file.header, diff.files[0].header);
            assert_eq!(file.hunks.len(), 1);
            assert_eq!(file.hunks[0].changes().count(), 1);
        }
        // Leading context from the new file, trailing context from the old one
        assert_eq!(
            fine.files[0].hunks[0].to_lines(),
            vec![
                "@@ -2,5 +2,4 @@",
                " one",
                "-two",
                " three",
                " four",
                " five",
                NO_NEWLINE_MARKER,
            ]
        );
        assert_eq!(
            fine.files[2].hunks[0].to_lines(),
            vec!["@@ -5,4 +5,3 @@", " TWO", " three", " four", "-five"]
        );
    }

    #[test]
    fn dropped_removal_shifts_later_locations() {
        let diff =
            Diff::parse("--- old/f\n+++ new/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n").unwrap();

        let unfiltered = split_all(&diff, &NoContext).unwrap();
        assert_eq!(
            locations(&unfiltered),
            vec![HunkLocation::new(2, 2), HunkLocation::new(3, 2)]
        );

        let mut filter = DropLines::new([("old/f", 2)]);
        let filtered = split_with(&diff, &mut filter, &NoContext).unwrap();
        assert_eq!(locations(&filtered), vec![HunkLocation::new(2, 1)]);
        assert_eq!(
            filtered.changes(0),
            vec![Change::new("old/f", Line::classify("+B"))]
        );
    }

    #[test]
    fn locations_saturate_at_end_of_range() {
        let diff = Diff::parse(
            "--- old/f\n+++ new/f\n@@ -4294967295,2 +4294967295,2 @@\n a\n-b\n+c\n",
        )
        .unwrap();

        let fine = split_all(&diff, &NoContext).unwrap();
        assert_eq!(
            locations(&fine),
            vec![HunkLocation::new(u32::MAX, u32::MAX); 2]
        );
    }

    #[test]
    fn created_file_gains_offset_after_first_line() {
        let dir = tree(&[("new/created.c", "x\ny\n")]);
        let diff =
            Diff::parse("--- old/created.c\n+++ new/created.c\n@@ -0,0 +1,2 @@\n+x\n+y\n").unwrap();

        let fine = split_all(&diff, &FileContextProvider::new(dir.path())).unwrap();

        assert_eq!(
            locations(&fine),
            vec![HunkLocation::new(0, 1), HunkLocation::new(1, 3)]
        );
        assert_eq!(fine.files[0].hunks[0].lines, vec![Line::classify("+x")]);
        assert_eq!(
            fine.files[1].hunks[0].lines,
            vec![Line::context("x"), Line::classify("+y")]
        );
    }

    #[test]
    fn file_filter_removes_whole_files() {
        let diff = Diff::parse(
            "--- old/a\n+++ new/a\n@@ -1 +1 @@\n-x\n+y\n--- old/b\n+++ new/b\n@@ -1 +1 @@\n-x\n+y\n",
        )
        .unwrap();

        struct OnlyB;
        impl FileFilter for OnlyB {
            fn keep_file(&self, file: &FileDiff) -> bool {
                file.old_file.ends_with("b")
            }
        }

        let fine = split(&diff, &OnlyB, &mut KeepAll, &NoContext).unwrap();
        assert_eq!(fine.files.len(), 2);
        assert!(fine.files.iter().all(|f| f.old_file == Path::new("old/b")));
    }

    #[test]
    fn splitting_twice_gives_the_same_result() {
        let dir = tree(&[
            ("old/f", "1\n2\n3\n4\n5\n6\n"),
            ("new/f", "1\n3\n4\nnew\n5\n6\n"),
        ]);
        let diff = Diff::parse(
            "--- old/f\n+++ new/f\n@@ -1,6 +1,6 @@\n 1\n-2\n 3\n 4\n+new\n 5\n 6\n",
        )
        .unwrap();
        let provider = FileContextProvider::new(dir.path());

        let first = split_with(&diff, &mut DropLines::new([("old/f", 2)]), &provider).unwrap();
        let second = split_with(&diff, &mut DropLines::new([("old/f", 2)]), &provider).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.files.len(), 1);
    }

    #[test]
    fn cached_filter_judges_context_by_earlier_decisions() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tree(&[
            ("version-A/src/f.c", "int a;\nint b;\n"),
            ("version-B/src/f.c", "int a;\nlog();\nint c;\nint b;\n"),
        ]);
        let diff = Diff::parse(
            "--- version-A/src/f.c\n+++ version-B/src/f.c\n@@ -1,2 +1,4 @@\n int a;\n+log();\n+int c;\n int b;\n",
        )
        .unwrap();

        let old = Traces::default()
            .file("src/f.c", &[])
            .line("src/f.c", 1, &[])
            .line("src/f.c", 2, &[]);
        let new = Traces::default()
            .file("src/f.c", &[])
            .line("src/f.c", 2, &["DEBUG"])
            .line("src/f.c", 3, &[]);
        let target = Features::of(&[]);
        let provider = FileContextProvider::new(dir.path());
        let filter = PresenceConditionFilter::new(&old, &new, &target, "version-A", "version-B")
            .with_strip(1);

        let mut cached = Cached::new(filter.clone());
        let fine = split_with(&diff, &mut cached, &provider).unwrap();
        assert_eq!(fine.files.len(), 1);
        assert_eq!(
            fine.files[0].hunks[0].to_lines(),
            vec!["@@ -2,2 +3,3 @@", " int a;", "+int c;", " int b;", NO_NEWLINE_MARKER]
        );
        assert_eq!(
            cached.decision(Path::new("version-B/src/f.c"), 2),
            Some(false)
        );

        // Asked directly, line 1 of the new file has no presence condition
        let mut uncached = filter;
        let fine = split_with(&diff, &mut uncached, &provider).unwrap();
        assert_eq!(
            fine.files[0].hunks[0].to_lines(),
            vec!["@@ -2 +3,2 @@", "+int c;", " int b;", NO_NEWLINE_MARKER]
        );
    }
}
