use super::ParseError;
use super::file::FileDiff;
use super::hunk::{BodyCounter, HunkHeader};
use super::line::{Change, strip_components};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Leading components removed from diff paths before changes are compared.
///
/// `diff -r` run from a work directory writes paths such as
/// `work/version-A/src/main.c`; stripping two leaves `src/main.c`.
pub const DEFAULT_CHANGE_STRIP: usize = 2;

/// A complete unified diff containing changes for multiple files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub files: Vec<FileDiff>,
}

impl Diff {
    pub fn new(files: Vec<FileDiff>) -> Self {
        Self { files }
    }

    /// Parse diff text as written by `diff -u` or `git diff`
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Self::parse_lines(text.lines())
    }

    /// Parse a diff given as individual lines without terminators.
    ///
    /// A file diff starts at every `diff ...` line if the first line is one,
    /// otherwise at every `---` line. Lines inside a hunk body are never
    /// taken as the start of a file diff.
    pub fn parse_lines<I, S>(lines: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let owned: Vec<S> = lines.into_iter().collect();
        let lines: Vec<&str> = owned.iter().map(|l| l.as_ref()).collect();

        let Some(first) = lines.first() else {
            return Ok(Diff::default());
        };

        let delimiter = if first.starts_with("diff") {
            "diff"
        } else if first.starts_with("---") {
            "---"
        } else {
            return Err(ParseError::MalformedDiff {
                line_number: 1,
                line: first.to_string(),
            });
        };

        let mut starts = Vec::new();
        let mut body = BodyCounter::default();
        for (index, line) in lines.iter().enumerate() {
            if body.is_open() {
                body.consume(line);
            } else if line.starts_with("@@") {
                // Invalid headers are reported by the hunk parser
                if let Some((header, _)) = HunkHeader::parse(line) {
                    body = BodyCounter::open(header);
                }
            } else if line.starts_with(delimiter) {
                starts.push(index);
            }
        }
        starts.push(lines.len());

        let files = starts
            .windows(2)
            .map(|w| FileDiff::parse(&lines[w[0]..w[1]], w[0] + 1))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!("Parsed diff with {} file(s)", files.len());
        Ok(Diff { files })
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn hunk_count(&self) -> usize {
        self.files.iter().map(|f| f.hunks.len()).sum()
    }

    /// Every added and removed line, attributed to its old file path with
    /// `strip` leading components removed
    pub fn changes(&self, strip: usize) -> Vec<Change> {
        self.files
            .iter()
            .flat_map(|file| {
                let path = strip_components(&file.old_file, strip);
                file.hunks
                    .iter()
                    .flat_map(|hunk| hunk.changes())
                    .map(move |line| Change::new(path.clone(), line.clone()))
            })
            .collect()
    }

    /// Distinct old file paths that carry at least one hunk
    pub fn files_touched(&self, strip: usize) -> BTreeSet<PathBuf> {
        self.files
            .iter()
            .filter(|f| !f.hunks.is_empty())
            .map(|f| strip_components(&f.old_file, strip))
            .collect()
    }

    pub fn to_lines(&self) -> Vec<String> {
        self.files.iter().flat_map(|f| f.to_lines()).collect()
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file_diff in &self.files {
            write!(f, "{}", file_diff)?;
        }
        Ok(())
    }
}
