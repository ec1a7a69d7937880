use super::ParseError;
use super::hunk::Hunk;
use std::fmt;
use std::path::PathBuf;

const OLD_FILE_MARKER: &str = "---";
const NEW_FILE_MARKER: &str = "+++";
const HUNK_MARKER: &str = "@@";

/// The diff of a single file.
///
/// Paths are kept exactly as `diff` wrote them, i.e. still prefixed with
/// the directories that were compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Everything before the first hunk, including the `---`/`+++` lines
    pub header: Vec<String>,
    pub hunks: Vec<Hunk>,
    pub old_file: PathBuf,
    pub new_file: PathBuf,
}

impl FileDiff {
    /// Parse one file diff block.
    ///
    /// `first_line_number` is the 1-based position of `lines[0]` in the
    /// whole diff; it only feeds error messages.
    pub(crate) fn parse(lines: &[&str], first_line_number: usize) -> Result<Self, ParseError> {
        let first_hunk = lines
            .iter()
            .position(|line| line.starts_with(HUNK_MARKER))
            .unwrap_or(lines.len());
        let header = &lines[..first_hunk];

        let old_file = marker_path(header, OLD_FILE_MARKER).ok_or_else(|| {
            ParseError::MissingFileMarker {
                line_number: first_line_number,
                marker: OLD_FILE_MARKER.to_string(),
            }
        })?;
        let new_file = marker_path(header, NEW_FILE_MARKER).ok_or_else(|| {
            ParseError::MissingFileMarker {
                line_number: first_line_number,
                marker: NEW_FILE_MARKER.to_string(),
            }
        })?;

        // Hunk bodies never start with "@@", so every such line opens a hunk
        let mut starts: Vec<usize> = (first_hunk..lines.len())
            .filter(|&i| lines[i].starts_with(HUNK_MARKER))
            .collect();
        starts.push(lines.len());

        let hunks = starts
            .windows(2)
            .map(|w| Hunk::parse(&lines[w[0]..w[1]], first_line_number + w[0]))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FileDiff {
            header: header.iter().map(|l| l.to_string()).collect(),
            hunks,
            old_file,
            new_file,
        })
    }

    /// A file diff with the same header and paths but only the given hunk
    pub fn with_hunk(&self, hunk: Hunk) -> Self {
        Self {
            header: self.header.clone(),
            hunks: vec![hunk],
            old_file: self.old_file.clone(),
            new_file: self.new_file.clone(),
        }
    }

    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = self.header.clone();
        for hunk in &self.hunks {
            lines.extend(hunk.to_lines());
        }
        lines
    }
}

/// Path from a `--- path<TAB>timestamp` style header line
fn marker_path(header: &[&str], marker: &str) -> Option<PathBuf> {
    header
        .iter()
        .filter(|line| line.starts_with(marker))
        .find_map(|line| line.split_whitespace().nth(1))
        .map(PathBuf::from)
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.header {
            writeln!(f, "{}", line)?;
        }

        for hunk in &self.hunks {
            write!(f, "{}", hunk)?;
        }

        Ok(())
    }
}
