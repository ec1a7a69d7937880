use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Marker emitted by `diff` after a line that lacks a trailing newline
pub const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// One line of a unified diff, stored verbatim (marker included).
///
/// Equality and hashing only look at the raw text, so an `Added("+x")`
/// parsed from one diff equals the one built from another.
#[derive(Debug, Clone)]
pub enum Line {
    /// `+text`
    Added(String),
    /// `-text`
    Removed(String),
    /// ` text`
    Context(String),
    /// `\ No newline at end of file`
    Meta(String),
}

impl Line {
    /// Classify a raw diff line by its leading character
    pub fn classify(raw: &str) -> Self {
        match raw.chars().next() {
            Some('+') => Line::Added(raw.to_string()),
            Some('-') => Line::Removed(raw.to_string()),
            Some('\\') => Line::Meta(raw.to_string()),
            _ => Line::Context(raw.to_string()),
        }
    }

    /// Context line for a line of file content
    pub fn context(content: &str) -> Self {
        Line::Context(format!(" {content}"))
    }

    /// The "no newline at end of file" marker
    pub fn no_newline() -> Self {
        Line::Meta(NO_NEWLINE_MARKER.to_string())
    }

    /// Raw text as it appears in the diff
    pub fn raw(&self) -> &str {
        match self {
            Line::Added(raw) | Line::Removed(raw) | Line::Context(raw) | Line::Meta(raw) => raw,
        }
    }

    /// Text without the leading marker. Meta lines are returned whole.
    pub fn payload(&self) -> &str {
        match self {
            Line::Meta(raw) => raw,
            other => {
                let raw = other.raw();
                raw.char_indices()
                    .nth(1)
                    .map_or("", |(idx, _)| &raw[idx..])
            }
        }
    }

    pub fn is_change(&self) -> bool {
        matches!(self, Line::Added(_) | Line::Removed(_))
    }

    /// Whether the line occupies a position in the old file
    pub fn in_source(&self) -> bool {
        matches!(self, Line::Removed(_) | Line::Context(_))
    }

    /// Whether the line occupies a position in the new file
    pub fn in_target(&self) -> bool {
        matches!(self, Line::Added(_) | Line::Context(_))
    }

    /// The change that undoes this one. `None` for context and meta lines.
    pub fn opposite(&self) -> Option<Self> {
        match self {
            Line::Added(_) => Some(Line::Removed(format!("-{}", self.payload()))),
            Line::Removed(_) => Some(Line::Added(format!("+{}", self.payload()))),
            Line::Context(_) | Line::Meta(_) => None,
        }
    }
}

impl PartialEq for Line {
    fn eq(&self, other: &Self) -> bool {
        self.raw() == other.raw()
    }
}

impl Eq for Line {}

impl Hash for Line {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw().hash(state);
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw())
    }
}

/// A single added or removed line attributed to a file.
///
/// This is the unit the outcome classifier counts. The path is normalised
/// (leading components stripped) so that changes taken from diffs of
/// different directory pairs compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Change {
    pub file: PathBuf,
    pub line: Line,
}

impl Change {
    pub fn new(file: impl Into<PathBuf>, line: Line) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Swap Added and Removed, keeping path and payload
    pub fn opposite(&self) -> Self {
        Self {
            file: self.file.clone(),
            line: self.line.opposite().unwrap_or_else(|| self.line.clone()),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.line)
    }
}

/// Drop the first `count` components of a path.
///
/// Behaves like `patch --strip`: stripping more components than the path
/// has leaves an empty path.
pub fn strip_components(path: &Path, count: usize) -> PathBuf {
    path.components().skip(count).collect()
}
