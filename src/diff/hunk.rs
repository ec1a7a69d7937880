use super::ParseError;
use super::line::Line;
use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::{char, u32 as number},
    combinator::opt,
    sequence::{delimited, preceded},
};
use std::fmt;

/// Where a hunk starts in the old (source) and new (target) file.
///
/// Both are 1-based; a start of 0 only appears for an empty side, e.g. the
/// old side of a hunk that creates a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HunkLocation {
    pub source: u32,
    pub target: u32,
}

impl HunkLocation {
    pub fn new(source: u32, target: u32) -> Self {
        Self { source, target }
    }
}

/// A single hunk of a unified diff: its location plus the context, added,
/// removed and meta lines in diff order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub location: HunkLocation,
    pub lines: Vec<Line>,
    /// Text after the closing `@@`, e.g. a function name emitted by `diff -p`
    pub heading: Option<String>,
    /// A source length of one is written as `-a,1` rather than `-a`
    pub explicit_source_len: bool,
    /// A target length of one is written as `+c,1` rather than `+c`
    pub explicit_target_len: bool,
}

/// The four numbers of a `@@ -a,b +c,d @@` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HunkHeader {
    pub source_start: u32,
    pub source_len: u32,
    pub target_start: u32,
    pub target_len: u32,
    /// Whether the lengths were written out or left implicit
    pub source_len_written: bool,
    pub target_len_written: bool,
}

impl HunkHeader {
    /// Parse a hunk header line, returning the header and any trailing heading
    pub(crate) fn parse(line: &str) -> Option<(Self, &str)> {
        header(line).ok().map(|(rest, header)| (header, rest))
    }
}

/// `start` or `start,len`; an omitted length means one line
fn range(input: &str) -> IResult<&str, (u32, u32, bool)> {
    (number, opt(preceded(char(','), number)))
        .map(|(start, len)| (start, len.unwrap_or(1), len.is_some()))
        .parse(input)
}

fn header(input: &str) -> IResult<&str, HunkHeader> {
    (
        preceded(tag("@@ -"), range),
        delimited(tag(" +"), range, tag(" @@")),
    )
        .map(
            |(
                (source_start, source_len, source_len_written),
                (target_start, target_len, target_len_written),
            )| HunkHeader {
                source_start,
                source_len,
                target_start,
                target_len,
                source_len_written,
                target_len_written,
            },
        )
        .parse(input)
}

/// Tracks how many body lines a hunk header still announces.
///
/// Used while scanning raw diff text so that a removed line such as
/// `--- old comment` inside a hunk body is not taken for a file header.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct BodyCounter {
    source: u32,
    target: u32,
}

impl BodyCounter {
    pub(crate) fn open(header: HunkHeader) -> Self {
        Self {
            source: header.source_len,
            target: header.target_len,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.source > 0 || self.target > 0
    }

    pub(crate) fn consume(&mut self, raw: &str) {
        match Line::classify(raw) {
            Line::Added(_) => self.target = self.target.saturating_sub(1),
            Line::Removed(_) => self.source = self.source.saturating_sub(1),
            Line::Context(_) => {
                self.source = self.source.saturating_sub(1);
                self.target = self.target.saturating_sub(1);
            }
            Line::Meta(_) => {}
        }
    }
}

impl Hunk {
    pub fn new(location: HunkLocation, lines: Vec<Line>) -> Self {
        Self {
            location,
            lines,
            heading: None,
            explicit_source_len: false,
            explicit_target_len: false,
        }
    }

    /// Number of lines the hunk covers in the old file
    pub fn source_len(&self) -> u32 {
        self.lines.iter().filter(|l| l.in_source()).count() as u32
    }

    /// Number of lines the hunk covers in the new file
    pub fn target_len(&self) -> u32 {
        self.lines.iter().filter(|l| l.in_target()).count() as u32
    }

    /// Added and removed lines, in order
    pub fn changes(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter().filter(|l| l.is_change())
    }

    /// Parse a hunk from its header line followed by its body lines.
    ///
    /// `first_line_number` is the 1-based position of the header in the
    /// whole diff and is only used for error reporting.
    pub(crate) fn parse(lines: &[&str], first_line_number: usize) -> Result<Self, ParseError> {
        let Some((raw_header, body)) = lines.split_first() else {
            return Err(ParseError::InvalidHunkHeader {
                line_number: first_line_number,
                line: String::new(),
            });
        };

        let (header, heading) =
            HunkHeader::parse(raw_header).ok_or_else(|| ParseError::InvalidHunkHeader {
                line_number: first_line_number,
                line: raw_header.to_string(),
            })?;

        let hunk = Hunk {
            location: HunkLocation::new(header.source_start, header.target_start),
            lines: body.iter().map(|raw| Line::classify(raw)).collect(),
            heading: (!heading.is_empty()).then(|| heading.to_string()),
            explicit_source_len: header.source_len_written && header.source_len == 1,
            explicit_target_len: header.target_len_written && header.target_len == 1,
        };

        if hunk.source_len() != header.source_len || hunk.target_len() != header.target_len {
            return Err(ParseError::HunkLengthMismatch {
                line_number: first_line_number,
                expected_source: header.source_len,
                actual_source: hunk.source_len(),
                expected_target: header.target_len,
                actual_target: hunk.target_len(),
            });
        }

        Ok(hunk)
    }

    /// Header and body as separate lines, without line terminators
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.lines.len() + 1);
        lines.push(self.header_line());
        lines.extend(self.lines.iter().map(|l| l.raw().to_string()));
        lines
    }

    fn header_line(&self) -> String {
        // Same shape as `diff -u` unless parsed otherwise: a length of one
        // is left implicit
        let old_part = match self.source_len() {
            1 if !self.explicit_source_len => format!("-{}", self.location.source),
            n => format!("-{},{}", self.location.source, n),
        };

        let new_part = match self.target_len() {
            1 if !self.explicit_target_len => format!("+{}", self.location.target),
            n => format!("+{},{}", self.location.target, n),
        };

        format!(
            "@@ {} {} @@{}",
            old_part,
            new_part,
            self.heading.as_deref().unwrap_or("")
        )
    }
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.to_lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
