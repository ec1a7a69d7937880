use super::classify::{ConditionCounts, classify, violation};
use super::{ClassificationError, OutcomeIoError};
use crate::diff::Diff;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One application of a fine diff with `patch`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchAttempt {
    pub patch: Diff,
    /// Hunks `patch` rejected; empty if everything applied
    pub rejects: Diff,
    /// Old file paths `patch` could not find
    pub skipped_files: BTreeSet<PathBuf>,
}

impl PatchAttempt {
    pub fn new(patch: Diff) -> Self {
        Self {
            patch,
            ..Self::default()
        }
    }

    /// Distinct files the patch touches
    pub fn attempted_files(&self) -> u64 {
        self.patch.files_touched(0).len() as u64
    }

    /// Single-change patches, one per hunk
    pub fn attempted_lines(&self) -> u64 {
        self.patch.hunk_count() as u64
    }

    pub fn failed_files(&self) -> u64 {
        (self.rejects.files_touched(0).len() + self.skipped_files.len()) as u64
    }

    pub fn failed_lines(&self) -> u64 {
        let skipped: usize = self
            .patch
            .files
            .iter()
            .filter(|f| self.skipped_files.contains(&f.old_file))
            .map(|f| f.hunks.len())
            .sum();
        (self.rejects.hunk_count() + skipped) as u64
    }
}

/// Identifies a run in the results file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMetadata {
    pub dataset: String,
    pub run_id: u64,
    pub commit_v0: String,
    pub commit_v1: String,
    pub source_variant: String,
    pub target_variant: String,
}

/// Everything needed to evaluate one source/target pair
#[derive(Debug, Clone, Copy)]
pub struct RunInput<'a> {
    pub metadata: &'a RunMetadata,
    /// The unfiltered fine diff and how applying it went
    pub normal: &'a PatchAttempt,
    /// The filtered fine diff and how applying it went
    pub filtered: &'a PatchAttempt,
    /// Patched target vs. expected target after the unfiltered run, split
    /// into a fine diff
    pub observed_normal: &'a Diff,
    /// The same after the filtered run
    pub observed_filtered: &'a Diff,
    /// The target's own change
    pub expected: &'a Diff,
    pub strip: usize,
}

/// Flat record of one run, stored as one JSON line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchOutcome {
    pub dataset: String,
    #[serde(rename = "runID")]
    pub run_id: u64,
    #[serde(rename = "commitV0")]
    pub commit_v0: String,
    #[serde(rename = "commitV1")]
    pub commit_v1: String,
    pub source_variant: String,
    pub target_variant: String,
    #[serde(rename = "normalAsExpected")]
    pub normal_actual_vs_expected: u64,
    #[serde(rename = "filteredAsExpected")]
    pub filtered_actual_vs_expected: u64,
    pub file_normal: u64,
    pub line_normal: u64,
    pub file_success_normal: u64,
    pub line_success_normal: u64,
    pub file_filtered: u64,
    pub line_filtered: u64,
    pub file_success_filtered: u64,
    pub line_success_filtered: u64,
    #[serde(rename = "normalTP")]
    pub normal_tp: u64,
    #[serde(rename = "normalFP")]
    pub normal_fp: u64,
    #[serde(rename = "normalTN")]
    pub normal_tn: u64,
    #[serde(rename = "normalFN")]
    pub normal_fn: u64,
    pub normal_wrong_location: i64,
    #[serde(rename = "filteredTP")]
    pub filtered_tp: u64,
    #[serde(rename = "filteredFP")]
    pub filtered_fp: u64,
    #[serde(rename = "filteredTN")]
    pub filtered_tn: u64,
    #[serde(rename = "filteredFN")]
    pub filtered_fn: u64,
    pub filtered_wrong_location: i64,
}

impl PatchOutcome {
    pub fn normal_counts(&self) -> ConditionCounts {
        ConditionCounts {
            true_positives: self.normal_tp,
            false_positives: self.normal_fp,
            true_negatives: self.normal_tn,
            false_negatives: self.normal_fn,
        }
    }

    pub fn filtered_counts(&self) -> ConditionCounts {
        ConditionCounts {
            true_positives: self.filtered_tp,
            false_positives: self.filtered_fp,
            true_negatives: self.filtered_tn,
            false_negatives: self.filtered_fn,
        }
    }
}

/// Classify the unfiltered and the filtered patch of one run.
///
/// Both passes classify the changes of the unfiltered patch, so their
/// totals must agree. Wrong locations are the negatives `patch` did not
/// report as failures; changes removed by filtering are not counted.
pub fn evaluate_run(input: &RunInput<'_>) -> Result<PatchOutcome, ClassificationError> {
    let normal = input.normal;
    let filtered = input.filtered;

    let line_normal = normal.attempted_lines();
    let line_filtered = filtered.attempted_lines();
    let failed_lines_normal = normal.failed_lines();
    let failed_lines_filtered = filtered.failed_lines();
    log::debug!("{failed_lines_normal} of {line_normal} unfiltered single-change patches failed");
    log::debug!("{failed_lines_filtered} of {line_filtered} filtered single-change patches failed");

    let normal_counts = classify(
        &normal.patch,
        &normal.patch,
        input.observed_normal,
        input.expected,
        input.strip,
    )?
    .counts();
    let filtered_counts = classify(
        &filtered.patch,
        &normal.patch,
        input.observed_filtered,
        input.expected,
        input.strip,
    )?
    .counts();

    if normal_counts.total() != filtered_counts.total() {
        return Err(violation(format!(
            "unfiltered pass classified {} changes, filtered pass {}",
            normal_counts.total(),
            filtered_counts.total()
        )));
    }
    if filtered_counts.total() != line_normal {
        return Err(violation(format!(
            "classified {} changes but the unfiltered patch has {line_normal} single-change patches",
            filtered_counts.total()
        )));
    }

    let normal_wrong_location = signed(normal_counts.true_negatives + normal_counts.false_negatives)
        - signed(failed_lines_normal);
    let filtered_wrong_location =
        signed(filtered_counts.true_negatives + filtered_counts.false_negatives)
            - (signed(line_normal) - signed(line_filtered))
            - signed(failed_lines_filtered);
    for (pass, value) in [
        ("unfiltered", normal_wrong_location),
        ("filtered", filtered_wrong_location),
    ] {
        if value < 0 {
            log::warn!(
                "Negative wrong-location count {value} in {pass} pass of run {}",
                input.metadata.run_id
            );
        }
    }

    let metadata = input.metadata;
    Ok(PatchOutcome {
        dataset: metadata.dataset.clone(),
        run_id: metadata.run_id,
        commit_v0: metadata.commit_v0.clone(),
        commit_v1: metadata.commit_v1.clone(),
        source_variant: metadata.source_variant.clone(),
        target_variant: metadata.target_variant.clone(),
        normal_actual_vs_expected: input.observed_normal.files.len() as u64,
        filtered_actual_vs_expected: input.observed_filtered.files.len() as u64,
        file_normal: normal.attempted_files(),
        line_normal,
        file_success_normal: normal.attempted_files().saturating_sub(normal.failed_files()),
        line_success_normal: line_normal.saturating_sub(failed_lines_normal),
        file_filtered: filtered.attempted_files(),
        line_filtered,
        file_success_filtered: filtered
            .attempted_files()
            .saturating_sub(filtered.failed_files()),
        line_success_filtered: line_filtered.saturating_sub(failed_lines_filtered),
        normal_tp: normal_counts.true_positives,
        normal_fp: normal_counts.false_positives,
        normal_tn: normal_counts.true_negatives,
        normal_fn: normal_counts.false_negatives,
        normal_wrong_location,
        filtered_tp: filtered_counts.true_positives,
        filtered_fp: filtered_counts.false_positives,
        filtered_tn: filtered_counts.true_negatives,
        filtered_fn: filtered_counts.false_negatives,
        filtered_wrong_location,
    })
}

fn signed(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Append one outcome as a JSON line, creating the file if needed
pub fn append_outcome(path: &Path, outcome: &PatchOutcome) -> Result<(), OutcomeIoError> {
    let json_line =
        serde_json::to_string(outcome).map_err(|e| OutcomeIoError::SerializeFailed {
            message: e.to_string(),
        })?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| OutcomeIoError::OpenFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    writeln!(file, "{json_line}").map_err(|e| OutcomeIoError::WriteFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    file.sync_all().map_err(|e| OutcomeIoError::WriteFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Read every outcome of a results file, skipping blank lines
pub fn load_outcomes(path: &Path) -> Result<Vec<PatchOutcome>, OutcomeIoError> {
    let content = fs::read_to_string(path).map_err(|e| OutcomeIoError::OpenFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| OutcomeIoError::InvalidRecord {
                path: path.display().to_string(),
                line_number: index + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

/// `x` of `y` as a percentage with one decimal; 0% if `y` is zero
pub fn percentage(x: u64, y: u64) -> String {
    let value = if y == 0 {
        0.0
    } else {
        100.0 * x as f64 / y as f64
    };
    format!("{value:3.1}%")
}

/// Counters accumulated over many runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub runs: u64,
    pub commit_success_normal: u64,
    pub commit_success_filtered: u64,
    pub file_normal: u64,
    pub file_success_normal: u64,
    pub file_filtered: u64,
    pub file_success_filtered: u64,
    pub line_normal: u64,
    pub line_success_normal: u64,
    pub line_filtered: u64,
    pub line_success_filtered: u64,
    pub normal: ConditionCounts,
    pub filtered: ConditionCounts,
    pub normal_wrong_location: i64,
    pub filtered_wrong_location: i64,
}

impl Summary {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a PatchOutcome>) -> Self {
        let mut summary = Summary::default();
        for outcome in outcomes {
            summary.add(outcome);
        }
        summary
    }

    pub fn add(&mut self, outcome: &PatchOutcome) {
        self.runs += 1;
        // A commit succeeds if every single-change patch applied
        if outcome.line_success_normal == outcome.line_normal {
            self.commit_success_normal += 1;
        }
        if outcome.line_success_filtered == outcome.line_filtered {
            self.commit_success_filtered += 1;
        }

        self.file_normal += outcome.file_normal;
        self.file_success_normal += outcome.file_success_normal;
        self.file_filtered += outcome.file_filtered;
        self.file_success_filtered += outcome.file_success_filtered;
        self.line_normal += outcome.line_normal;
        self.line_success_normal += outcome.line_success_normal;
        self.line_filtered += outcome.line_filtered;
        self.line_success_filtered += outcome.line_success_filtered;

        self.normal += outcome.normal_counts();
        self.filtered += outcome.filtered_counts();
        self.normal_wrong_location += outcome.normal_wrong_location;
        self.filtered_wrong_location += outcome.filtered_wrong_location;
    }
}

const DIVIDER: &str = "++++++++++++++++++++++++++++++++++++++";

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "{DIVIDER}")?;
    writeln!(f, "{title}")?;
    writeln!(f, "{DIVIDER}")
}

fn precision_recall(f: &mut fmt::Formatter<'_>, counts: &ConditionCounts) -> fmt::Result {
    writeln!(f, "TP: {}", counts.true_positives)?;
    writeln!(f, "FP: {}", counts.false_positives)?;
    writeln!(f, "TN: {}", counts.true_negatives)?;
    writeln!(f, "FN: {}", counts.false_negatives)?;
    writeln!(f, "Precision: {:.2}", counts.precision())?;
    writeln!(f, "Recall: {:.2}", counts.recall())?;
    writeln!(f, "F-Measure: {:.2}", counts.f_measure())
}

fn accuracy(f: &mut fmt::Formatter<'_>, name: &str, counts: &ConditionCounts) -> fmt::Result {
    let as_expected = counts.true_positives + counts.true_negatives;
    writeln!(
        f,
        "{name} patching achieved the expected result {as_expected} out of {} times",
        counts.total()
    )?;
    writeln!(f, "Accuracy: {}", percentage(as_expected, counts.total()))?;
    writeln!(f, "Balanced Accuracy: {:.2}", counts.balanced_accuracy())?;
    writeln!(f)
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "Patch Success")?;
        writeln!(
            f,
            "{} of {} commit-sized patch applications succeeded ({})",
            self.commit_success_normal,
            self.runs,
            percentage(self.commit_success_normal, self.runs)
        )?;
        writeln!(
            f,
            "{} of {} file-sized patch applications succeeded ({})",
            self.file_success_normal,
            self.file_normal,
            percentage(self.file_success_normal, self.file_normal)
        )?;
        writeln!(
            f,
            "{} of {} line-sized patch applications succeeded ({})",
            self.line_success_normal,
            self.line_normal,
            percentage(self.line_success_normal, self.line_normal)
        )?;
        writeln!(
            f,
            "{} of {} line-sized patch applications succeeded after filtering ({})",
            self.line_success_filtered,
            self.line_filtered,
            percentage(self.line_success_filtered, self.line_filtered)
        )?;
        writeln!(
            f,
            "Wrong locations: {} without filtering, {} with filtering",
            self.normal_wrong_location, self.filtered_wrong_location
        )?;
        writeln!(f)?;

        section(f, "Without Domain Knowledge")?;
        precision_recall(f, &self.normal)?;
        writeln!(f)?;

        section(f, "With Domain Knowledge")?;
        precision_recall(f, &self.filtered)?;
        writeln!(f)?;

        section(f, "Accuracy")?;
        accuracy(f, "Normal", &self.normal)?;
        accuracy(f, "Filtered", &self.filtered)
    }
}
