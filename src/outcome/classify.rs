use super::ClassificationError;
use crate::diff::{Change, Diff};
use serde::{Deserialize, Serialize};

/// The changes of a patch sorted into the four outcome classes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionTable {
    /// Expected and applied
    pub true_positives: Vec<Change>,
    /// Applied but not expected
    pub false_positives: Vec<Change>,
    /// Neither expected nor applied
    pub true_negatives: Vec<Change>,
    /// Expected but not applied
    pub false_negatives: Vec<Change>,
}

impl ConditionTable {
    pub fn counts(&self) -> ConditionCounts {
        ConditionCounts {
            true_positives: self.true_positives.len() as u64,
            false_positives: self.false_positives.len() as u64,
            true_negatives: self.true_negatives.len() as u64,
            false_negatives: self.false_negatives.len() as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionCounts {
    pub true_positives: u64,
    pub false_positives: u64,
    pub true_negatives: u64,
    pub false_negatives: u64,
}

impl ConditionCounts {
    pub fn total(&self) -> u64 {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f_measure(&self) -> f64 {
        let (precision, recall) = (self.precision(), self.recall());
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    /// Mean of true positive rate and true negative rate
    pub fn balanced_accuracy(&self) -> f64 {
        let tpr = ratio(self.true_positives, self.true_positives + self.false_negatives);
        let tnr = ratio(self.true_negatives, self.true_negatives + self.false_positives);
        (tpr + tnr) / 2.0
    }
}

impl std::ops::AddAssign for ConditionCounts {
    fn add_assign(&mut self, other: Self) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.true_negatives += other.true_negatives;
        self.false_negatives += other.false_negatives;
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Classify the changes of a patch.
///
/// * `evaluated` is the patch that was applied,
/// * `unfiltered` is the patch it was derived from; its changes are the
///   ones being classified,
/// * `observed` is the diff from the patched target to the expected target,
/// * `expected` is the target's own change.
///
/// Paths are compared after dropping `strip` leading components.
pub fn classify(
    evaluated: &Diff,
    unfiltered: &Diff,
    observed: &Diff,
    expected: &Diff,
    strip: usize,
) -> Result<ConditionTable, ClassificationError> {
    classify_changes(
        evaluated.changes(strip),
        unfiltered.changes(strip),
        observed.changes(strip),
        expected.changes(strip),
    )
}

/// Classification over plain change lists.
///
/// All lists are multisets: identical changes from different hunks are
/// each matched and consumed exactly once.
pub fn classify_changes(
    mut evaluated: Vec<Change>,
    mut universe: Vec<Change>,
    observed: Vec<Change>,
    expected: Vec<Change>,
) -> Result<ConditionTable, ClassificationError> {
    let universe_size = universe.len();
    if universe_size < evaluated.len() {
        return Err(violation(format!(
            "patch has {} changes but the unfiltered patch only {}",
            evaluated.len(),
            universe_size
        )));
    }

    // Expected changes the patch could never provide
    let mut unpatchable = Vec::new();
    let mut required = Vec::new();
    let mut pool = universe.clone();
    for change in expected {
        if remove_once(&mut pool, &change) {
            required.push(change);
        } else {
            unpatchable.push(change);
        }
    }

    // Patch changes the target did not make itself
    let mut undesired = Vec::new();
    let mut pool = required.clone();
    for change in &universe {
        if !remove_once(&mut pool, change) {
            undesired.push(change.clone());
        }
    }

    let mut differences = observed;
    for change in &unpatchable {
        remove_once(&mut differences, change);
    }

    let mut table = ConditionTable::default();

    // The reverse of an applied undesired change shows up as a difference
    let mut remaining = Vec::new();
    for difference in differences {
        let opposite = difference.opposite();
        if remove_once(&mut undesired, &opposite) {
            remove_once(&mut evaluated, &opposite);
            remove_once(&mut universe, &opposite);
            table.false_positives.push(opposite);
        } else {
            remaining.push(difference);
        }
    }

    // A required change that still shows up was not applied
    for difference in remaining {
        if remove_once(&mut required, &difference) {
            remove_once(&mut universe, &difference);
            table.false_negatives.push(difference);
        }
    }

    for change in universe {
        if remove_once(&mut required, &change) {
            table.true_positives.push(change);
        } else if undesired.contains(&change) {
            table.true_negatives.push(change);
        }
    }

    let counts = table.counts();
    if counts.total() != universe_size as u64 {
        return Err(violation(format!(
            "classified {} of {} changes ({counts:?})",
            counts.total(),
            universe_size
        )));
    }

    log::debug!("Classified {universe_size} changes: {counts:?}");
    Ok(table)
}

fn remove_once(changes: &mut Vec<Change>, change: &Change) -> bool {
    match changes.iter().position(|c| c == change) {
        Some(index) => {
            changes.remove(index);
            true
        }
        None => false,
    }
}

pub(super) fn violation(message: String) -> ClassificationError {
    log::error!("Classification invariant violated: {message}");
    ClassificationError::InvariantViolation { message }
}
