use finediff::filter::{Artefact, Cached, PresenceConditionError, PresenceConditionFilter, Variant};
use finediff::outcome::{RunInput, RunMetadata, append_outcome, evaluate_run, load_outcomes};
use finediff::tools::{apply_patch, diff_trees};
use finediff::{Diff, FileContextProvider, split_all, split_with};
use similar_asserts::assert_eq;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const SOURCE_OLD: &str = "#include <stdio.h>

int main() {
    init();
    debug();
    run();
    report();
    return 0;
}
/* end */
/* eof */
";

const SOURCE_NEW: &str = "#include <stdio.h>

int main() {
    init();
    run();
    cleanup();
    report();
    return 0;
}
/* end */
/* eof */
";

/// The target variant is built without DEBUG
const TARGET_OLD: &str = "#include <stdio.h>

int main() {
    init();
    run();
    report();
    return 0;
}
/* end */
/* eof */
";

const TARGET_NEW: &str = "#include <stdio.h>

int main() {
    init();
    run();
    cleanup();
    report();
    return 0;
}
/* end */
/* eof */
";

/// Working directory holding variant trees side by side
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        };
        fixture.write_tree("version-A", SOURCE_OLD);
        fixture.write_tree("version-B", SOURCE_NEW);
        fixture.write_tree("target-A", TARGET_OLD);
        fixture.write_tree("target-B", TARGET_NEW);
        fixture
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a tree holding a single `src/main.c`
    fn write_tree(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name).join("src/main.c");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn write_diff(&self, name: &str, diff: &Diff) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, diff.to_string()).unwrap();
        path
    }

    fn source_diff(&self) -> Diff {
        diff_trees(self.path(), Path::new("version-A"), Path::new("version-B"))
            .expect("Failed to diff source versions")
    }
}

/// `patch` output and reject format differ between implementations
fn gnu_patch_available() -> bool {
    Command::new("patch")
        .arg("--version")
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains("GNU patch"))
        .unwrap_or(false)
}

/// A line's condition is the one feature it needs, if any
#[derive(Default)]
struct Annotations {
    lines: HashMap<(PathBuf, u32), &'static str>,
}

impl Artefact for Annotations {
    type Formula = Option<&'static str>;

    fn presence_condition_of_file(
        &self,
        _path: &Path,
    ) -> Result<Self::Formula, PresenceConditionError> {
        Ok(None)
    }

    fn presence_condition_of_line(
        &self,
        path: &Path,
        line: u32,
    ) -> Result<Self::Formula, PresenceConditionError> {
        Ok(self.lines.get(&(path.to_path_buf(), line)).copied())
    }
}

struct Configuration(HashSet<&'static str>);

impl Variant<Option<&'static str>> for Configuration {
    fn implements(&self, formula: &Option<&'static str>) -> bool {
        formula.is_none_or(|feature| self.0.contains(feature))
    }
}

#[test]
fn diff_of_trees_has_one_hunk() {
    let fixture = Fixture::new();
    let diff = fixture.source_diff();

    assert_eq!(diff.files.len(), 1);
    assert_eq!(diff.hunk_count(), 1);
    assert_eq!(diff.files[0].old_file, Path::new("version-A/src/main.c"));
    assert_eq!(diff.changes(1).len(), 2);

    let same = diff_trees(fixture.path(), Path::new("version-B"), Path::new("target-B")).unwrap();
    assert!(same.is_empty());
}

#[test]
fn fine_diff_reproduces_source_change() {
    if !gnu_patch_available() {
        eprintln!("GNU patch not installed, skipping");
        return;
    }
    let fixture = Fixture::new();
    let provider = FileContextProvider::new(fixture.path());

    let fine = split_all(&fixture.source_diff(), &provider).unwrap();
    assert_eq!(fine.files.len(), 2);
    let patch_file = fixture.write_diff("fine.diff", &fine);

    fixture.write_tree("patched", SOURCE_OLD);
    let report = apply_patch(
        &fixture.path().join("patched"),
        &patch_file,
        &fixture.path().join("fine.rej"),
        1,
    )
    .unwrap();
    assert!(report.rejects.is_empty());
    assert!(report.skipped_files.is_empty());

    let remaining = diff_trees(fixture.path(), Path::new("patched"), Path::new("version-B")).unwrap();
    assert!(remaining.is_empty(), "unexpected difference:\n{remaining}");
}

#[test]
fn filtered_run_avoids_rejects() {
    if !gnu_patch_available() {
        eprintln!("GNU patch not installed, skipping");
        return;
    }
    let _ = env_logger::builder().is_test(true).try_init();
    let fixture = Fixture::new();
    let provider = FileContextProvider::new(fixture.path());
    let source = fixture.source_diff();

    // `debug();` is line 5 of the old version and only exists with DEBUG
    let old_traces = Annotations {
        lines: HashMap::from([((PathBuf::from("src/main.c"), 5), "DEBUG")]),
    };
    let new_traces = Annotations::default();
    let target = Configuration(HashSet::new());
    let mut filter = Cached::new(
        PresenceConditionFilter::new(
            &old_traces,
            &new_traces,
            &target,
            fixture.path().join("version-A"),
            fixture.path().join("version-B"),
        )
        .with_strip(1),
    );

    let normal_patch = split_all(&source, &provider).unwrap();
    let filtered_patch = split_with(&source, &mut filter, &provider).unwrap();
    assert_eq!(normal_patch.hunk_count(), 2);
    assert_eq!(filtered_patch.hunk_count(), 1);

    let mut attempts = Vec::new();
    let mut observed = Vec::new();
    for (name, patch) in [("normal", &normal_patch), ("filtered", &filtered_patch)] {
        let patched = format!("patched-{name}");
        fixture.write_tree(&patched, TARGET_OLD);
        let patch_file = fixture.write_diff(&format!("{name}.diff"), patch);
        let report = apply_patch(
            &fixture.path().join(&patched),
            &patch_file,
            &fixture.path().join(format!("{name}.rej")),
            1,
        )
        .unwrap();
        attempts.push(report.into_attempt(patch.clone()));

        let result = diff_trees(fixture.path(), Path::new(&patched), Path::new("target-B")).unwrap();
        observed.push(split_all(&result, &provider).unwrap());
    }

    // Removing `debug();` cannot apply to a target that never had it
    assert_eq!(attempts[0].failed_lines(), 1);
    assert_eq!(attempts[1].failed_lines(), 0);
    assert!(observed.iter().all(Diff::is_empty));

    let expected = diff_trees(fixture.path(), Path::new("target-A"), Path::new("target-B")).unwrap();
    let metadata = RunMetadata {
        dataset: "demo".into(),
        run_id: 1,
        commit_v0: "v0".into(),
        commit_v1: "v1".into(),
        source_variant: "with-debug".into(),
        target_variant: "without-debug".into(),
    };
    let outcome = evaluate_run(&RunInput {
        metadata: &metadata,
        normal: &attempts[0],
        filtered: &attempts[1],
        observed_normal: &observed[0],
        observed_filtered: &observed[1],
        expected: &expected,
        strip: 1,
    })
    .unwrap();

    assert_eq!(outcome.line_normal, 2);
    assert_eq!(outcome.line_success_normal, 1);
    assert_eq!(outcome.line_filtered, 1);
    assert_eq!(outcome.line_success_filtered, 1);
    assert_eq!(outcome.normal_tp, 1);
    assert_eq!(outcome.normal_tn, 1);
    assert_eq!(outcome.filtered_tp, 1);
    assert_eq!(outcome.filtered_tn, 1);
    assert_eq!(outcome.normal_wrong_location, 0);
    assert_eq!(outcome.filtered_wrong_location, 0);

    let results = fixture.path().join("results.ndjson");
    append_outcome(&results, &outcome).unwrap();
    assert_eq!(load_outcomes(&results).unwrap(), vec![outcome]);
}

#[test]
fn missing_file_is_skipped() {
    if !gnu_patch_available() {
        eprintln!("GNU patch not installed, skipping");
        return;
    }
    let fixture = Fixture::new();
    let provider = FileContextProvider::new(fixture.path());
    let fine = split_all(&fixture.source_diff(), &provider).unwrap();
    let patch_file = fixture.write_diff("fine.diff", &fine);

    // A target without src/main.c
    fs::create_dir_all(fixture.path().join("empty")).unwrap();
    let report = apply_patch(
        &fixture.path().join("empty"),
        &patch_file,
        &fixture.path().join("fine.rej"),
        1,
    )
    .unwrap();

    assert_eq!(
        report.skipped_files.into_iter().collect::<Vec<_>>(),
        vec![PathBuf::from("version-A/src/main.c")]
    );
}
