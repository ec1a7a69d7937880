//! Thin wrappers around the `diff` and `patch` executables.

use crate::diff::{Diff, ParseError};
use crate::outcome::PatchAttempt;
use error_set::error_set;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

error_set! {
    /// Errors from running external tools
    ToolError := {
        #[display("Failed to run {program}: {message}")]
        SpawnFailed { program: String, message: String },
        #[display("{program} failed ({status}): {stderr}")]
        ExitError { program: String, status: String, stderr: String },
        #[display("Invalid UTF-8 in {program} output: {message}")]
        InvalidUtf8 { program: String, message: String },
        #[display("Failed to access {path}: {message}")]
        FileAccess { path: String, message: String },
        ParseError(ParseError),
    }
}

/// What `patch` left behind after applying a diff
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Contents of the rejects file; empty if nothing was rejected
    pub rejects: Diff,
    /// Files named in the patch that did not exist in the target
    pub skipped_files: BTreeSet<PathBuf>,
}

impl PatchReport {
    pub fn into_attempt(self, patch: Diff) -> PatchAttempt {
        PatchAttempt {
            patch,
            rejects: self.rejects,
            skipped_files: self.skipped_files,
        }
    }
}

/// Diff two directory trees below `cwd` with `diff -N -a -u -r`.
///
/// `old` and `new` are passed as given, so they end up verbatim in the
/// file headers of the result.
pub fn diff_trees(cwd: &Path, old: &Path, new: &Path) -> Result<Diff, ToolError> {
    let output = run(
        Command::new("diff")
            .args(["-N", "-a", "-u", "-r"])
            .arg(old)
            .arg(new)
            .current_dir(cwd),
        "diff",
    )?;

    // 0: no differences, 1: differences, 2: trouble
    match output.status.code() {
        Some(0 | 1) => {}
        _ => return Err(exit_error("diff", &output)),
    }

    let text = String::from_utf8(output.stdout).map_err(|e| ToolError::InvalidUtf8 {
        program: "diff".to_string(),
        message: e.to_string(),
    })?;
    Ok(Diff::parse(&text)?)
}

/// Apply `patch_file` to the tree at `cwd`.
///
/// Hunks that do not apply go to `rejects_file`, which is removed first
/// so a stale file from an earlier run is never read back. Files the
/// patch names but the tree lacks are skipped and reported. No `.orig`
/// backups are left in the tree.
pub fn apply_patch(
    cwd: &Path,
    patch_file: &Path,
    rejects_file: &Path,
    strip: usize,
) -> Result<PatchReport, ToolError> {
    let patch_file = absolute(patch_file)?;
    let rejects_file = absolute(rejects_file)?;

    if rejects_file.exists() {
        log::debug!("Removing old rejects file {}", rejects_file.display());
        fs::remove_file(&rejects_file).map_err(|e| file_access(&rejects_file, e))?;
    }

    let size = fs::metadata(&patch_file)
        .map_err(|e| file_access(&patch_file, e))?
        .len();
    if size == 0 {
        log::debug!("Empty patch {}, nothing to apply", patch_file.display());
        return Ok(PatchReport::default());
    }

    let output = run(
        Command::new("patch")
            .arg("--forward")
            .arg("--force")
            .arg("--no-backup-if-mismatch")
            .arg(format!("--strip={strip}"))
            .arg(format!("--reject-file={}", rejects_file.display()))
            .arg("-i")
            .arg(&patch_file)
            .current_dir(cwd),
        "patch",
    )?;

    // 1 means some hunks failed, which is reported, not an error
    match output.status.code() {
        Some(0) => {}
        Some(1) => log::debug!("Part of {} did not apply", patch_file.display()),
        _ => return Err(exit_error("patch", &output)),
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        log::debug!("{line}");
    }

    let rejects = if rejects_file.exists() {
        let text = fs::read_to_string(&rejects_file).map_err(|e| file_access(&rejects_file, e))?;
        Diff::parse(&text)?
    } else {
        Diff::default()
    };

    Ok(PatchReport {
        rejects,
        skipped_files: skipped_files(&stdout),
    })
}

/// Old file paths from the `|--- path` lines `patch` prints for files it
/// cannot find
fn skipped_files(output: &str) -> BTreeSet<PathBuf> {
    output
        .lines()
        .filter(|line| line.starts_with("|---"))
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(PathBuf::from)
        .collect()
}

fn run(command: &mut Command, program: &str) -> Result<Output, ToolError> {
    log::debug!("Running {command:?}");
    command.output().map_err(|e| ToolError::SpawnFailed {
        program: program.to_string(),
        message: e.to_string(),
    })
}

fn exit_error(program: &str, output: &Output) -> ToolError {
    ToolError::ExitError {
        program: program.to_string(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ToolError> {
    std::path::absolute(path).map_err(|e| file_access(path, e))
}

fn file_access(path: &Path, e: std::io::Error) -> ToolError {
    ToolError::FileAccess {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn skipped_files_from_patch_output() {
        let output = "\
can't find file to patch at input line 3
Perhaps you used the wrong -p or --strip option?
The text leading up to this was:
--------------------------
|--- version-A/src/gone.c\t2024-01-01 00:00:00
|+++ version-B/src/gone.c\t2024-01-01 00:00:00
--------------------------
No file to patch.  Skipping patch.
1 out of 1 hunk ignored
";
        assert_eq!(
            skipped_files(output),
            BTreeSet::from([PathBuf::from("version-A/src/gone.c")])
        );
        assert!(skipped_files("patching file src/x.c\n").is_empty());
    }

    #[test]
    fn report_becomes_attempt() {
        let report = PatchReport {
            skipped_files: BTreeSet::from([PathBuf::from("a/x")]),
            ..PatchReport::default()
        };
        let patch = Diff::parse("--- a/x\n+++ b/x\n@@ -1 +1 @@\n-1\n+2\n").unwrap();

        let attempt = report.into_attempt(patch);
        assert_eq!(attempt.attempted_lines(), 1);
        assert_eq!(attempt.failed_lines(), 1);
    }
}
