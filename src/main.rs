use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use finediff::outcome::{
    PatchAttempt, RunInput, RunMetadata, Summary, append_outcome, classify, evaluate_run,
    load_outcomes,
};
use finediff::tools::{apply_patch, diff_trees};
use finediff::{
    DEFAULT_CHANGE_STRIP, DEFAULT_CONTEXT_SIZE, Diff, FileContextProvider, FineDiffError,
    split_all,
};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "finediff")]
#[command(about = "Split diffs into single-change patches and evaluate how they apply")]
struct Cli {
    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a diff into one patch per changed line
    Split {
        /// Unified diff to split
        #[arg(long, required_unless_present = "old", conflicts_with = "old")]
        diff: Option<PathBuf>,
        /// Old tree to diff, relative to --root
        #[arg(long, requires = "new")]
        old: Option<PathBuf>,
        /// New tree to diff, relative to --root
        #[arg(long, requires = "old")]
        new: Option<PathBuf>,
        /// Directory the paths in the diff are relative to
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Context lines on each side of a change
        #[arg(long, default_value_t = DEFAULT_CONTEXT_SIZE)]
        context: usize,
        /// Write the fine diff here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply a fine diff to a directory and report what failed
    Apply {
        /// Fine diff to apply
        patch: PathBuf,
        /// Directory to patch in place
        target: PathBuf,
        /// Where rejected hunks are written
        #[arg(long, default_value = "rejects.txt")]
        rejects: PathBuf,
        /// Leading path components `patch` strips
        #[arg(long, default_value_t = DEFAULT_CHANGE_STRIP)]
        strip: usize,
    },

    /// Classify the changes of a patch and print the counts as JSON
    Classify {
        /// Patch that was applied
        #[arg(long)]
        patch: PathBuf,
        /// Patch it was derived from (defaults to --patch)
        #[arg(long)]
        unfiltered: Option<PathBuf>,
        /// Diff from the patched target to the expected target
        #[arg(long)]
        observed: PathBuf,
        /// The target's own change
        #[arg(long)]
        expected: PathBuf,
        /// Leading path components ignored when comparing changes
        #[arg(long, default_value_t = DEFAULT_CHANGE_STRIP)]
        strip: usize,
    },

    /// Evaluate an unfiltered and a filtered run and record the outcome
    Evaluate(EvaluateArgs),

    /// Print the summary of a results file
    Summarize {
        /// JSON-lines file written by `evaluate`
        results: PathBuf,
    },

    /// Generate shell completions
    Completions { shell: Shell },

    /// Generate a man page
    Man,
}

#[derive(Args)]
struct EvaluateArgs {
    #[arg(long)]
    dataset: String,
    #[arg(long)]
    run_id: u64,
    #[arg(long)]
    commit_v0: String,
    #[arg(long)]
    commit_v1: String,
    /// Name of the variant the patch was taken from
    #[arg(long)]
    source: String,
    /// Name of the variant the patch was applied to
    #[arg(long)]
    target: String,

    /// Unfiltered fine diff
    #[arg(long)]
    normal_patch: PathBuf,
    /// Rejects of the unfiltered fine diff
    #[arg(long)]
    normal_rejects: Option<PathBuf>,
    /// Files `patch` skipped for the unfiltered fine diff
    #[arg(long)]
    normal_skipped: Vec<PathBuf>,
    /// Patched target vs. expected target after the unfiltered run
    #[arg(long)]
    normal_observed: PathBuf,

    /// Filtered fine diff
    #[arg(long)]
    filtered_patch: PathBuf,
    #[arg(long)]
    filtered_rejects: Option<PathBuf>,
    #[arg(long)]
    filtered_skipped: Vec<PathBuf>,
    #[arg(long)]
    filtered_observed: PathBuf,

    /// The target's own change
    #[arg(long)]
    expected: PathBuf,
    /// Directory the paths in the observed diffs are relative to
    #[arg(long, default_value = ".")]
    root: PathBuf,
    #[arg(long, default_value_t = DEFAULT_CHANGE_STRIP)]
    strip: usize,
    /// Append the outcome to this JSON-lines file
    #[arg(long)]
    results: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Split {
            diff,
            old,
            new,
            root,
            context,
            output,
        } => {
            let original = match (diff, old.zip(new)) {
                (Some(path), _) => read_diff(&path)?,
                (None, Some((old, new))) => diff_trees(&root, &old, &new)?,
                (None, None) => return Err("either --diff or --old and --new is required".into()),
            };
            let provider = FileContextProvider::with_size(&root, context);
            let fine = split_all(&original, &provider)?;
            log::info!(
                "Split {} hunk(s) into {} single-change patch(es)",
                original.hunk_count(),
                fine.hunk_count()
            );
            write_output(output.as_deref(), &fine.to_string())?;
        }
        Commands::Apply {
            patch,
            target,
            rejects,
            strip,
        } => {
            let report = apply_patch(&target, &patch, &rejects, strip)?;
            let attempt = report.into_attempt(read_diff(&patch)?);
            println!(
                "{} of {} single-change patch(es) failed, {} file(s) skipped",
                attempt.failed_lines(),
                attempt.attempted_lines(),
                attempt.skipped_files.len()
            );
        }
        Commands::Classify {
            patch,
            unfiltered,
            observed,
            expected,
            strip,
        } => {
            let evaluated = read_diff(&patch)?;
            let unfiltered = match unfiltered {
                Some(path) => read_diff(&path)?,
                None => evaluated.clone(),
            };
            let table = classify(
                &evaluated,
                &unfiltered,
                &read_diff(&observed)?,
                &read_diff(&expected)?,
                strip,
            )?;
            println!("{}", serde_json::to_string_pretty(&table.counts())?);
        }
        Commands::Evaluate(args) => evaluate(args)?,
        Commands::Summarize { results } => {
            let outcomes = load_outcomes(&results)?;
            log::info!("Read {} outcome(s) from {}", outcomes.len(), results.display());
            print!("{}", Summary::from_outcomes(&outcomes));
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "finediff", &mut io::stdout());
        }
        Commands::Man => {
            clap_mangen::Man::new(Cli::command()).render(&mut io::stdout())?;
        }
    }

    Ok(())
}

fn evaluate(args: EvaluateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let metadata = RunMetadata {
        dataset: args.dataset,
        run_id: args.run_id,
        commit_v0: args.commit_v0,
        commit_v1: args.commit_v1,
        source_variant: args.source,
        target_variant: args.target,
    };
    let normal = attempt(
        &args.normal_patch,
        args.normal_rejects.as_deref(),
        args.normal_skipped,
    )?;
    let filtered = attempt(
        &args.filtered_patch,
        args.filtered_rejects.as_deref(),
        args.filtered_skipped,
    )?;

    // Observed differences are counted per single change
    let provider = FileContextProvider::new(&args.root);
    let observed_normal = split_all(&read_diff(&args.normal_observed)?, &provider)?;
    let observed_filtered = split_all(&read_diff(&args.filtered_observed)?, &provider)?;

    let outcome = evaluate_run(&RunInput {
        metadata: &metadata,
        normal: &normal,
        filtered: &filtered,
        observed_normal: &observed_normal,
        observed_filtered: &observed_filtered,
        expected: &read_diff(&args.expected)?,
        strip: args.strip,
    })?;

    if let Some(results) = &args.results {
        append_outcome(results, &outcome)?;
        log::info!("Appended run {} to {}", outcome.run_id, results.display());
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn attempt(
    patch: &Path,
    rejects: Option<&Path>,
    skipped: Vec<PathBuf>,
) -> Result<PatchAttempt, FineDiffError> {
    Ok(PatchAttempt {
        patch: read_diff(patch)?,
        rejects: match rejects {
            Some(path) if path.exists() => read_diff(path)?,
            _ => Diff::default(),
        },
        skipped_files: skipped.into_iter().collect::<BTreeSet<_>>(),
    })
}

fn read_diff(path: &Path) -> Result<Diff, FineDiffError> {
    let text = fs::read_to_string(path).map_err(|e| FineDiffError::ReadFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(Diff::parse(&text)?)
}

fn write_output(output: Option<&Path>, text: &str) -> Result<(), FineDiffError> {
    match output {
        Some(path) => fs::write(path, text).map_err(|e| FineDiffError::WriteFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
        None => io::stdout()
            .write_all(text.as_bytes())
            .map_err(|e| FineDiffError::WriteFailed {
                path: "stdout".to_string(),
                message: e.to_string(),
            }),
    }
}
