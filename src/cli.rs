//! Command-line interface.
//!
//! `run` drives one preset through the whole pipeline: scan, evaluate, resolve
//! conflicts, preview, confirm, settle `ask` conflicts, execute, summarise.

use crate::candidate::FsProbe;
use crate::config::{ConfigError, Job, LoggingSettings, Preset};
use crate::conflict::ConflictResolver;
use crate::executor::{ExecutionSummary, Executor, ReportError};
use crate::logging::{self, LoggingError};
use crate::output::OutputFormatter;
use crate::plan::Plan;
use crate::prompt::{AssumeYes, DialoguerPrompt, Prompt, PromptError};
use crate::scanner::{ScanError, Scanner};
use clap::{Args, Parser, Subcommand};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("No preset named '{name}' in {}", dir.display())]
    PresetNotFound { name: String, dir: PathBuf },

    #[error("{0} item(s) failed")]
    ItemsFailed(usize),
}

#[derive(Parser, Debug)]
#[command(name = "lootsort")]
#[command(about = "Rule-based file sorting, cleanup and image routing", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log debug events
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List the presets in a directory
    #[command(visible_alias = "ls")]
    List {
        #[arg(long = "presets", value_name = "DIR", default_value = "presets")]
        presets: PathBuf,
    },

    /// Run a preset, given by file path, file stem or name
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(value_name = "PRESET")]
    pub preset: String,

    #[arg(long = "presets", value_name = "DIR", default_value = "presets")]
    pub presets: PathBuf,

    /// Apply changes even if the preset defaults to a dry run
    #[arg(long = "execute", conflicts_with = "dry_run")]
    pub execute: bool,

    /// Only simulate
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Skip the confirmation; `ask` conflicts stay unresolved
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    /// Write a JSON report of the run
    #[arg(long = "report", value_name = "FILE")]
    pub report: Option<PathBuf>,
}

/// How a single run behaves, after flags and preset defaults are merged.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub confirm: bool,
    pub report: Option<PathBuf>,
    pub progress: bool,
}

impl RunOptions {
    pub fn for_job(job: &Job, args: &RunArgs) -> Self {
        let dry_run = if args.execute {
            false
        } else {
            args.dry_run || job.dry_run
        };
        Self {
            dry_run,
            confirm: job.confirm && !args.yes,
            report: args.report.clone(),
            progress: true,
        }
    }
}

/// Resolves `name` as a preset file, or a stem or `meta.name` in `dir`.
pub fn find_preset(name: &str, dir: &Path) -> Result<Preset, CliError> {
    let direct = Path::new(name);
    if direct.is_file() {
        return Ok(Preset::load(direct)?);
    }

    let wanted = name.to_lowercase();
    Preset::discover(dir)?
        .into_iter()
        .find(|preset| {
            preset.meta.name.to_lowercase() == wanted
                || preset.stem().is_some_and(|s| s.to_lowercase() == wanted)
        })
        .ok_or_else(|| CliError::PresetNotFound {
            name: name.to_string(),
            dir: dir.to_path_buf(),
        })
}

/// Runs a compiled job.
///
/// Returns `None` when the user declines at the confirmation gate; nothing
/// has been touched in that case.
pub fn run_job(
    job: &Job,
    options: &RunOptions,
    prompt: &dyn Prompt,
) -> Result<Option<ExecutionSummary>, CliError> {
    OutputFormatter::header(&format!("{} [{}]", job.name, job.mode));
    OutputFormatter::rejected_rules(&job.rejected);

    let candidates = Scanner::new(job.roots.clone())
        .recursive(job.recursive)
        .with_extensions(&job.extensions)
        .scan()?;
    tracing::info!(preset = %job.name, scanned = candidates.len(), "scan complete");

    let probe = FsProbe::new(job.extractor.clone());
    let mut resolver = ConflictResolver::new(job.policy);
    let mut plan = Plan::build(&job.engine, candidates, &probe, &mut resolver);

    let preview = plan.preview(&job.preview);
    OutputFormatter::preview(&plan, &preview);

    let executor = Executor::new(options.dry_run).with_log_success(job.logging.log_success);
    let planned = plan.actionable() + plan.pending();
    if executor.is_dry_run() {
        OutputFormatter::dry_run_notice("No files will be changed.");
    }
    if options.confirm && planned > 0 {
        let question = if executor.is_dry_run() {
            format!("Simulate {planned} operation(s)?")
        } else {
            format!("Apply {planned} operation(s)?")
        };
        if !prompt.confirm(&question, false)? {
            OutputFormatter::warning("Cancelled. No files were changed.");
            tracing::info!(preset = %job.name, "cancelled at confirmation");
            return Ok(None);
        }
    }

    if plan.pending() > 0 {
        let settled = resolver.settle(&mut plan, prompt)?;
        tracing::debug!("settled {} conflict(s)", settled);
    }

    let progress = if options.progress {
        OutputFormatter::create_progress_bar(plan.items().len() as u64)
    } else {
        ProgressBar::hidden()
    };
    let summary = executor.execute(&plan, |_, outcome| {
        if let Some(name) = outcome.source.file_name() {
            progress.set_message(name.to_string_lossy().into_owned());
        }
        progress.inc(1);
    });
    progress.finish_and_clear();

    OutputFormatter::summary_table(&summary);
    if let Some(path) = &options.report {
        summary.write_report(path)?;
        OutputFormatter::success(&format!("Report written to {}", path.display()));
    }

    Ok(Some(summary))
}

/// Entry point for the binary.
pub fn run_cli(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::List { presets } => {
            let quiet = LoggingSettings {
                enabled: false,
                ..LoggingSettings::default()
            };
            logging::init(&quiet, cli.verbose)?;
            let found = Preset::discover(&presets)?;
            OutputFormatter::preset_list(&found);
            Ok(())
        }
        Commands::Run(args) => {
            let preset = find_preset(&args.preset, &args.presets)?;
            if let Some(log_file) = logging::init(&preset.settings.logging, cli.verbose)? {
                OutputFormatter::info(&format!("Logging to {}", log_file.display()));
            }

            let job = preset.compile()?;
            let options = RunOptions::for_job(&job, &args);
            let prompt: Box<dyn Prompt> = if args.yes {
                Box::new(AssumeYes)
            } else {
                Box::new(DialoguerPrompt::default())
            };

            let Some(summary) = run_job(&job, &options, prompt.as_ref())? else {
                return Ok(());
            };
            match summary.failed() {
                0 => {
                    OutputFormatter::success("Done.");
                    Ok(())
                }
                failed => Err(CliError::ItemsFailed(failed)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_preset(dir: &Path, file: &str, name: &str) {
        fs::write(
            dir.join(file),
            format!(
                "meta: {{ name: {name}, mode: sort }}\nsettings: {{ target_directories: /tmp }}\nmove_rules: [{{ pattern: '*', dest: out }}]\n"
            ),
        )
        .unwrap();
    }

    #[test]
    fn test_find_preset_by_stem_name_or_path() {
        let temp = TempDir::new().unwrap();
        write_preset(temp.path(), "downloads.yaml", "My Downloads");

        assert_eq!(find_preset("downloads", temp.path()).unwrap().meta.name, "My Downloads");
        assert_eq!(find_preset("my downloads", temp.path()).unwrap().meta.name, "My Downloads");

        let path = temp.path().join("downloads.yaml");
        let by_path = find_preset(path.to_str().unwrap(), Path::new("/nonexistent")).unwrap();
        assert_eq!(by_path.location.as_deref(), Some(path.as_path()));

        assert!(matches!(
            find_preset("music", temp.path()),
            Err(CliError::PresetNotFound { .. })
        ));
    }

    #[test]
    fn test_run_flags_override_preset_defaults() {
        let temp = TempDir::new().unwrap();
        write_preset(temp.path(), "p.yaml", "p");
        let job = find_preset("p", temp.path()).unwrap().compile().unwrap();
        assert!(job.dry_run);

        let cli = Cli::parse_from(["lootsort", "run", "p", "--execute", "--yes"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let options = RunOptions::for_job(&job, &args);
        assert!(!options.dry_run);
        assert!(!options.confirm);

        let cli = Cli::parse_from(["lootsort", "run", "p"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let options = RunOptions::for_job(&job, &args);
        assert!(options.dry_run);
        assert!(options.confirm);
    }

    #[test]
    fn test_execute_conflicts_with_dry_run() {
        assert!(Cli::try_parse_from(["lootsort", "run", "p", "--execute", "--dry-run"]).is_err());
    }
}
