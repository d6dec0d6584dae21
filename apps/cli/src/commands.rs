//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use autograde_core::pipeline::{GradeOptions, GradeResult, ProgressReporter, grade_lab};
use autograde_core::tools::ExternalTool;
use autograde_shared::{AppConfig, CaseId, QuestionId, init_config, load_config};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// autograde: build, run and report on a student lab submission.
#[derive(Parser)]
#[command(
    name = "autograde",
    version,
    about = "Build a Java lab submission, run its questions against instructor fixtures, and write a Markdown grading report.",
    long_about = None,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true,
)]
pub(crate) struct Cli {
    /// Submission archive, named <Student>Lab<Name>.zip (ex. RuskLabOne.zip).
    #[arg(required = true)]
    pub archive: Option<PathBuf>,

    /// Configuration file (defaults to ./autograde.toml, then ~/.autograde/autograde.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Leave the extracted submission and merged template sources in place.
    #[arg(long)]
    pub keep: bool,

    /// Open the report with `[tools] open_with` when done.
    #[arg(long)]
    pub open: bool,

    /// Override the per-run timeout, in seconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "autograde=info",
        1 => "autograde=debug",
        _ => "autograde=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match (&cli.command, &cli.archive) {
        (Some(Command::Config { action }), _) => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()).await,
        },
        (None, Some(archive)) => cmd_grade(&cli, archive).await,
        (None, None) => Err(eyre!("no submission archive given")),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_grade(cli: &Cli, archive: &Path) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(secs) = cli.timeout {
        config.execution.timeout_secs = secs;
    }

    let options = GradeOptions {
        archive: archive.to_path_buf(),
        keep: cli.keep,
    };

    info!(
        archive = %archive.display(),
        timeout_secs = config.execution.timeout_secs,
        keep = cli.keep,
        "grading submission"
    );

    let reporter = CliProgress::new();
    let result = match grade_lab(&config, &options, &reporter).await {
        Ok(result) => result,
        Err(e) => {
            reporter.clear();
            return Err(e.into());
        }
    };

    print_summary(&result);

    if cli.open {
        open_report(&config, &result.report_path).await?;
    }

    Ok(())
}

fn print_summary(result: &GradeResult) {
    let student = if result.student.is_empty() {
        "unknown"
    } else {
        &result.student
    };

    println!();
    println!("  Report written!");
    println!("  Lab:       {}", result.lab_name);
    println!("  Student:   {student}");
    println!("  Questions: {}", result.questions);
    println!("  Runs:      {}", result.cases);
    if result.timeouts > 0 {
        println!("  Timeouts:  {}", result.timeouts);
    }
    if result.failures > 0 {
        println!("  Failures:  {}", result.failures);
    }
    println!("  Report:    {}", result.report_path.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

async fn open_report(config: &AppConfig, report: &Path) -> Result<()> {
    let Some(editor) = config.tools.open_with.as_deref() else {
        warn!("--open given but no [tools] open_with is configured");
        return Ok(());
    };

    info!(editor, report = %report.display(), "opening report");
    let out = ExternalTool::new(editor).run_combined([report]).await?;
    if !out.success() {
        return Err(eyre!(
            "{editor} exited with {}: {}",
            out.status,
            out.output.trim()
        ));
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(explicit: Option<&Path>) -> Result<()> {
    let config: AppConfig = load_config(explicit)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn question(&self, question: QuestionId) {
        self.spinner.set_message(format!("Question {question}"));
    }

    fn case(&self, question: QuestionId, case: CaseId) {
        self.spinner
            .set_message(format!("Question {question}, input #{case}"));
    }

    fn done(&self, _result: &GradeResult) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_archive_with_flags() {
        let cli = Cli::try_parse_from([
            "autograde",
            "--keep",
            "--timeout",
            "5",
            "-vv",
            "RuskLabOne.zip",
        ])
        .unwrap();

        assert_eq!(cli.archive, Some(PathBuf::from("RuskLabOne.zip")));
        assert!(cli.keep);
        assert!(!cli.open);
        assert_eq!(cli.timeout, Some(5));
        assert_eq!(cli.verbose, 2);
        assert!(cli.command.is_none());
    }

    #[test]
    fn config_subcommand_needs_no_archive() {
        let cli = Cli::try_parse_from(["autograde", "config", "show"]).unwrap();
        assert!(cli.archive.is_none());
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                action: ConfigAction::Show
            })
        ));
    }

    #[test]
    fn archive_is_required_without_subcommand() {
        assert!(Cli::try_parse_from(["autograde"]).is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["autograde", "--timeout", "0", "RuskLabOne.zip"]).is_err());
    }
}
