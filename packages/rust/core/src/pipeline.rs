//! End-to-end grading pipeline: archive → build → run questions → report → cleanup.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};

use autograde_shared::{AppConfig, CaseId, QuestionId, Result, Submission};

use crate::build;
use crate::cleanup::clean_up;
use crate::lab::JavaLab;
use crate::report::{self, GeneratedReport};
use crate::runner::{ProcessRunner, RunLimits};

/// Options for one `grade_lab` run.
#[derive(Debug, Clone)]
pub struct GradeOptions {
    /// Submission archive, e.g. `RuskLabOne.zip`.
    pub archive: PathBuf,
    /// Leave the extracted and merged sources in place.
    pub keep: bool,
}

/// Result of the `grade_lab` pipeline.
#[derive(Debug, Clone)]
pub struct GradeResult {
    pub report_path: PathBuf,
    pub lab_name: String,
    pub student: String,
    pub questions: u32,
    pub cases: u32,
    pub timeouts: u32,
    pub failures: u32,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a question starts.
    fn question(&self, question: QuestionId);
    /// Called before each run of a question.
    fn case(&self, question: QuestionId, case: CaseId);
    /// Called when the pipeline completes.
    fn done(&self, result: &GradeResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn question(&self, _question: QuestionId) {}
    fn case(&self, _question: QuestionId, _case: CaseId) {}
    fn done(&self, _result: &GradeResult) {}
}

/// Grade one submission.
///
/// 1. Unzip, merge into the lab template, build with ant
/// 2. Run each question and write the report
/// 3. Remove extracted and merged files (unless `keep`)
///
/// Cleanup also runs when building or reporting fails; that failure is
/// returned and a cleanup failure on top of it is only logged. After a
/// successful report, a cleanup failure fails the run.
#[instrument(skip_all, fields(archive = %options.archive.display()))]
pub async fn grade_lab(
    config: &AppConfig,
    options: &GradeOptions,
    progress: &dyn ProgressReporter,
) -> Result<GradeResult> {
    let start = Instant::now();

    let submission = Submission::parse(&options.archive)?;
    info!(
        lab = %submission.lab_name,
        student = %submission.student,
        "grading submission"
    );
    let lab = JavaLab::new(submission, &config.lab)?;

    let outcome = build_and_report(&lab, config, progress).await;

    if options.keep {
        info!(dir = %lab.submission().extract_dir.display(), "keeping extracted files");
    } else {
        progress.phase("Cleaning up");
        match (&outcome, clean_up(&lab)) {
            (_, Ok(())) => {}
            (Ok(_), Err(e)) => return Err(e),
            (Err(_), Err(e)) => error!(error = %e, "cleanup failed after an earlier error"),
        }
    }

    let report = outcome?;
    let result = GradeResult {
        report_path: report.path,
        lab_name: lab.lab_name().to_string(),
        student: lab.submission().student.clone(),
        questions: report.stats.questions,
        cases: report.stats.cases,
        timeouts: report.stats.timeouts,
        failures: report.stats.failures,
        elapsed: start.elapsed(),
    };

    if result.timeouts > 0 {
        warn!(timeouts = result.timeouts, "some runs hit the time limit");
    }
    info!(
        report = %result.report_path.display(),
        questions = result.questions,
        cases = result.cases,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "grading complete"
    );

    progress.done(&result);
    Ok(result)
}

async fn build_and_report(
    lab: &JavaLab,
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> Result<GeneratedReport> {
    progress.phase("Building submission");
    build::build(lab, &config.tools).await?;

    progress.phase("Running questions");
    let runner = ProcessRunner::new(RunLimits::from(&config.execution));
    report::run_and_report(lab, config, &runner, progress).await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use autograde_shared::{AutogradeError, LabConfig, ReportConfig, ToolsConfig};

    fn config_in(dir: &std::path::Path, tools: ToolsConfig) -> AppConfig {
        AppConfig {
            lab: LabConfig {
                template_root: dir.join("LabTemplate"),
                fixtures_dir: dir.join("fixtures"),
                ..LabConfig::default()
            },
            tools,
            report: ReportConfig {
                output_dir: dir.join("output"),
            },
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn rejects_badly_named_archive() {
        let dir = tempfile::tempdir().unwrap();
        let options = GradeOptions {
            archive: dir.path().join("homework.zip"),
            keep: false,
        };

        let err = grade_lab(&config_in(dir.path(), ToolsConfig::default()), &options, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, AutogradeError::Validation { .. }));
    }

    #[tokio::test]
    async fn build_failure_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("RuskLabOne.zip");
        std::fs::write(&archive, b"PK").unwrap();
        // Stand-in unzip: extract a project with one question, then ant fails.
        let extract = dir.path().join("RuskLabOne");
        let tools = ToolsConfig {
            unzip: "true".into(),
            ant: "false".into(),
            ..ToolsConfig::default()
        };
        let sources = extract.join("LabOne/src/edu/carrollcc/cis132");
        std::fs::create_dir_all(&sources).unwrap();
        std::fs::write(sources.join("Question1.java"), "class Question1 {}").unwrap();

        let config = config_in(dir.path(), tools);
        let options = GradeOptions {
            archive: archive.clone(),
            keep: false,
        };
        let err = grade_lab(&config, &options, &SilentProgress).await.unwrap_err();

        assert!(matches!(err, AutogradeError::Build { ref step, .. } if step == "ant"));
        assert!(!extract.exists());
        assert!(!dir.path().join("LabTemplate/LabOne/src/edu/carrollcc/cis132").exists());
        assert!(archive.is_file());
    }

    #[tokio::test]
    async fn keep_leaves_extracted_files() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("RuskLabOne.zip");
        std::fs::write(&archive, b"PK").unwrap();
        let sources = dir.path().join("RuskLabOne/LabOne/src/edu/carrollcc/cis132");
        std::fs::create_dir_all(&sources).unwrap();
        std::fs::write(sources.join("Question1.java"), "class Question1 {}").unwrap();
        let tools = ToolsConfig {
            unzip: "true".into(),
            ant: "false".into(),
            ..ToolsConfig::default()
        };

        let options = GradeOptions {
            archive,
            keep: true,
        };
        grade_lab(&config_in(dir.path(), tools), &options, &SilentProgress)
            .await
            .unwrap_err();

        assert!(sources.join("Question1.java").is_file());
    }

    /// Lay out what `unzip` would have extracted for `RuskLabOne.zip`.
    /// Returns the archive path.
    fn extracted_submission(dir: &std::path::Path) -> PathBuf {
        let archive = dir.join("RuskLabOne.zip");
        std::fs::write(&archive, b"PK").unwrap();
        let sources = dir.join("RuskLabOne/LabOne/src/edu/carrollcc/cis132");
        std::fs::create_dir_all(&sources).unwrap();
        std::fs::write(sources.join("Question1.java"), "class Question1 {}").unwrap();
        archive
    }

    /// unzip and ant succeed without doing anything; `sh` rejects the JVM
    /// flags, so every question run fails without stopping the pipeline.
    fn stand_in_tools() -> ToolsConfig {
        ToolsConfig {
            unzip: "true".into(),
            ant: "true".into(),
            java: "sh".into(),
            open_with: None,
        }
    }

    #[tokio::test]
    async fn successful_run_writes_report_then_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let archive = extracted_submission(dir.path());
        let config = config_in(dir.path(), stand_in_tools());
        let options = GradeOptions {
            archive: archive.clone(),
            keep: false,
        };

        let result = grade_lab(&config, &options, &SilentProgress).await.unwrap();

        assert_eq!(result.report_path, dir.path().join("output/RuskLabOne.md"));
        assert_eq!(result.lab_name, "LabOne");
        assert_eq!(result.student, "Rusk");
        assert_eq!(result.questions, 1);
        assert_eq!(result.cases, 1);
        assert_eq!(result.failures, 1);
        assert_eq!(result.timeouts, 0);

        let report = std::fs::read_to_string(&result.report_path).unwrap();
        assert!(report.contains("# Question 1\n"));
        assert!(report.contains("Execution failed."));
        assert!(report.ends_with(" Total Points: TOGRADE\n"));

        assert!(!dir.path().join("RuskLabOne").exists());
        assert!(!dir.path().join("LabTemplate/LabOne/src/edu/carrollcc/cis132").exists());
        assert!(archive.is_file());
    }

    #[tokio::test]
    async fn cleanup_failure_after_report_fails_the_run() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let archive = extracted_submission(dir.path());
        let config = config_in(dir.path(), stand_in_tools());
        let merged = dir.path().join("LabTemplate/LabOne/src/edu/carrollcc/cis132");

        // Swap the merged sources for a plain file mid-run so cleanup cannot
        // remove them as a directory.
        let fixtures = dir.path().join("fixtures");
        std::fs::create_dir_all(&fixtures).unwrap();
        let script = fixtures.join("q1in0.sh");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nrm -rf '{0}' && touch '{0}'\n",
                merged.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let options = GradeOptions {
            archive,
            keep: false,
        };
        let err = grade_lab(&config, &options, &SilentProgress).await.unwrap_err();

        assert!(matches!(err, AutogradeError::Io { ref path, .. } if *path == merged));
        assert!(dir.path().join("output/RuskLabOne.md").is_file());
        assert!(!dir.path().join("RuskLabOne").exists());
    }

    #[tokio::test]
    async fn report_failure_is_returned_after_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let archive = extracted_submission(dir.path());
        let config = config_in(dir.path(), stand_in_tools());
        // A file where the report directory should go.
        std::fs::write(dir.path().join("output"), "not a directory").unwrap();

        let options = GradeOptions {
            archive,
            keep: false,
        };
        let err = grade_lab(&config, &options, &SilentProgress).await.unwrap_err();

        assert!(
            matches!(err, AutogradeError::Io { ref path, .. } if *path == dir.path().join("output"))
        );
        assert!(!dir.path().join("RuskLabOne").exists());
        assert!(!dir.path().join("LabTemplate/LabOne/src/edu/carrollcc/cis132").exists());
    }
}
