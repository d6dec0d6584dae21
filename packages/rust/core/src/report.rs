//! Run every question of a built lab and write the grading report.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, instrument, warn};

use autograde_markdown::{ReportWriter, is_blank};
use autograde_shared::{AppConfig, AutogradeError, CaseId, FixtureKind, QuestionId, Result};

use crate::fixtures::Fixtures;
use crate::lab::JavaLab;
use crate::pipeline::ProgressReporter;
use crate::runner::{QuestionRunner, RunStatus};

/// Counters collected while generating a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub questions: u32,
    pub cases: u32,
    pub timeouts: u32,
    /// Runs that exited non-zero or could not start (timeouts excluded).
    pub failures: u32,
}

/// A finished report on disk.
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub path: PathBuf,
    pub stats: ReportStats,
}

/// `<output_dir>/<report_stem>.md`
pub fn report_path(lab: &JavaLab, config: &AppConfig) -> PathBuf {
    config
        .report
        .output_dir
        .join(format!("{}.md", lab.submission().report_stem))
}

/// Run questions 1, 2, ... until `QuestionN.java` is missing, writing each
/// question's sources, cases and grading area as it goes.
#[instrument(skip_all, fields(lab = %lab.lab_name()))]
pub async fn run_and_report<R: QuestionRunner>(
    lab: &JavaLab,
    config: &AppConfig,
    runner: &R,
    progress: &dyn ProgressReporter,
) -> Result<GeneratedReport> {
    let output_dir = &config.report.output_dir;
    std::fs::create_dir_all(output_dir).map_err(|e| AutogradeError::io(output_dir, e))?;

    let path = report_path(lab, config);
    info!(report = %path.display(), "writing report");

    let mut writer = ReportWriter::create(&path)?;
    let submission = lab.submission();
    writer.header(&submission.student, &submission.lab_name, Local::now())?;

    let fixtures = Fixtures::new(&config.lab.fixtures_dir);
    let mut stats = ReportStats::default();
    let mut question = QuestionId::FIRST;

    while let Some(source) = read_question_source(lab, question)? {
        progress.question(question);
        info!(question = question.0, "grading question");
        stats.questions += 1;

        writer.question_heading(question)?;
        writer.source(&format!("{}.java", question.class_name()), &source)?;
        // A question without a `qN/` package still runs; only its helper list is empty.
        for (name, helper) in helper_sources(&lab.question_package(question)) {
            writer.source(&name, &helper)?;
        }

        let command = lab.question_command(&config.tools.java, question);
        let mut case = CaseId::FIRST;
        loop {
            if let Some(out) = fixtures
                .run_script(FixtureKind::InputScript, question, case)
                .await
                && !is_blank(&out)
            {
                writer.input_file(case, &out)?;
            }

            let stdin = fixtures.read(FixtureKind::StdinText, question, case);
            if stdin.is_none() && !case.is_first() {
                break;
            }

            progress.case(question, case);
            if let Some(text) = &stdin {
                writer.stdin_buffer(case, text)?;
            }

            let outcome = runner.run(&command, stdin.as_deref()).await;
            stats.cases += 1;
            match &outcome.status {
                RunStatus::TimedOut => stats.timeouts += 1,
                status if !status.is_success() => stats.failures += 1,
                _ => {}
            }
            debug!(
                question = question.0,
                case = case.0,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                truncated = outcome.truncated,
                "case finished"
            );

            if let Some(expected) = fixtures.read(FixtureKind::ExpectedOutput, question, case) {
                writer.expected_output(case, &expected)?;
            }
            writer.actual_output(case, &outcome.output, config.execution.output_limit_bytes)?;

            if let Some(out) = fixtures
                .run_script(FixtureKind::OutputScript, question, case)
                .await
                && !is_blank(&out)
            {
                writer.output_file(case, &out)?;
            }

            writer.flush()?;
            case = case.next();
        }

        writer.grading_area(fixtures.rubric(question).as_deref())?;
        writer.flush()?;
        question = question.next();
    }

    if stats.questions == 0 {
        warn!(
            expected = %lab.question_source(QuestionId::FIRST).display(),
            "no questions found in submission"
        );
    }

    writer.summary()?;
    writer.into_inner()?;

    Ok(GeneratedReport { path, stats })
}

/// `None` once the question's source file does not exist.
fn read_question_source(lab: &JavaLab, question: QuestionId) -> Result<Option<String>> {
    let path = lab.question_source(question);
    match std::fs::read(&path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AutogradeError::io(path, e)),
    }
}

/// `*.java` files directly in a question package, sorted by name.
/// A missing package yields nothing; unreadable files are skipped.
fn helper_sources(package: &Path) -> Vec<(String, String)> {
    let entries = match std::fs::read_dir(package) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "java"))
        .collect();
    files.sort();

    files
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            match std::fs::read(&path) {
                Ok(bytes) => Some((name, String::from_utf8_lossy(&bytes).into_owned())),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable source");
                    None
                }
            }
        })
        .collect()
}
