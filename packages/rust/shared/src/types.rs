//! Core domain types: submissions, questions, input cases, fixture names.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AutogradeError, Result};

/// Lab names start at the first `Lab` or `Midterm` in the archive stem.
static LAB_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Lab.*?)$|(Midterm.*?)$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// A student submission, derived purely from the archive path.
///
/// `subs/RuskLabOne.zip` yields:
/// - `extract_dir`: `subs/RuskLabOne`
/// - `lab_name`: `LabOne`
/// - `student`: `Rusk`
/// - `report_stem`: `RuskLabOne`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// The archive path as given on the command line.
    pub archive: PathBuf,
    /// Where the archive is extracted (archive path minus `.zip`).
    /// Never equal to `archive`.
    pub extract_dir: PathBuf,
    /// Lab name, e.g. `LabOne` or `MidtermA`.
    pub lab_name: String,
    /// Everything in the stem before the lab name.
    pub student: String,
    /// Archive file name without `.zip`; names the report file.
    pub report_stem: String,
}

impl Submission {
    /// Parse a submission archive path. Does not touch the filesystem.
    pub fn parse(archive: impl AsRef<Path>) -> Result<Self> {
        let archive = archive.as_ref();
        let file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                AutogradeError::validation(format!(
                    "submission path has no usable file name: {}",
                    archive.display()
                ))
            })?;

        let stem = file_name.strip_suffix(".zip").ok_or_else(|| {
            AutogradeError::validation(format!("submission '{file_name}' is not a .zip archive"))
        })?;

        let lab = LAB_NAME_RE.find(stem).ok_or_else(|| {
            AutogradeError::validation(format!(
                "archive name '{file_name}' must look like <Student>Lab<Name>.zip \
                 or <Student>Midterm<Name>.zip (ex. RuskLabOne.zip)"
            ))
        })?;

        Ok(Self {
            archive: archive.to_path_buf(),
            extract_dir: archive.with_file_name(stem),
            lab_name: lab.as_str().to_string(),
            student: stem[..lab.start()].to_string(),
            report_stem: stem.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Question / case identifiers
// ---------------------------------------------------------------------------

/// 1-based question number (`Question1.java`, `q1/`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuestionId(pub u32);

impl QuestionId {
    pub const FIRST: QuestionId = QuestionId(1);

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Java class name of the question's entry point.
    pub fn class_name(self) -> String {
        format!("Question{}", self.0)
    }
}

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 0-based input case number within a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaseId(pub u32);

impl CaseId {
    pub const FIRST: CaseId = CaseId(0);

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn is_first(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Fixture naming
// ---------------------------------------------------------------------------

/// Per-case fixture files supplied by the instructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureKind {
    /// `qNinM.txt`: text fed to the program's stdin.
    StdinText,
    /// `qNoutM.txt`: expected program output.
    ExpectedOutput,
    /// `qNinM.sh`: script run before the case (e.g. to create input files).
    InputScript,
    /// `qNoutM.sh`: script run after the case (e.g. to show written files).
    OutputScript,
}

impl FixtureKind {
    /// File name for this fixture of the given question and case.
    pub fn file_name(self, question: QuestionId, case: CaseId) -> String {
        match self {
            Self::StdinText => format!("q{question}in{case}.txt"),
            Self::ExpectedOutput => format!("q{question}out{case}.txt"),
            Self::InputScript => format!("q{question}in{case}.sh"),
            Self::OutputScript => format!("q{question}out{case}.sh"),
        }
    }
}

/// File name of a question's rubric (`qNrubric.txt`).
pub fn rubric_file_name(question: QuestionId) -> String {
    format!("q{question}rubric.txt")
}
