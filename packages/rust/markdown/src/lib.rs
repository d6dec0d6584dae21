//! Markdown report primitives for grading output.
//!
//! [`ReportWriter`] streams a grading report section by section. All
//! program text (sources, stdin, outputs) is tab-indented so it renders as
//! a code block, and captured output is truncated before it is written.

mod text;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;

use autograde_shared::{AutogradeError, CaseId, QuestionId, Result};

pub use text::{indent, is_blank, truncate_output};

/// Placeholder the grader replaces by hand.
pub const TO_GRADE: &str = "TOGRADE";

// ---------------------------------------------------------------------------
// Report writer
// ---------------------------------------------------------------------------

/// Incremental Markdown report writer.
///
/// Every method appends to the underlying writer; call [`flush`](Self::flush)
/// after each input case so a crash mid-lab still leaves a usable report.
pub struct ReportWriter<W: Write> {
    inner: W,
    /// Used only for error context.
    path: PathBuf,
}

impl ReportWriter<BufWriter<File>> {
    /// Create (or truncate) the report file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| AutogradeError::io(path, e))?;
        debug!(path = %path.display(), "created report file");
        Ok(Self::new(BufWriter::new(file), path))
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn new(inner: W, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
        }
    }

    /// Hidden header naming the submission; does not render in Markdown.
    pub fn header(&mut self, student: &str, lab: &str, generated_at: DateTime<Local>) -> Result<()> {
        let student = if student.is_empty() { "unknown" } else { student };
        self.write(&format!(
            "<!-- student: {student} | lab: {lab} | generated: {} -->\n",
            generated_at.format("%Y-%m-%d %H:%M:%S")
        ))
    }

    pub fn question_heading(&mut self, question: QuestionId) -> Result<()> {
        self.write(&format!("# Question {question}\n"))
    }

    /// `## <file> Source Code` followed by the indented source.
    pub fn source(&mut self, file_name: &str, source: &str) -> Result<()> {
        self.write(&format!("## {file_name} Source Code\n\n{}\n", indent(source)))
    }

    /// Output of the `qNinM.sh` script.
    pub fn input_file(&mut self, case: CaseId, output: &str) -> Result<()> {
        self.write(&format!("\n## Input File #{case}\n{}", indent(output)))
    }

    pub fn stdin_buffer(&mut self, case: CaseId, stdin: &str) -> Result<()> {
        self.write(&format!("\n## Stdin Buffer #{case}\n{}", indent(stdin)))
    }

    pub fn expected_output(&mut self, case: CaseId, expected: &str) -> Result<()> {
        self.write(&format!(
            "\n## Expected Execution Output #{case}\n{}",
            indent(expected)
        ))
    }

    /// Captured program output, truncated to `limit` bytes.
    pub fn actual_output(&mut self, case: CaseId, output: &[u8], limit: usize) -> Result<()> {
        if output.len() > limit {
            debug!(case = case.0, len = output.len(), limit, "truncating program output");
        }
        self.write(&format!(
            "\n## Actual Execution Output #{case}\n{}\n\n\n",
            indent(&truncate_output(output, limit))
        ))
    }

    /// Output of the `qNoutM.sh` script.
    pub fn output_file(&mut self, case: CaseId, output: &str) -> Result<()> {
        self.write(&format!(
            "\n## Output File #{case}\n{}\n\n\n",
            indent(output)
        ))
    }

    /// The question's grading area: the rubric verbatim, or the default
    /// points/feedback placeholders.
    pub fn grading_area(&mut self, rubric: Option<&str>) -> Result<()> {
        match rubric {
            Some(text) => self.write(&format!("{text}\n")),
            None => self.write(&format!(
                "\nPoints: {TO_GRADE}\n\nFeedback: {TO_GRADE}\n\n"
            )),
        }
    }

    pub fn summary(&mut self) -> Result<()> {
        self.write(&format!("\n\n# Summary\n\n Total Points: {TO_GRADE}\n"))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| AutogradeError::io(&self.path, e))
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.inner)
    }

    fn write(&mut self, chunk: &str) -> Result<()> {
        self.inner
            .write_all(chunk.as_bytes())
            .map_err(|e| AutogradeError::io(&self.path, e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
