//! Instructor-supplied fixtures: stdin text, expected output, helper scripts
//! and rubrics, found by naming convention in one directory.
//!
//! A missing fixture means the feature is absent for that case; lookups
//! never fail.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use autograde_shared::{CaseId, FixtureKind, QuestionId, rubric_file_name};

use crate::tools::ExternalTool;

#[derive(Debug, Clone)]
pub struct Fixtures {
    dir: PathBuf,
}

impl Fixtures {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let dir = if dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            dir
        };
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: FixtureKind, question: QuestionId, case: CaseId) -> PathBuf {
        self.dir.join(kind.file_name(question, case))
    }

    /// Read a text fixture; `None` when absent or unreadable.
    pub fn read(&self, kind: FixtureKind, question: QuestionId, case: CaseId) -> Option<String> {
        read_optional(&self.path(kind, question, case))
    }

    pub fn rubric(&self, question: QuestionId) -> Option<String> {
        read_optional(&self.dir.join(rubric_file_name(question)))
    }

    /// Run a fixture script and return its combined output.
    ///
    /// `None` when the script does not exist or could not be started. A
    /// script that exits non-zero is logged and its output is still returned.
    pub async fn run_script(
        &self,
        kind: FixtureKind,
        question: QuestionId,
        case: CaseId,
    ) -> Option<String> {
        let path = self.path(kind, question, case);
        if !path.is_file() {
            return None;
        }

        debug!(script = %path.display(), "running fixture script");
        match ExternalTool::script(&path)
            .run_combined(Vec::<&str>::new())
            .await
        {
            Ok(out) => Some(out.output),
            Err(e) => {
                warn!(script = %path.display(), error = %e, "fixture script failed to run");
                None
            }
        }
    }
}

fn read_optional(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "fixture unreadable, treating as absent");
            None
        }
    }
}
