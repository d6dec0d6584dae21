//! Filesystem layout of one lab submission and its build template.
//!
//! ```text
//! <extract_dir>/<lab>/<package_dir>/QuestionN.java   student sources
//! <extract_dir>/<lab>/<package_dir>/qN/*.java        per-question helpers
//! <template_root>/<lab>/build.xml                    shared build file
//! <template_root>/<lab>/<package_dir>/               merge target
//! <template_root>/<lab>/dist/<lab>.jar               build output
//! ```

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use autograde_shared::{AutogradeError, LabConfig, QuestionId, Result, Submission};

use crate::runner::QuestionCommand;

/// A submission resolved against the lab layout conventions.
#[derive(Debug, Clone)]
pub struct JavaLab {
    submission: Submission,
    project_dir: PathBuf,
    template_dir: PathBuf,
    package_dir: PathBuf,
    package_name: String,
    security_policy: PathBuf,
}

impl JavaLab {
    /// Resolve `submission` against `config`. Fails when the archive is missing.
    pub fn new(submission: Submission, config: &LabConfig) -> Result<Self> {
        if !submission.archive.is_file() {
            return Err(AutogradeError::validation(format!(
                "submission archive {} does not exist",
                submission.archive.display()
            )));
        }

        info!(policy = %config.security_policy.display(), "loading java security policy");
        if !config.security_policy.is_file() {
            warn!(
                policy = %config.security_policy.display(),
                "security policy file not found; the JVM will refuse to start questions"
            );
        }

        let project_dir = submission.extract_dir.join(&submission.lab_name);
        let template_dir = config.template_root.join(&submission.lab_name);

        Ok(Self {
            submission,
            project_dir,
            template_dir,
            package_dir: config.package_dir.clone(),
            package_name: config.package_name.clone(),
            security_policy: config.security_policy.clone(),
        })
    }

    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    pub fn lab_name(&self) -> &str {
        &self.submission.lab_name
    }

    /// Project root inside the extracted archive.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    /// Student question sources, copied into the template before building.
    pub fn student_sources(&self) -> PathBuf {
        self.project_dir.join(&self.package_dir)
    }

    /// Where student sources land inside the template; removed on cleanup.
    pub fn template_sources(&self) -> PathBuf {
        self.template_dir.join(&self.package_dir)
    }

    pub fn build_file(&self) -> PathBuf {
        self.template_dir.join("build.xml")
    }

    pub fn jar(&self) -> PathBuf {
        self.template_dir
            .join("dist")
            .join(format!("{}.jar", self.submission.lab_name))
    }

    /// `QuestionN.java` in the student's project.
    pub fn question_source(&self, question: QuestionId) -> PathBuf {
        self.student_sources()
            .join(format!("{}.java", question.class_name()))
    }

    /// `qN/` package with the question's helper classes.
    pub fn question_package(&self, question: QuestionId) -> PathBuf {
        self.student_sources().join(format!("q{question}"))
    }

    /// Fully qualified entry point, e.g. `edu.carrollcc.cis132.Question1`.
    pub fn main_class(&self, question: QuestionId) -> String {
        format!("{}.{}", self.package_name, question.class_name())
    }

    /// JVM invocation for a question, under the security manager.
    pub fn question_command(&self, java: &str, question: QuestionId) -> QuestionCommand {
        QuestionCommand::new(
            java,
            vec![
                "-Djava.security.manager".to_string(),
                format!("-Djava.security.policy={}", self.security_policy.display()),
                "-cp".to_string(),
                self.jar().display().to_string(),
                self.main_class(question),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lab_in(dir: &Path) -> JavaLab {
        let archive = dir.join("RuskLabOne.zip");
        std::fs::write(&archive, b"PK").unwrap();
        let config = LabConfig {
            template_root: dir.join("LabTemplate"),
            ..LabConfig::default()
        };
        JavaLab::new(Submission::parse(&archive).unwrap(), &config).unwrap()
    }

    #[test]
    fn missing_archive_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sub = Submission::parse(dir.path().join("GoneLabOne.zip")).unwrap();
        let err = JavaLab::new(sub, &LabConfig::default()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn derives_project_and_template_paths() {
        let dir = tempfile::tempdir().unwrap();
        let lab = lab_in(dir.path());

        assert_eq!(lab.project_dir(), dir.path().join("RuskLabOne/LabOne"));
        assert_eq!(lab.template_dir(), dir.path().join("LabTemplate/LabOne"));
        assert_eq!(
            lab.question_source(QuestionId(2)),
            dir.path()
                .join("RuskLabOne/LabOne/src/edu/carrollcc/cis132/Question2.java")
        );
        assert_eq!(
            lab.question_package(QuestionId(2)),
            dir.path().join("RuskLabOne/LabOne/src/edu/carrollcc/cis132/q2")
        );
        assert_eq!(
            lab.template_sources(),
            dir.path().join("LabTemplate/LabOne/src/edu/carrollcc/cis132")
        );
        assert_eq!(lab.jar(), dir.path().join("LabTemplate/LabOne/dist/LabOne.jar"));
    }

    #[test]
    fn question_command_runs_under_security_manager() {
        let dir = tempfile::tempdir().unwrap();
        let lab = lab_in(dir.path());
        let cmd = lab.question_command("java", QuestionId(3));

        assert_eq!(cmd.program(), "java");
        let args = cmd.args();
        assert_eq!(args[0], "-Djava.security.manager");
        assert_eq!(args[1], "-Djava.security.policy=secpolicy");
        assert_eq!(args[2], "-cp");
        assert!(args[3].ends_with("LabOne.jar"));
        assert_eq!(args[4], "edu.carrollcc.cis132.Question3");
    }
}
