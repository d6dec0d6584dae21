//! Unzip the submission, merge it into the lab template, and build it with ant.
//!
//! Building inside the template keeps build files identical across students;
//! only the question package is taken from the submission.

use std::ffi::OsStr;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use autograde_shared::{AutogradeError, Result, ToolsConfig};

use crate::lab::JavaLab;
use crate::tools::ExternalTool;

/// Run all three build steps in order. Any failure is fatal.
#[instrument(skip_all, fields(lab = %lab.lab_name()))]
pub async fn build(lab: &JavaLab, tools: &ToolsConfig) -> Result<()> {
    unzip(lab, tools).await?;
    merge_into_template(lab)?;
    ant_build(lab, tools).await
}

/// `unzip -u <archive> -d <extract_dir>`.
///
/// unzip exits with 1 when it only emitted warnings (e.g. a stray
/// `__MACOSX` entry), which still leaves a usable tree.
pub async fn unzip(lab: &JavaLab, tools: &ToolsConfig) -> Result<()> {
    let submission = lab.submission();
    info!(
        archive = %submission.archive.display(),
        dest = %submission.extract_dir.display(),
        "unzipping submission"
    );

    let out = ExternalTool::new(&tools.unzip)
        .run_combined([
            OsStr::new("-u"),
            submission.archive.as_os_str(),
            OsStr::new("-d"),
            submission.extract_dir.as_os_str(),
        ])
        .await?;

    match out.status.code() {
        Some(0) => Ok(()),
        Some(1) => {
            warn!(output = %out.output.trim(), "unzip reported warnings");
            Ok(())
        }
        _ => Err(AutogradeError::build("unzip", out.output)),
    }
}

/// Copy the student's question package over the template's.
/// Returns the number of files copied.
pub fn merge_into_template(lab: &JavaLab) -> Result<usize> {
    let src = lab.student_sources();
    let dst = lab.template_sources();
    info!(from = %src.display(), to = %dst.display(), "copying lab files to template project");

    if !src.is_dir() {
        return Err(AutogradeError::build(
            "merge",
            format!(
                "{} not found; is the archive an exported {} project?",
                src.display(),
                lab.lab_name()
            ),
        ));
    }

    let copied = copy_dir_all(&src, &dst)?;
    debug!(files = copied, "merge complete");
    Ok(copied)
}

/// `ant -f <template>/build.xml`; the build log is attached to the error.
pub async fn ant_build(lab: &JavaLab, tools: &ToolsConfig) -> Result<()> {
    let build_file = lab.build_file();
    info!(build_file = %build_file.display(), "building project");

    let out = ExternalTool::new(&tools.ant)
        .run_combined([OsStr::new("-f"), build_file.as_os_str()])
        .await?;

    if out.success() {
        Ok(())
    } else {
        Err(AutogradeError::build("ant", out.output))
    }
}

/// Recursively copy `src` into `dst`, creating directories and overwriting
/// existing files.
pub(crate) fn copy_dir_all(src: &Path, dst: &Path) -> Result<usize> {
    std::fs::create_dir_all(dst).map_err(|e| AutogradeError::io(dst, e))?;

    let mut copied = 0;
    let entries = std::fs::read_dir(src).map_err(|e| AutogradeError::io(src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| AutogradeError::io(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| AutogradeError::io(&from, e))?;

        if file_type.is_dir() {
            copied += copy_dir_all(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| AutogradeError::io(&from, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autograde_shared::{LabConfig, Submission};

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

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
    fn copy_dir_all_copies_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src.join("A.java"), "a");
        write(&src.join("q1/B.java"), "b");

        let dst = dir.path().join("dst");
        let copied = copy_dir_all(&src, &dst).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(std::fs::read_to_string(dst.join("A.java")).unwrap(), "a");
        assert_eq!(std::fs::read_to_string(dst.join("q1/B.java")).unwrap(), "b");
    }

    #[test]
    fn copy_dir_all_overwrites_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        write(&src.join("Question1.java"), "student");
        write(&dst.join("Question1.java"), "stale");
        write(&dst.join("Keep.java"), "template");

        copy_dir_all(&src, &dst).unwrap();

        assert_eq!(std::fs::read_to_string(dst.join("Question1.java")).unwrap(), "student");
        assert!(dst.join("Keep.java").exists());
    }

    #[test]
    fn merge_places_sources_in_template() {
        let dir = tempfile::tempdir().unwrap();
        let lab = lab_in(dir.path());
        write(&lab.question_source(autograde_shared::QuestionId(1)), "class Question1 {}");

        let copied = merge_into_template(&lab).unwrap();

        assert_eq!(copied, 1);
        assert!(lab.template_sources().join("Question1.java").is_file());
    }

    #[test]
    fn merge_without_sources_is_a_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let lab = lab_in(dir.path());

        let err = merge_into_template(&lab).unwrap_err();
        assert!(matches!(err, AutogradeError::Build { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_build_tool_surfaces_its_output() {
        let dir = tempfile::tempdir().unwrap();
        let lab = lab_in(dir.path());
        // `false` ignores its arguments and exits 1
        let tools = ToolsConfig {
            ant: "false".into(),
            ..ToolsConfig::default()
        };

        let err = ant_build(&lab, &tools).await.unwrap_err();
        assert!(err.to_string().starts_with("ant failed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unzip_warning_exit_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let lab = lab_in(dir.path());
        let tools = ToolsConfig {
            unzip: "false".into(),
            ..ToolsConfig::default()
        };

        unzip(&lab, &tools).await.unwrap();
    }
}
