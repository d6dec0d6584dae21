//! Remove the extracted submission and the sources merged into the template.

use std::path::Path;

use tracing::{debug, info};

use autograde_shared::{AutogradeError, Result};

use crate::lab::JavaLab;

/// Delete `<extract_dir>` and the template's merged sources.
///
/// Paths that are already gone are skipped, so running this twice is fine.
pub fn clean_up(lab: &JavaLab) -> Result<()> {
    info!("cleaning up");
    remove_tree(&lab.submission().extract_dir)?;
    remove_tree(&lab.template_sources())
}

fn remove_tree(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AutogradeError::io(path, e)),
    }
}
