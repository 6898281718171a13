//! Where a run writes its log, screenshots and eye-tracker messages.

use crate::config::Task;
use crate::error::SessionError;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub dir: PathBuf,
    /// Basename shared by every output file, `<subject>_<session>`.
    pub output_str: String,
    pub screenshot_dir: Option<PathBuf>,
}

impl OutputPaths {
    /// Creates `<root>/<output_str>_Logs_<TASK>`. An existing directory is never
    /// reused; the new one gets a timestamp suffix instead.
    pub fn prepare(
        root: impl AsRef<Path>,
        output_str: &str,
        task: Task,
        screenshots: bool,
    ) -> Result<Self, SessionError> {
        let root = root.as_ref();
        create_dir_all(root)?;

        let mut dir = root.join(format!("{output_str}_Logs_{}", task.code()));
        if dir.exists() {
            let renamed = PathBuf::from(format!(
                "{}{}",
                dir.display(),
                Local::now().format("%Y%m%d%H%M%S")
            ));
            warn!(
                existing = %dir.display(),
                renamed = %renamed.display(),
                "output directory already exists, renaming to avoid overwriting"
            );
            dir = renamed;
        }
        create_dir_all(&dir)?;

        let screenshot_dir = if screenshots {
            let path = dir.join(format!("{output_str}_Screenshots"));
            create_dir_all(&path)?;
            Some(path)
        } else {
            None
        };

        info!(dir = %dir.display(), "output directory ready");
        Ok(Self {
            dir,
            output_str: output_str.to_string(),
            screenshot_dir,
        })
    }

    pub fn events_file(&self) -> PathBuf {
        self.dir.join(format!("{}_events.json", self.output_str))
    }

    pub fn eyetracker_file(&self) -> PathBuf {
        self.dir.join(format!("{}_eyetracker.msg", self.output_str))
    }

    /// `<output_str>_Screenshot<suffix>.png`, when screenshots are enabled.
    pub fn screenshot(&self, suffix: &str) -> Option<PathBuf> {
        self.screenshot_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}_Screenshot{suffix}.png", self.output_str)))
    }
}

fn create_dir_all(path: &Path) -> Result<(), SessionError> {
    fs::create_dir_all(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_follows_subject_and_session() {
        let root = tempfile::tempdir().unwrap();
        let paths = OutputPaths::prepare(root.path(), "sub-02_1", Task::RotatingSphere, true).unwrap();
        assert_eq!(paths.dir, root.path().join("sub-02_1_Logs_RS"));
        assert!(paths.dir.is_dir());
        assert_eq!(paths.events_file(), paths.dir.join("sub-02_1_events.json"));
        assert_eq!(
            paths.screenshot("_face"),
            Some(paths.dir.join("sub-02_1_Screenshots/sub-02_1_Screenshot_face.png"))
        );
        assert!(paths.screenshot_dir.as_ref().unwrap().is_dir());
    }

    #[test]
    fn collision_appends_timestamp() {
        let root = tempfile::tempdir().unwrap();
        let first = OutputPaths::prepare(root.path(), "sub-01_1", Task::Rivalry, false).unwrap();
        let second = OutputPaths::prepare(root.path(), "sub-01_1", Task::Rivalry, false).unwrap();
        assert_ne!(first.dir, second.dir);
        let name = second.dir.file_name().unwrap().to_string_lossy().into_owned();
        let suffix = name.strip_prefix("sub-01_1_Logs_BR").unwrap();
        assert_eq!(suffix.len(), 14);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(first.screenshot(""), None);
    }
}
