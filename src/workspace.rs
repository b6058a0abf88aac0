use std::fs;
use std::path::{Path, PathBuf};

/// Task-scoped scratch tree holding every derived artifact of one pipeline
/// run: preprocessed copies, trimmed clips and the concat manifest. One task
/// id maps to one in-flight run; two runs sharing an id would race on it.
#[derive(Debug, Clone)]
pub(crate) struct TaskWorkspace {
    task_dir: PathBuf,
}

impl TaskWorkspace {
    pub(crate) fn new(tmp_root: &Path, task_id: &str) -> Self {
        Self {
            task_dir: tmp_root.join(task_id),
        }
    }

    /// Task directory, created on first use.
    pub(crate) fn dir(&self) -> anyhow::Result<&Path> {
        fs::create_dir_all(&self.task_dir)?;
        Ok(&self.task_dir)
    }

    /// Directory for trimmed storyline clips, created on first use.
    pub(crate) fn clips_dir(&self) -> anyhow::Result<PathBuf> {
        let dir = self.task_dir.join("clips");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Removes the whole temp root, all tasks included. Idempotent.
    pub(crate) fn remove_root(tmp_root: &Path) -> anyhow::Result<()> {
        match fs::remove_dir_all(tmp_root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_is_created_lazily() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = TaskWorkspace::new(tmp.path(), "task-1");
        assert!(!tmp.path().join("task-1").exists());
        let dir = ws.dir().unwrap().to_path_buf();
        assert!(dir.is_dir());
        assert_eq!(dir, tmp.path().join("task-1"));
    }

    #[test]
    fn clips_dir_nests_under_task() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = TaskWorkspace::new(tmp.path(), "task-2");
        let clips = ws.clips_dir().unwrap();
        assert!(clips.is_dir());
        assert_eq!(clips, tmp.path().join("task-2").join("clips"));
    }

    #[test]
    fn remove_root_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("scratch");
        let ws = TaskWorkspace::new(&root, "task-3");
        ws.clips_dir().unwrap();
        TaskWorkspace::remove_root(&root).unwrap();
        assert!(!root.exists());
        // absent root must not error
        TaskWorkspace::remove_root(&root).unwrap();
    }
}
