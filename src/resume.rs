use std::{fs, io, path::PathBuf};
#[cfg(test)]
use std::sync::Mutex;

use tracing::debug;

use crate::{errors::Result, models::TaskId};

/// Single-slot persistence for the most recently tracked task.
pub trait ResumeStore {
    fn read_last(&self) -> Result<Option<TaskId>>;
    fn write_last(&self, task_id: &TaskId) -> Result<()>;
    fn describe(&self) -> String;
}

/// Plain-text marker file holding one task id.
pub struct FileResumeStore {
    path: PathBuf,
}

impl FileResumeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResumeStore for FileResumeStore {
    fn read_last(&self) -> Result<Option<TaskId>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(TaskId::new(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_last(&self, task_id: &TaskId) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, task_id.as_str())?;
        debug!(target: "resume", path = %self.path.display(), %task_id, "resume marker written");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MemoryResumeStore {
    slot: Mutex<Option<TaskId>>,
}

#[cfg(test)]
impl ResumeStore for MemoryResumeStore {
    fn read_last(&self) -> Result<Option<TaskId>> {
        Ok(self.slot.lock().map(|slot| slot.clone()).unwrap_or_default())
    }

    fn write_last(&self, task_id: &TaskId) -> Result<()> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(task_id.clone());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_marker_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResumeStore::new(dir.path().join("last_task_id.txt"));
        assert!(store.read_last().unwrap().is_none());
    }

    #[test]
    fn last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResumeStore::new(dir.path().join("nested/last_task_id.txt"));

        store.write_last(&TaskId::new("first").unwrap()).unwrap();
        store.write_last(&TaskId::new("second").unwrap()).unwrap();

        assert_eq!(store.read_last().unwrap(), TaskId::new("second"));
        let raw = fs::read_to_string(dir.path().join("nested/last_task_id.txt")).unwrap();
        assert_eq!(raw, "second");
    }

    #[test]
    fn blank_marker_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_task_id.txt");
        fs::write(&path, "\n  \n").unwrap();
        assert!(FileResumeStore::new(path).read_last().unwrap().is_none());
    }
}
