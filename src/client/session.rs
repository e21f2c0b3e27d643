use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const PROCESS_ID_KEY: &str = "processId";
pub const ENHANCED_IMAGE_KEY: &str = "enhancedImage";

/// Key-value storage that carries state from one step of a capture to the next.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&mut self, key: &str) -> Result<(), SessionError>;
}

#[derive(Debug, Default)]
pub struct MemorySession {
    values: HashMap<String, String>,
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        self.values.remove(key);
        Ok(())
    }
}

/// Session persisted as a JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileSession {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileSession {
    /// Open the session at `path`, starting empty if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(SessionError::Json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(SessionError::Io(e)),
        };
        Ok(Self { path, values })
    }

    fn flush(&self) -> Result<(), SessionError> {
        let text = serde_json::to_string_pretty(&self.values).map_err(SessionError::Json)?;
        std::fs::write(&self.path, text).map_err(SessionError::Io)
    }
}

impl SessionStore for FileSession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_session_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut session = FileSession::open(&path).unwrap();
        session.set(PROCESS_ID_KEY, "1700000000000").unwrap();
        session.set(ENHANCED_IMAGE_KEY, "https://replicate.delivery/out.png").unwrap();

        let reopened = FileSession::open(&path).unwrap();
        assert_eq!(reopened.get(PROCESS_ID_KEY).as_deref(), Some("1700000000000"));
        assert_eq!(
            reopened.get(ENHANCED_IMAGE_KEY).as_deref(),
            Some("https://replicate.delivery/out.png")
        );
    }

    #[test]
    fn test_remove_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut session = FileSession::open(&path).unwrap();
        session.set(ENHANCED_IMAGE_KEY, "https://x/out.png").unwrap();
        session.remove(ENHANCED_IMAGE_KEY).unwrap();

        assert!(FileSession::open(&path).unwrap().get(ENHANCED_IMAGE_KEY).is_none());
    }

    #[test]
    fn test_corrupt_session_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(FileSession::open(&path), Err(SessionError::Json(_))));
    }
}
