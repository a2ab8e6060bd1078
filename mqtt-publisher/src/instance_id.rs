//! Persistent instance id: a UUIDv7 saved to
//! `<data_dir>/instance_id`, stable across `device_name` changes, used as
//! the HA device identifier.

use std::path::Path;

use thiserror::Error;
use uuid::Uuid;

const FILE_NAME: &str = "instance_id";

#[derive(Debug, Error)]
pub enum InstanceIdError {
    #[error("read instance id file: {0}")]
    Read(std::io::Error),
    #[error("write instance id file: {0}")]
    Write(std::io::Error),
    #[error("instance id file contains invalid UUID: {0}")]
    Parse(#[from] uuid::Error),
}

/// Loads the instance id from `<data_dir>/instance_id`, creating it with a
/// fresh UUIDv7 if absent. Stable across restarts and `device_name` renames.
pub fn load_or_create(data_dir: &Path) -> Result<Uuid, InstanceIdError> {
    let path = data_dir.join(FILE_NAME);

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let trimmed = content.trim();
            Ok(Uuid::parse_str(trimmed)?)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            std::fs::create_dir_all(data_dir).map_err(InstanceIdError::Write)?;
            let id = Uuid::now_v7();
            std::fs::write(&path, id.to_string()).map_err(InstanceIdError::Write)?;
            Ok(id)
        }
        Err(e) => Err(InstanceIdError::Read(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_and_persists_on_first_call() {
        let dir = tempfile::tempdir().unwrap();
        let id = load_or_create(dir.path()).unwrap();
        assert!(dir.path().join(FILE_NAME).exists());

        // shaped 8-4-4-4-12.
        let groups: Vec<&str> = id.to_string().split('-').collect();
        assert_eq!(
            groups.iter().map(|g| g.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
    }

    #[test]
    fn returns_same_id_on_subsequent_calls() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_or_create(dir.path()).unwrap();
        let second = load_or_create(dir.path()).unwrap();
        assert_eq!(first, second);
    }
}
