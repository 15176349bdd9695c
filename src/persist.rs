use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::TedError;
use crate::store::TableState;

/// Where the snapshot lives unless overridden on the command line.
pub fn default_state_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde("~/.ted/state.json").into_owned())
}

/// Rehydrates a snapshot. A missing or corrupt file is not an error;
/// the caller falls back to the seed state.
pub fn load(path: &Path) -> Option<TableState> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("No snapshot at {path:?}: {e}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(state) => {
            debug!("Rehydrated snapshot from {path:?}");
            Some(state)
        }
        Err(e) => {
            warn!("Ignoring corrupt snapshot at {path:?}: {e}");
            None
        }
    }
}

/// Serializes the whole store state. Called from the store observer on
/// every change.
pub fn save(state: &TableState, path: &Path) -> Result<(), TedError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(state)?;
    fs::write(path, raw)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Action, CellValue, reduce};

    #[test]
    fn snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = TableState::seed();
        reduce(&mut state, Action::SetSearchQuery("dev".to_string()));
        reduce(
            &mut state,
            Action::UpdateCell {
                row_id: "1".to_string(),
                column_id: "age".to_string(),
                value: CellValue::Int(50),
            },
        );

        save(&state, &path).unwrap();
        let restored = load(&path).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn missing_snapshot_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent.json")).is_none());
    }

    #[test]
    fn corrupt_snapshot_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(load(&path).is_none());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/state.json");
        save(&TableState::seed(), &path).unwrap();
        assert!(path.exists());
    }
}
