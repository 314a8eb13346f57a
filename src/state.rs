//! Persisted gateway state: one plain-text file per key.
//!
//! Each `set` writes a temporary file next to the target and renames it into
//! place, so a key either holds its new value or its previous one.

use anyhow::{Context, Result};
use regex::Regex;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StateKey {
    DeviceType,
    GatewayNumber,
    ThingName,
    Room,
    Endpoint,
}

impl StateKey {
    pub const ALL: [StateKey; 5] = [
        StateKey::DeviceType,
        StateKey::GatewayNumber,
        StateKey::ThingName,
        StateKey::Room,
        StateKey::Endpoint,
    ];

    /// File name under the state directory; also the name used in messages.
    pub fn name(self) -> &'static str {
        match self {
            StateKey::DeviceType => "device_type",
            StateKey::GatewayNumber => "gateway_number",
            StateKey::ThingName => "thing_name",
            StateKey::Room => "room",
            StateKey::Endpoint => "endpoint",
        }
    }
}

pub trait StateStore {
    fn get(&self, key: StateKey) -> Result<Option<String>>;
    fn set(&self, key: StateKey, value: &str) -> Result<()>;

    /// True once every key holds a value, i.e. the wizard has completed at least once.
    fn exists(&self) -> bool {
        StateKey::ALL
            .iter()
            .all(|&k| matches!(self.get(k), Ok(Some(_))))
    }

    /// Like `get`, but a missing value is a `ConfigurationMissing` error.
    fn require(&self, key: StateKey) -> Result<String> {
        self.get(key)?
            .ok_or_else(|| GatewayError::ConfigurationMissing(key.name()).into())
    }
}

/// The production store, rooted at the layout's state directory.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: StateKey) -> PathBuf {
        self.dir.join(key.name())
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: StateKey) -> Result<Option<String>> {
        let path = self.path(key);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let value = text.trim();
                Ok((!value.is_empty()).then(|| value.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn set(&self, key: StateKey, value: &str) -> Result<()> {
        write_atomic(&self.path(key), &format!("{}\n", value.trim()))?;
        tracing::debug!(key = key.name(), value, "state updated");
        Ok(())
    }
}

/// World-readable so `status`, `show` and `check` work without root.
const FILE_MODE: u32 = 0o644;

/// Replace `path` with `contents` via a same-directory temp file and rename.
/// The result has mode 0644 regardless of the temp file's 0600.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file()
        .set_permissions(std::fs::Permissions::from_mode(FILE_MODE))
        .with_context(|| format!("failed to set mode on {}", tmp.path().display()))?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// First run of ASCII digits in `text`: `306`, `room-306` and `ROOM=room-306` all give 306.
/// Room 0 is not a room; it reads as absent like a value with no digits.
pub fn extract_room(text: &str) -> Option<u32> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let re = DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("static pattern"));
    re.find(text)?.as_str().parse::<u32>().ok().filter(|&n| n > 0)
}

/// The configured room number. Never defaults: no digits means not configured.
pub fn room_number(store: &dyn StateStore) -> Result<u32> {
    store
        .get(StateKey::Room)?
        .as_deref()
        .and_then(extract_room)
        .ok_or_else(|| GatewayError::ConfigurationMissing(StateKey::Room.name()).into())
}

/// Room label in the form the publisher expects (`room-306`).
pub fn room_label(room: u32) -> String {
    format!("room-{}", room)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStateStore;

    #[test]
    fn file_store_round_trips_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state"));
        for key in StateKey::ALL {
            assert_eq!(store.get(key).unwrap(), None);
            let value = format!("value-for-{}", key.name());
            store.set(key, &value).unwrap();
            assert_eq!(store.get(key).unwrap().as_deref(), Some(value.as_str()));
        }
        assert!(store.exists());
    }

    #[test]
    fn set_overwrites_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.set(StateKey::Room, "room-306").unwrap();
        store.set(StateKey::Room, "room-307").unwrap();
        assert_eq!(store.get(StateKey::Room).unwrap().as_deref(), Some("room-307"));

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["room".to_string()]);
    }

    #[test]
    fn written_files_are_world_readable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.set(StateKey::Room, "room-306").unwrap();
        let mode = std::fs::metadata(dir.path().join("room")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);

        let unit = dir.path().join("units").join("aiot-collector.service");
        write_atomic(&unit, "[Unit]\n").unwrap();
        let mode = std::fs::metadata(&unit).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn blank_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("endpoint"), "  \n").unwrap();
        let store = FileStateStore::new(dir.path());
        assert_eq!(store.get(StateKey::Endpoint).unwrap(), None);
        assert!(!store.exists());
    }

    #[test]
    fn room_digits_tolerate_historical_formats() {
        for raw in ["306", "room-306", "ROOM=room-306"] {
            assert_eq!(extract_room(raw), Some(306), "input {:?}", raw);
        }
        assert_eq!(extract_room("room-"), None);
        assert_eq!(extract_room("12-room-34"), Some(12));
    }

    #[test]
    fn room_number_reads_through_store() {
        let store = MemoryStateStore::default();
        store.set(StateKey::Room, "ROOM=room-306").unwrap();
        assert_eq!(room_number(&store).unwrap(), 306);
    }

    #[test]
    fn room_without_digits_is_configuration_missing() {
        let store = MemoryStateStore::default();
        let err = room_number(&store).unwrap_err();
        assert_eq!(GatewayError::missing_key(&err), Some("room"));

        store.set(StateKey::Room, "lobby").unwrap();
        let err = room_number(&store).unwrap_err();
        assert_eq!(GatewayError::missing_key(&err), Some("room"));
    }

    #[test]
    fn room_zero_is_configuration_missing() {
        assert_eq!(extract_room("room-0"), None);
        assert_eq!(extract_room("000"), None);

        let store = MemoryStateStore::default();
        store.set(StateKey::Room, "room-0").unwrap();
        let err = room_number(&store).unwrap_err();
        assert_eq!(GatewayError::missing_key(&err), Some("room"));
    }

    #[test]
    fn require_reports_the_missing_key() {
        let store = MemoryStateStore::default();
        let err = store.require(StateKey::ThingName).unwrap_err();
        assert_eq!(GatewayError::missing_key(&err), Some("thing_name"));
    }
}
