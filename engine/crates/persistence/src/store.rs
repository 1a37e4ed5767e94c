use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

/// Everything about a player that outlives a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerRecord {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub hit_points: u32,
    pub experience: u64,
    pub skills: BTreeMap<String, u64>,
    pub quests: BTreeSet<String>,
    pub achievements: BTreeSet<String>,
    pub weapon: Option<String>,
}

/// Player save/load collaborator. Saves are fire-and-forget for the
/// simulation: callers log failures and move on.
pub trait PlayerStore: Send {
    fn load(&self, name: &str) -> Result<Option<PlayerRecord>, PersistenceError>;

    fn save(&mut self, record: &PlayerRecord) -> Result<(), PersistenceError>;
}

/// Store that keeps nothing.
#[derive(Debug, Default)]
pub struct NullStore;

impl PlayerStore for NullStore {
    fn load(&self, _name: &str) -> Result<Option<PlayerRecord>, PersistenceError> {
        Ok(None)
    }

    fn save(&mut self, _record: &PlayerRecord) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// One JSON file per player under `dir`.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(PersistenceError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", name.to_ascii_lowercase())))
    }
}

impl PlayerStore for FileStore {
    fn load(&self, name: &str) -> Result<Option<PlayerRecord>, PersistenceError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn save(&mut self, record: &PlayerRecord) -> Result<(), PersistenceError> {
        let path = self.path_for(&record.name)?;
        std::fs::create_dir_all(&self.dir)?;
        let text = serde_json::to_string_pretty(record)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, text)?;
        std::fs::rename(&tmp_path, &path)?;
        tracing::debug!(player = %record.name, path = %path.display(), "player saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PlayerRecord {
        PlayerRecord {
            name: "Ada".to_string(),
            x: 12,
            y: 40,
            hit_points: 77,
            experience: 1_250,
            skills: BTreeMap::from([("strength".to_string(), 400)]),
            quests: BTreeSet::from(["ancient_door".to_string()]),
            achievements: BTreeSet::new(),
            weapon: Some("bronze_sword".to_string()),
        }
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        assert!(store.load("Ada").unwrap().is_none());

        store.save(&record()).unwrap();
        assert_eq!(store.load("ada").unwrap(), Some(record()));
    }

    #[test]
    fn file_store_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        let mut bad = record();
        bad.name = "../escape".to_string();
        assert!(matches!(
            store.save(&bad),
            Err(PersistenceError::InvalidName(_))
        ));
        assert!(store.load("").is_err());
    }

    #[test]
    fn partial_record_uses_defaults() {
        let parsed: PlayerRecord = serde_json::from_str(r#"{"name":"Bo","x":3}"#).unwrap();
        assert_eq!(parsed.name, "Bo");
        assert_eq!(parsed.x, 3);
        assert_eq!(parsed.hit_points, 0);
        assert!(parsed.weapon.is_none());
    }

    #[test]
    fn null_store_keeps_nothing() {
        let mut store = NullStore;
        store.save(&record()).unwrap();
        assert!(store.load("Ada").unwrap().is_none());
    }
}
