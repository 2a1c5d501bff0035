//! Cart persistence port
//!
//! A [`CartLedger`](crate::CartLedger) is handed a [`CartStore`] at
//! construction and writes through it after every mutation. Two stores ship
//! with the crate: an in-process map and a directory of JSON files.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::value_objects::ProductId;
use crate::Result;

/// Serialized form of one cart line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRecord {
    pub product_id: ProductId,
    #[serde(default)]
    pub name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

pub trait CartStore: Send + Sync {
    /// Saved lines for a session; an unknown session has none.
    fn load(&self, session_id: &str) -> Result<Vec<CartLineRecord>>;
    fn save(&self, session_id: &str, lines: &[CartLineRecord]) -> Result<()>;
    fn remove(&self, session_id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCartStore {
    carts: Mutex<HashMap<String, Vec<CartLineRecord>>>,
}

impl MemoryCartStore {
    pub fn new() -> Self { Self::default() }

    fn carts(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<CartLineRecord>>> {
        self.carts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CartStore for MemoryCartStore {
    fn load(&self, session_id: &str) -> Result<Vec<CartLineRecord>> {
        Ok(self.carts().get(session_id).cloned().unwrap_or_default())
    }

    fn save(&self, session_id: &str, lines: &[CartLineRecord]) -> Result<()> {
        self.carts().insert(session_id.to_string(), lines.to_vec());
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<()> {
        self.carts().remove(session_id);
        Ok(())
    }
}

/// One `<session>.json` file per cart under a directory.
#[derive(Debug, Clone)]
pub struct JsonFileCartStore {
    dir: PathBuf,
}

impl JsonFileCartStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path { &self.dir }

    fn path_for(&self, session_id: &str) -> PathBuf {
        let file: String = session_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl CartStore for JsonFileCartStore {
    fn load(&self, session_id: &str) -> Result<Vec<CartLineRecord>> {
        match std::fs::read(self.path_for(session_id)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, session_id: &str, lines: &[CartLineRecord]) -> Result<()> {
        let path = self.path_for(session_id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(lines)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(session_id)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(id: u64, qty: i64) -> CartLineRecord {
        CartLineRecord { product_id: ProductId::new(id), name: format!("P{id}"), quantity: qty, unit_price: dec!(250.50) }
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryCartStore::new();
        assert!(store.load("s1").unwrap().is_empty());
        store.save("s1", &[record(1, 2)]).unwrap();
        assert_eq!(store.load("s1").unwrap(), vec![record(1, 2)]);
        store.remove("s1").unwrap();
        assert!(store.load("s1").unwrap().is_empty());
    }

    #[test]
    fn test_json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCartStore::open(dir.path()).unwrap();
        store.save("user/42", &[record(1, 2), record(3, 1)]).unwrap();
        assert!(dir.path().join("user_42.json").exists());

        let reopened = JsonFileCartStore::open(dir.path()).unwrap();
        assert_eq!(reopened.load("user/42").unwrap().len(), 2);

        reopened.remove("user/42").unwrap();
        reopened.remove("user/42").unwrap();
        assert!(reopened.load("user/42").unwrap().is_empty());
    }

    #[test]
    fn test_json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let store = JsonFileCartStore::open(dir.path()).unwrap();
        assert!(matches!(store.load("bad"), Err(crate::StoreError::Serialization(_))));
    }
}
