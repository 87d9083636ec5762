use std::collections::HashMap;
use std::convert::Infallible;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::ports::state::StateStore;
use crate::store::{StoreError, atomic_write};

#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    values: Arc<Mutex<HashMap<String, Value>>>,
}

impl StateStore for MemoryStateStore {
    type Error = Infallible;

    fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        Ok(self.values.lock().expect("state lock").get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), Self::Error> {
        self.values
            .lock()
            .expect("state lock")
            .insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), Self::Error> {
        self.values.lock().expect("state lock").remove(key);
        Ok(())
    }
}

/// A JSON object on disk, rewritten atomically on every change.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn load(&self) -> Result<HashMap<String, Value>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, values: &HashMap<String, Value>) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(values)?;
        atomic_write(&self.path, &contents)?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    type Error = StoreError;

    fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        let _guard = self.lock.lock().expect("state lock");
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), Self::Error> {
        let _guard = self.lock.lock().expect("state lock");
        let mut values = self.load()?;
        values.insert(key.to_string(), value);
        self.save(&values)
    }

    fn clear(&self, key: &str) -> Result<(), Self::Error> {
        let _guard = self.lock.lock().expect("state lock");
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::store::tests::create_temp_dir;
    use serde_json::json;

    #[test]
    fn file_state_store__should_survive_reopen() {
        // Given
        let dir = create_temp_dir("state-reopen");
        let path = dir.join("state.json");
        let store = FileStateStore::new(path.clone());

        // When
        store.set("lastNotifiedEvent", json!({"eventId": "42"})).expect("set");
        let reopened = FileStateStore::new(path);

        // Then
        assert_eq!(
            reopened.get("lastNotifiedEvent").expect("get"),
            Some(json!({"eventId": "42"}))
        );
        reopened.clear("lastNotifiedEvent").expect("clear");
        assert_eq!(store.get("lastNotifiedEvent").expect("get"), None);

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[test]
    fn memory_state_store__should_get_set_clear() {
        let store = MemoryStateStore::default();

        store.set("key", json!(1)).expect("set");
        assert_eq!(store.get("key").expect("get"), Some(json!(1)));
        store.clear("key").expect("clear");
        assert_eq!(store.get("key").expect("get"), None);
    }
}
