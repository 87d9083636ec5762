use serde_json::Value;

/// Small key/value store for markers that must survive restarts.
pub trait StateStore: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;

    fn get(&self, key: &str) -> Result<Option<Value>, Self::Error>;
    fn set(&self, key: &str, value: Value) -> Result<(), Self::Error>;
    fn clear(&self, key: &str) -> Result<(), Self::Error>;
}
