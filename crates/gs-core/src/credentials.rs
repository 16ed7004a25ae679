use crate::error::StoreError;
use crate::types::ConversationId;
use std::collections::HashMap;
use std::sync::Mutex;

/// Access credentials keyed by conversation. Absence means "not authorized".
pub trait CredentialStore: Send + Sync {
    fn get(&self, id: ConversationId) -> Result<Option<String>, StoreError>;
    fn add(&self, id: ConversationId, token: &str) -> Result<(), StoreError>;
    fn delete(&self, id: ConversationId) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<HashMap<ConversationId, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend {
        message: "credential store lock poisoned".to_string(),
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, id: ConversationId) -> Result<Option<String>, StoreError> {
        let guard = self.inner.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    fn add(&self, id: ConversationId, token: &str) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().map_err(poisoned)?;
        guard.insert(id, token.to_string());
        Ok(())
    }

    fn delete(&self, id: ConversationId) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().map_err(poisoned)?;
        guard.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_get_delete() {
        let store = MemoryCredentialStore::new();
        let id = ConversationId::new(42);
        assert_eq!(store.get(id).unwrap(), None);
        store.add(id, "secret").unwrap();
        assert_eq!(store.get(id).unwrap().as_deref(), Some("secret"));
        store.delete(id).unwrap();
        assert!(store.is_empty());
        store.delete(id).unwrap();
    }
}
