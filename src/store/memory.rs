//! In-process backend. State lives as long as the value does.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, OnceLock, PoisonError, RwLock};

use crate::data::Association;
use crate::store::{Backend, StoreResult};

#[derive(Default)]
pub struct MemoryBackend {
    /// server URL -> handle -> association
    associations: RwLock<HashMap<String, HashMap<String, Association>>>,
    nonces: Mutex<HashSet<String>>,
    auth_key: OnceLock<Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn association_count(&self) -> usize {
        let table = self.associations.read().unwrap_or_else(PoisonError::into_inner);
        table.values().map(HashMap::len).sum()
    }

    pub fn nonce_count(&self) -> usize {
        self.nonces.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Backend for MemoryBackend {
    fn put_association(&self, server_url: &str, association: &Association) -> StoreResult<()> {
        let mut table = self.associations.write().unwrap_or_else(PoisonError::into_inner);
        table
            .entry(server_url.to_string())
            .or_default()
            .insert(association.handle().to_string(), association.clone());
        Ok(())
    }

    fn association(&self, server_url: &str, handle: &str) -> StoreResult<Option<Association>> {
        let table = self.associations.read().unwrap_or_else(PoisonError::into_inner);
        Ok(table.get(server_url).and_then(|scope| scope.get(handle)).cloned())
    }

    fn associations(&self, server_url: &str) -> StoreResult<Vec<Association>> {
        let table = self.associations.read().unwrap_or_else(PoisonError::into_inner);
        Ok(table
            .get(server_url)
            .map(|scope| scope.values().cloned().collect())
            .unwrap_or_default())
    }

    fn delete_association(&self, server_url: &str, handle: &str) -> StoreResult<bool> {
        let mut table = self.associations.write().unwrap_or_else(PoisonError::into_inner);
        let Some(scope) = table.get_mut(server_url) else {
            return Ok(false);
        };
        let removed = scope.remove(handle).is_some();
        if scope.is_empty() {
            table.remove(server_url);
        }
        Ok(removed)
    }

    fn retain_associations(&self, keep: &dyn Fn(&Association) -> bool) -> StoreResult<usize> {
        let mut table = self.associations.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        for scope in table.values_mut() {
            let before = scope.len();
            scope.retain(|_, association| keep(association));
            removed += before - scope.len();
        }
        table.retain(|_, scope| !scope.is_empty());
        Ok(removed)
    }

    fn put_nonce(&self, nonce: &str) -> StoreResult<()> {
        self.nonces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(nonce.to_string());
        Ok(())
    }

    fn take_nonce(&self, nonce: &str) -> StoreResult<bool> {
        Ok(self.nonces.lock().unwrap_or_else(PoisonError::into_inner).remove(nonce))
    }

    fn auth_key(&self) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.auth_key.get().cloned())
    }

    fn create_auth_key(&self, candidate: &[u8]) -> StoreResult<Vec<u8>> {
        Ok(self.auth_key.get_or_init(|| candidate.to_vec()).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assoc(handle: &str, issued: u64) -> Association {
        Association::new(handle, vec![1u8; 20], issued, 600, "HMAC-SHA1").unwrap()
    }

    #[test]
    fn test_scopes_are_independent() {
        let backend = MemoryBackend::new();
        backend.put_association("http://a/", &assoc("h", 1)).unwrap();
        assert!(backend.association("http://b/", "h").unwrap().is_none());
        assert!(!backend.delete_association("http://b/", "h").unwrap());
        assert_eq!(backend.association_count(), 1);
    }

    #[test]
    fn test_put_replaces() {
        let backend = MemoryBackend::new();
        backend.put_association("u", &assoc("h", 1)).unwrap();
        backend.put_association("u", &assoc("h", 2)).unwrap();
        assert_eq!(backend.associations("u").unwrap(), vec![assoc("h", 2)]);
    }

    #[test]
    fn test_retain() {
        let backend = MemoryBackend::new();
        backend.put_association("u", &assoc("old", 1)).unwrap();
        backend.put_association("u", &assoc("new", 5)).unwrap();
        backend.put_association("v", &assoc("old", 1)).unwrap();
        assert_eq!(backend.retain_associations(&|a| a.issued() > 1).unwrap(), 2);
        assert_eq!(backend.association_count(), 1);
    }

    #[test]
    fn test_take_nonce_once() {
        let backend = MemoryBackend::new();
        backend.put_nonce("n").unwrap();
        backend.put_nonce("n").unwrap();
        assert_eq!(backend.nonce_count(), 1);
        assert!(backend.take_nonce("n").unwrap());
        assert!(!backend.take_nonce("n").unwrap());
    }

    #[test]
    fn test_first_auth_key_wins() {
        let backend = MemoryBackend::new();
        assert!(backend.auth_key().unwrap().is_none());
        assert_eq!(backend.create_auth_key(b"first").unwrap(), b"first");
        assert_eq!(backend.create_auth_key(b"second").unwrap(), b"first");
        assert_eq!(backend.auth_key().unwrap().as_deref(), Some(&b"first"[..]));
    }
}
