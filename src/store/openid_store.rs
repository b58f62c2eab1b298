use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::{StoreConfig, StoreMode};
use crate::data::Association;
use crate::store::{AssociationStore, AuthKeyManager, Backend, NonceStore, Store, StoreError, StoreResult};

/// The composite store: every contract trait over any [`Backend`].
///
/// This is the only place [`StoreMode`] is consulted. In
/// [`StoreMode::ConsumerOnly`] writes of request-side state are skipped,
/// lookups and removals find nothing and every nonce is accepted.
pub struct OpenIdStore<B> {
    backend: B,
    config: StoreConfig,
}

impl<B: Backend> OpenIdStore<B> {
    pub fn new(backend: B, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn check_key_len(&self, key: Vec<u8>, location: &str) -> StoreResult<Vec<u8>> {
        if key.len() != self.config.auth_key_len {
            warn!(expected = self.config.auth_key_len, actual = key.len(), "persisted auth key has the wrong length");
            return Err(StoreError::Corrupted {
                location: location.to_string(),
                reason: format!("auth key is {} bytes, expected {}", key.len(), self.config.auth_key_len),
            });
        }
        Ok(key)
    }
}

impl<B: Backend> Store for OpenIdStore<B> {
    fn mode(&self) -> StoreMode {
        self.config.mode
    }
}

impl<B: Backend> AssociationStore for OpenIdStore<B> {
    fn store_association(&self, server_url: &str, association: &Association) -> StoreResult<()> {
        if self.is_dumb() {
            return Ok(());
        }
        debug!(server_url, handle = association.handle(), issued = association.issued(), "storing association");
        self.backend.put_association(server_url, association)
    }

    fn get_association(&self, server_url: &str, handle: Option<&str>) -> StoreResult<Option<Association>> {
        if self.is_dumb() {
            return Ok(None);
        }
        match handle.filter(|handle| !handle.is_empty()) {
            Some(handle) => self.backend.association(server_url, handle),
            None => {
                // Greatest handle breaks ties on `issued`, independent of listing order.
                let newest = self
                    .backend
                    .associations(server_url)?
                    .into_iter()
                    .max_by(|a, b| a.issued().cmp(&b.issued()).then_with(|| a.handle().cmp(b.handle())));
                Ok(newest)
            }
        }
    }

    fn remove_association(&self, server_url: &str, handle: &str) -> StoreResult<bool> {
        if self.is_dumb() {
            return Ok(false);
        }
        let removed = self.backend.delete_association(server_url, handle)?;
        debug!(server_url, handle, removed, "removing association");
        Ok(removed)
    }

    fn clean_expired_associations(&self, now: u64) -> StoreResult<usize> {
        if self.is_dumb() {
            return Ok(0);
        }
        let removed = self.backend.retain_associations(&|association| association.expires_in(now) > 0)?;
        debug!(removed, now, "cleaned expired associations");
        Ok(removed)
    }
}

impl<B: Backend> NonceStore for OpenIdStore<B> {
    fn store_nonce(&self, nonce: &str) -> StoreResult<()> {
        if self.is_dumb() {
            return Ok(());
        }
        debug!("storing nonce");
        self.backend.put_nonce(nonce)
    }

    fn use_nonce(&self, nonce: &str) -> StoreResult<bool> {
        if self.is_dumb() {
            return Ok(true);
        }
        let present = self.backend.take_nonce(nonce)?;
        debug!(present, "using nonce");
        Ok(present)
    }
}

impl<B: Backend> AuthKeyManager for OpenIdStore<B> {
    fn auth_key_len(&self) -> usize {
        self.config.auth_key_len
    }

    fn get_auth_key(&self) -> StoreResult<Vec<u8>> {
        if let Some(phrase) = &self.config.secret_phrase {
            let digest = Sha256::digest(phrase.as_bytes());
            return Ok(digest[..self.config.auth_key_len].to_vec());
        }

        if let Some(key) = self.backend.auth_key()? {
            return self.check_key_len(key, "auth key");
        }

        let mut candidate = vec![0u8; self.config.auth_key_len];
        getrandom::getrandom(&mut candidate).map_err(|e| StoreError::Randomness(e.to_string()))?;
        let key = self.backend.create_auth_key(&candidate)?;
        if key == candidate {
            info!(len = key.len(), "created auth key");
        }
        self.check_key_len(key, "auth key")
    }
}
