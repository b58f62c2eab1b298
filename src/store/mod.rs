mod association_store;
mod auth_key;
mod backend;
mod error;
mod file;
mod memory;
mod nonce_store;
mod openid_store;

use crate::config::StoreMode;

/// Base of every store contract: the capability mode of the instance.
pub trait Store
where
    Self: Send + Sync
{
    fn mode(&self) -> StoreMode;

    /// True for a consumer-only ("dumb") store.
    fn is_dumb(&self) -> bool {
        self.mode() == StoreMode::ConsumerOnly
    }
}

pub use association_store::AssociationStore;
pub use auth_key::AuthKeyManager;
pub use backend::Backend;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use nonce_store::NonceStore;
pub use openid_store::OpenIdStore;
