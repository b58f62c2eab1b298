use crate::store::{Store, StoreResult};

pub trait AuthKeyManager: Store {
    /// `AUTH_KEY_LEN`: the length of every key returned by [`get_auth_key`].
    ///
    /// [`get_auth_key`]: AuthKeyManager::get_auth_key
    fn auth_key_len(&self) -> usize;

    /// Returns the store's persistent secret, creating it on first use. An
    /// existing key is never replaced.
    fn get_auth_key(&self) -> StoreResult<Vec<u8>>;
}
