use crate::store::{Store, StoreResult};

/// Registry of single-use tokens guarding against replayed responses.
pub trait NonceStore: Store {
    /// Marks `nonce` as present. Storing it again before use changes nothing.
    fn store_nonce(&self, nonce: &str) -> StoreResult<()>;

    /// Atomically consumes `nonce`. Only the call that finds it present gets
    /// `true`.
    fn use_nonce(&self, nonce: &str) -> StoreResult<bool>;
}
