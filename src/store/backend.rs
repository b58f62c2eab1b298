use crate::data::Association;
use crate::store::StoreResult;

/// Raw persistence primitives of a storage medium.
///
/// Backends store exactly what they are told; mode handling and recency
/// selection live in [`OpenIdStore`](crate::store::OpenIdStore).
pub trait Backend: Send + Sync {
    fn put_association(&self, server_url: &str, association: &Association) -> StoreResult<()>;

    fn association(&self, server_url: &str, handle: &str) -> StoreResult<Option<Association>>;

    /// Every association of the `server_url` scope, in no particular order.
    fn associations(&self, server_url: &str) -> StoreResult<Vec<Association>>;

    fn delete_association(&self, server_url: &str, handle: &str) -> StoreResult<bool>;

    /// Removes, across all scopes, the associations for which `keep` is
    /// false. Returns the number removed.
    fn retain_associations(&self, keep: &dyn Fn(&Association) -> bool) -> StoreResult<usize>;

    fn put_nonce(&self, nonce: &str) -> StoreResult<()>;

    /// Test-and-clear; true for exactly one caller per stored nonce.
    fn take_nonce(&self, nonce: &str) -> StoreResult<bool>;

    fn auth_key(&self) -> StoreResult<Option<Vec<u8>>>;

    /// Persists `candidate` unless a key already exists, and returns the key
    /// that ended up persisted.
    fn create_auth_key(&self, candidate: &[u8]) -> StoreResult<Vec<u8>>;
}
