use crate::data::Association;
use crate::store::{Store, StoreResult};

/// Associations keyed by `(server_url, handle)`. Scopes never observe each
/// other's entries.
pub trait AssociationStore: Store {
    /// Inserts or replaces the association stored under its handle.
    fn store_association(&self, server_url: &str, association: &Association) -> StoreResult<()>;

    /// Looks up `handle` in the `server_url` scope. Without a handle (or with
    /// an empty one) the most recently issued association of the scope is
    /// returned, whatever its remaining lifetime.
    fn get_association(&self, server_url: &str, handle: Option<&str>) -> StoreResult<Option<Association>>;

    /// Returns whether an entry was actually removed.
    fn remove_association(&self, server_url: &str, handle: &str) -> StoreResult<bool>;

    /// Drops every association, in every scope, that has expired at `now`
    /// and returns how many were removed. Lookups never do this on their own.
    fn clean_expired_associations(&self, now: u64) -> StoreResult<usize>;
}
