//! Persistence for OpenID consumers: associations negotiated with remote
//! servers, single-use nonces and a persistent local auth key.
//!
//! [`store::OpenIdStore`] implements the store contracts over a
//! [`store::Backend`]; [`store::FileBackend`] and [`store::MemoryBackend`] ship
//! with the crate.

pub mod config;
pub mod data;
pub mod store;

pub use config::{StoreConfig, StoreMode};
pub use data::Association;
pub use store::{AssociationStore, AuthKeyManager, NonceStore, OpenIdStore, Store, StoreError, StoreResult};
