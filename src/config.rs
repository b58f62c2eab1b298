use serde::Deserialize;

use crate::store::StoreError;

pub const DEFAULT_AUTH_KEY_LEN: usize = 20;

/// Longest key a secret phrase can yield, the SHA-256 output size.
const MAX_DERIVED_KEY_LEN: usize = 32;

/// What a store instance is allowed to do with request-side state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreMode {
    #[default]
    Full,
    /// The "dumb" store: reads and removals see an empty table and every
    /// nonce check passes.
    ConsumerOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Length in bytes of the auth key handed out by the store.
    pub auth_key_len: usize,
    pub mode: StoreMode,
    /// Derive the auth key from this phrase instead of generating and
    /// persisting a random one.
    pub secret_phrase: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            auth_key_len: DEFAULT_AUTH_KEY_LEN,
            mode: StoreMode::Full,
            secret_phrase: None,
        }
    }
}

impl StoreConfig {
    pub fn consumer_only() -> Self {
        Self {
            mode: StoreMode::ConsumerOnly,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.auth_key_len == 0 {
            return Err(StoreError::Config("auth_key_len must be positive".to_string()));
        }
        if self.secret_phrase.is_some() && self.auth_key_len > MAX_DERIVED_KEY_LEN {
            return Err(StoreError::Config(format!(
                "auth_key_len {} exceeds the {MAX_DERIVED_KEY_LEN} bytes a secret phrase can provide",
                self.auth_key_len
            )));
        }
        Ok(())
    }
}
