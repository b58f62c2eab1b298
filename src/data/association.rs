use std::fmt::{Debug, Display};

use base64::Engine;
use base64::prelude::BASE64_STANDARD;

use crate::store::StoreError;

const SERIALIZATION_VERSION: &str = "2";
const FIELD_ORDER: [&str; 6] = ["version", "handle", "secret", "issued", "lifetime", "assoc_type"];

/// Shared secret negotiated with a remote OpenID server.
///
/// Associations are immutable once built. Two associations compare equal
/// exactly when their [`Association::serialize`] outputs are equal.
#[derive(PartialEq, Eq, Hash, Clone)]
pub struct Association {
    handle: String,
    secret: Vec<u8>,
    issued: u64,
    lifetime: u64,
    assoc_type: String,
}

impl Association {
    pub fn new(
        handle: impl Into<String>,
        secret: impl Into<Vec<u8>>,
        issued: u64,
        lifetime: u64,
        assoc_type: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let handle = handle.into();
        let assoc_type = assoc_type.into();
        check_line_value("handle", &handle)?;
        check_line_value("assoc_type", &assoc_type)?;

        Ok(Self {
            handle,
            secret: secret.into(),
            issued,
            lifetime,
            assoc_type,
        })
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Issuance time, in seconds since the Unix epoch.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn lifetime(&self) -> u64 {
        self.lifetime
    }

    pub fn assoc_type(&self) -> &str {
        &self.assoc_type
    }

    pub fn expiration(&self) -> u64 {
        self.issued.saturating_add(self.lifetime)
    }

    /// Seconds of validity left at `now`, zero once expired.
    pub fn expires_in(&self, now: u64) -> u64 {
        self.expiration().saturating_sub(now)
    }

    /// Encodes the association as newline terminated `key:value` lines in a
    /// fixed field order.
    pub fn serialize(&self) -> String {
        let secret = BASE64_STANDARD.encode(&self.secret);
        let issued = self.issued.to_string();
        let lifetime = self.lifetime.to_string();
        let values: [&str; 6] = [
            SERIALIZATION_VERSION,
            &self.handle,
            &secret,
            &issued,
            &lifetime,
            &self.assoc_type,
        ];

        let mut out = String::new();
        for (key, value) in FIELD_ORDER.iter().zip(values) {
            out.push_str(key);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Inverse of [`Association::serialize`]. Anything that `serialize` could
    /// not have produced is reported as [`StoreError::Corrupted`].
    pub fn deserialize(location: &str, text: &str) -> Result<Self, StoreError> {
        let corrupted = |reason: String| StoreError::Corrupted {
            location: location.to_string(),
            reason,
        };

        let body = text
            .strip_suffix('\n')
            .ok_or_else(|| corrupted("missing trailing newline".to_string()))?;
        let lines: Vec<&str> = body.split('\n').collect();
        if lines.len() != FIELD_ORDER.len() {
            return Err(corrupted(format!("expected {} fields, found {}", FIELD_ORDER.len(), lines.len())));
        }

        let mut values = Vec::with_capacity(FIELD_ORDER.len());
        for (line, expected) in lines.iter().zip(FIELD_ORDER) {
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| corrupted(format!("line without separator: {line:?}")))?;
            if key != expected {
                return Err(corrupted(format!("expected field {expected:?}, found {key:?}")));
            }
            values.push(value);
        }

        if values[0] != SERIALIZATION_VERSION {
            return Err(corrupted(format!("unsupported version {:?}", values[0])));
        }
        let secret = BASE64_STANDARD
            .decode(values[2])
            .map_err(|e| corrupted(format!("bad secret encoding: {e}")))?;
        let issued = values[3]
            .parse::<u64>()
            .map_err(|e| corrupted(format!("bad issued value: {e}")))?;
        let lifetime = values[4]
            .parse::<u64>()
            .map_err(|e| corrupted(format!("bad lifetime value: {e}")))?;

        Self::new(values[1], secret, issued, lifetime, values[5])
            .map_err(|e| corrupted(e.to_string()))
    }
}

fn check_line_value(field: &str, value: &str) -> Result<(), StoreError> {
    if value.is_empty() {
        return Err(StoreError::InvalidAssociation(format!("{field} must not be empty")));
    }
    if value.contains(['\n', '\r']) {
        return Err(StoreError::InvalidAssociation(format!("{field} must not contain line breaks")));
    }
    Ok(())
}

// The secret stays out of logs.
impl Debug for Association {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Association")
            .field("handle", &self.handle)
            .field("issued", &self.issued)
            .field("lifetime", &self.lifetime)
            .field("assoc_type", &self.assoc_type)
            .finish_non_exhaustive()
    }
}

impl Display for Association {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.handle, self.assoc_type)
    }
}
