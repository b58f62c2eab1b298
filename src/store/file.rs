//! Directory-backed backend.
//!
//! Layout under the base directory:
//!
//! ```text
//! associations/<sha256(server_url)>/<sha256(handle)>   serialized association
//! nonces/<sha256(nonce)>                               empty marker file
//! auth_key                                             raw key bytes
//! temp/                                                staging for atomic writes
//! ```
//!
//! Records are written to `temp/` and renamed into place, so a reader sees
//! either the old record or the new one. Nonces are consumed by unlinking,
//! which the filesystem grants to exactly one caller.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::data::Association;
use crate::store::{Backend, StoreError, StoreResult};

const ASSOCIATIONS_DIR: &str = "associations";
const NONCES_DIR: &str = "nonces";
const TEMP_DIR: &str = "temp";
const AUTH_KEY_FILE: &str = "auth_key";
const PERSIST_ATTEMPTS: usize = 3;

#[derive(Debug)]
pub struct FileBackend {
    directory: PathBuf,
    association_dir: PathBuf,
    nonce_dir: PathBuf,
    temp_dir: PathBuf,
    auth_key_path: PathBuf,
}

impl FileBackend {
    /// Opens the store rooted at `directory`, creating it if needed.
    pub fn open(directory: impl AsRef<Path>) -> StoreResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        let backend = Self {
            association_dir: directory.join(ASSOCIATIONS_DIR),
            nonce_dir: directory.join(NONCES_DIR),
            temp_dir: directory.join(TEMP_DIR),
            auth_key_path: directory.join(AUTH_KEY_FILE),
            directory,
        };

        for dir in [&backend.association_dir, &backend.nonce_dir, &backend.temp_dir] {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        debug!(directory = %backend.directory.display(), "opened file store");
        Ok(backend)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Irreversibly deletes everything the store has persisted.
    pub fn destroy(self) -> StoreResult<()> {
        match fs::remove_dir_all(&self.directory) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&self.directory, e)),
        }
        debug!(directory = %self.directory.display(), "destroyed file store");
        Ok(())
    }

    fn scope_dir(&self, server_url: &str) -> PathBuf {
        self.association_dir.join(file_name(server_url))
    }

    fn association_path(&self, server_url: &str, handle: &str) -> PathBuf {
        self.scope_dir(server_url).join(file_name(handle))
    }

    fn nonce_path(&self, nonce: &str) -> PathBuf {
        self.nonce_dir.join(file_name(nonce))
    }

    fn stage(&self, contents: &[u8]) -> StoreResult<NamedTempFile> {
        let mut file = NamedTempFile::new_in(&self.temp_dir).map_err(|e| StoreError::io(&self.temp_dir, e))?;
        file.write_all(contents)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| StoreError::io(file.path(), e))?;
        Ok(file)
    }

    fn read_association(path: &Path) -> StoreResult<Option<Association>> {
        let Some(bytes) = read_optional(path)? else {
            return Ok(None);
        };
        let location = path.display().to_string();
        let text = String::from_utf8(bytes).map_err(|e| StoreError::Corrupted {
            location: location.clone(),
            reason: e.to_string(),
        })?;
        Association::deserialize(&location, &text)
            .map(Some)
            .inspect_err(|e| warn!(error = %e, "unreadable association record"))
    }

    fn list_dir(dir: &Path) -> StoreResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(dir, e)),
        };
        entries
            .map(|entry| entry.map(|entry| entry.path()).map_err(|e| StoreError::io(dir, e)))
            .collect()
    }
}

impl Backend for FileBackend {
    fn put_association(&self, server_url: &str, association: &Association) -> StoreResult<()> {
        let scope_dir = self.scope_dir(server_url);
        let target = self.association_path(server_url, association.handle());
        let mut staged = self.stage(association.serialize().as_bytes())?;

        // A concurrent removal may prune the scope directory before the rename.
        let mut attempts = 0;
        loop {
            fs::create_dir_all(&scope_dir).map_err(|e| StoreError::io(&scope_dir, e))?;
            match staged.persist(&target) {
                Ok(_) => return Ok(()),
                Err(e) if e.error.kind() == ErrorKind::NotFound && attempts < PERSIST_ATTEMPTS => {
                    attempts += 1;
                    staged = e.file;
                }
                Err(e) => return Err(StoreError::io(&target, e.error)),
            }
        }
    }

    fn association(&self, server_url: &str, handle: &str) -> StoreResult<Option<Association>> {
        Self::read_association(&self.association_path(server_url, handle))
    }

    fn associations(&self, server_url: &str) -> StoreResult<Vec<Association>> {
        let mut found = Vec::new();
        for path in Self::list_dir(&self.scope_dir(server_url))? {
            // Entries removed since the listing are simply skipped.
            if let Some(association) = Self::read_association(&path)? {
                found.push(association);
            }
        }
        Ok(found)
    }

    fn delete_association(&self, server_url: &str, handle: &str) -> StoreResult<bool> {
        let removed = remove_if_present(&self.association_path(server_url, handle))?;
        if removed {
            prune_scope(&self.scope_dir(server_url));
        }
        Ok(removed)
    }

    fn retain_associations(&self, keep: &dyn Fn(&Association) -> bool) -> StoreResult<usize> {
        let mut removed = 0;
        for scope_dir in Self::list_dir(&self.association_dir)? {
            for path in Self::list_dir(&scope_dir)? {
                match Self::read_association(&path)? {
                    Some(association) if !keep(&association) => {
                        if remove_if_present(&path)? {
                            removed += 1;
                        }
                    }
                    _ => {}
                }
            }
            prune_scope(&scope_dir);
        }
        Ok(removed)
    }

    fn put_nonce(&self, nonce: &str) -> StoreResult<()> {
        let path = self.nonce_path(nonce);
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        Ok(())
    }

    fn take_nonce(&self, nonce: &str) -> StoreResult<bool> {
        remove_if_present(&self.nonce_path(nonce))
    }

    fn auth_key(&self) -> StoreResult<Option<Vec<u8>>> {
        read_optional(&self.auth_key_path)
    }

    fn create_auth_key(&self, candidate: &[u8]) -> StoreResult<Vec<u8>> {
        let staged = self.stage(candidate)?;
        match staged.persist_noclobber(&self.auth_key_path) {
            Ok(_) => Ok(candidate.to_vec()),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!("auth key created concurrently, using the persisted one");
                read_optional(&self.auth_key_path)?.ok_or_else(|| StoreError::Corrupted {
                    location: self.auth_key_path.display().to_string(),
                    reason: "auth key vanished after creation".to_string(),
                })
            }
            Err(e) => Err(StoreError::io(&self.auth_key_path, e.error)),
        }
    }
}

fn file_name(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

fn read_optional(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Drops a scope directory once its last association is gone. A scope that
/// is still populated, or already removed, is left as is.
fn prune_scope(scope_dir: &Path) {
    if fs::remove_dir(scope_dir).is_ok() {
        debug!(scope = %scope_dir.display(), "pruned empty association scope");
    }
}

fn remove_if_present(path: &Path) -> StoreResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assoc(handle: &str, issued: u64) -> Association {
        Association::new(handle, vec![7u8; 20], issued, 600, "HMAC-SHA1").unwrap()
    }

    #[test]
    fn test_open_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path().join("store")).unwrap();
        assert!(backend.directory().join(ASSOCIATIONS_DIR).is_dir());
        assert!(backend.directory().join(NONCES_DIR).is_dir());
        assert!(backend.directory().join(TEMP_DIR).is_dir());
    }

    #[test]
    fn test_association_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        backend.put_association("http://server/", &assoc("h/../1", 5)).unwrap();
        drop(backend);

        let reopened = FileBackend::open(dir.path()).unwrap();
        assert_eq!(reopened.association("http://server/", "h/../1").unwrap(), Some(assoc("h/../1", 5)));
        assert_eq!(reopened.associations("http://server/").unwrap().len(), 1);
        assert!(reopened.associations("http://other/").unwrap().is_empty());
    }

    #[test]
    fn test_corrupted_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        backend.put_association("u", &assoc("h", 1)).unwrap();
        fs::write(backend.association_path("u", "h"), b"garbage").unwrap();

        assert!(matches!(backend.association("u", "h"), Err(StoreError::Corrupted { .. })));
        assert!(matches!(backend.associations("u"), Err(StoreError::Corrupted { .. })));
    }

    #[test]
    fn test_staging_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        backend.put_association("u", &assoc("h", 1)).unwrap();
        backend.create_auth_key(b"one").unwrap();
        backend.create_auth_key(b"two").unwrap();
        assert!(FileBackend::list_dir(&backend.temp_dir).unwrap().is_empty());
    }

    #[test]
    fn test_auth_key_no_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.create_auth_key(b"first").unwrap(), b"first");
        assert_eq!(backend.create_auth_key(b"second").unwrap(), b"first");
        assert_eq!(fs::read(dir.path().join(AUTH_KEY_FILE)).unwrap(), b"first");
    }

    #[test]
    fn test_emptied_scope_is_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        backend.put_association("u", &assoc("a", 1)).unwrap();
        backend.put_association("u", &assoc("b", 2)).unwrap();
        backend.put_association("v", &assoc("old", 1)).unwrap();

        assert!(backend.delete_association("u", "a").unwrap());
        assert!(backend.scope_dir("u").is_dir());
        assert!(backend.delete_association("u", "b").unwrap());
        assert!(!backend.scope_dir("u").exists());

        assert_eq!(backend.retain_associations(&|a| a.issued() > 1).unwrap(), 1);
        assert!(!backend.scope_dir("v").exists());
        assert_eq!(FileBackend::list_dir(&backend.association_dir).unwrap().len(), 0);

        // A pruned scope is recreated on the next write.
        backend.put_association("u", &assoc("c", 3)).unwrap();
        assert_eq!(backend.association("u", "c").unwrap(), Some(assoc("c", 3)));
    }

    #[test]
    fn test_nonce_marker() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        backend.put_nonce("abc").unwrap();
        backend.put_nonce("abc").unwrap();
        assert!(backend.take_nonce("abc").unwrap());
        assert!(!backend.take_nonce("abc").unwrap());
    }

    #[test]
    fn test_destroy() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let backend = FileBackend::open(&root).unwrap();
        backend.put_nonce("abc").unwrap();
        backend.destroy().unwrap();
        assert!(!root.exists());
    }
}
