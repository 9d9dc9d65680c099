//! Bearer-token storage and the token provider contract.
//!
//! The client never interprets credentials itself: it asks a
//! [`TokenProvider`] for the current bearer token and reports authorization
//! failures back to it. Providers sit on top of a [`CredentialStore`], a
//! small key-value abstraction keyed by the same fixed names the web client
//! uses (`serverUrl`, `access_token`, `token_type`).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::{from_reader, to_writer_pretty};

use crate::{Error, Result};

/// Store key for the server base URL override.
pub const KEY_SERVER_URL: &str = "serverUrl";

/// Store key for the bearer token.
pub const KEY_ACCESS_TOKEN: &str = "access_token";

/// Store key for the token scheme.
pub const KEY_TOKEN_TYPE: &str = "token_type";

/// Supplies the bearer credential for API calls, or reports its absence.
pub trait TokenProvider: Send + Sync {
    /// Returns the current bearer token, if one is stored.
    fn token(&self) -> Option<String>;

    /// Stores a freshly issued token pair.
    fn store(&self, access_token: &str, token_type: &str);

    /// Forgets the stored credentials, if any.
    fn clear(&self);

    /// Invoked when a call fails with an unauthorized status. The provider
    /// decides what to do; the default stance is to forget the credentials
    /// so the next call fails fast with "authentication absent".
    fn on_auth_failure(&self, status: u16);
}

/// String key-value persistence for credentials and client configuration.
pub trait CredentialStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`.
    fn set(&self, key: &str, value: &str);

    /// Removes the value stored under `key`.
    fn remove(&self, key: &str);
}

/// In-memory credential store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// JSON file-backed credential store.
///
/// The whole store is rewritten on every mutation; it holds a handful of
/// short strings, so simplicity wins over cleverness here.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, creating an empty one if the file does not
    /// exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let file = File::open(&path)
                .map_err(|e| Error::io(format!("cannot open {}", path.display()), e))?;
            from_reader(BufReader::new(file))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn persist(&self, values: &HashMap<String, String>) -> Result<()> {
        let file = File::create(&self.path)
            .map_err(|e| Error::io(format!("cannot write {}", self.path.display()), e))?;
        to_writer_pretty(BufWriter::new(file), values)?;
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        // Persistence is best-effort; the in-memory view stays authoritative.
        let _ = self.persist(&values);
    }

    fn remove(&self, key: &str) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        let _ = self.persist(&values);
    }
}

/// A [`TokenProvider`] backed by a [`CredentialStore`].
pub struct StoredTokens<S: CredentialStore> {
    store: S,
}

impl<S: CredentialStore> StoredTokens<S> {
    /// Wraps a credential store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the stored server URL override, if any.
    pub fn server_url(&self) -> Option<String> {
        self.store.get(KEY_SERVER_URL)
    }

    /// Stores a server URL override.
    pub fn set_server_url(&self, url: &str) {
        self.store.set(KEY_SERVER_URL, url);
    }

    /// Access to the underlying store.
    pub fn credentials(&self) -> &S {
        &self.store
    }
}

impl<S: CredentialStore> TokenProvider for StoredTokens<S> {
    fn token(&self) -> Option<String> {
        self.store.get(KEY_ACCESS_TOKEN)
    }

    fn store(&self, access_token: &str, token_type: &str) {
        self.store.set(KEY_ACCESS_TOKEN, access_token);
        self.store.set(KEY_TOKEN_TYPE, token_type);
    }

    fn clear(&self) {
        self.store.remove(KEY_ACCESS_TOKEN);
        self.store.remove(KEY_TOKEN_TYPE);
    }

    fn on_auth_failure(&self, status: u16) {
        if status == 401 {
            self.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k"), None);
        store.set("k", "v");
        assert_eq!(store.get("k"), Some("v".to_string()));
        store.remove("k");
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn stored_tokens_provider() {
        let tokens = StoredTokens::new(MemoryStore::new());
        assert_eq!(tokens.token(), None);
        tokens.store("abc123", "bearer");
        assert_eq!(tokens.token(), Some("abc123".to_string()));
        assert_eq!(
            tokens.credentials().get(KEY_TOKEN_TYPE),
            Some("bearer".to_string())
        );
    }

    #[test]
    fn auth_failure_clears_credentials() {
        let tokens = StoredTokens::new(MemoryStore::new());
        tokens.store("abc123", "bearer");
        tokens.on_auth_failure(401);
        assert_eq!(tokens.token(), None);
    }

    #[test]
    fn non_401_failures_keep_credentials() {
        let tokens = StoredTokens::new(MemoryStore::new());
        tokens.store("abc123", "bearer");
        tokens.on_auth_failure(500);
        assert_eq!(tokens.token(), Some("abc123".to_string()));
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        {
            let store = FileStore::open(&path).unwrap();
            store.set(KEY_ACCESS_TOKEN, "tok");
        }
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get(KEY_ACCESS_TOKEN), Some("tok".to_string()));
    }
}
