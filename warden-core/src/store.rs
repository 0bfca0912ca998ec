//! Credential persistence
//!
//! A [`TokenStore`] is a dumb, synchronous key-value accessor for the two
//! credentials. It validates nothing; absence of either value means the user
//! is logged out.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use warden_config::StorageConfig;

use crate::error::{StoreError, StoreResult};
use crate::token::{Token, TokenKind, TokenPair};

/// Synchronous holder for the access/refresh pair
pub trait TokenStore: Send + Sync + fmt::Debug {
    /// Current value of one credential.
    fn get(&self, kind: TokenKind) -> Option<Token>;

    /// Replace one credential.
    fn set(&self, kind: TokenKind, token: Token) -> StoreResult<()>;

    /// Remove both credentials.
    fn clear(&self) -> StoreResult<()>;

    /// Store both credentials of a fresh login.
    fn set_pair(&self, pair: &TokenPair) -> StoreResult<()> {
        self.set(TokenKind::Access, pair.access.clone())?;
        self.set(TokenKind::Refresh, pair.refresh.clone())
    }
}

/// Names the two values are persisted under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// Key of the access token
    pub access: String,
    /// Key of the refresh token
    pub refresh: String,
}

impl StorageKeys {
    /// Key used for `kind`.
    pub fn key(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

impl From<&StorageConfig> for StorageKeys {
    fn from(config: &StorageConfig) -> Self {
        Self {
            access: config.access_key.clone(),
            refresh: config.refresh_key.clone(),
        }
    }
}

/// Process-local store; credentials vanish with the process
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<TokenKind, Token>>,
}

impl MemoryTokenStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, kind: TokenKind) -> Option<Token> {
        self.tokens.read().get(&kind).cloned()
    }

    fn set(&self, kind: TokenKind, token: Token) -> StoreResult<()> {
        self.tokens.write().insert(kind, token);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.tokens.write().clear();
        Ok(())
    }
}

/// JSON file holding both values under their storage keys
///
/// The file is read once on open and written through on every mutation by
/// replacing it atomically. Reads are served from the loaded snapshot.
pub struct FileTokenStore {
    path: PathBuf,
    keys: StorageKeys,
    values: RwLock<BTreeMap<String, String>>,
}

impl fmt::Debug for FileTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTokenStore")
            .field("path", &self.path)
            .field("keys", &self.keys)
            .field("entries", &self.values.read().len())
            .finish()
    }
}

impl FileTokenStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>, keys: StorageKeys) -> StoreResult<Self> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => {
                serde_json::from_str(&raw).map_err(StoreError::CorruptedData)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                BTreeMap::new()
            }
            Err(source) => {
                return Err(StoreError::ReadFailed { path, source });
            }
        };

        log::debug!(
            "[FileTokenStore] Opened {} with {} entries",
            path.display(),
            values.len()
        );

        Ok(Self {
            path,
            keys,
            values: RwLock::new(values),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> StoreResult<()> {
        let write_failed = |source| StoreError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        if values.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(write_failed(e)),
            };
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
        }
        let content =
            serde_json::to_vec_pretty(values).map_err(StoreError::CorruptedData)?;
        let staging = self.path.with_extension("tmp");
        std::fs::write(&staging, content).map_err(write_failed)?;
        std::fs::rename(&staging, &self.path).map_err(write_failed)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, kind: TokenKind) -> Option<Token> {
        self.values
            .read()
            .get(self.keys.key(kind))
            .filter(|value| !value.is_empty())
            .map(|value| Token::new(value.as_str()))
    }

    fn set(&self, kind: TokenKind, token: Token) -> StoreResult<()> {
        let mut guard = self.values.write();
        let mut next = guard.clone();
        next.insert(self.keys.key(kind).to_string(), token.into_inner());
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let mut guard = self.values.write();
        let mut next = guard.clone();
        for kind in TokenKind::ALL {
            next.remove(self.keys.key(kind));
        }
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }
}
