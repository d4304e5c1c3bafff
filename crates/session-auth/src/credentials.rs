//! Credential pair and token stores
//!
//! The pair is the unit of storage: access and refresh tokens are written
//! together and cleared together, so no reader can ever observe one without
//! the other. Reads are synchronous and served from memory because the
//! request path attaches the access token to every call and must not wait
//! on disk.
//!
//! `FileTokenStore` persists the pair as a JSON object with the keys
//! `access_token` and `refresh_token`. All writes use atomic temp-file +
//! rename, and a tokio Mutex serializes writers so the file never goes
//! backwards relative to memory.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{PoisonError, RwLock};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Access and refresh credentials, always held together.
#[derive(Debug, Clone)]
pub struct CredentialPair {
    access: Secret<String>,
    refresh: Secret<String>,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Secret::new(access.into()),
            refresh: Secret::new(refresh.into()),
        }
    }

    /// Short-lived bearer token for individual calls.
    pub fn access(&self) -> &str {
        self.access.expose()
    }

    /// Long-lived token used only for the refresh exchange.
    pub fn refresh(&self) -> &str {
        self.refresh.expose()
    }

    pub fn access_secret(&self) -> &Secret<String> {
        &self.access
    }
}

pub type StoreFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Holder of the current credential pair.
///
/// `get` is a plain in-memory read. `set` and `clear` return boxed futures so
/// durable backends can write to disk while the trait stays dyn-compatible
/// (`Arc<dyn TokenStore>`).
pub trait TokenStore: Send + Sync {
    /// Current pair, or `None` when logged out.
    fn get(&self) -> Option<CredentialPair>;

    /// Replace both credentials at once.
    fn set(&self, pair: CredentialPair) -> StoreFuture<'_>;

    /// Remove both credentials at once.
    fn clear(&self) -> StoreFuture<'_>;
}

/// In-memory store, used by tests and by hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    current: RwLock<Option<CredentialPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            current: RwLock::new(Some(pair)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<CredentialPair> {
        read_slot(&self.current)
    }

    fn set(&self, pair: CredentialPair) -> StoreFuture<'_> {
        replace_slot(&self.current, Some(pair));
        Box::pin(async { Ok(()) })
    }

    fn clear(&self) -> StoreFuture<'_> {
        replace_slot(&self.current, None);
        Box::pin(async { Ok(()) })
    }
}

/// On-disk layout. The two keys are independent in the file; the pair
/// invariant is enforced when loading.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl StoredTokens {
    fn from_pair(pair: Option<&CredentialPair>) -> Self {
        match pair {
            Some(pair) => Self {
                access_token: Some(pair.access().to_owned()),
                refresh_token: Some(pair.refresh().to_owned()),
            },
            None => Self::default(),
        }
    }
}

/// File-backed store for the CLI and other long-lived hosts.
pub struct FileTokenStore {
    path: PathBuf,
    current: RwLock<Option<CredentialPair>>,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    /// Load the pair from `path`.
    ///
    /// A missing file is created as `{}` (logged out). A file holding only
    /// one of the two keys is treated as logged out as well.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let current = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let stored: StoredTokens = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            match (stored.access_token, stored.refresh_token) {
                (Some(access), Some(refresh)) => {
                    info!(path = %path.display(), "loaded credentials");
                    Some(CredentialPair::new(access, refresh))
                }
                (None, None) => {
                    info!(path = %path.display(), "credential file is empty, logged out");
                    None
                }
                _ => {
                    warn!(path = %path.display(), "credential file holds only one token, ignoring it");
                    None
                }
            }
        } else {
            info!(path = %path.display(), "credential file not found, starting logged out");
            write_atomic(&path, &StoredTokens::default()).await?;
            None
        };

        Ok(Self {
            path,
            current: RwLock::new(current),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn replace(&self, pair: Option<CredentialPair>) -> Result<()> {
        let _writer = self.write_lock.lock().await;
        let stored = StoredTokens::from_pair(pair.as_ref());
        replace_slot(&self.current, pair);
        write_atomic(&self.path, &stored).await
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<CredentialPair> {
        read_slot(&self.current)
    }

    fn set(&self, pair: CredentialPair) -> StoreFuture<'_> {
        Box::pin(async move {
            self.replace(Some(pair)).await?;
            debug!("stored credential pair");
            Ok(())
        })
    }

    fn clear(&self) -> StoreFuture<'_> {
        Box::pin(async move {
            self.replace(None).await?;
            debug!("cleared credential pair");
            Ok(())
        })
    }
}

fn read_slot(slot: &RwLock<Option<CredentialPair>>) -> Option<CredentialPair> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn replace_slot(slot: &RwLock<Option<CredentialPair>>, pair: Option<CredentialPair>) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = pair;
}

/// Write the token file atomically with 0600 permissions.
async fn write_atomic(path: &Path, data: &StoredTokens) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        Some(_) => Path::new("."),
        None => return Err(Error::Io("credential path has no parent directory".into())),
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("credentials");
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
