//! Credential storage for the signed-in session
//!
//! `TokenProvider` is the read/write contract the request pipeline consumes.
//! Two implementations are provided: `MemoryTokenStore` for tests and
//! short-lived processes, and `FileTokenStore`, which mirrors the in-memory
//! state to a JSON file using atomic temp-file + rename writes.
//!
//! The access/refresh pair is always replaced under a single write guard, so a
//! concurrent `credentials()` snapshot never pairs an old access token with a
//! new refresh token.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Session credentials. Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Credentials {
    fn normalized(self) -> Self {
        Self {
            access_token: non_empty(self.access_token),
            refresh_token: non_empty(self.refresh_token),
            user_id: non_empty(self.user_id),
        }
    }

    fn replace_pair(&mut self, access: String, refresh: String) {
        self.access_token = non_empty(Some(access));
        self.refresh_token = non_empty(Some(refresh));
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Read/write contract for the session's credentials.
///
/// Individual getters are not required to be mutually consistent; use
/// `credentials()` when the access/refresh pair must be read together.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;

    fn refresh_token(&self) -> Option<String>;

    fn user_id(&self) -> Option<String>;

    /// Consistent snapshot of all three values.
    fn credentials(&self) -> Credentials;

    /// Replace the access/refresh pair atomically. The user id is untouched.
    fn save_tokens(&self, access: String, refresh: String);

    fn set_user_id(&self, user_id: Option<String>);

    /// Clear access token, refresh token and user id.
    fn clear_tokens(&self);
}

fn read_state(lock: &RwLock<Credentials>) -> RwLockReadGuard<'_, Credentials> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_state(lock: &RwLock<Credentials>) -> RwLockWriteGuard<'_, Credentials> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    state: RwLock<Credentials>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            state: RwLock::new(credentials.normalized()),
        }
    }
}

impl TokenProvider for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        read_state(&self.state).access_token.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        read_state(&self.state).refresh_token.clone()
    }

    fn user_id(&self) -> Option<String> {
        read_state(&self.state).user_id.clone()
    }

    fn credentials(&self) -> Credentials {
        read_state(&self.state).clone()
    }

    fn save_tokens(&self, access: String, refresh: String) {
        write_state(&self.state).replace_pair(access, refresh);
        debug!("saved token pair");
    }

    fn set_user_id(&self, user_id: Option<String>) {
        write_state(&self.state).user_id = non_empty(user_id);
    }

    fn clear_tokens(&self) {
        *write_state(&self.state) = Credentials::default();
        debug!("cleared credentials");
    }
}

/// Credential store persisted to a JSON file.
///
/// The in-memory copy is authoritative for reads. Every write updates memory
/// under the state guard, releases it, and then persists a snapshot while
/// holding `persist`, so readers never wait on disk and file contents follow
/// the same order as in-memory updates. A failed persist is logged and does
/// not roll back the in-memory write.
///
/// Persisting is a small synchronous write + rename on the calling thread.
/// Writes happen only on login, refresh and logout, so the blocking is
/// bounded and rare.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    state: RwLock<Credentials>,
    persist: Mutex<()>,
}

impl FileTokenStore {
    /// Load credentials from `path`.
    ///
    /// If the file doesn't exist it is created as `{}` (signed-out cold start).
    pub fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let credentials: Credentials = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            let credentials = credentials.normalized();
            info!(
                path = %path.display(),
                signed_in = credentials.access_token.is_some(),
                "loaded credentials"
            );
            credentials
        } else {
            info!(path = %path.display(), "credential file not found, starting signed out");
            let empty = Credentials::default();
            write_atomic(&path, &empty)?;
            empty
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
            persist: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate(&self, what: &str, apply: impl FnOnce(&mut Credentials)) {
        let _persist = self
            .persist
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot = {
            let mut state = write_state(&self.state);
            apply(&mut state);
            state.clone()
        };
        if let Err(e) = write_atomic(&self.path, &snapshot) {
            warn!(error = %e, operation = what, "failed to persist credentials");
        }
    }
}

impl TokenProvider for FileTokenStore {
    fn access_token(&self) -> Option<String> {
        read_state(&self.state).access_token.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        read_state(&self.state).refresh_token.clone()
    }

    fn user_id(&self) -> Option<String> {
        read_state(&self.state).user_id.clone()
    }

    fn credentials(&self) -> Credentials {
        read_state(&self.state).clone()
    }

    fn save_tokens(&self, access: String, refresh: String) {
        self.mutate("save_tokens", |state| state.replace_pair(access, refresh));
    }

    fn set_user_id(&self, user_id: Option<String>) {
        self.mutate("set_user_id", |state| state.user_id = non_empty(user_id));
    }

    fn clear_tokens(&self) {
        self.mutate("clear_tokens", |state| *state = Credentials::default());
    }
}

/// Write credentials to a file atomically with 0600 permissions on unix.
fn write_atomic(path: &Path, data: &Credentials) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        Some(_) => Path::new("."),
        None => return Err(Error::Io("credential path has no parent directory".into())),
    };

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, perms)
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn signed_in() -> Credentials {
        Credentials {
            access_token: Some("at_1".into()),
            refresh_token: Some("rt_1".into()),
            user_id: Some("driver-42".into()),
        }
    }

    #[test]
    fn memory_store_save_and_clear() {
        let store = MemoryTokenStore::with_credentials(signed_in());
        assert_eq!(store.access_token().as_deref(), Some("at_1"));
        assert_eq!(store.user_id().as_deref(), Some("driver-42"));

        store.save_tokens("at_2".into(), "rt_2".into());
        assert_eq!(store.access_token().as_deref(), Some("at_2"));
        assert_eq!(store.refresh_token().as_deref(), Some("rt_2"));
        assert_eq!(store.user_id().as_deref(), Some("driver-42"));

        store.clear_tokens();
        assert_eq!(store.credentials(), Credentials::default());
    }

    #[test]
    fn empty_strings_are_absent() {
        let store = MemoryTokenStore::new();
        store.save_tokens("at_1".into(), String::new());
        assert_eq!(store.access_token().as_deref(), Some("at_1"));
        assert!(store.refresh_token().is_none());

        store.set_user_id(Some(String::new()));
        assert!(store.user_id().is_none());
    }

    #[test]
    fn concurrent_readers_never_see_mixed_pair() {
        let store = Arc::new(MemoryTokenStore::new());
        store.save_tokens("at_0".into(), "rt_0".into());

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 1..2000 {
                    store.save_tokens(format!("at_{i}"), format!("rt_{i}"));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..2000 {
                        let snapshot = store.credentials();
                        let access = snapshot.access_token.unwrap();
                        let refresh = snapshot.refresh_token.unwrap();
                        assert_eq!(
                            access.trim_start_matches("at_"),
                            refresh.trim_start_matches("rt_"),
                            "mismatched pair: {access} / {refresh}"
                        );
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        let store = FileTokenStore::load(path.clone()).unwrap();
        store.save_tokens("at_new".into(), "rt_new".into());
        store.set_user_id(Some("driver-7".into()));

        let reloaded = FileTokenStore::load(path).unwrap();
        assert_eq!(reloaded.access_token().as_deref(), Some("at_new"));
        assert_eq!(reloaded.refresh_token().as_deref(), Some("rt_new"));
        assert_eq!(reloaded.user_id().as_deref(), Some("driver-7"));
    }

    #[test]
    fn file_store_cold_start_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        assert!(!path.exists());
        let store = FileTokenStore::load(path.clone()).unwrap();
        assert_eq!(store.credentials(), Credentials::default());
        assert!(path.exists());

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: Credentials = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, Credentials::default());
    }

    #[test]
    fn file_store_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        let store = FileTokenStore::load(path.clone()).unwrap();
        store.save_tokens("at_x".into(), "rt_x".into());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"accessToken\""), "got: {contents}");
        assert!(contents.contains("\"refreshToken\""), "got: {contents}");
    }

    #[test]
    fn file_store_clear_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        let store = FileTokenStore::load(path.clone()).unwrap();
        store.save_tokens("at_1".into(), "rt_1".into());
        store.clear_tokens();

        let reloaded = FileTokenStore::load(path).unwrap();
        assert!(reloaded.access_token().is_none());
        assert!(reloaded.refresh_token().is_none());
    }

    #[test]
    fn concurrent_file_writes_leave_file_matching_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let store = Arc::new(FileTokenStore::load(path.clone()).unwrap());

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.save_tokens(format!("at_{w}_{i}"), format!("rt_{w}_{i}"));
                    }
                })
            })
            .collect();

        let reader = {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let snapshot = store.credentials();
                    if let (Some(access), Some(refresh)) =
                        (snapshot.access_token, snapshot.refresh_token)
                    {
                        assert_eq!(
                            access.trim_start_matches("at_"),
                            refresh.trim_start_matches("rt_")
                        );
                    }
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();

        let on_disk: Credentials =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, store.credentials());
    }

    #[test]
    fn file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileTokenStore::load(path).unwrap_err();
        assert!(matches!(err, Error::CredentialParse(_)), "got: {err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        let store = FileTokenStore::load(path.clone()).unwrap();
        store.save_tokens("at_1".into(), "rt_1".into());

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "credential file must be 0600, got {mode:o}");
    }
}
