use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::UserProfile;

/// Credential file name in the data directory
const CREDENTIALS_FILE: &str = "credentials.json";

const SERVICE_NAME: &str = "newsdesk";

/// Keychain account holding the serialized record
const KEYRING_ACCOUNT: &str = "session";

/// The persisted `(token, user)` pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub token: String,
    pub user: UserProfile,
    pub saved_at: DateTime<Utc>,
}

impl CredentialRecord {
    pub fn new(token: impl Into<String>, user: UserProfile) -> Self {
        Self {
            token: token.into(),
            user,
            saved_at: Utc::now(),
        }
    }

    pub fn is_well_formed(&self) -> bool {
        !self.token.trim().is_empty() && self.user.is_well_formed()
    }

    fn encode(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize credential record")
    }

    /// Parse stored contents. Anything short of a complete record is `None`.
    fn decode(contents: &str) -> Option<Self> {
        let stored: StoredRecord = serde_json::from_str(contents).ok()?;
        let record = Self {
            token: stored.token?,
            user: stored.user?,
            saved_at: stored.saved_at.unwrap_or_else(Utc::now),
        };
        record.is_well_formed().then_some(record)
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .field("saved_at", &self.saved_at)
            .finish()
    }
}

/// Storage shape with every part optional, so a half-written or hand-edited
/// record is detected instead of failing deserialization wholesale.
#[derive(Deserialize)]
struct StoredRecord {
    token: Option<String>,
    user: Option<UserProfile>,
    saved_at: Option<DateTime<Utc>>,
}

/// Durable home for the credential record.
///
/// Implementations never return half a record: `load` yields the complete
/// pair or `None`, and removes whatever partial data it found.
pub trait CredentialStore: Send + Sync {
    /// Persist the record, replacing any previous one as a single unit
    fn save(&self, record: &CredentialRecord) -> Result<()>;

    fn load(&self) -> Result<Option<CredentialRecord>>;

    /// Remove all stored credential state. Succeeds when nothing is stored.
    fn clear(&self) -> Result<()>;
}

impl<T: CredentialStore + ?Sized> CredentialStore for Box<T> {
    fn save(&self, record: &CredentialRecord) -> Result<()> {
        (**self).save(record)
    }

    fn load(&self) -> Result<Option<CredentialRecord>> {
        (**self).load()
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

// ============================================================================
// File backend
// ============================================================================

/// Credential record kept as a JSON file, replaced via temp file + rename.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(CREDENTIALS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, record: &CredentialRecord) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Credential path has no parent directory"))?;
        fs::create_dir_all(dir).context("Failed to create credential directory")?;

        let contents = record.encode()?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .context("Failed to create temporary credential file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))
                .context("Failed to restrict credential file permissions")?;
        }

        temp.write_all(contents.as_bytes())
            .context("Failed to write credential file")?;
        temp.as_file()
            .sync_all()
            .context("Failed to sync credential file")?;
        temp.persist(&self.path)
            .context("Failed to move credential file into place")?;

        debug!(path = ?self.path, "Credentials saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<CredentialRecord>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read credential file"),
        };

        let record = String::from_utf8(bytes)
            .ok()
            .and_then(|contents| CredentialRecord::decode(&contents));

        match record {
            Some(record) => Ok(Some(record)),
            None => {
                warn!(path = ?self.path, "Discarding incomplete credential file");
                self.clear()?;
                Ok(None)
            }
        }
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = ?self.path, "Credentials cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential file"),
        }
    }
}

// ============================================================================
// Keyring backend
// ============================================================================

/// Credential record kept in the OS keychain.
///
/// The whole record is one keychain secret, so token and user are still
/// written and removed together.
pub struct KeyringCredentialStore {
    service: String,
    account: String,
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.account).context("Failed to create keyring entry")
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME, KEYRING_ACCOUNT)
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save(&self, record: &CredentialRecord) -> Result<()> {
        self.entry()?
            .set_password(&record.encode()?)
            .context("Failed to store credentials in keychain")
    }

    fn load(&self) -> Result<Option<CredentialRecord>> {
        let contents = match self.entry()?.get_password() {
            Ok(contents) => contents,
            Err(keyring::Error::NoEntry) => return Ok(None),
            // Secret stored by something else and not valid UTF-8
            Err(keyring::Error::BadEncoding(_)) => String::new(),
            Err(e) => return Err(e).context("Failed to read credentials from keychain"),
        };

        match CredentialRecord::decode(&contents) {
            Some(record) => Ok(Some(record)),
            None => {
                warn!("Discarding incomplete keychain credentials");
                self.clear()?;
                Ok(None)
            }
        }
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credentials from keychain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn sample_user() -> UserProfile {
        UserProfile {
            id: "1".to_string(),
            email: "a@b.com".to_string(),
            username: "ann".to_string(),
            display_name: None,
            role: Role::Admin,
        }
    }

    fn store_in(dir: &tempfile::TempDir) -> FileCredentialStore {
        FileCredentialStore::new(dir.path())
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);

        let record = CredentialRecord::new("abc", sample_user());
        store.save(&record).expect("save");

        let loaded = store.load().expect("load").expect("record should exist");
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);

        store.clear().expect("clear on empty store");
        store.save(&CredentialRecord::new("abc", sample_user())).expect("save");
        store.clear().expect("first clear");
        store.clear().expect("second clear");

        assert!(!store.path().exists());
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_save_replaces_previous_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);

        store.save(&CredentialRecord::new("first", sample_user())).expect("save");
        store.save(&CredentialRecord::new("second", sample_user())).expect("save");

        let loaded = store.load().expect("load").expect("record should exist");
        assert_eq!(loaded.token, "second");

        // Only the credential file remains, no leftover temp files
        let entries = fs::read_dir(dir.path()).expect("read_dir").count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_token_without_user_is_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"token":"abc"}"#).expect("write");

        assert!(store.load().expect("load").is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_user_without_token_is_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"{"user":{"id":"1","email":"a@b.com","role":"admin"}}"#,
        )
        .expect("write");

        assert!(store.load().expect("load").is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_blank_token_is_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"{"token":"","user":{"id":"1","email":"a@b.com","role":"admin"}}"#,
        )
        .expect("write");

        assert!(store.load().expect("load").is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_garbage_is_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        fs::write(store.path(), "{\"token\": \"abc\", \"user\": {").expect("write");

        assert!(store.load().expect("load").is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_non_utf8_record_is_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        fs::write(store.path(), [0xff, 0xfe, b'{']).expect("write");

        assert!(store.load().expect("load").is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_record_without_timestamp_is_accepted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"{"token":"abc","user":{"id":"1","email":"a@b.com","role":"admin"}}"#,
        )
        .expect("write");

        let loaded = store.load().expect("load").expect("record should exist");
        assert_eq!(loaded.token, "abc");
        assert_eq!(loaded.user.email, "a@b.com");
    }

    #[cfg(unix)]
    #[test]
    fn test_credential_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        store.save(&CredentialRecord::new("abc", sample_user())).expect("save");

        let mode = fs::metadata(store.path()).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_boxed_store_delegates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Box<dyn CredentialStore> = Box::new(store_in(&dir));

        store.save(&CredentialRecord::new("abc", sample_user())).expect("save");
        assert!(store.load().expect("load").is_some());
        store.clear().expect("clear");
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let record = CredentialRecord::new("super-secret-token", sample_user());
        let debug = format!("{:?}", record);
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("<redacted>"));
    }
}
