//! JSON file holding OAuth tokens per account
//!
//! Written atomically (temp file + rename) with owner-only permissions.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use calmirror_common::auth::TokenSet;
use calmirror_domain::{CalMirrorError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::InfraError;

/// Tokens stored for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAccount {
    pub email: String,
    pub tokens: TokenSet,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(default)]
    accounts: Vec<StoredAccount>,
}

/// File-backed token store
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process.
    write_lock: Mutex<()>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored account, in the order they were added.
    pub fn accounts(&self) -> Result<Vec<StoredAccount>> {
        Ok(self.read()?.accounts)
    }

    /// Stored emails, in the order they were added.
    pub fn emails(&self) -> Result<Vec<String>> {
        Ok(self.read()?.accounts.into_iter().map(|a| a.email).collect())
    }

    /// Tokens for `email`, if the account has been added.
    pub fn get(&self, email: &str) -> Result<Option<TokenSet>> {
        Ok(self.read()?.accounts.into_iter().find(|a| a.email == email).map(|a| a.tokens))
    }

    /// Store tokens for `email`, replacing any existing entry.
    pub fn upsert(&self, email: &str, tokens: TokenSet) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut file = self.read()?;
        match file.accounts.iter_mut().find(|a| a.email == email) {
            Some(existing) => existing.tokens = tokens,
            None => file.accounts.push(StoredAccount { email: email.to_string(), tokens }),
        }
        self.write(&file)?;
        debug!(email, "token_store.saved");
        Ok(())
    }

    /// Drop the tokens for `email`. Returns whether an entry was removed.
    pub fn remove(&self, email: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut file = self.read()?;
        let before = file.accounts.len();
        file.accounts.retain(|a| a.email != email);
        if file.accounts.len() == before {
            return Ok(false);
        }
        self.write(&file)?;
        info!(email, "token_store.removed");
        Ok(true)
    }

    fn read(&self) -> Result<TokenFile> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TokenFile::default()),
            Err(e) => return Err(InfraError::from(e).into()),
        };
        serde_json::from_str(&contents).map_err(|e| {
            CalMirrorError::Config(format!("corrupt token store {}: {e}", self.path.display()))
        })
    }

    fn write(&self, file: &TokenFile) -> Result<()> {
        let data = serde_json::to_vec_pretty(file).map_err(InfraError::from)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(InfraError::from)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut temp = options.open(&temp_path).map_err(InfraError::from)?;
        temp.write_all(&data).map_err(InfraError::from)?;
        temp.sync_all().map_err(InfraError::from)?;
        drop(temp);

        fs::rename(&temp_path, &self.path).map_err(InfraError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn tokens(access: &str) -> TokenSet {
        TokenSet::new(access.into(), Some("refresh".into()), None, 3600, None)
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        assert!(store.accounts().unwrap().is_empty());
        assert_eq!(store.get("me@example.com").unwrap(), None);
    }

    #[test]
    fn upsert_replaces_existing_account() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));

        store.upsert("a@example.com", tokens("a1")).unwrap();
        store.upsert("b@example.com", tokens("b1")).unwrap();
        store.upsert("a@example.com", tokens("a2")).unwrap();

        assert_eq!(store.emails().unwrap(), vec!["a@example.com", "b@example.com"]);
        assert_eq!(store.get("a@example.com").unwrap().unwrap().access_token, "a2");
    }

    #[test]
    fn remove_reports_whether_anything_changed() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        store.upsert("a@example.com", tokens("a1")).unwrap();

        assert!(store.remove("a@example.com").unwrap());
        assert!(!store.remove("a@example.com").unwrap());
        assert!(store.emails().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, "not json").unwrap();

        let err = TokenStore::new(&path).accounts().unwrap_err();
        assert!(err.is_config());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("nested").join("tokens.json"));
        store.upsert("a@example.com", tokens("a1")).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
