//! Credential vault collaborator
//!
//! Stores cache authentication artifacts (user names, tokens, bucket names)
//! here, scoped by the catalog's context id. Nothing in the vault is ever
//! written to the catalog.

use crate::error::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Key/value credential cache scoped by context id
pub trait CredentialVault: Send + Sync {
    /// Look up a cached value; `Ok(None)` when nothing is stored
    fn get(&self, context_id: &str, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any previous one
    fn set(&self, context_id: &str, key: &str, value: &str) -> Result<()>;
}

type Entries = BTreeMap<String, BTreeMap<String, String>>;

/// Vault persisted as a JSON document readable only by the current user
pub struct FileVault {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl FileVault {
    /// Open the vault at `path`, loading existing entries if the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Entries::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Entries::new()
        };

        debug!(
            "Opened credential vault {} ({} context(s))",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &Entries) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(parent, fs::Permissions::from_mode(0o700))?;
                }
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

impl CredentialVault for FileVault {
    fn get(&self, context_id: &str, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .get(context_id)
            .and_then(|scope| scope.get(key))
            .cloned())
    }

    fn set(&self, context_id: &str, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(context_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }
}

impl std::fmt::Debug for FileVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileVault")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
