//! Store trait definitions

use anyhow::Result;
use async_trait::async_trait;
use cfgsync_core::{CredentialVault, File, FileType, Prompter, UserOptions};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Remote attributes reported by a pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    /// When the remote content was last written
    pub last_modified: DateTime<Utc>,
}

impl Attributes {
    pub fn now() -> Self {
        Self {
            last_modified: Utc::now(),
        }
    }
}

/// Result of a successful push
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// Replacement for the file's catalog `data`
    pub data: BTreeMap<String, String>,
    /// Whether the store keeps distinct versions of pushed content
    pub versioned: bool,
}

/// Store trait for remote backends
///
/// `pre` must run before any of the remote operations; it establishes the
/// session (credentials, remote coordinates) the other calls rely on.
#[async_trait]
pub trait Store: Send + Sync {
    /// Unique, stable name persisted in the catalog binding
    fn name(&self) -> &'static str;

    /// Static help text
    fn description(&self) -> &'static str;

    /// Whether this store can hold the given file
    fn can_handle_file(&self, file: &File) -> bool;

    /// Whether this store accepts files of the given type
    fn supports_file_type(&self, file_type: FileType) -> bool;

    /// Authenticate and resolve the remote coordinates for `file`
    ///
    /// Cached credentials are read from `vault` under `context_id`; missing
    /// or rejected ones are collected through `prompt` and written back.
    /// Coordinates are read from `file.data` or prompted for and recorded
    /// into `file.data`.
    async fn pre(
        &mut self,
        context_id: &str,
        file: &mut File,
        vault: &dyn CredentialVault,
        options: &UserOptions,
        prompt: &dyn Prompter,
    ) -> Result<()>;

    /// Reconcile remote state with the local file contents
    async fn push(&self, context_key: &str, file: &File, contents: &[u8]) -> Result<PushOutcome>;

    /// Rebuild the local file contents from remote state
    async fn pull(&self, context_key: &str, file: &File) -> Result<(Vec<u8>, Attributes)>;

    /// Delete everything this file owns remotely
    async fn purge(&self, context_key: &str, file: &File) -> Result<()>;

    /// Report externally settable tokens
    fn get_tokens(&self, _tokens: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }

    /// Accept externally supplied tokens
    fn set_tokens(
        &mut self,
        _tokens: &BTreeMap<String, String>,
        _always: bool,
    ) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }
}
