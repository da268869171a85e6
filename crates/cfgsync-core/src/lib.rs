//! # cfgsync-core
//!
//! Core library for the cfgsync CLI providing:
//! - The catalog manifest (tracked files, store bindings, per-file metadata)
//! - Settings loading (defaults, `~/.cfgsync/config.yaml`, `CFGSYNC_*` overrides)
//! - The prompt and credential-vault collaborator traits used by stores

pub mod catalog;
pub mod config;
pub mod error;
pub mod prompt;
pub mod vault;

pub use catalog::{Catalog, File, FileType};
pub use config::{Settings, UserOptions};
pub use error::{Error, Result};
pub use prompt::{PromptOptions, Prompter};
pub use vault::{CredentialVault, FileVault};
