//! Catalog manifest
//!
//! The catalog is the local record of every tracked file: which store it is
//! bound to and the store-owned metadata needed to find it again. It lives
//! next to the tracked files (default `.cfgsync.yml`) and is meant to be
//! committed, so it carries a header explaining what deleting it means.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Catalog schema version written by this release
pub const CATALOG_VERSION: &str = "v1";

/// Default catalog file name
pub const DEFAULT_CATALOG_NAME: &str = ".cfgsync.yml";

const HEADER: &str = "\
# This catalog lists files stored remotely, keyed by their location relative to this file.
# To restore the files, run 'cfgsync pull' in the same directory as this catalog.
# If this file is deleted without running 'cfgsync purge' first, the remote contents
# will be orphaned with no way to recover them.
";

/// Kind of tracked file, drives which stores are eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// `KEY=value` dotenv file
    Env,
    /// JSON document
    Json,
    /// Anything else, stored as opaque bytes
    #[default]
    Generic,
}

impl FileType {
    /// Infer the file type from its path
    pub fn from_path(path: &str) -> Self {
        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if name == ".env" || name.starts_with(".env.") || name.ends_with(".env") {
            FileType::Env
        } else if name.ends_with(".json") {
            FileType::Json
        } else {
            FileType::Generic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Env => "env",
            FileType::Json => "json",
            FileType::Generic => "generic",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tracked local file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Local path, relative to the catalog
    #[serde(default)]
    pub path: String,

    /// Name of the bound store; empty until a store is chosen
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub store: String,

    #[serde(rename = "type", default)]
    pub file_type: FileType,

    /// Store-owned metadata (remote coordinates, per-key classifications)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,

    /// Version labels pushed to a store with versioning support
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<String>,
}

impl File {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let file_type = FileType::from_path(&path);
        Self {
            path,
            store: String::new(),
            file_type,
            data: BTreeMap::new(),
            versions: Vec::new(),
        }
    }

    /// Whether the file holds `KEY=value` pairs
    pub fn is_env(&self) -> bool {
        self.file_type == FileType::Env
    }

    /// Whether a store has been chosen for this file
    pub fn is_bound(&self) -> bool {
        !self.store.is_empty()
    }

    /// Record a pushed version label, ignoring duplicates
    pub fn add_version(&mut self, version: impl Into<String>) {
        let version = version.into();
        if !self.versions.contains(&version) {
            self.versions.push(version);
        }
    }
}

fn default_version() -> String {
    CATALOG_VERSION.to_string()
}

/// Root manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default = "default_version")]
    pub version: String,

    /// Opaque id scoping cached credentials and remote keys for this catalog
    #[serde(default)]
    pub context: String,

    #[serde(default)]
    pub files: BTreeMap<String, File>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create an empty catalog with a fresh context id
    pub fn new() -> Self {
        Self {
            version: CATALOG_VERSION.to_string(),
            context: Uuid::new_v4().to_string(),
            files: BTreeMap::new(),
        }
    }

    /// Read a catalog from disk
    pub fn read(path: &Path) -> Result<Self> {
        read(path)
    }

    /// Read the catalog at `path`, or start a new one if it does not exist yet
    pub fn load_or_new(path: &Path) -> Result<Self> {
        if path.exists() {
            read(path)
        } else {
            debug!("No catalog at {}, starting a new one", path.display());
            Ok(Self::new())
        }
    }

    /// Write the catalog to disk
    pub fn write(&self, path: &Path) -> Result<()> {
        write(path, self)
    }

    /// Key used by stores to namespace remote content for a tracked file
    pub fn context_key(&self, path: &str) -> String {
        format!("{}/{}", self.context, path.trim_start_matches("./"))
    }

    pub fn file(&self, path: &str) -> Option<&File> {
        self.files.get(path)
    }

    /// Register a file for tracking, returning the existing entry if present
    pub fn add_file(&mut self, path: &str) -> &mut File {
        self.files
            .entry(path.to_string())
            .or_insert_with(|| File::new(path))
    }

    /// Insert or replace an entry, keyed by its path
    pub fn upsert(&mut self, file: File) {
        self.files.insert(file.path.clone(), file);
    }

    /// Stop tracking a file
    pub fn remove_file(&mut self, path: &str) -> Option<File> {
        self.files.remove(path)
    }

    /// Enforce `key == file.path` for every entry
    fn normalize(&mut self) -> Result<()> {
        if self.version != CATALOG_VERSION {
            return Err(Error::invalid_catalog(format!(
                "unsupported catalog version '{}' (expected {})",
                self.version, CATALOG_VERSION
            )));
        }

        if self.context.trim().is_empty() {
            return Err(Error::invalid_catalog("missing context id"));
        }

        for (key, file) in self.files.iter_mut() {
            if file.path.is_empty() {
                file.path = key.clone();
            } else if &file.path != key {
                return Err(Error::invalid_catalog(format!(
                    "entry '{}' has mismatched path '{}'",
                    key, file.path
                )));
            }
        }

        Ok(())
    }
}

/// Serialize the catalog as commented YAML and write it in one go
pub fn write(path: &Path, catalog: &Catalog) -> Result<()> {
    let body = serde_yaml_ng::to_string(catalog)?;
    let mut content = String::with_capacity(HEADER.len() + body.len());
    content.push_str(HEADER);
    content.push_str(&body);

    fs::write(path, content)?;
    debug!(
        "Wrote catalog with {} file(s) to {}",
        catalog.files.len(),
        path.display()
    );
    Ok(())
}

/// Read and validate a catalog file
pub fn read(path: &Path) -> Result<Catalog> {
    let content = fs::read_to_string(path)?;
    let mut catalog: Catalog = serde_yaml_ng::from_str(&content)?;
    catalog.normalize()?;
    Ok(catalog)
}
