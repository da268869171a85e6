//! Command implementations

pub mod list;
pub mod pull;
pub mod purge;
pub mod push;
pub mod stores;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use cfgsync_core::{Catalog, FileVault, Settings};
use cfgsync_stores::StoreRegistry;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::output;
use crate::prompt::TerminalPrompter;

/// Options shared by every subcommand
#[derive(Debug, Default)]
pub struct GlobalArgs {
    pub catalog: Option<Utf8PathBuf>,
    pub settings: Option<Utf8PathBuf>,
}

impl GlobalArgs {
    pub fn load_settings(&self) -> Result<Settings> {
        let settings = Settings::load(self.settings.as_deref().map(|p| p.as_std_path()))?;
        Ok(settings)
    }

    /// Catalog location: `--catalog`, else the settings' catalog name in the working directory
    pub fn catalog_path(&self, settings: &Settings) -> PathBuf {
        match &self.catalog {
            Some(path) => path.clone().into_std_path_buf(),
            None => PathBuf::from(&settings.catalog),
        }
    }
}

/// Everything a sync command needs for one run
pub struct Workspace {
    pub catalog_path: PathBuf,
    pub catalog: Catalog,
    pub registry: StoreRegistry,
    pub vault: FileVault,
    pub prompt: TerminalPrompter,
}

impl Workspace {
    /// Load settings, catalog, stores and the credential vault
    ///
    /// With `create` a missing catalog starts out empty; otherwise it must exist.
    pub fn open(global: &GlobalArgs, create: bool) -> Result<Self> {
        let settings = global.load_settings()?;
        let catalog_path = global.catalog_path(&settings);

        let catalog = if create {
            Catalog::load_or_new(&catalog_path)?
        } else {
            Catalog::read(&catalog_path)
                .with_context(|| format!("Failed to read catalog {}", catalog_path.display()))?
        };
        debug!(
            "Catalog {} (context {}) tracks {} file(s)",
            catalog_path.display(),
            catalog.context,
            catalog.files.len()
        );

        let vault = FileVault::open(settings.credentials_file()?)?;
        let registry = StoreRegistry::with_defaults(&settings)?;

        Ok(Self {
            catalog_path,
            catalog,
            registry,
            vault,
            prompt: TerminalPrompter,
        })
    }

    /// Directory tracked paths are relative to
    pub fn root(&self) -> &Path {
        base_dir(&self.catalog_path)
    }

    pub fn save(&self) -> Result<()> {
        self.catalog
            .write(&self.catalog_path)
            .with_context(|| format!("Failed to write catalog {}", self.catalog_path.display()))
    }
}

fn base_dir(catalog_path: &Path) -> &Path {
    match catalog_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Catalog key for a user-supplied path
pub fn normalize_path(path: &str) -> String {
    path.trim_start_matches("./").to_string()
}

/// Requested paths, or every tracked path when none were given
pub fn target_paths(catalog: &Catalog, paths: &[String]) -> Vec<String> {
    if paths.is_empty() {
        catalog.files.keys().cloned().collect()
    } else {
        paths.iter().map(|p| normalize_path(p)).collect()
    }
}

/// Print the run summary and turn per-file failures into the exit status
pub fn finish(action: &str, succeeded: usize, failed: usize) -> Result<()> {
    if failed > 0 {
        anyhow::bail!(
            "{} {}, {} failed",
            action,
            output::file_count(succeeded),
            failed
        );
    }
    output::success(&format!("{} {}", action, output::file_count(succeeded)));
    Ok(())
}
