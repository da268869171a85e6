//! Store registry and per-file store selection

use crate::s3::S3Store;
use crate::shipment::ShipmentStore;
use crate::traits::Store;
use crate::vault::VaultStore;
use cfgsync_core::{
    Catalog, CredentialVault, Error, File, PromptOptions, Prompter, Result, Settings, UserOptions,
};
use std::collections::BTreeMap;
use tracing::debug;

const DEFAULT_STORE: &str = "s3";

/// Registered store adapters, keyed by their unique name
pub struct StoreRegistry {
    stores: BTreeMap<&'static str, Box<dyn Store>>,
    default_store: String,
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            stores: BTreeMap::new(),
            default_store: DEFAULT_STORE.to_string(),
        }
    }

    /// Registry holding the built-in adapters, configured from `settings`
    pub fn with_defaults(settings: &Settings) -> Result<Self> {
        let mut registry = Self::new().with_default_store(&settings.default_store);
        registry.register(Box::new(ShipmentStore::new(&settings.shipment)?));
        registry.register(Box::new(S3Store::new(&settings.s3)));
        registry.register(Box::new(VaultStore::new(&settings.vault)));
        Ok(registry)
    }

    /// Store suggested when an unbound file is pushed
    pub fn with_default_store(mut self, name: impl Into<String>) -> Self {
        self.default_store = name.into();
        self
    }

    /// Add an adapter, replacing any registered under the same name
    pub fn register(&mut self, store: Box<dyn Store>) {
        let name = store.name();
        if self.stores.insert(name, store).is_some() {
            debug!("Replaced store adapter {}", name);
        }
    }

    /// All registered adapters
    pub fn get(&self) -> &BTreeMap<&'static str, Box<dyn Store>> {
        &self.stores
    }

    /// Resolve the adapter for `file` and prepare it with `pre`
    ///
    /// A file already bound to a store must name a registered adapter. An
    /// unbound file is offered the adapters supporting its type, and the
    /// chosen name is recorded in `file.store` once `pre` succeeds.
    pub async fn select(
        &mut self,
        file: &mut File,
        catalog: &Catalog,
        vault: &dyn CredentialVault,
        options: &UserOptions,
        prompt: &dyn Prompter,
    ) -> Result<&mut (dyn Store + 'static)> {
        let name = if file.is_bound() {
            if !self.stores.contains_key(file.store.as_str()) {
                return Err(Error::store_not_found(&file.store));
            }
            file.store.clone()
        } else {
            self.choose(file, options, prompt)?
        };

        let store = self
            .stores
            .get_mut(name.as_str())
            .ok_or_else(|| Error::store_not_found(&name))?;

        debug!("Preparing store {} for {}", name, file.path);
        store.pre(&catalog.context, file, vault, options, prompt).await?;

        if !file.is_bound() {
            file.store = name;
        }
        Ok(store.as_mut())
    }

    /// Ask which capable adapter an unbound file should use
    fn choose(&self, file: &File, options: &UserOptions, prompt: &dyn Prompter) -> Result<String> {
        let supported: Vec<&str> = self
            .stores
            .iter()
            .filter(|(_, store)| store.supports_file_type(file.file_type))
            .map(|(name, _)| *name)
            .collect();

        let default = options
            .store
            .clone()
            .unwrap_or_else(|| self.default_store.clone());

        let opts = PromptOptions::new(format!(
            "The remote storage solution where {} data will be pushed. ({})",
            file.path,
            supported.join(", ")
        ))
        .with_default(default);

        let answer = options.ask(prompt, "Remote Store", &opts)?;
        let answer = answer.trim();

        if !supported.contains(&answer) {
            return Err(Error::store_not_found(answer));
        }
        Ok(answer.to_string())
    }
}
