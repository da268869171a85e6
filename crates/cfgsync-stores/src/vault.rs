//! HashiCorp Vault KV v2 store
//!
//! Keys of a `.env` file are merged into one KV v2 secret whose path is the
//! file's context key. Keys the file does not own are left untouched.

use crate::envfile::{self, MODIFIED_KEY};
use crate::traits::{Attributes, PushOutcome, Store};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use cfgsync_core::config::VaultSettings;
use cfgsync_core::{CredentialVault, File, FileType, PromptOptions, Prompter, UserOptions};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use vaultrs::client::{Client, VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::{kv2, token};
use zeroize::Zeroizing;

const ADDR_KEY: &str = "VAULT_ADDR";
const TOKEN_KEY: &str = "VAULT_TOKEN";

/// Catalog `data` key holding the KV v2 mount
pub const MOUNT_KEY: &str = "VAULT_MOUNT";

type Secret = BTreeMap<String, String>;

/// Merge local pairs into an existing secret
///
/// Keys `old_data` does not own survive; owned keys missing from `local`
/// are dropped.
pub fn reconcile(existing: &Secret, old_data: &BTreeMap<String, String>, local: &Secret) -> Secret {
    let mut merged: Secret = existing
        .iter()
        .filter(|(key, _)| !envfile::is_owned(old_data, key) || local.contains_key(*key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    merged.extend(local.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Store backed by a Vault KV v2 secret
pub struct VaultStore {
    settings: VaultSettings,
    client: Option<VaultClient>,
    mount: String,
}

impl VaultStore {
    pub fn new(settings: &VaultSettings) -> Self {
        Self {
            settings: settings.clone(),
            client: None,
            mount: settings.mount.clone(),
        }
    }

    /// Point the store at `address`, authenticating requests with `token`
    ///
    /// The token is not checked here; `pre` validates it before use.
    pub fn connect(&mut self, address: &str, token: &str) -> Result<()> {
        let mut settings = VaultClientSettingsBuilder::default();
        settings.address(address);

        let mut client = VaultClient::new(settings.build()?)?;
        client.set_token(token);
        self.client = Some(client);
        Ok(())
    }

    async fn validate_token(&self, token: &str) -> Result<()> {
        token::lookup(self.client()?, token)
            .await
            .context("Token validation failed")?;
        Ok(())
    }

    fn client(&self) -> Result<&VaultClient> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("Vault store used before pre"))
    }

    /// Current secret contents; empty when the secret does not exist yet
    async fn read_secret(&self, path: &str) -> Result<Secret> {
        match kv2::read::<Secret>(self.client()?, &self.mount, path).await {
            Ok(secret) => Ok(secret),
            Err(ClientError::APIError { code: 404, .. }) => {
                debug!("No secret at {}/{}", self.mount, path);
                Ok(Secret::new())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}/{}", self.mount, path)),
        }
    }

    async fn write_secret(&self, path: &str, secret: &Secret) -> Result<()> {
        kv2::set(self.client()?, &self.mount, path, secret)
            .await
            .with_context(|| format!("Failed to write {}/{}", self.mount, path))?;
        Ok(())
    }
}

#[async_trait]
impl Store for VaultStore {
    fn name(&self) -> &'static str {
        "vault"
    }

    fn description(&self) -> &'static str {
        "Keys of a .env file are stored in a HashiCorp Vault KV v2 secret. \
         The address comes from settings (or VAULT_ADDR) and a token is requested \
         when no valid one is cached."
    }

    fn can_handle_file(&self, file: &File) -> bool {
        file.is_env()
    }

    fn supports_file_type(&self, file_type: FileType) -> bool {
        file_type == FileType::Env
    }

    async fn pre(
        &mut self,
        context_id: &str,
        file: &mut File,
        vault: &dyn CredentialVault,
        options: &UserOptions,
        prompt: &dyn Prompter,
    ) -> Result<()> {
        self.client = None;

        let address = match self.settings.address.clone().filter(|a| !a.is_empty()) {
            Some(address) => address,
            None => match vault.get(context_id, ADDR_KEY)? {
                Some(address) if !address.is_empty() => address,
                _ => {
                    let address =
                        options.ask(prompt, ADDR_KEY, &PromptOptions::new("Vault server address"))?;
                    vault.set(context_id, ADDR_KEY, &address)?;
                    address
                }
            },
        };

        let cached = Zeroizing::new(vault.get(context_id, TOKEN_KEY)?.unwrap_or_default());
        if !cached.is_empty() {
            self.connect(&address, &cached)?;
            match self.validate_token(&cached).await {
                Ok(()) => debug!("Using cached Vault token for {}", address),
                Err(e) => {
                    warn!("Cached Vault token rejected: {:#}", e);
                    self.client = None;
                }
            }
        }

        if self.client.is_none() {
            let token = Zeroizing::new(options.ask(
                prompt,
                TOKEN_KEY,
                &PromptOptions::new("Vault token").secret(),
            )?);
            self.connect(&address, &token)?;
            if let Err(e) = self.validate_token(&token).await {
                self.client = None;
                return Err(e);
            }
            vault.set(context_id, TOKEN_KEY, &token)?;
            info!("Authenticated with Vault at {}", address);
        }

        self.mount = file
            .data
            .get(MOUNT_KEY)
            .filter(|m| !m.is_empty())
            .cloned()
            .unwrap_or_else(|| self.settings.mount.clone());
        file.data.insert(MOUNT_KEY.to_string(), self.mount.clone());
        Ok(())
    }

    async fn push(&self, context_key: &str, file: &File, contents: &[u8]) -> Result<PushOutcome> {
        let mut local = envfile::parse(contents)?;

        let mut data = BTreeMap::from([(MOUNT_KEY.to_string(), self.mount.clone())]);
        for key in local.keys() {
            data.insert(envfile::prefixed(key), "env".to_string());
        }

        local.insert(MODIFIED_KEY.to_string(), envfile::format_modified(Utc::now()));

        let existing = self.read_secret(context_key).await?;
        let merged = reconcile(&existing, &file.data, &local);
        self.write_secret(context_key, &merged).await?;

        Ok(PushOutcome {
            data,
            versioned: false,
        })
    }

    async fn pull(&self, context_key: &str, file: &File) -> Result<(Vec<u8>, Attributes)> {
        let secret = self.read_secret(context_key).await?;

        let body = envfile::render(
            secret
                .iter()
                .filter(|(key, _)| envfile::is_owned(&file.data, key))
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );

        let last_modified = secret
            .get(MODIFIED_KEY)
            .and_then(|v| envfile::parse_modified(v))
            .unwrap_or_else(Utc::now);

        Ok((body, Attributes { last_modified }))
    }

    async fn purge(&self, context_key: &str, file: &File) -> Result<()> {
        let mut secret = self.read_secret(context_key).await?;
        for key in envfile::owned_keys(&file.data) {
            secret.remove(key);
        }
        secret.remove(MODIFIED_KEY);

        if secret.is_empty() {
            info!("Deleting secret {}/{}", self.mount, context_key);
            kv2::delete_metadata(self.client()?, &self.mount, context_key)
                .await
                .with_context(|| format!("Failed to delete {}/{}", self.mount, context_key))?;
        } else {
            info!(
                "Removing owned keys from {}/{} ({} other key(s) kept)",
                self.mount,
                context_key,
                secret.len()
            );
            self.write_secret(context_key, &secret).await?;
        }
        Ok(())
    }
}
