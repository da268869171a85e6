//! Shipment environment store
//!
//! Keys from a `.env` file are stored as environment variables on one
//! container of a shipment environment in the shipment management service.
//!
//! Authentication uses a login id and password exchanged for a temporary
//! token. The token is cached in the credential vault and re-validated on
//! every run; when it has expired the user is asked to log in again.

use crate::envfile::{self, MODIFIED_KEY};
use crate::traits::{Attributes, PushOutcome, Store};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use cfgsync_core::config::ShipmentSettings;
use cfgsync_core::{CredentialVault, File, FileType, PromptOptions, Prompter, UserOptions};
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const USER_KEY: &str = "SHIPMENT_USER";
const TOKEN_KEY: &str = "SHIPMENT_TOKEN";
const PASS_KEY: &str = "SHIPMENT_PASS";

/// Catalog `data` key holding the shipment name
pub const SHIPMENT_KEY: &str = "SHIPMENT_NAME";
/// Catalog `data` key holding the container name
pub const CONTAINER_KEY: &str = "SHIPMENT_CONTAINER";
/// Catalog `data` key holding the environment name
pub const ENVIRONMENT_KEY: &str = "SHIPMENT_ENV";

/// Which container's environment a file maps to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShipmentCoordinates {
    pub shipment: String,
    pub container: String,
    pub environment: String,
}

impl ShipmentCoordinates {
    /// Read coordinates from `data`, prompting for any that are missing
    pub fn resolve(
        data: &BTreeMap<String, String>,
        options: &UserOptions,
        prompt: &dyn Prompter,
    ) -> Result<Self> {
        let lookup = |key: &str, description: &str| -> Result<String> {
            match data.get(key).filter(|v| !v.is_empty()) {
                Some(value) => Ok(value.clone()),
                None => Ok(options.ask(prompt, key, &PromptOptions::new(description))?),
            }
        };

        Ok(Self {
            shipment: lookup(SHIPMENT_KEY, "Shipment that owns the container")?,
            container: lookup(CONTAINER_KEY, "Container receiving the environment variables")?,
            environment: lookup(ENVIRONMENT_KEY, "Shipment environment (e.g. dev, qa, prod)")?,
        })
    }

    pub fn to_data(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (SHIPMENT_KEY.to_string(), self.shipment.clone()),
            (CONTAINER_KEY.to_string(), self.container.clone()),
            (ENVIRONMENT_KEY.to_string(), self.environment.clone()),
        ])
    }
}

#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
struct Session {
    user: String,
    token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session(user={}, token=[REDACTED])", self.user)
    }
}

/// One environment variable as the service represents it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct ShipmentEnvironment {
    #[serde(default)]
    containers: Vec<Container>,
}

#[derive(Debug, Deserialize)]
struct Container {
    name: String,
    #[serde(default, rename = "envVars")]
    env_vars: Vec<EnvVar>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct TokenCheck<'a> {
    username: &'a str,
    token: &'a str,
}

/// Store backed by shipment container environment variables
#[derive(Debug)]
pub struct ShipmentStore {
    client: Client,
    auth_url: Option<String>,
    api_url: Option<String>,
    session: Session,
    coordinates: ShipmentCoordinates,
}

impl ShipmentStore {
    pub fn new(settings: &ShipmentSettings) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            auth_url: settings.auth_url.clone(),
            api_url: settings.api_url.clone(),
            session: Session::default(),
            coordinates: ShipmentCoordinates::default(),
        })
    }

    /// Create a store talking to explicit endpoints
    pub fn with_endpoints(auth_url: impl Into<String>, api_url: impl Into<String>) -> Result<Self> {
        Self::new(&ShipmentSettings {
            auth_url: Some(auth_url.into()),
            api_url: Some(api_url.into()),
        })
    }

    /// Whether both service endpoints are known
    pub fn is_configured(&self) -> bool {
        self.auth_url.is_some() && self.api_url.is_some()
    }

    /// Coordinates resolved by the last `pre`
    pub fn coordinates(&self) -> &ShipmentCoordinates {
        &self.coordinates
    }

    fn auth_url(&self) -> Result<&str> {
        self.auth_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .ok_or_else(|| anyhow!("shipment auth URL not configured (set CFGSYNC_SHIPMENT_AUTH_URL)"))
    }

    fn api_url(&self) -> Result<&str> {
        self.api_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .ok_or_else(|| anyhow!("shipment API URL not configured (set CFGSYNC_SHIPMENT_API_URL)"))
    }

    fn environment_url(&self) -> Result<String> {
        Ok(format!(
            "{}/v1/shipment/{}/environment/{}",
            self.api_url()?,
            self.coordinates.shipment,
            self.coordinates.environment
        ))
    }

    fn container_url(&self) -> Result<String> {
        Ok(format!(
            "{}/container/{}",
            self.environment_url()?,
            self.coordinates.container
        ))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("x-token", &self.session.token)
            .header("x-username", &self.session.user)
            .header("Content-Type", "application/json")
    }

    async fn is_authenticated(&self, user: &str, token: &str) -> Result<bool> {
        let url = format!("{}/v1/auth/checktoken", self.auth_url()?);
        let resp = self
            .client
            .post(&url)
            .json(&TokenCheck {
                username: user,
                token,
            })
            .send()
            .await
            .context("Failed to reach shipment auth service")?;

        Ok(resp.status().is_success())
    }

    async fn login(&self, user: &str, password: &str) -> Result<String> {
        let url = format!("{}/v1/auth/gettoken", self.auth_url()?);
        let resp = self
            .client
            .post(&url)
            .json(&LoginRequest {
                username: user,
                password,
            })
            .send()
            .await
            .context("Failed to reach shipment auth service")?;

        if !resp.status().is_success() {
            return Err(anyhow!("login rejected: {}", resp.status()));
        }

        let body: LoginResponse = resp.json().await.context("Invalid login response")?;
        if body.token.is_empty() {
            return Err(anyhow!("login returned an empty token"));
        }
        Ok(body.token)
    }

    async fn create_key(&self, var: &EnvVar) -> Result<()> {
        let url = format!("{}/envVars", self.container_url()?);
        let resp = self.request(Method::POST, &url).json(var).send().await?;

        if resp.status() != StatusCode::CREATED {
            return Err(anyhow!("{}", resp.status()));
        }
        Ok(())
    }

    async fn update_key(&self, var: &EnvVar) -> Result<()> {
        let url = format!("{}/envVar/{}", self.container_url()?, var.name);
        let resp = self.request(Method::PUT, &url).json(var).send().await?;

        if resp.status() != StatusCode::OK {
            return Err(anyhow!("{}", resp.status()));
        }
        Ok(())
    }

    /// Create the key, falling back to an update when creation is refused
    async fn upsert_key(&self, var: &EnvVar) -> Result<()> {
        if let Err(e) = self.create_key(var).await {
            debug!("Create of {} failed ({}), updating instead", var.name, e);
            self.update_key(var)
                .await
                .with_context(|| format!("Failed to write {}", var.name))?;
        }
        Ok(())
    }

    async fn delete_key(&self, name: &str) -> Result<()> {
        let url = format!("{}/envVar/{}", self.container_url()?, name);
        let resp = self.request(Method::DELETE, &url).send().await?;

        if resp.status() != StatusCode::OK {
            return Err(anyhow!("Failed to delete {}: {}", name, resp.status()));
        }
        Ok(())
    }

    /// Every environment variable currently set on the target container
    pub async fn remote_keys(&self) -> Result<BTreeMap<String, EnvVar>> {
        let url = self.environment_url()?;
        let resp = self.request(Method::GET, &url).send().await?;

        if resp.status() != StatusCode::OK {
            return Err(anyhow!("Failed to read environment: {}", resp.status()));
        }

        let env: ShipmentEnvironment = resp
            .json()
            .await
            .context("Invalid shipment environment response")?;

        let keys = env
            .containers
            .into_iter()
            .filter(|c| c.name == self.coordinates.container)
            .flat_map(|c| c.env_vars)
            .map(|var| (var.name.clone(), var))
            .collect();

        Ok(keys)
    }
}

#[async_trait]
impl Store for ShipmentStore {
    fn name(&self) -> &'static str {
        "shipment"
    }

    fn description(&self) -> &'static str {
        "Environment variables listed in a .env file are stored on a shipment container. \
         A login id and password are requested when no valid token is cached; a shipment, \
         environment, and container identify which container receives the variables."
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
        self.session = Session::default();
        self.coordinates = ShipmentCoordinates::default();

        if !self.is_configured() {
            return Err(anyhow!(
                "Shipment service endpoints are not configured \
                 (set shipment.auth-url and shipment.api-url, or CFGSYNC_SHIPMENT_AUTH_URL and CFGSYNC_SHIPMENT_API_URL)"
            ));
        }

        let user = vault.get(context_id, USER_KEY)?.unwrap_or_default();
        let token = vault.get(context_id, TOKEN_KEY)?.unwrap_or_default();

        let mut authenticated = false;
        if !user.is_empty() && !token.is_empty() {
            authenticated = self
                .is_authenticated(&user, &token)
                .await
                .unwrap_or_else(|e| {
                    warn!("Could not validate cached shipment token: {}", e);
                    false
                });
        }

        if authenticated {
            debug!("Using cached shipment token for {}", user);
            self.session = Session { user, token };
        } else {
            let user = options.ask(
                prompt,
                USER_KEY,
                &PromptOptions::new("Login id for the shipment service"),
            )?;
            let password = Zeroizing::new(options.ask(
                prompt,
                PASS_KEY,
                &PromptOptions::new("Password").secret(),
            )?);

            let token = self.login(&user, &password).await?;
            vault.set(context_id, USER_KEY, &user)?;
            vault.set(context_id, TOKEN_KEY, &token)?;
            info!("Authenticated with shipment service as {}", user);
            self.session = Session { user, token };
        }

        self.coordinates = ShipmentCoordinates::resolve(&file.data, options, prompt)?;
        file.data.extend(self.coordinates.to_data());
        Ok(())
    }

    async fn push(&self, _context_key: &str, file: &File, contents: &[u8]) -> Result<PushOutcome> {
        let mut data = self.coordinates.to_data();

        let mut local = envfile::parse(contents)?;
        local.insert(MODIFIED_KEY.to_string(), envfile::format_modified(Utc::now()));

        for (key, value) in &local {
            let class = envfile::classify(&file.data, key);
            let var = EnvVar {
                name: key.clone(),
                value: value.clone(),
                kind: class.to_string(),
            };

            self.upsert_key(&var).await?;
            data.insert(envfile::prefixed(key), class.to_string());
        }

        let remote = self.remote_keys().await?;
        for name in remote.keys() {
            if envfile::is_owned(&file.data, name) && !local.contains_key(name) {
                info!("Deleting {} from {}", name, self.coordinates.container);
                self.delete_key(name).await?;
            }
        }

        Ok(PushOutcome {
            data,
            versioned: false,
        })
    }

    async fn pull(&self, _context_key: &str, file: &File) -> Result<(Vec<u8>, Attributes)> {
        let remote = self.remote_keys().await?;

        let body = envfile::render(
            remote
                .iter()
                .filter(|(name, _)| name.as_str() != MODIFIED_KEY)
                .filter(|(name, _)| envfile::is_owned(&file.data, name))
                .map(|(name, var)| (name.as_str(), var.value.as_str())),
        );

        let last_modified = match remote.get(MODIFIED_KEY) {
            Some(var) => envfile::parse_modified(&var.value).unwrap_or_else(|| {
                warn!("Unreadable {} value '{}', assuming now", MODIFIED_KEY, var.value);
                Utc::now()
            }),
            None => Utc::now(),
        };

        Ok((body, Attributes { last_modified }))
    }

    async fn purge(&self, _context_key: &str, file: &File) -> Result<()> {
        for name in envfile::owned_keys(&file.data) {
            info!("Deleting {} from {}", name, self.coordinates.container);
            self.delete_key(name).await?;
        }
        Ok(())
    }
}
