//! Common test helpers for cfgsync-stores integration tests
//!
//! - In-memory credential vault
//! - Scripted prompter answering by value name and recording what was asked
//! - Shipment service mocks and a ready-to-use authenticated store

#![allow(dead_code)]

use cfgsync_core::{CredentialVault, Error, File, PromptOptions, Prompter, UserOptions};
use cfgsync_stores::shipment::{ShipmentStore, CONTAINER_KEY, ENVIRONMENT_KEY, SHIPMENT_KEY};
use cfgsync_stores::Store;
use std::collections::BTreeMap;
use std::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CONTEXT_ID: &str = "3f1c2b1e-8d2a-4c55-9f7a-2d3e4f5a6b7c";
pub const SHIPMENT: &str = "billing";
pub const CONTAINER: &str = "api";
pub const ENVIRONMENT: &str = "dev";

// ─── Credential vault ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryVault {
    entries: Mutex<BTreeMap<(String, String), String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, context_id: &str, key: &str, value: &str) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert((context_id.to_string(), key.to_string()), value.to_string());
        self
    }

    pub fn value(&self, context_id: &str, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(&(context_id.to_string(), key.to_string()))
            .cloned()
    }
}

impl CredentialVault for MemoryVault {
    fn get(&self, context_id: &str, key: &str) -> cfgsync_core::Result<Option<String>> {
        Ok(self.value(context_id, key))
    }

    fn set(&self, context_id: &str, key: &str, value: &str) -> cfgsync_core::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert((context_id.to_string(), key.to_string()), value.to_string());
        Ok(())
    }
}

// ─── Prompter ────────────────────────────────────────────────────────────────

/// Answers prompts from a fixed table; unknown names fail like a closed terminal
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: BTreeMap<String, String>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, name: &str, value: &str) -> Self {
        self.answers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn get_val_from_user(&self, name: &str, _opts: &PromptOptions) -> cfgsync_core::Result<String> {
        self.asked.lock().unwrap().push(name.to_string());
        self.answers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::missing_value(name))
    }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// An env file already bound to the shipment store with its coordinates recorded
pub fn bound_env_file(owned: &[(&str, &str)]) -> File {
    let mut file = File::new(".env");
    file.store = "shipment".to_string();
    file.data.insert(SHIPMENT_KEY.to_string(), SHIPMENT.to_string());
    file.data.insert(CONTAINER_KEY.to_string(), CONTAINER.to_string());
    file.data.insert(ENVIRONMENT_KEY.to_string(), ENVIRONMENT.to_string());
    for (key, class) in owned {
        file.data.insert(format!("ENV_{}", key), class.to_string());
    }
    file
}

// ─── Shipment service mocks ──────────────────────────────────────────────────

pub fn environment_path() -> String {
    format!("/v1/shipment/{}/environment/{}", SHIPMENT, ENVIRONMENT)
}

pub fn container_path() -> String {
    format!("{}/container/{}", environment_path(), CONTAINER)
}

pub fn var_path(name: &str) -> String {
    format!("{}/envVar/{}", container_path(), name)
}

/// Environment listing with the given variables on the target container
pub fn environment_body(vars: &[(&str, &str)]) -> serde_json::Value {
    let env_vars: Vec<serde_json::Value> = vars
        .iter()
        .map(|(name, value)| serde_json::json!({"name": name, "value": value, "type": "hidden"}))
        .collect();

    serde_json::json!({
        "containers": [
            {"name": CONTAINER, "envVars": env_vars},
            {"name": "worker", "envVars": [{"name": "OTHER", "value": "x", "type": "basic"}]}
        ]
    })
}

pub async fn mock_token_check(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/v1/auth/checktoken"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub async fn mock_environment(server: &MockServer, vars: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path(environment_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(environment_body(vars)))
        .mount(server)
        .await;
}

/// Store that has completed `pre` against `server` using a cached token
pub async fn authenticated_store(server: &MockServer, file: &mut File) -> ShipmentStore {
    mock_token_check(server, 200).await;

    let vault = MemoryVault::new()
        .with(CONTEXT_ID, "SHIPMENT_USER", "alice")
        .with(CONTEXT_ID, "SHIPMENT_TOKEN", "tok-cached");

    let mut store = ShipmentStore::with_endpoints(server.uri(), server.uri()).unwrap();
    store
        .pre(
            CONTEXT_ID,
            file,
            &vault,
            &UserOptions::default(),
            &ScriptedPrompter::new(),
        )
        .await
        .unwrap();
    store
}
