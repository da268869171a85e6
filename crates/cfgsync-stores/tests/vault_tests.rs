//! Vault store integration tests against a mocked KV v2 engine

mod common;

use cfgsync_core::config::VaultSettings;
use cfgsync_core::{Error, File, UserOptions};
use cfgsync_stores::envfile::MODIFIED_KEY;
use cfgsync_stores::vault::{VaultStore, MOUNT_KEY};
use cfgsync_stores::Store;
use chrono::{TimeZone, Utc};
use common::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use wiremock::http::Method;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTEXT_KEY: &str = "3f1c2b1e-8d2a-4c55-9f7a-2d3e4f5a6b7c/.env";
const TOKEN: &str = "tok-vault";

fn secret_path() -> String {
    format!("/v1/secret/data/{}", CONTEXT_KEY)
}

fn metadata_path() -> String {
    format!("/v1/secret/metadata/{}", CONTEXT_KEY)
}

/// Standard Vault response wrapper around `data`
fn envelope(data: Value) -> Value {
    json!({
        "request_id": "0d7b8a0c-1d2e-4f3a-9b8c-7d6e5f4a3b2c",
        "lease_id": "",
        "lease_duration": 0,
        "renewable": false,
        "data": data,
        "warnings": null,
        "wrap_info": null,
        "auth": null
    })
}

fn version_metadata() -> Value {
    json!({
        "created_time": "2024-01-01T00:00:00.000000Z",
        "deletion_time": "",
        "custom_metadata": null,
        "destroyed": false,
        "version": 3
    })
}

fn token_info(token: &str) -> Value {
    json!({
        "accessor": "acc-1",
        "creation_time": 1704067200,
        "creation_ttl": 3600,
        "display_name": "token",
        "entity_id": "",
        "expire_time": "2030-01-01T00:00:00Z",
        "explicit_max_ttl": 0,
        "id": token,
        "identity_policies": [],
        "issue_time": "2024-01-01T00:00:00Z",
        "meta": {},
        "num_uses": 0,
        "orphan": false,
        "path": "auth/token/create",
        "policies": ["default"],
        "renewable": true,
        "role": null,
        "ttl": 3600,
        "type": "service"
    })
}

fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

async fn mock_secret(server: &MockServer, entries: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path(secret_path()))
        .and(header("X-Vault-Token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "data": map(entries),
            "metadata": version_metadata()
        }))))
        .mount(server)
        .await;
}

async fn mock_missing_secret(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(secret_path()))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
        .mount(server)
        .await;
}

async fn mock_write(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path(secret_path()))
        .and(header("X-Vault-Token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(version_metadata())))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mock_delete_metadata(server: &MockServer, expected: u64) {
    Mock::given(method("DELETE"))
        .and(path(metadata_path()))
        .respond_with(ResponseTemplate::new(204))
        .expect(expected)
        .mount(server)
        .await;
}

/// The secret body of the single write the store sent
async fn written_secret(server: &MockServer) -> BTreeMap<String, String> {
    let writes: Vec<BTreeMap<String, String>> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method == Method::POST && r.url.path() == secret_path())
        .map(|r| {
            let body: Value = r.body_json().unwrap();
            serde_json::from_value(body["data"].clone()).unwrap()
        })
        .collect();
    assert_eq!(writes.len(), 1);
    writes.into_iter().next().unwrap()
}

fn settings(server: &MockServer) -> VaultSettings {
    VaultSettings {
        address: Some(server.uri()),
        ..Default::default()
    }
}

fn connected_store(server: &MockServer) -> VaultStore {
    let mut store = VaultStore::new(&settings(server));
    store.connect(&server.uri(), TOKEN).unwrap();
    store
}

fn owning_file(owned: &[&str]) -> File {
    let mut file = File::new(".env");
    file.store = "vault".to_string();
    file.data.insert(MOUNT_KEY.to_string(), "secret".to_string());
    for key in owned {
        file.data.insert(format!("ENV_{}", key), "env".to_string());
    }
    file
}

#[tokio::test]
async fn test_push_merges_into_existing_secret() {
    let server = MockServer::start().await;
    mock_secret(&server, &[("SHARED", "1"), ("A", "old"), ("B", "2")]).await;
    mock_write(&server, 1).await;

    let store = connected_store(&server);
    let file = owning_file(&["A", "B"]);
    let outcome = store.push(CONTEXT_KEY, &file, b"A=new\n").await.unwrap();

    let mut written = written_secret(&server).await;
    assert!(written.remove(MODIFIED_KEY).is_some());
    assert_eq!(written, map(&[("A", "new"), ("SHARED", "1")]));

    assert!(!outcome.versioned);
    assert_eq!(outcome.data.get("ENV_A").map(String::as_str), Some("env"));
    assert!(!outcome.data.contains_key("ENV_B"));
    assert_eq!(outcome.data.get(MOUNT_KEY).map(String::as_str), Some("secret"));
}

#[tokio::test]
async fn test_push_creates_missing_secret() {
    let server = MockServer::start().await;
    mock_missing_secret(&server).await;
    mock_write(&server, 1).await;

    let store = connected_store(&server);
    store
        .push(CONTEXT_KEY, &File::new(".env"), b"TOKEN=ab$cd\n")
        .await
        .unwrap();

    let mut written = written_secret(&server).await;
    assert!(written.remove(MODIFIED_KEY).is_some());
    assert_eq!(written, map(&[("TOKEN", "ab$cd")]));
}

#[tokio::test]
async fn test_pull_renders_owned_keys() {
    let server = MockServer::start().await;
    mock_secret(
        &server,
        &[
            ("A", "hello # world"),
            ("SHARED", "2"),
            (MODIFIED_KEY, "2024-01-01 00:00:00.000000000 +0000 UTC"),
        ],
    )
    .await;

    let store = connected_store(&server);
    let (body, attrs) = store.pull(CONTEXT_KEY, &owning_file(&["A"])).await.unwrap();

    assert_eq!(body, b"A=\"hello # world\"\n".to_vec());
    assert_eq!(
        attrs.last_modified,
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_purge_writes_back_unowned_keys() {
    let server = MockServer::start().await;
    mock_secret(
        &server,
        &[
            ("A", "1"),
            ("SHARED", "2"),
            (MODIFIED_KEY, "2024-01-01 00:00:00.000000000 +0000 UTC"),
        ],
    )
    .await;
    mock_write(&server, 1).await;
    mock_delete_metadata(&server, 0).await;

    let store = connected_store(&server);
    store.purge(CONTEXT_KEY, &owning_file(&["A"])).await.unwrap();

    assert_eq!(written_secret(&server).await, map(&[("SHARED", "2")]));
}

#[tokio::test]
async fn test_purge_deletes_secret_left_empty() {
    let server = MockServer::start().await;
    mock_secret(
        &server,
        &[
            ("A", "1"),
            ("B", "2"),
            (MODIFIED_KEY, "2024-01-01 00:00:00.000000000 +0000 UTC"),
        ],
    )
    .await;
    mock_write(&server, 0).await;
    mock_delete_metadata(&server, 1).await;

    let store = connected_store(&server);
    store
        .purge(CONTEXT_KEY, &owning_file(&["A", "B"]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_pre_reuses_valid_cached_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/lookup"))
        .and(body_partial_json(json!({"token": TOKEN})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(token_info(TOKEN))))
        .expect(1)
        .mount(&server)
        .await;

    let vault = MemoryVault::new().with(CONTEXT_ID, "VAULT_TOKEN", TOKEN);
    let prompt = ScriptedPrompter::new();
    let mut file = File::new(".env");

    let mut store = VaultStore::new(&settings(&server));
    store
        .pre(CONTEXT_ID, &mut file, &vault, &UserOptions::default(), &prompt)
        .await
        .unwrap();

    assert!(prompt.asked().is_empty());
    assert_eq!(file.data.get(MOUNT_KEY).map(String::as_str), Some("secret"));
}

#[tokio::test]
async fn test_pre_asks_for_token_when_cached_one_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/lookup"))
        .and(body_partial_json(json!({"token": "tok-expired"})))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"errors": ["permission denied"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/lookup"))
        .and(body_partial_json(json!({"token": TOKEN})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(token_info(TOKEN))))
        .expect(1)
        .mount(&server)
        .await;

    let vault = MemoryVault::new().with(CONTEXT_ID, "VAULT_TOKEN", "tok-expired");
    let prompt = ScriptedPrompter::new().answer("VAULT_TOKEN", TOKEN);
    let mut file = File::new(".env");

    let mut store = VaultStore::new(&settings(&server));
    store
        .pre(CONTEXT_ID, &mut file, &vault, &UserOptions::default(), &prompt)
        .await
        .unwrap();

    assert_eq!(prompt.asked(), vec!["VAULT_TOKEN".to_string()]);
    assert_eq!(vault.value(CONTEXT_ID, "VAULT_TOKEN").as_deref(), Some(TOKEN));
}

#[tokio::test]
async fn test_pre_without_prompting_fails_instead_of_asking() {
    let server = MockServer::start().await;
    let vault = MemoryVault::new();
    let prompt = ScriptedPrompter::new().answer("VAULT_TOKEN", TOKEN);
    let options = UserOptions {
        prompt: false,
        ..Default::default()
    };

    let mut store = VaultStore::new(&settings(&server));
    let err = store
        .pre(CONTEXT_ID, &mut File::new(".env"), &vault, &options, &prompt)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::MissingValue { .. })
    ));
    assert!(prompt.asked().is_empty());
}
