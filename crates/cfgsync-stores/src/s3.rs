//! S3 object store
//!
//! Each tracked file is stored whole as a single object. Supports AWS S3 and
//! S3-compatible storage (MinIO, Wasabi) through a custom endpoint.

use crate::traits::{Attributes, PushOutcome, Store};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client;
use cfgsync_core::config::S3Settings;
use cfgsync_core::{CredentialVault, File, FileType, PromptOptions, Prompter, UserOptions};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Catalog `data` key holding the bucket name
pub const BUCKET_KEY: &str = "S3_BUCKET";
/// Catalog `data` key holding the bucket region
pub const REGION_KEY: &str = "S3_REGION";

/// Where a file's objects live
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub region: String,
}

impl S3Location {
    pub fn to_data(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (BUCKET_KEY.to_string(), self.bucket.clone()),
            (REGION_KEY.to_string(), self.region.clone()),
        ])
    }
}

/// Object key for a file, optionally for one labelled version
pub fn object_key(prefix: &str, context_key: &str, version: Option<&str>) -> String {
    match version {
        Some(v) if !v.is_empty() => format!("{}{}/{}", prefix, context_key, v),
        _ => format!("{}{}", prefix, context_key),
    }
}

/// Store keeping whole files as S3 objects
pub struct S3Store {
    settings: S3Settings,
    client: Option<Client>,
    location: S3Location,
    version: Option<String>,
}

impl S3Store {
    pub fn new(settings: &S3Settings) -> Self {
        Self {
            settings: settings.clone(),
            client: None,
            location: S3Location {
                bucket: String::new(),
                region: settings.region.clone(),
            },
            version: None,
        }
    }

    /// Create an S3 client with the given region and optional endpoint
    async fn create_client(region: &str, endpoint: Option<&str>) -> Client {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint_url);
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
        }

        Client::from_conf(builder.build())
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("S3 store used before pre"))
    }

    async fn upload(&self, key: &str, contents: &[u8]) -> Result<()> {
        debug!("Uploading s3://{}/{}", self.location.bucket, key);
        self.client()?
            .put_object()
            .bucket(&self.location.bucket)
            .key(key)
            .body(ByteStream::from(contents.to_vec()))
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{}/{}", self.location.bucket, key))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        debug!("Deleting s3://{}/{}", self.location.bucket, key);
        self.client()?
            .delete_object()
            .bucket(&self.location.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete s3://{}/{}", self.location.bucket, key))?;
        Ok(())
    }
}

#[async_trait]
impl Store for S3Store {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn description(&self) -> &'static str {
        "Files of any type are stored whole as S3 objects (server-side encrypted). \
         A bucket is requested the first time; region and endpoint come from settings. \
         Pushing with --version keeps a labelled copy next to the latest one."
    }

    fn can_handle_file(&self, _file: &File) -> bool {
        true
    }

    fn supports_file_type(&self, _file_type: FileType) -> bool {
        true
    }

    async fn pre(
        &mut self,
        context_id: &str,
        file: &mut File,
        vault: &dyn CredentialVault,
        options: &UserOptions,
        prompt: &dyn Prompter,
    ) -> Result<()> {
        let bucket = match file.data.get(BUCKET_KEY).filter(|b| !b.is_empty()) {
            Some(bucket) => bucket.clone(),
            None => match vault.get(context_id, BUCKET_KEY)? {
                Some(bucket) if !bucket.is_empty() => bucket,
                _ => {
                    let bucket = options.ask(
                        prompt,
                        BUCKET_KEY,
                        &PromptOptions::new("S3 bucket receiving the file"),
                    )?;
                    vault.set(context_id, BUCKET_KEY, &bucket)?;
                    bucket
                }
            },
        };

        let region = file
            .data
            .get(REGION_KEY)
            .filter(|r| !r.is_empty())
            .cloned()
            .unwrap_or_else(|| self.settings.region.clone());

        self.location = S3Location { bucket, region };
        self.version = options.version.clone();
        self.client = Some(
            Self::create_client(&self.location.region, self.settings.endpoint.as_deref()).await,
        );

        file.data.extend(self.location.to_data());
        Ok(())
    }

    async fn push(&self, context_key: &str, _file: &File, contents: &[u8]) -> Result<PushOutcome> {
        let latest = object_key(&self.settings.prefix, context_key, None);
        self.upload(&latest, contents).await?;

        if let Some(version) = self.version.as_deref().filter(|v| !v.is_empty()) {
            let key = object_key(&self.settings.prefix, context_key, Some(version));
            self.upload(&key, contents).await?;
            info!("Stored version {} of {}", version, context_key);
        }

        Ok(PushOutcome {
            data: self.location.to_data(),
            versioned: true,
        })
    }

    async fn pull(&self, context_key: &str, _file: &File) -> Result<(Vec<u8>, Attributes)> {
        let key = object_key(&self.settings.prefix, context_key, self.version.as_deref());
        debug!("Downloading s3://{}/{}", self.location.bucket, key);

        let resp = self
            .client()?
            .get_object()
            .bucket(&self.location.bucket)
            .key(&key)
            .send()
            .await
            .with_context(|| format!("Failed to download s3://{}/{}", self.location.bucket, key))?;

        let last_modified = resp
            .last_modified()
            .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
            .unwrap_or_else(Utc::now);

        let body = resp
            .body
            .collect()
            .await
            .context("Failed to read response body")?;

        Ok((body.into_bytes().to_vec(), Attributes { last_modified }))
    }

    async fn purge(&self, context_key: &str, file: &File) -> Result<()> {
        self.delete(&object_key(&self.settings.prefix, context_key, None))
            .await?;
        for version in &file.versions {
            self.delete(&object_key(&self.settings.prefix, context_key, Some(version)))
                .await?;
        }
        Ok(())
    }
}
