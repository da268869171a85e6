//! Remote store adapters for cfgsync
//!
//! This crate provides the store abstraction layer that tracked files are
//! pushed to and pulled from:
//!
//! - Shipment environments (container environment variables over HTTP)
//! - S3 (whole files as objects, with versioning)
//! - HashiCorp Vault (KV v2 secrets)
//!
//! A [`StoreRegistry`] owns one instance of each adapter and resolves which
//! one handles a given catalog entry.

pub mod envfile;
pub mod registry;
pub mod s3;
pub mod shipment;
pub mod traits;
pub mod vault;

pub use registry::StoreRegistry;
pub use traits::{Attributes, PushOutcome, Store};
