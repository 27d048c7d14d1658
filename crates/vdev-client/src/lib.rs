//! vdev Client - Virtual device provisioning with firmware asset remediation
//!
//! This crate provides:
//! - An HTTP client for the device and image endpoints of the service
//! - Streaming download of firmware assets into scoped scratch files
//! - Registration of fetched assets with the project image store
//! - `Provisioner`, which creates devices and, when enabled, resolves
//!   missing firmware assets before retrying

pub mod api;
pub mod config;
pub mod fetch;
pub mod provision;
pub mod register;

pub use api::{ApiError, DeviceApi, HttpApi, ImageApi};
pub use config::{load_config, save_default_config, Config, RemediationConfig, ServiceConfig};
pub use fetch::{AssetFetcher, AssetSource, FetchedAsset, TransferError};
pub use provision::{ProvisionError, Provisioned, Provisioner};
pub use register::{RegisteredAsset, Registrar};

use std::sync::Arc;

/// Build a provisioner backed by the HTTP API and fetcher described by `config`
pub fn http_provisioner(config: &Config) -> anyhow::Result<(Arc<HttpApi>, Provisioner)> {
    let api = Arc::new(HttpApi::new(&config.service)?);
    let fetcher = Arc::new(AssetFetcher::new(&config.remediation)?);
    let provisioner = Provisioner::new(
        api.clone(),
        api.clone(),
        fetcher,
        config.remediation.clone(),
    );
    Ok((api, provisioner))
}
