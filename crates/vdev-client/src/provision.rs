//! Device provisioning with automatic firmware asset remediation
//!
//! The provisioning flow:
//! 1. Request device creation
//! 2. On a missing-firmware-asset error, fetch each missing asset in order
//!    and register it with the project (only when remediation is enabled)
//! 3. Re-issue the identical creation request
//!
//! Remediation rounds are bounded by `RemediationConfig::max_attempts` and
//! an optional elapsed-time budget.

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use vdev_core::{classify, CreationRequest, GenericError, Instance, MissingFirmwareAssetError, ServiceError};

use crate::api::{ApiError, DeviceApi, ImageApi};
use crate::config::RemediationConfig;
use crate::fetch::AssetSource;
use crate::register::{RegisteredAsset, Registrar};

#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The service rejected the creation request
    #[error("device creation failed: {}", .0.message)]
    Creation(GenericError),
    #[error(
        "device creation requires {} missing firmware asset(s); enable automatic firmware \
         asset download (remediation.enabled or VDEV_AUTO_DOWNLOAD_FWASSETS=1) to fetch them",
        .0.missing_assets.len()
    )]
    RemediationDisabled(MissingFirmwareAssetError),
    #[error("firmware assets still missing after {attempts} remediation round(s): {}", .last.missing_assets.join(", "))]
    RemediationExhausted {
        attempts: u32,
        last: MissingFirmwareAssetError,
    },
    #[error("failed to register firmware asset {url}: {source}")]
    Registration {
        url: String,
        #[source]
        source: ApiError,
    },
    #[error(transparent)]
    Api(ApiError),
}

/// Outcome of a successful provisioning call
#[derive(Debug)]
pub struct Provisioned {
    pub instance: Instance,
    /// Creation requests issued, including the successful one
    pub attempts: u32,
    /// Assets registered along the way, in registration order
    pub registered: Vec<RegisteredAsset>,
    /// Asset URLs whose transfer failed and were skipped
    pub skipped: Vec<String>,
}

/// Drives device creation and firmware asset remediation
pub struct Provisioner {
    devices: Arc<dyn DeviceApi>,
    source: Arc<dyn AssetSource>,
    registrar: Registrar,
    remediation: RemediationConfig,
}

impl Provisioner {
    pub fn new(
        devices: Arc<dyn DeviceApi>,
        images: Arc<dyn ImageApi>,
        source: Arc<dyn AssetSource>,
        remediation: RemediationConfig,
    ) -> Self {
        Self {
            devices,
            source,
            registrar: Registrar::new(images),
            remediation,
        }
    }

    pub fn remediation(&self) -> &RemediationConfig {
        &self.remediation
    }

    /// Create the device described by `request`
    pub async fn provision(&self, request: &CreationRequest) -> Result<Provisioned, ProvisionError> {
        // Built once so every retry sends exactly the same body
        let body = request.to_body();
        let started = Instant::now();

        let mut rounds: u32 = 0;
        let mut registered = Vec::new();
        let mut skipped = Vec::new();

        loop {
            debug!(
                project = %request.project,
                name = %request.name,
                attempt = rounds + 1,
                "Requesting device creation"
            );

            let payload = match self.devices.create_instance(&body).await {
                Ok(instance) => {
                    info!(
                        project = %request.project,
                        name = %request.name,
                        instance = %instance.id,
                        attempts = rounds + 1,
                        "Device created"
                    );
                    return Ok(Provisioned {
                        instance,
                        attempts: rounds + 1,
                        registered,
                        skipped,
                    });
                }
                Err(ApiError::Service { payload, .. }) => payload,
                Err(e) => return Err(ProvisionError::Api(e)),
            };

            let missing = match classify(&payload) {
                ServiceError::Generic(e) => return Err(ProvisionError::Creation(e)),
                ServiceError::MissingFirmwareAssets(e) => e,
            };

            warn!(
                project = %request.project,
                name = %request.name,
                count = missing.missing_assets.len(),
                "Device creation reported missing firmware assets"
            );

            if !self.remediation.enabled {
                return Err(ProvisionError::RemediationDisabled(missing));
            }

            let out_of_time = self
                .remediation
                .max_elapsed()
                .is_some_and(|budget| started.elapsed() >= budget);
            if rounds >= self.remediation.max_attempts || out_of_time {
                return Err(ProvisionError::RemediationExhausted {
                    attempts: rounds,
                    last: missing,
                });
            }
            rounds += 1;

            let project = missing
                .project_id
                .clone()
                .unwrap_or_else(|| request.project.clone());

            for url in &missing.missing_assets {
                let asset = match self.source.fetch(url).await {
                    Ok(asset) => asset,
                    Err(e) => {
                        warn!(url = %url, error = %e, "Skipping firmware asset");
                        skipped.push(url.clone());
                        continue;
                    }
                };

                let entry = self
                    .registrar
                    .register(&project, asset, url)
                    .await
                    .map_err(|source| ProvisionError::Registration {
                        url: url.clone(),
                        source,
                    })?;
                registered.push(entry);
            }

            info!(
                project = %project,
                round = rounds,
                "Firmware asset remediation round complete, retrying creation"
            );
        }
    }
}
