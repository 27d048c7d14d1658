//! Firmware asset registration with the project image store

use std::sync::Arc;
use tracing::info;
use vdev_core::{ImageRecord, ImageSubmission};

use crate::api::{ApiError, ImageApi};
use crate::fetch::FetchedAsset;

/// Result of registering one firmware asset
#[derive(Debug, Clone)]
pub struct RegisteredAsset {
    /// Metadata the asset was submitted with
    pub submission: ImageSubmission,
    /// Record the service created for it
    pub record: ImageRecord,
    pub size: u64,
    pub sha256: String,
}

impl RegisteredAsset {
    /// URL the asset was fetched from
    pub fn source_url(&self) -> &str {
        &self.submission.name
    }
}

/// Submits fetched firmware assets to the image store
#[derive(Clone)]
pub struct Registrar {
    images: Arc<dyn ImageApi>,
}

impl Registrar {
    pub fn new(images: Arc<dyn ImageApi>) -> Self {
        Self { images }
    }

    /// Register `asset` as a firmware asset of `project_id`
    ///
    /// Consumes the asset; its scratch file is gone once this returns,
    /// whatever the outcome. Errors from the image store are returned as-is.
    pub async fn register(
        &self,
        project_id: &str,
        asset: FetchedAsset,
        source_url: &str,
    ) -> Result<RegisteredAsset, ApiError> {
        let submission = ImageSubmission::firmware_asset(project_id, source_url);
        let record = self.images.create_image(&submission, &asset).await?;

        info!(
            project = %project_id,
            url = %source_url,
            image = %record.id,
            size = asset.size(),
            "Registered firmware asset"
        );

        Ok(RegisteredAsset {
            submission,
            record,
            size: asset.size(),
            sha256: asset.sha256().to_string(),
        })
    }
}
