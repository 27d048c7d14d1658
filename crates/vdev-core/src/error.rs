//! Service error payloads and their classification
//!
//! Every failed API call carries a JSON payload of the form
//! `{error, errorID, field?}`. A failed device creation may extend it with
//! `{missingFwAssets, projectId}` when the target project lacks firmware
//! assets the device needs. `classify` is the single branch point that
//! separates the two shapes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw error payload returned by the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorPayload {
    /// Human readable message
    #[serde(default)]
    pub error: String,
    #[serde(rename = "errorID", default)]
    pub error_id: String,
    /// Request field the error refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// URLs of firmware assets the project is missing
    #[serde(
        rename = "missingFwAssets",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub missing_fw_assets: Option<Vec<String>>,
    #[serde(rename = "projectId", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Any service error that is not a missing-asset report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({error_id})")]
pub struct GenericError {
    pub message: String,
    pub error_id: String,
    pub field: Option<String>,
}

/// Device creation failed because the project lacks firmware assets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({error_id}): {} missing firmware asset(s)", .missing_assets.len())]
pub struct MissingFirmwareAssetError {
    pub message: String,
    pub error_id: String,
    pub field: Option<String>,
    /// Project that owns the missing assets, when the service reports it
    pub project_id: Option<String>,
    /// Asset URLs in the order the service listed them
    pub missing_assets: Vec<String>,
}

/// Classified service error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Generic(#[from] GenericError),
    #[error(transparent)]
    MissingFirmwareAssets(#[from] MissingFirmwareAssetError),
}

impl ServiceError {
    pub fn message(&self) -> &str {
        match self {
            ServiceError::Generic(e) => &e.message,
            ServiceError::MissingFirmwareAssets(e) => &e.message,
        }
    }

    pub fn error_id(&self) -> &str {
        match self {
            ServiceError::Generic(e) => &e.error_id,
            ServiceError::MissingFirmwareAssets(e) => &e.error_id,
        }
    }
}

/// Classify a service error payload
///
/// The payload is a missing-asset report iff it carries a non-empty
/// `missingFwAssets` list. Everything else is a generic error.
pub fn classify(payload: &ApiErrorPayload) -> ServiceError {
    match &payload.missing_fw_assets {
        Some(assets) if !assets.is_empty() => {
            ServiceError::MissingFirmwareAssets(MissingFirmwareAssetError {
                message: payload.error.clone(),
                error_id: payload.error_id.clone(),
                field: payload.field.clone(),
                project_id: payload.project_id.clone(),
                missing_assets: assets.clone(),
            })
        }
        _ => ServiceError::Generic(GenericError {
            message: payload.error.clone(),
            error_id: payload.error_id.clone(),
            field: payload.field.clone(),
        }),
    }
}
