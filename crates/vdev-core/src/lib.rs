//! vdev Core - Wire types and error classification for the vdev client
//!
//! This crate provides the foundational types shared by the client and CLI:
//! - Device creation requests and the instance records the service returns
//! - Service error payloads and the missing-firmware-asset classifier
//! - Image store submission metadata for firmware assets

pub mod error;
pub mod image;
pub mod instance;

pub use error::{classify, ApiErrorPayload, GenericError, MissingFirmwareAssetError, ServiceError};
pub use image::{ImageRecord, ImageSubmission, FWASSET_TYPE, PLAIN_ENCODING};
pub use instance::{
    BootOptions, CreateInstanceBody, CreationRequest, Instance, PatchProfile, VolumeOptions,
};
