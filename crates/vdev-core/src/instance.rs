//! Virtual device (instance) creation types
//!
//! This module provides:
//! - `CreationRequest`, the caller-facing description of a device to create
//! - `CreateInstanceBody`, the exact JSON body sent to the service
//! - `Instance`, the service's view of a created device

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kernel patch profile applied to a new virtual device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchProfile {
    #[default]
    Jailbroken,
    Nonjailbroken,
    Corelliumd,
}

impl PatchProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchProfile::Jailbroken => "jailbroken",
            PatchProfile::Nonjailbroken => "nonjailbroken",
            PatchProfile::Corelliumd => "corelliumd",
        }
    }
}

impl fmt::Display for PatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatchProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jailbroken" => Ok(PatchProfile::Jailbroken),
            "nonjailbroken" => Ok(PatchProfile::Nonjailbroken),
            "corelliumd" => Ok(PatchProfile::Corelliumd),
            other => Err(format!(
                "unknown patch profile '{}' (expected jailbroken, nonjailbroken or corelliumd)",
                other
            )),
        }
    }
}

/// Boot-time options for a new device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootOptions {
    /// Kernel boot arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_args: Option<String>,
    /// Predefined device UDID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udid: Option<String>,
    /// Predefined device ECID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecid: Option<String>,
    /// Screen geometry, e.g. "720x1280:280"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    /// Identifier of a custom kernel image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_tags: Vec<String>,
}

/// Storage options for a new device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeOptions {
    /// Size of the user volume in GiB
    pub allocate: u32,
}

/// Parameters for creating a virtual device
///
/// A request is immutable once issued: the orchestrator derives a single
/// `CreateInstanceBody` from it and re-sends that body on every retry.
#[derive(Debug, Clone, PartialEq)]
pub struct CreationRequest {
    /// Project the device is created in
    pub project: String,
    /// Device name
    pub name: String,
    /// Platform flavor (e.g. "ranchu", "iphone6")
    pub flavor: String,
    /// OS version (e.g. "14.0.0")
    pub os: String,
    /// OS build identifier
    pub os_build: Option<String>,
    /// Reference (usually a URL) to a firmware package
    pub fwpackage: Option<String>,
    pub boot_options: Option<BootOptions>,
    pub volume: Option<VolumeOptions>,
    pub patch: PatchProfile,
}

impl CreationRequest {
    /// Create a request with the required fields and defaults for everything else
    pub fn new(
        project: impl Into<String>,
        name: impl Into<String>,
        flavor: impl Into<String>,
        os: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            flavor: flavor.into(),
            os: os.into(),
            os_build: None,
            fwpackage: None,
            boot_options: None,
            volume: None,
            patch: PatchProfile::default(),
        }
    }

    pub fn with_patch(mut self, patch: PatchProfile) -> Self {
        self.patch = patch;
        self
    }

    pub fn with_os_build(mut self, os_build: impl Into<String>) -> Self {
        self.os_build = Some(os_build.into());
        self
    }

    pub fn with_fwpackage(mut self, fwpackage: impl Into<String>) -> Self {
        self.fwpackage = Some(fwpackage.into());
        self
    }

    pub fn with_boot_options(mut self, boot_options: BootOptions) -> Self {
        self.boot_options = Some(boot_options);
        self
    }

    pub fn with_volume(mut self, volume: VolumeOptions) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Build the wire body, folding the patch profile into the `patches` list
    pub fn to_body(&self) -> CreateInstanceBody {
        CreateInstanceBody {
            project: self.project.clone(),
            name: self.name.clone(),
            flavor: self.flavor.clone(),
            os: self.os.clone(),
            osbuild: self.os_build.clone(),
            fwpackage: self.fwpackage.clone(),
            boot_options: self.boot_options.clone(),
            volume: self.volume.clone(),
            patches: vec![self.patch],
        }
    }
}

/// JSON body of `POST /v1/instances`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceBody {
    pub project: String,
    pub name: String,
    pub flavor: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osbuild: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fwpackage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_options: Option<BootOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeOptions>,
    pub patches: Vec<PatchProfile>,
}

/// A virtual device as reported by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
}
