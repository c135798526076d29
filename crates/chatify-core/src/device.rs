//! Platform capability surface.
//!
//! Every capability is permission-gated. Implementations talk to the host
//! platform (media picker, camera, microphone, location services); the
//! composer only sees these sequential async calls.

use std::fmt;
use std::path::Path;

use crate::compose::AudioRecorder;
use crate::models::Coordinates;
use crate::util::base_name;
use crate::{Error, Result};

/// A permission-gated platform capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    MediaLibrary,
    Camera,
    Microphone,
    Location,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::MediaLibrary => "media library",
            Self::Camera => "camera",
            Self::Microphone => "microphone",
            Self::Location => "location",
        };
        f.write_str(label)
    }
}

/// Outcome of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

impl Permission {
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Raw file content handed over by a picker or camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Original name or URI of the file.
    pub name: String,
    /// Content MIME type.
    pub mime_type: String,
    /// File bytes.
    pub bytes: Vec<u8>,
}

impl MediaFile {
    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            return Err(Error::InvalidInput(format!(
                "File {} is empty",
                path.display()
            )));
        }
        let name = path.to_string_lossy().to_string();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }

    /// Final path segment of [`Self::name`].
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }
}

/// Host platform services used by the composer.
#[allow(async_fn_in_trait)]
pub trait DeviceCapabilities {
    /// Native audio capture handle.
    type Recorder: AudioRecorder;

    /// Ask the user for access to a capability.
    async fn request_permission(&self, capability: Capability) -> Permission;

    /// Let the user pick an image. `Ok(None)` when the picker was dismissed.
    async fn pick_library_image(&self) -> Result<Option<MediaFile>>;

    /// Take a picture. `Ok(None)` when the camera was dismissed.
    async fn capture_photo(&self) -> Result<Option<MediaFile>>;

    /// Current foreground position.
    async fn current_position(&self) -> Result<Coordinates>;

    /// Open the microphone and start capturing.
    async fn start_recording(&self) -> Result<Self::Recorder>;

    /// Show a user-visible alert.
    fn alert(&self, message: &str);
}
