//! Terminal stand-ins for platform capabilities.
//!
//! The "picker", "camera" and "microphone" hand over files named on the
//! command line; alerts go to stderr.

use std::io::Cursor;
use std::path::PathBuf;

use chatify_core::compose::{AudioRecorder, RecordedAudio};
use chatify_core::device::{Capability, DeviceCapabilities, MediaFile, Permission};
use chatify_core::models::Coordinates;
use chatify_core::{Error, Result};

/// Capture sources supplied for one command.
#[derive(Debug, Default)]
pub struct CliDevice {
    image: Option<PathBuf>,
    camera: bool,
    position: Option<Coordinates>,
    recording: Option<PathBuf>,
}

impl CliDevice {
    pub fn with_image(path: PathBuf, camera: bool) -> Self {
        Self {
            image: Some(path),
            camera,
            ..Self::default()
        }
    }

    pub fn with_position(position: Coordinates) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn with_recording(path: PathBuf) -> Self {
        Self {
            recording: Some(path),
            ..Self::default()
        }
    }

    async fn read_image(&self, from_camera: bool) -> Result<Option<MediaFile>> {
        match &self.image {
            Some(path) if self.camera == from_camera => MediaFile::read(path).await.map(Some),
            _ => Ok(None),
        }
    }
}

impl DeviceCapabilities for CliDevice {
    type Recorder = WavFileRecorder;

    async fn request_permission(&self, capability: Capability) -> Permission {
        tracing::debug!("Granting {capability} access to the terminal");
        Permission::Granted
    }

    async fn pick_library_image(&self) -> Result<Option<MediaFile>> {
        self.read_image(false).await
    }

    async fn capture_photo(&self) -> Result<Option<MediaFile>> {
        self.read_image(true).await
    }

    async fn current_position(&self) -> Result<Coordinates> {
        self.position
            .ok_or_else(|| Error::InvalidInput("No position was given".to_string()))
    }

    async fn start_recording(&self) -> Result<WavFileRecorder> {
        let path = self
            .recording
            .clone()
            .ok_or_else(|| Error::Recording("No capture file was given".to_string()))?;
        tracing::debug!("Recording from {}", path.display());
        Ok(WavFileRecorder {
            path,
            released: false,
        })
    }

    fn alert(&self, message: &str) {
        tracing::warn!("{message}");
        eprintln!("{message}");
    }
}

/// Recorder that plays back a WAV file as the microphone capture.
#[derive(Debug)]
pub struct WavFileRecorder {
    path: PathBuf,
    released: bool,
}

impl AudioRecorder for WavFileRecorder {
    async fn stop(&mut self) -> Result<RecordedAudio> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|error| Error::Recording(format!("{}: {error}", self.path.display())))?;
        decode_capture(bytes, &self.path)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            tracing::debug!("Released recorder for {}", self.path.display());
        }
    }
}

/// 16-bit PCM is handed over as samples; any other WAV is sent as recorded.
fn decode_capture(bytes: Vec<u8>, path: &std::path::Path) -> Result<RecordedAudio> {
    let reader = hound::WavReader::new(Cursor::new(&bytes))
        .map_err(|error| Error::Recording(format!("{} is not a WAV file: {error}", path.display())))?;
    let spec = reader.spec();

    if spec.sample_format == hound::SampleFormat::Int && spec.bits_per_sample == 16 {
        let samples = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|error| Error::Recording(format!("Corrupt WAV data: {error}")))?;
        return Ok(RecordedAudio::Pcm16 {
            samples,
            sample_rate_hz: spec.sample_rate,
            channels: spec.channels,
        });
    }
    drop(reader);

    Ok(RecordedAudio::Encoded(MediaFile {
        name: path.to_string_lossy().to_string(),
        mime_type: "audio/wav".to_string(),
        bytes,
    }))
}
