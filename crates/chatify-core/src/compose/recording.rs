//! Audio recording session and its state machine.

use std::io::Cursor;

use crate::device::MediaFile;
use crate::{Error, Result};

/// File name given to recordings that arrive as raw samples.
pub const PCM_RECORDING_NAME: &str = "recording.wav";

/// Recorder lifecycle as seen by the composer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecorderState {
    /// No recording; a new one may start.
    #[default]
    Idle,
    /// Microphone is capturing.
    Recording,
    /// Capture stopped, clip is being uploaded and sent.
    Uploading,
}

/// Discrete recorder events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderEvent {
    Start,
    Cancel,
    StopRequested,
    UploadFinished,
}

/// Deterministic recorder state transition helper.
#[must_use]
pub const fn transition_recorder_state(state: RecorderState, event: RecorderEvent) -> RecorderState {
    match (state, event) {
        (RecorderState::Idle, RecorderEvent::Start) => RecorderState::Recording,
        (RecorderState::Recording, RecorderEvent::StopRequested) => RecorderState::Uploading,
        (RecorderState::Recording, RecorderEvent::Cancel)
        | (RecorderState::Uploading, RecorderEvent::UploadFinished) => RecorderState::Idle,
        _ => state,
    }
}

/// Audio handed back by a stopped recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedAudio {
    /// Already encoded clip (e.g. m4a written by the platform).
    Encoded(MediaFile),
    /// Interleaved PCM16 samples.
    Pcm16 {
        samples: Vec<i16>,
        sample_rate_hz: u32,
        channels: u16,
    },
}

impl RecordedAudio {
    /// Turn the capture into uploadable bytes, encoding raw samples as WAV.
    pub fn into_media_file(self) -> Result<MediaFile> {
        match self {
            Self::Encoded(file) if file.bytes.is_empty() => {
                Err(Error::Recording("Recorder produced an empty clip".to_string()))
            }
            Self::Encoded(file) => Ok(file),
            Self::Pcm16 {
                samples,
                sample_rate_hz,
                channels,
            } => Ok(MediaFile {
                name: PCM_RECORDING_NAME.to_string(),
                mime_type: "audio/wav".to_string(),
                bytes: encode_wav(&samples, sample_rate_hz, channels)?,
            }),
        }
    }
}

/// Encode interleaved PCM16 samples as a WAV byte buffer.
pub fn encode_wav(samples: &[i16], sample_rate_hz: u32, channels: u16) -> Result<Vec<u8>> {
    if sample_rate_hz == 0 || channels == 0 {
        return Err(Error::Recording(format!(
            "Invalid capture format: {sample_rate_hz} Hz, {channels} channel(s)"
        )));
    }
    if samples.is_empty() {
        return Err(Error::Recording("Recording is empty".to_string()));
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate: sample_rate_hz,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(|error| {
            Error::Recording(format!("Failed to initialize WAV writer: {error}"))
        })?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|error| Error::Recording(format!("Failed to write WAV sample: {error}")))?;
        }

        writer
            .finalize()
            .map_err(|error| Error::Recording(format!("Failed to finalize WAV data: {error}")))?;
    }

    Ok(cursor.into_inner())
}

/// Native audio capture handle.
#[allow(async_fn_in_trait)]
pub trait AudioRecorder {
    /// Stop capturing and hand back what was recorded.
    async fn stop(&mut self) -> Result<RecordedAudio>;

    /// Free the native handle. Called exactly once per recorder.
    fn release(&mut self);
}

/// Exclusive owner of a live recorder.
///
/// The recorder is released exactly once: when it is stopped, cancelled, or
/// when the session is dropped while still holding it.
pub struct RecordingSession<R: AudioRecorder> {
    recorder: Option<R>,
}

impl<R: AudioRecorder> RecordingSession<R> {
    pub const fn new(recorder: R) -> Self {
        Self {
            recorder: Some(recorder),
        }
    }

    pub const fn is_active(&self) -> bool {
        self.recorder.is_some()
    }

    /// Stop the recorder and keep the capture.
    pub async fn stop(&mut self) -> Result<RecordedAudio> {
        let Some(mut recorder) = self.recorder.take() else {
            return Err(Error::Recording("No recording in progress".to_string()));
        };
        let result = recorder.stop().await;
        recorder.release();
        result
    }

    /// Stop the recorder and throw the capture away.
    pub async fn cancel(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            if let Err(error) = recorder.stop().await {
                tracing::debug!("Discarded recording failed to stop cleanly: {error}");
            }
            recorder.release();
        }
    }
}

impl<R: AudioRecorder> Drop for RecordingSession<R> {
    fn drop(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            tracing::debug!("Releasing abandoned recorder");
            recorder.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRecorder;

    #[test]
    fn recorder_transitions() {
        use RecorderEvent::{Cancel, Start, StopRequested, UploadFinished};
        use RecorderState::{Idle, Recording, Uploading};

        assert_eq!(transition_recorder_state(Idle, Start), Recording);
        assert_eq!(transition_recorder_state(Recording, Start), Recording);
        assert_eq!(transition_recorder_state(Recording, Cancel), Idle);
        assert_eq!(transition_recorder_state(Recording, StopRequested), Uploading);
        assert_eq!(transition_recorder_state(Uploading, Cancel), Uploading);
        assert_eq!(transition_recorder_state(Uploading, UploadFinished), Idle);
        assert_eq!(transition_recorder_state(Idle, StopRequested), Idle);
    }

    #[test]
    fn wav_encoding_roundtrips_samples() {
        let samples = vec![0_i16, 1200, -1200, 300, -300];
        let bytes = encode_wav(&samples, 16_000, 1).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        let decoded: Vec<i16> = reader
            .samples::<i16>()
            .map(std::result::Result::unwrap)
            .collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn invalid_capture_is_a_recording_error() {
        assert!(matches!(encode_wav(&[1], 0, 1), Err(Error::Recording(_))));
        assert!(matches!(encode_wav(&[], 16_000, 1), Err(Error::Recording(_))));
    }

    #[test]
    fn pcm_capture_becomes_wav_file() {
        let file = RecordedAudio::Pcm16 {
            samples: vec![1, 2, 3],
            sample_rate_hz: 8_000,
            channels: 1,
        }
        .into_media_file()
        .unwrap();
        assert_eq!(file.name, PCM_RECORDING_NAME);
        assert_eq!(file.mime_type, "audio/wav");
        assert_eq!(&file.bytes[..4], b"RIFF");
    }

    #[tokio::test]
    async fn session_releases_once_on_stop() {
        let recorder = FakeRecorder::with_samples(vec![1, 2, 3]);
        let releases = recorder.releases();
        let mut session = RecordingSession::new(recorder);

        assert!(session.stop().await.is_ok());
        assert!(!session.is_active());
        assert!(session.stop().await.is_err());
        drop(session);

        assert_eq!(releases.get(), 1);
    }

    #[tokio::test]
    async fn session_releases_on_cancel_and_drop() {
        let cancelled = FakeRecorder::with_samples(vec![1]);
        let cancelled_releases = cancelled.releases();
        let mut session = RecordingSession::new(cancelled);
        session.cancel().await;
        drop(session);
        assert_eq!(cancelled_releases.get(), 1);

        let dropped = FakeRecorder::with_samples(vec![1]);
        let dropped_releases = dropped.releases();
        drop(RecordingSession::new(dropped));
        assert_eq!(dropped_releases.get(), 1);
    }
}
