//! Turns user compose actions into messages.
//!
//! Every action first acquires its platform capability, then produces the
//! payload (uploading bytes where needed) and only then hands a pending
//! message to the sink. A failure at any step leaves the message list alone.

use super::recording::{
    transition_recorder_state, RecordedAudio, RecorderEvent, RecorderState, RecordingSession,
};
use crate::clock::{Clock, SystemClock};
use crate::device::{Capability, DeviceCapabilities, MediaFile};
use crate::models::{Author, Message, MessageId, Payload};
use crate::reference::ReferenceGenerator;
use crate::storage::{BlobStore, ObjectHandle};
use crate::{Error, Result};

/// Receiver of composed messages, normally the sync controller.
#[allow(async_fn_in_trait)]
pub trait MessageSink {
    /// Whether new messages are accepted right now.
    fn can_accept(&self) -> bool {
        true
    }

    /// Insert `message` optimistically and append it remotely.
    async fn submit(&mut self, message: Message) -> Result<()>;
}

/// Composer for text, images, location and voice messages.
pub struct AttachmentUploader<D: DeviceCapabilities, B: BlobStore, C: Clock = SystemClock> {
    author: Author,
    device: D,
    blobs: B,
    clock: C,
    references: ReferenceGenerator,
    recording: Option<RecordingSession<D::Recorder>>,
    state: RecorderState,
}

impl<D: DeviceCapabilities, B: BlobStore> AttachmentUploader<D, B, SystemClock> {
    pub fn new(author: Author, device: D, blobs: B) -> Self {
        Self::with_clock(author, device, blobs, SystemClock)
    }
}

impl<D: DeviceCapabilities, B: BlobStore, C: Clock> AttachmentUploader<D, B, C> {
    pub fn with_clock(author: Author, device: D, blobs: B, clock: C) -> Self {
        Self {
            author,
            device,
            blobs,
            clock,
            references: ReferenceGenerator::new(),
            recording: None,
            state: RecorderState::Idle,
        }
    }

    pub const fn author(&self) -> &Author {
        &self.author
    }

    pub const fn device(&self) -> &D {
        &self.device
    }

    pub const fn recording_state(&self) -> RecorderState {
        self.state
    }

    /// Send a plain text message.
    pub async fn send_text(
        &mut self,
        text: &str,
        sink: &mut impl MessageSink,
    ) -> Result<MessageId> {
        self.ensure_sink_ready(sink)?;
        let payload = Payload::text(text)?;
        let now = self.clock.now_ms();
        self.deliver(payload, now, sink).await
    }

    /// Pick an image from the media library and send it.
    ///
    /// Returns `Ok(None)` when the picker was dismissed.
    pub async fn send_library_image(
        &mut self,
        sink: &mut impl MessageSink,
    ) -> Result<Option<MessageId>> {
        self.ensure_sink_ready(sink)?;
        self.acquire(Capability::MediaLibrary).await?;
        let picked = self.device.pick_library_image().await;
        let Some(file) = self.alert_on_error(picked)? else {
            tracing::debug!("Image picker dismissed");
            return Ok(None);
        };
        self.send_image_file(&file, sink).await.map(Some)
    }

    /// Take a photo with the camera and send it.
    ///
    /// Returns `Ok(None)` when the camera was dismissed.
    pub async fn send_camera_photo(
        &mut self,
        sink: &mut impl MessageSink,
    ) -> Result<Option<MessageId>> {
        self.ensure_sink_ready(sink)?;
        self.acquire(Capability::Camera).await?;
        let captured = self.device.capture_photo().await;
        let Some(file) = self.alert_on_error(captured)? else {
            tracing::debug!("Camera dismissed");
            return Ok(None);
        };
        self.send_image_file(&file, sink).await.map(Some)
    }

    /// Share the current position.
    pub async fn send_location(&mut self, sink: &mut impl MessageSink) -> Result<MessageId> {
        self.ensure_sink_ready(sink)?;
        self.acquire(Capability::Location).await?;
        let position = self.device.current_position().await;
        let position = self.alert_on_error(position)?;
        let now = self.clock.now_ms();
        self.deliver(Payload::location(position), now, sink).await
    }

    /// Open the microphone. Only one recording can be live at a time.
    pub async fn start_recording(&mut self) -> Result<()> {
        if self.state != RecorderState::Idle || self.recording.is_some() {
            return self.fail(Error::RecordingActive);
        }
        self.acquire(Capability::Microphone).await?;

        let recorder = match self.device.start_recording().await {
            Ok(recorder) => recorder,
            Err(error) => return self.fail(as_recording_error(error)),
        };
        self.recording = Some(RecordingSession::new(recorder));
        self.state = transition_recorder_state(self.state, RecorderEvent::Start);
        tracing::info!("Recording started");
        Ok(())
    }

    /// Stop the live recording and discard it.
    pub async fn cancel_recording(&mut self) {
        if let Some(mut session) = self.recording.take() {
            session.cancel().await;
            tracing::info!("Recording cancelled");
        }
        self.state = transition_recorder_state(self.state, RecorderEvent::Cancel);
    }

    /// Stop the live recording, upload the clip and send it.
    pub async fn stop_and_send_recording(
        &mut self,
        sink: &mut impl MessageSink,
    ) -> Result<MessageId> {
        let Some(mut session) = self.recording.take() else {
            return self.fail(Error::Recording("No recording in progress".to_string()));
        };
        self.state = transition_recorder_state(self.state, RecorderEvent::StopRequested);

        let result = self.finish_recording(&mut session, sink).await;
        drop(session);
        self.state = transition_recorder_state(self.state, RecorderEvent::UploadFinished);
        result
    }

    /// Release any live recorder. Called when the composer goes away.
    pub async fn shutdown(&mut self) {
        self.cancel_recording().await;
    }

    async fn finish_recording(
        &mut self,
        session: &mut RecordingSession<D::Recorder>,
        sink: &mut impl MessageSink,
    ) -> Result<MessageId> {
        let audio = match session.stop().await.and_then(RecordedAudio::into_media_file) {
            Ok(file) => file,
            Err(error) => return self.fail(as_recording_error(error)),
        };
        self.ensure_sink_ready(sink)?;

        let now = self.clock.now_ms();
        let (handle, url) = self.upload(&audio, now).await?;
        self.deliver_upload(handle, Payload::audio(url), now, sink).await
    }

    async fn send_image_file(
        &mut self,
        file: &MediaFile,
        sink: &mut impl MessageSink,
    ) -> Result<MessageId> {
        let now = self.clock.now_ms();
        let (handle, url) = self.upload(file, now).await?;
        self.deliver_upload(handle, Payload::image(url), now, sink).await
    }

    async fn acquire(&self, capability: Capability) -> Result<()> {
        if self.device.request_permission(capability).await.is_granted() {
            Ok(())
        } else {
            self.fail(Error::PermissionDenied(capability))
        }
    }

    async fn upload(&mut self, file: &MediaFile, now: i64) -> Result<(ObjectHandle, String)> {
        let key = self.references.next(&self.author.id, now, &file.name);
        let handle = match self
            .blobs
            .put(&key, &file.bytes, Some(&file.mime_type))
            .await
        {
            Ok(handle) => handle,
            Err(error) => return self.fail(as_upload_error(error)),
        };

        match self.blobs.url(&handle).await {
            Ok(url) => {
                tracing::info!("Uploaded {} bytes as {key}", file.bytes.len());
                Ok((handle, url))
            }
            Err(error) => {
                self.discard(&handle).await;
                self.fail(as_upload_error(error))
            }
        }
    }

    /// Deliver a message carrying an uploaded attachment. The blob is removed
    /// again when no message ends up referencing it.
    async fn deliver_upload(
        &self,
        handle: ObjectHandle,
        payload: Result<Payload>,
        now: i64,
        sink: &mut impl MessageSink,
    ) -> Result<MessageId> {
        let delivered = match payload {
            Ok(payload) => self.deliver(payload, now, sink).await,
            Err(error) => self.fail(as_upload_error(error)),
        };
        if delivered.is_err() {
            self.discard(&handle).await;
        }
        delivered
    }

    async fn discard(&self, handle: &ObjectHandle) {
        match self.blobs.delete(handle).await {
            Ok(()) => tracing::debug!("Removed unused upload {}", handle.key()),
            Err(error) => {
                tracing::warn!("Failed to remove unused upload {}: {error}", handle.key());
            }
        }
    }

    async fn deliver(
        &self,
        payload: Payload,
        now: i64,
        sink: &mut impl MessageSink,
    ) -> Result<MessageId> {
        let message = Message::compose(self.author.clone(), payload, now);
        let id = message.id.clone();
        match sink.submit(message).await {
            Ok(()) => Ok(id),
            Err(error) => self.fail(error),
        }
    }

    fn ensure_sink_ready(&self, sink: &impl MessageSink) -> Result<()> {
        if sink.can_accept() {
            Ok(())
        } else {
            self.fail(Error::Offline)
        }
    }

    fn alert_on_error<T>(&self, result: Result<T>) -> Result<T> {
        result.or_else(|error| self.fail(error))
    }

    fn fail<T>(&self, error: Error) -> Result<T> {
        if let Some(alert) = error.user_alert() {
            self.device.alert(&alert);
        }
        tracing::warn!("Compose action failed: {error}");
        Err(error)
    }
}

fn as_upload_error(error: Error) -> Error {
    match error {
        Error::Upload(_) => error,
        other => Error::Upload(other.to_string()),
    }
}

fn as_recording_error(error: Error) -> Error {
    match error {
        Error::Recording(_) | Error::RecordingActive => error,
        other => Error::Recording(other.to_string()),
    }
}
