//! Message composition: capability acquisition, uploads and recording.

mod recording;
mod uploader;

pub use recording::{
    encode_wav, transition_recorder_state, AudioRecorder, RecordedAudio, RecorderEvent,
    RecorderState, RecordingSession, PCM_RECORDING_NAME,
};
pub use uploader::{AttachmentUploader, MessageSink};
