use std::path::Path;

use chatify_core::compose::AttachmentUploader;
use chatify_core::models::MessageId;

use crate::commands::common::{Session, CONFIRM_TIMEOUT};
use crate::device::CliDevice;
use crate::error::CliError;

/// What a compose command sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposeAction {
    Text(String),
    LibraryImage,
    CameraPhoto,
    Location,
    Audio,
}

pub async fn run_compose(
    action: ComposeAction,
    device: CliDevice,
    data_dir: &Path,
) -> Result<(), CliError> {
    let mut session = Session::open_from_env(data_dir).await?;
    session.settle().await;

    let outcome = send(&mut session, action, device).await;
    let outcome = match outcome {
        Ok(Some(id)) => {
            let confirmed = session.wait_for_confirmation(&id, CONFIRM_TIMEOUT).await;
            if confirmed {
                println!("Sent {id} (synced)");
            } else {
                println!("Queued {id} (pending)");
            }
            Ok(())
        }
        Ok(None) => {
            println!("Nothing selected, no message sent");
            Ok(())
        }
        Err(error) => Err(error),
    };

    session.close();
    outcome
}

async fn send(
    session: &mut Session,
    action: ComposeAction,
    device: CliDevice,
) -> Result<Option<MessageId>, CliError> {
    let blobs = session.blob_store()?;
    let mut uploader = AttachmentUploader::new(session.config.author.clone(), device, blobs);
    let sink = &mut session.controller;

    let sent = match action {
        ComposeAction::Text(text) => uploader.send_text(&text, sink).await.map(Some),
        ComposeAction::LibraryImage => uploader.send_library_image(sink).await,
        ComposeAction::CameraPhoto => uploader.send_camera_photo(sink).await,
        ComposeAction::Location => uploader.send_location(sink).await.map(Some),
        ComposeAction::Audio => match uploader.start_recording().await {
            Ok(()) => uploader.stop_and_send_recording(sink).await.map(Some),
            Err(error) => Err(error),
        },
    };

    uploader.shutdown().await;
    Ok(sent?)
}
