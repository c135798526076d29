use std::path::Path;

use chatify_core::models::{Message, MessageId};
use chatify_core::sync::SyncMode;

use crate::commands::common::{format_message_lines, mode_banner, Session};
use crate::error::CliError;

pub async fn run_watch(limit: usize, data_dir: &Path) -> Result<(), CliError> {
    let mut session = Session::open_from_env(data_dir).await?;
    print_view(session.controller.messages(), session.controller.mode(), limit);

    let mut last_rendered = None;
    tokio::select! {
        () = session.controller.run(&mut session.connectivity, |messages, mode| {
            let view = ViewState::of(messages, mode);
            if last_rendered.as_ref() != Some(&view) {
                print_view(messages, mode, limit);
                last_rendered = Some(view);
            }
        }) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::debug!("Interrupted, stopping watch");
        }
    }

    session.close();
    Ok(())
}

/// What the terminal currently shows; redraw only when it changes.
#[derive(Debug, PartialEq)]
struct ViewState {
    mode: SyncMode,
    newest: Option<MessageId>,
    total: usize,
    pending: usize,
}

impl ViewState {
    fn of(messages: &[Message], mode: SyncMode) -> Self {
        Self {
            mode,
            newest: messages.first().map(|message| message.id.clone()),
            total: messages.len(),
            pending: messages.iter().filter(|message| message.is_pending()).count(),
        }
    }
}

fn print_view(messages: &[Message], mode: SyncMode, limit: usize) {
    println!();
    if let Some(banner) = mode_banner(mode) {
        println!("{banner}");
    }
    let shown = &messages[..limit.min(messages.len())];
    for line in format_message_lines(shown).iter().rev() {
        println!("{line}");
    }
}
