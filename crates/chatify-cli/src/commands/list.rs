use std::path::Path;

use crate::commands::common::{
    format_message_lines, message_to_list_item, mode_banner, MessageListItem, Session,
};
use crate::error::CliError;

pub async fn run_list(limit: usize, as_json: bool, data_dir: &Path) -> Result<(), CliError> {
    let mut session = Session::open_from_env(data_dir).await?;
    session.settle().await;

    let messages = session.controller.messages();
    let shown = &messages[..limit.min(messages.len())];

    if as_json {
        let json_items = shown
            .iter()
            .map(message_to_list_item)
            .collect::<Vec<MessageListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        if let Some(banner) = mode_banner(session.controller.mode()) {
            println!("{banner}");
        }
        if shown.is_empty() {
            println!("No messages yet");
        }
        for line in format_message_lines(shown) {
            println!("{line}");
        }
    }

    session.close();
    Ok(())
}
