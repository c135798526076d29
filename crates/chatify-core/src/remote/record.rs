//! Wire representation of a remote log entry.

use serde::{Deserialize, Serialize};

use crate::models::{Author, Coordinates, DeliveryState, Message, MessageId, Payload};
use crate::{Error, Result};

/// Sender as stored alongside a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// A message as written to the remote log.
///
/// Exactly one of `text`, `image`, `audio` and `location` is set. `_id` holds
/// the id the client composed the message with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    /// Unix milliseconds
    pub created_at: i64,
    pub user: RemoteUser,
}

impl From<&Message> for RemoteRecord {
    fn from(message: &Message) -> Self {
        let mut record = Self {
            client_id: Some(message.id.to_string()),
            text: None,
            image: None,
            audio: None,
            location: None,
            created_at: message.created_at,
            user: RemoteUser {
                id: message.author.id.clone(),
                name: message.author.display_name.clone(),
            },
        };
        match &message.payload {
            Payload::Text(text) => record.text = Some(text.clone()),
            Payload::Image(url) => record.image = Some(url.clone()),
            Payload::Audio(url) => record.audio = Some(url.clone()),
            Payload::Location(position) => record.location = Some(*position),
        }
        record
    }
}

impl RemoteRecord {
    /// Convert into a synced message with the id the log assigned.
    pub fn into_message(self, id: MessageId) -> Result<Message> {
        let payload = match (self.text, self.image, self.audio, self.location) {
            (Some(text), None, None, None) => Payload::text(text)?,
            (None, Some(url), None, None) => Payload::image(url)?,
            (None, None, Some(url), None) => Payload::audio(url)?,
            (None, None, None, Some(position)) => Payload::location(Coordinates::new(
                position.latitude,
                position.longitude,
            )?),
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Record {id} must carry exactly one payload"
                )));
            }
        };
        let client_id = self
            .client_id
            .as_deref()
            .map(str::parse::<MessageId>)
            .transpose()?;

        Ok(Message {
            id,
            client_id,
            author: Author::new(self.user.id, self.user.name)?,
            created_at: self.created_at,
            payload,
            delivery: DeliveryState::Synced,
        })
    }
}
