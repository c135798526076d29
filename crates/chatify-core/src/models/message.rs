//! Message model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::is_http_url;

/// Identifier of a chat message.
///
/// Client-generated ids are UUID v7 (time-sortable). Ids assigned by the
/// remote log are opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new client-side message ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Message id cannot be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Author of a message. Immutable once the message exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub display_name: String,
}

impl Author {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Result<Self> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(Error::InvalidInput("Author id cannot be empty".to_string()));
        }
        let display_name = display_name.into().trim().to_string();
        let display_name = if display_name.is_empty() {
            id.clone()
        } else {
            display_name
        };
        Ok(Self { id, display_name })
    }
}

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidInput(format!(
                "Latitude {latitude} is outside [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidInput(format!(
                "Longitude {longitude} is outside [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Message content. Exactly one variant is ever active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Payload {
    /// Plain text
    Text(String),
    /// URL of an uploaded image
    Image(String),
    /// URL of an uploaded audio clip
    Audio(String),
    /// Shared position
    Location(Coordinates),
}

/// Discriminant of [`Payload`], used for logging and blob naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Text,
    Image,
    Audio,
    Location,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Location => "location",
        };
        f.write_str(label)
    }
}

impl Payload {
    /// Text payload; whitespace-only text is rejected.
    pub fn text(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("Message text cannot be empty".to_string()));
        }
        Ok(Self::Text(text))
    }

    pub fn image(url: impl Into<String>) -> Result<Self> {
        Ok(Self::Image(validate_media_url(url.into(), "Image")?))
    }

    pub fn audio(url: impl Into<String>) -> Result<Self> {
        Ok(Self::Audio(validate_media_url(url.into(), "Audio")?))
    }

    pub const fn location(coordinates: Coordinates) -> Self {
        Self::Location(coordinates)
    }

    pub const fn kind(&self) -> PayloadKind {
        match self {
            Self::Text(_) => PayloadKind::Text,
            Self::Image(_) => PayloadKind::Image,
            Self::Audio(_) => PayloadKind::Audio,
            Self::Location(_) => PayloadKind::Location,
        }
    }

    /// One-line human readable rendering.
    pub fn summary(&self) -> String {
        match self {
            Self::Text(text) => text.lines().next().unwrap_or_default().to_string(),
            Self::Image(url) => format!("[image] {url}"),
            Self::Audio(url) => format!("[audio] {url}"),
            Self::Location(position) => {
                format!("[location] {:.5}, {:.5}", position.latitude, position.longitude)
            }
        }
    }
}

fn validate_media_url(url: String, label: &str) -> Result<String> {
    let url = url.trim().to_string();
    if is_http_url(&url) || url.starts_with("file://") {
        Ok(url)
    } else {
        Err(Error::InvalidInput(format!(
            "{label} URL must start with http://, https:// or file://"
        )))
    }
}

/// Delivery confirmation state of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Inserted locally, not yet seen in a remote snapshot
    Pending,
    /// Present in the remote log
    Synced,
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier within the conversation
    pub id: MessageId,
    /// Client id the message was appended with, when the remote log kept it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<MessageId>,
    /// Sender
    pub author: Author,
    /// Creation timestamp (Unix ms), the sole sort key
    pub created_at: i64,
    /// Content
    pub payload: Payload,
    /// Delivery state
    pub delivery: DeliveryState,
}

impl Message {
    /// Build a new pending message with a fresh client id.
    #[must_use]
    pub fn compose(author: Author, payload: Payload, created_at: i64) -> Self {
        Self {
            id: MessageId::new(),
            client_id: None,
            author,
            created_at,
            payload,
            delivery: DeliveryState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.delivery == DeliveryState::Pending
    }

    /// Same author, timestamp and payload.
    pub fn same_content(&self, other: &Self) -> bool {
        self.author.id == other.author.id
            && self.created_at == other.created_at
            && self.payload == other.payload
    }

    /// Whether this confirmed message is the remote copy of `pending`.
    pub fn confirms(&self, pending: &Self) -> bool {
        self.client_id.as_ref() == Some(&pending.id) || self.same_content(pending)
    }
}

/// Sort newest first; ties keep their relative order.
pub fn sort_newest_first(messages: &mut [Message]) {
    messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
