//! Data models for Chatify

mod message;

pub use message::{
    sort_newest_first, Author, Coordinates, DeliveryState, Message, MessageId, Payload,
    PayloadKind,
};
