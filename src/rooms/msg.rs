use axum::extract::ws;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Serialize, Serializer};
use time::OffsetDateTime;
use uuid::Uuid;

/// Opaque frame body relayed between members of a room. Serializes as the
/// text itself, or as standard base64 for binary frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// `None` for control frames, which never reach the hub.
    pub(crate) fn from_ws(msg: ws::Message) -> Option<Self> {
        match msg {
            ws::Message::Text(text) => Some(Self::Text(text.as_str().to_owned())),
            ws::Message::Binary(bytes) => Some(Self::Binary(bytes.to_vec())),
            _ => None,
        }
    }

    pub(crate) fn to_ws(&self) -> ws::Message {
        match self {
            Self::Text(text) => ws::Message::Text(text.clone().into()),
            Self::Binary(bytes) => ws::Message::Binary(bytes.clone().into()),
        }
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Binary(bytes) => serializer.serialize_str(&BASE64.encode(bytes)),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// What lands in a client's outbound buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub sender: String,
    pub payload: Payload,
}

/// Audit record of a broadcast that reached at least one member.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub time: i64,
    #[serde(rename = "roomID")]
    pub room_id: Uuid,
    pub data: Payload,
}

pub(crate) fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
