use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use super::msg::now_millis;

/// Immutable metadata fixed when a room is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created: i64,
}

impl RoomInfo {
    pub(crate) fn new(name: String, description: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            name,
            description,
            created: now_millis(),
        }
    }
}

/// Membership snapshot published by the hub after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presence {
    /// Every user that ever joined, `true` while one of their connections is a member.
    pub users: BTreeMap<String, bool>,
    pub members: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    #[serde(rename = "roomID")]
    pub id: Uuid,
    #[serde(rename = "roomName")]
    pub name: String,
    #[serde(rename = "discription")]
    pub description: String,
    pub time: i64,
    #[serde(rename = "existclients")]
    pub present: BTreeMap<String, bool>,
    pub members: usize,
}

impl RoomSummary {
    pub(crate) fn new(info: &RoomInfo, presence: Presence) -> Self {
        Self {
            id: info.id,
            name: info.name.clone(),
            description: info.description.clone(),
            time: info.created,
            present: presence.users,
            members: presence.members,
        }
    }
}
