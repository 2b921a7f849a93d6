use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque room identifier, such as `!abc123:example.org`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A fully-qualified user identifier, such as `@julia:example.org`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// An opaque event identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// The type of a room event sent through the `send` or `state` endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEventType {
    Message,
    Name,
    Avatar,
    CanonicalAlias,
}

impl RoomEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomEventType::Message => "m.room.message",
            RoomEventType::Name => "m.room.name",
            RoomEventType::Avatar => "m.room.avatar",
            RoomEventType::CanonicalAlias => "m.room.canonical_alias",
        }
    }
}

impl fmt::Display for RoomEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The direction in which to page through room history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDirection {
    /// Towards older events.
    Backward,
    /// Towards newer events.
    Forward,
}

impl FetchDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchDirection::Backward => "b",
            FetchDirection::Forward => "f",
        }
    }
}

/// A room event as returned by the server.
///
/// The content is left as raw JSON so that callers can decode it against
/// whatever schema matches the event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEvent {
    #[serde(default)]
    pub event_id: Option<EventId>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub sender: Option<UserId>,
    #[serde(default)]
    pub origin_server_ts: Option<i64>,
    #[serde(default)]
    pub state_key: Option<String>,
    #[serde(default)]
    pub content: Value,
}

/// A message event body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub msgtype: String,
    pub body: String,
}

impl Message {
    /// Creates a plain `m.text` message.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            msgtype: "m.text".to_owned(),
            body: body.into(),
        }
    }

    /// Creates an `m.emote` message.
    pub fn emote(body: impl Into<String>) -> Self {
        Self {
            msgtype: "m.emote".to_owned(),
            body: body.into(),
        }
    }
}

/// Room visibility in the public directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomVisibility {
    Public,
    Private,
}

/// Settings for creating a new room.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRoomSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_alias_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub visibility: RoomVisibility,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invite: Vec<UserId>,
}

impl CreateRoomSettings {
    /// Creates settings for a private room with the given name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            room_alias_name: None,
            topic: None,
            visibility: RoomVisibility::Private,
            invite: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomResult {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinRoomResult {
    pub room_id: RoomId,
}

/// The `{}` body most write endpoints respond with.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmptyResult {}

#[derive(Debug, Clone, Serialize)]
pub struct InviteUserData {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberBanishment {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendResult {
    pub event_id: EventId,
}

/// A page of events from the `messages` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Chunked<T> {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default = "Vec::new")]
    pub chunk: Vec<T>,
}

/// Events surrounding a given event, from the `context` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextResponse {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default = "Vec::new")]
    pub events_before: Vec<RoomEvent>,
    #[serde(default)]
    pub event: Option<RoomEvent>,
    #[serde(default = "Vec::new")]
    pub events_after: Vec<RoomEvent>,
    #[serde(default = "Vec::new")]
    pub state: Vec<RoomEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveRoomAliasResult {
    pub room_id: RoomId,
    #[serde(default = "Vec::new")]
    pub servers: Vec<String>,
}

/// The body of a `PUT directory/room/{alias}` request.
#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    pub room_id: RoomId,
}

/// A page of rooms from the public directory.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomBatch<T> {
    #[serde(default = "Vec::new")]
    pub chunk: Vec<T>,
    #[serde(default)]
    pub next_batch: Option<String>,
    #[serde(default)]
    pub total_room_count_estimate: Option<u64>,
}

/// A room listed in the public directory.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveredRoom {
    pub room_id: RoomId,
    #[serde(default = "Vec::new")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub num_joined_members: u64,
    #[serde(default)]
    pub world_readable: bool,
    #[serde(default)]
    pub guest_can_join: bool,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A search query against the public room directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoomDirectoryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<DirectoryFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryFilter {
    pub generic_search_term: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarUrl {
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayName {
    #[serde(default)]
    pub displayname: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    /// The `mxc://` address of the uploaded content.
    pub content_uri: String,
}

/// Content of an `m.room.name` state event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomNameContent {
    pub name: String,
}

/// Content of an `m.room.avatar` state event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomAvatarContent {
    pub url: String,
}

/// Content of an `m.room.canonical_alias` state event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalAliasContent {
    pub alias: String,
}

/// The standard error body embedded in failure responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub errcode: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A batch of new events from the `sync` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncResponse {
    /// The cursor to pass as `since` on the next call.
    pub next_batch: String,
    #[serde(default)]
    pub rooms: SyncRooms,
    #[serde(default)]
    pub presence: EventContainer,
    #[serde(default)]
    pub account_data: EventContainer,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncRooms {
    #[serde(default)]
    pub join: HashMap<RoomId, JoinedRoom>,
    #[serde(default)]
    pub invite: HashMap<RoomId, InvitedRoom>,
    #[serde(default)]
    pub leave: HashMap<RoomId, LeftRoom>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinedRoom {
    #[serde(default)]
    pub state: EventContainer,
    #[serde(default)]
    pub timeline: Timeline,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvitedRoom {
    #[serde(default)]
    pub invite_state: EventContainer,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeftRoom {
    #[serde(default)]
    pub state: EventContainer,
    #[serde(default)]
    pub timeline: Timeline,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Timeline {
    #[serde(default = "Vec::new")]
    pub events: Vec<RoomEvent>,
    #[serde(default)]
    pub limited: bool,
    #[serde(default)]
    pub prev_batch: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventContainer {
    #[serde(default = "Vec::new")]
    pub events: Vec<RoomEvent>,
}

/// The body of a password login request.
#[derive(Debug, Clone, Serialize)]
pub struct UserPassword {
    pub r#type: String,
    /// Name only, without `@` or the server part.
    pub user: String,
    pub password: String,
}

impl UserPassword {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            r#type: "m.login.password".to_owned(),
            user: user.into(),
            password: password.into(),
        }
    }
}

/// The credentials returned by a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthedUser {
    pub access_token: String,
    pub user_id: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_sync_response() {
        let json = r#"{
            "next_batch": "s72595_4483_1934",
            "rooms": {
                "join": {
                    "!room:example.org": {
                        "timeline": {
                            "events": [
                                {
                                    "type": "m.room.message",
                                    "event_id": "$143273582443PhrSn:example.org",
                                    "sender": "@julia:example.org",
                                    "content": {"msgtype": "m.text", "body": "hi"}
                                }
                            ],
                            "limited": false
                        }
                    }
                }
            }
        }"#;
        let response = serde_json::from_str::<SyncResponse>(json).unwrap();

        assert_eq!(response.next_batch, "s72595_4483_1934");

        let room = response.rooms.join.get(&RoomId::from("!room:example.org")).unwrap();

        assert_eq!(room.timeline.events.len(), 1);
        assert_eq!(room.timeline.events[0].event_type, "m.room.message");
    }

    #[test]
    fn serializes_create_room_settings() {
        let settings = CreateRoomSettings::with_name("lobby");
        let value = serde_json::to_value(&settings).unwrap();

        assert_eq!(value["name"], "lobby");
        assert_eq!(value["visibility"], "private");
        assert!(value.get("topic").is_none());
        assert!(value.get("invite").is_none());
    }

    #[test]
    fn serializes_login_body() {
        let body = UserPassword::new("julia", "hunter2");
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["type"], "m.login.password");
        assert_eq!(value["user"], "julia");
    }
}
