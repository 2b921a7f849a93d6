mod error;
mod builder;

pub use error::SessionBuilderError;
pub use builder::MatrixSessionBuilder;

use crate::net::{MediaUrlError, TransportProfile, TransportProvider};
use crate::request::{Auth, AuthScheme, OperationDescriptor};
use crate::response::{self, Outcome};
use crate::sync::{SyncConsumer, SyncHandle};
use crate::txn::{TxnId, TxnSequencer};
use crate::types::{
    AuthedUser, AvatarUrl, CanonicalAliasContent, Chunked, ContextResponse,
    CreateRoomResult, CreateRoomSettings, DiscoveredRoom, DisplayName, EmptyResult,
    EventId, FetchDirection, InviteUserData, JoinRoomResult, MemberBanishment,
    Message, ResolveRoomAliasResult, RoomAvatarContent, RoomBatch,
    RoomDirectoryQuery, RoomEvent, RoomEventType, RoomId, RoomInfo,
    RoomNameContent, SendResult, SyncResponse, UploadResponse, UserId,
};
use std::sync::Arc;
use std::time::Duration;
use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

/// What a login handshake produced, fixed for the session's lifetime.
#[derive(Debug)]
pub struct Credentials {
    pub access_token: String,
    pub user_id: UserId,
    pub server: Url,
}

/// An authenticated session against one homeserver.
///
/// Binds the credentials, the transport profiles and the transaction
/// sequencer behind one method per API operation. Cloning is cheap and
/// clones share the connection pool and the sequencer, so operations may
/// be invoked concurrently from independent tasks.
#[derive(Debug, Clone)]
pub struct MatrixSession {
    pub(crate) credentials: Arc<Credentials>,
    pub(crate) transports: TransportProvider,
    pub(crate) txn: Arc<TxnSequencer>,
    pub(crate) auth_scheme: AuthScheme,
    pub(crate) long_poll_window: Duration,
    pub(crate) sync_filter: Option<String>,
}

impl MatrixSession {
    /// Creates a new [`MatrixSessionBuilder`].
    pub fn builder(
        server: Url,
        access_token: impl Into<String>,
        user_id: UserId,
    ) -> MatrixSessionBuilder {
        MatrixSessionBuilder::new(server, access_token, user_id)
    }

    /// Creates a session with default settings from a login result.
    pub fn new(server: Url, authed: AuthedUser) -> Result<Self, SessionBuilderError> {
        Self::builder(server, authed.access_token, authed.user_id).build()
    }

    pub fn user_id(&self) -> &UserId {
        &self.credentials.user_id
    }

    pub fn server(&self) -> &Url {
        &self.credentials.server
    }

    pub async fn create_room(
        &self,
        settings: &CreateRoomSettings,
    ) -> Outcome<CreateRoomResult> {
        let operation = OperationDescriptor::new(Method::POST, "createRoom")
            .json_body(settings)?;

        self.execute(TransportProfile::Standard, operation).await
    }

    pub async fn join_room(&self, room: &RoomId) -> Outcome<JoinRoomResult> {
        let operation = OperationDescriptor::new(Method::POST, "rooms/{roomId}/join")
            .path_param("roomId", room);

        self.execute(TransportProfile::Standard, operation).await
    }

    pub async fn leave_room(&self, room: &RoomId) -> Outcome<EmptyResult> {
        let operation = OperationDescriptor::new(Method::POST, "rooms/{roomId}/leave")
            .path_param("roomId", room);

        self.execute(TransportProfile::Standard, operation).await
    }

    pub async fn invite_member(&self, room: &RoomId, user: UserId) -> Outcome<EmptyResult> {
        let operation = OperationDescriptor::new(Method::POST, "rooms/{roomId}/invite")
            .path_param("roomId", room)
            .json_body(&InviteUserData { user_id: user })?;

        self.execute(TransportProfile::Standard, operation).await
    }

    pub async fn ban_member(
        &self,
        room: &RoomId,
        user: UserId,
        reason: Option<String>,
    ) -> Outcome<EmptyResult> {
        let operation = OperationDescriptor::new(Method::POST, "rooms/{roomId}/ban")
            .path_param("roomId", room)
            .json_body(&MemberBanishment { user_id: user, reason })?;

        self.execute(TransportProfile::Standard, operation).await
    }

    /// Sends a message with a fresh transaction id.
    ///
    /// Each logical send gets its own id; use
    /// [`MatrixSession::send_message_with_txn`] to retry a send under the
    /// id it was first attempted with.
    pub async fn send_message(&self, room: &RoomId, message: &Message) -> Outcome<SendResult> {
        self.send_message_with_txn(room, self.txn.next(), message).await
    }

    /// Sends a message under a caller-supplied transaction id.
    pub async fn send_message_with_txn(
        &self,
        room: &RoomId,
        txn_id: TxnId,
        message: &Message,
    ) -> Outcome<SendResult> {
        log::debug!("sending message {txn_id} to room {room}");

        let operation = OperationDescriptor::new(
            Method::PUT,
            "rooms/{roomId}/send/{eventType}/{txnId}",
        )
            .path_param("roomId", room)
            .path_param("eventType", RoomEventType::Message)
            .path_param("txnId", &txn_id)
            .json_body(message)?;

        self.execute(TransportProfile::Standard, operation).await
    }

    pub async fn send_state_event<T>(
        &self,
        room: &RoomId,
        event_type: RoomEventType,
        content: &T,
    ) -> Outcome<SendResult>
    where
        T: Serialize,
    {
        let operation = OperationDescriptor::new(Method::PUT, "rooms/{roomId}/state/{eventType}")
            .path_param("roomId", room)
            .path_param("eventType", event_type)
            .json_body(content)?;

        self.execute(TransportProfile::Standard, operation).await
    }

    pub async fn set_room_name(&self, room: &RoomId, name: impl Into<String>) -> Outcome<SendResult> {
        self.send_state_event(room, RoomEventType::Name, &RoomNameContent { name: name.into() })
            .await
    }

    pub async fn set_room_avatar(&self, room: &RoomId, url: impl Into<String>) -> Outcome<SendResult> {
        self.send_state_event(room, RoomEventType::Avatar, &RoomAvatarContent { url: url.into() })
            .await
    }

    pub async fn set_room_canonical_alias(
        &self,
        room: &RoomId,
        alias: impl Into<String>,
    ) -> Outcome<SendResult> {
        self.send_state_event(
            room,
            RoomEventType::CanonicalAlias,
            &CanonicalAliasContent { alias: alias.into() },
        )
        .await
    }

    /// Fetches a page of room history starting from the given pagination
    /// token.
    pub async fn get_room_messages(
        &self,
        room: &RoomId,
        from: &str,
        dir: FetchDirection,
        limit: Option<u32>,
        to: Option<&str>,
    ) -> Outcome<Chunked<RoomEvent>> {
        let operation = OperationDescriptor::new(Method::GET, "rooms/{roomId}/messages")
            .path_param("roomId", room)
            .query_param("from", Some(from.to_owned()))
            .query_param("dir", Some(dir.as_str().to_owned()))
            .query_param("limit", Some(limit.unwrap_or(100).to_string()))
            .query_param("to", to.map(str::to_owned));

        self.execute(TransportProfile::Standard, operation).await
    }

    pub async fn get_event_context(
        &self,
        room: &RoomId,
        event: &EventId,
        limit: Option<u32>,
    ) -> Outcome<ContextResponse> {
        let operation = OperationDescriptor::new(Method::GET, "rooms/{roomId}/context/{eventId}")
            .path_param("roomId", room)
            .path_param("eventId", event)
            .query_param("limit", Some(limit.unwrap_or(2).to_string()));

        self.execute(TransportProfile::Standard, operation).await
    }

    pub async fn resolve_room_alias(&self, alias: &str) -> Outcome<ResolveRoomAliasResult> {
        let operation = OperationDescriptor::unauthenticated(Method::GET, "directory/room/{roomAlias}")
            .path_param("roomAlias", alias);

        self.execute(TransportProfile::Standard, operation).await
    }

    pub async fn put_room_alias(&self, room: &RoomId, alias: &str) -> Outcome<EmptyResult> {
        let operation = OperationDescriptor::new(Method::PUT, "directory/room/{roomAlias}")
            .path_param("roomAlias", alias)
            .json_body(&RoomInfo { room_id: room.clone() })?;

        self.execute(TransportProfile::Standard, operation).await
    }

    pub async fn delete_room_alias(&self, alias: &str) -> Outcome<EmptyResult> {
        let operation = OperationDescriptor::new(Method::DELETE, "directory/room/{roomAlias}")
            .path_param("roomAlias", alias);

        self.execute(TransportProfile::Standard, operation).await
    }

    /// Lists rooms from the public directory.
    pub async fn public_rooms(
        &self,
        since: Option<&str>,
        limit: u32,
    ) -> Outcome<RoomBatch<DiscoveredRoom>> {
        let operation = OperationDescriptor::unauthenticated(Method::GET, "publicRooms")
            .query_param("since", since.map(str::to_owned))
            .query_param("limit", Some(limit.to_string()));

        self.execute(TransportProfile::Standard, operation).await
    }

    /// Searches the public directory.
    pub async fn find_public_rooms(
        &self,
        query: &RoomDirectoryQuery,
    ) -> Outcome<RoomBatch<DiscoveredRoom>> {
        let operation = OperationDescriptor::new(Method::POST, "publicRooms")
            .json_body(query)?;

        self.execute(TransportProfile::Standard, operation).await
    }

    pub async fn get_avatar(&self, user: &UserId) -> Outcome<AvatarUrl> {
        let operation = OperationDescriptor::unauthenticated(Method::GET, "profile/{userId}/avatar_url")
            .path_param("userId", user);

        self.execute(TransportProfile::Standard, operation).await
    }

    /// Sets this session's own avatar.
    pub async fn update_avatar(&self, avatar_url: impl Into<String>) -> Outcome<EmptyResult> {
        let operation = OperationDescriptor::new(Method::PUT, "profile/{userId}/avatar_url")
            .path_param("userId", self.user_id())
            .json_body(&AvatarUrl { avatar_url: Some(avatar_url.into()) })?;

        self.execute(TransportProfile::Standard, operation).await
    }

    pub async fn get_display_name(&self, user: &UserId) -> Outcome<DisplayName> {
        let operation = OperationDescriptor::unauthenticated(Method::GET, "profile/{userId}/displayname")
            .path_param("userId", user);

        self.execute(TransportProfile::Standard, operation).await
    }

    /// Sets this session's own display name.
    pub async fn update_display_name(&self, name: impl Into<String>) -> Outcome<EmptyResult> {
        let operation = OperationDescriptor::new(Method::PUT, "profile/{userId}/displayname")
            .path_param("userId", self.user_id())
            .json_body(&DisplayName { displayname: Some(name.into()) })?;

        self.execute(TransportProfile::Standard, operation).await
    }

    /// Uploads raw bytes to the media repository.
    pub async fn upload_media(
        &self,
        content_type: impl Into<String>,
        data: Bytes,
    ) -> Outcome<UploadResponse> {
        let operation = OperationDescriptor::new(Method::POST, "upload")
            .raw_body(content_type, data);

        self.execute(TransportProfile::Media, operation).await
    }

    /// Translates an `mxc://` address into a downloadable URL.
    pub fn media_url(&self, addr: &str) -> Result<Url, MediaUrlError> {
        self.transports.media_url(addr)
    }

    /// Issues one long poll for events newer than `since`.
    ///
    /// `None` asks for a full initial sync. Runs on the long-poll transport
    /// profile so it never starves ordinary calls of their timeout.
    pub async fn sync_once(&self, since: Option<&str>) -> Outcome<SyncResponse> {
        let operation = OperationDescriptor::new(Method::GET, "sync")
            .query_param("since", since.map(str::to_owned))
            .query_param("full_state", Some("false".to_owned()))
            .query_param("timeout", Some(self.long_poll_window.as_millis().to_string()))
            .query_param("filter", self.sync_filter.clone());

        self.execute(TransportProfile::LongPoll, operation).await
    }

    /// Starts the sync loop on a background task.
    ///
    /// The consumer receives each batch in order; the returned handle
    /// cancels the loop and reports its terminal state.
    pub fn sync_loop<C>(&self, consumer: C) -> SyncHandle
    where
        C: SyncConsumer + 'static,
    {
        SyncHandle::spawn(self.clone(), consumer)
    }

    async fn execute<T>(
        &self,
        profile: TransportProfile,
        operation: OperationDescriptor,
    ) -> Outcome<T>
    where
        T: DeserializeOwned,
    {
        let handle = self.transports.handle(profile);
        let request = operation.build(handle.base(), Some(self.auth()))?;

        // the access token may ride in the query, so log the path only
        log::debug!("{} {}", request.method, request.url.path());

        let result = handle.send(request).await;

        response::map_transport(result).await
    }

    fn auth(&self) -> Auth<'_> {
        Auth {
            token: &self.credentials.access_token,
            scheme: self.auth_scheme,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_access_token_fails_at_construction() {
        let result = MatrixSession::builder(
            Url::parse("https://matrix.example.org").unwrap(),
            "",
            UserId::from("@julia:example.org"),
        )
        .build();

        assert!(matches!(result, Err(SessionBuilderError::EmptyAccessToken)));
    }

    #[test]
    fn malformed_server_url_fails_at_construction() {
        let result = MatrixSession::builder(
            Url::parse("data:text/plain,hello").unwrap(),
            "syt_secret",
            UserId::from("@julia:example.org"),
        )
        .build();

        assert!(matches!(result, Err(SessionBuilderError::Transport(_))));
    }

    #[test]
    fn session_translates_media_addresses() {
        let session = MatrixSession::builder(
            Url::parse("https://matrix.example.org").unwrap(),
            "syt_secret",
            UserId::from("@julia:example.org"),
        )
        .build()
        .unwrap();
        let url = session.media_url("mxc://example.org/abc123").unwrap();

        assert_eq!(
            url.as_str(),
            "https://matrix.example.org/_matrix/media/r0/download/example.org/abc123",
        );
    }
}
