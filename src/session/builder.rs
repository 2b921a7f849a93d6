use super::{Credentials, MatrixSession, SessionBuilderError};
use crate::net::{
    TransportProvider,
    DEFAULT_API_PATH, DEFAULT_MEDIA_PATH,
    DEFAULT_TIMEOUT, DEFAULT_LONG_POLL_WINDOW, DEFAULT_GRACE_PERIOD,
};
use crate::request::AuthScheme;
use crate::txn::TxnSequencer;
use crate::types::UserId;
use std::sync::Arc;
use std::time::Duration;
use reqwest::Client;
use url::Url;

/// Builds a [`MatrixSession`] with non-default paths, timeouts or auth.
#[derive(Debug)]
pub struct MatrixSessionBuilder {
    server: Url,
    access_token: String,
    user_id: UserId,
    api_path: String,
    media_path: String,
    timeout: Duration,
    long_poll_window: Duration,
    grace_period: Duration,
    auth_scheme: AuthScheme,
    sync_filter: Option<String>,
    client: Option<Client>,
}

impl MatrixSessionBuilder {
    pub fn new(server: Url, access_token: impl Into<String>, user_id: UserId) -> Self {
        Self {
            server,
            access_token: access_token.into(),
            user_id,
            api_path: DEFAULT_API_PATH.to_owned(),
            media_path: DEFAULT_MEDIA_PATH.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            long_poll_window: DEFAULT_LONG_POLL_WINDOW,
            grace_period: DEFAULT_GRACE_PERIOD,
            auth_scheme: AuthScheme::default(),
            sync_filter: None,
            client: None,
        }
    }

    pub fn api_path(mut self, api_path: impl Into<String>) -> Self {
        self.api_path = api_path.into();
        self
    }

    pub fn media_path(mut self, media_path: impl Into<String>) -> Self {
        self.media_path = media_path.into();
        self
    }

    /// Timeout for ordinary calls.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How long the server is asked to hold sync calls open.
    pub fn long_poll_window(mut self, window: Duration) -> Self {
        self.long_poll_window = window;
        self
    }

    /// Slack added on top of the window for the long-poll client timeout.
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn auth_scheme(mut self, scheme: AuthScheme) -> Self {
        self.auth_scheme = scheme;
        self
    }

    /// A server-side filter id or definition passed on every sync call.
    pub fn sync_filter(mut self, filter: impl Into<String>) -> Self {
        self.sync_filter = Some(filter.into());
        self
    }

    /// Supplies a preconfigured [`Client`] to share its connection pool.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<MatrixSession, SessionBuilderError> {
        if self.access_token.is_empty() {
            return Err(SessionBuilderError::EmptyAccessToken);
        }

        if self.user_id.as_str().is_empty() {
            return Err(SessionBuilderError::EmptyUserId);
        }

        let transports = TransportProvider::new(
            &self.server,
            &self.api_path,
            &self.media_path,
            self.timeout,
            self.long_poll_window,
            self.grace_period,
            self.client,
        )?;

        Ok(MatrixSession {
            credentials: Arc::new(Credentials {
                access_token: self.access_token,
                user_id: self.user_id,
                server: self.server,
            }),
            transports,
            txn: Arc::new(TxnSequencer::new()),
            auth_scheme: self.auth_scheme,
            long_poll_window: self.long_poll_window,
            sync_filter: self.sync_filter,
        })
    }
}
