use crate::request::PreparedRequest;
use std::time::Duration;
use reqwest::Client;
use url::Url;

pub const DEFAULT_API_PATH: &str = "_matrix/client/r0/";
pub const DEFAULT_MEDIA_PATH: &str = "_matrix/media/r0/";

/// The default timeout for ordinary calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
/// How long the server holds a sync request open waiting for new events.
pub const DEFAULT_LONG_POLL_WINDOW: Duration = Duration::from_secs(50);
/// Slack added on top of the long-poll window so the client-side timeout
/// never fires before the server's window elapses.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// An error constructing transports from the configured server URL.
///
/// Fatal at construction; never surfaced per call.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Malformed server URL: {}", .0)]
    MalformedServerUrl(#[from] url::ParseError),
    #[error("Server URL must be an absolute http(s) URL: {}", .0)]
    NotABaseUrl(Url),
    #[error("HTTP client: {}", .0)]
    Http(#[from] reqwest::Error),
}

/// An error translating an `mxc://` address to a downloadable URL.
#[derive(Debug, thiserror::Error)]
pub enum MediaUrlError {
    #[error("Not an mxc:// address: {}", .0)]
    NotMxc(String),
    #[error("Malformed media address: {}", .0)]
    Malformed(#[from] url::ParseError),
}

/// A named timeout and base-URL variant of the underlying HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProfile {
    /// Ordinary short calls.
    Standard,
    /// The long-lived sync call.
    LongPoll,
    /// Media uploads and downloads, under the media base path.
    Media,
}

/// One connection pool shared by every profile; handles differ only in
/// timeout policy and base URL.
#[derive(Debug, Clone)]
pub struct TransportProvider {
    client: Client,
    api_base: Url,
    media_base: Url,
    timeout: Duration,
    long_poll_timeout: Duration,
}

impl TransportProvider {
    /// Creates the provider for one server origin.
    ///
    /// The long-poll timeout is `timeout + long_poll_window + grace`, so a
    /// sync call held open for the full window is never mistaken for a
    /// client-side timeout.
    pub fn new(
        server: &Url,
        api_path: &str,
        media_path: &str,
        timeout: Duration,
        long_poll_window: Duration,
        grace: Duration,
        client: Option<Client>,
    ) -> Result<Self, TransportError> {
        if server.cannot_be_a_base() {
            return Err(TransportError::NotABaseUrl(server.clone()));
        }

        let origin = with_trailing_slash(server);
        let api_base = origin.join(api_path)?;
        let media_base = origin.join(media_path)?;
        let client = match client {
            Some(client) => client,
            None => Client::builder().build()?,
        };

        Ok(Self {
            client,
            api_base,
            media_base,
            timeout,
            long_poll_timeout: timeout + long_poll_window + grace,
        })
    }

    /// Returns the handle for the given profile.
    pub fn handle(&self, profile: TransportProfile) -> TransportHandle {
        let (base, timeout) = match profile {
            TransportProfile::Standard => (&self.api_base, self.timeout),
            TransportProfile::LongPoll => (&self.api_base, self.long_poll_timeout),
            TransportProfile::Media => (&self.media_base, self.timeout),
        };

        TransportHandle {
            client: self.client.clone(),
            base: base.clone(),
            timeout,
        }
    }

    /// Translates an `mxc://server/id` address into a download URL under
    /// the media base path.
    pub fn media_url(&self, addr: &str) -> Result<Url, MediaUrlError> {
        let rest = addr
            .strip_prefix("mxc://")
            .ok_or_else(|| MediaUrlError::NotMxc(addr.to_owned()))?;
        let url = self.media_base.join(&format!("download/{rest}"))?;

        Ok(url)
    }
}

/// One configured base URL and timeout over the shared pool.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    client: Client,
    base: Url,
    timeout: Duration,
}

impl TransportHandle {
    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Executes a prepared request with this handle's timeout.
    pub async fn send(
        &self,
        request: PreparedRequest,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder = self.client
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(self.timeout);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        builder.send().await
    }
}

/// Joining relative paths replaces the last segment unless the base path
/// ends with a slash.
fn with_trailing_slash(server: &Url) -> Url {
    let mut url = server.clone();

    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", server.path()));
    }

    url
}
