use crate::types::ErrorBody;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

/// The value-level result every operation returns.
///
/// Expected failures (4xx, 5xx, timeouts, undecodable bodies) are carried
/// as [`ApiError`] values; nothing is thrown past the session boundary.
pub type Outcome<T> = Result<T, ApiError>;

/// Classifies an [`ApiError`] by who is at fault and whether retrying can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A 4xx response. The request itself was rejected; retrying the same
    /// request will not help.
    Client,
    /// A network failure, timeout or 5xx response. Retrying may succeed.
    Transient,
    /// The response did not match the expected shape, which usually means
    /// a server version mismatch. Never retried.
    Protocol,
}

/// A typed failure describing why an operation did not succeed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    /// The HTTP status, if a response was received at all.
    pub status: Option<StatusCode>,
    /// The machine-readable code the server embedded, such as `M_NOT_FOUND`.
    pub errcode: Option<String>,
    pub message: String,
}

impl ApiError {
    /// Whether the condition is transient and a retry may succeed.
    pub fn retryable(&self) -> bool {
        self.kind == ErrorKind::Transient
    }

    /// Whether the server revoked or rejected the client's authentication.
    pub fn is_auth_revoked(&self) -> bool {
        matches!(
            self.status,
            Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN),
        )
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Protocol,
            status: None,
            errcode: None,
            message: message.into(),
        }
    }
}

impl From<crate::request::BuildError> for ApiError {
    fn from(error: crate::request::BuildError) -> Self {
        ApiError::protocol(error.to_string())
    }
}

/// Maps a received status and body to a typed outcome.
///
/// 2xx with a body decoding as `T` is a success; 2xx with an undecodable
/// body is a protocol error; 4xx is a client error carrying whatever
/// `errcode`/`error` the server embedded; everything else is transient.
pub fn map_response<T>(status: StatusCode, body: &[u8]) -> Outcome<T>
where
    T: DeserializeOwned,
{
    if status.is_success() {
        return serde_json::from_slice(body).map_err(|error| ApiError {
            kind: ErrorKind::Protocol,
            status: Some(status),
            errcode: None,
            message: format!("Undecodable {} response body: {}", status, error),
        });
    }

    let ErrorBody { errcode, error } = serde_json::from_slice(body).unwrap_or_default();
    let message = error
        .unwrap_or_else(|| format!("Server responded with {}", status));

    Err(ApiError {
        kind: if status.is_client_error() {
            ErrorKind::Client
        } else {
            ErrorKind::Transient
        },
        status: Some(status),
        errcode,
        message,
    })
}

/// Maps the raw transport result of a sent request to a typed outcome.
///
/// Transport-level failures (connection refused, timeout, DNS) never reach
/// the server, so they are always transient.
pub(crate) async fn map_transport<T>(
    result: Result<reqwest::Response, reqwest::Error>,
) -> Outcome<T>
where
    T: DeserializeOwned,
{
    let response = result.map_err(transport_error)?;
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(transport_error)?;

    map_response(status, &body)
}

fn transport_error(error: reqwest::Error) -> ApiError {
    ApiError {
        kind: ErrorKind::Transient,
        status: error.status(),
        errcode: None,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CreateRoomResult;

    #[test]
    fn success_with_valid_body_decodes() {
        let body = br#"{"room_id": "!created:example.org"}"#;
        let result = map_response::<CreateRoomResult>(StatusCode::OK, body).unwrap();

        assert_eq!(result.room_id.as_str(), "!created:example.org");
    }

    #[test]
    fn success_with_malformed_body_is_a_protocol_error() {
        let body = br#"{"unexpected": true}"#;
        let error = map_response::<CreateRoomResult>(StatusCode::OK, body).unwrap_err();

        assert_eq!(error.kind, ErrorKind::Protocol);
        assert!(!error.retryable());
    }

    #[test]
    fn not_found_is_a_client_error_with_errcode() {
        let body = br#"{"errcode": "M_NOT_FOUND", "error": "Room alias not found."}"#;
        let error = map_response::<CreateRoomResult>(StatusCode::NOT_FOUND, body).unwrap_err();

        assert_eq!(error.kind, ErrorKind::Client);
        assert_eq!(error.errcode.as_deref(), Some("M_NOT_FOUND"));
        assert_eq!(error.message, "Room alias not found.");
        assert!(!error.retryable());
    }

    #[test]
    fn server_error_is_transient() {
        let error = map_response::<CreateRoomResult>(StatusCode::BAD_GATEWAY, b"").unwrap_err();

        assert_eq!(error.kind, ErrorKind::Transient);
        assert!(error.retryable());
    }

    #[test]
    fn unauthorized_is_flagged_as_auth_revoked() {
        let error = map_response::<CreateRoomResult>(StatusCode::UNAUTHORIZED, b"{}").unwrap_err();

        assert_eq!(error.kind, ErrorKind::Client);
        assert!(error.is_auth_revoked());
    }
}
