use crate::net::TransportError;

/// A fatal configuration error building a [`crate::session::MatrixSession`].
#[derive(Debug, thiserror::Error)]
pub enum SessionBuilderError {
    #[error("Access token is empty")]
    EmptyAccessToken,
    #[error("User id is empty")]
    EmptyUserId,
    #[error("Transport: {}", .0)]
    Transport(#[from] TransportError),
}
