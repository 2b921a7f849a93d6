//! Client crate for the Matrix chat client-server HTTP API.

pub mod login;
pub mod net;
pub mod request;
pub mod response;
pub mod session;
pub mod sync;
pub mod txn;
pub mod types;

pub use login::login;
pub use response::{ApiError, ErrorKind, Outcome};
pub use session::{Credentials, MatrixSession, MatrixSessionBuilder, SessionBuilderError};
pub use sync::{SyncConsumer, SyncHandle, SyncTermination};
pub use txn::{TxnId, TxnSequencer};
