use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use chrono::Utc;

/// A client-generated idempotency token attached to a message send.
///
/// Retried delivery of a write carrying the same id is recognized by the
/// server as a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxnId(String);

impl TxnId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TxnId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TxnId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Produces strictly increasing transaction ids for one client instance.
///
/// Ids are derived from a 64-bit counter seeded from the wall clock in
/// milliseconds, so they stay unique across restarts at normal message
/// rates. The counter keeps increasing even when the clock moves backward
/// or several callers race within the same millisecond. Overflow of the
/// 64-bit counter is not a practical concern at any realistic send rate.
#[derive(Debug, Default)]
pub struct TxnSequencer {
    last: AtomicI64,
}

impl TxnSequencer {
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Returns the next transaction id.
    ///
    /// Safe to call concurrently from any number of tasks or threads; no
    /// two calls ever return the same id.
    pub fn next(&self) -> TxnId {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);

        loop {
            let next = advance(last, now);

            match self.last.compare_exchange_weak(
                last,
                next,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return TxnId(next.to_string()),
                Err(observed) => last = observed,
            }
        }
    }
}

/// Takes the wall clock when it moved forward, otherwise increments.
fn advance(last: i64, now: i64) -> i64 {
    if now > last {
        now
    } else {
        last + 1
    }
}
