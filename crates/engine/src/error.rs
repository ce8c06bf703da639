use thiserror::Error;

/// Failure modes of a report fetch.
///
/// `Clone` because a single settled request may have to be broadcast to
/// every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// The report type has no descriptor in the registry. Never reaches the
    /// network.
    #[error("unknown report type: {0}")]
    UnknownReport(String),

    /// The endpoint answered with a non-success status.
    #[error("HTTP error: {0}")]
    Http(u16),

    /// The 30 second guard fired before the endpoint answered.
    #[error("request took too long")]
    Timeout,

    /// The body was not the JSON object the endpoint is documented to return.
    #[error("failed to parse response: {0}")]
    Decode(String),

    /// The request never produced a response (connection refused, DNS, ...).
    #[error("request failed: {0}")]
    Network(String),

    /// The in-flight registry was cleared while this caller was parked on it.
    #[error("request cancelled")]
    Cancelled,
}

impl ReportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ReportError::Timeout)
    }
}
