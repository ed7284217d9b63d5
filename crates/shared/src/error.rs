use thiserror::Error;

/// Failure returned by every gateway operation. The gateway never panics
/// across its boundary; expected failure modes come back as tagged values
/// so callers can tell a dead network from a vendor rejection from a
/// firmware limitation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Failure {
    /// Controller unreachable, or the request timed out.
    #[error("network failure calling {endpoint}: {reason}")]
    Network { endpoint: String, reason: String },

    /// The controller answered but refused: non-2xx HTTP status, or a
    /// response envelope with `code != 0`. Carries the vendor message.
    #[error("controller rejected {endpoint} (code {code}): {message}")]
    Rejected {
        endpoint: String,
        code: i64,
        message: String,
    },

    /// A documented-but-unreliable operation answered 404: this firmware
    /// revision does not implement it. Distinct from a plain rejection so
    /// the operator is not told to retry something that cannot work.
    #[error("{endpoint} is not supported by this controller firmware")]
    Unsupported { endpoint: String },

    /// Malformed envelope or response body. Surfaced to the calling action
    /// only; never corrupts reconciler state.
    #[error("unexpected response from {endpoint}: {detail}")]
    Protocol { endpoint: String, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Rejected,
    Unsupported,
    Protocol,
}

impl Failure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::Network { .. } => FailureKind::Network,
            Failure::Rejected { .. } => FailureKind::Rejected,
            Failure::Unsupported { .. } => FailureKind::Unsupported,
            Failure::Protocol { .. } => FailureKind::Protocol,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Failure::Network { endpoint, .. }
            | Failure::Rejected { endpoint, .. }
            | Failure::Unsupported { endpoint }
            | Failure::Protocol { endpoint, .. } => endpoint,
        }
    }
}
