//! Bolt wire-layer error types.

use std::fmt;
use std::io;

use super::packstream::PackStreamError;

/// Result type for Bolt wire operations.
pub type BoltResult<T> = Result<T, BoltError>;

/// Errors raised while framing, encoding or negotiating on the wire.
#[derive(Debug)]
pub enum BoltError {
    /// I/O error
    Io(io::Error),

    /// Handshake error
    Handshake(HandshakeError),

    /// PackStream serialization error
    PackStream(PackStreamError),

    /// Malformed or unexpected message
    Protocol(String),

    /// Negotiated version this engine has no protocol entry for
    UnsupportedVersion(u32),

    /// Message larger than the configured limit
    MessageTooLarge {
        /// Size of the offending message
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Peer closed the stream
    ConnectionClosed,
}

impl fmt::Display for BoltError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoltError::Io(e) => write!(f, "I/O error: {}", e),
            BoltError::Handshake(e) => write!(f, "Handshake error: {}", e),
            BoltError::PackStream(e) => write!(f, "PackStream error: {}", e),
            BoltError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            BoltError::UnsupportedVersion(v) => write!(f, "Unsupported version: 0x{:08X}", v),
            BoltError::MessageTooLarge { size, max } => {
                write!(f, "Message too large: {} bytes (max: {})", size, max)
            }
            BoltError::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for BoltError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BoltError::Io(e) => Some(e),
            BoltError::Handshake(e) => Some(e),
            BoltError::PackStream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BoltError {
    fn from(err: io::Error) -> Self {
        BoltError::Io(err)
    }
}

impl From<HandshakeError> for BoltError {
    fn from(err: HandshakeError) -> Self {
        BoltError::Handshake(err)
    }
}

impl From<PackStreamError> for BoltError {
    fn from(err: PackStreamError) -> Self {
        BoltError::PackStream(err)
    }
}

/// Handshake-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Server answered with all zeroes: none of the proposals is acceptable
    NoCompatibleVersion,

    /// Too many or malformed proposals
    InvalidData(String),

    /// Stream closed before the 4-byte answer arrived
    ConnectionClosed,
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::NoCompatibleVersion => {
                write!(f, "No compatible protocol version found")
            }
            HandshakeError::InvalidData(msg) => {
                write!(f, "Invalid handshake data: {}", msg)
            }
            HandshakeError::ConnectionClosed => {
                write!(f, "Connection closed during handshake")
            }
        }
    }
}

impl std::error::Error for HandshakeError {}

/// Server status codes the engine inspects.
///
/// Codes have the shape `Neo.<Classification>.<Category>.<Title>`.
pub struct BoltErrorCode;

impl BoltErrorCode {
    /// Classification prefix for errors caused by the request.
    pub const CLIENT_ERROR_PREFIX: &'static str = "Neo.ClientError.";
    /// Classification prefix for errors a retry may clear.
    pub const TRANSIENT_ERROR_PREFIX: &'static str = "Neo.TransientError.";
    /// Category prefix for messages the server could not accept at all.
    pub const REQUEST_ERROR_PREFIX: &'static str = "Neo.ClientError.Request.";

    /// Malformed query text.
    pub const SYNTAX_ERROR: &'static str = "Neo.ClientError.Statement.SyntaxError";
    /// Bookmark the server cannot parse or does not know.
    pub const INVALID_BOOKMARK: &'static str = "Neo.ClientError.Transaction.InvalidBookmark";
    /// Catch-all database failure.
    pub const GENERAL_ERROR: &'static str = "Neo.DatabaseError.General.UnknownError";
    /// Lock cycle broken by the server.
    pub const DEADLOCK_DETECTED: &'static str = "Neo.TransientError.Transaction.DeadlockDetected";
    /// Message that is well framed but not valid for the server's state.
    pub const REQUEST_INVALID: &'static str = "Neo.ClientError.Request.Invalid";
    /// Message the server could not decode.
    pub const REQUEST_INVALID_FORMAT: &'static str = "Neo.ClientError.Request.InvalidFormat";

    /// Whether a server code is transient (a retry may succeed).
    ///
    /// Termination by the client itself is reported with a transient code
    /// but must not be retried.
    pub fn is_transient(code: &str) -> bool {
        code.starts_with(Self::TRANSIENT_ERROR_PREFIX)
            && !code.ends_with(".Terminated")
            && !code.ends_with(".LockClientStopped")
    }

    /// Whether a server code means the connection can no longer be trusted.
    ///
    /// The server only reports request-level errors when its view of the
    /// message stream no longer matches the client's.
    pub fn is_fatal(code: &str) -> bool {
        code.starts_with(Self::REQUEST_ERROR_PREFIX)
    }

    /// Whether a server code blames the request rather than the server.
    pub fn is_client_error(code: &str) -> bool {
        code.starts_with(Self::CLIENT_ERROR_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_error_display() {
        let err = HandshakeError::NoCompatibleVersion;
        assert!(err.to_string().contains("No compatible"));

        let err = HandshakeError::InvalidData("5 proposals".into());
        assert!(err.to_string().contains("5 proposals"));
    }

    #[test]
    fn test_bolt_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let bolt_err: BoltError = io_err.into();
        assert!(matches!(bolt_err, BoltError::Io(_)));
        assert!(std::error::Error::source(&bolt_err).is_some());
    }

    #[test]
    fn test_unsupported_version_display() {
        let err = BoltError::UnsupportedVersion(0x0000_0205);
        assert_eq!(err.to_string(), "Unsupported version: 0x00000205");
    }

    #[test]
    fn test_code_classification() {
        assert!(BoltErrorCode::is_transient(BoltErrorCode::DEADLOCK_DETECTED));
        assert!(!BoltErrorCode::is_transient("Neo.TransientError.Transaction.Terminated"));
        assert!(!BoltErrorCode::is_transient(BoltErrorCode::SYNTAX_ERROR));
        assert!(BoltErrorCode::is_client_error(BoltErrorCode::INVALID_BOOKMARK));
        assert!(!BoltErrorCode::is_client_error(BoltErrorCode::GENERAL_ERROR));
        assert!(BoltErrorCode::is_fatal(BoltErrorCode::REQUEST_INVALID));
        assert!(BoltErrorCode::is_fatal(BoltErrorCode::REQUEST_INVALID_FORMAT));
        assert!(!BoltErrorCode::is_fatal(BoltErrorCode::SYNTAX_ERROR));
    }
}
