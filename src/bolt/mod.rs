//! # Bolt wire layer
//!
//! Everything needed to put Bolt messages on a byte stream and take them off
//! again. Nothing here knows about pending requests or cursors; that lives in
//! [`crate::driver`].
//!
//! - [`packstream`] - binary value serialization
//! - [`message`] - request and response messages
//! - [`codec`] - chunked framing for tokio_util
//! - [`handshake`] - version negotiation
//! - [`error`] - wire-level error types

pub mod codec;
pub mod error;
pub mod handshake;
pub mod message;
pub mod packstream;

pub use codec::{BoltRequestCodec, BoltResponseCodec, ChunkCodec};
pub use error::{BoltError, BoltErrorCode, BoltResult, HandshakeError};
pub use handshake::{BoltVersion, VersionProposal, BOLT_MAGIC, HANDSHAKE_RESPONSE_SIZE};
pub use message::{
    AccessMode, BeginMessage, BoltRequest, BoltResponse, DiscardMessage, FailureMessage,
    Notification, NotificationSeverity, PullMessage, QueryStats, QueryType, RecordMessage,
    RunMessage, SuccessMessage, TransactionMetadata,
};
pub use packstream::{PackStreamError, PackStreamStructure, PackStreamValue};
