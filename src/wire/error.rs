//! Error types for the wire protocol.

use std::io;
use thiserror::Error;

use crate::wire::message::{Hash, MsgType};

/// Everything that can go wrong while framing, encoding, decoding or
/// negotiating a connection.
///
/// The core never retries: every error reaches the caller, which decides
/// whether to drop the peer or reconnect.
#[derive(Error, Debug)]
pub enum WireError {
    /// Envelope could not be read in full, or carries the wrong magic bytes.
    #[error("framing error: {0}")]
    Framing(String),

    /// A body ended before the field being read was complete.
    #[error("truncated input while reading {0}")]
    Truncated(&'static str),

    /// A length or count is inconsistent with what the protocol allows.
    #[error("malformed field {field}: {reason}")]
    MalformedField { field: &'static str, reason: String },

    /// Socket address with a family tag other than IPv4.
    #[error("unsupported address family tag {0}")]
    UnsupportedAddressFamily(u8),

    /// The handshake received something other than the expected message.
    #[error("unexpected message: expected {expected:?}, got {actual:?}")]
    UnexpectedMessage { expected: MsgType, actual: MsgType },

    /// The peer's `Shake` (or `Hand`, on the responding side) failed to decode.
    #[error("malformed shake: {0}")]
    MalformedShake(#[source] Box<WireError>),

    /// The peer lives on another chain.
    #[error("genesis mismatch: ours {ours}, theirs {theirs}")]
    GenesisMismatch { ours: Hash, theirs: Hash },

    /// An operation was attempted in a state that does not allow it.
    #[error("out of order: {0}")]
    OutOfOrder(&'static str),

    /// Part of the protocol this crate does not implement.
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),

    /// The underlying stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

impl WireError {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        WireError::MalformedField {
            field,
            reason: reason.into(),
        }
    }

    /// Returns true for both envelope-level and body-level framing failures.
    pub fn is_framing(&self) -> bool {
        matches!(self, WireError::Framing(_) | WireError::Truncated(_))
    }

    /// Returns true if the connection can keep going after this error.
    ///
    /// Only an unsupported address family qualifies: the offending body has
    /// already been consumed, so the stream is still aligned on the next
    /// envelope and the caller may simply skip the peer list.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WireError::UnsupportedAddressFamily(_))
    }
}

/// A specialized `Result` type for wire operations.
pub type WireResult<T> = std::result::Result<T, WireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_counts_as_framing() {
        assert!(WireError::Truncated("hand: nonce").is_framing());
        assert!(WireError::Framing("short envelope".into()).is_framing());
        assert!(!WireError::Unimplemented("kernels").is_framing());
    }

    #[test]
    fn only_address_family_is_recoverable() {
        assert!(WireError::UnsupportedAddressFamily(1).is_recoverable());
        assert!(!WireError::Truncated("ping: height").is_recoverable());
        assert!(!WireError::Transport(io::Error::other("reset")).is_recoverable());
    }

    #[test]
    fn malformed_shake_keeps_its_source() {
        let err = WireError::MalformedShake(Box::new(WireError::Truncated("shake: genesis")));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("truncated input while reading shake: genesis"));
    }
}
