//! Crate error types.
//!
//! The teacher declares `thiserror` but hand-rolls `Display` and
//! `std::error::Error` on its `AgentError`/`ProtocolError` instead of using
//! it. These types put the dependency to work.

use thiserror::Error;

/// Errors from wire framing (C1). Matches §7: short/malformed datagrams and
/// unknown packet types are dropped by the caller, not propagated further
/// up, so these variants stay local to `codec`/`transport`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unknown packet type byte 0x{0:02x}")]
    UnknownType(u8),

    #[error("string field exceeds its {0}-byte capacity")]
    FieldTooLong(usize),
}

/// Errors from the reliable datagram layer (C2).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("ack not received after {retries} attempts")]
    AckFailed { retries: u8 },

    #[error("handshake not acknowledged after {retries} attempts")]
    HandshakeFailed { retries: u8 },
}

/// Top-level station errors: startup/bind failures are fatal (§7).
#[derive(Debug, Error)]
pub enum StationError {
    #[error("failed to bind command socket on port {port}: {source}")]
    CommandBind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind telemetry listener on port {port}: {source}")]
    TelemetryBind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind observation API on port {port}: {source}")]
    ApiBind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
