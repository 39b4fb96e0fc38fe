use thiserror::Error;

/// Reasons an inbound datagram is rejected by the codec.
///
/// None of these are fatal: the router logs the error and drops the datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("packet too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("bad magic bytes {0:02x?}")]
    BadMagic([u8; 2]),

    #[error("missing 0xFF payload marker")]
    MissingMarker,

    #[error("checksum mismatch: header {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("unknown packet type {0:#04x}")]
    UnknownType(u8),
}
