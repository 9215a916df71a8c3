#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("datagram poll timed out")]
    TransientIO,

    #[error("segment shorter than the 16-byte header")]
    MalformedSegment,

    #[error("peer unresponsive after {0} consecutive ACK timeouts")]
    PeerUnresponsive(u32),

    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),

    #[error("datagram port is closed")]
    PortClosed,

    #[error("datagram I/O error: {0}")]
    Io(#[from] std::io::Error),
}
