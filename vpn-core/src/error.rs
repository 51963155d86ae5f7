use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Closed error taxonomy for the tunnel protocol, grouped by decade as in
/// spec §3/§7: general (0x00-0x0F), auth (0x10-0x1F), session (0x20-0x2F),
/// tunnel (0x30-0x3F), crypto (0x40-0x4F), network (0x50-0x5F),
/// server (0x60-0x6F). Each variant carries the fixed wire code used in
/// `AuthFailure`/`Error` control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidMessage = 0x01,
    ProtocolVersionMismatch = 0x02,
    UnknownMessageType = 0x03,

    InvalidCredentials = 0x11,
    InvalidToken = 0x12,
    TokenExpired = 0x13,
    TooManySessions = 0x14,
    UserDisabled = 0x15,

    SessionNotFound = 0x21,
    SessionExpired = 0x22,
    SessionLimitReached = 0x23,

    InterfaceSetup = 0x31,
    IpAllocation = 0x32,
    Routing = 0x33,

    EncryptFailed = 0x41,
    DecryptFailed = 0x42,
    KeyExchangeFailed = 0x43,
    ReplayDetected = 0x44,

    ConnectionLost = 0x51,
    Timeout = 0x52,

    Overloaded = 0x61,
    Maintenance = 0x62,
}

impl ErrorCode {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        use ErrorCode::*;
        Some(match code {
            0x01 => InvalidMessage,
            0x02 => ProtocolVersionMismatch,
            0x03 => UnknownMessageType,
            0x11 => InvalidCredentials,
            0x12 => InvalidToken,
            0x13 => TokenExpired,
            0x14 => TooManySessions,
            0x15 => UserDisabled,
            0x21 => SessionNotFound,
            0x22 => SessionExpired,
            0x23 => SessionLimitReached,
            0x31 => InterfaceSetup,
            0x32 => IpAllocation,
            0x33 => Routing,
            0x41 => EncryptFailed,
            0x42 => DecryptFailed,
            0x43 => KeyExchangeFailed,
            0x44 => ReplayDetected,
            0x51 => ConnectionLost,
            0x52 => Timeout,
            0x61 => Overloaded,
            0x62 => Maintenance,
            _ => return None,
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Map this error onto the wire-level error code carried in
    /// `AuthFailure`/`Error` control messages.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidMessage(_) => ErrorCode::InvalidMessage,
            Error::UnknownMessageType(_) => ErrorCode::UnknownMessageType,
            Error::Protocol(_) => ErrorCode::ProtocolVersionMismatch,
            Error::Io(_) => ErrorCode::ConnectionLost,
        }
    }
}
