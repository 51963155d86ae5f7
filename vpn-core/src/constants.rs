//! Fixed protocol constants (spec §3).

/// 4-byte magic prefix for control-message framing.
pub const MAGIC: [u8; 4] = [0x49, 0x52, 0x56, 0x50];

/// Protocol version string carried in every control-message payload.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// AEAD key size in bytes.
pub const KEY_SIZE: usize = 32;
/// AEAD nonce size in bytes.
pub const NONCE_SIZE: usize = 12;
/// AEAD authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;
/// Tunnel MTU in bytes.
pub const MTU: usize = 1500;
/// Replay guard sliding-window size, in sequence numbers.
pub const REPLAY_WINDOW: u64 = 64;

/// HKDF salt used to derive the session key from the master key.
pub const KDF_SALT: &[u8] = b"IranVPN-v1.0";
/// HKDF info used to derive the session key from the master key.
pub const KDF_INFO: &[u8] = b"session_key";

/// Keepalive ping interval.
pub const KEEPALIVE_INTERVAL_SECS: u64 = 15;
/// Keepalive pong deadline after a ping with no reply.
pub const KEEPALIVE_TIMEOUT_SECS: u64 = 30;
/// Hard deadline for establishing the TLS connection.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Deadline for receiving the auth reply after sending the auth request.
pub const AUTH_TIMEOUT_SECS: u64 = 10;
/// Session idle timeout: no frame for this long closes the session.
pub const SESSION_IDLE_TIMEOUT_SECS: u64 = 300;
/// Session time-to-live from creation.
pub const SESSION_TTL_HOURS: u64 = 24;
/// How often the background eviction sweep runs.
pub const EVICTION_INTERVAL_SECS: u64 = 60;
/// How often the background stats-logging task runs.
pub const STATS_LOG_INTERVAL_SECS: u64 = 300;

/// Initial reconnect backoff delay.
pub const RECONNECT_INITIAL_DELAY_SECS: u64 = 1;
/// Maximum reconnect backoff delay.
pub const RECONNECT_MAX_DELAY_SECS: u64 = 30;
/// Reconnect backoff multiplier.
pub const RECONNECT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Virtual-address pool network (10.8.0.0/24); .0, .1 and .255 are reserved.
pub const VIRTUAL_NET_OCTETS: [u8; 3] = [10, 8, 0];
/// First assignable host octet in the virtual-address pool.
pub const VIRTUAL_NET_FIRST_HOST: u8 = 2;
/// Last assignable host octet in the virtual-address pool.
pub const VIRTUAL_NET_LAST_HOST: u8 = 254;

/// Default per-user concurrent session limit.
pub const DEFAULT_MAX_SESSIONS: u32 = 3;

/// Maximum size of a framed control or data message on the wire.
pub const MAX_FRAME_SIZE: usize = 65535;
