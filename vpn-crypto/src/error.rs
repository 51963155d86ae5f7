use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("encryption failed")]
    EncryptFailed,
    #[error("decryption failed")]
    DecryptFailed,
    #[error("malformed record: {0}")]
    MalformedRecord(&'static str),
    #[error("replay detected: sequence {0} already seen or too old")]
    ReplayDetected(u64),
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("invalid key material")]
    InvalidKey,
}
