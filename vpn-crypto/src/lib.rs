//! AEAD record layer and key derivation for the tunnel protocol.
//!
//! - `aead`: ChaCha20-Poly1305 record cipher with a zeroizing key and a
//!   cached cipher instance.
//! - `kdf`: HKDF-SHA256 session-key derivation plus an Argon2
//!   password-hashing utility for the user directory.
//! - `replay`: fixed-size sliding-window replay guard.
//! - `session`: a bidirectional [`session::AeadSession`] tying the above
//!   together with running statistics.
#![forbid(unsafe_code)]

pub mod aead;
pub mod error;
pub mod kdf;
pub mod replay;
pub mod session;

pub use error::{Error, Result};
