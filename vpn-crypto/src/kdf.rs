//! Key derivation (spec §4.B).
//!
//! The session key is always HKDF-SHA256 derived from the server-generated
//! master key; the password-derived variant below exists only as a utility
//! for operators who want a deterministic recovery key and is never used to
//! derive the live session key (spec §9 Q1: the master key is generated by
//! the server and transmitted to the client inside the TLS-protected
//! `AuthSuccess` message, not independently re-derived by each side from
//! the token or password — re-derivation would let a passive observer of
//! the auth exchange recompute the key from public inputs alone).

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use vpn_core::constants::{KDF_INFO, KDF_SALT, KEY_SIZE};

use crate::error::{Error, Result};

/// Derives the 32-byte session key from the master key exactly as the
/// server and client both do after the master key is established.
pub fn derive_session_key(master_key: &[u8; 32]) -> Result<[u8; KEY_SIZE]> {
    let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), master_key);
    let mut out = [0u8; KEY_SIZE];
    hk.expand(KDF_INFO, &mut out)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    Ok(out)
}

/// Generates a fresh random master key for a new session (the server's
/// half of spec §9 Q1: the server, not the client, is the source of the
/// master key).
pub fn generate_master_key() -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

pub fn master_key_to_hex(key: &[u8; KEY_SIZE]) -> String {
    hex::encode(key)
}

pub fn master_key_from_hex(s: &str) -> Result<[u8; KEY_SIZE]> {
    let bytes = hex::decode(s).map_err(|_| Error::InvalidKey)?;
    bytes.try_into().map_err(|_| Error::InvalidKey)
}

/// Derives a master key directly from a password and a caller-supplied
/// salt, for offline/pre-shared deployments that have no server to
/// generate and transmit a master key. Never used by the live
/// `AuthSuccess` path (see module docs).
pub fn derive_key_from_password(password: &str, salt: &[u8]) -> Result<[u8; KEY_SIZE]> {
    let hk = Hkdf::<Sha256>::new(Some(salt), password.as_bytes());
    let mut out = [0u8; KEY_SIZE];
    hk.expand(KDF_INFO, &mut out)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    Ok(out)
}

/// Hashes a password for storage in a [`vpn_core::plugins::UserRecord`].
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::KeyDerivation(e.to_string()))
}

/// Verifies a plaintext password against a stored Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::KeyDerivation(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}



