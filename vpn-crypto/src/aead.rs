//! AEAD record layer (spec §4.B, §6).
//!
//! A record on the wire is `counter_be64[8] | ciphertext[len-24] | tag[16]`
//! — an 8-byte header and 24 bytes of total overhead, per §6's fixed data
//! record framing. The nonce fed to ChaCha20-Poly1305 is the counter
//! followed by four zero bytes (`counter || 0u32`): the wire carries no
//! timestamp, so `seal` and `open` always agree on the same nonce for the
//! same counter (spec §9 Q2 — the original's decrypt path built the nonce
//! from an all-zero timestamp while encrypt used a live one, which would
//! make every record fail authentication; resolved here by dropping the
//! timestamp from the nonce entirely rather than widening the frame to
//! carry one).

use std::sync::OnceLock;

use chacha20poly1305::aead::{Aead, NewAead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use zeroize::Zeroize;

use vpn_core::constants::{KEY_SIZE, NONCE_SIZE};

use crate::error::{Error, Result};

const COUNTER_LEN: usize = 8;
const HEADER_LEN: usize = COUNTER_LEN;

/// AEAD session key. Zeroized on drop so a session's key material doesn't
/// linger in memory after the session closes.
pub struct AeadKey([u8; KEY_SIZE]);

impl AeadKey {
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl Drop for AeadKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Reads the counter out of a wire record's header without touching the
/// ciphertext, so a caller can run the replay check (spec §4.B) before
/// spending a MAC verification on a record that's a known duplicate.
pub fn peek_counter(record: &[u8]) -> Result<u64> {
    if record.len() < HEADER_LEN {
        return Err(Error::MalformedRecord("record shorter than header"));
    }
    Ok(u64::from_be_bytes(record[..COUNTER_LEN].try_into().expect("8 bytes")))
}

fn build_nonce(counter: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[..COUNTER_LEN].copy_from_slice(&counter.to_be_bytes());
    nonce
}

/// One direction's AEAD record cipher. The cipher instance is built once
/// and cached, since key setup dominates the cost of a single small seal.
pub struct RecordCipher {
    key: AeadKey,
    cipher: OnceLock<ChaCha20Poly1305>,
}

impl RecordCipher {
    pub fn new(key: AeadKey) -> Self {
        Self {
            key,
            cipher: OnceLock::new(),
        }
    }

    fn cipher(&self) -> &ChaCha20Poly1305 {
        self.cipher
            .get_or_init(|| ChaCha20Poly1305::new(Key::from_slice(&self.key.0)))
    }

    /// Encrypts `plaintext` under the record counter and returns the full
    /// wire record: `counter_be64 | ciphertext | tag` (§6).
    pub fn seal(&self, counter: u64, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let nonce = build_nonce(counter);
        let ciphertext = self
            .cipher()
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| Error::EncryptFailed)?;

        let mut record = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        record.extend_from_slice(&counter.to_be_bytes());
        record.extend_from_slice(&ciphertext);
        Ok(record)
    }

    /// Splits a wire record into its counter and decrypted plaintext. A
    /// record with an empty ciphertext (exactly `HEADER_LEN + TAG_LEN`
    /// bytes) decrypts to empty plaintext and still advances counters (§8).
    pub fn open(&self, record: &[u8], aad: &[u8]) -> Result<(u64, Vec<u8>)> {
        if record.len() < HEADER_LEN {
            return Err(Error::MalformedRecord("record shorter than header"));
        }
        let counter = u64::from_be_bytes(record[..COUNTER_LEN].try_into().expect("8 bytes"));
        let nonce = build_nonce(counter);
        let ciphertext = &record[HEADER_LEN..];

        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(&nonce), Payload { msg: ciphertext, aad })
            .map_err(|_| Error::DecryptFailed)?;
        Ok((counter, plaintext))
    }
}
