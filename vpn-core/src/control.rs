//! Control-message serializer (spec §4.C).
//!
//! Typed constructors encode a payload map (always carrying a `version`
//! field) and return the control-framed bytes ready to write to the
//! stream. Decoders recover the named fields from an already-extracted
//! [`crate::wire::ControlMessage`]; missing/extra fields are tolerated
//! except the ones required for that message's meaning.

use serde::{Deserialize, Serialize};

use crate::constants::PROTOCOL_VERSION;
use crate::error::{Error, Result};
use crate::wire::{frame_control_message, ControlMessage, MessageType};

fn encode(message_type: MessageType, payload: &impl Serialize) -> Result<Vec<u8>> {
    let mut value = serde_json::to_value(payload).map_err(|e| Error::protocol(e.to_string()))?;
    if let serde_json::Value::Object(map) = &mut value {
        map.insert(
            "version".to_string(),
            serde_json::Value::String(PROTOCOL_VERSION.to_string()),
        );
    }
    let bytes = rmp_serde::to_vec_named(&value).map_err(|e| Error::protocol(e.to_string()))?;
    frame_control_message(message_type, &bytes)
}

fn decode<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> Result<T> {
    rmp_serde::from_slice(payload).map_err(|e| Error::protocol(e.to_string()))
}

/// Checks that the message's `version` field is present and matches ours;
/// per invariant 5, a mismatched or missing version is rejected by the
/// peer rather than silently accepted.
pub fn check_version(payload: &[u8]) -> Result<()> {
    let value: serde_json::Value = decode(payload)?;
    let version = value
        .get("version")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::protocol("missing version field"))?;
    if version != PROTOCOL_VERSION {
        return Err(Error::protocol(format!(
            "protocol version mismatch: peer={version} ours={PROTOCOL_VERSION}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
    pub client_version: String,
}

pub fn encode_auth_request(username: &str, password: &str, client_version: &str) -> Result<Vec<u8>> {
    encode(
        MessageType::AuthRequest,
        &AuthRequest {
            username: username.to_string(),
            password: password.to_string(),
            client_version: client_version.to_string(),
        },
    )
}

pub fn decode_auth_request(msg: &ControlMessage) -> Result<AuthRequest> {
    decode(&msg.payload)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSuccess {
    pub session_token: String,
    pub assigned_ip: String,
    /// Server-generated AEAD master key, hex-encoded. Carried inside the
    /// TLS-protected reply per the corrected design (spec §9 Q1) rather
    /// than independently re-derived by each side.
    pub master_key_hex: String,
}

pub fn encode_auth_success(session_token: &str, assigned_ip: &str, master_key_hex: &str) -> Result<Vec<u8>> {
    encode(
        MessageType::AuthSuccess,
        &AuthSuccess {
            session_token: session_token.to_string(),
            assigned_ip: assigned_ip.to_string(),
            master_key_hex: master_key_hex.to_string(),
        },
    )
}

pub fn decode_auth_success(msg: &ControlMessage) -> Result<AuthSuccess> {
    decode(&msg.payload)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthFailure {
    pub error_code: u8,
    pub error_message: String,
}

pub fn encode_auth_failure(error_code: u8, error_message: &str) -> Result<Vec<u8>> {
    encode(
        MessageType::AuthFailure,
        &AuthFailure {
            error_code,
            error_message: error_message.to_string(),
        },
    )
}

pub fn decode_auth_failure(msg: &ControlMessage) -> Result<AuthFailure> {
    decode(&msg.payload)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ping {
    pub timestamp: f64,
}

pub fn encode_ping(timestamp: f64) -> Result<Vec<u8>> {
    encode(MessageType::Ping, &Ping { timestamp })
}

pub fn decode_ping(msg: &ControlMessage) -> Result<Ping> {
    decode(&msg.payload)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pong {
    pub ping_timestamp: f64,
    pub pong_timestamp: f64,
}

pub fn encode_pong(ping_timestamp: f64, pong_timestamp: f64) -> Result<Vec<u8>> {
    encode(
        MessageType::Pong,
        &Pong {
            ping_timestamp,
            pong_timestamp,
        },
    )
}

pub fn decode_pong(msg: &ControlMessage) -> Result<Pong> {
    decode(&msg.payload)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disconnect {
    pub reason: String,
}

pub fn encode_disconnect(reason: &str) -> Result<Vec<u8>> {
    encode(
        MessageType::Disconnect,
        &Disconnect {
            reason: reason.to_string(),
        },
    )
}

pub fn decode_disconnect(msg: &ControlMessage) -> Result<Disconnect> {
    decode(&msg.payload)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error_code: u8,
    pub error_message: String,
}

pub fn encode_error(error_code: u8, error_message: &str) -> Result<Vec<u8>> {
    encode(
        MessageType::Error,
        &ErrorMessage {
            error_code,
            error_message: error_message.to_string(),
        },
    )
}

pub fn decode_error(msg: &ControlMessage) -> Result<ErrorMessage> {
    decode(&msg.payload)
}
