//! Protocol core for the tunnel: wire framing, control-message codecs,
//! configuration, shared plugin traits and the closed error taxonomy used
//! by every other crate in the workspace.
//!
//! Design goals:
//! - No I/O here. This crate only encodes/decodes bytes and defines the
//!   seams (`plugins`) that concrete engines plug collaborators into.
//! - One error enum, one code space, shared by client and server so a
//!   wire-level `Error` message means the same thing on both ends.

pub mod config;
pub mod constants;
pub mod control;
pub mod error;
pub mod packet;
pub mod plugins;
pub mod wire;

pub use error::{Error, ErrorCode, Result};
