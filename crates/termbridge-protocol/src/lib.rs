//! Wire protocol for Termbridge.
//!
//! This crate defines the envelope convention the proxy and its peers
//! speak over a transport:
//!
//! - **Frames** ([`ControlFrame`], [`Frame`], [`parse_frame`]) — the JSON
//!   `{"type": ...}` envelope, and the lenient classifier that sorts
//!   inbound text into control and application frames.
//! - **Errors** ([`ProtocolError`]) — every way a frame can fail to
//!   classify, all recoverable.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw text frames) and session
//! (connection state). It doesn't know about sockets or sessions. It only
//! knows how to read and write envelopes.
//!
//! ```text
//! Transport (text) → Protocol (Frame) → Session (state machine)
//! ```

mod error;
mod frame;

pub use error::ProtocolError;
pub use frame::{parse_frame, ControlFrame, Frame};
