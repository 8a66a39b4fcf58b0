//! MimbleWimble peer-wire protocol primitives.
//!
//! Every message travels as an 11-byte envelope followed by a body:
//!
//! ```text
//! [0x1E][0xC5][msg_type: u8][body_len: u64 BE] body...
//! ```
//!
//! This module implements:
//! - the envelope codec and frame reading/writing ([`codec`])
//! - field-level encoders ([`payload`]) and decoders ([`decode`])
//! - the message catalog ([`message`])
//!
//! All integers are big-endian.
pub mod codec;

pub mod decode;
pub mod message;
pub mod payload;

pub mod constants;
pub mod error;
pub mod network;

pub use codec::{read_message, send_message};
pub use error::{WireError, WireResult};
pub use message::{
    Block, BlockHeader, BlockHeaders, Capabilities, Decode, Encode, Envelope, GetBlock,
    GetHeaders, GetPeerAddrs, Hand, Hash, Locator, Message, MsgType, PeerAddrs, Ping, Pong, Shake,
};
pub use network::NetworkParams;
