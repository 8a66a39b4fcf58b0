//! Synchronous client for the MimbleWimble peer-wire protocol.
//!
//! [`wire`] holds the binary codec, [`handshake`] the Hand/Shake
//! negotiation and [`session`] the dispatch loop run over a connected
//! stream once the handshake succeeded.
pub mod handshake;
pub mod session;
pub mod wire;

#[cfg(test)]
mod testing;
