//! Hand/Shake negotiation.
//!
//! The initiator sends one `Hand` and waits for one `Shake`; nothing else
//! is meaningful on a connection until that exchange succeeded.
//!
//! ```text
//! Init --send_hand--> HandSent --receive_shake--> ShakeReceived
//!                         |
//!                         +--> Failed(kind)
//! ```
//!
//! Both terminal states are final. No timeout is applied here: callers
//! bound the exchange through the stream itself (socket timeouts).

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddrV4};

use log::{info, warn};

use crate::wire::codec::{read_body, read_envelope, write_frame};
use crate::wire::constants::{DEFAULT_PORT, USER_AGENT};
use crate::wire::{
    Capabilities, Decode, Encode, Hand, Hash, MsgType, NetworkParams, Shake, WireError,
    WireResult,
};

/// What we advertise to a peer during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    pub capabilities: Capabilities,
    /// Sent in `Hand`; lets a node detect a connection to itself.
    pub nonce: u64,
    pub total_difficulty: u64,
    pub sender_addr: SocketAddrV4,
    pub receiver_addr: SocketAddrV4,
    pub user_agent: String,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        let unspecified = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT);

        Self {
            capabilities: Capabilities::UNKNOWN,
            nonce: 1,
            total_difficulty: 1,
            sender_addr: unspecified,
            receiver_addr: unspecified,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl HandshakeConfig {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// The `Hand` this configuration produces on `params`.
    pub fn hand(&self, params: &NetworkParams) -> Hand {
        Hand {
            version: params.protocol_version,
            capabilities: self.capabilities,
            nonce: self.nonce,
            total_difficulty: self.total_difficulty,
            sender_addr: self.sender_addr,
            receiver_addr: self.receiver_addr,
            user_agent: self.user_agent.clone(),
            genesis: params.genesis,
        }
    }

    /// The `Shake` sent back when answering someone else's `Hand`.
    pub fn shake(&self, params: &NetworkParams) -> Shake {
        Shake {
            version: params.protocol_version,
            capabilities: self.capabilities,
            total_difficulty: self.total_difficulty,
            user_agent: self.user_agent.clone(),
            genesis: params.genesis,
        }
    }
}

/// Why a handshake ended in [`HandshakeState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeFailure {
    /// The peer answered with something other than the expected message.
    UnexpectedMessage(MsgType),
    /// The reply's length or content is not a valid `Shake`.
    MalformedShake,
    GenesisMismatch,
    /// Envelope or body could not be framed.
    Framing,
    Transport,
    /// A step was called in a state that does not allow it.
    OutOfOrder,
}

impl From<&WireError> for HandshakeFailure {
    fn from(err: &WireError) -> Self {
        match err {
            WireError::UnexpectedMessage { actual, .. } => {
                HandshakeFailure::UnexpectedMessage(*actual)
            }
            WireError::MalformedShake(_)
            | WireError::MalformedField { .. }
            | WireError::UnsupportedAddressFamily(_)
            | WireError::Unimplemented(_) => HandshakeFailure::MalformedShake,
            WireError::GenesisMismatch { .. } => HandshakeFailure::GenesisMismatch,
            WireError::Framing(_) | WireError::Truncated(_) => HandshakeFailure::Framing,
            WireError::Transport(_) => HandshakeFailure::Transport,
            WireError::OutOfOrder(_) => HandshakeFailure::OutOfOrder,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    HandSent,
    /// Success: the peer's `Shake` as received.
    ShakeReceived(Shake),
    Failed(HandshakeFailure),
}

/// Initiator side of the negotiation, driven one step at a time.
#[derive(Debug)]
pub struct Handshake {
    params: NetworkParams,
    config: HandshakeConfig,
    state: HandshakeState,
}

impl Handshake {
    pub fn new(params: NetworkParams, config: HandshakeConfig) -> Self {
        Self {
            params,
            config,
            state: HandshakeState::Init,
        }
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// `Init -> HandSent`.
    ///
    /// The whole frame goes out in one write; a failed write is a transport
    /// failure and ends the handshake.
    pub fn send_hand<W: Write>(&mut self, writer: &mut W) -> WireResult<()> {
        if self.state != HandshakeState::Init {
            return Err(WireError::OutOfOrder("hand can only be sent once, first"));
        }

        let hand = self.config.hand(&self.params);

        let result = hand
            .to_bytes()
            .and_then(|body| write_frame(writer, &self.params, MsgType::Hand, &body));

        match result {
            Ok(()) => {
                info!(
                    "handshake: hand sent (version {}, user agent {:?})",
                    hand.version, hand.user_agent
                );
                self.state = HandshakeState::HandSent;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// `HandSent -> ShakeReceived | Failed`.
    ///
    /// Reads exactly one envelope. Anything but a `Shake` fails the
    /// handshake, as does a body that does not decode or a peer on another
    /// chain.
    pub fn receive_shake<R: Read>(&mut self, reader: &mut R) -> WireResult<Shake> {
        if self.state != HandshakeState::HandSent {
            return Err(WireError::OutOfOrder("shake expected only after hand"));
        }

        match self.read_shake(reader) {
            Ok(shake) => {
                info!(
                    "handshake: shake received (version {}, user agent {:?}, difficulty {})",
                    shake.version, shake.user_agent, shake.total_difficulty
                );
                self.state = HandshakeState::ShakeReceived(shake.clone());
                Ok(shake)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Sends `Hand` and waits for `Shake` on the same stream.
    pub fn run<S: Read + Write>(&mut self, stream: &mut S) -> WireResult<Shake> {
        self.send_hand(stream)?;
        self.receive_shake(stream)
    }

    /// Responder side: waits for a `Hand`, checks its genesis and answers
    /// with a `Shake` built from `config`.
    ///
    /// Returns the peer's `Hand`.
    pub fn respond<S: Read + Write>(
        stream: &mut S,
        params: &NetworkParams,
        config: &HandshakeConfig,
    ) -> WireResult<Hand> {
        let envelope = read_envelope(stream, params)?;
        if envelope.msg_type != MsgType::Hand {
            return Err(WireError::UnexpectedMessage {
                expected: MsgType::Hand,
                actual: envelope.msg_type,
            });
        }

        let body = read_body(stream, envelope.body_len)?;
        let hand =
            Hand::from_bytes(&body).map_err(|e| WireError::MalformedShake(Box::new(e)))?;
        check_genesis(params, &hand.genesis)?;

        info!(
            "handshake: hand received from {} (user agent {:?})",
            hand.sender_addr, hand.user_agent
        );

        let shake = config.shake(params).to_bytes()?;
        write_frame(stream, params, MsgType::Shake, &shake)?;

        Ok(hand)
    }

    fn read_shake<R: Read>(&self, reader: &mut R) -> WireResult<Shake> {
        let envelope = read_envelope(reader, &self.params)?;
        if envelope.msg_type != MsgType::Shake {
            return Err(WireError::UnexpectedMessage {
                expected: MsgType::Shake,
                actual: envelope.msg_type,
            });
        }

        let body = read_body(reader, envelope.body_len)?;
        let shake =
            Shake::from_bytes(&body).map_err(|e| WireError::MalformedShake(Box::new(e)))?;
        check_genesis(&self.params, &shake.genesis)?;

        Ok(shake)
    }

    fn fail(&mut self, err: WireError) -> WireError {
        let kind = HandshakeFailure::from(&err);
        warn!("handshake failed: {err}");
        self.state = HandshakeState::Failed(kind);
        err
    }
}

fn check_genesis(params: &NetworkParams, theirs: &Hash) -> WireResult<()> {
    if *theirs != params.genesis {
        return Err(WireError::GenesisMismatch {
            ours: params.genesis,
            theirs: *theirs,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Duplex, frame, tcp_pair};
    use crate::wire::Ping;
    use crate::wire::constants::MAX_BODY_LEN;
    use std::thread;

    fn params() -> NetworkParams {
        NetworkParams::testnet2()
    }

    fn peer_shake(genesis: Hash) -> Shake {
        Shake {
            version: 1,
            capabilities: Capabilities::UNKNOWN,
            total_difficulty: 42,
            user_agent: "peer".to_string(),
            genesis,
        }
    }

    #[test]
    fn default_config_builds_the_standard_hand() {
        let hand = HandshakeConfig::default().hand(&params());

        assert_eq!(hand.version, 1);
        assert_eq!(hand.capabilities, Capabilities::UNKNOWN);
        assert_eq!(hand.nonce, 1);
        assert_eq!(hand.total_difficulty, 1);
        assert_eq!(hand.sender_addr.port(), 13414);
        assert!(hand.sender_addr.ip().is_unspecified());
        assert_eq!(hand.genesis, params().genesis);
    }

    #[test]
    fn handshake_reaches_shake_received_and_exposes_peer_fields() {
        let shake = peer_shake(params().genesis);
        let mut stream = Duplex::new(frame(MsgType::Shake, &shake.to_bytes().unwrap()));

        let config = HandshakeConfig::default().with_user_agent("x");
        let mut handshake = Handshake::new(params(), config);
        assert_eq!(handshake.state(), &HandshakeState::Init);

        handshake.send_hand(&mut stream).unwrap();
        assert_eq!(handshake.state(), &HandshakeState::HandSent);

        let received = handshake.receive_shake(&mut stream).unwrap();
        assert_eq!(received.total_difficulty, 42);
        assert_eq!(received.user_agent, "peer");
        assert_eq!(handshake.state(), &HandshakeState::ShakeReceived(shake));

        // Hand frame: 11-byte envelope + 78 + len("x").
        assert_eq!(stream.output.len(), 11 + 79);
        assert_eq!(stream.output[2], 1);
        assert_eq!(Hand::from_bytes(&stream.output[11..]).unwrap().user_agent, "x");
    }

    #[test]
    fn non_shake_reply_fails_with_unexpected_message() {
        let ping = Ping::default().to_bytes().unwrap();
        let mut stream = Duplex::new(frame(MsgType::Ping, &ping));

        let mut handshake = Handshake::new(params(), HandshakeConfig::default());
        let err = handshake.run(&mut stream).unwrap_err();

        assert!(matches!(
            err,
            WireError::UnexpectedMessage {
                expected: MsgType::Shake,
                actual: MsgType::Ping
            }
        ));
        assert_eq!(
            handshake.state(),
            &HandshakeState::Failed(HandshakeFailure::UnexpectedMessage(MsgType::Ping))
        );
    }

    #[test]
    fn undecodable_shake_fails_with_malformed_shake() {
        // Version and capabilities only.
        let mut stream = Duplex::new(frame(MsgType::Shake, &[0u8; 8]));

        let mut handshake = Handshake::new(params(), HandshakeConfig::default());
        let err = handshake.run(&mut stream).unwrap_err();

        assert!(matches!(err, WireError::MalformedShake(_)));
        assert_eq!(
            handshake.state(),
            &HandshakeState::Failed(HandshakeFailure::MalformedShake)
        );
    }

    #[test]
    fn oversized_shake_length_fails_as_malformed_shake() {
        let mut input = vec![0x1E, 0xC5, u8::from(MsgType::Shake)];
        input.extend_from_slice(&(MAX_BODY_LEN + 1).to_be_bytes());
        let mut stream = Duplex::new(input);

        let mut handshake = Handshake::new(params(), HandshakeConfig::default());
        let err = handshake.run(&mut stream).unwrap_err();

        assert!(matches!(err, WireError::MalformedField { field: "body_len", .. }));
        assert_eq!(
            handshake.state(),
            &HandshakeState::Failed(HandshakeFailure::MalformedShake)
        );
    }

    #[test]
    fn shake_from_another_chain_fails_with_genesis_mismatch() {
        let shake = peer_shake(Hash::new([9u8; 32]));
        let mut stream = Duplex::new(frame(MsgType::Shake, &shake.to_bytes().unwrap()));

        let mut handshake = Handshake::new(params(), HandshakeConfig::default());
        let err = handshake.run(&mut stream).unwrap_err();

        assert!(matches!(err, WireError::GenesisMismatch { .. }));
        assert_eq!(
            handshake.state(),
            &HandshakeState::Failed(HandshakeFailure::GenesisMismatch)
        );
    }

    #[test]
    fn peer_closing_before_shake_is_a_framing_failure() {
        let mut stream = Duplex::new(Vec::new());

        let mut handshake = Handshake::new(params(), HandshakeConfig::default());
        let err = handshake.run(&mut stream).unwrap_err();

        assert!(err.is_framing());
        assert_eq!(
            handshake.state(),
            &HandshakeState::Failed(HandshakeFailure::Framing)
        );
    }

    #[test]
    fn steps_out_of_order_are_refused() {
        let mut stream = Duplex::new(Vec::new());
        let mut handshake = Handshake::new(params(), HandshakeConfig::default());

        assert!(matches!(
            handshake.receive_shake(&mut stream),
            Err(WireError::OutOfOrder(_))
        ));

        handshake.send_hand(&mut stream).unwrap();
        assert!(matches!(
            handshake.send_hand(&mut stream),
            Err(WireError::OutOfOrder(_))
        ));
        assert_eq!(handshake.state(), &HandshakeState::HandSent);
    }

    #[test]
    fn respond_completes_handshake_over_tcp() {
        let (mut client, mut server) = tcp_pair();

        let responder = thread::spawn(move || {
            let config = HandshakeConfig::default().with_user_agent("peer");
            Handshake::respond(&mut server, &NetworkParams::testnet2(), &config).unwrap()
        });

        let config = HandshakeConfig::default()
            .with_user_agent("x")
            .with_nonce(77);
        let mut handshake = Handshake::new(params(), config);
        let shake = handshake.run(&mut client).unwrap();

        assert_eq!(shake.user_agent, "peer");
        assert!(matches!(handshake.state(), HandshakeState::ShakeReceived(_)));

        let hand = responder.join().unwrap();
        assert_eq!(hand.nonce, 77);
        assert_eq!(hand.user_agent, "x");
    }

    #[test]
    fn respond_rejects_anything_but_hand() {
        let ping = Ping::default().to_bytes().unwrap();
        let mut stream = Duplex::new(frame(MsgType::Ping, &ping));

        let err =
            Handshake::respond(&mut stream, &params(), &HandshakeConfig::default()).unwrap_err();

        assert!(matches!(
            err,
            WireError::UnexpectedMessage {
                expected: MsgType::Hand,
                ..
            }
        ));
        assert!(stream.output.is_empty());
    }
}
