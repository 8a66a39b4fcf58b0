use std::io::{self, Read, Write};
use std::net::{SocketAddr, SocketAddrV4, TcpStream};
use std::ops::ControlFlow;
use std::time::Duration;

use log::{debug, info, warn};

use crate::handshake::{Handshake, HandshakeConfig};
use crate::wire::{
    Block, BlockHeader, BlockHeaders, Capabilities, GetBlock, GetHeaders, GetPeerAddrs, Hash,
    Locator, Message, NetworkParams, Ping, Pong, Shake, WireError, WireResult, read_message,
    send_message,
};

/// One connection to one peer.
///
/// Owns the stream for its whole lifetime. Everything is sequential: each
/// call blocks until its frame is written or the next one has arrived.
pub struct Session<S> {
    stream: S,
    params: NetworkParams,
    peer: Option<Shake>,
}

impl Session<TcpStream> {
    /// Dials `addr` and applies `timeout` to the connect and to every
    /// subsequent read and write.
    pub fn connect(addr: SocketAddr, params: NetworkParams, timeout: Duration) -> WireResult<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        info!("connected to {addr}");

        Ok(Self::new(stream, params))
    }
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S, params: NetworkParams) -> Self {
        Self {
            stream,
            params,
            peer: None,
        }
    }

    /// Runs the Hand/Shake exchange. Must succeed before anything else is
    /// sent.
    pub fn handshake(&mut self, config: HandshakeConfig) -> WireResult<&Shake> {
        if self.peer.is_some() {
            return Err(WireError::OutOfOrder("handshake already completed"));
        }

        let shake = Handshake::new(self.params, config).run(&mut self.stream)?;

        Ok(self.peer.insert(shake))
    }

    /// The peer's `Shake`, once the handshake succeeded.
    pub fn peer(&self) -> Option<&Shake> {
        self.peer.as_ref()
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    pub fn send(&mut self, message: &Message) -> WireResult<()> {
        send_message(&mut self.stream, &self.params, message)
    }

    /// Next catalog message, or `None` once the peer closed the stream.
    pub fn next_message(&mut self) -> WireResult<Option<Message>> {
        read_message(&mut self.stream, &self.params)
    }

    /// Dispatch loop: hands every decoded message to `handler` until it
    /// breaks, the peer closes the stream or a fatal error occurs.
    ///
    /// Recoverable decode errors (a peer list with a non-IPv4 entry) are
    /// logged and the loop moves on to the next envelope.
    pub fn run<F>(&mut self, mut handler: F) -> WireResult<()>
    where
        F: FnMut(&mut Self, Message) -> WireResult<ControlFlow<()>>,
    {
        loop {
            match self.next_message() {
                Ok(Some(msg)) => {
                    if handler(self, msg)?.is_break() {
                        return Ok(());
                    }
                }
                Ok(None) => {
                    info!("peer closed the connection");
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => {
                    warn!("dropping message: {e}");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Receives messages until `handler` returns `Some`.
    ///
    /// Every `Ping` is answered with a `Pong` carrying the same values and
    /// never reaches the handler. Recoverable decode errors are logged and
    /// skipped, as in [`Session::run`].
    pub fn recv_until<T, F>(&mut self, mut handler: F) -> WireResult<T>
    where
        F: FnMut(Message) -> WireResult<Option<T>>,
    {
        loop {
            let msg = match self.next_message() {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    return Err(WireError::Transport(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    )));
                }
                Err(e) if e.is_recoverable() => {
                    warn!("dropping message: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Message::Ping(ping) = msg {
                debug!(
                    "answering ping (difficulty {}, height {})",
                    ping.total_difficulty, ping.height
                );
                self.send(&Message::Pong(ping))?;
                continue;
            }

            if let Some(value) = handler(msg)? {
                return Ok(value);
            }
        }
    }

    /// Sends a `Ping` and waits for the `Pong`.
    pub fn ping(&mut self, ping: Ping) -> WireResult<Pong> {
        self.send(&Message::Ping(ping))?;

        self.recv_until(|msg| match msg {
            Message::Pong(pong) => Ok(Some(pong)),
            other => {
                debug!("ignoring {:?} while waiting for pong", other.msg_type());
                Ok(None)
            }
        })
    }

    pub fn get_peer_addrs(&mut self, capabilities: Capabilities) -> WireResult<Vec<SocketAddrV4>> {
        self.send(&Message::GetPeerAddrs(GetPeerAddrs { capabilities }))?;

        self.recv_until(|msg| match msg {
            Message::PeerAddrs(addrs) => Ok(Some(addrs.peers)),
            other => {
                debug!("ignoring {:?} while waiting for peer addrs", other.msg_type());
                Ok(None)
            }
        })
    }

    /// Sends `GetHeaders` without waiting for the answer, which arrives
    /// later as a `Headers` message. An empty locator starts from genesis.
    pub fn request_headers(&mut self, locator: Vec<Hash>) -> WireResult<()> {
        let locator = Locator::new(locator, self.params.genesis)?;
        self.send(&Message::GetHeaders(GetHeaders { locator }))
    }

    /// Requests the headers following the first `locator` hash the peer
    /// knows and waits for them.
    pub fn get_headers(&mut self, locator: Vec<Hash>) -> WireResult<Vec<BlockHeader>> {
        self.request_headers(locator)?;

        self.recv_until(|msg| match msg {
            Message::Headers(BlockHeaders { headers }) => Ok(Some(headers)),
            other => {
                debug!("ignoring {:?} while waiting for headers", other.msg_type());
                Ok(None)
            }
        })
    }

    pub fn get_block(&mut self, hash: Hash) -> WireResult<Block> {
        self.send(&Message::GetBlock(GetBlock { hash }))?;

        self.recv_until(|msg| match msg {
            Message::Block(block) => Ok(Some(block)),
            other => {
                debug!("ignoring {:?} while waiting for block", other.msg_type());
                Ok(None)
            }
        })
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
