//! Stream helpers shared by the handshake and session tests.

use std::io::{self, Cursor, Read, Write};
use std::net::{TcpListener, TcpStream};

use crate::wire::MsgType;

/// In-memory stream: reads come from a prepared buffer, writes are kept.
pub(crate) struct Duplex {
    input: Cursor<Vec<u8>>,
    pub(crate) output: Vec<u8>,
}

impl Duplex {
    pub(crate) fn new(input: Vec<u8>) -> Self {
        Self {
            input: Cursor::new(input),
            output: Vec::new(),
        }
    }
}

impl Read for Duplex {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for Duplex {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Envelope with the testnet2 magic followed by `body`.
pub(crate) fn frame(msg_type: MsgType, body: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x1E, 0xC5, u8::from(msg_type)];
    bytes.extend_from_slice(&(body.len() as u64).to_be_bytes());
    bytes.extend_from_slice(body);
    bytes
}

pub(crate) fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();
    (client, server)
}
