use std::io::Write;
use std::net::SocketAddrV4;

use byteorder::{BigEndian, WriteBytesExt};

use crate::wire::constants::ENVELOPE_LEN;
use crate::wire::error::{WireError, WireResult};
use crate::wire::message::{
    Block, BlockHeader, BlockHeaders, Encode, Envelope, GetBlock, GetHeaders, GetPeerAddrs, Hand,
    Hash, Input, Locator, Message, Output, PeerAddrs, Ping, Proof, RangeProof, Shake,
};

impl Envelope {
    /// The envelope bytes as they appear on the wire.
    pub fn to_array(&self) -> [u8; ENVELOPE_LEN] {
        let mut out = [0u8; ENVELOPE_LEN];
        out[0] = self.magic[0];
        out[1] = self.magic[1];
        out[2] = u8::from(self.msg_type);
        out[3..].copy_from_slice(&self.body_len.to_be_bytes());
        out
    }
}

impl Encode for Envelope {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        writer.write_all(&self.to_array())?;
        Ok(())
    }
}

/// Builds the `Hand` body.
///
/// The layout is:
///
/// ```text
/// u32      version
/// u32      capabilities
/// u64      nonce
/// u64      total_difficulty
/// sockaddr sender_addr
/// sockaddr receiver_addr
/// u64      user_agent length
/// [u8]     user_agent
/// [u8; 32] genesis
/// ```
impl Encode for Hand {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        writer.write_u32::<BigEndian>(self.version)?;
        writer.write_u32::<BigEndian>(self.capabilities.bits())?;
        writer.write_u64::<BigEndian>(self.nonce)?;
        writer.write_u64::<BigEndian>(self.total_difficulty)?;
        write_sock_addr(writer, &self.sender_addr)?;
        write_sock_addr(writer, &self.receiver_addr)?;
        write_string(writer, &self.user_agent)?;
        write_hash(writer, &self.genesis)?;
        Ok(())
    }
}

/// Difficulty and genesis trail the user agent here, unlike in `Hand`.
impl Encode for Shake {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        writer.write_u32::<BigEndian>(self.version)?;
        writer.write_u32::<BigEndian>(self.capabilities.bits())?;
        writer.write_u64::<BigEndian>(self.total_difficulty)?;
        write_string(writer, &self.user_agent)?;
        write_hash(writer, &self.genesis)?;
        Ok(())
    }
}

impl Encode for Ping {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        writer.write_u64::<BigEndian>(self.total_difficulty)?;
        writer.write_u64::<BigEndian>(self.height)?;
        Ok(())
    }
}

impl Encode for GetPeerAddrs {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        writer.write_u32::<BigEndian>(self.capabilities.bits())?;
        Ok(())
    }
}

impl Encode for PeerAddrs {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        let count = u32::try_from(self.peers.len())
            .map_err(|_| WireError::malformed("peer_addrs", "count does not fit a u32"))?;

        writer.write_u32::<BigEndian>(count)?;
        for peer in &self.peers {
            write_sock_addr(writer, peer)?;
        }
        Ok(())
    }
}

/// Writes the total count before *every* hash, not once up front.
impl Encode for Locator {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        // `Locator::new` keeps the list within a u8 and never empty.
        let count = self.hashes().len() as u8;
        for hash in self.hashes() {
            writer.write_u8(count)?;
            write_hash(writer, hash)?;
        }
        Ok(())
    }
}

impl Encode for GetHeaders {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        self.locator.encode(writer)
    }
}

impl Encode for Proof {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        for nonce in &self.nonces {
            writer.write_u32::<BigEndian>(*nonce)?;
        }
        Ok(())
    }
}

impl Encode for BlockHeader {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        writer.write_u16::<BigEndian>(self.version)?;
        writer.write_u64::<BigEndian>(self.height)?;
        write_hash(writer, &self.previous)?;
        writer.write_i64::<BigEndian>(self.timestamp)?;
        writer.write_u64::<BigEndian>(self.total_difficulty)?;
        write_hash(writer, &self.output_root)?;
        write_hash(writer, &self.range_proof_root)?;
        write_hash(writer, &self.kernel_root)?;
        writer.write_all(&self.total_kernel_offset)?;
        writer.write_u64::<BigEndian>(self.nonce)?;
        self.pow.encode(writer)
    }
}

impl Encode for BlockHeaders {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        let count = u16::try_from(self.headers.len())
            .map_err(|_| WireError::malformed("headers", "count does not fit a u16"))?;

        writer.write_u16::<BigEndian>(count)?;
        for header in &self.headers {
            header.encode(writer)?;
        }
        Ok(())
    }
}

impl Encode for GetBlock {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        write_hash(writer, &self.hash)
    }
}

impl Encode for Input {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        writer.write_u8(self.features.0)?;
        writer.write_all(&self.commitment)?;
        Ok(())
    }
}

impl Encode for RangeProof {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        writer.write_u64::<BigEndian>(self.len() as u64)?;
        writer.write_all(self.as_bytes())?;
        Ok(())
    }
}

impl Encode for Output {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        writer.write_u8(self.features.0)?;
        writer.write_all(&self.commitment)?;
        self.proof.encode(writer)
    }
}

impl Encode for Block {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        self.header.encode(writer)?;
        writer.write_u64::<BigEndian>(self.inputs.len() as u64)?;
        writer.write_u64::<BigEndian>(self.outputs.len() as u64)?;
        writer.write_u64::<BigEndian>(self.kernels.count)?;
        for input in &self.inputs {
            input.encode(writer)?;
        }
        for output in &self.outputs {
            output.encode(writer)?;
        }
        writer.write_all(&self.kernels.bytes)?;
        Ok(())
    }
}

/// Encodes the body only; the envelope tag comes from [`Message::msg_type`].
impl Encode for Message {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()> {
        match self {
            Message::Hand(m) => m.encode(writer),
            Message::Shake(m) => m.encode(writer),
            Message::Ping(m) | Message::Pong(m) => m.encode(writer),
            Message::GetPeerAddrs(m) => m.encode(writer),
            Message::PeerAddrs(m) => m.encode(writer),
            Message::GetHeaders(m) => m.encode(writer),
            Message::Header(m) => m.encode(writer),
            Message::Headers(m) => m.encode(writer),
            Message::GetBlock(m) => m.encode(writer),
            Message::Block(m) => m.encode(writer),
        }
    }
}

/// IPv4 only: family tag 0, four address bytes, port.
pub(crate) fn write_sock_addr<W: Write>(writer: &mut W, addr: &SocketAddrV4) -> WireResult<()> {
    writer.write_u8(0)?;
    writer.write_all(&addr.ip().octets())?;
    writer.write_u16::<BigEndian>(addr.port())?;
    Ok(())
}

pub(crate) fn write_string<W: Write>(writer: &mut W, value: &str) -> WireResult<()> {
    writer.write_u64::<BigEndian>(value.len() as u64)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

pub(crate) fn write_hash<W: Write>(writer: &mut W, hash: &Hash) -> WireResult<()> {
    writer.write_all(hash.as_bytes())?;
    Ok(())
}
