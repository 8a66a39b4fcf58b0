use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddrV4};

use byteorder::{BigEndian, ReadBytesExt};

use crate::wire::constants::{
    COMMITMENT_SIZE, ENVELOPE_LEN, KERNEL_OFFSET_SIZE, MAX_BLOCK_HEADERS, MAX_PEER_ADDRS,
    MAX_RANGE_PROOF_SIZE, PROOF_SIZE,
};
use crate::wire::error::{WireError, WireResult};
use crate::wire::message::{
    Block, BlockHeader, BlockHeaders, Capabilities, Decode, Envelope, GetBlock, GetHeaders,
    GetPeerAddrs, Hand, Hash, Input, Locator, MsgType, OpaqueKernels, Output, OutputFeatures,
    PeerAddrs, Ping, Proof, RangeProof, Shake,
};

impl Decode for Envelope {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        let mut header = [0u8; ENVELOPE_LEN];
        reader.read_exact(&mut header).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                WireError::Framing(format!("stream ended inside the {ENVELOPE_LEN}-byte envelope"))
            } else {
                WireError::Transport(e)
            }
        })?;

        let mut body_len = [0u8; 8];
        body_len.copy_from_slice(&header[3..11]);

        // Magic bytes are taken as-is; `codec::read_envelope` checks them.
        Ok(Envelope {
            magic: [header[0], header[1]],
            msg_type: MsgType::from(header[2]),
            body_len: u64::from_be_bytes(body_len),
        })
    }
}

impl Decode for Hand {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        let version = read_u32(reader, "hand: version")?;
        let capabilities = Capabilities::from(read_u32(reader, "hand: capabilities")?);
        let nonce = read_u64(reader, "hand: nonce")?;
        let total_difficulty = read_u64(reader, "hand: total_difficulty")?;
        let sender_addr = read_sock_addr(reader)?;
        let receiver_addr = read_sock_addr(reader)?;
        let user_agent = read_string(reader, "hand: user_agent")?;
        let genesis = read_hash(reader, "hand: genesis")?;

        Ok(Hand {
            version,
            capabilities,
            nonce,
            total_difficulty,
            sender_addr,
            receiver_addr,
            user_agent,
            genesis,
        })
    }
}

impl Decode for Shake {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        let version = read_u32(reader, "shake: version")?;
        let capabilities = Capabilities::from(read_u32(reader, "shake: capabilities")?);
        let total_difficulty = read_u64(reader, "shake: total_difficulty")?;
        let user_agent = read_string(reader, "shake: user_agent")?;
        let genesis = read_hash(reader, "shake: genesis")?;

        Ok(Shake {
            version,
            capabilities,
            total_difficulty,
            user_agent,
            genesis,
        })
    }
}

impl Decode for Ping {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        Ok(Ping {
            total_difficulty: read_u64(reader, "ping: total_difficulty")?,
            height: read_u64(reader, "ping: height")?,
        })
    }
}

impl Decode for GetPeerAddrs {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        Ok(GetPeerAddrs {
            capabilities: Capabilities::from(read_u32(reader, "get_peer_addrs: capabilities")?),
        })
    }
}

impl Decode for PeerAddrs {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        let count = read_u32(reader, "peer_addrs: count")?;

        if count > MAX_PEER_ADDRS {
            return Err(WireError::malformed(
                "peer_addrs",
                format!("{count} addresses exceeds {MAX_PEER_ADDRS}"),
            ));
        }

        let mut peers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            peers.push(read_sock_addr(reader)?);
        }

        Ok(PeerAddrs { peers })
    }
}

impl Decode for Locator {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        let count = read_u8(reader, "locator: count")?;
        if count == 0 {
            return Err(WireError::malformed("locator", "empty locator"));
        }

        let mut hashes = Vec::with_capacity(count as usize);
        for i in 0..count {
            // Every hash after the first is preceded by the total count again.
            if i > 0 {
                let repeated = read_u8(reader, "locator: count")?;
                if repeated != count {
                    return Err(WireError::malformed(
                        "locator",
                        format!("count byte {repeated} does not repeat {count}"),
                    ));
                }
            }
            hashes.push(read_hash(reader, "locator: hash")?);
        }

        Ok(Locator::from_decoded(hashes))
    }
}

impl Decode for GetHeaders {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        Ok(GetHeaders {
            locator: Locator::decode(reader)?,
        })
    }
}

impl Decode for Proof {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        let mut nonces = [0u32; PROOF_SIZE];
        reader
            .read_u32_into::<BigEndian>(&mut nonces)
            .map_err(|e| eof(e, "proof: nonces"))?;
        Ok(Proof { nonces })
    }
}

impl Decode for BlockHeader {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        let version = read_u16(reader, "header: version")?;
        let height = read_u64(reader, "header: height")?;
        let previous = read_hash(reader, "header: previous")?;
        let timestamp = read_i64(reader, "header: timestamp")?;
        let total_difficulty = read_u64(reader, "header: total_difficulty")?;
        let output_root = read_hash(reader, "header: output_root")?;
        let range_proof_root = read_hash(reader, "header: range_proof_root")?;
        let kernel_root = read_hash(reader, "header: kernel_root")?;
        let total_kernel_offset =
            read_array::<_, KERNEL_OFFSET_SIZE>(reader, "header: total_kernel_offset")?;
        let nonce = read_u64(reader, "header: nonce")?;
        let pow = Proof::decode(reader)?;

        Ok(BlockHeader {
            version,
            height,
            previous,
            timestamp,
            total_difficulty,
            output_root,
            range_proof_root,
            kernel_root,
            total_kernel_offset,
            nonce,
            pow,
        })
    }
}

impl Decode for BlockHeaders {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        let count = read_u16(reader, "headers: count")?;

        if count > MAX_BLOCK_HEADERS {
            return Err(WireError::malformed(
                "headers",
                format!("{count} headers exceeds {MAX_BLOCK_HEADERS}"),
            ));
        }

        let mut headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            headers.push(BlockHeader::decode(reader)?);
        }

        Ok(BlockHeaders { headers })
    }
}

impl Decode for GetBlock {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        Ok(GetBlock {
            hash: read_hash(reader, "get_block: hash")?,
        })
    }
}

impl Decode for Input {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        let features = OutputFeatures(read_u8(reader, "input: features")?);
        let commitment = read_array::<_, COMMITMENT_SIZE>(reader, "input: commitment")?;
        Ok(Input {
            features,
            commitment,
        })
    }
}

impl Decode for RangeProof {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        let len = read_u64(reader, "range_proof: length")?;
        if len > MAX_RANGE_PROOF_SIZE as u64 {
            return Err(WireError::malformed(
                "range_proof",
                format!("{len} bytes exceeds {MAX_RANGE_PROOF_SIZE}"),
            ));
        }

        let mut bytes = vec![0u8; len as usize];
        reader
            .read_exact(&mut bytes)
            .map_err(|e| eof(e, "range_proof: bytes"))?;

        RangeProof::new(bytes)
    }
}

impl Decode for Output {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        let features = OutputFeatures(read_u8(reader, "output: features")?);
        let commitment = read_array::<_, COMMITMENT_SIZE>(reader, "output: commitment")?;
        let proof = RangeProof::decode(reader)?;
        Ok(Output {
            features,
            commitment,
            proof,
        })
    }
}

/// Reads everything up to the end of `reader` as kernel bytes, so this must
/// only ever be handed a reader bounded to the message body.
impl Decode for Block {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self> {
        let header = BlockHeader::decode(reader)?;

        let inputs_len = read_u64(reader, "block: inputs length")?;
        let outputs_len = read_u64(reader, "block: outputs length")?;
        let kernels_len = read_u64(reader, "block: kernels length")?;

        // Element counts come from the peer; grow as elements actually arrive.
        let mut inputs = Vec::new();
        for _ in 0..inputs_len {
            inputs.push(Input::decode(reader)?);
        }

        let mut outputs = Vec::new();
        for _ in 0..outputs_len {
            outputs.push(Output::decode(reader)?);
        }

        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        if kernels_len > 0 && bytes.is_empty() {
            return Err(WireError::Truncated("block: kernels"));
        }

        Ok(Block {
            header,
            inputs,
            outputs,
            kernels: OpaqueKernels {
                count: kernels_len,
                bytes,
            },
        })
    }
}

pub(crate) fn read_sock_addr<R: Read>(reader: &mut R) -> WireResult<SocketAddrV4> {
    let family = read_u8(reader, "sock_addr: family")?;
    if family != 0 {
        return Err(WireError::UnsupportedAddressFamily(family));
    }

    let ip = read_array::<_, 4>(reader, "sock_addr: ip")?;
    let port = read_u16(reader, "sock_addr: port")?;

    Ok(SocketAddrV4::new(Ipv4Addr::from(ip), port))
}

/// Reads a `u64` length followed by that many UTF-8 bytes.
///
/// The buffer grows with the bytes actually received, so a lying length
/// fails as truncated input instead of allocating up front.
pub(crate) fn read_string<R: Read>(reader: &mut R, ctx: &'static str) -> WireResult<String> {
    let len = read_u64(reader, ctx)?;

    let mut bytes = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut bytes)?;
    if (bytes.len() as u64) < len {
        return Err(WireError::Truncated(ctx));
    }

    String::from_utf8(bytes).map_err(|e| WireError::malformed(ctx, e.to_string()))
}

pub(crate) fn read_hash<R: Read>(reader: &mut R, ctx: &'static str) -> WireResult<Hash> {
    Ok(Hash::new(read_array::<_, 32>(reader, ctx)?))
}

fn eof(err: io::Error, ctx: &'static str) -> WireError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        WireError::Truncated(ctx)
    } else {
        WireError::Transport(err)
    }
}

fn read_array<R: Read, const N: usize>(reader: &mut R, ctx: &'static str) -> WireResult<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| eof(e, ctx))?;
    Ok(buf)
}

fn read_u8<R: Read>(r: &mut R, ctx: &'static str) -> WireResult<u8> {
    r.read_u8().map_err(|e| eof(e, ctx))
}
fn read_u16<R: Read>(r: &mut R, ctx: &'static str) -> WireResult<u16> {
    r.read_u16::<BigEndian>().map_err(|e| eof(e, ctx))
}
fn read_u32<R: Read>(r: &mut R, ctx: &'static str) -> WireResult<u32> {
    r.read_u32::<BigEndian>().map_err(|e| eof(e, ctx))
}
fn read_u64<R: Read>(r: &mut R, ctx: &'static str) -> WireResult<u64> {
    r.read_u64::<BigEndian>().map_err(|e| eof(e, ctx))
}
fn read_i64<R: Read>(r: &mut R, ctx: &'static str) -> WireResult<i64> {
    r.read_i64::<BigEndian>().map_err(|e| eof(e, ctx))
}
