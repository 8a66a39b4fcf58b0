use std::io::{self, Read, Write};

use log::debug;

use crate::wire::constants::{ENVELOPE_LEN, MAX_BODY_LEN};
use crate::wire::error::{WireError, WireResult};
use crate::wire::message::{
    Block, BlockHeader, BlockHeaders, Decode, Encode, Envelope, GetBlock, GetHeaders, GetPeerAddrs,
    Hand, Message, MsgType, PeerAddrs, Ping, Shake,
};
use crate::wire::network::NetworkParams;

/// Reads the next envelope, or `None` if the stream ended cleanly before
/// its first byte.
///
/// A stream ending partway through the 11 bytes, or an envelope whose magic
/// bytes differ from `params.magic`, is a framing error.
pub fn next_envelope<R: Read>(
    reader: &mut R,
    params: &NetworkParams,
) -> WireResult<Option<Envelope>> {
    let mut header = [0u8; ENVELOPE_LEN];
    let mut filled = 0;

    while filled < ENVELOPE_LEN {
        match reader.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    if filled == 0 {
        return Ok(None);
    }
    if filled < ENVELOPE_LEN {
        return Err(WireError::Framing(format!(
            "stream ended after {filled} of {ENVELOPE_LEN} envelope bytes"
        )));
    }

    let envelope = Envelope::from_bytes(&header)?;
    check_magic(&envelope, params)?;

    Ok(Some(envelope))
}

/// Reads one envelope and checks its magic bytes.
///
/// Unlike [`next_envelope`], a stream that is already at its end is a
/// framing error here.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use mw_network::wire::codec::read_envelope;
/// use mw_network::wire::{MsgType, NetworkParams};
///
/// let bytes = [0x1E, 0xC5, 3, 0, 0, 0, 0, 0, 0, 0, 16];
/// let env = read_envelope(&mut Cursor::new(bytes), &NetworkParams::testnet2()).unwrap();
///
/// assert_eq!(env.msg_type, MsgType::Ping);
/// assert_eq!(env.body_len, 16);
/// ```
pub fn read_envelope<R: Read>(reader: &mut R, params: &NetworkParams) -> WireResult<Envelope> {
    let envelope = Envelope::decode(reader)?;
    check_magic(&envelope, params)?;
    Ok(envelope)
}

fn check_magic(envelope: &Envelope, params: &NetworkParams) -> WireResult<()> {
    if envelope.magic != params.magic {
        return Err(WireError::Framing(format!(
            "invalid magic bytes: expected {:02x?}, got {:02x?}",
            params.magic, envelope.magic
        )));
    }
    Ok(())
}

/// Reads exactly `len` body bytes.
///
/// Lengths above [`MAX_BODY_LEN`] are rejected before anything is read; the
/// buffer grows with the bytes actually received.
pub fn read_body<R: Read>(reader: &mut R, len: u64) -> WireResult<Vec<u8>> {
    if len > MAX_BODY_LEN {
        return Err(WireError::malformed(
            "body_len",
            format!("{len} bytes exceeds {MAX_BODY_LEN}"),
        ));
    }

    let mut body = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut body)?;

    if (body.len() as u64) < len {
        return Err(WireError::Framing(format!(
            "body ended after {} of {len} bytes",
            body.len()
        )));
    }

    Ok(body)
}

/// Discards exactly `len` body bytes so the next read starts on an envelope.
pub fn skip_body<R: Read>(reader: &mut R, len: u64) -> WireResult<()> {
    let skipped = io::copy(&mut reader.by_ref().take(len), &mut io::sink())?;

    if skipped < len {
        return Err(WireError::Framing(format!(
            "body ended after {skipped} of {len} skipped bytes"
        )));
    }

    Ok(())
}

/// Decodes a message body according to its envelope tag.
///
/// Types outside the catalog are reported as unimplemented; callers that
/// want to stay in sync skip them with [`skip_body`] instead.
pub fn decode_body(msg_type: MsgType, body: &[u8]) -> WireResult<Message> {
    let mut reader = body;

    let message = match msg_type {
        MsgType::Hand => Message::Hand(Hand::decode(&mut reader)?),
        MsgType::Shake => Message::Shake(Shake::decode(&mut reader)?),
        MsgType::Ping => Message::Ping(Ping::decode(&mut reader)?),
        MsgType::Pong => Message::Pong(Ping::decode(&mut reader)?),
        MsgType::GetPeerAddrs => Message::GetPeerAddrs(GetPeerAddrs::decode(&mut reader)?),
        MsgType::PeerAddrs => Message::PeerAddrs(PeerAddrs::decode(&mut reader)?),
        MsgType::GetHeaders => Message::GetHeaders(GetHeaders::decode(&mut reader)?),
        MsgType::Header => Message::Header(BlockHeader::decode(&mut reader)?),
        MsgType::Headers => Message::Headers(BlockHeaders::decode(&mut reader)?),
        MsgType::GetBlock => Message::GetBlock(GetBlock::decode(&mut reader)?),
        MsgType::Block => Message::Block(Block::decode(&mut reader)?),
        MsgType::Error
        | MsgType::GetCompactBlock
        | MsgType::CompactBlock
        | MsgType::StemTransaction
        | MsgType::Transaction
        | MsgType::TxHashSetRequest
        | MsgType::TxHashSetArchive
        | MsgType::Unknown(_) => {
            return Err(WireError::Unimplemented("message type outside the catalog"));
        }
    };

    if !reader.is_empty() {
        debug!(
            "{:?}: ignoring {} trailing body bytes",
            msg_type,
            reader.len()
        );
    }

    Ok(message)
}

/// Reads the next catalog message from the stream.
///
/// Envelopes outside the catalog have exactly `body_len` bytes skipped and
/// reading continues with the following envelope. Returns `None` once the
/// stream ends cleanly on an envelope boundary.
///
/// A body that fails to decode has still been consumed in full, so after a
/// recoverable error the stream is aligned on the next envelope.
pub fn read_message<R: Read>(
    reader: &mut R,
    params: &NetworkParams,
) -> WireResult<Option<Message>> {
    loop {
        let Some(envelope) = next_envelope(reader, params)? else {
            return Ok(None);
        };

        if !envelope.msg_type.in_catalog() {
            debug!(
                "skipping {:?} body of {} bytes",
                envelope.msg_type, envelope.body_len
            );
            skip_body(reader, envelope.body_len)?;
            continue;
        }

        let body = read_body(reader, envelope.body_len)?;
        debug!("received {:?} ({} bytes)", envelope.msg_type, body.len());

        return decode_body(envelope.msg_type, &body).map(Some);
    }
}

/// Writes a complete frame: envelope followed by `body`.
///
/// ```text
/// +-----------+-----------+--------------+------------------+
/// | magic1(1) | magic2(1) | msg_type (1) | body_len (8, BE) |
/// +-----------+-----------+--------------+------------------+
/// | body (body_len bytes)                              ...  |
/// +---------------------------------------------------------+
/// ```
///
/// The frame is assembled in memory and handed to the writer in a single
/// `write_all`, then flushed. A failure there is a transport error.
///
/// # Example
///
/// ```
/// use mw_network::wire::codec::write_frame;
/// use mw_network::wire::{MsgType, NetworkParams};
///
/// let mut buffer = Vec::new();
/// write_frame(&mut buffer, &NetworkParams::testnet2(), MsgType::GetBlock, &[0u8; 32]).unwrap();
///
/// assert_eq!(buffer.len(), 11 + 32);
/// ```
pub fn write_frame<W: Write>(
    writer: &mut W,
    params: &NetworkParams,
    msg_type: MsgType,
    body: &[u8],
) -> WireResult<()> {
    let envelope = Envelope::with_magic(params.magic, msg_type, body.len() as u64);

    let mut frame = Vec::with_capacity(ENVELOPE_LEN + body.len());
    frame.extend_from_slice(&envelope.to_array());
    frame.extend_from_slice(body);

    writer.write_all(&frame)?;
    writer.flush()?;

    debug!("sent {:?} ({} bytes)", msg_type, body.len());

    Ok(())
}

/// Encodes `message` and writes it with the matching envelope tag.
pub fn send_message<W: Write>(
    writer: &mut W,
    params: &NetworkParams,
    message: &Message,
) -> WireResult<()> {
    let body = message.to_bytes()?;
    write_frame(writer, params, message.msg_type(), &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::message::Hash;
    use std::io::Cursor;

    fn params() -> NetworkParams {
        NetworkParams::testnet2()
    }

    /// Builds a full frame (envelope + body) with the standard magic bytes.
    fn build_frame(tag: u8, body: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x1E, 0xC5, tag];
        bytes.extend_from_slice(&(body.len() as u64).to_be_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    fn ping_body(difficulty: u64, height: u64) -> Vec<u8> {
        let mut b = difficulty.to_be_bytes().to_vec();
        b.extend_from_slice(&height.to_be_bytes());
        b
    }

    #[test]
    fn read_envelope_rejects_wrong_magic() {
        let bytes = [0xF9, 0xBE, 3, 0, 0, 0, 0, 0, 0, 0, 16];
        let err = read_envelope(&mut Cursor::new(bytes), &params()).unwrap_err();
        assert!(matches!(err, WireError::Framing(_)));
    }

    #[test]
    fn read_envelope_on_empty_stream_is_framing_error() {
        let err = read_envelope(&mut Cursor::new(Vec::new()), &params()).unwrap_err();
        assert!(err.is_framing());
    }

    #[test]
    fn next_envelope_distinguishes_clean_end_from_short_envelope() {
        assert!(next_envelope(&mut Cursor::new(Vec::new()), &params())
            .unwrap()
            .is_none());

        let err = next_envelope(&mut Cursor::new(vec![0x1E, 0xC5, 3]), &params()).unwrap_err();
        assert!(matches!(err, WireError::Framing(_)));
    }

    #[test]
    fn read_body_rejects_oversized_length_without_reading() {
        let mut cursor = Cursor::new(vec![1, 2, 3]);
        let err = read_body(&mut cursor, MAX_BODY_LEN + 1).unwrap_err();

        assert!(matches!(err, WireError::MalformedField { field: "body_len", .. }));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn read_body_short_stream_is_framing_error() {
        let err = read_body(&mut Cursor::new(vec![1, 2, 3]), 10).unwrap_err();
        assert!(matches!(err, WireError::Framing(_)));
    }

    #[test]
    fn read_message_decodes_ping() {
        let mut cursor = Cursor::new(build_frame(3, &ping_body(1000, 500)));

        let msg = read_message(&mut cursor, &params()).unwrap().unwrap();
        assert_eq!(
            msg,
            Message::Ping(Ping {
                total_difficulty: 1000,
                height: 500
            })
        );
    }

    #[test]
    fn read_message_skips_unknown_type_and_reads_next_envelope() {
        let mut bytes = build_frame(200, &[0xAB; 100]);
        bytes.extend(build_frame(4, &ping_body(1, 2)));
        let mut cursor = Cursor::new(bytes);

        let msg = read_message(&mut cursor, &params()).unwrap().unwrap();
        assert!(matches!(msg, Message::Pong(p) if p.height == 2));
        assert!(read_message(&mut cursor, &params()).unwrap().is_none());
    }

    #[test]
    fn skip_body_consumes_exactly_the_declared_length() {
        let mut cursor = Cursor::new(vec![0u8; 150]);
        skip_body(&mut cursor, 100).unwrap();
        assert_eq!(cursor.position(), 100);
    }

    #[test]
    fn skip_body_short_stream_is_framing_error() {
        let err = skip_body(&mut Cursor::new(vec![0u8; 10]), 100).unwrap_err();
        assert!(matches!(err, WireError::Framing(_)));
    }

    #[test]
    fn read_message_known_type_with_short_body_fails() {
        // Declares a 16-byte ping but only 8 bytes follow.
        let mut bytes = build_frame(3, &ping_body(1, 2));
        bytes.truncate(ENVELOPE_LEN + 8);

        let err = read_message(&mut Cursor::new(bytes), &params()).unwrap_err();
        assert!(err.is_framing());
    }

    #[test]
    fn decode_body_refuses_types_outside_catalog() {
        assert!(matches!(
            decode_body(MsgType::Transaction, &[]),
            Err(WireError::Unimplemented(_))
        ));
    }

    #[test]
    fn ping_and_pong_frames_differ_only_in_tag_byte() {
        let ping = Ping {
            total_difficulty: 1000,
            height: 500,
        };

        let mut ping_frame = Vec::new();
        send_message(&mut ping_frame, &params(), &Message::Ping(ping)).unwrap();
        let mut pong_frame = Vec::new();
        send_message(&mut pong_frame, &params(), &Message::Pong(ping)).unwrap();

        assert_eq!(ping_frame.len(), ENVELOPE_LEN + 16);
        assert_eq!(ping_frame[2], 3);
        assert_eq!(pong_frame[2], 4);
        assert_eq!(ping_frame[..2], pong_frame[..2]);
        assert_eq!(ping_frame[3..], pong_frame[3..]);
    }

    #[test]
    fn send_message_sets_exact_body_length() {
        let msg = Message::GetBlock(GetBlock {
            hash: Hash::new([1u8; 32]),
        });

        let mut frame = Vec::new();
        send_message(&mut frame, &params(), &msg).unwrap();

        let env = read_envelope(&mut Cursor::new(&frame), &params()).unwrap();
        assert_eq!(env.msg_type, MsgType::GetBlock);
        assert_eq!(env.body_len, 32);
        assert_eq!(frame.len(), ENVELOPE_LEN + 32);
    }

    #[test]
    fn sent_frames_read_back_as_the_same_message() {
        let msg = Message::Headers(BlockHeaders {
            headers: vec![BlockHeader::default(), BlockHeader::default()],
        });

        let mut frame = Vec::new();
        send_message(&mut frame, &params(), &msg).unwrap();

        let read = read_message(&mut Cursor::new(frame), &params()).unwrap();
        assert_eq!(read, Some(msg));
    }
}
