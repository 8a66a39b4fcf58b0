use std::fmt::{self, Debug, Display, Formatter};
use std::io::{Read, Write};
use std::net::SocketAddrV4;
use std::str::FromStr;

use hex::FromHex;

use crate::wire::constants::{
    COMMITMENT_SIZE, KERNEL_OFFSET_SIZE, MAGIC_1, MAGIC_2, MAX_RANGE_PROOF_SIZE, PROOF_SIZE,
};
use crate::wire::error::{WireError, WireResult};

/// Implemented by every value with a wire representation.
///
/// Field order and sizes live in one place per type, so each layout can be
/// audited and tested without the envelope around it.
pub trait Encode {
    fn encode<W: Write>(&self, writer: &mut W) -> WireResult<()>;

    /// Encodes into a fresh buffer.
    fn to_bytes(&self) -> WireResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }
}

/// Implemented by every value that can be read back from the wire.
pub trait Decode: Sized {
    fn decode<R: Read>(reader: &mut R) -> WireResult<Self>;

    /// Decodes from an in-memory message body.
    fn from_bytes(bytes: &[u8]) -> WireResult<Self> {
        let mut reader = bytes;
        Self::decode(&mut reader)
    }
}

/// Message type tag carried in the third envelope byte.
///
/// The tag space is a full `u8`. Values without a name decode to
/// [`MsgType::Unknown`]; that is not an error at the envelope layer, the
/// session simply skips their body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    Error,
    Hand,
    Shake,
    Ping,
    Pong,
    GetPeerAddrs,
    PeerAddrs,
    GetHeaders,
    Header,
    Headers,
    GetBlock,
    Block,
    GetCompactBlock,
    CompactBlock,
    StemTransaction,
    Transaction,
    TxHashSetRequest,
    TxHashSetArchive,

    Unknown(u8),
}

impl MsgType {
    /// Returns true for the types this crate can decode into a [`Message`].
    pub const fn in_catalog(self) -> bool {
        matches!(
            self,
            MsgType::Hand
                | MsgType::Shake
                | MsgType::Ping
                | MsgType::Pong
                | MsgType::GetPeerAddrs
                | MsgType::PeerAddrs
                | MsgType::GetHeaders
                | MsgType::Header
                | MsgType::Headers
                | MsgType::GetBlock
                | MsgType::Block
        )
    }
}

impl From<u8> for MsgType {
    fn from(tag: u8) -> Self {
        match tag {
            0 => MsgType::Error,
            1 => MsgType::Hand,
            2 => MsgType::Shake,
            3 => MsgType::Ping,
            4 => MsgType::Pong,
            5 => MsgType::GetPeerAddrs,
            6 => MsgType::PeerAddrs,
            7 => MsgType::GetHeaders,
            8 => MsgType::Header,
            9 => MsgType::Headers,
            10 => MsgType::GetBlock,
            11 => MsgType::Block,
            12 => MsgType::GetCompactBlock,
            13 => MsgType::CompactBlock,
            14 => MsgType::StemTransaction,
            15 => MsgType::Transaction,
            16 => MsgType::TxHashSetRequest,
            17 => MsgType::TxHashSetArchive,
            other => MsgType::Unknown(other),
        }
    }
}

impl From<MsgType> for u8 {
    fn from(msg_type: MsgType) -> Self {
        match msg_type {
            MsgType::Error => 0,
            MsgType::Hand => 1,
            MsgType::Shake => 2,
            MsgType::Ping => 3,
            MsgType::Pong => 4,
            MsgType::GetPeerAddrs => 5,
            MsgType::PeerAddrs => 6,
            MsgType::GetHeaders => 7,
            MsgType::Header => 8,
            MsgType::Headers => 9,
            MsgType::GetBlock => 10,
            MsgType::Block => 11,
            MsgType::GetCompactBlock => 12,
            MsgType::CompactBlock => 13,
            MsgType::StemTransaction => 14,
            MsgType::Transaction => 15,
            MsgType::TxHashSetRequest => 16,
            MsgType::TxHashSetArchive => 17,
            MsgType::Unknown(tag) => tag,
        }
    }
}

/// The fixed 11-byte header preceding every message body.
///
/// ```text
/// +-----------+-----------+--------------+--------------------+
/// | magic1(1) | magic2(1) | msg_type (1) | body_len (8, BE)   |
/// +-----------+-----------+--------------+--------------------+
/// ```
///
/// `body_len` counts the body only, never the envelope itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub magic: [u8; 2],
    pub msg_type: MsgType,
    pub body_len: u64,
}

impl Envelope {
    /// Envelope with the standard magic bytes.
    pub const fn new(msg_type: MsgType, body_len: u64) -> Self {
        Self::with_magic([MAGIC_1, MAGIC_2], msg_type, body_len)
    }

    pub const fn with_magic(magic: [u8; 2], msg_type: MsgType, body_len: u64) -> Self {
        Self {
            magic,
            msg_type,
            body_len,
        }
    }
}

/// A 32-byte opaque hash (block ids, Merkle roots, genesis).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Debug for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl FromStr for Hash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <[u8; 32]>::from_hex(s).map(Hash)
    }
}

/// Capability flags a peer advertises in `Hand`, `Shake` and uses as a
/// filter in `GetPeerAddrs`.
///
/// This is a `u32` bitfield. Unknown bits are preserved, and zero
/// (nothing advertised) is a valid value.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if all bits in `other` are set.
    pub const fn contains(self, other: Capabilities) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// 0x00: nothing advertised.
    pub const UNKNOWN: Capabilities = Capabilities(0x00);

    /// 0x01: full archival history.
    pub const FULL_HIST: Capabilities = Capabilities(0x01);

    /// 0x02: can provide the UTXO set history for fast sync.
    pub const UTXO_HIST: Capabilities = Capabilities(0x02);

    /// 0x04: can hand out lists of other peers.
    pub const PEER_LIST: Capabilities = Capabilities(0x04);

    /// All of the above.
    pub const FULL_NODE: Capabilities = Capabilities(0x07);

    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();

        if self.is_empty() {
            names.push("UNKNOWN");
            return names;
        }

        if self.contains(Self::FULL_HIST) {
            names.push("FULL_HIST");
        }
        if self.contains(Self::UTXO_HIST) {
            names.push("UTXO_HIST");
        }
        if self.contains(Self::PEER_LIST) {
            names.push("PEER_LIST");
        }

        names
    }
}

impl From<u32> for Capabilities {
    fn from(value: u32) -> Self {
        Capabilities::new(value)
    }
}

impl Debug for Capabilities {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Capabilities(UNKNOWN)");
        }

        let names = self.names().join(" | ");

        write!(f, "Capabilities({}) [0x{:08x}]", names, self.bits())
    }
}

/// First half of the handshake, sent once by the initiator right after the
/// connection is established.
///
/// ```text
/// u32      version
/// u32      capabilities
/// u64      nonce
/// u64      total_difficulty
/// sockaddr sender_addr        (7 bytes)
/// sockaddr receiver_addr      (7 bytes)
/// u64      user_agent length
/// [u8]     user_agent
/// [u8; 32] genesis
/// ```
///
/// Body size is `78 + user_agent.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hand {
    pub version: u32,
    pub capabilities: Capabilities,
    pub nonce: u64,
    pub total_difficulty: u64,
    pub sender_addr: SocketAddrV4,
    pub receiver_addr: SocketAddrV4,
    pub user_agent: String,
    pub genesis: Hash,
}

/// Second half of the handshake, sent once by the responder.
///
/// Unlike [`Hand`] there is no nonce or address, and the user agent comes
/// before the genesis hash:
///
/// ```text
/// u32      version
/// u32      capabilities
/// u64      total_difficulty
/// u64      user_agent length
/// [u8]     user_agent
/// [u8; 32] genesis
/// ```
///
/// Body size is `56 + user_agent.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shake {
    pub version: u32,
    pub capabilities: Capabilities,
    pub total_difficulty: u64,
    pub user_agent: String,
    pub genesis: Hash,
}

/// Liveness probe: 16 bytes, difficulty then height.
///
/// Ping and pong share this shape; only the envelope tag tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ping {
    pub total_difficulty: u64,
    pub height: u64,
}

pub type Pong = Ping;

/// Request for peer addresses matching a capability filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetPeerAddrs {
    pub capabilities: Capabilities,
}

/// Peer addresses: a `u32` count followed by 7-byte IPv4 socket addresses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeerAddrs {
    pub peers: Vec<SocketAddrV4>,
}

/// Ordered block hashes used to find a common ancestor with a peer.
///
/// On the wire every hash is preceded by a count byte equal to the total
/// number of hashes, so `[a, b]` is sent as `[2][a][2][b]`. Peers expect
/// exactly this layout.
///
/// A locator is never empty: an empty list is replaced by the genesis hash
/// at construction, which serializes as `[1][genesis]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    hashes: Vec<Hash>,
}

impl Locator {
    /// Builds a locator, falling back to `genesis` when `hashes` is empty.
    ///
    /// Fails if the list does not fit the single count byte.
    pub fn new(hashes: Vec<Hash>, genesis: Hash) -> WireResult<Self> {
        if hashes.is_empty() {
            return Ok(Self::genesis(genesis));
        }
        if hashes.len() > u8::MAX as usize {
            return Err(WireError::malformed(
                "locator",
                format!("{} hashes do not fit a u8 count", hashes.len()),
            ));
        }
        Ok(Self { hashes })
    }

    /// A locator holding only the genesis hash.
    pub fn genesis(genesis: Hash) -> Self {
        Self {
            hashes: vec![genesis],
        }
    }

    pub(crate) fn from_decoded(hashes: Vec<Hash>) -> Self {
        Self { hashes }
    }

    pub fn hashes(&self) -> &[Hash] {
        &self.hashes
    }
}

/// Request for the headers following the first locator hash the peer knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetHeaders {
    pub locator: Locator,
}

/// Cuckoo-cycle proof of work: always exactly [`PROOF_SIZE`] nonces, no
/// length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proof {
    pub nonces: [u32; PROOF_SIZE],
}

impl Default for Proof {
    fn default() -> Self {
        Self {
            nonces: [0u32; PROOF_SIZE],
        }
    }
}

/// A block header as carried by `Header`, `Headers` and `Block` messages.
///
/// Layout (big-endian):
///
/// ```text
/// u16       version
/// u64       height
/// [u8; 32]  previous
/// i64       timestamp (unix seconds)
/// u64       total_difficulty
/// [u8; 32]  output_root
/// [u8; 32]  range_proof_root
/// [u8; 32]  kernel_root
/// [u8; 32]  total_kernel_offset
/// u64       nonce
/// [u32; 42] proof of work
/// ```
///
/// Total: 362 bytes. Height linkage with `previous` is the caller's business.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockHeader {
    pub version: u16,
    pub height: u64,
    pub previous: Hash,
    pub timestamp: i64,
    pub total_difficulty: u64,
    pub output_root: Hash,
    pub range_proof_root: Hash,
    pub kernel_root: Hash,
    pub total_kernel_offset: [u8; KERNEL_OFFSET_SIZE],
    pub nonce: u64,
    pub pow: Proof,
}

/// Headers answer: a `u16` count followed by that many headers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockHeaders {
    pub headers: Vec<BlockHeader>,
}

/// Request for a full block by hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBlock {
    pub hash: Hash,
}

/// Output feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputFeatures(pub u8);

impl OutputFeatures {
    pub const PLAIN: OutputFeatures = OutputFeatures(0);
    pub const COINBASE: OutputFeatures = OutputFeatures(1);

    pub const fn is_coinbase(self) -> bool {
        self.0 & Self::COINBASE.0 != 0
    }
}

/// A spent output reference: features and its commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Input {
    pub features: OutputFeatures,
    pub commitment: [u8; COMMITMENT_SIZE],
}

/// Opaque range proof bytes, at most [`MAX_RANGE_PROOF_SIZE`] long.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangeProof {
    bytes: Vec<u8>,
}

impl RangeProof {
    pub fn new(bytes: Vec<u8>) -> WireResult<Self> {
        if bytes.len() > MAX_RANGE_PROOF_SIZE {
            return Err(WireError::malformed(
                "range_proof",
                format!("{} bytes exceeds {MAX_RANGE_PROOF_SIZE}", bytes.len()),
            ));
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A new output: features, commitment and its range proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub features: OutputFeatures,
    pub commitment: [u8; COMMITMENT_SIZE],
    pub proof: RangeProof,
}

/// Transaction kernels of a block, kept undecoded.
///
/// The kernel wire format is not part of this protocol description, so the
/// count is reported and the remaining body bytes are kept verbatim. They
/// are never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpaqueKernels {
    pub count: u64,
    pub bytes: Vec<u8>,
}

/// A full block.
///
/// ```text
/// header
/// u64       inputs_len
/// u64       outputs_len
/// u64       kernels_len
/// inputs[]  features (1) + commitment (33)
/// outputs[] features (1) + commitment (33) + u64 proof_len + proof
/// kernels   opaque
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub kernels: OpaqueKernels,
}

/// A decoded message from the catalog.
///
/// Types outside the catalog never surface here: the session skips their
/// body and moves on to the next envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hand(Hand),
    Shake(Shake),
    Ping(Ping),
    Pong(Pong),
    GetPeerAddrs(GetPeerAddrs),
    PeerAddrs(PeerAddrs),
    GetHeaders(GetHeaders),
    Header(BlockHeader),
    Headers(BlockHeaders),
    GetBlock(GetBlock),
    Block(Block),
}

impl Message {
    /// The envelope tag this message travels under.
    pub fn msg_type(&self) -> MsgType {
        match self {
            Message::Hand(_) => MsgType::Hand,
            Message::Shake(_) => MsgType::Shake,
            Message::Ping(_) => MsgType::Ping,
            Message::Pong(_) => MsgType::Pong,
            Message::GetPeerAddrs(_) => MsgType::GetPeerAddrs,
            Message::PeerAddrs(_) => MsgType::PeerAddrs,
            Message::GetHeaders(_) => MsgType::GetHeaders,
            Message::Header(_) => MsgType::Header,
            Message::Headers(_) => MsgType::Headers,
            Message::GetBlock(_) => MsgType::GetBlock,
            Message::Block(_) => MsgType::Block,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_type_tags_follow_declaration_order() {
        assert_eq!(u8::from(MsgType::Error), 0);
        assert_eq!(u8::from(MsgType::Hand), 1);
        assert_eq!(u8::from(MsgType::Shake), 2);
        assert_eq!(u8::from(MsgType::Headers), 9);
        assert_eq!(u8::from(MsgType::TxHashSetArchive), 17);
    }

    #[test]
    fn every_tag_maps_back_to_itself() {
        for tag in 0..=u8::MAX {
            assert_eq!(u8::from(MsgType::from(tag)), tag);
        }
    }

    #[test]
    fn unnamed_tags_are_unknown_not_errors() {
        assert_eq!(MsgType::from(18), MsgType::Unknown(18));
        assert_eq!(MsgType::from(0xFF), MsgType::Unknown(0xFF));
        assert!(!MsgType::Unknown(18).in_catalog());
    }

    #[test]
    fn catalog_covers_the_decodable_types() {
        assert!(MsgType::Hand.in_catalog());
        assert!(MsgType::Block.in_catalog());
        assert!(!MsgType::Error.in_catalog());
        assert!(!MsgType::Transaction.in_catalog());
        assert!(!MsgType::TxHashSetArchive.in_catalog());
    }

    #[test]
    fn hash_hex_round_trips_through_display() {
        let text = "3346f63cf5b25e14addd8855e2755784e55e612cd58561c8ca18d7cf6ca86f4b";
        let hash: Hash = text.parse().unwrap();
        assert_eq!(hash.to_string(), text);
        assert_eq!(hash.as_bytes()[0], 0x33);
    }

    #[test]
    fn hash_rejects_wrong_length() {
        assert!("3346f6".parse::<Hash>().is_err());
    }

    #[test]
    fn capabilities_debug_lists_names() {
        let caps = Capabilities::FULL_NODE;
        assert_eq!(caps.names(), vec!["FULL_HIST", "UTXO_HIST", "PEER_LIST"]);
        assert_eq!(format!("{:?}", Capabilities::UNKNOWN), "Capabilities(UNKNOWN)");
    }

    #[test]
    fn capabilities_preserve_unknown_bits() {
        let caps = Capabilities::from(0x8000_0004);
        assert!(caps.contains(Capabilities::PEER_LIST));
        assert_eq!(caps.bits(), 0x8000_0004);
    }

    #[test]
    fn empty_locator_falls_back_to_genesis() {
        let genesis = Hash::new([7u8; 32]);
        let locator = Locator::new(vec![], genesis).unwrap();
        assert_eq!(locator.hashes(), &[genesis]);
    }

    #[test]
    fn locator_rejects_more_hashes_than_a_count_byte_holds() {
        let hashes = vec![Hash::ZERO; 256];
        assert!(matches!(
            Locator::new(hashes, Hash::ZERO),
            Err(WireError::MalformedField { field: "locator", .. })
        ));
    }

    #[test]
    fn range_proof_capacity_is_enforced() {
        assert!(RangeProof::new(vec![0u8; MAX_RANGE_PROOF_SIZE]).is_ok());
        assert!(RangeProof::new(vec![0u8; MAX_RANGE_PROOF_SIZE + 1]).is_err());
    }

    #[test]
    fn ping_and_pong_messages_differ_only_in_tag() {
        let ping = Ping {
            total_difficulty: 1000,
            height: 500,
        };
        assert_eq!(Message::Ping(ping).msg_type(), MsgType::Ping);
        assert_eq!(Message::Pong(ping).msg_type(), MsgType::Pong);
    }
}
