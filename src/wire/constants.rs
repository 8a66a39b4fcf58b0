/// First magic byte of every message envelope.
///
/// Together with [`MAGIC_2`] it opens the 11-byte envelope that precedes
/// every message body on the wire and acts as a boundary marker in the
/// TCP stream.
pub const MAGIC_1: u8 = 0x1E;

/// Second magic byte of every message envelope.
pub const MAGIC_2: u8 = 0xC5;

/// Size of the message envelope on the wire.
///
/// ```text
/// magic1 (1) | magic2 (1) | msg_type (1) | body_len (8, big-endian)
/// ```
pub const ENVELOPE_LEN: usize = 11;

/// Current network protocol version, sent in `Hand` and `Shake`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Default port peers listen on.
pub const DEFAULT_PORT: u16 = 13414;

/// User agent advertised when the caller does not provide one.
pub const USER_AGENT: &str = concat!("mw-network ", env!("CARGO_PKG_VERSION"));

/// Genesis block hash of test network 2.
///
/// Sent in `Hand`, compared against the peer's `Shake`, and used as the
/// single entry of an empty block locator.
///
/// ```text
/// 3346f63cf5b25e14addd8855e2755784e55e612cd58561c8ca18d7cf6ca86f4b
/// ```
pub const GENESIS_HASH_TESTNET2: [u8; 32] = [
    0x33, 0x46, 0xf6, 0x3c, 0xf5, 0xb2, 0x5e, 0x14, 0xad, 0xdd, 0x88, 0x55, 0xe2, 0x75, 0x57, 0x84,
    0xe5, 0x5e, 0x61, 0x2c, 0xd5, 0x85, 0x61, 0xc8, 0xca, 0x18, 0xd7, 0xcf, 0x6c, 0xa8, 0x6f, 0x4b,
];

/// Number of nonces in a Cuckoo-cycle proof of work.
pub const PROOF_SIZE: usize = 42;

/// Size of a compressed Pedersen commitment.
pub const COMMITMENT_SIZE: usize = 33;

/// Size of the accumulated kernel offset carried in every block header.
pub const KERNEL_OFFSET_SIZE: usize = 32;

/// Largest range proof an output may carry.
pub const MAX_RANGE_PROOF_SIZE: usize = 5134;

/// Size of an IPv4 socket address on the wire: family tag + 4 address bytes + port.
pub const SOCK_ADDR_V4_LEN: usize = 7;

/// Largest body accepted after an envelope. Anything above is treated as a
/// malformed length before a single body byte is read.
pub const MAX_BODY_LEN: u64 = 20_000_000;

/// Largest number of addresses accepted in a `PeerAddrs` message.
pub const MAX_PEER_ADDRS: u32 = 256;

/// Largest number of headers accepted in a `Headers` message.
pub const MAX_BLOCK_HEADERS: u16 = 512;

/// Upstream seed nodes (all listening on [`DEFAULT_PORT`]).
pub const SEED_NODES: &[&str] = &[
    "192.241.160.172",
    "109.74.202.16",
    "198.245.50.26",
    "46.4.91.48",
];
