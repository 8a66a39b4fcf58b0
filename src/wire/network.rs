use crate::wire::constants::{
    DEFAULT_PORT, GENESIS_HASH_TESTNET2, MAGIC_1, MAGIC_2, PROTOCOL_VERSION,
};
use crate::wire::message::Hash;

/// Protocol-wide parameters of the network a connection speaks to.
///
/// These values never change for the lifetime of a connection. They are
/// handed to the codec, the handshake and the session at construction
/// instead of being read from process-wide state, so two connections to
/// different networks can coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    /// The two magic bytes opening every envelope.
    pub magic: [u8; 2],
    /// Protocol version advertised in `Hand`.
    pub protocol_version: u32,
    /// Genesis block hash; a peer on another chain is refused.
    pub genesis: Hash,
    /// Port used when a peer address comes without one.
    pub default_port: u16,
}

impl NetworkParams {
    /// Parameters of test network 2.
    pub const fn testnet2() -> Self {
        Self {
            magic: [MAGIC_1, MAGIC_2],
            protocol_version: PROTOCOL_VERSION,
            genesis: Hash::new(GENESIS_HASH_TESTNET2),
            default_port: DEFAULT_PORT,
        }
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self::testnet2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn testnet2_constants() {
        let params = NetworkParams::testnet2();

        assert_eq!(params.magic, [0x1E, 0xC5]);
        assert_eq!(params.protocol_version, 1);
        assert_eq!(params.default_port, 13414);
        assert_eq!(
            params.genesis.as_bytes(),
            &hex!("3346f63cf5b25e14addd8855e2755784e55e612cd58561c8ca18d7cf6ca86f4b")
        );
    }
}
