use std::error::Error;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::ops::ControlFlow;
use std::time::Duration;

use clap::Parser;
use log::{debug, info, warn};
use rand::Rng;

use mw_network::handshake::HandshakeConfig;
use mw_network::session::Session;
use mw_network::wire::constants::SEED_NODES;
use mw_network::wire::{Message, NetworkParams};

/// Connects to a seed node, completes the handshake, requests headers from
/// genesis and logs every message the peer sends until it disconnects.
#[derive(Parser)]
#[command(name = "mw-listener")]
struct Cli {
    /// Peer to connect to (`host:port`). Defaults to the first reachable seed.
    #[arg(long)]
    node: Option<String>,

    #[arg(long, default_value_t = 30)]
    connect_timeout: u64,
}

fn candidates(cli: &Cli, params: &NetworkParams) -> Result<Vec<SocketAddr>, Box<dyn Error>> {
    if let Some(node) = &cli.node {
        return Ok(node.to_socket_addrs()?.collect());
    }

    let mut addrs = Vec::new();
    for seed in SEED_NODES {
        addrs.extend((*seed, params.default_port).to_socket_addrs()?);
    }
    Ok(addrs)
}

fn dial(addrs: &[SocketAddr], timeout: Duration) -> Result<TcpStream, Box<dyn Error>> {
    for addr in addrs {
        info!("connecting to {addr}");
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => warn!("{addr}: {e}"),
        }
    }
    Err("no peer reachable".into())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let params = NetworkParams::testnet2();
    let timeout = Duration::from_secs(cli.connect_timeout);

    let stream = dial(&candidates(&cli, &params)?, timeout)?;
    // Reads stay blocking: peers may stay silent for a long time.
    stream.set_write_timeout(Some(timeout))?;

    let mut session = Session::new(stream, params);

    let config = HandshakeConfig::default().with_nonce(rand::thread_rng().r#gen());
    let peer = session.handshake(config)?;
    println!(
        "Handshake complete: {} (version {}, difficulty {})",
        peer.user_agent, peer.version, peer.total_difficulty
    );

    // Ask for headers from genesis; the answer is logged by the loop below.
    session.request_headers(Vec::new())?;

    session.run(|session, msg| {
        match msg {
            Message::Ping(ping) => {
                session.send(&Message::Pong(ping))?;
                debug!("answered ping at height {}", ping.height);
            }
            Message::PeerAddrs(addrs) => {
                println!("Received {} peers", addrs.peers.len());
                for peer in addrs.peers {
                    println!("  {peer}");
                }
            }
            Message::Header(header) => {
                println!("New header at height {}", header.height);
            }
            Message::Headers(headers) => {
                println!("Received {} headers", headers.headers.len());
            }
            Message::Block(block) => {
                println!(
                    "Block at height {}: {} inputs, {} outputs, {} kernels",
                    block.header.height,
                    block.inputs.len(),
                    block.outputs.len(),
                    block.kernels.count
                );
            }
            other => {
                println!("Received {:?}", other.msg_type());
            }
        }
        Ok(ControlFlow::Continue(()))
    })?;

    println!("Peer closed connection.");

    Ok(())
}
