use clap::{Parser, Subcommand};
use std::error::Error;
use std::net::ToSocketAddrs;
use std::time::{Duration, Instant};

use rand::Rng;

use mw_network::handshake::HandshakeConfig;
use mw_network::session::Session;
use mw_network::wire::{Capabilities, Hash, NetworkParams, Ping};

#[derive(Parser)]
#[command(name = "mw-cli")]
struct Cli {
    /// Peer address, `host:port`.
    #[arg(long)]
    node: String,

    #[arg(long)]
    user_agent: Option<String>,

    /// Connect, read and write timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Ping,
    GetPeerAddrs,
    GetHeaders {
        /// Locator hash to start from; genesis when omitted.
        #[arg(long)]
        from: Option<Hash>,
    },
    GetBlock {
        #[arg(long)]
        hash: Hash,
    },
}

type Client = Session<std::net::TcpStream>;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();

    println!("Connecting to {}", cli.node);

    let addr = cli
        .node
        .to_socket_addrs()?
        .next()
        .ok_or("could not resolve address")?;

    let params = NetworkParams::testnet2();
    let mut session = Session::connect(addr, params, Duration::from_secs(cli.timeout))?;

    let mut config = HandshakeConfig::default().with_nonce(rand::thread_rng().r#gen());
    if let Some(user_agent) = cli.user_agent {
        config = config.with_user_agent(user_agent);
    }

    let peer = session.handshake(config)?;
    println!(
        "Peer: {} (version {}, capabilities {:?}, difficulty {})",
        peer.user_agent, peer.version, peer.capabilities, peer.total_difficulty
    );

    match cli.command {
        Commands::Ping => ping(&mut session)?,
        Commands::GetPeerAddrs => get_peer_addrs(&mut session)?,
        Commands::GetHeaders { from } => get_headers(&mut session, from)?,
        Commands::GetBlock { hash } => get_block(&mut session, hash)?,
    }

    Ok(())
}

fn ping(session: &mut Client) -> Result<(), Box<dyn Error>> {
    let ping = Ping {
        total_difficulty: 1,
        height: 0,
    };

    println!("Sending ping");
    let start = Instant::now();
    let pong = session.ping(ping)?;

    println!(
        "Received pong in {:.2?}: difficulty {}, height {}",
        start.elapsed(),
        pong.total_difficulty,
        pong.height
    );

    Ok(())
}

fn get_peer_addrs(session: &mut Client) -> Result<(), Box<dyn Error>> {
    println!("Requesting peer addresses...");
    let peers = session.get_peer_addrs(Capabilities::PEER_LIST)?;

    println!("Received {} peers", peers.len());
    for peer in peers {
        println!("  {peer}");
    }

    Ok(())
}

fn get_headers(session: &mut Client, from: Option<Hash>) -> Result<(), Box<dyn Error>> {
    match from {
        Some(hash) => println!("Requesting headers after {hash}..."),
        None => println!("Requesting headers from genesis..."),
    }

    let headers = session.get_headers(from.into_iter().collect())?;
    println!("Received {} headers", headers.len());

    if let Some(last) = headers.last() {
        println!(
            "Last header: height {}, previous {}, difficulty {}",
            last.height, last.previous, last.total_difficulty
        );
    }

    Ok(())
}

fn get_block(session: &mut Client, hash: Hash) -> Result<(), Box<dyn Error>> {
    println!("Requesting block {hash}...");
    let block = session.get_block(hash)?;

    let coinbase = block
        .outputs
        .iter()
        .filter(|o| o.features.is_coinbase())
        .count();

    println!("Height: {}", block.header.height);
    println!("Timestamp: {}", block.header.timestamp);
    println!("Inputs: {}", block.inputs.len());
    println!("Outputs: {} ({} coinbase)", block.outputs.len(), coinbase);
    println!(
        "Kernels: {} ({} bytes, not decoded)",
        block.kernels.count,
        block.kernels.bytes.len()
    );

    Ok(())
}
