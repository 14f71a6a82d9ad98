//! Inject one DATA packet into a router
//!
//! # Usage
//!
//! ```bash
//! qmesh-inject 10.0.3.3 hello from h11
//! qmesh-inject 10.0.3.3 ping --router 127.0.0.1:9001
//! ```

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::UdpSocket;

use qmesh_core::{Address, DataPacket, Packet};
use qmesh_node::DEFAULT_PORT;

#[derive(Parser)]
#[command(name = "qmesh-inject")]
#[command(about = "Send a DATA packet to a router for delivery")]
#[command(version)]
struct Args {
    /// Final destination address
    destination: Address,

    /// Message words, joined with spaces
    #[arg(required = true)]
    message: Vec<String>,

    /// Router that receives the packet
    #[arg(long, default_value_t = SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)))]
    router: SocketAddr,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let payload = args.message.join(" ");

    let bind = match args.router {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    };
    let socket = UdpSocket::bind(bind).await.context("failed to bind socket")?;

    let packet = Packet::from(DataPacket::new(args.destination, payload.clone()));
    let bytes = packet.encode()?;
    socket
        .send_to(&bytes, args.router)
        .await
        .with_context(|| format!("failed to send to {}", args.router))?;

    println!("Sent to {}: {}", args.destination, payload);
    Ok(())
}
