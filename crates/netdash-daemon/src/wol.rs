//! Wake-on-LAN magic packets

use netdash_core::{MacAddress, MacParseError};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::info;

const SYNC_STREAM_LEN: usize = 6;
const MAC_REPETITIONS: usize = 16;
pub const MAGIC_PACKET_LEN: usize = SYNC_STREAM_LEN + MAC_REPETITIONS * 6;

#[derive(Error, Debug)]
pub enum WakeError {
    #[error(transparent)]
    InvalidMac(#[from] MacParseError),
    #[error("failed to send magic packet: {0}")]
    Io(#[from] io::Error),
}

/// Six 0xFF bytes followed by the target MAC sixteen times
pub fn magic_packet(mac: MacAddress) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xffu8; MAGIC_PACKET_LEN];
    for chunk in packet[SYNC_STREAM_LEN..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac.octets());
    }
    packet
}

/// Parse `mac` and broadcast a magic packet for it
pub async fn wake(mac: &str, broadcast: Ipv4Addr, port: u16) -> Result<MacAddress, WakeError> {
    let target: MacAddress = mac.parse()?;
    send_magic_packet(target, SocketAddr::V4(SocketAddrV4::new(broadcast, port))).await?;
    info!(mac = %target, %broadcast, port, "Sent magic packet");
    Ok(target)
}

async fn send_magic_packet(mac: MacAddress, destination: SocketAddr) -> io::Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.set_broadcast(true)?;
    socket.send_to(&magic_packet(mac), destination).await?;
    Ok(())
}
