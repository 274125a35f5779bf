//! ARP sweep over a raw Ethernet channel
//!
//! One broadcast ARP request is sent per host in the subnet, then replies are
//! collected until the timeout elapses. Opening the channel needs raw socket
//! privileges (root or CAP_NET_RAW on Linux).

use netdash_core::MacAddress;
use pnet::datalink::{self, Channel, DataLinkReceiver, NetworkInterface};
use pnet::ipnetwork::IpNetwork;
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::Packet;
use pnet::util::MacAddr;
use std::collections::HashSet;
use std::io;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::scanner::ArpSweeper;
use crate::subnet::Subnet;

const ETH_HEADER_LEN: usize = 14;
const ARP_PACKET_LEN: usize = 28;
/// Minimum Ethernet frame size without FCS
const MIN_FRAME_LEN: usize = 60;

/// Poll interval for the receive side so the deadline is checked regularly
const READ_TIMEOUT: Duration = Duration::from_millis(100);
/// Pause after a receive error that is not a read timeout
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("no usable network interface on {0}")]
    NoInterface(String),
    #[error("network interface {0} not found")]
    InterfaceNotFound(String),
    #[error("network interface {name} is not usable: {reason}")]
    InterfaceUnusable { name: String, reason: String },
    #[error("failed to open datalink channel on {interface}: {source}")]
    Channel {
        interface: String,
        #[source]
        source: io::Error,
    },
    #[error("unsupported datalink channel type on {0}")]
    UnsupportedChannel(String),
    #[error("failed to build ARP request for {0}")]
    Packet(Ipv4Addr),
    #[error("failed to send ARP request to {target}: {source}")]
    Send {
        target: Ipv4Addr,
        #[source]
        source: io::Error,
    },
    #[error("discovery task failed: {0}")]
    Join(String),
}

/// One accepted ARP reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpReply {
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
}

/// Local addressing used to build requests and filter replies
#[derive(Debug, Clone, Copy)]
pub struct SweepContext {
    pub local_mac: MacAddress,
    pub local_ip: Ipv4Addr,
    pub subnet: Subnet,
}

/// Sweeper backed by a `pnet` datalink channel
#[derive(Debug, Clone, Default)]
pub struct PnetArpSweeper {
    interface: Option<String>,
}

impl PnetArpSweeper {
    /// Create a sweeper, optionally pinned to an interface by name
    pub fn new(interface: Option<String>) -> Self {
        Self { interface }
    }
}

impl ArpSweeper for PnetArpSweeper {
    fn sweep(&self, subnet: Subnet, timeout: Duration) -> Result<Vec<ArpReply>, SweepError> {
        let interfaces = datalink::interfaces();
        let (interface, ctx) = select_interface(&interfaces, self.interface.as_deref(), subnet)?;

        let config = datalink::Config {
            read_timeout: Some(READ_TIMEOUT),
            promiscuous: false,
            ..Default::default()
        };

        let (mut tx, mut rx) = match datalink::channel(interface, config) {
            Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
            Ok(_) => return Err(SweepError::UnsupportedChannel(interface.name.clone())),
            Err(source) => {
                return Err(SweepError::Channel {
                    interface: interface.name.clone(),
                    source,
                })
            }
        };

        info!(
            interface = %interface.name,
            local_ip = %ctx.local_ip,
            subnet = %subnet,
            "Sending ARP sweep"
        );

        let mut sent = 0usize;
        for target in subnet.hosts() {
            if target == ctx.local_ip {
                continue;
            }
            let frame = build_arp_request(ctx.local_mac, ctx.local_ip, target)
                .ok_or(SweepError::Packet(target))?;
            if let Some(Err(source)) = tx.send_to(&frame, None) {
                return Err(SweepError::Send { target, source });
            }
            sent += 1;
        }

        debug!(sent, timeout_ms = timeout.as_millis() as u64, "Collecting ARP replies");
        let replies = collect_replies(rx.as_mut(), &ctx, timeout);
        info!(sent, replies = replies.len(), "ARP sweep complete");
        Ok(replies)
    }
}

/// Pick the interface to sweep from and the local address to use.
///
/// A named interface must exist and carry a MAC and an IPv4 address.
/// Otherwise the first up, non-loopback interface with an address inside
/// the subnet is used.
pub fn select_interface<'a>(
    interfaces: &'a [NetworkInterface],
    name: Option<&str>,
    subnet: Subnet,
) -> Result<(&'a NetworkInterface, SweepContext), SweepError> {
    if let Some(name) = name {
        let iface = interfaces
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| SweepError::InterfaceNotFound(name.to_string()))?;

        let local_mac = usable_mac(iface).ok_or_else(|| SweepError::InterfaceUnusable {
            name: name.to_string(),
            reason: "no MAC address".to_string(),
        })?;
        let local_ip = local_ipv4(iface, subnet).ok_or_else(|| SweepError::InterfaceUnusable {
            name: name.to_string(),
            reason: "no IPv4 address".to_string(),
        })?;

        return Ok((
            iface,
            SweepContext {
                local_mac,
                local_ip,
                subnet,
            },
        ));
    }

    interfaces
        .iter()
        .filter(|i| i.is_up() && !i.is_loopback())
        .find_map(|iface| {
            let local_mac = usable_mac(iface)?;
            let local_ip = local_ipv4(iface, subnet).filter(|ip| subnet.contains(*ip))?;
            Some((
                iface,
                SweepContext {
                    local_mac,
                    local_ip,
                    subnet,
                },
            ))
        })
        .ok_or_else(|| SweepError::NoInterface(subnet.to_string()))
}

fn usable_mac(iface: &NetworkInterface) -> Option<MacAddress> {
    iface.mac.map(to_mac).filter(|mac| !mac.is_zero())
}

/// IPv4 address of the interface, preferring one inside the subnet
fn local_ipv4(iface: &NetworkInterface, subnet: Subnet) -> Option<Ipv4Addr> {
    let v4: Vec<Ipv4Addr> = iface
        .ips
        .iter()
        .filter_map(|net| match net {
            IpNetwork::V4(v4) => Some(v4.ip()),
            IpNetwork::V6(_) => None,
        })
        .collect();

    v4.iter()
        .copied()
        .find(|ip| subnet.contains(*ip))
        .or_else(|| v4.first().copied())
}

/// Build a broadcast Ethernet frame carrying an ARP who-has request
pub fn build_arp_request(src_mac: MacAddress, src_ip: Ipv4Addr, target: Ipv4Addr) -> Option<Vec<u8>> {
    let mut buffer = vec![0u8; MIN_FRAME_LEN];
    {
        let mut eth = MutableEthernetPacket::new(&mut buffer)?;
        eth.set_destination(MacAddr::broadcast());
        eth.set_source(to_pnet_mac(src_mac));
        eth.set_ethertype(EtherTypes::Arp);
    }

    let mut arp = MutableArpPacket::new(&mut buffer[ETH_HEADER_LEN..ETH_HEADER_LEN + ARP_PACKET_LEN])?;
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    arp.set_operation(ArpOperations::Request);
    arp.set_sender_hw_addr(to_pnet_mac(src_mac));
    arp.set_sender_proto_addr(src_ip);
    arp.set_target_hw_addr(MacAddr::zero());
    arp.set_target_proto_addr(target);

    Some(buffer)
}

/// Extract a reply addressed to us from a received frame
pub fn parse_arp_reply(frame: &[u8], ctx: &SweepContext) -> Option<ArpReply> {
    let eth = EthernetPacket::new(frame)?;
    if eth.get_ethertype() != EtherTypes::Arp {
        return None;
    }

    let arp = ArpPacket::new(eth.payload())?;
    if arp.get_operation() != ArpOperations::Reply {
        return None;
    }
    if arp.get_target_proto_addr() != ctx.local_ip {
        return None;
    }

    let ip = arp.get_sender_proto_addr();
    if ip == ctx.local_ip || !ctx.subnet.contains(ip) {
        return None;
    }

    let mac = to_mac(arp.get_sender_hw_addr());
    if mac.is_zero() {
        return None;
    }

    Some(ArpReply { ip, mac })
}

/// Read frames until `window` has elapsed, keeping the first reply per address
pub fn collect_replies(
    rx: &mut dyn DataLinkReceiver,
    ctx: &SweepContext,
    window: Duration,
) -> Vec<ArpReply> {
    let deadline = Instant::now() + window;
    let mut seen = HashSet::new();
    let mut replies = Vec::new();

    while Instant::now() < deadline {
        match rx.next() {
            Ok(frame) => {
                if let Some(reply) = parse_arp_reply(frame, ctx) {
                    if seen.insert(reply.ip) {
                        trace!(ip = %reply.ip, mac = %reply.mac, "ARP reply");
                        replies.push(reply);
                    }
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Err(e) => {
                trace!(error = %e, "Ignoring receive error");
                let remaining = deadline.saturating_duration_since(Instant::now());
                std::thread::sleep(RECEIVE_ERROR_BACKOFF.min(remaining));
            }
        }
    }

    replies
}

fn to_mac(mac: MacAddr) -> MacAddress {
    let MacAddr(a, b, c, d, e, f) = mac;
    MacAddress::new(a, b, c, d, e, f)
}

fn to_pnet_mac(mac: MacAddress) -> MacAddr {
    let [a, b, c, d, e, f] = mac.octets();
    MacAddr::new(a, b, c, d, e, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::ipnetwork::Ipv4Network;
    use std::collections::VecDeque;

    // IFF_UP and IFF_LOOPBACK
    const FLAG_UP: u32 = 0x1;
    const FLAG_LOOPBACK: u32 = 0x8;

    fn local_mac() -> MacAddress {
        MacAddress::new(0x02, 0x00, 0x00, 0x00, 0x00, 0x01)
    }

    fn ctx() -> SweepContext {
        SweepContext {
            local_mac: local_mac(),
            local_ip: Ipv4Addr::new(192, 168, 1, 2),
            subnet: "192.168.1.0/24".parse().unwrap(),
        }
    }

    fn reply_frame(sender_ip: Ipv4Addr, sender_mac: MacAddress, target_ip: Ipv4Addr) -> Vec<u8> {
        let mut buffer = vec![0u8; MIN_FRAME_LEN];
        {
            let mut eth = MutableEthernetPacket::new(&mut buffer).unwrap();
            eth.set_destination(to_pnet_mac(local_mac()));
            eth.set_source(to_pnet_mac(sender_mac));
            eth.set_ethertype(EtherTypes::Arp);
        }
        let mut arp =
            MutableArpPacket::new(&mut buffer[ETH_HEADER_LEN..ETH_HEADER_LEN + ARP_PACKET_LEN])
                .unwrap();
        arp.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp.set_protocol_type(EtherTypes::Ipv4);
        arp.set_hw_addr_len(6);
        arp.set_proto_addr_len(4);
        arp.set_operation(ArpOperations::Reply);
        arp.set_sender_hw_addr(to_pnet_mac(sender_mac));
        arp.set_sender_proto_addr(sender_ip);
        arp.set_target_hw_addr(to_pnet_mac(local_mac()));
        arp.set_target_proto_addr(target_ip);
        buffer
    }

    fn interface(name: &str, flags: u32, mac: Option<MacAddr>, ip: Option<(Ipv4Addr, u8)>) -> NetworkInterface {
        NetworkInterface {
            name: name.to_string(),
            description: String::new(),
            index: 1,
            mac,
            ips: ip
                .map(|(ip, prefix)| vec![IpNetwork::V4(Ipv4Network::new(ip, prefix).unwrap())])
                .unwrap_or_default(),
            flags,
        }
    }

    /// Receiver that plays back queued frames, then reports read timeouts
    struct ScriptedReceiver {
        frames: VecDeque<Vec<u8>>,
        current: Vec<u8>,
    }

    impl ScriptedReceiver {
        fn new(frames: Vec<Vec<u8>>) -> Self {
            Self {
                frames: frames.into(),
                current: Vec::new(),
            }
        }
    }

    impl DataLinkReceiver for ScriptedReceiver {
        fn next(&mut self) -> io::Result<&[u8]> {
            match self.frames.pop_front() {
                Some(frame) => {
                    self.current = frame;
                    Ok(self.current.as_slice())
                }
                None => {
                    std::thread::sleep(Duration::from_millis(5));
                    Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
                }
            }
        }
    }

    /// Receiver whose interface has gone away: every read fails immediately
    struct FailingReceiver {
        reads: usize,
    }

    impl DataLinkReceiver for FailingReceiver {
        fn next(&mut self) -> io::Result<&[u8]> {
            self.reads += 1;
            Err(io::Error::new(io::ErrorKind::Other, "network is down"))
        }
    }

    #[test]
    fn test_collect_backs_off_on_receive_errors() {
        let mut rx = FailingReceiver { reads: 0 };
        let window = Duration::from_millis(200);
        let started = Instant::now();
        let replies = collect_replies(&mut rx, &ctx(), window);

        assert!(replies.is_empty());
        assert!(started.elapsed() >= window);
        assert!(rx.reads <= 30, "read {} times in {:?}", rx.reads, window);
    }

    #[test]
    fn test_build_arp_request() {
        let src_ip = Ipv4Addr::new(192, 168, 1, 2);
        let target = Ipv4Addr::new(192, 168, 1, 10);
        let frame = build_arp_request(local_mac(), src_ip, target).unwrap();
        assert_eq!(frame.len(), MIN_FRAME_LEN);

        let eth = EthernetPacket::new(&frame).unwrap();
        assert_eq!(eth.get_destination(), MacAddr::broadcast());
        assert_eq!(eth.get_source(), to_pnet_mac(local_mac()));
        assert_eq!(eth.get_ethertype(), EtherTypes::Arp);

        let arp = ArpPacket::new(eth.payload()).unwrap();
        assert_eq!(arp.get_operation(), ArpOperations::Request);
        assert_eq!(arp.get_hardware_type(), ArpHardwareTypes::Ethernet);
        assert_eq!(arp.get_protocol_type(), EtherTypes::Ipv4);
        assert_eq!(arp.get_sender_proto_addr(), src_ip);
        assert_eq!(arp.get_target_proto_addr(), target);
        assert_eq!(arp.get_target_hw_addr(), MacAddr::zero());
    }

    #[test]
    fn test_parse_reply() {
        let sender = MacAddress::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01);
        let frame = reply_frame(Ipv4Addr::new(192, 168, 1, 10), sender, ctx().local_ip);
        let reply = parse_arp_reply(&frame, &ctx()).unwrap();
        assert_eq!(reply.ip, Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(reply.mac, sender);
    }

    #[test]
    fn test_parse_ignores_requests_and_foreign_replies() {
        let ctx = ctx();
        let sender = MacAddress::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01);

        // Our own request echoed back
        let request = build_arp_request(sender, Ipv4Addr::new(192, 168, 1, 10), ctx.local_ip).unwrap();
        assert!(parse_arp_reply(&request, &ctx).is_none());

        // Reply to some other host
        let foreign = reply_frame(Ipv4Addr::new(192, 168, 1, 10), sender, Ipv4Addr::new(192, 168, 1, 99));
        assert!(parse_arp_reply(&foreign, &ctx).is_none());

        // Sender outside the subnet
        let outside = reply_frame(Ipv4Addr::new(10, 0, 0, 1), sender, ctx.local_ip);
        assert!(parse_arp_reply(&outside, &ctx).is_none());

        // Truncated frame
        assert!(parse_arp_reply(&request[..20], &ctx).is_none());
    }

    #[test]
    fn test_parse_ignores_non_arp() {
        let sender = MacAddress::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01);
        let mut frame = reply_frame(Ipv4Addr::new(192, 168, 1, 10), sender, ctx().local_ip);
        MutableEthernetPacket::new(&mut frame)
            .unwrap()
            .set_ethertype(EtherTypes::Ipv4);
        assert!(parse_arp_reply(&frame, &ctx()).is_none());
    }

    #[test]
    fn test_collect_keeps_first_reply_per_ip_in_arrival_order() {
        let ctx = ctx();
        let first = MacAddress::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02);
        let second = MacAddress::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01);
        let mut rx = ScriptedReceiver::new(vec![
            reply_frame(Ipv4Addr::new(192, 168, 1, 20), first, ctx.local_ip),
            reply_frame(Ipv4Addr::new(192, 168, 1, 10), second, ctx.local_ip),
            reply_frame(Ipv4Addr::new(192, 168, 1, 20), first, ctx.local_ip),
        ]);

        let replies = collect_replies(&mut rx, &ctx, Duration::from_millis(50));
        assert_eq!(
            replies,
            vec![
                ArpReply { ip: Ipv4Addr::new(192, 168, 1, 20), mac: first },
                ArpReply { ip: Ipv4Addr::new(192, 168, 1, 10), mac: second },
            ]
        );
    }

    #[test]
    fn test_collect_with_no_replies_waits_out_window() {
        let mut rx = ScriptedReceiver::new(Vec::new());
        let window = Duration::from_millis(40);
        let started = Instant::now();
        let replies = collect_replies(&mut rx, &ctx(), window);
        assert!(replies.is_empty());
        assert!(started.elapsed() >= window);
    }

    #[test]
    fn test_select_named_interface() {
        let subnet: Subnet = "192.168.1.0/24".parse().unwrap();
        let interfaces = vec![
            interface("lo", FLAG_UP | FLAG_LOOPBACK, None, Some((Ipv4Addr::LOCALHOST, 8))),
            interface(
                "eth0",
                FLAG_UP,
                Some(MacAddr::new(2, 0, 0, 0, 0, 1)),
                Some((Ipv4Addr::new(192, 168, 1, 2), 24)),
            ),
        ];

        let (iface, ctx) = select_interface(&interfaces, Some("eth0"), subnet).unwrap();
        assert_eq!(iface.name, "eth0");
        assert_eq!(ctx.local_ip, Ipv4Addr::new(192, 168, 1, 2));
        assert_eq!(ctx.local_mac, local_mac());

        assert!(matches!(
            select_interface(&interfaces, Some("wlan0"), subnet),
            Err(SweepError::InterfaceNotFound(_))
        ));
        assert!(matches!(
            select_interface(&interfaces, Some("lo"), subnet),
            Err(SweepError::InterfaceUnusable { .. })
        ));
    }

    #[test]
    fn test_select_interface_by_subnet() {
        let subnet: Subnet = "192.168.1.0/24".parse().unwrap();
        let interfaces = vec![
            interface("lo", FLAG_UP | FLAG_LOOPBACK, Some(MacAddr::zero()), Some((Ipv4Addr::LOCALHOST, 8))),
            interface(
                "docker0",
                FLAG_UP,
                Some(MacAddr::new(2, 0, 0, 0, 0, 9)),
                Some((Ipv4Addr::new(172, 17, 0, 1), 16)),
            ),
            interface(
                "eth0",
                FLAG_UP,
                Some(MacAddr::new(2, 0, 0, 0, 0, 1)),
                Some((Ipv4Addr::new(192, 168, 1, 2), 24)),
            ),
        ];

        let (iface, _) = select_interface(&interfaces, None, subnet).unwrap();
        assert_eq!(iface.name, "eth0");

        let other: Subnet = "10.1.0.0/24".parse().unwrap();
        assert!(matches!(
            select_interface(&interfaces, None, other),
            Err(SweepError::NoInterface(_))
        ));
    }
}
