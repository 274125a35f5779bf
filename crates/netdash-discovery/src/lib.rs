//! netdash Discovery - Local network host discovery
//!
//! This crate provides:
//! - ARP sweeping of a subnet over a raw Ethernet channel
//! - Subnet arithmetic for target enumeration
//! - The discovery scanner that attaches vendor names to replies

pub mod arp;
pub mod scanner;
pub mod subnet;

pub use arp::{ArpReply, PnetArpSweeper, SweepError};
pub use scanner::{ArpSweeper, DiscoveryScanner, ScannerConfig, DEFAULT_TIMEOUT};
pub use subnet::{Subnet, SubnetError};
