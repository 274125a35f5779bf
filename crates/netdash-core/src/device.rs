//! Device types for hosts found by a discovery sweep

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::mac::MacAddress;

/// Vendor placeholder used when the OUI prefix cannot be resolved
pub const UNKNOWN_VENDOR: &str = "Unknown";

/// A host that answered an ARP request during one discovery sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// IPv4 address the reply was sent from
    pub ip: Ipv4Addr,
    /// Hardware address of the replying interface
    pub mac: MacAddress,
    /// Manufacturer name, or [`UNKNOWN_VENDOR`]
    pub vendor: String,
}

impl DiscoveredDevice {
    pub fn new(ip: Ipv4Addr, mac: MacAddress, vendor: impl Into<String>) -> Self {
        Self {
            ip,
            mac,
            vendor: vendor.into(),
        }
    }

    /// Create a device whose vendor could not be resolved
    pub fn unknown_vendor(ip: Ipv4Addr, mac: MacAddress) -> Self {
        Self::new(ip, mac, UNKNOWN_VENDOR)
    }

    pub fn has_known_vendor(&self) -> bool {
        self.vendor != UNKNOWN_VENDOR
    }
}
