//! IPv4 subnet arithmetic for sweep target enumeration

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Smallest prefix accepted for a sweep (at most 65534 targets)
pub const MIN_PREFIX_LEN: u8 = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubnetError {
    #[error("invalid prefix length /{0}")]
    InvalidPrefix(u8),
    #[error("subnet /{0} is too large to sweep (minimum prefix is /{MIN_PREFIX_LEN})")]
    TooLarge(u8),
    #[error("invalid CIDR '{0}'")]
    Parse(String),
}

/// An IPv4 network in CIDR form, normalized to its network address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Subnet {
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self, SubnetError> {
        if prefix_len > 32 {
            return Err(SubnetError::InvalidPrefix(prefix_len));
        }
        if prefix_len < MIN_PREFIX_LEN {
            return Err(SubnetError::TooLarge(prefix_len));
        }
        let network = Ipv4Addr::from(u32::from(addr) & mask(prefix_len));
        Ok(Self {
            network,
            prefix_len,
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !mask(self.prefix_len))
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & mask(self.prefix_len) == u32::from(self.network)
    }

    /// Host addresses to probe. The network and broadcast addresses are
    /// skipped except for /31 and /32, where every address is a host.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> {
        let network = u32::from(self.network);
        let broadcast = u32::from(self.broadcast());
        let (first, last) = if self.prefix_len >= 31 {
            (network, broadcast)
        } else {
            (network + 1, broadcast - 1)
        };
        (first..=last).map(Ipv4Addr::from)
    }

    /// Number of addresses `hosts` yields
    pub fn host_count(&self) -> usize {
        let span = u32::from(self.broadcast()) - u32::from(self.network);
        if self.prefix_len >= 31 {
            span as usize + 1
        } else {
            span as usize - 1
        }
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl FromStr for Subnet {
    type Err = SubnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| SubnetError::Parse(s.to_string()))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| SubnetError::Parse(s.to_string()))?;
        let prefix_len: u8 = prefix
            .parse()
            .map_err(|_| SubnetError::Parse(s.to_string()))?;
        Self::new(addr, prefix_len)
    }
}

fn mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        !0u32 << (32 - prefix_len)
    }
}
