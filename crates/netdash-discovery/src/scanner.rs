//! Discovery scanner that combines the ARP sweep with vendor lookup

use netdash_core::{DiscoveredDevice, VendorError, VendorLookup};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::arp::{ArpReply, SweepError};
use crate::subnet::Subnet;

/// Default reply collection window
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Sends an address-resolution broadcast and gathers the replies.
///
/// Implementations block for up to `timeout`.
pub trait ArpSweeper: Send + Sync {
    fn sweep(&self, subnet: Subnet, timeout: Duration) -> Result<Vec<ArpReply>, SweepError>;
}

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Subnet to sweep (e.g., 192.168.1.0/24)
    pub subnet: Subnet,
    /// How long to wait for replies after the requests are sent
    pub timeout: Duration,
    /// Interface to send on; picked from the subnet when unset
    pub interface: Option<String>,
}

/// Discovery scanner service
pub struct DiscoveryScanner {
    config: ScannerConfig,
    sweeper: Arc<dyn ArpSweeper>,
    vendors: Arc<dyn VendorLookup>,
}

impl DiscoveryScanner {
    /// Create a scanner with an explicit sweeper
    pub fn new(
        config: ScannerConfig,
        sweeper: Arc<dyn ArpSweeper>,
        vendors: Arc<dyn VendorLookup>,
    ) -> Self {
        Self {
            config,
            sweeper,
            vendors,
        }
    }

    /// Settings every scan runs with
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Run a single discovery sweep and resolve vendors for every reply.
    ///
    /// Only a failed sweep is an error; vendor misses degrade to "Unknown".
    pub async fn scan(&self) -> Result<Vec<DiscoveredDevice>, SweepError> {
        let subnet = self.config.subnet;
        let timeout = self.config.timeout;
        let sweeper = self.sweeper.clone();

        info!(
            subnet = %subnet,
            hosts = subnet.host_count(),
            timeout_ms = timeout.as_millis() as u64,
            "Starting discovery scan"
        );

        let replies = tokio::task::spawn_blocking(move || sweeper.sweep(subnet, timeout))
            .await
            .map_err(|e| SweepError::Join(e.to_string()))??;

        let devices = self.resolve(&replies);
        info!(
            found = devices.len(),
            known_vendors = devices.iter().filter(|d| d.has_known_vendor()).count(),
            "Scan complete"
        );
        Ok(devices)
    }

    /// Attach vendor names to sweep replies, preserving reply order
    pub fn resolve(&self, replies: &[ArpReply]) -> Vec<DiscoveredDevice> {
        replies
            .iter()
            .map(|reply| match self.vendors.lookup(&reply.mac) {
                Ok(vendor) => DiscoveredDevice::new(reply.ip, reply.mac, vendor),
                Err(VendorError::NotFound(prefix)) => {
                    debug!(ip = %reply.ip, mac = %reply.mac, prefix = %prefix, "Vendor not in database");
                    DiscoveredDevice::unknown_vendor(reply.ip, reply.mac)
                }
                Err(e) => {
                    warn!(ip = %reply.ip, mac = %reply.mac, error = %e, "Vendor lookup failed");
                    DiscoveredDevice::unknown_vendor(reply.ip, reply.mac)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netdash_core::{MacAddress, OuiDatabase};
    use std::collections::HashSet;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    struct FixedSweeper {
        replies: Vec<ArpReply>,
        calls: Mutex<Vec<(Subnet, Duration)>>,
    }

    impl FixedSweeper {
        fn new(replies: Vec<ArpReply>) -> Self {
            Self {
                replies,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ArpSweeper for FixedSweeper {
        fn sweep(&self, subnet: Subnet, timeout: Duration) -> Result<Vec<ArpReply>, SweepError> {
            self.calls.lock().unwrap().push((subnet, timeout));
            Ok(self.replies.clone())
        }
    }

    struct DeniedSweeper;

    impl ArpSweeper for DeniedSweeper {
        fn sweep(&self, _subnet: Subnet, _timeout: Duration) -> Result<Vec<ArpReply>, SweepError> {
            Err(SweepError::Channel {
                interface: "eth0".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Operation not permitted"),
            })
        }
    }

    fn config() -> ScannerConfig {
        ScannerConfig {
            subnet: "192.168.1.0/24".parse().unwrap(),
            timeout: DEFAULT_TIMEOUT,
            interface: None,
        }
    }

    fn acme_db() -> Arc<OuiDatabase> {
        let mut db = OuiDatabase::empty();
        db.insert([0xaa, 0xbb, 0xcc], "Acme Corp");
        Arc::new(db)
    }

    fn reply(last: u8, mac: &str) -> ArpReply {
        ArpReply {
            ip: Ipv4Addr::new(192, 168, 1, last),
            mac: mac.parse::<MacAddress>().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_scan_resolves_known_and_unknown_vendors() {
        let sweeper = Arc::new(FixedSweeper::new(vec![
            reply(10, "AA:BB:CC:DD:EE:01"),
            reply(20, "AA:BB:CD:DD:EE:02"),
        ]));
        let scanner = DiscoveryScanner::new(config(), sweeper.clone(), acme_db());

        let devices = scanner.scan().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].ip, Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(devices[0].vendor, "Acme Corp");
        assert_eq!(devices[1].ip, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(devices[1].vendor, "Unknown");

        assert_eq!(scanner.config().subnet.host_count(), 254);

        let calls = sweeper.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.to_string(), "192.168.1.0/24");
        assert_eq!(calls[0].1, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_empty_database_degrades_to_unknown() {
        let sweeper = Arc::new(FixedSweeper::new(vec![reply(10, "AA:BB:CC:DD:EE:01")]));
        let scanner = DiscoveryScanner::new(config(), sweeper, Arc::new(OuiDatabase::empty()));

        let devices = scanner.scan().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].vendor, "Unknown");
    }

    #[tokio::test]
    async fn test_no_replies_is_empty_success() {
        let scanner = DiscoveryScanner::new(config(), Arc::new(FixedSweeper::new(Vec::new())), acme_db());
        let devices = scanner.scan().await.unwrap();
        assert!(devices.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_failure_propagates() {
        let scanner = DiscoveryScanner::new(config(), Arc::new(DeniedSweeper), acme_db());
        let err = scanner.scan().await.unwrap_err();
        assert!(matches!(err, SweepError::Channel { .. }));
        assert!(err.to_string().contains("Operation not permitted"));
    }

    #[tokio::test]
    async fn test_repeated_scans_yield_same_pairs() {
        let sweeper = Arc::new(FixedSweeper::new(vec![
            reply(10, "AA:BB:CC:DD:EE:01"),
            reply(20, "AA:BB:CD:DD:EE:02"),
        ]));
        let scanner = DiscoveryScanner::new(config(), sweeper, acme_db());

        let pairs = |devices: Vec<DiscoveredDevice>| -> HashSet<(Ipv4Addr, MacAddress)> {
            devices.into_iter().map(|d| (d.ip, d.mac)).collect()
        };
        let first = pairs(scanner.scan().await.unwrap());
        let second = pairs(scanner.scan().await.unwrap());
        assert_eq!(first, second);
    }
}
