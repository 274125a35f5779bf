//! Application state management

use anyhow::{Context, Result};
use netdash_core::VendorLookup;
use netdash_discovery::{ArpSweeper, DiscoveryScanner, PnetArpSweeper};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::vendor_fetch::init_vendor_database;

/// Shared application state, built once before the server starts
pub struct AppState {
    /// Discovery scanner (sweeper + vendor database)
    pub scanner: DiscoveryScanner,
    /// HTTP client for the speed test
    pub http: reqwest::Client,
    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Create application state. The vendor database is downloaded (if
    /// needed) and loaded here, once, before any request is served.
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let vendors = Arc::new(init_vendor_database(&config.vendors).await);
        info!(vendors = vendors.len(), "Vendor database ready");

        let sweeper = Arc::new(PnetArpSweeper::new(config.to_scanner_config()?.interface));
        Self::with_parts(config, sweeper, vendors)
    }

    /// Assemble state from explicit collaborators
    pub fn with_parts(
        config: Config,
        sweeper: Arc<dyn ArpSweeper>,
        vendors: Arc<dyn VendorLookup>,
    ) -> Result<Arc<Self>> {
        let scanner = DiscoveryScanner::new(config.to_scanner_config()?, sweeper, vendors);
        let http = reqwest::Client::builder()
            .user_agent(concat!("netdash/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Arc::new(Self {
            scanner,
            http,
            config,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netdash_core::OuiDatabase;

    #[test]
    fn test_scanner_uses_configured_interface() {
        let mut config = Config::default();
        config.discovery.interface = Some("eth1".to_string());
        config.discovery.timeout_ms = 750;

        let sweeper = Arc::new(PnetArpSweeper::new(config.to_scanner_config().unwrap().interface));
        let state = AppState::with_parts(config, sweeper, Arc::new(OuiDatabase::empty())).unwrap();

        let scan = state.scanner.config();
        assert_eq!(scan.interface.as_deref(), Some("eth1"));
        assert_eq!(scan.subnet.to_string(), "192.168.1.0/24");
        assert_eq!(scan.timeout, std::time::Duration::from_millis(750));
    }

    #[test]
    fn test_rejects_invalid_subnet() {
        let mut config = Config::default();
        config.discovery.prefix_len = 40;
        let sweeper = Arc::new(PnetArpSweeper::new(None));
        assert!(AppState::with_parts(config, sweeper, Arc::new(OuiDatabase::empty())).is_err());
    }
}
