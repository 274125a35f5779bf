//! netdash Core - Shared types for the home-network dashboard
//!
//! This crate provides:
//! - `MacAddress` parsing and formatting
//! - `DiscoveredDevice`, the per-host result of a discovery sweep
//! - The OUI vendor database and the `VendorLookup` seam

pub mod device;
pub mod mac;
pub mod vendor;

pub use device::{DiscoveredDevice, UNKNOWN_VENDOR};
pub use mac::{MacAddress, MacParseError};
pub use vendor::{OuiDatabase, OuiError, VendorError, VendorLookup};
