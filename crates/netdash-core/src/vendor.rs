//! OUI vendor database - maps MAC address prefixes to manufacturer names
//!
//! The table is read from the IEEE `oui.txt` registry export, where each
//! assignment appears as
//!
//! ```text
//! 28-6F-B9   (hex)		Nokia Shanghai Bell Co., Ltd.
//! ```
//!
//! Compact cache lines of the form `286FB9:Nokia Shanghai Bell Co., Ltd.`
//! are accepted as well. The database is loaded once and read-only afterwards.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::mac::MacAddress;

#[derive(Error, Debug)]
pub enum OuiError {
    #[error("Failed to read OUI database: {0}")]
    IoError(#[from] std::io::Error),
}

/// Why a vendor lookup produced no name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VendorError {
    #[error("vendor prefix {0} not in database")]
    NotFound(String),
    #[error("vendor database unavailable: {0}")]
    Database(String),
}

/// Resolves a hardware address to its registered manufacturer
pub trait VendorLookup: Send + Sync {
    fn lookup(&self, mac: &MacAddress) -> Result<String, VendorError>;
}

/// In-memory OUI table
#[derive(Debug, Clone, Default)]
pub struct OuiDatabase {
    entries: HashMap<[u8; 3], String>,
}

impl OuiDatabase {
    /// Create an empty database (every lookup fails)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from an `oui.txt` file
    pub fn from_file(path: &Path) -> Result<Self, OuiError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Parse registry text, skipping lines that are not assignments
    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();
        for line in content.lines() {
            if let Some((prefix, vendor)) = parse_line(line) {
                entries.entry(prefix).or_insert(vendor);
            }
        }
        debug!(count = entries.len(), "Parsed OUI records");
        Self { entries }
    }

    pub fn insert(&mut self, prefix: [u8; 3], vendor: impl Into<String>) {
        self.entries.insert(prefix, vendor.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl VendorLookup for OuiDatabase {
    fn lookup(&self, mac: &MacAddress) -> Result<String, VendorError> {
        if self.entries.is_empty() {
            return Err(VendorError::Database("no OUI records loaded".to_string()));
        }
        let oui = mac.oui();
        self.entries
            .get(&oui)
            .cloned()
            .ok_or_else(|| VendorError::NotFound(format_prefix(oui)))
    }
}

fn parse_line(line: &str) -> Option<([u8; 3], String)> {
    let (prefix, vendor) = if let Some((prefix, rest)) = line.split_once("(hex)") {
        (prefix.trim(), rest.trim())
    } else {
        let (prefix, rest) = line.split_once(':')?;
        (prefix.trim(), rest.trim())
    };

    if vendor.is_empty() {
        return None;
    }

    let hex: String = prefix.chars().filter(|c| *c != '-').collect();
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let mut oui = [0u8; 3];
    for (i, byte) in oui.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some((oui, vendor.to_string()))
}

fn format_prefix(oui: [u8; 3]) -> String {
    format!("{:02X}:{:02X}:{:02X}", oui[0], oui[1], oui[2])
}
