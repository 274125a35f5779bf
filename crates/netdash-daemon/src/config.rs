//! Configuration loading and validation

use anyhow::{Context, Result};
use netdash_discovery::{ScannerConfig, Subnet};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub vendors: VendorsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub speedtest: SpeedtestConfig,
    #[serde(default)]
    pub wol: WolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for web server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory holding the dashboard frontend
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    /// TLS configuration (optional - enables HTTPS when present)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: default_static_dir(),
            tls: None,
        }
    }
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM format)
    pub cert: String,
    /// Path to private key file (PEM format)
    pub key: String,
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_static_dir() -> String {
    "web".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Subnet to sweep
    #[serde(default = "default_subnet")]
    pub subnet: Ipv4Addr,
    /// Subnet prefix length
    #[serde(default = "default_prefix")]
    pub prefix_len: u8,
    /// Reply collection window in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Interface to sweep from (auto-selected when unset)
    #[serde(default)]
    pub interface: Option<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            subnet: default_subnet(),
            prefix_len: default_prefix(),
            timeout_ms: default_timeout_ms(),
            interface: None,
        }
    }
}

fn default_subnet() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 1, 0)
}

fn default_prefix() -> u8 {
    24
}

fn default_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorsConfig {
    /// Local OUI database file
    #[serde(default = "default_oui_path")]
    pub path: String,
    /// Where to download the OUI registry from
    #[serde(default = "default_oui_url")]
    pub url: String,
    /// Re-download the registry at startup even if the file exists
    #[serde(default)]
    pub update_on_start: bool,
}

impl Default for VendorsConfig {
    fn default() -> Self {
        Self {
            path: default_oui_path(),
            url: default_oui_url(),
            update_on_start: false,
        }
    }
}

fn default_oui_path() -> String {
    "oui.txt".to_string()
}

fn default_oui_url() -> String {
    "https://standards-oui.ieee.org/oui/oui.txt".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ping_host")]
    pub default_ping_host: String,
    #[serde(default = "default_nmap_host")]
    pub default_nmap_host: String,
    /// Echo requests per ping
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default_ping_host: default_ping_host(),
            default_nmap_host: default_nmap_host(),
            ping_count: default_ping_count(),
        }
    }
}

fn default_ping_host() -> String {
    "8.8.8.8".to_string()
}

fn default_nmap_host() -> String {
    "127.0.0.1".to_string()
}

fn default_ping_count() -> u32 {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedtestConfig {
    /// Small request used to measure round-trip latency
    #[serde(default = "default_latency_url")]
    pub latency_url: String,
    /// Download endpoint; the body is read and discarded
    #[serde(default = "default_download_url")]
    pub download_url: String,
    /// Upload endpoint; receives a POST of `upload_bytes` zero bytes
    #[serde(default = "default_upload_url")]
    pub upload_url: String,
    #[serde(default = "default_upload_bytes")]
    pub upload_bytes: usize,
    #[serde(default = "default_speedtest_timeout")]
    pub timeout_secs: u64,
}

impl Default for SpeedtestConfig {
    fn default() -> Self {
        Self {
            latency_url: default_latency_url(),
            download_url: default_download_url(),
            upload_url: default_upload_url(),
            upload_bytes: default_upload_bytes(),
            timeout_secs: default_speedtest_timeout(),
        }
    }
}

fn default_latency_url() -> String {
    "https://speed.cloudflare.com/__down?bytes=0".to_string()
}

fn default_download_url() -> String {
    "https://speed.cloudflare.com/__down?bytes=25000000".to_string()
}

fn default_upload_url() -> String {
    "https://speed.cloudflare.com/__up".to_string()
}

fn default_upload_bytes() -> usize {
    10_000_000
}

fn default_speedtest_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WolConfig {
    /// Destination address for magic packets
    #[serde(default = "default_wol_broadcast")]
    pub broadcast: Ipv4Addr,
    #[serde(default = "default_wol_port")]
    pub port: u16,
}

impl Default for WolConfig {
    fn default() -> Self {
        Self {
            broadcast: default_wol_broadcast(),
            port: default_wol_port(),
        }
    }
}

fn default_wol_broadcast() -> Ipv4Addr {
    Ipv4Addr::BROADCAST
}

fn default_wol_port() -> u16 {
    9
}

impl Config {
    /// Validated sweep subnet
    pub fn subnet(&self) -> Result<Subnet> {
        Subnet::new(self.discovery.subnet, self.discovery.prefix_len).with_context(|| {
            format!(
                "invalid discovery subnet {}/{}",
                self.discovery.subnet, self.discovery.prefix_len
            )
        })
    }

    /// Convert to ScannerConfig
    pub fn to_scanner_config(&self) -> Result<ScannerConfig> {
        Ok(ScannerConfig {
            subnet: self.subnet()?,
            timeout: Duration::from_millis(self.discovery.timeout_ms),
            interface: self.discovery.interface.clone(),
        })
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        config
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Config::default()
    };

    config.subnet()?;
    Ok(config)
}
