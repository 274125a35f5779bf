//! OUI registry download and one-time vendor database initialization
//!
//! The database is built once at startup, before the server accepts
//! requests, and shared read-only afterwards.

use anyhow::{Context, Result};
use netdash_core::OuiDatabase;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::VendorsConfig;

/// Load the OUI database, downloading the registry first when needed.
///
/// Download and parse failures are logged; the daemon still starts with
/// whatever could be loaded, possibly an empty table.
pub async fn init_vendor_database(config: &VendorsConfig) -> OuiDatabase {
    let path = Path::new(&config.path);

    if config.update_on_start || !path.exists() {
        info!(url = %config.url, path = %path.display(), "Fetching OUI registry");
        match download_registry(&config.url, path).await {
            Ok(bytes) => info!(bytes, "OUI registry downloaded"),
            Err(e) => warn!(error = %e, "Failed to download OUI registry"),
        }
    }

    if !path.exists() {
        warn!(path = %path.display(), "No OUI database available, vendors will be reported as Unknown");
        return OuiDatabase::empty();
    }

    match OuiDatabase::from_file(path) {
        Ok(db) => {
            info!(path = %path.display(), count = db.len(), "Loaded OUI database");
            db
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load OUI database");
            OuiDatabase::empty()
        }
    }
}

/// Fetch the registry and replace the local file, returning its size
async fn download_registry(url: &str, path: &Path) -> Result<usize> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .context("OUI registry request failed")?
        .error_for_status()
        .context("OUI registry returned an error status")?;

    let content = response.bytes().await.context("Failed to read OUI registry body")?;
    if OuiDatabase::parse(&String::from_utf8_lossy(&content)).is_empty() {
        anyhow::bail!("downloaded registry contains no OUI records");
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(content.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netdash_core::{MacAddress, VendorLookup};

    #[tokio::test]
    async fn test_loads_existing_file_without_download() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("oui.txt");
        std::fs::write(&path, "AA-BB-CC   (hex)\t\tAcme Corp\n").unwrap();

        let config = VendorsConfig {
            path: path.to_string_lossy().to_string(),
            url: "http://127.0.0.1:9/unreachable".to_string(),
            update_on_start: false,
        };

        let db = init_vendor_database(&config).await;
        let mac: MacAddress = "aa:bb:cc:00:00:01".parse().unwrap();
        assert_eq!(db.lookup(&mac).unwrap(), "Acme Corp");
    }

    #[tokio::test]
    async fn test_failed_download_keeps_existing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("oui.txt");
        std::fs::write(&path, "AABBCC:Acme Corp\n").unwrap();

        let config = VendorsConfig {
            path: path.to_string_lossy().to_string(),
            url: "http://127.0.0.1:9/unreachable".to_string(),
            update_on_start: true,
        };

        let db = init_vendor_database(&config).await;
        assert_eq!(db.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_and_failed_download_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = VendorsConfig {
            path: dir.path().join("oui.txt").to_string_lossy().to_string(),
            url: "http://127.0.0.1:9/unreachable".to_string(),
            update_on_start: false,
        };

        let db = init_vendor_database(&config).await;
        assert!(db.is_empty());
    }
}
