//! HTTP throughput test against configurable download/upload endpoints

use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::SpeedtestConfig;

const LATENCY_SAMPLES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct SpeedResult {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
}

impl SpeedResult {
    /// Three-line summary shown in the dashboard output box
    pub fn summary(&self) -> String {
        format!(
            "Download: {:.2} Mbps\nUpload: {:.2} Mbps\nPing: {:.2} ms",
            self.download_mbps, self.upload_mbps, self.ping_ms
        )
    }
}

/// Measure latency, then download and upload throughput
pub async fn run(client: &reqwest::Client, config: &SpeedtestConfig) -> Result<SpeedResult> {
    let timeout = Duration::from_secs(config.timeout_secs);

    let ping_ms = latency(client, &config.latency_url, timeout).await?;
    debug!(ping_ms, "Latency measured");

    let started = Instant::now();
    let body = client
        .get(&config.download_url)
        .timeout(timeout)
        .send()
        .await
        .context("download request failed")?
        .error_for_status()?
        .bytes()
        .await
        .context("download interrupted")?;
    let download_mbps = megabits_per_second(body.len(), started.elapsed());

    let payload = vec![0u8; config.upload_bytes];
    let started = Instant::now();
    client
        .post(&config.upload_url)
        .timeout(timeout)
        .body(payload)
        .send()
        .await
        .context("upload request failed")?
        .error_for_status()?;
    let upload_mbps = megabits_per_second(config.upload_bytes, started.elapsed());

    let result = SpeedResult {
        download_mbps,
        upload_mbps,
        ping_ms,
    };
    info!(
        download_mbps = result.download_mbps,
        upload_mbps = result.upload_mbps,
        ping_ms = result.ping_ms,
        "Speed test complete"
    );
    Ok(result)
}

/// Best round trip of a few tiny requests, in milliseconds
async fn latency(client: &reqwest::Client, url: &str, timeout: Duration) -> Result<f64> {
    let mut best = Duration::MAX;
    for _ in 0..LATENCY_SAMPLES {
        let started = Instant::now();
        client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .context("latency request failed")?
            .error_for_status()?
            .bytes()
            .await?;
        best = best.min(started.elapsed());
    }
    Ok(best.as_secs_f64() * 1000.0)
}

fn megabits_per_second(bytes: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    bytes as f64 * 8.0 / secs / 1_000_000.0
}
