//! Host metrics for the dashboard status bar

use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use sysinfo::{CpuExt, System, SystemExt};

const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";
const CPU_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SystemStats {
    /// CPU utilisation in percent
    pub cpu: f32,
    /// Memory in use, percent of total
    pub ram: f32,
    /// SoC temperature such as "48.3°C", or "N/A"
    pub temp: String,
}

/// Sample CPU over one second and read memory and temperature
pub async fn collect() -> SystemStats {
    let mut sys = System::new();
    sys.refresh_cpu();
    tokio::time::sleep(CPU_SAMPLE_INTERVAL).await;
    sys.refresh_cpu();
    sys.refresh_memory();

    SystemStats {
        cpu: round1(sys.global_cpu_info().cpu_usage()),
        ram: round1(memory_percent(sys.used_memory(), sys.total_memory())),
        temp: read_temperature(Path::new(THERMAL_ZONE)),
    }
}

fn memory_percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 100.0) as f32
}

fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Read a sysfs thermal zone (millidegrees Celsius)
fn read_temperature(path: &Path) -> String {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .map(format_millidegrees)
        .unwrap_or_else(|| "N/A".to_string())
}

fn format_millidegrees(milli: i64) -> String {
    format!("{:.1}°C", milli as f64 / 1000.0)
}
