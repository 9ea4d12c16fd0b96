//! Heartbeat payloads and cadence.
//!
//! This module provides:
//! - [`Heartbeat`] / [`SystemInfo`], the liveness report sent to the central API
//! - [`SystemProbe`] for filling in host details and resource usage
//! - [`HeartbeatSchedule`] for deciding when the next heartbeat is due

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};
use tokio::time::Instant;

/// Static description of the host running the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    /// Operating system family (e.g. "Linux").
    pub platform: String,
    /// Kernel release.
    pub platform_release: String,
    /// Long OS version string.
    pub platform_version: String,
    /// CPU architecture (e.g. "x86_64").
    pub architecture: String,
    /// CPU brand string.
    pub processor: String,
    /// Agent runtime identifier.
    pub runtime_version: String,
}

/// Liveness report sent to the central API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub agent_version: String,
    pub hostname: String,
    pub system_info: SystemInfo,
    /// Global CPU usage in percent.
    pub cpu_usage: f64,
    /// Used memory in percent of total.
    pub memory_usage: f64,
    /// Used space on the root (or first) disk in percent.
    pub disk_usage: f64,
    /// Seconds since the agent started.
    pub uptime_seconds: u64,
}

/// Collects host details and resource usage for heartbeats.
///
/// CPU usage is computed between refreshes, so the first heartbeat of a
/// run reports whatever sysinfo measured since construction.
pub struct SystemProbe {
    system: System,
    disks: Disks,
    hostname: String,
}

impl SystemProbe {
    pub fn new() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            system: System::new_all(),
            disks: Disks::new_with_refreshed_list(),
            hostname,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Static host description.
    pub fn system_info(&self) -> SystemInfo {
        let processor = self
            .system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .unwrap_or_default();

        SystemInfo {
            hostname: self.hostname.clone(),
            platform: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            platform_release: System::kernel_version().unwrap_or_default(),
            platform_version: System::long_os_version().unwrap_or_default(),
            architecture: std::env::consts::ARCH.to_string(),
            processor,
            runtime_version: format!("rust/{}", std::env::consts::OS),
        }
    }

    /// Refresh usage figures and build a heartbeat.
    pub fn heartbeat(&mut self, agent_version: &str, uptime: Duration) -> Heartbeat {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        self.disks.refresh(true);

        let total_memory = self.system.total_memory();
        let memory_usage = percent(self.system.used_memory(), total_memory);

        let disk_usage = self
            .disks
            .list()
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .or_else(|| self.disks.list().first())
            .map(|d| {
                let total = d.total_space();
                percent(total.saturating_sub(d.available_space()), total)
            })
            .unwrap_or(0.0);

        Heartbeat {
            agent_version: agent_version.to_string(),
            hostname: self.hostname.clone(),
            system_info: self.system_info(),
            cpu_usage: round2(self.system.global_cpu_usage() as f64),
            memory_usage,
            disk_usage,
            uptime_seconds: uptime.as_secs(),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(used as f64 * 100.0 / total as f64)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Tracks when the last heartbeat was accepted.
///
/// A heartbeat is due when none has succeeded yet, or when strictly more
/// than `interval` has elapsed since the last success. Failures do not
/// move the clock.
#[derive(Debug, Clone)]
pub struct HeartbeatSchedule {
    interval: Duration,
    last_success: Option<Instant>,
}

impl HeartbeatSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_success: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_success {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        }
    }

    pub fn record_success(&mut self, at: Instant) {
        self.last_success = Some(at);
    }
}
