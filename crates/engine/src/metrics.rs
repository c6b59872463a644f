use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use pool::RuntimeCounts;
use serde::Serialize;

/// Process-wide request counters.
#[derive(Debug)]
pub struct ServerMetrics {
    started_at: Instant,
    requests: AtomicU64,
    errors: AtomicU64,
    total_response_ms: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    #[serde(rename = "activitiesLoaded")]
    pub activities_loaded: usize,
    #[serde(rename = "requestCount")]
    pub request_count: u64,
    #[serde(rename = "errorCount")]
    pub error_count: u64,
    #[serde(rename = "averageResponseTime")]
    pub average_response_time: u64,
    /// Seconds.
    pub uptime: u64,
    pub uptime_ms: u64,
    pub uptime_formatted: String,
    pub runtimes: RuntimeCounts,
    pub timestamp: String,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            total_response_ms: AtomicU64::new(0),
        }
    }

    /// Count a finished request. Server errors also count as errors.
    pub fn record_request(&self, duration: Duration, server_error: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        if server_error {
            self.record_error();
        }
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn snapshot(&self, activities_loaded: usize, runtimes: RuntimeCounts) -> MetricsSnapshot {
        let uptime = self.uptime();
        let request_count = self.request_count();
        let average_response_time = match request_count {
            0 => 0,
            n => self.total_response_ms.load(Ordering::Relaxed) / n,
        };
        MetricsSnapshot {
            activities_loaded,
            request_count,
            error_count: self.error_count(),
            average_response_time,
            uptime: uptime.as_secs(),
            uptime_ms: uptime.as_millis() as u64,
            uptime_formatted: format_duration(uptime),
            runtimes,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// `1h 2m`, `3m 4s` or `5s`.
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_largest_two_units() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(184)), "3m 4s");
        assert_eq!(format_duration(Duration::from_secs(3_720)), "1h 2m");
        assert_eq!(format_duration(Duration::from_millis(999)), "0s");
    }

    #[test]
    fn server_errors_count_as_errors() {
        let metrics = ServerMetrics::new();
        metrics.record_request(Duration::from_millis(10), false);
        metrics.record_request(Duration::from_millis(30), true);
        metrics.record_error();

        let snapshot = metrics.snapshot(3, RuntimeCounts::default());
        assert_eq!(snapshot.request_count, 2);
        assert_eq!(snapshot.error_count, 2);
        assert_eq!(snapshot.average_response_time, 20);
        assert_eq!(snapshot.activities_loaded, 3);

        let json = serde_json::to_value(&snapshot).expect("json");
        assert_eq!(json["activitiesLoaded"], 3);
        assert_eq!(json["requestCount"], 2);
        assert!(json["uptime_formatted"].is_string());
        assert!(json["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
    }
}
