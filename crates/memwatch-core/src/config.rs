use std::time::Duration;

/// Monitoring configuration supplied by the embedding application.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Alert when allocated bytes exceed this fraction of system bytes.
    /// `<= 0` disables alerting. Default: 0.8.
    pub alert_threshold: f64,
    /// Sampling interval of the monitoring loop. Default: 30s.
    pub monitor_interval: Duration,
    /// Interval of the persistence loop. Default: 60s.
    pub log_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            alert_threshold: 0.8,
            monitor_interval: Duration::from_secs(30),
            log_interval: Duration::from_secs(60),
        }
    }
}

impl MonitorConfig {
    /// Creates a new MonitorConfig with custom values.
    pub fn new(alert_threshold: f64, monitor_interval: Duration, log_interval: Duration) -> Self {
        Self {
            alert_threshold,
            monitor_interval,
            log_interval,
        }
    }
}
