//! Per-provider request counters and running latency.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct PerformanceRecord {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    average_response_time_ms: f64,
    last_success_time: Option<SystemTime>,
    last_failure_time: Option<SystemTime>,
}

/// Serializable copy of a [`PerformanceRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub average_response_time_ms: f64,
    /// Unix seconds.
    pub last_success_time: Option<f64>,
    /// Unix seconds.
    pub last_failure_time: Option<f64>,
}

impl PerformanceRecord {
    /// Count an attempt before it is made.
    pub fn record_attempt(&mut self) {
        self.total_requests += 1;
    }

    /// Fold a successful latency into the running average.
    pub fn record_success(&mut self, latency: Duration) {
        let n = self.successful_requests as f64;
        let latency_ms = latency.as_secs_f64() * 1000.0;
        self.average_response_time_ms = (self.average_response_time_ms * n + latency_ms) / (n + 1.0);
        self.successful_requests += 1;
        self.last_success_time = Some(SystemTime::now());
    }

    pub fn record_failure(&mut self) {
        self.failed_requests += 1;
        self.last_failure_time = Some(SystemTime::now());
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub fn average_response_time_ms(&self) -> f64 {
        self.average_response_time_ms
    }

    /// Fraction of finished attempts that succeeded; 1.0 before any attempt finishes.
    pub fn success_rate(&self) -> f64 {
        let finished = self.successful_requests + self.failed_requests;
        if finished == 0 {
            1.0
        } else {
            self.successful_requests as f64 / finished as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        PerformanceSnapshot {
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            success_rate: self.success_rate(),
            average_response_time_ms: self.average_response_time_ms,
            last_success_time: self.last_success_time.map(unix_secs),
            last_failure_time: self.last_failure_time.map(unix_secs),
        }
    }
}

fn unix_secs(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_average_is_arithmetic_mean() {
        let mut record = PerformanceRecord::default();
        let latencies = [120u64, 80, 200, 40, 60];
        for ms in latencies {
            record.record_attempt();
            record.record_success(Duration::from_millis(ms));
        }

        let mean = latencies.iter().sum::<u64>() as f64 / latencies.len() as f64;
        assert!((record.average_response_time_ms() - mean).abs() < 1e-9);
        assert_eq!(record.snapshot().successful_requests, 5);
    }

    #[test]
    fn test_failures_do_not_move_average() {
        let mut record = PerformanceRecord::default();
        record.record_attempt();
        record.record_success(Duration::from_millis(100));
        record.record_attempt();
        record.record_failure();

        let snap = record.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.failed_requests, 1);
        assert_eq!(snap.average_response_time_ms, 100.0);
        assert_eq!(snap.success_rate, 0.5);
        assert!(snap.last_failure_time.is_some());
    }

    #[test]
    fn test_reset() {
        let mut record = PerformanceRecord::default();
        record.record_attempt();
        record.record_failure();
        record.reset();

        let snap = record.snapshot();
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.success_rate, 1.0);
        assert!(snap.last_failure_time.is_none());
    }
}
