//! Metrics collection for evaluator observability
//!
//! Recording is lock-free: counters and latency histogram buckets are
//! atomics, and percentiles are derived from the buckets only when a
//! snapshot or export is requested.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Upper bounds of the latency histogram buckets, in microseconds
const LATENCY_BUCKETS_US: [u64; 14] = [
    50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 25_000, 50_000, 100_000, 250_000, 500_000,
    1_000_000,
];

/// Evaluator metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Total number of completed checks
    pub total_checks: u64,

    pub allowed_decisions: u64,

    pub denied_decisions: u64,

    /// Checks that ended in an error (unknown permission, lookup failure, store failure)
    pub error_count: u64,

    /// Latency percentiles, as the upper bound of the bucket holding the quantile
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p99_ms: f64,

    pub avg_latency_ms: f64,
}

impl EngineMetrics {
    /// Fraction of completed checks that allowed
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }
}

/// Fixed-bucket latency histogram
#[derive(Debug)]
struct LatencyHistogram {
    /// One counter per bound plus the overflow bucket
    buckets: [AtomicU64; LATENCY_BUCKETS_US.len() + 1],
    sum_us: AtomicU64,
    count: AtomicU64,
    max_us: AtomicU64,
}

impl LatencyHistogram {
    fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_us: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max_us: AtomicU64::new(0),
        }
    }

    fn observe(&self, latency: Duration) {
        let us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        let index = LATENCY_BUCKETS_US
            .iter()
            .position(|bound| us <= *bound)
            .unwrap_or(LATENCY_BUCKETS_US.len());

        self.buckets[index].fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max_us.fetch_max(us, Ordering::Relaxed);
    }

    fn counts(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect()
    }

    /// Quantile estimate in milliseconds
    fn quantile_ms(&self, counts: &[u64], q: f64) -> f64 {
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return 0.0;
        }

        let rank = ((total as f64 * q).ceil() as u64).max(1);
        let mut seen = 0;
        for (index, count) in counts.iter().enumerate() {
            seen += count;
            if seen >= rank {
                let bound_us = match LATENCY_BUCKETS_US.get(index) {
                    Some(bound) => *bound,
                    None => self.max_us.load(Ordering::Relaxed),
                };
                return bound_us as f64 / 1000.0;
            }
        }

        self.max_us.load(Ordering::Relaxed) as f64 / 1000.0
    }

    fn avg_ms(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            self.sum_us.load(Ordering::Relaxed) as f64 / count as f64 / 1000.0
        }
    }
}

/// Metrics collector with Prometheus text export
#[derive(Debug)]
pub struct MetricsCollector {
    total_checks: AtomicU64,
    allowed_decisions: AtomicU64,
    denied_decisions: AtomicU64,
    error_count: AtomicU64,
    latency: LatencyHistogram,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            total_checks: AtomicU64::new(0),
            allowed_decisions: AtomicU64::new(0),
            denied_decisions: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            latency: LatencyHistogram::new(),
        }
    }

    pub fn record_decision(&self, allowed: bool) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);

        if allowed {
            self.allowed_decisions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.denied_decisions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, latency: Duration) {
        self.latency.observe(latency);
    }

    /// Current metrics snapshot
    pub fn get_metrics(&self) -> EngineMetrics {
        let counts = self.latency.counts();

        EngineMetrics {
            total_checks: self.total_checks.load(Ordering::Relaxed),
            allowed_decisions: self.allowed_decisions.load(Ordering::Relaxed),
            denied_decisions: self.denied_decisions.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            latency_p50_ms: self.latency.quantile_ms(&counts, 0.50),
            latency_p90_ms: self.latency.quantile_ms(&counts, 0.90),
            latency_p99_ms: self.latency.quantile_ms(&counts, 0.99),
            avg_latency_ms: self.latency.avg_ms(),
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let metrics = self.get_metrics();

        format!(
            r#"# HELP casegate_checks_total Completed authorization checks
# TYPE casegate_checks_total counter
casegate_checks_total {}

# HELP casegate_allowed_total Allowed decisions
# TYPE casegate_allowed_total counter
casegate_allowed_total {}

# HELP casegate_denied_total Denied decisions
# TYPE casegate_denied_total counter
casegate_denied_total {}

# HELP casegate_errors_total Checks that ended in an error
# TYPE casegate_errors_total counter
casegate_errors_total {}

# HELP casegate_check_latency_seconds Check latency percentiles
# TYPE casegate_check_latency_seconds summary
casegate_check_latency_seconds{{quantile="0.5"}} {}
casegate_check_latency_seconds{{quantile="0.9"}} {}
casegate_check_latency_seconds{{quantile="0.99"}} {}
casegate_check_latency_seconds_sum {}
casegate_check_latency_seconds_count {}
"#,
            metrics.total_checks,
            metrics.allowed_decisions,
            metrics.denied_decisions,
            metrics.error_count,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p90_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
            self.latency.sum_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            self.latency.count.load(Ordering::Relaxed),
        )
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
