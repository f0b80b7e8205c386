//! Scoring statistics and periodic summaries.

use crate::types::score::{ExplanationMethod, RiskCategory, ScoreResult};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Upper bound on retained timing samples
const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for the scoring service
pub struct ScoringMetrics {
    /// Claims scored
    pub claims_scored: AtomicU64,
    /// Results with fraud = 1
    pub fraud_flagged: AtomicU64,
    /// Results with is_anomaly = true
    pub anomalies: AtomicU64,
    /// Payloads that could not be decoded
    pub rejected: AtomicU64,
    by_method: RwLock<BTreeMap<&'static str, u64>>,
    by_category: RwLock<BTreeMap<RiskCategory, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Model agreement of ensemble-scored results
    agreements: RwLock<Vec<f64>>,
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            claims_scored: AtomicU64::new(0),
            fraud_flagged: AtomicU64::new(0),
            anomalies: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            by_method: RwLock::new(BTreeMap::new()),
            by_category: RwLock::new(BTreeMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            agreements: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record one scored claim
    pub fn record(&self, result: &ScoreResult, processing_time: Duration) {
        self.claims_scored.fetch_add(1, Ordering::Relaxed);
        if result.is_fraud() {
            self.fraud_flagged.fetch_add(1, Ordering::Relaxed);
        }
        if result.is_anomaly {
            self.anomalies.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut by_method) = self.by_method.write() {
            *by_method.entry(result.explanation_method.label()).or_insert(0) += 1;
        }
        if let Ok(mut by_category) = self.by_category.write() {
            *by_category.entry(result.status).or_insert(0) += 1;
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }

        if result.explanation_method == ExplanationMethod::Ensemble {
            if let Ok(mut agreements) = self.agreements.write() {
                agreements.push(result.model_agreement);
                if agreements.len() > MAX_SAMPLES {
                    agreements.drain(0..MAX_SAMPLES / 2);
                }
            }
        }
    }

    /// Record a payload dropped before scoring
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processing_stats(&self) -> ProcessingStats {
        let mut sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Mean ensemble agreement in percent, 0 when nothing was recorded
    pub fn avg_agreement(&self) -> f64 {
        match self.agreements.read() {
            Ok(agreements) if !agreements.is_empty() => agreements.iter().sum::<f64>() / agreements.len() as f64,
            _ => 0.0,
        }
    }

    /// Claims per second since startup
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.claims_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn by_method(&self) -> BTreeMap<&'static str, u64> {
        self.by_method.read().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn by_category(&self) -> BTreeMap<RiskCategory, u64> {
        self.by_category.read().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn print_summary(&self) {
        let scored = self.claims_scored.load(Ordering::Relaxed);
        let flagged = self.fraud_flagged.load(Ordering::Relaxed);
        let fraud_rate = if scored > 0 {
            flagged as f64 / scored as f64 * 100.0
        } else {
            0.0
        };
        let processing = self.processing_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              CLAIM FRAUD SCORER - METRICS SUMMARY            ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Claims Scored: {:>8}  │  Throughput: {:>6.1} claims/s       ║",
            scored,
            self.throughput()
        );
        info!(
            "║ Fraud Flagged: {:>8}  │  Fraud Rate: {:>6.1}%               ║",
            flagged, fraud_rate
        );
        info!(
            "║ Anomalies:     {:>8}  │  Rejected:   {:>8}               ║",
            self.anomalies.load(Ordering::Relaxed),
            self.rejected.load(Ordering::Relaxed)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("║ Model Agreement: {:>5.1}%                                     ║", self.avg_agreement());
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Results by Method:                                           ║");
        for (method, count) in self.by_method() {
            info!("║   {:<42}: {:>8}", method, count);
        }
        info!("║ Results by Risk Category:                                    ║");
        for (category, count) in self.by_category() {
            let pct = if scored > 0 {
                count as f64 / scored as f64 * 100.0
            } else {
                0.0
            };
            info!("║   {:<12}: {:>6} ({:>5.1}%)", category.label(), count, pct);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Logs a metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ScoringMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ScoringMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
