//! Fixed-size rolling window over per-cycle metrics.

use parking_lot::RwLock;
use shared_types::MitigationAction;
use std::collections::{BTreeMap, VecDeque};

/// Default number of cycles kept per series.
pub const DEFAULT_WINDOW_CAPACITY: usize = 50;

/// Named metric series tracked by the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Metric {
    TxCount,
    FeeRate,
    Congestion,
    SpamRatio,
    SpamScore,
    FalsePositive,
    Reward,
    RiskScore,
    Confidence,
}

/// One cycle's worth of scalar observations.
#[derive(Clone, Copy, Debug)]
pub struct CycleSample {
    pub tx_count: f64,
    pub fee_rate: f64,
    pub congestion_score: f64,
    pub spam_ratio: f64,
    pub spam_score: f64,
    /// Estimated false-positive contribution of this cycle.
    pub false_positive: f64,
    pub reward: f64,
    pub action: MitigationAction,
    /// Risk score on the 0-100 audit scale.
    pub risk_score: f64,
    pub confidence: f64,
}

/// Aggregated view of the current window.
#[derive(Clone, Debug, Default)]
pub struct MetricsSummary {
    pub avg_tx_count: f64,
    pub avg_fee_rate: f64,
    pub avg_congestion: f64,
    pub avg_spam_ratio: f64,
    pub avg_spam_score: f64,
    pub fp_rate: f64,
    pub avg_confidence: f64,
    pub avg_reward: f64,
    pub avg_risk_score: f64,
    /// Fraction of cycles per action code, rounded to 2 dp.
    pub action_distribution: BTreeMap<u8, f64>,
    pub samples_collected: usize,
}

/// Direction of a metric over the recent window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

struct WindowState {
    series: BTreeMap<Metric, VecDeque<f64>>,
    actions: VecDeque<u8>,
}

const SERIES: [Metric; 9] = [
    Metric::TxCount,
    Metric::FeeRate,
    Metric::Congestion,
    Metric::SpamRatio,
    Metric::SpamScore,
    Metric::FalsePositive,
    Metric::Reward,
    Metric::RiskScore,
    Metric::Confidence,
];

/// Rolling window aggregator. One sample per series per cycle, oldest
/// samples evicted first.
pub struct MetricsWindow {
    capacity: usize,
    state: RwLock<WindowState>,
}

impl MetricsWindow {
    pub fn new(capacity: usize) -> Self {
        let series = SERIES
            .iter()
            .map(|m| (*m, VecDeque::with_capacity(capacity)))
            .collect();
        Self {
            capacity,
            state: RwLock::new(WindowState {
                series,
                actions: VecDeque::with_capacity(capacity),
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }

    /// Appends one cycle's sample, evicting the oldest when full.
    pub fn update(&self, sample: CycleSample) {
        let mut state = self.state.write();
        let values = [
            (Metric::TxCount, sample.tx_count),
            (Metric::FeeRate, sample.fee_rate),
            (Metric::Congestion, sample.congestion_score),
            (Metric::SpamRatio, sample.spam_ratio),
            (Metric::SpamScore, sample.spam_score),
            (Metric::FalsePositive, sample.false_positive),
            (Metric::Reward, sample.reward),
            (Metric::RiskScore, sample.risk_score),
            (Metric::Confidence, sample.confidence),
        ];
        for (metric, value) in values {
            let series = state.series.entry(metric).or_default();
            if series.len() == self.capacity {
                series.pop_front();
            }
            series.push_back(value);
        }
        if state.actions.len() == self.capacity {
            state.actions.pop_front();
        }
        state.actions.push_back(sample.action.code());
    }

    /// Average of one series; 0.0 while empty.
    pub fn avg(&self, metric: Metric) -> f64 {
        let state = self.state.read();
        match state.series.get(&metric) {
            Some(s) if !s.is_empty() => s.iter().sum::<f64>() / s.len() as f64,
            _ => 0.0,
        }
    }

    /// Latest value of one series.
    pub fn latest(&self, metric: Metric) -> Option<f64> {
        let state = self.state.read();
        state
            .series
            .get(&metric)
            .and_then(|s| s.back().copied())
    }

    /// Summarizes the current window.
    pub fn summary(&self) -> MetricsSummary {
        let state = self.state.read();
        let avg = |metric: Metric| -> f64 {
            let series = state.series.get(&metric);
            match series {
                Some(s) if !s.is_empty() => s.iter().sum::<f64>() / s.len() as f64,
                _ => 0.0,
            }
        };

        let mut distribution = BTreeMap::new();
        let total = state.actions.len();
        if total > 0 {
            let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
            for action in &state.actions {
                *counts.entry(*action).or_default() += 1;
            }
            for (action, count) in counts {
                let fraction = count as f64 / total as f64;
                distribution.insert(action, (fraction * 100.0).round() / 100.0);
            }
        }

        MetricsSummary {
            avg_tx_count: avg(Metric::TxCount),
            avg_fee_rate: avg(Metric::FeeRate),
            avg_congestion: avg(Metric::Congestion),
            avg_spam_ratio: avg(Metric::SpamRatio),
            avg_spam_score: avg(Metric::SpamScore),
            fp_rate: avg(Metric::FalsePositive),
            avg_confidence: avg(Metric::Confidence),
            avg_reward: avg(Metric::Reward),
            avg_risk_score: avg(Metric::RiskScore),
            action_distribution: distribution,
            samples_collected: total,
        }
    }

    /// Trend of a metric: the last 10 samples against the 10 before them,
    /// with a ±20% stability band.
    pub fn trend(&self, metric: Metric) -> Trend {
        const SPAN: usize = 10;
        let state = self.state.read();
        let series = match state.series.get(&metric) {
            Some(s) => s,
            None => return Trend::Stable,
        };
        let data: Vec<f64> = series.iter().copied().collect();
        if data.len() < SPAN {
            return Trend::Stable;
        }

        let recent = &data[data.len() - SPAN..];
        let older = if data.len() >= 2 * SPAN {
            &data[data.len() - 2 * SPAN..data.len() - SPAN]
        } else {
            &data[..SPAN]
        };

        let recent_avg = recent.iter().sum::<f64>() / recent.len() as f64;
        let older_avg = older.iter().sum::<f64>() / older.len() as f64;

        if recent_avg > older_avg * 1.2 {
            Trend::Increasing
        } else if recent_avg < older_avg * 0.8 {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }
}
