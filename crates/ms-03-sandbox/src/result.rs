//! Simulation result and risk scoring.

use primitive_types::U256;

/// One risk indicator raised by the analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RiskIndicator {
    /// Transfer value above the configured high-value threshold.
    HighValueTransfer,
    /// Payload carries call data beyond a bare selector.
    ContractInteraction,
    /// ERC-20 `transfer` selector (0xa9059cbb).
    TokenTransfer,
    /// ERC-20 `approve` selector (0x095ea7b3).
    Approval,
    /// Approval payloads can precede allowance drains.
    PotentialDrainRisk,
    /// Gas limit above the configured high-gas threshold.
    HighGas,
    /// Payload large enough to batch multiple calls.
    MultipleCalls,
    /// The analysis itself failed; treated as maximum suspicion input.
    AnalysisError,
}

impl RiskIndicator {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskIndicator::HighValueTransfer => "high_value_transfer",
            RiskIndicator::ContractInteraction => "contract_interaction",
            RiskIndicator::TokenTransfer => "token_transfer",
            RiskIndicator::Approval => "approval",
            RiskIndicator::PotentialDrainRisk => "potential_drain_risk",
            RiskIndicator::HighGas => "high_gas",
            RiskIndicator::MultipleCalls => "multiple_calls",
            RiskIndicator::AnalysisError => "analysis_error",
        }
    }
}

/// Result of one sandbox analysis.
#[derive(Clone, Debug, Default)]
pub struct SimulationResult {
    pub success: bool,
    pub reverted: bool,
    pub revert_reason: Option<String>,
    /// Estimated gas consumed by the analyzed execution path.
    pub gas_used: u64,
    /// Caller-declared gas limit, echoed when flagged as high.
    pub gas_estimate: u64,
    /// Number of storage slots the payload would plausibly touch.
    pub state_change_count: usize,
    /// Value moved, when flagged as a high-value transfer.
    pub value_transferred: U256,
    pub indicators: Vec<RiskIndicator>,
    /// Wall time spent analyzing (zero on cache hits).
    pub elapsed_ms: u64,
    /// True when served from the result cache.
    pub cached: bool,
}

impl SimulationResult {
    /// Aggregates the indicator set into a risk score in [0,1].
    ///
    /// Fixed weights: revert +0.3, more than 10 state changes +0.2,
    /// gas above 1M +0.1; per indicator category: high-value +0.2,
    /// high gas +0.1, multiple calls +0.1. Capped at 1.0.
    pub fn risk_score(&self) -> f64 {
        let mut score: f64 = 0.0;

        if self.reverted {
            score += 0.3;
        }
        if self.state_change_count > 10 {
            score += 0.2;
        }
        if self.gas_used > 1_000_000 {
            score += 0.1;
        }

        for indicator in &self.indicators {
            score += match indicator {
                RiskIndicator::HighValueTransfer => 0.2,
                RiskIndicator::HighGas => 0.1,
                RiskIndicator::MultipleCalls => 0.1,
                _ => 0.0,
            };
        }

        score.min(1.0)
    }

    pub fn has_indicator(&self, indicator: RiskIndicator) -> bool {
        self.indicators.contains(&indicator)
    }
}
