//! End-to-end admission flows through the composed sentinel.

#[cfg(test)]
mod tests {
    use ms_04_mitigation::{AdmissionDecision, MitigationMode};
    use ms_05_watchdog::{FallbackPolicy, ProbeError, WatchdogConfig};
    use ms_06_monitoring::HealingKind;
    use ms_07_decision::{DecisionSource, MlScores};
    use primitive_types::U256;
    use sentinel_runtime::{FnProbe, Sentinel, SentinelConfig, StaticScoreProvider};
    use shared_types::{Address, FeatureMap, MitigationAction, TxData};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn tx(sender: &str, fee: u64) -> TxData {
        TxData {
            hash: format!("0x{}", sender.trim_start_matches("0x")),
            sender: Address::new(sender),
            recipient: Address::new("0xrecipient"),
            value: U256::from(100_000u64),
            payload: String::new(),
            gas: 21_000,
            fee,
        }
    }

    /// A sustained spam wave forces DEFENSIVE mode via both the policy and
    /// the drift/healing loop, spam transactions stop clearing the fee
    /// floor, and a reset restores normal admission.
    #[tokio::test]
    async fn test_spam_wave_drives_defensive_then_recovers() {
        let sentinel = Sentinel::builder()
            .with_score_provider(Arc::new(StaticScoreProvider::new(MlScores {
                spam_score: 0.9,
                congestion_score: 50_000.0,
                mev_risk_score: 0.0,
            })))
            .build();

        let mut wave_features = FeatureMap::new();
        wave_features.set("spam_ratio", 0.8);
        wave_features.set("tx_count", 400.0);

        let admission = sentinel
            .admit(&tx("0xspammer", 1), wave_features.clone())
            .await;

        // The hostile window escalated straight to DEFENSIVE and the
        // self-healer piled on after the spam-ratio drift alert.
        assert_eq!(admission.decision.action, MitigationAction::Defensive);
        let status = sentinel.status();
        assert_eq!(status.mitigation.mode, MitigationMode::Defensive);
        assert!(status.mitigation.min_fee >= 50);
        assert!(status
            .healing_history
            .iter()
            .any(|h| h.kind == HealingKind::ForceDefensive));
        // The cheap spam transaction no longer clears the floor.
        assert_eq!(admission.verdict, AdmissionDecision::Reject);

        // Operator reset: everything reversible.
        sentinel.mitigation().reset();
        let status = sentinel.status();
        assert_eq!(status.mitigation.mode, MitigationMode::Normal);
        assert_eq!(status.mitigation.min_fee, 0);
    }

    /// While dependent services are down under FAIL_CLOSED, every decision
    /// resolves to DEFENSIVE via the fallback path; recovery restores the
    /// normal pipeline.
    #[tokio::test]
    async fn test_fail_closed_window_and_recovery() {
        let up = Arc::new(AtomicBool::new(false));
        let probe_state = up.clone();

        let config = SentinelConfig {
            watchdog: WatchdogConfig {
                check_interval: Duration::from_secs(30),
                failure_threshold: 3,
                probe_timeout: Duration::from_millis(50),
                fallback_policy: FallbackPolicy::FailClosed,
            },
            ..SentinelConfig::standard()
        };
        let sentinel = Sentinel::builder()
            .with_config(config)
            .with_probe(
                "ml_service",
                Arc::new(FnProbe(move || {
                    if probe_state.load(Ordering::SeqCst) {
                        Ok(true)
                    } else {
                        Err(ProbeError::new("connection refused"))
                    }
                })),
            )
            .build();

        sentinel.watchdog().check_all().await;
        assert!(!sentinel.watchdog().snapshot().system_healthy);

        for i in 0..3 {
            let outcome = sentinel
                .decide(&tx(&format!("0xuser{}", i), 10), FeatureMap::new())
                .await;
            assert_eq!(outcome.action, MitigationAction::Defensive);
            assert_eq!(outcome.source, DecisionSource::Fallback);
        }

        up.store(true, Ordering::SeqCst);
        sentinel.watchdog().check_all().await;
        assert!(sentinel.watchdog().snapshot().system_healthy);

        let outcome = sentinel.decide(&tx("0xuser9", 10), FeatureMap::new()).await;
        assert_ne!(outcome.source, DecisionSource::Fallback);
    }

    /// Degrading rewards freeze the policy path end to end; an explicit
    /// unfreeze hands control back to the policy.
    #[tokio::test]
    async fn test_policy_freeze_lifecycle() {
        let sentinel = Sentinel::builder().build();

        let mut hostile = FeatureMap::new();
        hostile.set("tx_count", 10_000.0);
        sentinel.admit(&tx("0xuser1", 5), hostile).await;
        assert!(sentinel.status().policy_frozen);

        let outcome = sentinel.decide(&tx("0xuser2", 5), FeatureMap::new()).await;
        assert_eq!(outcome.action, MitigationAction::Monitor);
        assert_eq!(outcome.source, DecisionSource::Default);

        sentinel.freeze().unfreeze();
        let outcome = sentinel.decide(&tx("0xuser3", 5), FeatureMap::new()).await;
        assert_eq!(outcome.source, DecisionSource::Policy);
        assert!(!sentinel.status().policy_frozen);
    }

    /// Rules added at runtime take effect immediately and their removal is
    /// audited alongside the addition.
    #[tokio::test]
    async fn test_runtime_rule_mutation_round_trip() {
        let sentinel = Sentinel::builder()
            .with_score_provider(Arc::new(StaticScoreProvider::new(MlScores {
                spam_score: 0.2,
                congestion_score: 0.0,
                mev_risk_score: 0.95,
            })))
            .build();

        let baseline = sentinel.decide(&tx("0xuser", 5), FeatureMap::new()).await;
        assert_ne!(baseline.action, MitigationAction::Defensive);

        sentinel.rules().add_rule(
            ms_02_rules::RuleSpec {
                id: "block_mev_risk".into(),
                priority: 150,
                condition: "mev_risk_score >= 0.9".into(),
                action: shared_types::RuleAction::Block,
                risk_score: 0.95,
                enabled: true,
                meta: ms_02_rules::RuleMeta {
                    reason: "High MEV risk".into(),
                    category: "mev".into(),
                },
            },
            "operator",
        );

        let blocked = sentinel.decide(&tx("0xuser", 5), FeatureMap::new()).await;
        assert_eq!(blocked.action, MitigationAction::Defensive);
        assert_eq!(blocked.source, DecisionSource::Rule);
        assert_eq!(blocked.rule_id.as_deref(), Some("block_mev_risk"));

        assert!(sentinel.rules().remove_rule("block_mev_risk", "operator"));
        let after = sentinel.decide(&tx("0xuser", 5), FeatureMap::new()).await;
        assert_ne!(after.rule_id.as_deref(), Some("block_mev_risk"));

        let audit = sentinel.rules().audit_log();
        let ours: Vec<_> = audit
            .iter()
            .filter(|e| e.rule_id == "block_mev_risk")
            .collect();
        assert_eq!(ours.len(), 2);
        assert!(ours[0].rule_hash.is_some());
    }
}
