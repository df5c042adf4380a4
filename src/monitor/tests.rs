#[cfg(test)]
mod tests {
    use crate::error::{DispatchError, WardenError};
    use crate::monitor::{
        AlertSink, FileStateStore, HealthState, LivenessProber, MockAlertSink,
        MockReachabilityProbe, MockStateStore, ProbeResult, ReachabilityProbe, StateStore,
    };
    use async_trait::async_trait;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    const TARGET: &str = "10.0.0.12";

    fn probe_returning(outcome: HealthState) -> MockReachabilityProbe {
        let mut probe = MockReachabilityProbe::new();
        probe.expect_probe().times(1).returning(move |target| match outcome {
            HealthState::Up => ProbeResult::up(target, 3.2, "ICMP reply"),
            _ => ProbeResult::down(target, "Request timed out after 2000ms"),
        });
        probe
    }

    fn store_with(prior: HealthState, expect_saved: HealthState) -> MockStateStore {
        let mut store = MockStateStore::new();
        store.expect_load().times(1).return_const(prior);
        store
            .expect_save()
            .with(eq(expect_saved))
            .times(1)
            .returning(|_| Ok(()));
        store
    }

    #[tokio::test]
    async fn test_up_to_down_alerts_once_with_target_and_timestamp() {
        let mut sink = MockAlertSink::new();
        sink.expect_dispatch()
            .withf(|message| {
                message.contains(TARGET)
                    && message.contains("detected at")
                    && chrono::DateTime::parse_from_rfc3339(
                        message
                            .split("detected at ")
                            .nth(1)
                            .and_then(|rest| rest.split(')').next())
                            .unwrap_or(""),
                    )
                    .is_ok()
            })
            .times(1)
            .returning(|_| Ok(()));

        let prober = LivenessProber::new(
            TARGET,
            Box::new(probe_returning(HealthState::Down)),
            Box::new(store_with(HealthState::Up, HealthState::Down)),
            Box::new(sink),
        );

        let report = prober.run_probe_cycle().await;
        assert_eq!(report.prior, HealthState::Up);
        assert_eq!(report.result.outcome, HealthState::Down);
        assert!(report.alert_attempted);
        assert_eq!(report.alert_delivered, Some(true));
        assert!(report.state_persisted);
    }

    #[tokio::test]
    async fn test_down_to_down_stays_quiet() {
        let mut sink = MockAlertSink::new();
        sink.expect_dispatch().times(0);

        let prober = LivenessProber::new(
            TARGET,
            Box::new(probe_returning(HealthState::Down)),
            Box::new(store_with(HealthState::Down, HealthState::Down)),
            Box::new(sink),
        );

        let report = prober.run_probe_cycle().await;
        assert!(!report.alert_attempted);
        assert_eq!(report.alert_delivered, None);
    }

    #[tokio::test]
    async fn test_recovery_is_silent() {
        let mut sink = MockAlertSink::new();
        sink.expect_dispatch().times(0);

        let prober = LivenessProber::new(
            TARGET,
            Box::new(probe_returning(HealthState::Up)),
            Box::new(store_with(HealthState::Down, HealthState::Up)),
            Box::new(sink),
        );

        let report = prober.run_probe_cycle().await;
        assert_eq!(report.result.outcome, HealthState::Up);
        assert!(!report.alert_attempted);
    }

    #[tokio::test]
    async fn test_first_run_down_alerts() {
        let mut sink = MockAlertSink::new();
        sink.expect_dispatch().times(1).returning(|_| Ok(()));

        let prober = LivenessProber::new(
            TARGET,
            Box::new(probe_returning(HealthState::Down)),
            Box::new(store_with(HealthState::Unknown, HealthState::Down)),
            Box::new(sink),
        );

        assert!(prober.run_probe_cycle().await.alert_attempted);
    }

    #[tokio::test]
    async fn test_first_run_up_does_not_alert() {
        let mut sink = MockAlertSink::new();
        sink.expect_dispatch().times(0);

        let prober = LivenessProber::new(
            TARGET,
            Box::new(probe_returning(HealthState::Up)),
            Box::new(store_with(HealthState::Unknown, HealthState::Up)),
            Box::new(sink),
        );

        assert!(!prober.run_probe_cycle().await.alert_attempted);
    }

    #[tokio::test]
    async fn test_dispatch_failure_still_persists_state() {
        let mut sink = MockAlertSink::new();
        sink.expect_dispatch()
            .times(1)
            .returning(|_| Err(DispatchError::Transport("connection reset".to_string())));

        let prober = LivenessProber::new(
            TARGET,
            Box::new(probe_returning(HealthState::Down)),
            Box::new(store_with(HealthState::Up, HealthState::Down)),
            Box::new(sink),
        );

        let report = prober.run_probe_cycle().await;
        assert!(report.alert_attempted);
        assert_eq!(report.alert_delivered, Some(false));
        assert!(report.state_persisted);
    }

    #[tokio::test]
    async fn test_save_failure_does_not_abort_cycle() {
        let mut store = MockStateStore::new();
        store.expect_load().return_const(HealthState::Up);
        store.expect_save().times(1).returning(|_| {
            Err(WardenError::StatePersistence {
                path: "/readonly/state".to_string(),
                message: "read-only file system".to_string(),
            })
        });
        let mut sink = MockAlertSink::new();
        sink.expect_dispatch().times(1).returning(|_| Ok(()));

        let prober = LivenessProber::new(
            TARGET,
            Box::new(probe_returning(HealthState::Down)),
            Box::new(store),
            Box::new(sink),
        );

        let report = prober.run_probe_cycle().await;
        assert_eq!(report.alert_delivered, Some(true));
        assert!(!report.state_persisted);
    }

    #[tokio::test]
    async fn test_persist_happens_after_alert_attempt() {
        let mut seq = Sequence::new();
        let mut probe = MockReachabilityProbe::new();
        probe
            .expect_probe()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|target| ProbeResult::down(target, "timeout"));
        let mut store = MockStateStore::new();
        store
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(HealthState::Up);
        let mut sink = MockAlertSink::new();
        sink.expect_dispatch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DispatchError::Status(500)));
        store
            .expect_save()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let prober = LivenessProber::new(TARGET, Box::new(probe), Box::new(store), Box::new(sink));
        prober.run_probe_cycle().await;
    }

    #[tokio::test]
    async fn test_file_store_round_trip_through_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");

        let mut sink = MockAlertSink::new();
        sink.expect_dispatch().times(0);
        let prober = LivenessProber::new(
            TARGET,
            Box::new(probe_returning(HealthState::Up)),
            Box::new(FileStateStore::new(&path)),
            Box::new(sink),
        );
        prober.run_probe_cycle().await;
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "up");

        let mut sink = MockAlertSink::new();
        sink.expect_dispatch().times(1).returning(|_| Ok(()));
        let prober = LivenessProber::new(
            TARGET,
            Box::new(probe_returning(HealthState::Down)),
            Box::new(FileStateStore::new(&path)),
            Box::new(sink),
        );
        prober.run_probe_cycle().await;
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "down");
    }

    /// Plays back a fixed list of outcomes
    struct ScriptedProbe(Mutex<VecDeque<HealthState>>);

    #[async_trait]
    impl ReachabilityProbe for ScriptedProbe {
        async fn probe(&self, target: &str) -> ProbeResult {
            let next = self.0.lock().unwrap().pop_front().unwrap_or(HealthState::Up);
            match next {
                HealthState::Down => ProbeResult::down(target, "scripted"),
                _ => ProbeResult::up(target, 1.0, "scripted"),
            }
        }
    }

    #[derive(Clone)]
    struct MemoryStore(Arc<Mutex<HealthState>>);

    impl MemoryStore {
        fn empty() -> Self {
            Self(Arc::new(Mutex::new(HealthState::Unknown)))
        }
    }

    impl StateStore for MemoryStore {
        fn load(&self) -> HealthState {
            *self.0.lock().unwrap()
        }

        fn save(&self, state: HealthState) -> Result<(), WardenError> {
            *self.0.lock().unwrap() = state;
            Ok(())
        }
    }

    /// Fails every other delivery to show failures never cause a repeat
    #[derive(Clone, Default)]
    struct FlakySink(Arc<Mutex<usize>>);

    #[async_trait]
    impl AlertSink for FlakySink {
        async fn dispatch(&self, _message: &str) -> Result<(), DispatchError> {
            let mut calls = self.0.lock().unwrap();
            *calls += 1;
            if *calls % 2 == 0 {
                Err(DispatchError::Status(502))
            } else {
                Ok(())
            }
        }
    }

    fn down_runs(outcomes: &[HealthState]) -> usize {
        let mut runs = 0;
        let mut previous = None;
        for &outcome in outcomes {
            if outcome == HealthState::Down && previous != Some(HealthState::Down) {
                runs += 1;
            }
            previous = Some(outcome);
        }
        runs
    }

    #[tokio::test]
    async fn test_one_alert_per_outage_for_every_sequence() {
        for len in 1..=7usize {
            for bits in 0..(1u32 << len) {
                let outcomes: Vec<HealthState> = (0..len)
                    .map(|i| {
                        if bits & (1 << i) != 0 {
                            HealthState::Down
                        } else {
                            HealthState::Up
                        }
                    })
                    .collect();

                let store = MemoryStore::empty();
                let sink = FlakySink::default();
                let prober = LivenessProber::new(
                    TARGET,
                    Box::new(ScriptedProbe(Mutex::new(outcomes.iter().copied().collect()))),
                    Box::new(store.clone()),
                    Box::new(sink.clone()),
                );

                for &expected in &outcomes {
                    let report = prober.run_probe_cycle().await;
                    assert_eq!(report.result.outcome, expected);
                    assert_eq!(store.load(), expected);
                }

                assert_eq!(
                    *sink.0.lock().unwrap(),
                    down_runs(&outcomes),
                    "sequence {:?}",
                    outcomes
                );
            }
        }
    }
}
