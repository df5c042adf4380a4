// Liveness prober: probe, compare, alert on the edge into Down, persist

use crate::monitor::{
    format_down_alert, is_alert_transition, AlertSink, HealthState, ProbeCycleReport,
    ReachabilityProbe, StateStore,
};

/// Watches one fixed target. Collaborators are injected so the cycle can be
/// driven against fakes.
pub struct LivenessProber {
    target: String,
    probe: Box<dyn ReachabilityProbe>,
    store: Box<dyn StateStore>,
    sink: Box<dyn AlertSink>,
}

impl LivenessProber {
    pub fn new(
        target: impl Into<String>,
        probe: Box<dyn ReachabilityProbe>,
        store: Box<dyn StateStore>,
        sink: Box<dyn AlertSink>,
    ) -> Self {
        Self {
            target: target.into(),
            probe,
            store,
            sink,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Run one cycle. Runtime failures are logged and absorbed here; the
    /// returned report says what happened.
    pub async fn run_probe_cycle(&self) -> ProbeCycleReport {
        let result = self.probe.probe(&self.target).await;
        let current = result.outcome;
        match current {
            HealthState::Up => tracing::debug!(
                "{} is up ({:.1}ms): {}",
                self.target,
                result.latency_ms.unwrap_or_default(),
                result.detail
            ),
            _ => tracing::debug!("{} is down: {}", self.target, result.detail),
        }

        let prior = self.store.load();

        let mut alert_attempted = false;
        let mut alert_delivered = None;
        if is_alert_transition(prior, current) {
            tracing::error!("[CHANGE] {} {} -> {}", self.target, prior, current);
            alert_attempted = true;
            let message = format_down_alert(&result);
            match self.sink.dispatch(&message).await {
                Ok(()) => {
                    tracing::info!("Outage alert sent for {}", self.target);
                    alert_delivered = Some(true);
                }
                Err(e) => {
                    tracing::warn!("Outage alert for {} was not delivered: {}", self.target, e);
                    alert_delivered = Some(false);
                }
            }
        } else if prior != current && prior != HealthState::Unknown {
            tracing::warn!("[CHANGE] {} {} -> {}", self.target, prior, current);
        }

        let state_persisted = match self.store.save(current) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("{}", e);
                false
            }
        };

        ProbeCycleReport {
            prior,
            result,
            alert_attempted,
            alert_delivered,
            state_persisted,
        }
    }
}
