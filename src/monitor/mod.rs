// Host liveness monitoring

pub mod alert;
pub mod models;
pub mod probe;
pub mod prober;
pub mod state;

#[cfg(test)]
mod tests;

pub use alert::{AlertSink, WebhookSink};
pub use models::{format_down_alert, is_alert_transition, HealthState, ProbeCycleReport, ProbeResult};
pub use probe::{build_probe, IcmpProbe, ReachabilityProbe, TcpProbe};
pub use prober::LivenessProber;
pub use state::{FileStateStore, StateStore};

#[cfg(test)]
pub use alert::MockAlertSink;
#[cfg(test)]
pub use probe::MockReachabilityProbe;
#[cfg(test)]
pub use state::MockStateStore;
