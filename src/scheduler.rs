// Cycle entry points: single locked runs and the daemon timer loop

use crate::config::Config;
use crate::error::Result;
use crate::guard::RunLock;
use crate::monitor::{build_probe, FileStateStore, LivenessProber, ProbeCycleReport, WebhookSink};
use crate::recycle::{build_group, RecycleReport, Recycler};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub const PROBE_LOCK: &str = "probe";
pub const RECYCLE_LOCK: &str = "recycle";

/// Wire the prober from validated configuration
pub fn build_prober(config: &Config) -> Result<LivenessProber> {
    config.validate_probe()?;
    let target = config.probe.target_host.clone().unwrap_or_default();
    let url = config.alert.webhook_url.clone().unwrap_or_default();

    Ok(LivenessProber::new(
        target.trim(),
        build_probe(config),
        Box::new(FileStateStore::new(config.state_file_path())),
        Box::new(WebhookSink::new(url.trim(), config.alert_timeout())?),
    ))
}

/// Wire the recycler from validated configuration
pub async fn build_recycler(config: &Config) -> Result<Recycler> {
    config.validate_recycle()?;
    let group = build_group(config).await?;
    Ok(Recycler::new(group, config.recycle_grace()))
}

/// One probe cycle under the probe lock; `None` if another run holds it
pub async fn probe_locked(prober: &LivenessProber, lock_dir: &Path) -> Result<Option<ProbeCycleReport>> {
    let Some(_lock) = RunLock::acquire(lock_dir, PROBE_LOCK)? else {
        tracing::warn!("Another probe cycle is still running, skipping this one");
        return Ok(None);
    };
    Ok(Some(prober.run_probe_cycle().await))
}

/// One recycle cycle under the recycle lock; `None` if another run holds it
pub async fn recycle_locked(recycler: &Recycler, lock_dir: &Path) -> Result<Option<RecycleReport>> {
    let Some(_lock) = RunLock::acquire(lock_dir, RECYCLE_LOCK)? else {
        tracing::warn!("Another recycle cycle is still running, skipping this one");
        return Ok(None);
    };
    Ok(Some(recycler.run_recycle_cycle().await))
}

/// Run `cycle` every `period` until `shutdown` flips. Each cycle is awaited
/// before the next tick is taken, so cycles of one component never overlap.
pub async fn every<F, Fut>(
    label: &str,
    period: Duration,
    immediate: bool,
    mut shutdown: watch::Receiver<bool>,
    mut cycle: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let first = if immediate { Instant::now() } else { Instant::now() + period };
    let mut ticker = interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!("{} scheduled every {:?}", label, period);

    loop {
        tokio::select! {
            _ = ticker.tick() => cycle().await,
            _ = shutdown.changed() => {
                tracing::info!("{} loop shutdown", label);
                break;
            }
        }
    }
}

/// Long-running mode: probe and (optionally) recycle on internal timers
/// until `shutdown_signal` resolves.
pub async fn run_daemon(config: &Config, shutdown_signal: impl Future<Output = ()>) -> Result<()> {
    config.validate_daemon()?;

    let prober = build_prober(config)?;
    let recycler = if config.recycle.group.is_some() {
        Some(build_recycler(config).await?)
    } else {
        tracing::info!("No managed group configured, recycling disabled");
        None
    };
    let lock_dir = config.lock_dir_path();
    let lock_dir = lock_dir.as_path();
    let (tx, rx) = watch::channel(false);

    let prober = &prober;
    let probe_loop = every(
        "Probe",
        Duration::from_secs(config.probe.interval_secs),
        true,
        rx.clone(),
        move || async move {
            if let Err(e) = probe_locked(prober, lock_dir).await {
                tracing::error!("Probe cycle skipped: {:#}", e);
            }
        },
    );

    let recycle_loop = async {
        if let Some(recycler) = recycler.as_ref() {
            every(
                "Recycle",
                Duration::from_secs(config.recycle.interval_secs),
                false,
                rx.clone(),
                move || async move {
                    if let Err(e) = recycle_locked(recycler, lock_dir).await {
                        tracing::error!("Recycle cycle skipped: {:#}", e);
                    }
                },
            )
            .await;
        }
    };

    let stopper = async {
        shutdown_signal.await;
        tracing::info!("Shutdown signal received, finishing in-flight cycles");
        let _ = tx.send(true);
    };

    tokio::join!(probe_loop, recycle_loop, stopper);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{HealthState, MockAlertSink, MockReachabilityProbe, MockStateStore, ProbeResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_every_runs_immediately_then_per_period() {
        let (tx, rx) = watch::channel(false);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let handle = tokio::spawn(async move {
            every("test", Duration::from_secs(60), true, rx, move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
        });

        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        // t=0, t=60, t=120
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_delayed_start_skips_first_tick() {
        let (tx, rx) = watch::channel(false);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let handle = tokio::spawn(async move {
            every("test", Duration::from_secs(100), false, rx, move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
        });

        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycles_never_overlap() {
        let (tx, rx) = watch::channel(false);
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let (a, m) = (active.clone(), max_active.clone());

        let handle = tokio::spawn(async move {
            every("slow", Duration::from_secs(10), true, rx, move || {
                let (a, m) = (a.clone(), m.clone());
                async move {
                    let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                    m.fetch_max(now, Ordering::SeqCst);
                    // Three times longer than the period
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    a.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await;
        });

        tokio::time::sleep(Duration::from_secs(200)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_probe_skipped_while_lock_held() {
        let dir = tempfile::tempdir().unwrap();
        let _held = RunLock::acquire(dir.path(), PROBE_LOCK).unwrap().unwrap();

        let mut probe = MockReachabilityProbe::new();
        probe.expect_probe().times(0);
        let mut store = MockStateStore::new();
        store.expect_load().times(0);
        store.expect_save().times(0);
        let mut sink = MockAlertSink::new();
        sink.expect_dispatch().times(0);
        let prober = LivenessProber::new("10.0.0.1", Box::new(probe), Box::new(store), Box::new(sink));

        assert!(probe_locked(&prober, dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_probe_runs_and_releases_lock() {
        let dir = tempfile::tempdir().unwrap();

        let mut probe = MockReachabilityProbe::new();
        probe.expect_probe().times(1).returning(|t| ProbeResult::up(t, 1.0, "ok"));
        let mut store = MockStateStore::new();
        store.expect_load().return_const(HealthState::Up);
        store.expect_save().times(1).returning(|_| Ok(()));
        let sink = MockAlertSink::new();
        let prober = LivenessProber::new("10.0.0.1", Box::new(probe), Box::new(store), Box::new(sink));

        let report = probe_locked(&prober, dir.path()).await.unwrap();
        assert!(report.is_some());
        assert!(!dir.path().join("probe.lock").exists());
    }

    #[test]
    fn test_build_prober_fails_fast_without_target() {
        let mut config = Config::default();
        config.alert.webhook_url = Some("https://hooks.example.com/x".to_string());
        assert!(build_prober(&config).is_err());
    }

    #[tokio::test]
    async fn test_build_recycler_fails_fast_without_group() {
        let config = Config::default();
        assert!(build_recycler(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_daemon_stops_on_signal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.probe.target_host = Some("127.0.0.1".to_string());
        config.probe.method = crate::config::ProbeMethod::Tcp;
        config.probe.port = Some(9);
        config.alert.webhook_url = Some("http://127.0.0.1:9/hook".to_string());
        config.state_file = Some(dir.path().join("state"));

        let result = run_daemon(&config, tokio::time::sleep(Duration::from_millis(300))).await;
        assert!(result.is_ok());
    }
}
