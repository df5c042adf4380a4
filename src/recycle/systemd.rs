// systemd unit group control over D-Bus

use crate::error::{ProcessControlError, Result, WardenError};
use crate::recycle::GroupController;
use async_trait::async_trait;
use futures::future::join_all;
use std::time::Duration;
use tokio::time::timeout;
use zbus::Connection;

const SYSTEMD_DEST: &str = "org.freedesktop.systemd1";
const SYSTEMD_PATH: &str = "/org/freedesktop/systemd1";
const SYSTEMD_MANAGER: &str = "org.freedesktop.systemd1.Manager";

/// A fixed set of systemd units stopped and started together
pub struct SystemdGroup {
    connection: Connection,
    units: Vec<String>,
    call_timeout: Duration,
}

impl SystemdGroup {
    /// Connect to the system bus and validate every unit name up front
    pub async fn connect(units: Vec<String>, call_timeout: Duration) -> Result<Self> {
        for unit in &units {
            validate_unit_name(unit)?;
        }

        let connection = timeout(call_timeout, Connection::system())
            .await
            .map_err(|_| WardenError::Config("Timed out connecting to the systemd D-Bus".to_string()))?
            .map_err(|e| WardenError::Config(format!("Failed to connect to systemd D-Bus: {}", e)))?;

        Ok(Self {
            connection,
            units,
            call_timeout,
        })
    }

    async fn call_unit(&self, method: &str, unit: &str) -> std::result::Result<(), String> {
        let call = async {
            let proxy = zbus::Proxy::new(&self.connection, SYSTEMD_DEST, SYSTEMD_PATH, SYSTEMD_MANAGER)
                .await
                .map_err(|e| e.to_string())?;

            // The job path is not tracked; systemd queues the job with mode "replace"
            let _job_path: zbus::zvariant::OwnedObjectPath = proxy
                .call(method, &(unit, "replace"))
                .await
                .map_err(|e| {
                    let error_msg = e.to_string();
                    if error_msg.contains("Access denied") || error_msg.contains("Authentication") {
                        "access denied, run as root or grant polkit rights".to_string()
                    } else {
                        error_msg
                    }
                })?;
            Ok::<(), String>(())
        };

        match timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(format!("no reply within {}s", self.call_timeout.as_secs())),
        }
    }

    /// Issue `method` for every unit; all are attempted even if some fail
    async fn call_all(&self, method: &str) -> std::result::Result<(), ProcessControlError> {
        let results = join_all(self.units.iter().map(|unit| async move {
            (unit.clone(), self.call_unit(method, unit).await)
        }))
        .await;

        let mut failed = Vec::new();
        let mut messages = Vec::new();
        for (unit, result) in results {
            if let Err(message) = result {
                tracing::warn!("{} {} failed: {}", method, unit, message);
                messages.push(format!("{}: {}", unit, message));
                failed.push(unit);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ProcessControlError::Systemd {
                operation: method.to_string(),
                units: failed,
                message: messages.join("; "),
            })
        }
    }
}

#[async_trait]
impl GroupController for SystemdGroup {
    fn describe(&self) -> String {
        format!("systemd units [{}]", self.units.join(", "))
    }

    async fn stop(&self) -> std::result::Result<(), ProcessControlError> {
        self.call_all("StopUnit").await
    }

    async fn start(&self) -> std::result::Result<(), ProcessControlError> {
        self.call_all("StartUnit").await
    }
}

/// Unit names go straight into a privileged D-Bus call
pub fn validate_unit_name(unit: &str) -> std::result::Result<(), ProcessControlError> {
    let invalid = || ProcessControlError::InvalidUnit(unit.to_string());

    if unit.is_empty() || unit.len() > 256 {
        return Err(invalid());
    }
    if unit.contains("..") || unit.contains('/') || unit.contains('\0') || unit.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    const SUFFIXES: &[&str] = &[".service", ".target", ".socket", ".timer"];
    if !SUFFIXES.iter().any(|suffix| unit.ends_with(suffix) && unit.len() > suffix.len()) {
        return Err(invalid());
    }

    Ok(())
}
