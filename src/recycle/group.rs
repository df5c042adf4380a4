// Managed service group capability

use crate::config::{Config, GroupConfig};
use crate::error::{ProcessControlError, Result, WardenError};
use crate::recycle::{ComposeGroup, SystemdGroup};
use async_trait::async_trait;

/// Stop/start control over the whole managed group. Each call is one
/// attempt bounded by the implementation's command timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupController: Send + Sync {
    /// Short identity used in logs
    fn describe(&self) -> String;

    async fn stop(&self) -> std::result::Result<(), ProcessControlError>;

    async fn start(&self) -> std::result::Result<(), ProcessControlError>;
}

/// Build the configured group controller. Assumes `Config::validate_recycle` passed.
pub async fn build_group(config: &Config) -> Result<Box<dyn GroupController>> {
    match &config.recycle.group {
        Some(GroupConfig::Compose { file, project }) => Ok(Box::new(ComposeGroup::new(
            file.clone(),
            project.clone(),
            config.command_timeout(),
        ))),
        Some(GroupConfig::Systemd { units }) => {
            let group = SystemdGroup::connect(units.clone(), config.command_timeout()).await?;
            Ok(Box::new(group))
        }
        None => Err(WardenError::Config("recycle.group is required".to_string()).into()),
    }
}
