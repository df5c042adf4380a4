// docker compose stack control

use crate::error::ProcessControlError;
use crate::recycle::GroupController;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// A compose application stack driven through the docker CLI
#[derive(Debug, Clone)]
pub struct ComposeGroup {
    program: String,
    file: PathBuf,
    project: Option<String>,
    command_timeout: Duration,
}

impl ComposeGroup {
    pub fn new(file: PathBuf, project: Option<String>, command_timeout: Duration) -> Self {
        Self {
            program: "docker".to_string(),
            file,
            project,
            command_timeout,
        }
    }

    /// Use a different executable in place of `docker`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments for `docker compose ... <operation>`
    pub fn command_args(&self, operation: &str) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "-f".to_string(),
            self.file.display().to_string(),
        ];
        if let Some(project) = &self.project {
            args.push("-p".to_string());
            args.push(project.clone());
        }
        args.push(operation.to_string());
        args
    }

    async fn compose(&self, operation: &str) -> Result<(), ProcessControlError> {
        let args = self.command_args(operation);
        run_command(&self.program, &args, self.command_timeout).await
    }
}

#[async_trait]
impl GroupController for ComposeGroup {
    fn describe(&self) -> String {
        match &self.project {
            Some(project) => format!("compose stack {} ({})", project, self.file.display()),
            None => format!("compose stack {}", self.file.display()),
        }
    }

    async fn stop(&self) -> Result<(), ProcessControlError> {
        self.compose("stop").await
    }

    async fn start(&self) -> Result<(), ProcessControlError> {
        self.compose("start").await
    }
}

/// Run a command to completion within `limit`. The child is killed if the
/// limit elapses.
pub async fn run_command(program: &str, args: &[String], limit: Duration) -> Result<(), ProcessControlError> {
    let command_line = std::iter::once(program.to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ");
    tracing::debug!("Running `{}`", command_line);

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ProcessControlError::Spawn {
            command: command_line.clone(),
            message: e.to_string(),
        })?;

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(ProcessControlError::Spawn {
                command: command_line,
                message: e.to_string(),
            })
        }
        Err(_) => {
            return Err(ProcessControlError::Timeout {
                command: command_line,
                secs: limit.as_secs(),
            })
        }
    };

    if output.status.success() {
        Ok(())
    } else {
        Err(ProcessControlError::ExitStatus {
            command: command_line,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
