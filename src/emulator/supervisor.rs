//! Emulator lifecycle supervision
//!
//! Drives the emulator through `NotStarted -> Starting -> Ready -> Stopped`.
//! A health check that runs out of attempts, or is cancelled, moves it to
//! `Failed` instead, and nothing leads back to `Ready` afterwards.

use super::{ArnRegistry, CreateStateMachineInput, RegisteredStateMachine, StepFunctionsApi};
use crate::config::EmulatorConfig;
use crate::definition::StateMachineDefinition;
use crate::manifest::Deployment;
use crate::{Error, Result};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Supervisor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Starting,
    Ready,
    Stopped,
    Failed,
}

/// How to launch the emulator process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub account_id: String,
    pub region: String,
    /// Where the emulator sends Task invocations
    pub lambda_endpoint: String,
}

impl LaunchSpec {
    /// `None` when no command is configured and a running emulator is used
    pub fn from_config(config: &EmulatorConfig, deployment: &Deployment) -> Option<Self> {
        config.command.as_ref().map(|program| Self {
            program: program.clone(),
            args: config.args.clone(),
            account_id: deployment.account_id.clone(),
            region: deployment.region.clone(),
            lambda_endpoint: config.lambda_endpoint.clone(),
        })
    }

    /// Configured arguments followed by the generated ones
    pub fn command_line(&self) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            "--aws-account".to_string(),
            self.account_id.clone(),
            "--aws-region".to_string(),
            self.region.clone(),
            "--lambda-endpoint".to_string(),
            self.lambda_endpoint.clone(),
        ]);
        args
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.command_line())
            // container images read these instead of flags
            .env("AWS_ACCOUNT_ID", &self.account_id)
            .env("AWS_DEFAULT_REGION", &self.region)
            .env("LAMBDA_ENDPOINT", &self.lambda_endpoint)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// Result of registering (or failing to resolve) one state machine
#[derive(Debug)]
pub struct RegistrationOutcome {
    pub name: String,
    pub result: Result<RegisteredStateMachine>,
}

impl RegistrationOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Starts, health-checks, feeds and stops one emulator instance
pub struct EmulatorSupervisor {
    api: Arc<dyn StepFunctionsApi>,
    registry: ArnRegistry,
    launch: Option<LaunchSpec>,
    max_retries: u32,
    retry_delay: Duration,
    state: Mutex<LifecycleState>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl EmulatorSupervisor {
    /// Supervise an emulator reached through `api`, publishing into `registry`
    pub fn new(api: Arc<dyn StepFunctionsApi>, registry: ArnRegistry) -> Self {
        Self {
            api,
            registry,
            launch: None,
            max_retries: 5,
            retry_delay: Duration::from_secs(1),
            state: Mutex::new(LifecycleState::NotStarted),
            child: tokio::sync::Mutex::new(None),
        }
    }

    /// Spawn the emulator on `start` instead of attaching to a running one
    pub fn with_launch(mut self, launch: Option<LaunchSpec>) -> Self {
        self.launch = launch;
        self
    }

    /// Set maximum health probe attempts
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set delay between health probe attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn registry(&self) -> &ArnRegistry {
        &self.registry
    }

    pub fn endpoint(&self) -> &str {
        self.api.endpoint()
    }

    fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        tracing::debug!("Emulator lifecycle {:?} -> {:?}", *state, next);
        *state = next;
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != from {
            return Err(Error::lifecycle(format!(
                "cannot move emulator from {:?} to {:?}",
                *state, to
            )));
        }
        tracing::debug!("Emulator lifecycle {:?} -> {:?}", from, to);
        *state = to;
        Ok(())
    }

    /// Launch the emulator, or attach to a running one when no command is set
    pub async fn start(&self) -> Result<()> {
        self.transition(LifecycleState::NotStarted, LifecycleState::Starting)?;

        let Some(spec) = &self.launch else {
            tracing::info!("Using running Step Functions emulator at {}", self.endpoint());
            return Ok(());
        };

        tracing::info!(
            "Starting Step Functions emulator: {} {}",
            spec.program,
            spec.command_line().join(" ")
        );

        match spec.command().spawn() {
            Ok(mut child) => {
                if let Some(stdout) = child.stdout.take() {
                    forward_output(stdout, "stdout");
                }
                if let Some(stderr) = child.stderr.take() {
                    forward_output(stderr, "stderr");
                }
                tracing::info!(pid = ?child.id(), "Emulator process started");
                *self.child.lock().await = Some(child);
                Ok(())
            }
            Err(e) => {
                self.set_state(LifecycleState::Failed);
                Err(Error::lifecycle(format!(
                    "failed to launch {}: {}",
                    spec.program, e
                )))
            }
        }
    }

    /// Probe the control API until it answers, the attempts run out, or
    /// `cancel` fires. Worst case blocks for `max_retries * retry_delay`
    /// plus the probe timeouts.
    pub async fn wait_until_ready(&self, cancel: &CancellationToken) -> Result<()> {
        let state = self.state();
        if state != LifecycleState::Starting {
            return Err(Error::lifecycle(format!(
                "health check needs a starting emulator, state is {:?}",
                state
            )));
        }

        let max_attempts = self.max_retries.max(1);
        let mut attempts = 0;
        let mut last_error = String::from("no probe attempted");

        while attempts < max_attempts {
            if let Some(status) = self.exited().await {
                last_error = format!("emulator process exited with {}", status);
                break;
            }

            attempts += 1;
            let probe = tokio::select! {
                _ = cancel.cancelled() => return self.cancelled(),
                probe = self.api.list_state_machines() => probe,
            };

            match probe {
                Ok(listing) => {
                    self.set_state(LifecycleState::Ready);
                    tracing::info!(
                        "Step Functions emulator ready at {} ({} existing state machine(s))",
                        self.endpoint(),
                        listing.state_machines.len()
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        "Emulator health check failed (attempt {}/{}): {}",
                        attempts,
                        max_attempts,
                        e
                    );
                    last_error = e.to_string();
                }
            }

            if attempts < max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return self.cancelled(),
                    _ = sleep(self.retry_delay) => {}
                }
            }
        }

        self.set_state(LifecycleState::Failed);
        Err(Error::EmulatorUnreachable {
            endpoint: self.endpoint().to_string(),
            attempts,
            reason: last_error,
        })
    }

    fn cancelled<T>(&self) -> Result<T> {
        tracing::info!("Emulator health check cancelled");
        self.set_state(LifecycleState::Failed);
        Err(Error::Cancelled)
    }

    async fn exited(&self) -> Option<ExitStatus> {
        let mut child = self.child.lock().await;
        let status = match child.as_mut()?.try_wait() {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!("Failed to poll emulator process: {}", e);
                None
            }
        };
        if status.is_some() {
            *child = None;
        }
        status
    }

    /// Submit one resolved definition and publish its ARN
    pub async fn register_state_machine(
        &self,
        name: &str,
        definition: &StateMachineDefinition,
        role_arn: &str,
    ) -> Result<RegisteredStateMachine> {
        let failed = |reason: String| {
            tracing::error!("Failed to create state machine {}: {}", name, reason);
            Error::RegistrationFailed {
                name: name.to_string(),
                reason,
            }
        };

        let state = self.state();
        if state != LifecycleState::Ready {
            return Err(failed(format!("emulator is not ready ({:?})", state)));
        }

        tracing::info!("Creating state machine {}", name);

        let definition = definition.to_json().map_err(|e| failed(e.to_string()))?;
        let input = CreateStateMachineInput {
            name: name.to_string(),
            definition: definition.clone(),
            role_arn: role_arn.to_string(),
        };

        let output = self
            .api
            .create_state_machine(input)
            .await
            .map_err(|e| failed(e.to_string()))?;

        let key = self.registry.publish(name, &output.state_machine_arn);
        tracing::info!("Successfully created {}", output.state_machine_arn);
        tracing::info!("ARN available at {}", key);

        Ok(RegisteredStateMachine {
            name: name.to_string(),
            arn: output.state_machine_arn,
            definition,
        })
    }

    /// Register every definition concurrently. Each outcome stands alone; one
    /// failure never cancels or hides the others. Outcomes keep input order.
    pub async fn register_all(
        self: &Arc<Self>,
        machines: Vec<(String, StateMachineDefinition)>,
        role_arn: &str,
    ) -> Vec<RegistrationOutcome> {
        let tasks: Vec<_> = machines
            .into_iter()
            .map(|(name, definition)| {
                let supervisor = Arc::clone(self);
                let role_arn = role_arn.to_string();
                let task_name = name.clone();
                let task = tokio::spawn(async move {
                    supervisor
                        .register_state_machine(&task_name, &definition, &role_arn)
                        .await
                });
                (name, task)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (name, task) in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!("Registration task for {} failed: {}", name, e);
                    Err(Error::RegistrationFailed {
                        name: name.clone(),
                        reason: e.to_string(),
                    })
                }
            };
            outcomes.push(RegistrationOutcome { name, result });
        }

        outcomes
    }

    /// Stop the spawned emulator. Safe in any state; never fails.
    pub async fn stop(&self) {
        let previous = self.state();

        if let Some(mut child) = self.child.lock().await.take() {
            let pid = child.id();
            match child.kill().await {
                Ok(()) => tracing::info!(?pid, "Stopped Step Functions emulator"),
                Err(e) => tracing::warn!("Failed to stop emulator process {:?}: {}", pid, e),
            }
        }

        match previous {
            LifecycleState::NotStarted => {
                tracing::debug!("Emulator was never started, nothing to stop")
            }
            LifecycleState::Starting | LifecycleState::Ready => {
                self.set_state(LifecycleState::Stopped)
            }
            LifecycleState::Stopped | LifecycleState::Failed => {}
        }
    }
}

fn forward_output<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(target: "emulator", stream, "{}", line);
        }
    });
}
