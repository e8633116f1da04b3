//! Emulator module - Talking to and supervising the local Step Functions emulator
//!
//! This module provides a trait-based abstraction over the emulator control
//! API, an HTTP implementation of it, the registry that publishes ARNs, and the
//! supervisor that ties the emulator's lifecycle together.

use crate::manifest::Deployment;
use crate::{Config, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub mod client;
pub mod models;
pub mod registry;
pub mod supervisor;

// Re-export key types
pub use client::HttpStepFunctions;
pub use models::{
    CreateStateMachineInput, CreateStateMachineOutput, ListStateMachinesInput,
    ListStateMachinesOutput, RegisteredStateMachine, StateMachineListItem,
};
pub use registry::{ARN_PREFIX, ArnRegistry};
pub use supervisor::{EmulatorSupervisor, LaunchSpec, LifecycleState, RegistrationOutcome};

/// Step Functions control API
///
/// Implementations:
/// - `HttpStepFunctions`: JSON protocol over HTTP against a local emulator
#[async_trait]
pub trait StepFunctionsApi: Send + Sync {
    /// Base URL requests are sent to
    fn endpoint(&self) -> &str;

    /// Cheap call used as the health probe
    async fn list_state_machines(&self) -> Result<ListStateMachinesOutput>;

    /// Register a state machine, returning its ARN
    async fn create_state_machine(
        &self,
        input: CreateStateMachineInput,
    ) -> Result<CreateStateMachineOutput>;
}

/// Create a supervisor for the emulator a deployment points at
pub fn create_supervisor(
    config: &Config,
    deployment: &Deployment,
    registry: ArnRegistry,
) -> Result<Arc<EmulatorSupervisor>> {
    let api = HttpStepFunctions::new(deployment.endpoint(), config.emulator.request_timeout)?;

    let supervisor = EmulatorSupervisor::new(Arc::new(api), registry)
        .with_launch(LaunchSpec::from_config(&config.emulator, deployment))
        .with_max_retries(config.health.max_retries)
        .with_retry_delay(config.health.retry_delay);

    Ok(Arc::new(supervisor))
}
