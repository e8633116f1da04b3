//! Task resource resolution
//!
//! Rewrites every `Task` state's `Resource` into the ARN of the Lambda
//! function deployed for it, walking `Parallel` branches and `Map`
//! sub-machines with the same context.

use super::state::{StateMachineDefinition, StateType, States};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Deployment parameters needed to address functions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionContext {
    pub region: String,
    pub account_id: String,
    pub service: String,
    pub stage: String,
    /// State name -> logical function name
    pub functions: HashMap<String, String>,
}

impl ResolutionContext {
    pub fn new(
        region: impl Into<String>,
        account_id: impl Into<String>,
        service: impl Into<String>,
        stage: impl Into<String>,
        functions: HashMap<String, String>,
    ) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
            service: service.into(),
            stage: stage.into(),
            functions,
        }
    }

    /// ARN of the deployed function `<service>-<stage>-<function>`
    pub fn function_arn(&self, function_name: &str) -> String {
        format!(
            "arn:aws:lambda:{}:{}:function:{}-{}-{}",
            self.region, self.account_id, self.service, self.stage, function_name
        )
    }

    /// Placeholder execution role; the emulator does not enforce IAM
    pub fn role_arn(&self) -> String {
        format!("arn:aws:iam::{}:role/service-role/MyRole", self.account_id)
    }
}

/// Resolve a definition into a new tree. The input is never modified, so a
/// failure leaves the caller with exactly what it passed in.
pub fn resolve(
    definition: &StateMachineDefinition,
    context: &ResolutionContext,
) -> Result<StateMachineDefinition> {
    let mut resolved = definition.clone();
    resolve_in_place(&mut resolved, context)?;
    Ok(resolved)
}

fn resolve_in_place(
    definition: &mut StateMachineDefinition,
    context: &ResolutionContext,
) -> Result<()> {
    match definition.states.as_mut() {
        Some(states) => resolve_states(states, context),
        None => Ok(()),
    }
}

fn resolve_states(states: &mut States, context: &ResolutionContext) -> Result<()> {
    for (name, state) in states.iter_mut() {
        match &state.state_type {
            Some(StateType::Task) => {
                let function = context
                    .functions
                    .get(name)
                    .ok_or_else(|| Error::UnmappedTaskState {
                        state: name.clone(),
                    })?;
                state.resource = Some(Value::String(context.function_arn(function)));
            }
            _ if state.resource.is_some() => {
                return Err(Error::UnsupportedStateType {
                    state: name.clone(),
                    state_type: state.type_name().to_string(),
                });
            }
            _ => {}
        }

        for sub_machine in state.sub_machines_mut() {
            resolve_in_place(sub_machine, context)?;
        }
    }

    Ok(())
}
