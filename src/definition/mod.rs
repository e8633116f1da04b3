//! Definition module - State machine documents and resource resolution

use crate::Result;

pub mod resolver;
pub mod state;

// Re-export key types
pub use resolver::ResolutionContext;
pub use state::{State, StateMachineDefinition, StateName, StateType, States};

/// Resolve every Task resource of a definition against a deployment context
pub fn resolve_definition(
    definition: &StateMachineDefinition,
    context: &ResolutionContext,
) -> Result<StateMachineDefinition> {
    resolver::resolve(definition, context)
}
