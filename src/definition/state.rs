//! Amazon States Language document model
//!
//! Only the fields the resolver touches are typed. Everything else a state or
//! a state machine declares is kept in a flattened map and written back out
//! unchanged, in its original order.

use crate::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type StateName = String;

/// Ordered `States` object of a state machine
pub type States = IndexMap<StateName, State>;

/// A state machine, or a nested branch / iterator of one
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateMachineDefinition {
    /// `StartAt`, `Comment`, `TimeoutSeconds`, `ProcessorConfig`, ...
    #[serde(flatten)]
    pub fields: Map<String, Value>,

    #[serde(rename = "States", default, skip_serializing_if = "Option::is_none")]
    pub states: Option<States>,
}

/// A single state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Absent on malformed states, which then fail resolution instead of parsing
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub state_type: Option<StateType>,

    /// Usually a string, but manifests often carry intrinsic functions
    /// (`Fn::GetAtt`) here, so the raw value is kept.
    #[serde(rename = "Resource", default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,

    #[serde(rename = "Branches", default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<StateMachineDefinition>>,

    /// Legacy `Map` state sub-machine
    #[serde(rename = "Iterator", default, skip_serializing_if = "Option::is_none")]
    pub iterator: Option<Box<StateMachineDefinition>>,

    #[serde(rename = "ItemProcessor", default, skip_serializing_if = "Option::is_none")]
    pub item_processor: Option<Box<StateMachineDefinition>>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// State `Type` discriminator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StateType {
    Task,
    Parallel,
    Map,
    Choice,
    Pass,
    Wait,
    Succeed,
    Fail,
    /// Anything the States Language does not define, kept verbatim
    Other(String),
}

impl StateType {
    pub fn as_str(&self) -> &str {
        match self {
            StateType::Task => "Task",
            StateType::Parallel => "Parallel",
            StateType::Map => "Map",
            StateType::Choice => "Choice",
            StateType::Pass => "Pass",
            StateType::Wait => "Wait",
            StateType::Succeed => "Succeed",
            StateType::Fail => "Fail",
            StateType::Other(name) => name,
        }
    }
}

impl From<String> for StateType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Task" => StateType::Task,
            "Parallel" => StateType::Parallel,
            "Map" => StateType::Map,
            "Choice" => StateType::Choice,
            "Pass" => StateType::Pass,
            "Wait" => StateType::Wait,
            "Succeed" => StateType::Succeed,
            "Fail" => StateType::Fail,
            _ => StateType::Other(value),
        }
    }
}

impl From<StateType> for String {
    fn from(value: StateType) -> Self {
        match value {
            StateType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl State {
    /// Build a bare state of the given type
    pub fn new(state_type: StateType) -> Self {
        Self {
            state_type: Some(state_type),
            resource: None,
            branches: None,
            iterator: None,
            item_processor: None,
            fields: Map::new(),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<Value>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_branches(mut self, branches: Vec<StateMachineDefinition>) -> Self {
        self.branches = Some(branches);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn is_task(&self) -> bool {
        self.state_type == Some(StateType::Task)
    }

    /// `Type` for messages, `"undefined"` when the state has none
    pub fn type_name(&self) -> &str {
        self.state_type.as_ref().map_or("undefined", StateType::as_str)
    }

    /// Resource as a plain string, if it is one
    pub fn resource_str(&self) -> Option<&str> {
        self.resource.as_ref().and_then(Value::as_str)
    }

    /// Nested sub-machines in declaration order: branches first, then the
    /// `Map` iterator / item processor.
    pub fn sub_machines(&self) -> impl Iterator<Item = &StateMachineDefinition> {
        self.branches
            .iter()
            .flatten()
            .chain(self.iterator.as_deref())
            .chain(self.item_processor.as_deref())
    }

    pub fn sub_machines_mut(&mut self) -> impl Iterator<Item = &mut StateMachineDefinition> {
        self.branches
            .iter_mut()
            .flatten()
            .chain(self.iterator.as_deref_mut())
            .chain(self.item_processor.as_deref_mut())
    }
}

impl StateMachineDefinition {
    /// Start an empty definition with a `StartAt`
    pub fn starting_at(start_at: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("StartAt".to_string(), Value::String(start_at.into()));
        Self {
            fields,
            states: Some(States::new()),
        }
    }

    pub fn with_state(mut self, name: impl Into<StateName>, state: State) -> Self {
        self.states
            .get_or_insert_with(States::new)
            .insert(name.into(), state);
        self
    }

    /// Parse from any serde value (JSON or YAML-sourced)
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Compact JSON, as sent to the emulator
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Number of states, nested ones included
    pub fn state_count(&self) -> usize {
        self.states
            .iter()
            .flatten()
            .map(|(_, state)| 1 + state.sub_machines().map(Self::state_count).sum::<usize>())
            .sum()
    }
}
