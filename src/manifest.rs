//! Service manifest loading
//!
//! Reads the `serverless.yml`-shaped document that declares the service, its
//! provider settings, the function mapping for Task states, and the state
//! machines themselves. Variable interpolation (`${self:...}`) is expected to
//! have happened before the file reaches this tool.
//!
//! CloudFormation short-form tags (`!GetAtt`, `!Ref`, `!Sub`, ...) are
//! rewritten into their long form while loading. Definitions are kept as raw
//! JSON so that one malformed state machine cannot fail the whole manifest.

use crate::definition::ResolutionContext;
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serde_yaml::{Mapping, Value as YamlValue, value::TaggedValue};
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_ACCOUNT_ID: &str = "0123456789";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 4584;
pub const DEFAULT_STAGE: &str = "dev";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Parsed service manifest
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceManifest {
    pub service: ServiceName,

    #[serde(default)]
    pub provider: ProviderSection,

    #[serde(default)]
    pub custom: CustomSection,

    #[serde(default, rename = "stepFunctions")]
    pub step_functions: Option<StepFunctionsSection>,
}

/// `service: orders` or `service: { name: orders }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServiceName {
    Plain(String),
    Named { name: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSection {
    pub stage: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomSection {
    #[serde(default, rename = "offlineStepFunctions")]
    pub offline_step_functions: OfflineSection,
}

/// `custom.offlineStepFunctions`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfflineSection {
    #[serde(default, rename = "accountId", deserialize_with = "string_or_number")]
    pub account_id: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Task state name -> function name
    #[serde(default)]
    pub functions: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepFunctionsSection {
    #[serde(default, rename = "stateMachines")]
    pub state_machines: IndexMap<String, StateMachineEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateMachineEntry {
    /// Parsed into a typed definition per state machine, at resolution time
    #[serde(default)]
    pub definition: Value,
}

/// Command-line values that take precedence over the manifest
#[derive(Debug, Clone, Default)]
pub struct DeploymentOverrides {
    pub stage: Option<String>,
    pub region: Option<String>,
}

/// Everything needed to resolve and register one session's state machines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub service: String,
    pub stage: String,
    pub region: String,
    pub account_id: String,
    pub host: String,
    pub port: u16,
    pub functions: HashMap<String, String>,
}

// Unquoted account ids arrive as YAML integers
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}

/// Rewrite short-form intrinsic tags into `{"Fn::<Name>": ...}` / `{"Ref": ...}`
fn expand_intrinsic_tags(value: YamlValue) -> YamlValue {
    match value {
        YamlValue::Tagged(tagged) => {
            let TaggedValue { tag, value } = *tagged;
            let tag = tag.to_string();
            let name = tag.trim_start_matches('!');
            let value = expand_intrinsic_tags(value);

            let (key, value) = match (name, value) {
                ("Ref" | "Condition", value) => (name.to_string(), value),
                ("GetAtt", YamlValue::String(attribute)) => {
                    let parts = attribute
                        .splitn(2, '.')
                        .map(|part| YamlValue::String(part.to_string()))
                        .collect();
                    ("Fn::GetAtt".to_string(), YamlValue::Sequence(parts))
                }
                (name, value) => (format!("Fn::{name}"), value),
            };

            let mut long_form = Mapping::new();
            long_form.insert(YamlValue::String(key), value);
            YamlValue::Mapping(long_form)
        }
        YamlValue::Sequence(items) => {
            YamlValue::Sequence(items.into_iter().map(expand_intrinsic_tags).collect())
        }
        YamlValue::Mapping(entries) => YamlValue::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (expand_intrinsic_tags(k), expand_intrinsic_tags(v)))
                .collect(),
        ),
        scalar => scalar,
    }
}

impl ServiceName {
    pub fn as_str(&self) -> &str {
        match self {
            ServiceName::Plain(name) | ServiceName::Named { name } => name,
        }
    }
}

impl ServiceManifest {
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path)?;
        Self::parse(&contents).map_err(|e| Error::ManifestParse {
            file: path,
            message: e.to_string(),
        })
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(Self::parse(contents)?)
    }

    fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let document: YamlValue = serde_yaml::from_str(contents)?;
        serde_yaml::from_value(expand_intrinsic_tags(document))
    }

    pub fn service_name(&self) -> &str {
        self.service.as_str()
    }

    /// Raw definitions of the declared state machines, in manifest order;
    /// empty when none are declared
    pub fn state_machines(&self) -> IndexMap<String, Value> {
        self.step_functions
            .iter()
            .flat_map(|sf| sf.state_machines.iter())
            .map(|(name, entry)| (name.clone(), entry.definition.clone()))
            .collect()
    }

    /// Merge overrides, manifest values and defaults
    pub fn deployment(&self, overrides: &DeploymentOverrides) -> Deployment {
        let offline = &self.custom.offline_step_functions;

        Deployment {
            service: self.service_name().to_string(),
            stage: overrides
                .stage
                .clone()
                .or_else(|| self.provider.stage.clone())
                .unwrap_or_else(|| DEFAULT_STAGE.to_string()),
            region: overrides
                .region
                .clone()
                .or_else(|| self.provider.region.clone())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            account_id: offline
                .account_id
                .clone()
                .unwrap_or_else(|| DEFAULT_ACCOUNT_ID.to_string()),
            host: offline
                .host
                .clone()
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: offline.port.unwrap_or(DEFAULT_PORT),
            functions: offline.functions.clone(),
        }
    }
}

impl Deployment {
    /// Emulator control endpoint
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn resolution_context(&self) -> ResolutionContext {
        ResolutionContext::new(
            &self.region,
            &self.account_id,
            &self.service,
            &self.stage,
            self.functions.clone(),
        )
    }
}
