//! Published state machine ARNs
//!
//! Every registered state machine is published under
//! `OFFLINE_STEP_FUNCTIONS_ARN_<name>` so other tooling in the same session can
//! look it up by name. Handles are cheap to clone and share one map.

use crate::Result;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;

pub const ARN_PREFIX: &str = "OFFLINE_STEP_FUNCTIONS_ARN";

/// Concurrency-safe `publication name -> ARN` map
#[derive(Debug, Clone, Default)]
pub struct ArnRegistry {
    entries: Arc<DashMap<String, String>>,
}

impl ArnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `OFFLINE_STEP_FUNCTIONS_ARN_<name>`
    pub fn publication_name(state_machine: &str) -> String {
        format!("{}_{}", ARN_PREFIX, state_machine)
    }

    /// Publish an ARN and return the name it is available under
    pub fn publish(&self, state_machine: &str, arn: impl Into<String>) -> String {
        let key = Self::publication_name(state_machine);
        self.entries.insert(key.clone(), arn.into());
        key
    }

    /// ARN of a state machine by its name
    pub fn lookup(&self, state_machine: &str) -> Option<String> {
        self.get(&Self::publication_name(state_machine))
    }

    /// ARN by publication name
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot sorted by publication name
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort();
        entries
    }

    /// `KEY=value` lines, suitable for a dotenv file
    pub fn to_env_lines(&self) -> String {
        self.entries()
            .into_iter()
            .map(|(key, arn)| format!("{}={}\n", key, arn))
            .collect()
    }

    /// Write the snapshot as a dotenv file
    pub async fn write_env_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, self.to_env_lines()).await?;
        tracing::info!("Wrote {} ARN(s) to {:?}", self.len(), path);
        Ok(())
    }
}
