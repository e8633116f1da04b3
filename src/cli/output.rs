//! Output formatting module
//!
//! This module handles printing registration results and resolved definitions.

use crate::{
    Result,
    definition::StateMachineDefinition,
    emulator::{ArnRegistry, RegistrationOutcome},
};
use serde_json::{Map, Value, json};

/// Output published ARNs as shell `export` lines
pub fn output_env(w: &mut impl std::io::Write, registry: &ArnRegistry) -> Result<()> {
    for (key, arn) in registry.entries() {
        writeln!(w, "export {}={}", key, arn)?;
    }
    Ok(())
}

/// Output registration outcomes as JSON
pub fn output_json(w: &mut impl std::io::Write, outcomes: &[RegistrationOutcome]) -> Result<()> {
    let registered = outcomes.iter().filter(|o| o.is_success()).count();

    let output = json!({
        "summary": {
            "total": outcomes.len(),
            "registered": registered,
            "failed": outcomes.len() - registered,
        },
        "stateMachines": outcomes.iter().map(|o| match &o.result {
            Ok(machine) => json!({
                "name": o.name,
                "arn": machine.arn,
                "publishedAs": ArnRegistry::publication_name(&o.name),
            }),
            Err(e) => json!({
                "name": o.name,
                "error": e.to_string(),
            }),
        }).collect::<Vec<_>>(),
    });

    serde_json::to_writer_pretty(&mut *w, &output)?;
    writeln!(w)?; // Add trailing newline
    Ok(())
}

/// Output registration outcomes as text table
pub fn output_table(w: &mut impl std::io::Write, outcomes: &[RegistrationOutcome]) -> Result<()> {
    writeln!(w, "Offline Step Functions - Registered State Machines")?;
    writeln!(w, "{}", "=".repeat(100))?;
    writeln!(w)?;

    if outcomes.is_empty() {
        writeln!(w, "No state machines declared.")?;
        return Ok(());
    }

    writeln!(w, "{:<24} {:<8} {:<66}", "Name", "Status", "ARN / Error")?;
    writeln!(w, "{:-<100}", "")?;

    for outcome in outcomes {
        let (status, detail) = match &outcome.result {
            Ok(machine) => ("ok", machine.arn.clone()),
            Err(e) => ("failed", e.to_string()),
        };
        writeln!(w, "{:<24} {:<8} {:<66}", outcome.name, status, detail)?;
    }
    writeln!(w)?;

    Ok(())
}

/// Output resolved definitions as a pretty JSON object keyed by name
pub fn output_definitions(
    w: &mut impl std::io::Write,
    definitions: &[(String, StateMachineDefinition)],
) -> Result<()> {
    let mut output = Map::new();
    for (name, definition) in definitions {
        output.insert(name.clone(), serde_json::to_value(definition)?);
    }

    serde_json::to_writer_pretty(&mut *w, &Value::Object(output))?;
    writeln!(w)?;
    Ok(())
}
