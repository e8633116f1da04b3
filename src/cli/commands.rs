//! CLI command implementations
//!
//! This module contains the implementation for each CLI command.

use crate::cli::ServiceArgs;
use crate::manifest::{DeploymentOverrides, ServiceManifest};
use crate::session::Session;
use crate::{Config, Result, cli::Cli};

/// Load the service manifest and build the session it describes
fn load_session(args: &ServiceArgs) -> Result<Session> {
    tracing::debug!("Loading service manifest from {:?}", args.service_file);
    let manifest = ServiceManifest::from_file(&args.service_file)?;

    let overrides = DeploymentOverrides {
        stage: args.stage.clone(),
        region: args.region.clone(),
    };
    let session = Session::new(&manifest, &overrides);

    let deployment = session.deployment();
    tracing::info!(
        "Service {} (stage {}, region {}, account {})",
        deployment.service,
        deployment.stage,
        deployment.region,
        deployment.account_id
    );

    Ok(session)
}

/// Start command implementation
pub mod start {
    use super::*;
    use crate::cli::{Commands, OutputFormat, output};
    use crate::emulator::{ArnRegistry, LifecycleState, create_supervisor};
    use tokio_util::sync::CancellationToken;

    /// Execute the start command
    pub async fn execute(args: Cli, config: Config) -> Result<()> {
        let (service, format, env_file) = match args.command {
            Commands::Start {
                service,
                format,
                env_file,
            } => (service, format, env_file),
            _ => unreachable!("start::execute called with wrong command"),
        };

        let session = load_session(&service)?;
        let registry = ArnRegistry::new();
        let supervisor = create_supervisor(&config, session.deployment(), registry.clone())?;

        // Ctrl+C aborts a pending health check and ends a running session
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_signal.cancel();
            }
        });

        let outcomes = match session.start(&supervisor, &cancel).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                session.end(&supervisor).await;
                if e.is_cancelled() {
                    return Ok(());
                }
                return Err(e);
            }
        };

        for (name, e) in crate::session::failures(&outcomes) {
            tracing::warn!("State machine {} is not available offline: {}", name, e);
        }

        let mut stdout = std::io::stdout();
        let published = match format {
            OutputFormat::Env => output::output_env(&mut stdout, &registry),
            OutputFormat::Json => output::output_json(&mut stdout, &outcomes),
            OutputFormat::Table => output::output_table(&mut stdout, &outcomes),
        };

        let written = match env_file.or_else(|| config.output.env_file.clone()) {
            Some(path) => registry.write_env_file(&path).await,
            None => Ok(()),
        };

        if published.is_ok() && written.is_ok() && supervisor.state() == LifecycleState::Ready {
            tracing::info!("Step Functions emulator running, press Ctrl+C to stop");
            cancel.cancelled().await;
        }

        session.end(&supervisor).await;
        published?;
        written
    }
}

/// Resolve command implementation
pub mod resolve {
    use super::*;
    use crate::cli::output;

    /// Execute the resolve command
    pub fn execute(service: &ServiceArgs, name: Option<&str>) -> Result<()> {
        let session = load_session(service)?;
        let mut stdout = std::io::stdout();

        if let Some(name) = name {
            let definition = session.resolve_one(name)?;
            return output::output_definitions(&mut stdout, &[(name.to_string(), definition)]);
        }

        let mut resolved = Vec::new();
        let mut failed = Vec::new();
        for (name, result) in session.resolve_all() {
            match result {
                Ok(definition) => resolved.push((name, definition)),
                Err(e) => failed.push((name, e)),
            }
        }

        output::output_definitions(&mut stdout, &resolved)?;

        if !failed.is_empty() {
            for (name, e) in &failed {
                eprintln!("{}: {}", name, e);
            }
            crate::bail!("{} state machine(s) failed to resolve", failed.len());
        }

        Ok(())
    }
}
