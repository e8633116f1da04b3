//! Development session
//!
//! One session resolves every declared state machine, brings the emulator up,
//! registers whatever resolved cleanly, and reports a per-name outcome. A
//! definition that fails to resolve never reaches the emulator, but its
//! siblings still get registered.

use crate::definition::{ResolutionContext, StateMachineDefinition, resolve_definition};
use crate::emulator::{EmulatorSupervisor, RegistrationOutcome};
use crate::manifest::{Deployment, DeploymentOverrides, ServiceManifest};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Inputs of one session, fixed for its lifetime
#[derive(Debug, Clone)]
pub struct Session {
    deployment: Deployment,
    context: ResolutionContext,
    /// Raw definitions, parsed one state machine at a time
    state_machines: IndexMap<String, Value>,
}

impl Session {
    pub fn new(manifest: &ServiceManifest, overrides: &DeploymentOverrides) -> Self {
        let deployment = manifest.deployment(overrides);
        let context = deployment.resolution_context();
        Self {
            deployment,
            context,
            state_machines: manifest.state_machines(),
        }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn state_machine_names(&self) -> impl Iterator<Item = &str> {
        self.state_machines.keys().map(String::as_str)
    }

    /// Resolve every definition, in manifest order
    pub fn resolve_all(&self) -> Vec<(String, Result<StateMachineDefinition>)> {
        self.state_machines
            .iter()
            .map(|(name, raw)| {
                let resolved = self.resolve_raw(name, raw);
                match &resolved {
                    Ok(definition) => tracing::debug!(
                        "Resolved state machine {} ({} states)",
                        name,
                        definition.state_count()
                    ),
                    Err(e) => tracing::error!("Cannot resolve state machine {}: {}", name, e),
                }
                (name.clone(), resolved)
            })
            .collect()
    }

    /// Resolve a single definition by name
    pub fn resolve_one(&self, name: &str) -> Result<StateMachineDefinition> {
        let Some(raw) = self.state_machines.get(name) else {
            crate::bail!("No state machine named {}", name);
        };
        self.resolve_raw(name, raw)
    }

    fn resolve_raw(&self, name: &str, raw: &Value) -> Result<StateMachineDefinition> {
        let definition = StateMachineDefinition::from_value(raw.clone()).map_err(|e| {
            Error::InvalidDefinition {
                name: name.to_string(),
                message: e.to_string(),
            }
        })?;
        resolve_definition(&definition, &self.context)
    }

    /// Session start: bring the emulator up and register every state machine.
    ///
    /// Returns one outcome per declared state machine, in manifest order. An
    /// emulator that never becomes ready fails the whole call; anything else
    /// is reported per name.
    pub async fn start(
        &self,
        supervisor: &Arc<EmulatorSupervisor>,
        cancel: &CancellationToken,
    ) -> Result<Vec<RegistrationOutcome>> {
        if self.state_machines.is_empty() {
            tracing::info!("No state machines found, skipping creation.");
            return Ok(Vec::new());
        }

        let mut resolved = Vec::new();
        let mut outcomes: HashMap<String, RegistrationOutcome> = HashMap::new();
        for (name, result) in self.resolve_all() {
            match result {
                Ok(definition) => resolved.push((name, definition)),
                Err(e) => {
                    outcomes.insert(
                        name.clone(),
                        RegistrationOutcome {
                            name,
                            result: Err(e),
                        },
                    );
                }
            }
        }

        supervisor.start().await?;
        supervisor.wait_until_ready(cancel).await?;

        let registered = supervisor
            .register_all(resolved, &self.context.role_arn())
            .await;
        outcomes.extend(registered.into_iter().map(|o| (o.name.clone(), o)));

        let ordered = self
            .state_machines
            .keys()
            .filter_map(|name| outcomes.remove(name))
            .collect::<Vec<_>>();

        let failed = ordered.iter().filter(|o| !o.is_success()).count();
        tracing::info!(
            "Registered {} of {} state machine(s)",
            ordered.len() - failed,
            ordered.len()
        );

        Ok(ordered)
    }

    /// Session end. Best effort: never fails.
    pub async fn end(&self, supervisor: &EmulatorSupervisor) {
        supervisor.stop().await;
    }
}

/// Group failures for reporting
pub fn failures(outcomes: &[RegistrationOutcome]) -> Vec<(&str, &Error)> {
    outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().err().map(|e| (o.name.as_str(), e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::{
        ArnRegistry, CreateStateMachineInput, CreateStateMachineOutput, LifecycleState,
        ListStateMachinesOutput, StepFunctionsApi,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    const MANIFEST: &str = r#"
service: orders
provider:
  stage: dev
  region: us-east-1
custom:
  offlineStepFunctions:
    functions:
      ChargeCard: charge
      Ship: ship
stepFunctions:
  stateMachines:
    Checkout:
      definition:
        StartAt: ChargeCard
        States:
          ChargeCard:
            Type: Task
            Next: Fan
          Fan:
            Type: Parallel
            Branches:
              - StartAt: Ship
                States:
                  Ship:
                    Type: Task
                    End: true
            End: true
    Broken:
      definition:
        StartAt: Hold
        States:
          Hold:
            Type: Wait
            Resource: arn:aws:lambda:us-east-1:0123456789:function:hold
            End: true
    Empty:
      definition:
        Comment: nothing to resolve
"#;

    #[derive(Default)]
    struct RecordingApi {
        reachable: bool,
        requests: Mutex<Vec<CreateStateMachineInput>>,
    }

    #[async_trait]
    impl StepFunctionsApi for RecordingApi {
        fn endpoint(&self) -> &str {
            "http://localhost:4584"
        }

        async fn list_state_machines(&self) -> Result<ListStateMachinesOutput> {
            if self.reachable {
                Ok(ListStateMachinesOutput::default())
            } else {
                Err(Error::custom("connection refused"))
            }
        }

        async fn create_state_machine(
            &self,
            input: CreateStateMachineInput,
        ) -> Result<CreateStateMachineOutput> {
            let arn = format!(
                "arn:aws:states:us-east-1:0123456789:stateMachine:{}",
                input.name
            );
            self.requests.lock().unwrap().push(input);
            Ok(CreateStateMachineOutput {
                state_machine_arn: arn,
                creation_date: None,
            })
        }
    }

    fn session() -> Session {
        let manifest = ServiceManifest::from_yaml(MANIFEST).unwrap();
        Session::new(&manifest, &DeploymentOverrides::default())
    }

    fn supervisor(api: Arc<RecordingApi>) -> Arc<EmulatorSupervisor> {
        Arc::new(
            EmulatorSupervisor::new(api, ArnRegistry::new())
                .with_max_retries(2)
                .with_retry_delay(std::time::Duration::from_millis(5)),
        )
    }

    #[tokio::test]
    async fn test_session_registers_resolved_machines() {
        let api = Arc::new(RecordingApi {
            reachable: true,
            ..RecordingApi::default()
        });
        let supervisor = supervisor(api.clone());
        let session = session();

        let outcomes = session
            .start(&supervisor, &CancellationToken::new())
            .await
            .unwrap();

        let names: Vec<_> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Checkout", "Broken", "Empty"]);
        assert!(outcomes[0].is_success());
        assert!(matches!(
            outcomes[1].result,
            Err(Error::UnsupportedStateType { .. })
        ));
        assert!(outcomes[2].is_success());

        let failed = failures(&outcomes);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "Broken");

        let requests = api.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let checkout = requests.iter().find(|r| r.name == "Checkout").unwrap();
        assert_eq!(
            checkout.role_arn,
            "arn:aws:iam::0123456789:role/service-role/MyRole"
        );
        assert!(checkout.definition.contains(
            r#""Resource":"arn:aws:lambda:us-east-1:0123456789:function:orders-dev-ship""#
        ));
        assert!(requests.iter().all(|r| r.name != "Broken"));

        let registry = supervisor.registry();
        assert!(registry.lookup("Checkout").is_some());
        assert!(registry.lookup("Empty").is_some());
        assert!(registry.lookup("Broken").is_none());

        session.end(&supervisor).await;
        assert_eq!(supervisor.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_malformed_definitions_do_not_block_siblings() {
        let manifest = ServiceManifest::from_yaml(
            r#"
service: orders
custom:
  offlineStepFunctions:
    functions:
      ChargeCard: charge
stepFunctions:
  stateMachines:
    Good:
      definition:
        StartAt: ChargeCard
        States:
          ChargeCard:
            Type: Task
            Resource: !GetAtt charge.Arn
            End: true
    Untyped:
      definition:
        StartAt: B
        States:
          B:
            Resource: arn:x
            End: true
    Garbled:
      definition:
        States: [not, a, map]
"#,
        )
        .unwrap();
        let session = Session::new(&manifest, &DeploymentOverrides::default());
        let api = Arc::new(RecordingApi {
            reachable: true,
            ..RecordingApi::default()
        });
        let supervisor = supervisor(api.clone());

        let outcomes = session
            .start(&supervisor, &CancellationToken::new())
            .await
            .unwrap();

        let names: Vec<_> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Good", "Untyped", "Garbled"]);
        assert!(outcomes[0].is_success());
        match &outcomes[1].result {
            Err(Error::UnsupportedStateType { state, state_type }) => {
                assert_eq!(state, "B");
                assert_eq!(state_type, "undefined");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(matches!(
            &outcomes[2].result,
            Err(Error::InvalidDefinition { name, .. }) if name == "Garbled"
        ));

        let requests = api.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, "Good");
        assert!(requests[0].definition.contains(
            r#""Resource":"arn:aws:lambda:us-east-1:0123456789:function:orders-dev-charge""#
        ));
        assert!(supervisor.registry().lookup("Good").is_some());

        session.end(&supervisor).await;
    }

    #[tokio::test]
    async fn test_unreachable_emulator_aborts_registration() {
        let api = Arc::new(RecordingApi::default());
        let supervisor = supervisor(api.clone());

        let err = session()
            .start(&supervisor, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EmulatorUnreachable { attempts: 2, .. }));
        assert!(api.requests.lock().unwrap().is_empty());
        assert!(supervisor.registry().is_empty());
    }

    #[tokio::test]
    async fn test_no_state_machines_is_skipped() {
        let manifest = ServiceManifest::from_yaml("service: orders\n").unwrap();
        let session = Session::new(&manifest, &DeploymentOverrides::default());
        let supervisor = supervisor(Arc::new(RecordingApi::default()));

        let outcomes = session
            .start(&supervisor, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcomes.is_empty());
        assert_eq!(supervisor.state(), LifecycleState::NotStarted);
        session.end(&supervisor).await;
    }

    #[test]
    fn test_resolve_one() {
        let session = session();
        let checkout = session.resolve_one("Checkout").unwrap();
        let states = checkout.states.as_ref().unwrap();
        assert_eq!(
            states["ChargeCard"].resource_str(),
            Some("arn:aws:lambda:us-east-1:0123456789:function:orders-dev-charge")
        );

        assert!(session.resolve_one("Broken").unwrap_err().is_resolution());
        assert!(matches!(
            session.resolve_one("Missing"),
            Err(Error::Custom(_))
        ));
        assert_eq!(
            session.state_machine_names().collect::<Vec<_>>(),
            vec!["Checkout", "Broken", "Empty"]
        );
    }
}
