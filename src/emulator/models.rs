//! Control API payloads
//!
//! Request and response bodies of the Step Functions JSON protocol, limited to
//! the operations this tool calls.

use serde::{Deserialize, Serialize};

/// `CreateStateMachine` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStateMachineInput {
    pub name: String,

    /// Definition as a JSON string, not a nested object
    pub definition: String,

    pub role_arn: String,
}

/// `CreateStateMachine` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStateMachineOutput {
    pub state_machine_arn: String,

    /// Epoch seconds
    #[serde(default)]
    pub creation_date: Option<f64>,
}

/// `ListStateMachines` request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStateMachinesInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// `ListStateMachines` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStateMachinesOutput {
    #[serde(default)]
    pub state_machines: Vec<StateMachineListItem>,

    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachineListItem {
    pub state_machine_arn: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub machine_type: Option<String>,
}

/// Error body returned with non-2xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, rename = "__type")]
    pub error_type: Option<String>,

    #[serde(default, alias = "Message")]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// `StateMachineAlreadyExists: State Machine Already Exists: '...'`
    pub fn describe(&self) -> String {
        // `__type` may be namespaced: `com.amazonaws.swf.service.v2.model#Foo`
        let error_type = self
            .error_type
            .as_deref()
            .map(|t| t.rsplit('#').next().unwrap_or(t));

        match (error_type, self.message.as_deref()) {
            (Some(t), Some(m)) => format!("{}: {}", t, m),
            (Some(t), None) => t.to_string(),
            (None, Some(m)) => m.to_string(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

/// A state machine the emulator accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredStateMachine {
    pub name: String,
    pub arn: String,
    /// Resolved definition JSON that was submitted
    pub definition: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_input_wire_names() {
        let input = CreateStateMachineInput {
            name: "Checkout".to_string(),
            definition: r#"{"StartAt":"A"}"#.to_string(),
            role_arn: "arn:aws:iam::0123456789:role/service-role/MyRole".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "name": "Checkout",
                "definition": "{\"StartAt\":\"A\"}",
                "roleArn": "arn:aws:iam::0123456789:role/service-role/MyRole"
            })
        );
    }

    #[test]
    fn test_list_output_parsing() {
        let output: ListStateMachinesOutput = serde_json::from_value(json!({
            "stateMachines": [{
                "stateMachineArn": "arn:aws:states:us-east-1:0123456789:stateMachine:Checkout",
                "name": "Checkout",
                "type": "STANDARD",
                "creationDate": 1.7e9
            }]
        }))
        .unwrap();

        assert_eq!(output.state_machines.len(), 1);
        assert_eq!(output.state_machines[0].name, "Checkout");
        assert!(output.next_token.is_none());
        assert_eq!(
            serde_json::to_value(ListStateMachinesInput::default()).unwrap(),
            json!({})
        );
    }

    #[test]
    fn test_error_body_describe() {
        let body: ApiErrorBody = serde_json::from_value(json!({
            "__type": "com.amazonaws.swf.service.v2.model#StateMachineAlreadyExists",
            "message": "State Machine Already Exists"
        }))
        .unwrap();
        assert_eq!(
            body.describe(),
            "StateMachineAlreadyExists: State Machine Already Exists"
        );

        let body: ApiErrorBody = serde_json::from_value(json!({"Message": "boom"})).unwrap();
        assert_eq!(body.describe(), "boom");
        assert_eq!(ApiErrorBody::default().describe(), "unknown error");
    }
}
