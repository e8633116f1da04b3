//! HTTP client for the emulator control API
//!
//! Speaks the AWS JSON 1.0 protocol: every operation is a `POST /` with an
//! `X-Amz-Target` header naming it. The local emulator does not check request
//! signatures, so none are sent.

use super::{
    CreateStateMachineInput, CreateStateMachineOutput, ListStateMachinesInput,
    ListStateMachinesOutput, StepFunctionsApi, models::ApiErrorBody,
};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const TARGET_PREFIX: &str = "AWSStepFunctions";
const AMZ_JSON: &str = "application/x-amz-json-1.0";

/// Step Functions control API over HTTP
#[derive(Debug, Clone)]
pub struct HttpStepFunctions {
    client: Client,
    endpoint: String,
}

impl HttpStepFunctions {
    /// Create a client for `http://<host>:<port>`
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    async fn call<I, O>(&self, operation: &str, input: &I) -> Result<O>
    where
        I: Serialize,
        O: DeserializeOwned,
    {
        tracing::debug!("Calling {} on {}", operation, self.endpoint);

        let response = self
            .client
            .post(format!("{}/", self.endpoint))
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .header(CONTENT_TYPE, AMZ_JSON)
            .body(serde_json::to_vec(input)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let error: ApiErrorBody = serde_json::from_slice(&body).unwrap_or_else(|_| ApiErrorBody {
                error_type: None,
                message: Some(String::from_utf8_lossy(&body).into_owned()),
            });
            return Err(Error::Api {
                status: status.as_u16(),
                message: error.describe(),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl StepFunctionsApi for HttpStepFunctions {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn list_state_machines(&self) -> Result<ListStateMachinesOutput> {
        self.call("ListStateMachines", &ListStateMachinesInput::default())
            .await
    }

    async fn create_state_machine(
        &self,
        input: CreateStateMachineInput,
    ) -> Result<CreateStateMachineOutput> {
        self.call("CreateStateMachine", &input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one request, answer with `status` and `body`, and hand back the
    /// request head and body that were received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);

            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(value) = lower.strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
                head.push_str(&line);
            }

            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).await.unwrap();

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/x-amz-json-1.0\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();

            (head, String::from_utf8(request_body).unwrap())
        });

        (endpoint, handle)
    }

    #[tokio::test]
    async fn test_create_state_machine_request() {
        let (endpoint, server) = serve_once(
            "200 OK",
            r#"{"stateMachineArn":"arn:aws:states:us-east-1:0123456789:stateMachine:Checkout","creationDate":1700000000.0}"#,
        )
        .await;

        let api = HttpStepFunctions::new(format!("{}/", endpoint), Duration::from_secs(5)).unwrap();
        assert_eq!(api.endpoint(), endpoint);

        let output = api
            .create_state_machine(CreateStateMachineInput {
                name: "Checkout".to_string(),
                definition: "{}".to_string(),
                role_arn: "arn:aws:iam::0123456789:role/service-role/MyRole".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(
            output.state_machine_arn,
            "arn:aws:states:us-east-1:0123456789:stateMachine:Checkout"
        );

        let (head, body) = server.await.unwrap();
        let head = head.to_ascii_lowercase();
        assert!(head.starts_with("post / "));
        assert!(head.contains("x-amz-target: awsstepfunctions.createstatemachine"));
        assert!(head.contains("content-type: application/x-amz-json-1.0"));
        assert!(body.contains(r#""roleArn":"arn:aws:iam::0123456789:role/service-role/MyRole""#));
    }

    #[tokio::test]
    async fn test_error_response_is_mapped() {
        let (endpoint, server) = serve_once(
            "400 Bad Request",
            r#"{"__type":"StateMachineAlreadyExists","message":"State Machine Already Exists"}"#,
        )
        .await;

        let api = HttpStepFunctions::new(endpoint, Duration::from_secs(5)).unwrap();
        let err = api.list_state_machines().await.unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "StateMachineAlreadyExists: State Machine Already Exists");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let (head, body) = server.await.unwrap();
        assert!(head.to_ascii_lowercase().contains("awsstepfunctions.liststatemachines"));
        assert_eq!(body, "{}");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let api = HttpStepFunctions::new(endpoint, Duration::from_secs(2)).unwrap();
        let err = api.list_state_machines().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
