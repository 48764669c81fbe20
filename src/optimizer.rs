use crate::error::SubmitError;
use crate::validator::OptimizationRequest;
use futures::future::BoxFuture;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// The remote collaborator that turns a request into an allocation.
pub trait Optimizer: Send + Sync {
    fn optimize<'a>(
        &'a self,
        request: &'a OptimizationRequest,
    ) -> BoxFuture<'a, Result<Value, SubmitError>>;
}

/// Talks to the optimizer service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpOptimizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpOptimizer {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, SubmitError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("portfolio_optimizer/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        Ok(Self::with_client(client, base_url))
    }

    /// Use an already configured reqwest client.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        HttpOptimizer {
            client,
            endpoint: format!("{}/optimize", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, request: &OptimizationRequest) -> Result<Value, SubmitError> {
        debug!(endpoint = %self.endpoint, tickers = ?request.tickers(), "sending optimization request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        interpret_response(status.as_u16(), &text)
    }
}

impl Optimizer for HttpOptimizer {
    fn optimize<'a>(
        &'a self,
        request: &'a OptimizationRequest,
    ) -> BoxFuture<'a, Result<Value, SubmitError>> {
        Box::pin(self.post(request))
    }
}

fn error_field(body: &Value) -> Option<&str> {
    body.get("error").and_then(Value::as_str)
}

/// Map a raw status and body onto the request/response contract.
pub fn interpret_response(status: u16, text: &str) -> Result<Value, SubmitError> {
    let parsed = serde_json::from_str::<Value>(text);

    if !(200..300).contains(&status) {
        let message = parsed
            .as_ref()
            .ok()
            .and_then(error_field)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Server error: {status}"));
        warn!(status, message = %message, "optimizer rejected request");
        return Err(SubmitError::Status(message));
    }

    let body = parsed.map_err(|e| SubmitError::MalformedResponse(e.to_string()))?;
    if let Some(message) = error_field(&body) {
        warn!(status, message = %message, "optimizer returned an error");
        return Err(SubmitError::Remote(message.to_string()));
    }
    Ok(body)
}
