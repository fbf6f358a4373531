//! HTTP client for a running coordinator server.

use std::time::Duration;

use async_trait::async_trait;
use cadre_core::types::{
    AssignResponse, ClaimRequest, CompleteRequest, RegisterRequest, RegisterResponse,
    SessionRequest, StatusSnapshot, SuccessResponse, SyncRequest, Task, TaskRequest,
};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::client::{ClientMode, CoordinatorClient};
use crate::errors::{ClientError, Result};

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// [`CoordinatorClient`] over the server's HTTP routes.
#[derive(Clone, Debug)]
pub struct RemoteCoordinatorClient {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteCoordinatorClient {
    /// Client for `base_url` with the default request timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    /// Client for `base_url` with a per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cadre-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether `GET /health` answers within `timeout`.
    pub async fn probe(&self, timeout: Duration) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).timeout(timeout).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                debug!(%url, error = %err, "health probe failed");
                false
            }
        }
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "coordinator request");
        let response = self.client.post(&url).json(body).send().await?;
        decode(response).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "coordinator request");
        let response = self.client.get(&url).send().await?;
        decode(response).await
    }
}

async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if !status.is_success() {
        return Err(match serde_json::from_slice::<ErrorEnvelope>(&bytes) {
            Ok(envelope) => ClientError::Server {
                status: status.as_u16(),
                code: envelope.error.code,
                message: envelope.error.message,
            },
            Err(_) => ClientError::Server {
                status: status.as_u16(),
                code: "UNKNOWN".into(),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            },
        });
    }
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Malformed(e.to_string()))
}

#[async_trait]
impl CoordinatorClient for RemoteCoordinatorClient {
    fn mode(&self) -> ClientMode {
        ClientMode::Remote
    }

    async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse> {
        self.post("/session/register", &req).await
    }

    async fn heartbeat(&self, session_id: &str) -> Result<bool> {
        let body = SessionRequest {
            session_id: session_id.into(),
        };
        let resp: SuccessResponse = self.post("/session/heartbeat", &body).await?;
        Ok(resp.success)
    }

    async fn deregister(&self, session_id: &str) -> Result<bool> {
        let body = SessionRequest {
            session_id: session_id.into(),
        };
        let resp: SuccessResponse = self.post("/session/deregister", &body).await?;
        Ok(resp.success)
    }

    async fn claim(&self, session_id: &str, task_id: &str) -> Result<bool> {
        let body = ClaimRequest {
            session_id: session_id.into(),
            task_id: task_id.into(),
        };
        let resp: SuccessResponse = self.post("/task/claim", &body).await?;
        Ok(resp.success)
    }

    async fn complete(&self, session_id: &str, task_id: &str, result: Value) -> Result<bool> {
        let body = CompleteRequest {
            session_id: session_id.into(),
            task_id: task_id.into(),
            result,
        };
        let resp: SuccessResponse = self.post("/task/complete", &body).await?;
        Ok(resp.success)
    }

    async fn assign(&self, task_id: &str) -> Result<AssignResponse> {
        let body = TaskRequest {
            task_id: task_id.into(),
        };
        self.post("/task/assign", &body).await
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        match self.get(&format!("/task/{task_id}")).await {
            Ok(task) => Ok(Some(task)),
            Err(ClientError::Server { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn status(&self) -> Result<StatusSnapshot> {
        self.get("/status").await
    }

    async fn sync(&self, req: SyncRequest) -> Result<()> {
        let _: SuccessResponse = self.post("/sync", &req).await?;
        Ok(())
    }
}
