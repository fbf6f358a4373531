//! Advisor backed by a JSON-over-HTTP service.
//!
//! Endpoints, relative to the base URL:
//! - `POST /classify` with `{task}`
//! - `POST /recommend-assignment` with `{task, candidateSessions}`
//! - `POST /resolve-conflict` with `{conflictType, task, competingSessions, context}`

use std::time::Duration;

use async_trait::async_trait;
use cadre_core::types::{
    AssignmentRecommendation, AssignmentRequest, CandidateSession, ClassifyRequest,
    ConflictRequest, ConflictResolution, Task, TaskClassification,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::advisor::Advisor;
use crate::errors::{AdvisoryError, Result};

/// HTTP client for the advisory service.
#[derive(Clone, Debug)]
pub struct HttpAdvisor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAdvisor {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cadre/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "advisory request");
        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisoryError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| AdvisoryError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl Advisor for HttpAdvisor {
    async fn classify(&self, task: &Task) -> Result<TaskClassification> {
        self.post("/classify", &ClassifyRequest { task: task.clone() })
            .await
    }

    async fn recommend_assignment(
        &self,
        task: &Task,
        candidates: &[CandidateSession],
    ) -> Result<AssignmentRecommendation> {
        let body = AssignmentRequest {
            task: task.clone(),
            candidate_sessions: candidates.to_vec(),
        };
        self.post("/recommend-assignment", &body).await
    }

    async fn resolve_conflict(
        &self,
        conflict_type: &str,
        task: &Task,
        competing: &[CandidateSession],
        context: Value,
    ) -> Result<ConflictResolution> {
        let body = ConflictRequest {
            conflict_type: conflict_type.to_string(),
            task: task.clone(),
            competing_sessions: competing.to_vec(),
            context,
        };
        self.post("/resolve-conflict", &body).await
    }
}
