//! Consult-and-apply-if-confident wrapper around an [`Advisor`].
//!
//! Every call is bounded by the configured timeout. Errors, timeouts and
//! answers that fail the policy all collapse to `None`, and the caller takes
//! its deterministic path.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cadre_core::SessionId;
use cadre_core::types::{CandidateSession, Task, TaskClassification};
use cadre_settings::AdvisorySettings;
use metrics::counter;
use serde_json::json;
use tracing::{debug, warn};

use crate::advisor::{Advisor, NoopAdvisor};
use crate::errors::{AdvisoryError, Result};
use crate::http::HttpAdvisor;

/// Conflict type sent when the deterministic assignment pick is a tie.
pub const ASSIGNMENT_TIE: &str = "assignment_tie";

/// Policy wrapper the coordinator talks to.
#[derive(Clone)]
pub struct AdvisoryBridge {
    advisor: Arc<dyn Advisor>,
    enabled: bool,
    timeout: Duration,
    confidence_threshold: f64,
}

impl std::fmt::Debug for AdvisoryBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisoryBridge")
            .field("enabled", &self.enabled)
            .field("timeout", &self.timeout)
            .field("confidence_threshold", &self.confidence_threshold)
            .finish_non_exhaustive()
    }
}

impl Default for AdvisoryBridge {
    fn default() -> Self {
        Self::disabled()
    }
}

impl AdvisoryBridge {
    /// Wrap an advisor with an explicit timeout and confidence threshold.
    pub fn new(advisor: Arc<dyn Advisor>, timeout: Duration, confidence_threshold: f64) -> Self {
        Self {
            advisor,
            enabled: true,
            timeout,
            confidence_threshold,
        }
    }

    /// A bridge that never consults anything.
    pub fn disabled() -> Self {
        Self {
            advisor: Arc::new(NoopAdvisor),
            enabled: false,
            timeout: Duration::from_millis(0),
            confidence_threshold: 1.0,
        }
    }

    /// Build from settings: an [`HttpAdvisor`] when enabled, otherwise disabled.
    pub fn from_settings(settings: &AdvisorySettings) -> Self {
        if !settings.enabled {
            return Self::disabled();
        }
        let advisor = HttpAdvisor::new(settings.base_url.clone(), settings.timeout());
        Self::new(
            Arc::new(advisor),
            settings.timeout(),
            settings.confidence_threshold,
        )
    }

    /// Whether an advisor is configured.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Classify a task, or `None` on any failure.
    pub async fn classify(&self, task: &Task) -> Option<TaskClassification> {
        if !self.enabled {
            return None;
        }
        self.consult("classify", self.advisor.classify(task)).await
    }

    /// Advisor's pick among `candidates`, if it passes the policy.
    ///
    /// The pick is accepted only when its confidence is a number in `[0, 1]`
    /// strictly above the threshold and it names a candidate with spare
    /// capacity.
    pub async fn recommend(&self, task: &Task, candidates: &[CandidateSession]) -> Option<SessionId> {
        if !self.enabled || candidates.is_empty() {
            return None;
        }
        let rec = self
            .consult(
                "recommend_assignment",
                self.advisor.recommend_assignment(task, candidates),
            )
            .await?;

        if !rec.confidence.is_finite() || !(0.0..=1.0).contains(&rec.confidence) {
            record("recommend_assignment", "malformed");
            warn!(task_id = %task.id, confidence = rec.confidence, "advisor confidence out of range");
            return None;
        }
        if rec.confidence <= self.confidence_threshold {
            record("recommend_assignment", "low_confidence");
            debug!(
                task_id = %task.id,
                confidence = rec.confidence,
                threshold = self.confidence_threshold,
                "recommendation below threshold"
            );
            return None;
        }
        if !has_room(candidates, &rec.recommended_session) {
            record("recommend_assignment", "rejected");
            debug!(
                task_id = %task.id,
                session_id = %rec.recommended_session,
                "recommended session is not an eligible candidate"
            );
            return None;
        }
        record("recommend_assignment", "applied");
        Some(rec.recommended_session)
    }

    /// Let the advisor break a tie among equally loaded `tied` sessions.
    pub async fn break_tie(&self, task: &Task, tied: &[CandidateSession]) -> Option<SessionId> {
        if !self.enabled || tied.len() < 2 {
            return None;
        }
        let context = json!({ "reason": "equal load", "candidates": tied.len() });
        let resolution = self
            .consult(
                "resolve_conflict",
                self.advisor
                    .resolve_conflict(ASSIGNMENT_TIE, task, tied, context),
            )
            .await?;

        let pick = resolution.assign_to?;
        if has_room(tied, &pick) {
            record("resolve_conflict", "applied");
            Some(pick)
        } else {
            record("resolve_conflict", "rejected");
            debug!(task_id = %task.id, session_id = %pick, "conflict pick is not a tied candidate");
            None
        }
    }

    async fn consult<T>(&self, call: &'static str, fut: impl Future<Output = Result<T>>) -> Option<T> {
        let outcome = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AdvisoryError::Timeout {
                after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };
        match outcome {
            Ok(value) => Some(value),
            Err(AdvisoryError::Disabled) => None,
            Err(err) => {
                record(call, err.kind());
                warn!(call, error = %err, "advisory call failed, using fallback");
                None
            }
        }
    }
}

fn has_room(candidates: &[CandidateSession], id: &SessionId) -> bool {
    candidates
        .iter()
        .any(|c| &c.id == id && c.spare_capacity > 0)
}

fn record(call: &'static str, outcome: &'static str) {
    counter!("advisory_calls_total", "call" => call, "outcome" => outcome).increment(1);
}
