//! The advisory service contract and its no-op default.

use async_trait::async_trait;
use cadre_core::types::{
    AssignmentRecommendation, CandidateSession, ConflictResolution, Task, TaskClassification,
};
use serde_json::Value;

use crate::errors::{AdvisoryError, Result};

/// An external service that scores tasks and suggests assignees.
///
/// Every answer is a recommendation; the coordinator decides whether to use it.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Classify a task. Informational only.
    async fn classify(&self, task: &Task) -> Result<TaskClassification>;

    /// Recommend one of `candidates` for `task`.
    async fn recommend_assignment(
        &self,
        task: &Task,
        candidates: &[CandidateSession],
    ) -> Result<AssignmentRecommendation>;

    /// Settle a conflict between `competing` sessions over `task`.
    async fn resolve_conflict(
        &self,
        conflict_type: &str,
        task: &Task,
        competing: &[CandidateSession],
        context: Value,
    ) -> Result<ConflictResolution>;
}

/// Advisor used when no service is configured. Every call reports
/// [`AdvisoryError::Disabled`], so callers always take their fallback.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAdvisor;

#[async_trait]
impl Advisor for NoopAdvisor {
    async fn classify(&self, _task: &Task) -> Result<TaskClassification> {
        Err(AdvisoryError::Disabled)
    }

    async fn recommend_assignment(
        &self,
        _task: &Task,
        _candidates: &[CandidateSession],
    ) -> Result<AssignmentRecommendation> {
        Err(AdvisoryError::Disabled)
    }

    async fn resolve_conflict(
        &self,
        _conflict_type: &str,
        _task: &Task,
        _competing: &[CandidateSession],
        _context: Value,
    ) -> Result<ConflictResolution> {
        Err(AdvisoryError::Disabled)
    }
}
