//! Request and response shapes of the external advisory service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::session::{Capabilities, Session};
use super::task::Task;
use crate::ids::SessionId;

/// Informational classification of a task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskClassification {
    /// Free-form complexity label (e.g. `"low"`, `"high"`).
    pub complexity: String,
    /// Free-form task category.
    #[serde(rename = "type")]
    pub task_type: String,
    /// Free-form urgency label.
    pub urgency: String,
    /// Estimated effort, as reported by the advisor.
    #[serde(default)]
    pub estimated_effort: Value,
    /// Advisor's explanation.
    #[serde(default)]
    pub reasoning: String,
}

/// A session offered to the advisor as a possible assignee.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSession {
    /// Session identity.
    pub id: SessionId,
    /// Declared kind.
    pub kind: String,
    /// Declared capabilities.
    pub capabilities: Capabilities,
    /// Tasks currently owned.
    pub owned_tasks: usize,
    /// Remaining claim slots.
    pub spare_capacity: usize,
}

impl From<&Session> for CandidateSession {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            kind: session.kind.clone(),
            capabilities: session.capabilities.clone(),
            owned_tasks: session.owned_tasks.len(),
            spare_capacity: session.spare_capacity(),
        }
    }
}

/// Body sent to the advisor's classify endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassifyRequest {
    /// Task to classify.
    pub task: Task,
}

/// Body sent to the advisor's assignment endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRequest {
    /// Task to assign.
    pub task: Task,
    /// Sessions that could take it.
    pub candidate_sessions: Vec<CandidateSession>,
}

/// Advisor's assignment recommendation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecommendation {
    /// Recommended assignee.
    pub recommended_session: SessionId,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Other acceptable assignees, best first.
    #[serde(default)]
    pub alternatives: Vec<SessionId>,
    /// Advisor's explanation.
    #[serde(default)]
    pub reasoning: String,
}

/// Body sent to the advisor's conflict endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRequest {
    /// Conflict category, e.g. `"assignment_tie"`.
    pub conflict_type: String,
    /// Task in contention.
    pub task: Task,
    /// Sessions competing for it.
    pub competing_sessions: Vec<CandidateSession>,
    /// Extra context for the advisor.
    #[serde(default)]
    pub context: Value,
}

/// Advisor's conflict resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolution {
    /// Free-form resolution label.
    pub resolution: String,
    /// Session the task should go to, if any.
    #[serde(default)]
    pub assign_to: Option<SessionId>,
    /// Suggested follow-up actions. Informational only.
    #[serde(default)]
    pub compensation_actions: Vec<Value>,
    /// Advisor's explanation.
    #[serde(default)]
    pub reasoning: String,
}
