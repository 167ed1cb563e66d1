//! crates/adaptive_learning_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or transport format.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A named subject a learner is working on. Seeded once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningGoal {
    pub id: i64,
    pub name: String,
}

/// One learner's engagement with a single learning goal.
///
/// Levels are an open string domain ("beginner", "intermediate", "advanced", ...).
/// `current_level` starts equal to `initial_level` and is never written back
/// by the chat flow; difficulty adjustment lives in the tutor instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: i64,
    pub learning_goal_id: i64,
    pub initial_level: String,
    pub current_level: String,
}

/// A single learner/model exchange. Append-only; `id` order is chronological.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub id: i64,
    pub session_id: i64,
    pub model_response: String,
    pub learner_response: String,
}

/// Result of the joined goal + session read used by the prompt flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGoalDetails {
    pub goal_name: String,
    pub initial_level: String,
}

/// What `StartSession` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: i64,
    pub goal_name: String,
    pub initial_level: String,
    pub current_level: String,
}

/// What `AdvanceChat` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatExchange {
    pub session_id: i64,
    pub learner_response: String,
    pub model_response: String,
}

/// The fixed-shape JSON object the model returns for a transcript analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptAnalysis {
    #[serde(deserialize_with = "lenient_count")]
    pub total_questions_asked: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub total_questions_answered_wrong: u32,
    #[serde(default)]
    pub misconceptions: Vec<String>,
    #[serde(default)]
    pub feedback: String,
}

/// What `AnalyzeSession` hands back to the caller. Nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAnalysis {
    pub session_id: i64,
    pub analysis: TranscriptAnalysis,
}

/// Request-scoped tag used only to annotate logs.
///
/// Built once per inbound request and passed by reference into every
/// orchestration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub tenant_id: Option<String>,
}

impl RequestContext {
    pub fn new(tenant_id: Option<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            tenant_id,
        }
    }

    /// The tenant tag as it appears in log fields.
    pub fn tenant(&self) -> &str {
        self.tenant_id.as_deref().unwrap_or("-")
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(None)
    }
}

// Models are told to return integers but occasionally quote them.
fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u32),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| serde::de::Error::custom(format!("'{}' is not a count", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_accepts_numeric_and_quoted_counts() {
        let analysis: TranscriptAnalysis = serde_json::from_str(
            r#"{"total_questions_asked": 4, "total_questions_answered_wrong": "1",
                "misconceptions": ["sign errors"], "feedback": "Solid start."}"#,
        )
        .unwrap();

        assert_eq!(analysis.total_questions_asked, 4);
        assert_eq!(analysis.total_questions_answered_wrong, 1);
        assert_eq!(analysis.misconceptions, vec!["sign errors".to_string()]);
        assert_eq!(analysis.feedback, "Solid start.");
    }

    #[test]
    fn analysis_rejects_non_numeric_count() {
        let result: Result<TranscriptAnalysis, _> = serde_json::from_str(
            r#"{"total_questions_asked": "several", "total_questions_answered_wrong": 0}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn analysis_defaults_missing_lists() {
        let analysis: TranscriptAnalysis = serde_json::from_str(
            r#"{"total_questions_asked": 0, "total_questions_answered_wrong": 0}"#,
        )
        .unwrap();
        assert!(analysis.misconceptions.is_empty());
        assert!(analysis.feedback.is_empty());
    }

    #[test]
    fn request_context_tenant_falls_back_to_dash() {
        assert_eq!(RequestContext::new(None).tenant(), "-");
        assert_eq!(RequestContext::new(Some("acme".into())).tenant(), "acme");
    }
}
