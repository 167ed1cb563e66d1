//! crates/adaptive_learning_core/src/service.rs
//!
//! The orchestration layer. Each use case is a short linear pipeline:
//! store reads, prompt composition, one model call and (for chat only) one
//! store write. Lower-layer failures are folded into `ServiceError`.

use std::sync::Arc;

use tracing::{error, info};

use crate::domain::{ChatExchange, RequestContext, SessionAnalysis, SessionSummary, TranscriptAnalysis};
use crate::ports::{DatabaseService, LanguageModelService, PortError};
use crate::prompts;

/// Number of recent turns fed back to the model on each chat exchange.
pub const CHAT_CONTEXT_WINDOW: u32 = 3;

/// The three outcomes a caller can see when a use case fails.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The caller referenced something that does not resolve (e.g. a goal name).
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// Store or model fault. The message is for logs, not for end users.
    #[error("Upstream failure: {0}")]
    Upstream(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<PortError> for ServiceError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(msg) => ServiceError::NotFound(msg),
            PortError::Constraint(msg) | PortError::Unexpected(msg) => ServiceError::Upstream(msg),
        }
    }
}

/// Sequences the store and the model for every tutoring use case.
#[derive(Clone)]
pub struct TutoringService {
    db: Arc<dyn DatabaseService>,
    llm: Arc<dyn LanguageModelService>,
}

impl TutoringService {
    pub fn new(db: Arc<dyn DatabaseService>, llm: Arc<dyn LanguageModelService>) -> Self {
        Self { db, llm }
    }

    /// Resolves the goal by name and opens a session at `level`.
    #[tracing::instrument(
        name = "start_session",
        skip_all,
        fields(request_id = %ctx.request_id, tenant = ctx.tenant(), goal_name = goal_name)
    )]
    pub async fn start_session(
        &self,
        ctx: &RequestContext,
        level: &str,
        goal_name: &str,
    ) -> ServiceResult<SessionSummary> {
        let goal = match self.db.find_learning_goal_by_name(goal_name).await {
            Ok(goal) => goal,
            Err(PortError::NotFound(_)) => {
                error!(event_type = "create_session", "Learning goal '{}' not found", goal_name);
                return Err(ServiceError::InvalidInput(format!(
                    "Invalid learning goal: {}",
                    goal_name
                )));
            }
            Err(e) => return Err(log_failure("create_session", e.into())),
        };

        let session = self
            .db
            .create_session(goal.id, level)
            .await
            .map_err(|e| log_failure("create_session", e.into()))?;

        info!(event_type = "create_session", session_id = session.id, "Session created");
        Ok(SessionSummary {
            id: session.id,
            goal_name: goal.name,
            initial_level: session.initial_level,
            current_level: session.current_level,
        })
    }

    /// Runs one tutoring exchange and records it.
    #[tracing::instrument(
        name = "advance_chat",
        skip_all,
        fields(request_id = %ctx.request_id, tenant = ctx.tenant(), session_id = session_id)
    )]
    pub async fn advance_chat(
        &self,
        ctx: &RequestContext,
        session_id: i64,
        learner_response: &str,
    ) -> ServiceResult<ChatExchange> {
        let session = self
            .db
            .get_session_by_id(session_id)
            .await
            .map_err(|e| log_failure("process_chat", e.into()))?;

        let details = self
            .db
            .get_goal_details_by_session_id(session_id)
            .await
            .map_err(|e| log_failure("process_chat", e.into()))?;

        let history = self
            .db
            .get_recent_chat_turns(session_id, CHAT_CONTEXT_WINDOW)
            .await
            .map_err(|e| log_failure("process_chat", e.into()))?;

        let prompt = prompts::compose_tutor_turn(
            &details.goal_name,
            &session.current_level,
            &history,
            learner_response,
        );
        let model_response = self
            .llm
            .generate(&prompt)
            .await
            .map_err(|e| log_failure("process_chat", e.into()))?;

        self.db
            .append_chat_turn(session.id, &model_response, learner_response)
            .await
            .map_err(|e| log_failure("process_chat", e.into()))?;

        info!(event_type = "chat_success", "Chat successfully processed");
        Ok(ChatExchange {
            session_id: session.id,
            learner_response: learner_response.to_string(),
            model_response,
        })
    }

    /// Scores the whole transcript of a session. Read-only.
    #[tracing::instrument(
        name = "analyze_session",
        skip_all,
        fields(request_id = %ctx.request_id, tenant = ctx.tenant(), session_id = session_id)
    )]
    pub async fn analyze_session(
        &self,
        ctx: &RequestContext,
        session_id: i64,
    ) -> ServiceResult<SessionAnalysis> {
        self.db
            .get_session_by_id(session_id)
            .await
            .map_err(|e| log_failure("chat_analysis", e.into()))?;

        let history = self
            .db
            .get_all_chat_turns(session_id)
            .await
            .map_err(|e| log_failure("chat_analysis", e.into()))?;

        let prompt = prompts::compose_transcript_analysis(&history);
        let raw = self
            .llm
            .generate(&prompt)
            .await
            .map_err(|e| log_failure("chat_analysis", e.into()))?;

        let analysis: TranscriptAnalysis = serde_json::from_str(raw.trim()).map_err(|e| {
            log_failure(
                "chat_analysis",
                ServiceError::Upstream(format!("Malformed analysis payload: {}", e)),
            )
        })?;

        info!(event_type = "chat_analysis_success", turns = history.len(), "Chat analysis completed");
        Ok(SessionAnalysis {
            session_id,
            analysis,
        })
    }

    /// Asks the model for next steps and knowledge gaps. Read-only.
    #[tracing::instrument(
        name = "recommend",
        skip_all,
        fields(request_id = %ctx.request_id, tenant = ctx.tenant(), session_id = session_id)
    )]
    pub async fn recommend(&self, ctx: &RequestContext, session_id: i64) -> ServiceResult<String> {
        let details = self
            .db
            .get_goal_details_by_session_id(session_id)
            .await
            .map_err(|e| log_failure("get_recommendation", e.into()))?;

        let history = self
            .db
            .get_all_chat_turns(session_id)
            .await
            .map_err(|e| log_failure("get_recommendation", e.into()))?;

        let prompt =
            prompts::compose_recommendation(&details.goal_name, &details.initial_level, &history);
        let recommendation = self
            .llm
            .generate(&prompt)
            .await
            .map_err(|e| log_failure("get_recommendation", e.into()))?;

        info!(event_type = "get_recommendation", "Recommendation generated");
        Ok(recommendation)
    }
}

fn log_failure(event_type: &str, e: ServiceError) -> ServiceError {
    error!(event_type = event_type, error = %e, "Use case failed");
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatTurn, LearningGoal, Session, SessionGoalDetails};
    use crate::ports::PortResult;
    use crate::prompts::{Prompt, PromptKind, ResponseMode};
    use async_trait::async_trait;
    use std::sync::Mutex;

    //=====================================================================================
    // In-memory fakes
    //=====================================================================================

    #[derive(Default)]
    struct FakeStore {
        goals: Mutex<Vec<LearningGoal>>,
        sessions: Mutex<Vec<Session>>,
        turns: Mutex<Vec<ChatTurn>>,
    }

    impl FakeStore {
        fn with_goal(id: i64, name: &str) -> Self {
            let store = Self::default();
            store.goals.lock().unwrap().push(LearningGoal {
                id,
                name: name.to_string(),
            });
            store
        }

        fn session_count(&self) -> usize {
            self.sessions.lock().unwrap().len()
        }

        fn turn_count(&self) -> usize {
            self.turns.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DatabaseService for FakeStore {
        async fn find_learning_goal_by_name(&self, name: &str) -> PortResult<LearningGoal> {
            self.goals
                .lock()
                .unwrap()
                .iter()
                .find(|g| g.name == name)
                .cloned()
                .ok_or_else(|| PortError::NotFound(name.to_string()))
        }

        async fn create_session(&self, goal_id: i64, initial_level: &str) -> PortResult<Session> {
            if !self.goals.lock().unwrap().iter().any(|g| g.id == goal_id) {
                return Err(PortError::Constraint("learning_goal_id".into()));
            }
            let mut sessions = self.sessions.lock().unwrap();
            let session = Session {
                id: sessions.len() as i64 + 1,
                learning_goal_id: goal_id,
                initial_level: initial_level.to_string(),
                current_level: initial_level.to_string(),
            };
            sessions.push(session.clone());
            Ok(session)
        }

        async fn get_session_by_id(&self, session_id: i64) -> PortResult<Session> {
            self.sessions
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.id == session_id)
                .cloned()
                .ok_or_else(|| PortError::NotFound(format!("Session {}", session_id)))
        }

        async fn get_goal_details_by_session_id(
            &self,
            session_id: i64,
        ) -> PortResult<SessionGoalDetails> {
            let session = self.get_session_by_id(session_id).await?;
            let goals = self.goals.lock().unwrap();
            let goal = goals
                .iter()
                .find(|g| g.id == session.learning_goal_id)
                .ok_or_else(|| PortError::NotFound("goal".into()))?;
            Ok(SessionGoalDetails {
                goal_name: goal.name.clone(),
                initial_level: session.initial_level,
            })
        }

        async fn append_chat_turn(
            &self,
            session_id: i64,
            model_response: &str,
            learner_response: &str,
        ) -> PortResult<ChatTurn> {
            if !self.sessions.lock().unwrap().iter().any(|s| s.id == session_id) {
                return Err(PortError::Constraint("session_id".into()));
            }
            let mut turns = self.turns.lock().unwrap();
            let turn = ChatTurn {
                id: turns.len() as i64 + 1,
                session_id,
                model_response: model_response.to_string(),
                learner_response: learner_response.to_string(),
            };
            turns.push(turn.clone());
            Ok(turn)
        }

        async fn get_recent_chat_turns(
            &self,
            session_id: i64,
            limit: u32,
        ) -> PortResult<Vec<ChatTurn>> {
            let mut all = self.get_all_chat_turns(session_id).await?;
            all.truncate(limit as usize);
            Ok(all)
        }

        async fn get_all_chat_turns(&self, session_id: i64) -> PortResult<Vec<ChatTurn>> {
            let mut turns: Vec<ChatTurn> = self
                .turns
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.session_id == session_id)
                .cloned()
                .collect();
            turns.sort_by(|a, b| b.id.cmp(&a.id));
            Ok(turns)
        }
    }

    /// Replies with a fixed text (or failure) and records every prompt.
    struct ScriptedModel {
        reply: Result<String, String>,
        seen: Mutex<Vec<Prompt>>,
    }

    impl ScriptedModel {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err("model unavailable".to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<Prompt> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModelService for ScriptedModel {
        async fn generate(&self, prompt: &Prompt) -> PortResult<String> {
            self.seen.lock().unwrap().push(prompt.clone());
            self.reply.clone().map_err(PortError::Unexpected)
        }
    }

    fn service(store: &Arc<FakeStore>, model: &Arc<ScriptedModel>) -> TutoringService {
        TutoringService::new(store.clone(), model.clone())
    }

    //=====================================================================================
    // StartSession
    //=====================================================================================

    #[tokio::test]
    async fn start_session_initializes_both_levels() {
        let store = Arc::new(FakeStore::with_goal(1, "Algebra"));
        let model = Arc::new(ScriptedModel::replying("unused"));
        let ctx = RequestContext::default();

        for level in ["beginner", "intermediate", "advanced"] {
            let summary = service(&store, &model)
                .start_session(&ctx, level, "Algebra")
                .await
                .unwrap();
            assert_eq!(summary.goal_name, "Algebra");
            assert_eq!(summary.initial_level, level);
            assert_eq!(summary.current_level, level);
        }
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn start_session_with_unknown_goal_is_invalid_input() {
        let store = Arc::new(FakeStore::with_goal(1, "Algebra"));
        let model = Arc::new(ScriptedModel::replying("unused"));

        let err = service(&store, &model)
            .start_session(&RequestContext::default(), "beginner", "Alchemy")
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(store.session_count(), 0);
    }

    //=====================================================================================
    // AdvanceChat
    //=====================================================================================

    #[tokio::test]
    async fn advance_chat_on_missing_session_is_not_found() {
        let store = Arc::new(FakeStore::with_goal(1, "Algebra"));
        let model = Arc::new(ScriptedModel::replying("hello"));

        let err = service(&store, &model)
            .advance_chat(&RequestContext::default(), 42, "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(store.turn_count(), 0);
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn first_exchange_uses_introduction_and_stores_empty_learner_text() {
        let store = Arc::new(FakeStore::with_goal(1, "Algebra"));
        let model = Arc::new(ScriptedModel::replying("Welcome to Algebra!"));
        let svc = service(&store, &model);
        let ctx = RequestContext::default();

        let session = svc.start_session(&ctx, "beginner", "Algebra").await.unwrap();
        let exchange = svc.advance_chat(&ctx, session.id, "").await.unwrap();

        assert_eq!(exchange.session_id, session.id);
        assert_eq!(exchange.learner_response, "");
        assert_eq!(exchange.model_response, "Welcome to Algebra!");

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].kind, PromptKind::TutorIntroduction);
        assert_eq!(prompts[0].response_mode, ResponseMode::PlainText);

        let turns = store.get_all_chat_turns(session.id).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].learner_response, "");
        assert_eq!(turns[0].model_response, "Welcome to Algebra!");
    }

    #[tokio::test]
    async fn chat_context_is_bounded_to_the_last_three_turns() {
        let store = Arc::new(FakeStore::with_goal(1, "Geometry"));
        let model = Arc::new(ScriptedModel::replying("next question"));
        let svc = service(&store, &model);
        let ctx = RequestContext::default();
        let session = svc.start_session(&ctx, "intermediate", "Geometry").await.unwrap();

        for answer in ["a1", "a2", "a3", "a4", "a5"] {
            svc.advance_chat(&ctx, session.id, answer).await.unwrap();
        }

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 5);
        assert_eq!(prompts[1].kind, PromptKind::TutorFollowUp);

        let last = &prompts[4].user_content;
        assert!(last.contains("Learner: a4"));
        assert!(last.contains("Learner: a3"));
        assert!(last.contains("Learner: a2"));
        assert!(!last.contains("Learner: a1"));
        assert!(last.find("Learner: a4").unwrap() < last.find("Learner: a2").unwrap());
        assert!(last.contains("CURRENT DIFFICULTY LEVEL: intermediate"));

        assert_eq!(store.get_all_chat_turns(session.id).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn model_failure_appends_nothing() {
        let store = Arc::new(FakeStore::with_goal(1, "Algebra"));
        let model = Arc::new(ScriptedModel::failing());
        let svc = service(&store, &model);
        let ctx = RequestContext::default();
        let session = svc.start_session(&ctx, "beginner", "Algebra").await.unwrap();

        let err = svc.advance_chat(&ctx, session.id, "x = 2").await.unwrap_err();

        assert!(matches!(err, ServiceError::Upstream(_)));
        assert_eq!(store.turn_count(), 0);
    }

    //=====================================================================================
    // AnalyzeSession / Recommend
    //=====================================================================================

    #[tokio::test]
    async fn analysis_of_empty_session_parses_zero_counts() {
        let store = Arc::new(FakeStore::with_goal(1, "Algebra"));
        let model = Arc::new(ScriptedModel::replying(
            r#"{"total_questions_asked": 0, "total_questions_answered_wrong": 0, "misconceptions": [], "feedback": "No activity yet."}"#,
        ));
        let svc = service(&store, &model);
        let ctx = RequestContext::default();
        let session = svc.start_session(&ctx, "beginner", "Algebra").await.unwrap();

        let result = svc.analyze_session(&ctx, session.id).await.unwrap();

        assert_eq!(result.session_id, session.id);
        assert_eq!(result.analysis.total_questions_asked, 0);
        assert_eq!(result.analysis.total_questions_answered_wrong, 0);
        let prompts = model.prompts();
        assert_eq!(prompts[0].kind, PromptKind::TranscriptAnalysis);
        assert_eq!(prompts[0].response_mode, ResponseMode::StrictJson);
        assert_eq!(store.turn_count(), 0);
    }

    #[tokio::test]
    async fn malformed_analysis_payload_is_upstream_failure() {
        let store = Arc::new(FakeStore::with_goal(1, "Algebra"));
        let model = Arc::new(ScriptedModel::replying("Sure! Here is the analysis..."));
        let svc = service(&store, &model);
        let ctx = RequestContext::default();
        let session = svc.start_session(&ctx, "beginner", "Algebra").await.unwrap();

        let err = svc.analyze_session(&ctx, session.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(_)));
    }

    #[tokio::test]
    async fn analysis_of_missing_session_is_not_found() {
        let store = Arc::new(FakeStore::with_goal(1, "Algebra"));
        let model = Arc::new(ScriptedModel::replying("{}"));

        let err = service(&store, &model)
            .analyze_session(&RequestContext::default(), 9)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn recommendation_uses_full_history_without_persisting() {
        let store = Arc::new(FakeStore::with_goal(1, "Calculus"));
        let model = Arc::new(ScriptedModel::replying("- Review limits"));
        let svc = service(&store, &model);
        let ctx = RequestContext::default();
        let session = svc.start_session(&ctx, "advanced", "Calculus").await.unwrap();
        for answer in ["one", "two", "three", "four"] {
            svc.advance_chat(&ctx, session.id, answer).await.unwrap();
        }

        let text = svc.recommend(&ctx, session.id).await.unwrap();

        assert_eq!(text, "- Review limits");
        let prompt = model.prompts().pop().unwrap();
        assert_eq!(prompt.kind, PromptKind::Recommendation);
        assert!(prompt.user_content.contains("Learner Level: advanced"));
        assert!(prompt.user_content.contains("Learning Goal: Calculus"));
        assert!(prompt.user_content.contains("Learner: one"));
        assert!(prompt.user_content.contains("Learner: four"));
        assert_eq!(store.turn_count(), 4);
    }

    #[tokio::test]
    async fn recommendation_for_missing_session_is_not_found() {
        let store = Arc::new(FakeStore::with_goal(1, "Calculus"));
        let model = Arc::new(ScriptedModel::replying("unused"));

        let err = service(&store, &model)
            .recommend(&RequestContext::default(), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
