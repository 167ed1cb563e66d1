pub mod domain;
pub mod ports;
pub mod prompts;
pub mod service;

pub use domain::{
    ChatExchange, ChatTurn, LearningGoal, RequestContext, Session, SessionAnalysis,
    SessionGoalDetails, SessionSummary, TranscriptAnalysis,
};
pub use ports::{DatabaseService, LanguageModelService, PortError, PortResult};
pub use prompts::{Prompt, PromptKind, ResponseMode};
pub use service::{ServiceError, ServiceResult, TutoringService, CHAT_CONTEXT_WINDOW};
