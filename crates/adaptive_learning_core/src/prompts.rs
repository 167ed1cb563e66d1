//! crates/adaptive_learning_core/src/prompts.rs
//!
//! Builds the text sent to the language model for the three model-backed flows.
//! Everything here is a pure formatting function: no store access, no I/O.
//!
//! History is rendered in the order it is handed in. The store returns turns
//! newest first and that order is passed through untouched.

use crate::domain::ChatTurn;

/// How the gateway should shape its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    PlainText,
    /// Bare JSON object, no prose wrapping.
    StrictJson,
}

/// Which template a prompt was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// First exchange of a session: introduce the topic, no direct questions.
    TutorIntroduction,
    /// Later exchanges: validate, adapt difficulty, ask the next question.
    TutorFollowUp,
    TranscriptAnalysis,
    Recommendation,
}

/// A composed model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub system_instructions: String,
    pub user_content: String,
    pub response_mode: ResponseMode,
}

//=========================================================================================
// Instruction Templates
//=========================================================================================

const TUTOR_INTRODUCTION_INSTRUCTIONS: &str = r#"You are an educational AI tutor who adapts to the learner as the conversation goes on.

This is the first exchange of a new tutoring session. There is no chat history yet.

Your task:
- Give the learner an overview of the LEARNING GOAL so they can get started.
- Pitch the explanation at the CURRENT DIFFICULTY LEVEL.
- Explain the key concepts and fundamentals with a short, concrete example.
- Do not quiz the learner yet. Keep the tone warm and encouraging.

Example:
  Topic: "Algebra", Level: "beginner"
  "Welcome! Algebra is the study of variables and how they interact. Let's start with a few basic terms: variables, coefficients and equations. In 2x + 3 = 7, x is the variable, 2 is its coefficient and the whole line is an equation.""#;

const TUTOR_FOLLOW_UP_INSTRUCTIONS: &str = r#"You are an educational AI tutor who validates learner answers and adjusts question difficulty dynamically based on the question-answer history of the learner.

Use the CHAT HISTORY to find the question you last asked, then validate the LATEST LEARNER RESPONSE against the correct answer and reply in one of these styles:

1. Correct answer:
   - Give positive reinforcement and move the learner one step up in difficulty.
   - e.g. "Great job! Let's move to a more challenging question..."
2. Partially correct answer:
   - Acknowledge the effort, clarify the mistake and explain the missing piece.
   - e.g. "You're on the right track, but consider this aspect..."
3. Incorrect answer:
   - Respond empathetically and walk through the correct answer.
   - Move the learner one step down in difficulty, unless they are already at the lowest level.
   - e.g. "That's okay! Here's an explanation to help you understand better..."

Always finish with exactly one new question for the learner. Its difficulty follows the adjustment above and it should reinforce the key concepts of the LEARNING GOAL without overwhelming the learner.

Examples:
  Topic: "Geometry", Level: "intermediate", Question: "What is the sum of interior angles in a triangle?", Learner: "180 degrees"
  "Great job! The interior angles of a triangle always add up to 180 degrees. Let's try something harder: in an isosceles triangle with a 50 degree base angle, what is the apex angle?"

  Topic: "Biology", Level: "beginner", Question: "What is the function of mitochondria?", Learner: "It helps in digestion."
  "Good attempt! Mitochondria are actually the powerhouse of the cell because they produce energy. Let's try again: what role do mitochondria play in cellular respiration?""#;

const TRANSCRIPT_ANALYSIS_INSTRUCTIONS: &str = r#"You analyze the transcript of a tutoring session between an AI tutor and a learner. The transcript is provided as a list of exchanges.

1. Read every exchange carefully.
2. Count every question the tutor asked the learner (e.g. "What is X?", "Can you solve Y?").
3. Count every time the learner answered incorrectly and was corrected by the tutor.
4. List the misconceptions or misunderstandings the learner demonstrated (e.g. confusing multiplication steps, arithmetic slips).
5. Write a concise feedback summary of the learner's performance and what to improve.

Return strictly one JSON object with exactly these keys and nothing else:
{
  "total_questions_asked": <integer>,
  "total_questions_answered_wrong": <integer>,
  "misconceptions": ["<string>", ...],
  "feedback": "<string>"
}
An empty transcript has zero questions asked, zero wrong answers and no misconceptions."#;

const RECOMMENDATION_INSTRUCTIONS: &str = r#"You are a learning assistant that helps students by analyzing their progress, chat history and performance.

Given the learner's level, the learning goal and the entire conversation between the tutor (you) and the learner:
1. Recommend personalized next steps for the learner.
2. Identify existing knowledge gaps or areas for improvement based on the chat history.

Format both parts as bullet points."#;

const EMPTY_HISTORY: &str = "(empty)";

//=========================================================================================
// Composition
//=========================================================================================

/// Renders turns as `Learner: ...\nAI: ...` blocks, keeping the given order.
pub fn format_chat_history(history: &[ChatTurn]) -> String {
    if history.is_empty() {
        return EMPTY_HISTORY.to_string();
    }
    history
        .iter()
        .map(|turn| {
            format!(
                "Learner: {}\nAI: {}",
                turn.learner_response, turn.model_response
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds the prompt for one tutoring exchange.
///
/// Empty history selects the introduction template; anything else selects the
/// follow-up template. The level is only serialized here, never recomputed.
pub fn compose_tutor_turn(
    goal_name: &str,
    current_level: &str,
    history: &[ChatTurn],
    learner_response: &str,
) -> Prompt {
    let (kind, instructions) = if history.is_empty() {
        (PromptKind::TutorIntroduction, TUTOR_INTRODUCTION_INSTRUCTIONS)
    } else {
        (PromptKind::TutorFollowUp, TUTOR_FOLLOW_UP_INSTRUCTIONS)
    };

    let learner_response = if learner_response.trim().is_empty() {
        EMPTY_HISTORY
    } else {
        learner_response
    };

    let user_content = format!(
        "LEARNING GOAL: {}\nCURRENT DIFFICULTY LEVEL: {}\n\nCHAT HISTORY:\n{}\n\nLATEST LEARNER RESPONSE:\n{}",
        goal_name,
        current_level,
        format_chat_history(history),
        learner_response
    );

    Prompt {
        kind,
        system_instructions: instructions.to_string(),
        user_content,
        response_mode: ResponseMode::PlainText,
    }
}

/// Builds the strict-JSON prompt that scores a full transcript.
pub fn compose_transcript_analysis(history: &[ChatTurn]) -> Prompt {
    Prompt {
        kind: PromptKind::TranscriptAnalysis,
        system_instructions: TRANSCRIPT_ANALYSIS_INSTRUCTIONS.to_string(),
        user_content: format!("TRANSCRIPT:\n{}", format_chat_history(history)),
        response_mode: ResponseMode::StrictJson,
    }
}

/// Builds the prompt asking for next steps and knowledge gaps.
pub fn compose_recommendation(goal_name: &str, level: &str, history: &[ChatTurn]) -> Prompt {
    Prompt {
        kind: PromptKind::Recommendation,
        system_instructions: RECOMMENDATION_INSTRUCTIONS.to_string(),
        user_content: format!(
            "1. Learner Level: {}\n2. Learning Goal: {}\n3. Chat History:\n{}",
            level,
            goal_name,
            format_chat_history(history)
        ),
        response_mode: ResponseMode::PlainText,
    }
}
