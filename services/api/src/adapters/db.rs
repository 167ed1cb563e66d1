//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the SQLite database using `sqlx`.

use std::str::FromStr;

use adaptive_learning_core::domain::{ChatTurn, LearningGoal, Session, SessionGoalDetails};
use adaptive_learning_core::ports::{DatabaseService, PortError, PortResult};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{error, info, warn};

/// The catalogue of learning goals inserted into an empty database.
pub const DEFAULT_LEARNING_GOALS: &[&str] = &[
    "Arithmetic",
    "Algebra",
    "Geometry",
    "Trigonometry",
    "Calculus",
    "Probability",
    "Statistics",
    "Number Theory",
    "Linear Algebra",
    "Discrete Mathematics",
    "Set Theory",
    "Differential Equations",
    "Complex Numbers",
    "Mathematical Logic",
    "Combinatorics",
    "Topology",
    "Graph Theory",
    "Mathematical Modelling",
    "Real Analysis",
    "Functional Analysis",
    "Vector Calculus",
    "Numerical Methods",
    "Optimization Techniques",
    "Game Theory",
    "Boolean Algebra",
    "Financial Mathematics",
    "Cryptography",
    "Fractals and Chaos Theory",
    "Applied Mathematics",
    "Differential Geometry",
];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool with foreign keys enforced on every connection.
    ///
    /// Connections are never recycled so a `sqlite::memory:` database lives
    /// as long as the pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .create_if_missing(true);

        SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts `names` as learning goals when the table is empty.
    ///
    /// Returns how many goals were inserted; zero when goals already exist.
    pub async fn seed_learning_goals(&self, names: &[&str]) -> Result<usize, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM learning_goals")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            info!(event_type = "seed_learning_goals", existing, "Learning goals already present");
            return Ok(0);
        }

        for name in names {
            sqlx::query("INSERT INTO learning_goals (name) VALUES (?)")
                .bind(*name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(event_type = "seed_learning_goals", inserted = names.len(), "Learning goals inserted");
        Ok(names.len())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct LearningGoalRecord {
    id: i64,
    name: String,
}
impl LearningGoalRecord {
    fn to_domain(self) -> LearningGoal {
        LearningGoal {
            id: self.id,
            name: self.name,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: i64,
    learning_goal_id: i64,
    student_initial_level: String,
    student_current_level: String,
}
impl SessionRecord {
    fn to_domain(self) -> Session {
        Session {
            id: self.id,
            learning_goal_id: self.learning_goal_id,
            initial_level: self.student_initial_level,
            current_level: self.student_current_level,
        }
    }
}

#[derive(FromRow)]
struct SessionGoalRecord {
    goal_name: String,
    student_initial_level: String,
}
impl SessionGoalRecord {
    fn to_domain(self) -> SessionGoalDetails {
        SessionGoalDetails {
            goal_name: self.goal_name,
            initial_level: self.student_initial_level,
        }
    }
}

#[derive(FromRow)]
struct ChatTurnRecord {
    id: i64,
    session_id: i64,
    llm_response: String,
    learner_response: String,
}
impl ChatTurnRecord {
    fn to_domain(self) -> ChatTurn {
        ChatTurn {
            id: self.id,
            session_id: self.session_id,
            model_response: self.llm_response,
            learner_response: self.learner_response,
        }
    }
}

/// Splits write failures into referential violations and everything else.
fn map_write_error(e: sqlx::Error, what: &str) -> PortError {
    match &e {
        sqlx::Error::Database(db)
            if db.is_foreign_key_violation()
                || db.message().contains("FOREIGN KEY constraint failed") =>
        {
            PortError::Constraint(format!("{}: {}", what, db.message()))
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn find_learning_goal_by_name(&self, name: &str) -> PortResult<LearningGoal> {
        let record = sqlx::query_as::<_, LearningGoalRecord>(
            "SELECT id, name FROM learning_goals WHERE name = ? ORDER BY id LIMIT 1",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                warn!(event_type = "get_learning_goal_by_name", goal_name = name, "Learning goal not found");
                PortError::NotFound(format!("Learning goal '{}' not found", name))
            }
            _ => {
                error!(event_type = "get_learning_goal_by_name", error = %e, "Failed to fetch learning goal");
                PortError::Unexpected(e.to_string())
            }
        })?;

        info!(event_type = "get_learning_goal_by_name", goal_id = record.id, "Learning goal fetched");
        Ok(record.to_domain())
    }

    async fn create_session(&self, goal_id: i64, initial_level: &str) -> PortResult<Session> {
        let result = async {
            let mut tx = self.pool.begin().await?;
            let record = sqlx::query_as::<_, SessionRecord>(
                "INSERT INTO session_details (learning_goal_id, student_initial_level, student_current_level) \
                 VALUES (?, ?, ?) \
                 RETURNING id, learning_goal_id, student_initial_level, student_current_level",
            )
            .bind(goal_id)
            .bind(initial_level)
            .bind(initial_level)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(record)
        }
        .await;

        match result {
            Ok(record) => {
                info!(event_type = "create_session", session_id = record.id, "Session added to the database");
                Ok(record.to_domain())
            }
            Err(e) => {
                error!(event_type = "create_session", goal_id, error = %e, "Failed to create session");
                Err(map_write_error(e, "session_details.learning_goal_id"))
            }
        }
    }

    async fn get_session_by_id(&self, session_id: i64) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, learning_goal_id, student_initial_level, student_current_level \
             FROM session_details WHERE id = ?",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                warn!(event_type = "session_not_found", session_id, "Session not found");
                PortError::NotFound(format!("Session {} not found", session_id))
            }
            _ => {
                error!(event_type = "session_fetch_error", session_id, error = %e, "Failed to fetch session");
                PortError::Unexpected(e.to_string())
            }
        })?;

        info!(event_type = "session_fetched", session_id, "Session fetched");
        Ok(record.to_domain())
    }

    async fn get_goal_details_by_session_id(
        &self,
        session_id: i64,
    ) -> PortResult<SessionGoalDetails> {
        let record = sqlx::query_as::<_, SessionGoalRecord>(
            "SELECT g.name AS goal_name, s.student_initial_level \
             FROM session_details s \
             JOIN learning_goals g ON g.id = s.learning_goal_id \
             WHERE s.id = ?",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                warn!(event_type = "learning_goal_not_found", session_id, "Learning goal not found for session");
                PortError::NotFound(format!("Learning goal not found for session {}", session_id))
            }
            _ => {
                error!(event_type = "learning_goal_fetch_error", session_id, error = %e, "Failed to fetch learning goal");
                PortError::Unexpected(e.to_string())
            }
        })?;

        info!(event_type = "learning_goal_fetched", session_id, "Learning goal fetched for session");
        Ok(record.to_domain())
    }

    async fn append_chat_turn(
        &self,
        session_id: i64,
        model_response: &str,
        learner_response: &str,
    ) -> PortResult<ChatTurn> {
        let result = async {
            let mut tx = self.pool.begin().await?;
            let record = sqlx::query_as::<_, ChatTurnRecord>(
                "INSERT INTO chat_history (session_id, llm_response, learner_response) \
                 VALUES (?, ?, ?) \
                 RETURNING id, session_id, llm_response, learner_response",
            )
            .bind(session_id)
            .bind(model_response)
            .bind(learner_response)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(record)
        }
        .await;

        match result {
            Ok(record) => {
                info!(event_type = "chat_history_stored", session_id, turn_id = record.id, "Chat turn stored");
                Ok(record.to_domain())
            }
            Err(e) => {
                error!(event_type = "chat_history_store_error", session_id, error = %e, "Failed to store chat turn");
                Err(map_write_error(e, "chat_history.session_id"))
            }
        }
    }

    async fn get_recent_chat_turns(
        &self,
        session_id: i64,
        limit: u32,
    ) -> PortResult<Vec<ChatTurn>> {
        let records = sqlx::query_as::<_, ChatTurnRecord>(
            "SELECT id, session_id, llm_response, learner_response FROM chat_history \
             WHERE session_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(event_type = "chat_history_fetch_error", session_id, error = %e, "Failed to fetch recent chat history");
            PortError::Unexpected(e.to_string())
        })?;

        if records.is_empty() {
            warn!(event_type = "no_chat_history", session_id, "No chat history found");
        }
        info!(event_type = "chat_history_fetched", session_id, count = records.len(), "Recent chat history fetched");
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_all_chat_turns(&self, session_id: i64) -> PortResult<Vec<ChatTurn>> {
        let records = sqlx::query_as::<_, ChatTurnRecord>(
            "SELECT id, session_id, llm_response, learner_response FROM chat_history \
             WHERE session_id = ? ORDER BY id DESC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(event_type = "chat_history_fetch_error", session_id, error = %e, "Failed to fetch chat history");
            PortError::Unexpected(e.to_string())
        })?;

        if records.is_empty() {
            warn!(event_type = "no_chat_history", session_id, "No chat history found");
        }
        info!(event_type = "chat_history_fetched", session_id, count = records.len(), "Complete chat history fetched");
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
