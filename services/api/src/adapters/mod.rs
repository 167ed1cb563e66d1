pub mod db;
pub mod tutor_llm;

pub use db::DbAdapter;
pub use tutor_llm::OpenAiTutorAdapter;
