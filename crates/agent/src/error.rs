use deedcraft_core::session::UnknownSession;
use thiserror::Error;

use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Session(#[from] UnknownSession),
    #[error("tool `{tool}` rejected input: {reason}")]
    ToolInput { tool: &'static str, reason: String },
}
