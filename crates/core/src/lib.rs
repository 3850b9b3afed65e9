//! Core domain for deedcraft: agent response normalization, session state,
//! and application configuration.
//!
//! The normalizer (`normalize`) is the load-bearing module — everything else
//! in the workspace is glue around an external LLM pipeline whose output
//! shape is not under our control.

pub mod config;
pub mod normalize;
pub mod session;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LlmProvider, LogFormat};
pub use normalize::{flatten_response, parse_object, split_responses, NO_RESPONSE_PLACEHOLDER};
pub use session::{
    Clause, InteractionEvent, SessionId, SessionState, SessionStore, UnknownSession,
};
