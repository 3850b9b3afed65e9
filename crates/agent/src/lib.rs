//! Agent pipeline - two-stage Sale Deed drafting over an LLM
//!
//! This crate drives the external LLM that drafts the document:
//! - **LLM Client** (`llm`) - Pluggable completion trait + HTTP client
//!   (Gemini / Ollama)
//! - **Tools** (`tools`) - Session mutations the retrieval stage may request
//!   (`update_metadata`, `store_retrieved_clauses`)
//! - **Pipeline** (`pipeline`) - Sequential clause-retrieval then drafting
//!   stages behind the `AgentPipeline` seam
//!
//! # Architecture
//!
//! ```text
//! user message → Stage 1 (clause retrieval) → tools → session state
//!                          ↓
//!                Stage 2 (drafting) → raw text → normalizer (core)
//! ```
//!
//! The pipeline never cleans its own output: whatever shape the model emits
//! (JSON, fenced markdown, prose) is handed back raw and normalized at the
//! HTTP layer. LLM transport failures propagate as `AgentError`; a malformed
//! stage-1 envelope is not an error and simply applies nothing.

pub mod error;
pub mod llm;
pub mod pipeline;
pub mod tools;

pub use error::AgentError;
pub use llm::{HttpLlmClient, LlmClient, LlmError};
pub use pipeline::{AgentPipeline, DraftingPipeline};
pub use tools::{StoreRetrievedClauses, Tool, ToolRegistry, UpdateMetadata};
