//! Sequential two-stage drafting pipeline.
//!
//! Stage 1 (clause retrieval) asks the model which metadata fields and
//! clause texts the user's message implies and applies them to the session
//! through the tools. Stage 2 (drafting) assembles the retrieved clauses
//! into a full Sale Deed draft. The stage-2 output is returned raw; the
//! caller normalizes it.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use deedcraft_core::normalize;
use deedcraft_core::session::{Clause, SessionId, SessionState, SessionStore};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::llm::LlmClient;
use crate::tools::{StoreRetrievedClauses, ToolRegistry, UpdateMetadata};

/// The standard Sale Deed clause headings offered by the retrieval stage.
pub const STANDARD_CLAUSES: [&str; 14] = [
    "Parties",
    "Property Description",
    "Payment Terms",
    "Advance/Installment",
    "Transfer of Title & Possession",
    "Indemnity & Encumbrance",
    "Warranty/Covenant",
    "Time-is-of-the-Essence",
    "Right to Quiet Enjoyment",
    "Reddendum/Tandem",
    "Habendum",
    "Dispute Resolution & Governing Law",
    "Registration & Witnesses",
    "Miscellaneous (Severability/Notices)",
];

/// The opaque collaborator the HTTP layer talks to: one user message in,
/// one raw text response out.
#[async_trait]
pub trait AgentPipeline: Send + Sync {
    async fn run(&self, session: &SessionId, user_message: &str) -> Result<String, AgentError>;
}

/// Constrained envelope the retrieval stage is prompted to emit. Every field
/// is optional; a reply the model shaped differently applies nothing.
#[derive(Debug, Default, Deserialize)]
struct RetrievalEnvelope {
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    #[serde(default)]
    clauses: Vec<Clause>,
}

pub struct DraftingPipeline {
    llm: Arc<dyn LlmClient>,
    store: SessionStore,
    tools: ToolRegistry,
}

impl DraftingPipeline {
    pub fn new(llm: Arc<dyn LlmClient>, store: SessionStore) -> Self {
        let mut tools = ToolRegistry::default();
        tools.register(UpdateMetadata::new(store.clone()));
        tools.register(StoreRetrievedClauses::new(store.clone()));
        Self { llm, store, tools }
    }

    async fn retrieval_stage(
        &self,
        session: &SessionId,
        user_message: &str,
    ) -> Result<(), AgentError> {
        let state = self.store.snapshot(session)?;
        let prompt = retrieval_prompt(&state, user_message);
        let raw = self.llm.complete(&prompt).await?;

        let Some(envelope) = parse_envelope(&raw) else {
            // Best effort: an off-script reply is not a failure.
            warn!(
                event_name = "agent.retrieval.envelope_unparsed",
                session_id = %session,
                "retrieval stage reply was not a tool envelope, applying nothing"
            );
            return Ok(());
        };

        for (field, value) in &envelope.metadata {
            if let Some(tool) = self.tools.get(UpdateMetadata::NAME) {
                tool.execute(session, json!({"field": field, "value": value})).await?;
            }
        }

        if !envelope.clauses.is_empty() {
            if let Some(tool) = self.tools.get(StoreRetrievedClauses::NAME) {
                tool.execute(session, json!({"clauses": &envelope.clauses})).await?;
            }
            let selections: Vec<String> =
                envelope.clauses.iter().map(|clause| clause.kind.clone()).collect();
            self.store.update(session, |state| state.clauses = selections)?;
        }

        debug!(
            event_name = "agent.retrieval.applied",
            session_id = %session,
            metadata_fields = envelope.metadata.len(),
            clause_count = envelope.clauses.len(),
            "retrieval stage applied"
        );

        Ok(())
    }

    async fn drafting_stage(
        &self,
        session: &SessionId,
        user_message: &str,
    ) -> Result<String, AgentError> {
        let state = self.store.snapshot(session)?;
        let prompt = drafting_prompt(&state, user_message);
        let draft = self.llm.complete(&prompt).await?;

        self.store.update(session, |state| state.draft.push(draft.clone()))?;
        Ok(draft)
    }
}

#[async_trait]
impl AgentPipeline for DraftingPipeline {
    async fn run(&self, session: &SessionId, user_message: &str) -> Result<String, AgentError> {
        self.retrieval_stage(session, user_message).await?;
        self.drafting_stage(session, user_message).await
    }
}

fn parse_envelope(raw: &str) -> Option<RetrievalEnvelope> {
    let map = normalize::parse_object(raw)?;
    serde_json::from_value(Value::Object(map)).ok()
}

fn retrieval_prompt(state: &SessionState, user_message: &str) -> String {
    let mut prompt = String::from(
        "You are the Clause Retriever for drafting a Sale Deed.\n\
         The standard Sale Deed clauses are:\n",
    );
    for (index, heading) in STANDARD_CLAUSES.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {heading}", index + 1);
    }

    if !state.metadata.is_empty() {
        prompt.push_str("\nKnown metadata so far:\n");
        for (field, value) in &state.metadata {
            let _ = writeln!(prompt, "- {field}: {value}");
        }
    }

    let _ = write!(
        prompt,
        "\nUser message: {user_message}\n\n\
         Reply with a single JSON object of the form\n\
         {{\"metadata\": {{\"field\": \"value\"}}, \"clauses\": [{{\"type\": \"...\", \"text\": \"...\"}}]}}.\n\
         Include a metadata entry for every deed field the user supplied \
         (vendor_name, buyer_name, property details, consideration, ...) and a \
         clauses entry with full clause text for every clause the user selected. \
         Leave both empty if the message carries neither."
    );

    prompt
}

fn drafting_prompt(state: &SessionState, user_message: &str) -> String {
    let mut prompt = String::from(
        "You are the Drafting Agent for a Sale Deed.\n\
         Assemble a complete, professional deed with title, parties, recitals, \
         the clauses below as numbered headed sections, general provisions, and \
         a signature block. Fill party names and dates from the metadata where \
         available.\n",
    );

    if !state.metadata.is_empty() {
        prompt.push_str("\nMetadata:\n");
        for (field, value) in &state.metadata {
            let _ = writeln!(prompt, "- {field}: {value}");
        }
    }

    if state.retrieved_clauses.is_empty() {
        prompt.push_str("\nNo clauses have been selected yet; say so and list the standard clauses to choose from.\n");
    } else {
        prompt.push_str("\nRetrieved clauses:\n");
        for (index, clause) in state.retrieved_clauses.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}: {}", index + 1, clause.kind, clause.text);
        }
    }

    let _ = write!(
        prompt,
        "\nUser message: {user_message}\n\n\
         Give the final output as json in markdown format."
    );

    prompt
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use deedcraft_core::session::{InteractionEvent, SessionStore};

    use super::{AgentPipeline, DraftingPipeline, STANDARD_CLAUSES};
    use crate::llm::{LlmClient, LlmError};

    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().expect("lock").push(prompt.to_string());
            self.replies
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::MalformedResponse("script exhausted".into())))
        }
    }

    #[tokio::test]
    async fn retrieval_envelope_updates_session_before_drafting() {
        let store = SessionStore::new();
        let session = store.create();
        let llm = ScriptedLlm::new(vec![
            Ok(r#"```json
{"metadata": {"vendor_name": "Asha Rao"}, "clauses": [{"type": "Parties", "text": "Between the vendor and the purchaser."}]}
```"#
                .to_string()),
            Ok("{\"sale_deed_draft\": \"THIS DEED...\"}".to_string()),
        ]);

        let pipeline = DraftingPipeline::new(llm.clone(), store.clone());
        let raw = pipeline
            .run(&session, "vendor is Asha Rao, include the parties clause")
            .await
            .expect("pipeline should succeed");

        assert_eq!(raw, "{\"sale_deed_draft\": \"THIS DEED...\"}");

        let state = store.snapshot(&session).expect("session should exist");
        assert_eq!(state.metadata.get("vendor_name").map(String::as_str), Some("Asha Rao"));
        assert_eq!(state.clauses, vec!["Parties".to_string()]);
        assert_eq!(state.retrieved_clauses.len(), 1);
        assert_eq!(state.draft.len(), 1);
        assert!(state
            .interaction_history
            .iter()
            .any(|event| matches!(event, InteractionEvent::UpdateMetadata { .. })));
        assert!(state
            .interaction_history
            .iter()
            .any(|event| matches!(
                event,
                InteractionEvent::StoreRetrievedClauses { clause_count: 1, .. }
            )));
    }

    #[tokio::test]
    async fn off_script_retrieval_reply_applies_nothing() {
        let store = SessionStore::new();
        let session = store.create();
        let llm = ScriptedLlm::new(vec![
            Ok("Sure! Which clauses would you like to include?".to_string()),
            Ok("draft text".to_string()),
        ]);

        let pipeline = DraftingPipeline::new(llm, store.clone());
        let raw = pipeline.run(&session, "hello").await.expect("pipeline should succeed");

        assert_eq!(raw, "draft text");
        let state = store.snapshot(&session).expect("session should exist");
        assert!(state.metadata.is_empty());
        assert!(state.retrieved_clauses.is_empty());
    }

    #[tokio::test]
    async fn drafting_prompt_carries_retrieved_clauses_and_clause_menu() {
        let store = SessionStore::new();
        let session = store.create();
        let llm = ScriptedLlm::new(vec![
            Ok(r#"{"clauses": [{"type": "Habendum", "text": "To hold the property."}]}"#
                .to_string()),
            Ok("draft".to_string()),
        ]);

        let pipeline = DraftingPipeline::new(llm.clone(), store.clone());
        pipeline.run(&session, "include habendum").await.expect("pipeline should succeed");

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        for heading in STANDARD_CLAUSES {
            assert!(prompts[0].contains(heading), "retrieval prompt should list {heading}");
        }
        assert!(prompts[1].contains("Habendum: To hold the property."));
    }

    #[tokio::test]
    async fn llm_failure_propagates_uncaught() {
        let store = SessionStore::new();
        let session = store.create();
        let llm =
            ScriptedLlm::new(vec![Err(LlmError::MalformedResponse("boom".into()))]);

        let pipeline = DraftingPipeline::new(llm, store);
        let result = pipeline.run(&session, "anything").await;
        assert!(result.is_err());
    }
}
