//! Session mutations the retrieval stage may request.
//!
//! Both tools are idempotent, append a timestamped event to the interaction
//! log, and answer with a success acknowledgment mirroring their input.

use std::collections::HashMap;

use async_trait::async_trait;
use deedcraft_core::session::{
    event_timestamp, Clause, InteractionEvent, SessionId, SessionStore,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AgentError;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, session: &SessionId, input: Value) -> Result<Value, AgentError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(Box::as_ref)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Upserts one metadata field (`vendor_name`, `buyer_name`, ...) on the
/// session and logs the interaction.
pub struct UpdateMetadata {
    store: SessionStore,
}

#[derive(Debug, Deserialize)]
struct UpdateMetadataInput {
    field: String,
    value: String,
}

impl UpdateMetadata {
    pub const NAME: &'static str = "update_metadata";

    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for UpdateMetadata {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn execute(&self, session: &SessionId, input: Value) -> Result<Value, AgentError> {
        let input: UpdateMetadataInput = serde_json::from_value(input)
            .map_err(|err| AgentError::ToolInput { tool: Self::NAME, reason: err.to_string() })?;

        let timestamp = event_timestamp();
        let value = input.value.trim().to_string();

        self.store.update(session, |state| {
            state.metadata.insert(input.field.clone(), value.clone());
            state.interaction_history.push(InteractionEvent::UpdateMetadata {
                field: input.field.clone(),
                value: value.clone(),
                timestamp: timestamp.clone(),
            });
        })?;

        Ok(json!({
            "status": "success",
            "field": input.field,
            "value": value,
            "timestamp": timestamp,
        }))
    }
}

/// Replaces the session's retrieved clause texts wholesale and logs the
/// operation with the clause count.
pub struct StoreRetrievedClauses {
    store: SessionStore,
}

#[derive(Debug, Deserialize)]
struct StoreRetrievedClausesInput {
    clauses: Vec<Clause>,
}

impl StoreRetrievedClauses {
    pub const NAME: &'static str = "store_retrieved_clauses";

    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for StoreRetrievedClauses {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn execute(&self, session: &SessionId, input: Value) -> Result<Value, AgentError> {
        let input: StoreRetrievedClausesInput = serde_json::from_value(input)
            .map_err(|err| AgentError::ToolInput { tool: Self::NAME, reason: err.to_string() })?;

        let timestamp = event_timestamp();
        let clause_count = input.clauses.len();

        self.store.update(session, |state| {
            state.retrieved_clauses = input.clauses.clone();
            state.interaction_history.push(InteractionEvent::StoreRetrievedClauses {
                clause_count,
                timestamp: timestamp.clone(),
            });
        })?;

        Ok(json!({
            "status": "success",
            "clause_count": clause_count,
            "timestamp": timestamp,
        }))
    }
}
