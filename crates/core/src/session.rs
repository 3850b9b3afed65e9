//! Session state for one drafting conversation.
//!
//! A session holds the metadata fields, clause selections, and append-only
//! interaction log that the agent pipeline reads and mutates. State lives in
//! memory for the life of the process; there is no persistence.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named section of legal text selected for inclusion in the draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// One entry in the append-only interaction log. Entries are never mutated
/// after insertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InteractionEvent {
    UserQuery { query: String, timestamp: String },
    UpdateMetadata { field: String, value: String, timestamp: String },
    StoreRetrievedClauses { clause_count: usize, timestamp: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub metadata: BTreeMap<String, String>,
    pub clauses: Vec<String>,
    pub retrieved_clauses: Vec<Clause>,
    pub draft: Vec<String>,
    pub interaction_history: Vec<InteractionEvent>,
}

/// Timestamp format shared by all interaction events.
pub fn event_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown session `{0}`")]
pub struct UnknownSession(pub SessionId);

/// Keyed in-memory session store.
///
/// All access goes through this narrow interface (`create`, `snapshot`,
/// `update`, `append_event`); callers never touch the map or its lock
/// directly. Cloning the store clones a handle to the same sessions.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<SessionId, SessionState>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh session with empty state and returns its id.
    pub fn create(&self) -> SessionId {
        let id = SessionId::new();
        self.write().insert(id.clone(), SessionState::default());
        id
    }

    /// Returns a point-in-time copy of the session state.
    pub fn snapshot(&self, id: &SessionId) -> Result<SessionState, UnknownSession> {
        self.read().get(id).cloned().ok_or_else(|| UnknownSession(id.clone()))
    }

    /// Applies `mutate` to the session state under the lock.
    pub fn update<F>(&self, id: &SessionId, mutate: F) -> Result<(), UnknownSession>
    where
        F: FnOnce(&mut SessionState),
    {
        let mut sessions = self.write();
        let state = sessions.get_mut(id).ok_or_else(|| UnknownSession(id.clone()))?;
        mutate(state);
        Ok(())
    }

    /// Appends one event to the session's interaction log.
    pub fn append_event(
        &self,
        id: &SessionId,
        event: InteractionEvent,
    ) -> Result<(), UnknownSession> {
        self.update(id, |state| state.interaction_history.push(event))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SessionId, SessionState>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SessionId, SessionState>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
