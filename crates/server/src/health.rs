use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use deedcraft_core::session::SessionStore;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    store: SessionStore,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub sessions: HealthCheck,
    pub checked_at: String,
}

pub fn router(store: SessionStore) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { store })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let sessions = session_check(&state.store);
    let ready = sessions.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "deedcraft-server runtime initialized".to_string(),
        },
        sessions,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn session_check(store: &SessionStore) -> HealthCheck {
    if store.is_empty() {
        HealthCheck {
            status: "degraded",
            detail: "no drafting session bootstrapped".to_string(),
        }
    } else {
        HealthCheck {
            status: "ready",
            detail: format!("{} session(s) in memory", store.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use deedcraft_core::session::SessionStore;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_a_session_exists() {
        let store = SessionStore::new();
        store.create();

        let (status, Json(payload)) = health(State(HealthState { store })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.sessions.status, "ready");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_degrades_without_a_bootstrapped_session() {
        let store = SessionStore::new();

        let (status, Json(payload)) = health(State(HealthState { store })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.sessions.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
