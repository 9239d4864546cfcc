// ============================
// crates/backend-lib/src/handlers/admin.rs
// ============================
//! Session administration. Routes are admin-only in the gate; handlers check again.
use crate::auth::AuthError;
use crate::error::AppError;
use crate::gate::AuthenticatedUser;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use taller_common::{Role, SessionSummary, TerminatedResponse};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub user_id: String,
}

fn require_admin(user: &AuthenticatedUser) -> Result<(), AppError> {
    if user.claims.role.satisfies(Role::Admin) {
        Ok(())
    } else {
        Err(AuthError::InsufficientRole.into())
    }
}

/// `GET /api/admin/sessions?user_id=`
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    require_admin(&user)?;
    let sessions = state
        .auth
        .list_sessions(&query.user_id)
        .into_iter()
        .map(SessionSummary::from)
        .collect();
    Ok(Json(sessions))
}

/// `DELETE /api/admin/sessions/{id}`
pub async fn terminate_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_admin(&user)?;
    if state.auth.terminate_session(id) {
        info!(admin = %user.claims.id, session_id = %id, "session terminated");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("session {id}")))
    }
}

/// `DELETE /api/admin/users/{id}/sessions`
pub async fn terminate_user_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(user_id): Path<String>,
) -> Result<Json<TerminatedResponse>, AppError> {
    require_admin(&user)?;
    let terminated = state.auth.terminate_user_sessions(&user_id);
    info!(admin = %user.claims.id, user_id = %user_id, terminated, "user sessions terminated");
    Ok(Json(TerminatedResponse { terminated }))
}
