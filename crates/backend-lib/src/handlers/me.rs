use crate::gate::AuthenticatedUser;
use axum::{Extension, Json};
use taller_common::UserClaims;

/// `GET /api/me`
pub async fn me(Extension(user): Extension<AuthenticatedUser>) -> Json<UserClaims> {
    Json(user.claims)
}
