use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct GuestLoginRequest {
    display_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user_id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/auth/guest", post(login_guest))
}

/// Stand-in for the external identity provider: mints a short-lived guest
/// identity so the rest of the API can be exercised without an account.
async fn login_guest(
    State(state): State<AppState>,
    Json(req): Json<GuestLoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user_id = format!("guest-{}", Uuid::new_v4());
    let claims = Claims {
        sub: user_id.clone(),
        name: req.display_name.unwrap_or_else(|| "Guest".to_string()),
        role: "GUEST".to_owned(),
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!("Token encoding failed: {}", e))?;

    Ok(Json(AuthResponse { token, user_id }))
}
