use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{hash_password, session, verify_password};
use crate::db::is_constraint_violation;
use crate::error::{AppError, AppResult};
use crate::extractors::bearer_token;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username_or_email: Option<String>,
    pub password: Option<String>,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Response> {
    let (username, email, password) = match (
        req.username.as_deref().map(str::trim),
        req.email.as_deref().map(str::trim),
        req.password.as_deref(),
    ) {
        (Some(u), Some(e), Some(p)) if !u.is_empty() && !e.is_empty() && !p.is_empty() => {
            (u.to_string(), e.to_string(), p)
        }
        _ => return Err(AppError::BadRequest("All fields are required.".into())),
    };

    let password_hash = hash_password(password)?;

    // The unique constraints on username/email are the duplicate check;
    // a violated insert maps straight to 409.
    let conn = state.db.get()?;
    let inserted = conn.execute(
        "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
        params![username, email, password_hash],
    );
    if let Err(e) = inserted {
        if is_constraint_violation(&e) {
            return Err(AppError::Conflict(
                "Username or email already exists.".into(),
            ));
        }
        return Err(e.into());
    }

    let user_id = conn.last_insert_rowid();
    let created_at: String = conn.query_row(
        "SELECT created_at FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user": {
                "id": user_id,
                "username": username,
                "email": email,
                "created_at": created_at,
            }
        })),
    )
        .into_response())
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let (identifier, password) = match (req.username_or_email.as_deref(), req.password.as_deref()) {
        (Some(i), Some(p)) if !i.is_empty() && !p.is_empty() => (i, p),
        _ => return Err(AppError::BadRequest("All fields are required.".into())),
    };

    // Unknown identifier and wrong password are indistinguishable to the caller.
    let conn = state.db.get()?;
    let user = conn
        .query_row(
            "SELECT id, username, email, password_hash FROM users \
             WHERE username = ?1 OR email = ?1",
            params![identifier],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .map_err(|_| AppError::Unauthorized)?;
    drop(conn);

    let (id, username, email, password_hash) = user;
    if !verify_password(password, &password_hash) {
        return Err(AppError::Unauthorized);
    }

    let token = session::create_session(&state.db, id, state.config.auth.session_hours)?;

    Ok(Json(json!({
        "token": token,
        "user": { "id": id, "username": username, "email": email },
    }))
    .into_response())
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    session::delete_session(&state.db, token)?;
    Ok(Json(json!({ "message": "Logged out." })).into_response())
}
