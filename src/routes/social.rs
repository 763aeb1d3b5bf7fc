use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::db::is_constraint_violation;
use crate::db::models::{Follow, UserSummary};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct FollowRequest {
    pub following_id: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/follow", post(follow))
        .route("/api/unfollow", delete(unfollow))
        .route("/api/users/{username}/followers", get(list_followers))
        .route("/api/users/{username}/following", get(list_following))
}

// --- Handlers ---

async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<FollowRequest>,
) -> AppResult<Response> {
    let following_id = req
        .following_id
        .ok_or_else(|| AppError::BadRequest("following_id is required.".into()))?;

    // Rejected before any store access
    if following_id == user.id {
        return Err(AppError::BadRequest("Cannot follow yourself.".into()));
    }

    let conn = state.db.get()?;
    let target_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
        params![following_id],
        |row| row.get(0),
    )?;
    if !target_exists {
        return Err(AppError::NotFound("User not found.".into()));
    }

    // The (follower_id, following_id) unique pair doubles as the duplicate
    // check; re-following reports success without a second row.
    let inserted = conn.execute(
        "INSERT INTO follows (follower_id, following_id) VALUES (?1, ?2)",
        params![user.id, following_id],
    );
    match inserted {
        Ok(_) => {
            let follow = conn.query_row(
                "SELECT id, follower_id, following_id, created_at FROM follows WHERE id = ?1",
                params![conn.last_insert_rowid()],
                |row| {
                    Ok(Follow {
                        id: row.get(0)?,
                        follower_id: row.get(1)?,
                        following_id: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )?;
            Ok((StatusCode::CREATED, Json(json!({ "follow": follow }))).into_response())
        }
        Err(e) if is_constraint_violation(&e) => {
            Ok(Json(json!({ "message": "Already following." })).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<FollowRequest>,
) -> AppResult<Response> {
    let following_id = req
        .following_id
        .ok_or_else(|| AppError::BadRequest("following_id is required.".into()))?;

    let conn = state.db.get()?;
    let deleted = conn.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
        params![user.id, following_id],
    )?;
    if deleted == 0 {
        return Err(AppError::NotFound(
            "Follow relationship not found.".into(),
        ));
    }

    Ok(Json(json!({ "message": "Unfollowed." })).into_response())
}

async fn list_followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let user_id = lookup_user_id(&conn, &username)?;

    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.profile_image_url \
         FROM follows f JOIN users u ON f.follower_id = u.id \
         WHERE f.following_id = ?1 ORDER BY u.username",
    )?;
    let followers: Vec<UserSummary> = stmt
        .query_map(params![user_id], user_summary_from_row)?
        .collect::<Result<_, _>>()?;

    Ok(Json(json!({ "followers": followers })).into_response())
}

async fn list_following(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let user_id = lookup_user_id(&conn, &username)?;

    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.profile_image_url \
         FROM follows f JOIN users u ON f.following_id = u.id \
         WHERE f.follower_id = ?1 ORDER BY u.username",
    )?;
    let following: Vec<UserSummary> = stmt
        .query_map(params![user_id], user_summary_from_row)?
        .collect::<Result<_, _>>()?;

    Ok(Json(json!({ "following": following })).into_response())
}

// --- Query helpers ---

fn lookup_user_id(conn: &rusqlite::Connection, username: &str) -> Result<i64, AppError> {
    conn.query_row(
        "SELECT id FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )
    .map_err(|_| AppError::NotFound("User not found.".into()))
}

fn user_summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: row.get(0)?,
        username: row.get(1)?,
        profile_image_url: row.get(2)?,
    })
}
