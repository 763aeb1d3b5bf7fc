use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::Note;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::books::book_exists;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateNoteRequest {
    pub book_id: Option<i64>,
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateNoteRequest {
    pub content: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notes", get(list_notes).post(create_note))
        .route("/api/notes/{id}", put(update_note).delete(delete_note))
}

// --- Handlers ---

async fn create_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateNoteRequest>,
) -> AppResult<Response> {
    let content = req
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let (book_id, content) = match (req.book_id, content) {
        (Some(b), Some(c)) => (b, c),
        _ => {
            return Err(AppError::BadRequest(
                "book_id and content are required.".into(),
            ))
        }
    };

    let conn = state.db.get()?;
    if !book_exists(&conn, book_id)? {
        return Err(AppError::NotFound("Book not found.".into()));
    }

    conn.execute(
        "INSERT INTO notes (user_id, book_id, content) VALUES (?1, ?2, ?3)",
        params![user.id, book_id, content],
    )?;
    let note = get_note(&conn, conn.last_insert_rowid())?;

    Ok((StatusCode::CREATED, Json(json!({ "note": note }))).into_response())
}

/// Notes are private: the listing is always scoped to the authenticated user.
async fn list_notes(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, user_id, book_id, content, created_at FROM notes \
         WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let notes: Vec<Note> = stmt
        .query_map(params![user.id], note_from_row)?
        .collect::<Result<_, _>>()?;

    Ok(Json(json!({ "notes": notes })).into_response())
}

async fn update_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateNoteRequest>,
) -> AppResult<Response> {
    let content = req
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("content is required.".into()))?;

    // Scoping the UPDATE by owner makes someone else's note indistinguishable
    // from a missing one.
    let conn = state.db.get()?;
    let updated = conn.execute(
        "UPDATE notes SET content = ?1 WHERE id = ?2 AND user_id = ?3",
        params![content, id, user.id],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound("Note not found.".into()));
    }

    let note = get_note(&conn, id)?;
    Ok(Json(json!({ "note": note })).into_response())
}

async fn delete_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let deleted = conn.execute(
        "DELETE FROM notes WHERE id = ?1 AND user_id = ?2",
        params![id, user.id],
    )?;
    if deleted == 0 {
        return Err(AppError::NotFound("Note not found.".into()));
    }

    Ok(Json(json!({ "message": "Note deleted." })).into_response())
}

// --- Query helpers ---

fn note_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        user_id: row.get(1)?,
        book_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn get_note(conn: &rusqlite::Connection, id: i64) -> Result<Note, AppError> {
    conn.query_row(
        "SELECT id, user_id, book_id, content, created_at FROM notes WHERE id = ?1",
        params![id],
        note_from_row,
    )
    .map_err(AppError::from)
}
