use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::db::is_constraint_violation;
use crate::db::models::Book;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct SaveBookRequest {
    pub catalog_id: Option<String>,
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub cover_image_url: Option<String>,
    pub description: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/books/search", get(search))
        .route("/api/books", post(save_book))
}

// --- Handlers ---

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Response> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing search query (q).".into()))?;

    let books = state.catalog.search(query).await.map_err(AppError::Upstream)?;

    Ok(Json(json!({ "books": books })).into_response())
}

/// Saves a catalog book locally. The unique constraint on catalog_id is the
/// duplicate check; a violated insert means the book was already saved.
async fn save_book(
    State(state): State<AppState>,
    Json(req): Json<SaveBookRequest>,
) -> AppResult<Response> {
    let (catalog_id, title) = match (
        req.catalog_id.as_deref().map(str::trim),
        req.title.as_deref().map(str::trim),
    ) {
        (Some(c), Some(t)) if !c.is_empty() && !t.is_empty() => (c, t),
        _ => {
            return Err(AppError::BadRequest(
                "catalog_id and title are required.".into(),
            ))
        }
    };
    let authors = serde_json::to_string(&req.authors.unwrap_or_default())
        .map_err(|e| AppError::Internal(format!("Author list serialization failed: {e}")))?;

    let conn = state.db.get()?;
    let inserted = conn.execute(
        "INSERT INTO books (catalog_id, title, authors, cover_image_url, description) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![catalog_id, title, authors, req.cover_image_url, req.description],
    );

    match inserted {
        Ok(_) => {
            let book = get_book(&conn, conn.last_insert_rowid())?;
            Ok((StatusCode::CREATED, Json(json!({ "book": book }))).into_response())
        }
        Err(e) if is_constraint_violation(&e) => {
            let book = get_book_by_catalog_id(&conn, catalog_id)?;
            Ok(Json(json!({ "book": book, "message": "Book already exists." })).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// --- Query helpers ---

const BOOK_COLUMNS: &str = "id, catalog_id, title, authors, cover_image_url, description, created_at";

pub fn book_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
    let authors_json: String = row.get(3)?;
    Ok(Book {
        id: row.get(0)?,
        catalog_id: row.get(1)?,
        title: row.get(2)?,
        authors: serde_json::from_str(&authors_json).unwrap_or_default(),
        cover_image_url: row.get(4)?,
        description: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn get_book(conn: &rusqlite::Connection, id: i64) -> Result<Book, AppError> {
    conn.query_row(
        &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
        params![id],
        book_from_row,
    )
    .map_err(AppError::from)
}

fn get_book_by_catalog_id(conn: &rusqlite::Connection, catalog_id: &str) -> Result<Book, AppError> {
    conn.query_row(
        &format!("SELECT {BOOK_COLUMNS} FROM books WHERE catalog_id = ?1"),
        params![catalog_id],
        book_from_row,
    )
    .map_err(AppError::from)
}

pub fn book_exists(conn: &rusqlite::Connection, id: i64) -> Result<bool, AppError> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM books WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .map_err(AppError::from)
}
