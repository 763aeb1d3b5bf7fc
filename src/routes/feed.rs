use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::db::is_constraint_violation;
use crate::db::models::{Comment, Like, Post};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::books::book_exists;
use crate::state::AppState;

/// Feed page size. The cursor contract in the feed response assumes this is
/// constant: a short page terminates the pagination chain.
const PAGE_SIZE: usize = 10;

// --- Request shapes ---

#[derive(Deserialize)]
pub struct FeedParams {
    pub cursor: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub book_id: Option<i64>,
    pub content: Option<String>,
    pub rating: Option<i64>,
}

#[derive(Deserialize)]
pub struct LikeRequest {
    pub post_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub post_id: Option<i64>,
    pub content: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(feed).post(create_post))
        .route("/api/likes", post(like_post).delete(unlike_post))
        .route("/api/comments", post(create_comment))
        .route("/api/comments/{post_id}", get(list_comments))
}

// --- Handlers ---

/// Keyset-paginated feed, newest first. Each page is bounded by the previous
/// page's last id, so concurrent inserts at the head never shift the window.
async fn feed(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let posts = query_feed(&conn, params.cursor, PAGE_SIZE)?;
    let next_cursor = next_cursor(&posts, PAGE_SIZE);

    Ok(Json(json!({ "posts": posts, "nextCursor": next_cursor })).into_response())
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
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
    if let Some(rating) = req.rating {
        if !(1..=5).contains(&rating) {
            return Err(AppError::BadRequest(
                "rating must be between 1 and 5.".into(),
            ));
        }
    }

    let conn = state.db.get()?;
    if !book_exists(&conn, book_id)? {
        return Err(AppError::NotFound("Book not found.".into()));
    }

    conn.execute(
        "INSERT INTO posts (user_id, book_id, content, rating) VALUES (?1, ?2, ?3, ?4)",
        params![user.id, book_id, content, req.rating],
    )?;
    let post = get_post(&conn, conn.last_insert_rowid())?;

    Ok((StatusCode::CREATED, Json(json!({ "post": post }))).into_response())
}

async fn like_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<LikeRequest>,
) -> AppResult<Response> {
    let post_id = req
        .post_id
        .ok_or_else(|| AppError::BadRequest("post_id is required.".into()))?;

    let conn = state.db.get()?;
    if !post_exists(&conn, post_id)? {
        return Err(AppError::NotFound("Post not found.".into()));
    }

    // The (user_id, post_id) unique pair is the duplicate check: inserting an
    // existing like reports "already liked" instead of failing.
    let inserted = conn.execute(
        "INSERT INTO likes (user_id, post_id) VALUES (?1, ?2)",
        params![user.id, post_id],
    );
    match inserted {
        Ok(_) => {
            let like = conn.query_row(
                "SELECT id, user_id, post_id, created_at FROM likes WHERE id = ?1",
                params![conn.last_insert_rowid()],
                |row| {
                    Ok(Like {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        post_id: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )?;
            Ok((StatusCode::CREATED, Json(json!({ "like": like }))).into_response())
        }
        Err(e) if is_constraint_violation(&e) => {
            Ok(Json(json!({ "message": "Already liked." })).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn unlike_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<LikeRequest>,
) -> AppResult<Response> {
    let post_id = req
        .post_id
        .ok_or_else(|| AppError::BadRequest("post_id is required.".into()))?;

    let conn = state.db.get()?;
    let deleted = conn.execute(
        "DELETE FROM likes WHERE user_id = ?1 AND post_id = ?2",
        params![user.id, post_id],
    )?;
    if deleted == 0 {
        return Err(AppError::NotFound("Like not found.".into()));
    }

    Ok(Json(json!({ "message": "Unliked." })).into_response())
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<Response> {
    let content = req
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let (post_id, content) = match (req.post_id, content) {
        (Some(p), Some(c)) => (p, c),
        _ => {
            return Err(AppError::BadRequest(
                "post_id and content are required.".into(),
            ))
        }
    };

    let conn = state.db.get()?;
    if !post_exists(&conn, post_id)? {
        return Err(AppError::NotFound("Post not found.".into()));
    }

    conn.execute(
        "INSERT INTO comments (user_id, post_id, content) VALUES (?1, ?2, ?3)",
        params![user.id, post_id, content],
    )?;
    let comment = conn.query_row(
        "SELECT id, user_id, post_id, content, created_at FROM comments WHERE id = ?1",
        params![conn.last_insert_rowid()],
        comment_from_row,
    )?;

    Ok((StatusCode::CREATED, Json(json!({ "comment": comment }))).into_response())
}

async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, user_id, post_id, content, created_at FROM comments \
         WHERE post_id = ?1 ORDER BY created_at ASC, id ASC",
    )?;
    let comments: Vec<Comment> = stmt
        .query_map(params![post_id], comment_from_row)?
        .collect::<Result<_, _>>()?;

    Ok(Json(json!({ "comments": comments })).into_response())
}

// --- Query helpers ---

fn query_feed(
    conn: &rusqlite::Connection,
    cursor: Option<i64>,
    page_size: usize,
) -> Result<Vec<Post>, AppError> {
    let limit = page_size as i64;
    let posts = match cursor {
        Some(cursor) => {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, book_id, content, rating, created_at FROM posts \
                 WHERE id < ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![cursor, limit], post_from_row)?;
            rows.collect::<Result<_, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, book_id, content, rating, created_at FROM posts \
                 ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], post_from_row)?;
            rows.collect::<Result<_, _>>()?
        }
    };
    Ok(posts)
}

/// A full page means more rows may follow: resume below the last id.
/// A short (or empty) page is the end of the stream.
fn next_cursor(posts: &[Post], page_size: usize) -> Option<i64> {
    if posts.len() == page_size {
        posts.last().map(|p| p.id)
    } else {
        None
    }
}

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        book_id: row.get(2)?,
        content: row.get(3)?,
        rating: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        post_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn post_exists(conn: &rusqlite::Connection, id: i64) -> Result<bool, AppError> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .map_err(AppError::from)
}

pub fn get_post(conn: &rusqlite::Connection, id: i64) -> Result<Post, AppError> {
    conn.query_row(
        "SELECT id, user_id, book_id, content, rating, created_at FROM posts WHERE id = ?1",
        params![id],
        post_from_row,
    )
    .map_err(AppError::from)
}

// --- Tests ---

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: i64) -> Post {
        Post {
            id,
            user_id: 1,
            book_id: 1,
            content: "x".into(),
            rating: None,
            created_at: "2026-01-01 00:00:00".into(),
        }
    }

    #[test]
    fn next_cursor_on_full_page_is_last_id() {
        let posts: Vec<Post> = (0..10).map(|i| post(25 - i)).collect();
        assert_eq!(next_cursor(&posts, 10), Some(16));
    }

    #[test]
    fn next_cursor_on_short_page_is_none() {
        let posts: Vec<Post> = (0..5).map(|i| post(5 - i)).collect();
        assert_eq!(next_cursor(&posts, 10), None);
    }

    #[test]
    fn next_cursor_on_empty_page_is_none() {
        assert_eq!(next_cursor(&[], 10), None);
    }

    #[test]
    fn rating_bounds() {
        assert!(!(1..=5).contains(&0));
        assert!((1..=5).contains(&1));
        assert!((1..=5).contains(&5));
        assert!(!(1..=5).contains(&6));
    }
}
