use actix_web::{web, HttpResponse};
use sqlx::AnyConnection;

use crate::config::MAX_MEDIA_URL_LENGTH;
use crate::core::db::AppState;
use crate::core::errors::{conflict_on_unique, ApiError, ApiResult};
use crate::core::helpers::{check_length, now_iso, required_id, required_str, sanitize_text};
use crate::models::models::{Comment, Media, MediaRow, MediaType, Post};
use crate::users::require_user;

const MEDIA_EXISTS: &str = "Post already has media attached";

pub async fn find_post(conn: &mut AnyConnection, post_id: i64) -> ApiResult<Option<Post>> {
    let post = sqlx::query_as::<_, Post>("SELECT id, user_id, created_at FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(post)
}

pub async fn require_post(conn: &mut AnyConnection, post_id: i64) -> ApiResult<Post> {
    find_post(conn, post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))
}

pub async fn create_post(conn: &mut AnyConnection, user_id: i64) -> ApiResult<Post> {
    require_user(conn, user_id).await?;

    let created_at = now_iso();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO posts (user_id, created_at) VALUES ($1, $2) RETURNING id",
    )
    .bind(user_id)
    .bind(&created_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Post { id, user_id, created_at })
}

pub async fn list_user_posts(conn: &mut AnyConnection, user_id: i64) -> ApiResult<Vec<Post>> {
    require_user(conn, user_id).await?;

    let posts = sqlx::query_as::<_, Post>(
        "SELECT id, user_id, created_at FROM posts WHERE user_id = $1 ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(posts)
}

pub async fn get_media(conn: &mut AnyConnection, post_id: i64) -> ApiResult<Option<Media>> {
    let row = sqlx::query_as::<_, MediaRow>("SELECT id, type, url, post_id FROM media WHERE post_id = $1")
        .bind(post_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(Media::try_from)
        .transpose()
        .map_err(ApiError::InternalError)
}

/// Attaches the post's single media item.
pub async fn attach_media(
    conn: &mut AnyConnection,
    post_id: i64,
    media_type: MediaType,
    url: &str,
) -> ApiResult<Media> {
    require_post(conn, post_id).await?;
    if get_media(conn, post_id).await?.is_some() {
        return Err(ApiError::Conflict(MEDIA_EXISTS.to_string()));
    }

    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO media (type, url, post_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(media_type.as_str())
    .bind(url)
    .bind(post_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| conflict_on_unique(e, MEDIA_EXISTS))?;

    Ok(Media {
        id,
        media_type,
        url: url.to_string(),
        post_id,
    })
}

pub async fn add_comment(
    conn: &mut AnyConnection,
    post_id: i64,
    user_id: i64,
    comment_text: &str,
) -> ApiResult<Comment> {
    require_post(conn, post_id).await?;
    require_user(conn, user_id).await?;

    let created_at = now_iso();
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO comments (comment_text, user_id, post_id, created_at)
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(comment_text)
    .bind(user_id)
    .bind(post_id)
    .bind(&created_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Comment {
        id,
        comment_text: comment_text.to_string(),
        user_id,
        post_id,
        created_at,
    })
}

pub async fn list_comments(conn: &mut AnyConnection, post_id: i64) -> ApiResult<Vec<Comment>> {
    require_post(conn, post_id).await?;
    fetch_comments(conn, post_id).await
}

/// Comments on a post the caller already knows exists.
async fn fetch_comments(conn: &mut AnyConnection, post_id: i64) -> ApiResult<Vec<Comment>> {
    let comments = sqlx::query_as::<_, Comment>(
        "SELECT id, comment_text, user_id, post_id, created_at
         FROM comments WHERE post_id = $1 ORDER BY id",
    )
    .bind(post_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(comments)
}

fn parse_media_type(value: &serde_json::Value) -> ApiResult<MediaType> {
    match &value["type"] {
        serde_json::Value::Null => Ok(MediaType::default()),
        serde_json::Value::String(s) => s.parse().map_err(ApiError::BadRequest),
        _ => Err(ApiError::BadRequest("Media type must be a string".to_string())),
    }
}

// === HTTP Handlers ===

pub async fn handle_create_post(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> ApiResult<HttpResponse> {
    let user_id = required_id(&body, "user_id")
        .ok_or_else(|| ApiError::BadRequest("Missing required fields".to_string()))?;

    let mut tx = state.begin_write().await?;
    let post = create_post(&mut tx, user_id).await?;
    tx.commit().await?;

    tracing::info!(post_id = post.id, user_id, "post created");
    Ok(HttpResponse::Created().json(serde_json::json!({
        "msg": "Post created",
        "post": post,
    })))
}

pub async fn get_post_details(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let post_id = path.into_inner();
    let mut conn = state.pool.acquire().await?;

    let post = require_post(&mut conn, post_id).await?;
    let media = get_media(&mut conn, post_id).await?;
    let comments = fetch_comments(&mut conn, post.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "post": post,
        "media": media,
        "comments": comments,
    })))
}

pub async fn get_user_posts(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let user_id = path.into_inner();
    let mut conn = state.pool.acquire().await?;
    let posts = list_user_posts(&mut conn, user_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "user_id": user_id,
        "posts": posts,
    })))
}

pub async fn handle_attach_media(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<serde_json::Value>,
) -> ApiResult<HttpResponse> {
    let post_id = path.into_inner();
    let url = required_str(&body, "url")
        .ok_or_else(|| ApiError::BadRequest("Missing required fields".to_string()))?;
    check_length("url", url, MAX_MEDIA_URL_LENGTH)?;
    let media_type = parse_media_type(&body)?;

    let mut tx = state.begin_write().await?;
    let media = attach_media(&mut tx, post_id, media_type, url).await?;
    tx.commit().await?;

    tracing::info!(post_id, media_id = media.id, %media_type, "media attached");
    Ok(HttpResponse::Created().json(serde_json::json!({
        "msg": "Media attached",
        "media": media,
    })))
}

pub async fn handle_add_comment(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<serde_json::Value>,
) -> ApiResult<HttpResponse> {
    let post_id = path.into_inner();
    let user_id = required_id(&body, "user_id");
    let text = required_str(&body, "comment_text").map(sanitize_text);
    let (Some(user_id), Some(text)) = (user_id, text.filter(|t| !t.is_empty())) else {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    };

    let mut tx = state.begin_write().await?;
    let comment = add_comment(&mut tx, post_id, user_id, &text).await?;
    tx.commit().await?;

    tracing::info!(post_id, comment_id = comment.id, user_id, "comment added");
    Ok(HttpResponse::Created().json(serde_json::json!({
        "msg": "Comment added",
        "comment": comment,
    })))
}

pub async fn get_post_comments(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let post_id = path.into_inner();
    let mut conn = state.pool.acquire().await?;
    let comments = list_comments(&mut conn, post_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "post_id": post_id,
        "comments": comments,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn media_type_defaults_to_image() {
        assert_eq!(parse_media_type(&json!({"url": "http://x"})).unwrap(), MediaType::Image);
        assert_eq!(parse_media_type(&json!({"type": "audio"})).unwrap(), MediaType::Audio);
    }

    #[test]
    fn media_type_outside_enumeration_is_rejected() {
        assert!(matches!(parse_media_type(&json!({"type": "gif"})), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_media_type(&json!({"type": 3})), Err(ApiError::BadRequest(_))));
    }
}
