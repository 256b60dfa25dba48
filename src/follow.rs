use actix_web::{web, HttpResponse};
use sqlx::AnyConnection;

use crate::core::db::AppState;
use crate::core::errors::{conflict_on_unique, ApiError, ApiResult};
use crate::core::helpers::required_id;
use crate::models::models::{PublicUser, User};
use crate::users::{find_user, require_user};

const ALREADY_FOLLOWING: &str = "Already following this user";

pub async fn is_following(conn: &mut AnyConnection, follower_id: i64, followee_id: i64) -> ApiResult<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT user_from_id FROM follower WHERE user_from_id = $1 AND user_to_id = $2",
    )
    .bind(follower_id)
    .bind(followee_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.is_some())
}

/// Adds the edge `follower -> followee` and returns everyone the follower now follows.
pub async fn follow_user(
    conn: &mut AnyConnection,
    follower_id: i64,
    followee_id: i64,
) -> ApiResult<(User, User, Vec<User>)> {
    if follower_id == followee_id {
        return Err(ApiError::BadRequest("A user cannot follow themselves".to_string()));
    }

    let follower = find_user(conn, follower_id).await?;
    let followee = find_user(conn, followee_id).await?;
    let (Some(follower), Some(followee)) = (follower, followee) else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };

    if is_following(conn, follower_id, followee_id).await? {
        return Err(ApiError::Conflict(ALREADY_FOLLOWING.to_string()));
    }

    sqlx::query("INSERT INTO follower (user_from_id, user_to_id) VALUES ($1, $2)")
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| conflict_on_unique(e, ALREADY_FOLLOWING))?;

    let following = get_followings(conn, follower_id).await?;
    Ok((follower, followee, following))
}

/// Users `user_id` follows, by id.
pub async fn get_followings(conn: &mut AnyConnection, user_id: i64) -> ApiResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        "SELECT u.id, u.username, u.firstname, u.email
         FROM follower f JOIN users u ON u.id = f.user_to_id
         WHERE f.user_from_id = $1
         ORDER BY u.id",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(users)
}

/// Users following `user_id`, by id.
pub async fn get_followers(conn: &mut AnyConnection, user_id: i64) -> ApiResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        "SELECT u.id, u.username, u.firstname, u.email
         FROM follower f JOIN users u ON u.id = f.user_from_id
         WHERE f.user_to_id = $1
         ORDER BY u.id",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(users)
}

fn public(users: &[User]) -> Vec<PublicUser> {
    users.iter().map(PublicUser::from).collect()
}

// === HTTP Handlers ===

pub async fn handle_follow(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> ApiResult<HttpResponse> {
    let (Some(from_id), Some(to_id)) = (
        required_id(&body, "user_from_id"),
        required_id(&body, "user_to_id"),
    ) else {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    };

    let mut tx = state.begin_write().await?;
    let (follower, followee, following) = follow_user(&mut tx, from_id, to_id).await?;
    tx.commit().await?;

    tracing::info!(follower = follower.id, followee = followee.id, "follow edge created");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "msg": format!("{} now follows {}", follower.username, followee.username),
        "following": public(&following),
    })))
}

pub async fn get_followings_list(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let user_id = path.into_inner();
    let mut conn = state.pool.acquire().await?;
    require_user(&mut conn, user_id).await?;

    let following = get_followings(&mut conn, user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "user_id": user_id,
        "following": public(&following),
    })))
}

pub async fn get_followers_list(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let user_id = path.into_inner();
    let mut conn = state.pool.acquire().await?;
    require_user(&mut conn, user_id).await?;

    let followers = get_followers(&mut conn, user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "user_id": user_id,
        "followers": public(&followers),
    })))
}
