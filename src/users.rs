use actix_web::{web, HttpResponse};
use sqlx::AnyConnection;

use crate::config::*;
use crate::core::db::AppState;
use crate::core::errors::{conflict_on_unique, ApiError, ApiResult};
use crate::core::helpers::{check_length, required_str, sanitize_text, validate_email};
use crate::models::models::{PublicUser, User};

const EMAIL_TAKEN: &str = "Email is already registered";

pub struct NewUser {
    pub username: String,
    pub firstname: String,
    pub email: String,
}

impl NewUser {
    /// Validates a registration payload. Absent and blank fields are treated alike.
    pub fn from_json(value: &serde_json::Value) -> ApiResult<Self> {
        let (Some(username), Some(firstname), Some(email)) = (
            required_str(value, "username"),
            required_str(value, "firstname"),
            required_str(value, "email"),
        ) else {
            return Err(ApiError::BadRequest("Missing required fields".to_string()));
        };

        let username = sanitize_text(username);
        let firstname = sanitize_text(firstname);
        if username.is_empty() || firstname.is_empty() {
            return Err(ApiError::BadRequest("Missing required fields".to_string()));
        }
        check_length("username", &username, MAX_USERNAME_LENGTH)?;
        check_length("firstname", &firstname, MAX_FIRSTNAME_LENGTH)?;
        check_length("email", email, MAX_EMAIL_LENGTH)?;
        if !validate_email(email) {
            return Err(ApiError::BadRequest("Invalid email".to_string()));
        }

        Ok(Self {
            username,
            firstname,
            email: email.to_string(),
        })
    }
}

pub async fn find_user(conn: &mut AnyConnection, user_id: i64) -> ApiResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, firstname, email FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(user)
}

pub async fn require_user(conn: &mut AnyConnection, user_id: i64) -> ApiResult<User> {
    find_user(conn, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

pub async fn email_taken(conn: &mut AnyConnection, email: &str) -> ApiResult<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

pub async fn register_user(conn: &mut AnyConnection, new_user: NewUser) -> ApiResult<User> {
    if email_taken(conn, &new_user.email).await? {
        return Err(ApiError::Conflict(EMAIL_TAKEN.to_string()));
    }

    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO users (username, firstname, email) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&new_user.username)
    .bind(&new_user.firstname)
    .bind(&new_user.email)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| conflict_on_unique(e, EMAIL_TAKEN))?;

    Ok(User {
        id,
        username: new_user.username,
        firstname: new_user.firstname,
        email: new_user.email,
    })
}

pub async fn list_users(conn: &mut AnyConnection) -> ApiResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, username, firstname, email FROM users ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(users)
}

/// Deletes a user. Follow edges, posts and comments go with it through the schema's cascades.
pub async fn delete_user(conn: &mut AnyConnection, user_id: i64) -> ApiResult<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    Ok(())
}

// === HTTP Handlers ===

pub async fn hello() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "msg": "Hello, this is your GET /user response "
    }))
}

pub async fn handle_register(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> ApiResult<HttpResponse> {
    let new_user = NewUser::from_json(&body)?;

    let mut tx = state.begin_write().await?;
    let user = register_user(&mut tx, new_user).await?;
    tx.commit().await?;

    tracing::info!(user_id = user.id, "user registered");
    Ok(HttpResponse::Created().json(serde_json::json!({
        "msg": "User registered successfully",
        "user": PublicUser::from(&user),
    })))
}

pub async fn get_user_details(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let mut conn = state.pool.acquire().await?;
    let user = require_user(&mut conn, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"user": PublicUser::from(&user)})))
}

pub async fn get_users_list(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let mut conn = state.pool.acquire().await?;
    let users: Vec<PublicUser> = list_users(&mut conn).await?.iter().map(PublicUser::from).collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({"users": users})))
}

pub async fn handle_delete_user(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let user_id = path.into_inner();

    let mut tx = state.begin_write().await?;
    delete_user(&mut tx, user_id).await?;
    tx.commit().await?;

    tracing::info!(user_id, "user deleted");
    Ok(HttpResponse::Ok().json(serde_json::json!({"msg": "User deleted"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registration_requires_every_field() {
        let body = json!({"username": "alice", "firstname": "", "email": "a@x.com"});
        assert!(matches!(NewUser::from_json(&body), Err(ApiError::BadRequest(_))));

        let body = json!({"username": "alice", "email": "a@x.com"});
        assert!(matches!(NewUser::from_json(&body), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn registration_rejects_bad_email_and_long_names() {
        let body = json!({"username": "alice", "firstname": "Alice", "email": "nope"});
        assert!(matches!(NewUser::from_json(&body), Err(ApiError::BadRequest(_))));

        let body = json!({"username": "a".repeat(51), "firstname": "Alice", "email": "a@x.com"});
        assert!(matches!(NewUser::from_json(&body), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn registration_sanitizes_names() {
        let body = json!({"username": "<i>alice</i>", "firstname": " Alice ", "email": "a@x.com"});
        let user = NewUser::from_json(&body).unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.firstname, "Alice");
        assert_eq!(user.email, "a@x.com");
    }

    #[test]
    fn registration_measures_decoded_text() {
        let body = json!({"username": "&".repeat(20), "firstname": "R&D", "email": "a@x.com"});
        let user = NewUser::from_json(&body).unwrap();
        assert_eq!(user.username, "&".repeat(20));
        assert_eq!(user.firstname, "R&D");
    }
}
