use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub firstname: String,
    pub email: String,
}

/// The only user fields that ever leave the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Image,
    Video,
    Audio,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            other => Err(format!("unknown media type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Media {
    pub id: i64,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    pub post_id: i64,
}

/// Raw `media` row; `type` is stored as text.
#[derive(Debug, sqlx::FromRow)]
pub struct MediaRow {
    pub id: i64,
    #[sqlx(rename = "type")]
    pub media_type: String,
    pub url: String,
    pub post_id: i64,
}

impl TryFrom<MediaRow> for Media {
    type Error = String;

    fn try_from(row: MediaRow) -> Result<Self, Self::Error> {
        Ok(Media {
            id: row.id,
            media_type: row.media_type.parse()?,
            url: row.url,
            post_id: row.post_id,
        })
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub comment_text: String,
    pub user_id: i64,
    pub post_id: i64,
    pub created_at: String,
}
