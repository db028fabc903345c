use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public view of a user. The password hash never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// A photo as it appears in the feed.
///
/// `image_url` is always loadable by a client: either an absolute URL given
/// at creation, or `/uploads/<filename>` for images stored by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub image_url: String,
    pub filename: Option<String>,
    pub description: String,
    pub taken_at: Option<DateTime<Utc>>,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}
