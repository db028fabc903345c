//! Database row types — these map directly to SQLite rows.
//! Distinct from timeline-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

/// A photo joined with its uploader's username.
#[derive(Debug, Clone)]
pub struct PhotoRow {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub image_url: String,
    pub filename: Option<String>,
    pub description: String,
    pub taken_at: Option<String>,
    pub likes: i64,
    pub created_at: String,
}

/// Fields supplied by the uploader. Owner and like count are set by the store.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub image_url: String,
    pub filename: Option<String>,
    pub description: String,
    pub taken_at: Option<String>,
}
