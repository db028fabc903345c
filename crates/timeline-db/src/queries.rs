use crate::models::{NewPhoto, PhotoRow, UserRow};
use crate::{Database, DbError, Result};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row};

const PHOTO_COLUMNS: &str = "p.id, p.user_id, u.username, p.image_url, p.filename, p.description, p.taken_at, p.likes, p.created_at";

impl Database {
    // -- Users --

    /// Insert a user and return it with its assigned id.
    /// The UNIQUE constraint on `username` is the source of truth for duplicates.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password) VALUES (?1, ?2)",
                (username, password_hash),
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    DbError::UsernameTaken
                }
                e => DbError::Sqlite(e),
            })?;

            let id = conn.last_insert_rowid();
            query_user_by_id(conn, id)?.ok_or(DbError::NotFound)
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    // -- Photos --

    /// All photos in insertion order, each joined with its uploader's username.
    pub fn list_photos(&self) -> Result<Vec<PhotoRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PHOTO_COLUMNS}
                 FROM photos p
                 LEFT JOIN users u ON p.user_id = u.id
                 ORDER BY p.id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], photo_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_photo(&self, id: i64) -> Result<Option<PhotoRow>> {
        self.with_conn(|conn| query_photo(conn, id))
    }

    pub fn create_photo(&self, owner_id: i64, photo: &NewPhoto) -> Result<PhotoRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO photos (user_id, image_url, filename, description, taken_at, likes)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                rusqlite::params![
                    owner_id,
                    photo.image_url,
                    photo.filename,
                    photo.description,
                    photo.taken_at,
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    DbError::UnknownOwner
                }
                e => DbError::Sqlite(e),
            })?;

            let id = conn.last_insert_rowid();
            query_photo(conn, id)?.ok_or(DbError::NotFound)
        })
    }

    /// Delete a photo on behalf of `requester_id`.
    ///
    /// A missing photo and a photo owned by someone else both yield
    /// `DbError::NotFound`. Returns the removed row so the caller can clean up
    /// any stored file.
    pub fn delete_photo(&self, id: i64, requester_id: i64) -> Result<PhotoRow> {
        self.with_conn(|conn| {
            let photo = query_photo(conn, id)?
                .filter(|p| p.user_id == requester_id)
                .ok_or(DbError::NotFound)?;

            conn.execute(
                "DELETE FROM photos WHERE id = ?1 AND user_id = ?2",
                (id, requester_id),
            )?;

            Ok(photo)
        })
    }

    /// Add one like and return the updated photo.
    pub fn like_photo(&self, id: i64) -> Result<PhotoRow> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE photos SET likes = likes + 1 WHERE id = ?1", [id])?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            query_photo(conn, id)?.ok_or(DbError::NotFound)
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<PhotoRow> {
    Ok(PhotoRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row
            .get::<_, Option<String>>(2)?
            .unwrap_or_else(|| "unknown".to_string()),
        image_url: row.get(3)?,
        filename: row.get(4)?,
        description: row.get(5)?,
        taken_at: row.get(6)?,
        likes: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            "SELECT id, username, password, created_at FROM users WHERE id = ?1",
            [id],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            "SELECT id, username, password, created_at FROM users WHERE username = ?1",
            [username],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

fn query_photo(conn: &Connection, id: i64) -> Result<Option<PhotoRow>> {
    let sql = format!(
        "SELECT {PHOTO_COLUMNS}
         FROM photos p
         LEFT JOIN users u ON p.user_id = u.id
         WHERE p.id = ?1"
    );
    let row = conn.query_row(&sql, [id], photo_from_row).optional()?;
    Ok(row)
}
