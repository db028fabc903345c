use std::sync::Arc;

use tracing::error;

use timeline_db::Database;

use crate::error::ApiError;
use crate::uploads::UploadStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub uploads: UploadStore,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: String, uploads: UploadStore) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret,
            uploads,
        })
    }
}

/// Run a blocking DB call off the async runtime.
pub async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> timeline_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
        .map_err(ApiError::from)
}
