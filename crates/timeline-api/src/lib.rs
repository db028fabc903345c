pub mod auth;
pub mod error;
pub mod middleware;
pub mod photos;
pub mod routes;
pub mod state;
pub mod uploads;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
