pub mod client;
pub mod error;
pub mod render;

pub use client::TimelineClient;
pub use error::ClientError;
