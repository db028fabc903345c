use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("not logged in")]
    NotLoggedIn,

    /// The server rejected the credentials or the session token.
    #[error("unauthorized")]
    Unauthorized,

    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
