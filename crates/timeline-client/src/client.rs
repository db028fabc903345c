use std::path::Path;

use reqwest::{Response, StatusCode, multipart};
use tracing::debug;

use timeline_types::api::{
    AuthResponse, CreatePhotoRequest, ErrorResponse, LoginRequest, RegisterRequest,
};
use timeline_types::models::{Photo, User};

use crate::error::{ClientError, Result};
use crate::render;

struct Session {
    token: String,
    user: User,
}

/// HTTP client for the School Timeline API.
///
/// Keeps the bearer token from the last login and a cached copy of the feed.
/// Every successful mutation drops the cached feed, so the next `feed()`
/// call goes back to the server.
pub struct TimelineClient {
    http: reqwest::Client,
    base_url: String,
    session: Option<Session>,
    feed: Option<Vec<Photo>>,
}

impl TimelineClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            session: None,
            feed: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn is_feed_cached(&self) -> bool {
        self.feed.is_some()
    }

    // -- Auth --

    pub async fn register(&mut self, username: &str, password: &str) -> Result<&User> {
        let body = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .http
            .post(self.url("/auth/register"))
            .json(&body)
            .send()
            .await?;
        let auth: AuthResponse = check(response).await?.json().await?;
        Ok(self.start_session(auth))
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<&User> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&body)
            .send()
            .await?;
        let auth: AuthResponse = check(response).await?.json().await?;
        Ok(self.start_session(auth))
    }

    /// Ask the server who the stored token belongs to.
    pub async fn fetch_current_user(&self) -> Result<User> {
        let response = self
            .http
            .get(self.url("/user"))
            .bearer_auth(self.token()?)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Forget the token. The server holds no session state to tear down.
    pub fn logout(&mut self) {
        self.session = None;
        self.feed = None;
    }

    // -- Feed --

    /// The feed, served from cache when available.
    pub async fn feed(&mut self) -> Result<&[Photo]> {
        if self.feed.is_none() {
            let photos = self.fetch_feed().await?;
            self.feed = Some(photos);
        }
        Ok(self.feed.as_deref().unwrap_or_default())
    }

    /// Re-fetch the feed regardless of the cache.
    pub async fn refresh(&mut self) -> Result<&[Photo]> {
        self.feed = None;
        self.feed().await
    }

    /// Render the feed as text cards for the logged-in user.
    pub async fn render_feed(&mut self) -> Result<String> {
        let viewer = self.current_user().map(|u| u.id);
        let base_url = self.base_url.clone();
        let photos = self.feed().await?;
        Ok(render::render_feed(photos, &base_url, viewer))
    }

    // -- Mutations --

    /// Upload image bytes as `multipart/form-data`.
    pub async fn upload_photo(
        &mut self,
        bytes: Vec<u8>,
        file_name: &str,
        mime: &str,
        description: &str,
        taken_at: Option<&str>,
    ) -> Result<Photo> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let mut form = multipart::Form::new()
            .text("description", description.to_string())
            .part("photo", part);
        if let Some(taken_at) = taken_at {
            form = form.text("takenAt", taken_at.to_string());
        }

        let response = self
            .http
            .post(self.url("/photos"))
            .bearer_auth(self.token()?)
            .multipart(form)
            .send()
            .await?;
        let photo: Photo = check(response).await?.json().await?;
        self.invalidate();
        Ok(photo)
    }

    /// Read an image from disk and upload it, inferring the MIME type from
    /// the extension.
    pub async fn upload_file(
        &mut self,
        path: &Path,
        description: &str,
        taken_at: Option<&str>,
    ) -> Result<Photo> {
        let mime = guess_image_mime(path).ok_or_else(|| ClientError::Rejected {
            status: 400,
            message: format!("{} is not a JPEG, PNG, GIF or WebP file", path.display()),
        })?;
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("photo")
            .to_string();
        self.upload_photo(bytes, &file_name, mime, description, taken_at)
            .await
    }

    /// Create a photo that points at an already hosted image.
    pub async fn post_photo_url(
        &mut self,
        image_url: &str,
        description: &str,
        taken_at: Option<&str>,
    ) -> Result<Photo> {
        let body = CreatePhotoRequest {
            image_url: image_url.to_string(),
            description: description.to_string(),
            taken_at: taken_at.map(str::to_string),
        };
        let response = self
            .http
            .post(self.url("/photos"))
            .bearer_auth(self.token()?)
            .json(&body)
            .send()
            .await?;
        let photo: Photo = check(response).await?.json().await?;
        self.invalidate();
        Ok(photo)
    }

    pub async fn like(&mut self, photo_id: i64) -> Result<Photo> {
        let response = self
            .http
            .post(self.url(&format!("/photos/{}/like", photo_id)))
            .bearer_auth(self.token()?)
            .send()
            .await?;
        let photo: Photo = check(response).await?.json().await?;
        self.invalidate();
        Ok(photo)
    }

    pub async fn delete(&mut self, photo_id: i64) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/photos/{}", photo_id)))
            .bearer_auth(self.token()?)
            .send()
            .await?;
        check(response).await?;
        self.invalidate();
        Ok(())
    }

    // -- Helpers --

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn token(&self) -> Result<&str> {
        self.session
            .as_ref()
            .map(|s| s.token.as_str())
            .ok_or(ClientError::NotLoggedIn)
    }

    fn start_session(&mut self, auth: AuthResponse) -> &User {
        debug!("Logged in as {} ({})", auth.username, auth.user_id);
        self.feed = None;
        let session = self.session.insert(Session {
            token: auth.token,
            user: User {
                id: auth.user_id,
                username: auth.username,
            },
        });
        &session.user
    }

    fn invalidate(&mut self) {
        self.feed = None;
    }

    async fn fetch_feed(&self) -> Result<Vec<Photo>> {
        let response = self
            .http
            .get(self.url("/photos"))
            .bearer_auth(self.token()?)
            .send()
            .await?;
        let photos: Vec<Photo> = check(response).await?.json().await?;
        debug!("Fetched {} photos", photos.len());
        Ok(photos)
    }
}

/// Map a non-success response to a `ClientError`.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }

    let fallback = status.canonical_reason().unwrap_or("request failed").to_string();
    let message = response
        .json::<ErrorResponse>()
        .await
        .map(|e| e.message)
        .unwrap_or(fallback);

    Err(ClientError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// MIME type for the image extensions the server accepts.
pub fn guess_image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_from_extension() {
        assert_eq!(guess_image_mime(Path::new("a/b/photo.JPG")), Some("image/jpeg"));
        assert_eq!(guess_image_mime(Path::new("cat.webp")), Some("image/webp"));
        assert_eq!(guess_image_mime(Path::new("notes.txt")), None);
        assert_eq!(guess_image_mime(Path::new("no_extension")), None);
    }

    #[test]
    fn base_url_is_normalized() {
        let client = TimelineClient::new("http://localhost:5000/");
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.url("/photos"), "http://localhost:5000/photos");
        assert!(client.current_user().is_none());
        assert!(matches!(client.token(), Err(ClientError::NotLoggedIn)));
    }
}
