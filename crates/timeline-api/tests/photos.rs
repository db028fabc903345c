use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;

use timeline_api::auth::create_token;
use timeline_api::uploads::{MAX_FILE_SIZE, UploadStore};
use timeline_api::{AppState, AppStateInner, router};
use timeline_db::Database;

const SECRET: &str = "test-secret";
const BOUNDARY: &str = "timeline-test-boundary";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

struct TestApp {
    app: Router,
    state: AppState,
    _dir: tempfile::TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadStore::new(dir.path().join("uploads")).await.unwrap();
        let db = Database::open_in_memory().unwrap();
        let state = AppStateInner::new(db, SECRET.to_string(), uploads);
        Self {
            app: router(state.clone()),
            state,
            _dir: dir,
        }
    }

    /// Create a user directly in the store and mint a token for it.
    fn user(&self, username: &str) -> (i64, String) {
        let user = self.state.db.create_user(username, "unused-hash").unwrap();
        let token = create_token(SECRET, user.id, username).unwrap();
        (user.id, token)
    }

    async fn send(&self, req: Request<Body>) -> Response {
        self.app.clone().oneshot(req).await.unwrap()
    }

    fn upload_count(&self) -> usize {
        std::fs::read_dir(self.state.uploads.dir()).unwrap().count()
    }
}

fn multipart(file: Option<(&str, &[u8])>, description: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(description) = description {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\n{description}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::post("/photos").header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn json_request(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn create_photo(app: &TestApp, token: &str, description: &str) -> Value {
    let response = app
        .send(upload_request(Some(token), multipart(Some(("image/png", PNG)), Some(description))))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn uploaded_photo_appears_in_feed() {
    let app = TestApp::new().await;
    let (alice_id, token) = app.user("alice");

    let photo = create_photo(&app, &token, "First day of school").await;
    assert_eq!(photo["likes"], 0);
    assert_eq!(photo["userId"], alice_id);
    assert_eq!(photo["username"], "alice");
    assert_eq!(photo["description"], "First day of school");

    let response = app.send(request("GET", "/photos", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let feed = body_json(response).await;
    let feed = feed.as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["id"], photo["id"]);
    assert_eq!(feed[0]["likes"], 0);
    assert_eq!(feed[0]["userId"], alice_id);

    // The stored file is served back verbatim.
    let image_url = photo["imageUrl"].as_str().unwrap();
    assert!(image_url.starts_with("/uploads/") && image_url.ends_with(".png"));
    let response = app.send(request("GET", image_url, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, PNG);
}

#[tokio::test]
async fn json_photo_with_taken_at() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");

    let response = app
        .send(json_request(
            "/photos",
            Some(&token),
            json!({
                "imageUrl": "https://example.com/graduation.jpg",
                "description": "Graduation ceremony",
                "takenAt": "2024-01-15"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let photo = body_json(response).await;
    assert_eq!(photo["imageUrl"], "https://example.com/graduation.jpg");
    assert_eq!(photo["filename"], Value::Null);
    assert!(photo["takenAt"].as_str().unwrap().starts_with("2024-01-15T00:00:00"));
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn sequential_and_concurrent_likes_add_exactly_n() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice");
    let (_, bob) = app.user("bob");
    let photo = create_photo(&app, &alice, "Science fair").await;
    let like_uri = format!("/photos/{}/like", photo["id"]);

    for expected in 1..=3 {
        let response = app.send(request("POST", &like_uri, Some(&bob))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["likes"], expected);
    }

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let app = app.app.clone();
            let req = request("POST", &like_uri, Some(&alice));
            tokio::spawn(async move { app.oneshot(req).await.unwrap().status() })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    let response = app.send(request("GET", "/photos", Some(&alice))).await;
    assert_eq!(body_json(response).await[0]["likes"], 23);
}

#[tokio::test]
async fn liking_missing_photo_is_not_found() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");

    let response = app.send(request("POST", "/photos/999/like", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_owner_cannot_delete() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice");
    let (_, bob) = app.user("bob");
    let photo = create_photo(&app, &alice, "Mine").await;

    let uri = format!("/photos/{}", photo["id"]);
    let response = app.send(request("DELETE", &uri, Some(&bob))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("permission"));

    let response = app.send(request("GET", "/photos", Some(&bob))).await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
    assert_eq!(app.upload_count(), 1);
}

#[tokio::test]
async fn owner_delete_removes_photo_and_file() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice");
    let keep = create_photo(&app, &alice, "Keep").await;
    let gone = create_photo(&app, &alice, "Gone").await;
    assert_eq!(app.upload_count(), 2);

    let uri = format!("/photos/{}", gone["id"]);
    let response = app.send(request("DELETE", &uri, Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.send(request("GET", "/photos", Some(&alice))).await;
    let feed = body_json(response).await;
    let ids: Vec<_> = feed.as_array().unwrap().iter().map(|p| p["id"].clone()).collect();
    assert_eq!(ids, vec![keep["id"].clone()]);
    assert_eq!(app.upload_count(), 1);

    let response = app.send(request("DELETE", &uri, Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_image_upload_is_rejected_before_persistence() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");

    let response = app
        .send(upload_request(
            Some(&token),
            multipart(Some(("text/plain", b"just some text".as_slice())), Some("Notes")),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Declared as PNG but the bytes say otherwise.
    let response = app
        .send(upload_request(
            Some(&token),
            multipart(Some(("image/png", b"not really a png".as_slice())), Some("Fake")),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(app.state.db.list_photos().unwrap().is_empty());
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn oversized_upload_is_rejected_before_persistence() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");

    let mut big = PNG.to_vec();
    big.resize(MAX_FILE_SIZE + 1, 0);
    let response = app
        .send(upload_request(
            Some(&token),
            multipart(Some(("image/png", big.as_slice())), Some("Too big")),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(app.state.db.list_photos().unwrap().is_empty());
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn upload_requires_file_and_description() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");

    let response = app
        .send(upload_request(Some(&token), multipart(None, Some("No file"))))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "No photo uploaded");

    let response = app
        .send(upload_request(Some(&token), multipart(Some(("image/png", PNG)), None)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(
            Request::post("/photos")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(app.state.db.list_photos().unwrap().is_empty());
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let (_, alice) = app.user("alice");
    let photo = create_photo(&app, &alice, "Existing").await;
    let id = photo["id"].clone();

    let requests = vec![
        request("GET", "/photos", None),
        request("GET", "/user", None),
        upload_request(None, multipart(Some(("image/png", PNG)), Some("Sneaky"))),
        request("DELETE", &format!("/photos/{id}"), None),
        request("POST", &format!("/photos/{id}/like"), None),
        request("GET", "/photos", Some("not-a-token")),
        request(
            "POST",
            &format!("/photos/{id}/like"),
            Some(&create_token("wrong-secret", 1, "alice").unwrap()),
        ),
    ];

    for req in requests {
        let response = app.send(req).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_bytes(response).await.is_empty());
    }

    let photos = app.state.db.list_photos().unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].likes, 0);
    assert_eq!(app.upload_count(), 1);
}

#[tokio::test]
async fn register_login_and_current_user() {
    let app = TestApp::new().await;
    let credentials = json!({ "username": "carol", "password": "correct horse" });

    let response = app
        .send(json_request("/auth/register", None, credentials.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let registered = body_json(response).await;
    assert_eq!(registered["username"], "carol");

    let response = app
        .send(json_request("/auth/register", None, credentials.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .send(json_request(
            "/auth/login",
            None,
            json!({ "username": "carol", "password": "wrong password" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.send(json_request("/auth/login", None, credentials)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let login = body_json(response).await;
    assert_eq!(login["userId"], registered["userId"]);

    let token = login["token"].as_str().unwrap();
    let response = app.send(request("GET", "/user", Some(token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let user = body_json(response).await;
    assert_eq!(user["id"], registered["userId"]);
    assert_eq!(user["username"], "carol");
}

#[tokio::test]
async fn register_validates_input() {
    let app = TestApp::new().await;

    let response = app
        .send(json_request(
            "/auth/register",
            None,
            json!({ "username": "ab", "password": "long enough" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(json_request(
            "/auth/register",
            None,
            json!({ "username": "dave", "password": "short" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.state.db.get_user_by_username("dave").unwrap().is_none());
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let response = app.send(request("GET", "/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");
}

#[tokio::test]
async fn upload_by_vanished_user_is_unauthenticated_and_leaves_no_file() {
    let app = TestApp::new().await;
    let ghost = create_token(SECRET, 999, "ghost").unwrap();

    let response = app
        .send(upload_request(
            Some(&ghost),
            multipart(Some(("image/png", PNG)), Some("Nobody's photo")),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_bytes(response).await.is_empty());

    assert!(app.state.db.list_photos().unwrap().is_empty());
    assert_eq!(app.upload_count(), 0);
}

#[tokio::test]
async fn malformed_photo_id_is_a_json_validation_error() {
    let app = TestApp::new().await;
    let (_, token) = app.user("alice");

    for (method, uri) in [("DELETE", "/photos/abc"), ("POST", "/photos/abc/like")] {
        let response = app.send(request(method, uri, Some(&token))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = body_json(response).await;
        assert!(!body["message"].as_str().unwrap().is_empty());
    }
}
