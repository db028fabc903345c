//! Plain-text rendering of the photo feed.

use std::fmt::Write;

use timeline_types::models::Photo;

/// `MMMM d, yyyy`, e.g. "February 1, 2024". Uses the capture date when the
/// uploader gave one, otherwise the upload date.
pub fn format_date(photo: &Photo) -> String {
    photo
        .taken_at
        .unwrap_or(photo.created_at)
        .format("%B %-d, %Y")
        .to_string()
}

/// Server-relative image URLs (`/uploads/...`) are joined onto the base URL.
pub fn resolve_image_url(base_url: &str, image_url: &str) -> String {
    if image_url.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), image_url)
    } else {
        image_url.to_string()
    }
}

/// One card. The delete control is only offered to the photo's owner.
pub fn render_card(photo: &Photo, base_url: &str, viewer: Option<i64>) -> String {
    let mut card = String::new();
    let _ = writeln!(card, "[#{}] {}", photo.id, photo.description);
    let _ = writeln!(card, "    {} by {}", format_date(photo), photo.username);
    let _ = writeln!(card, "    {}", resolve_image_url(base_url, &photo.image_url));

    let noun = if photo.likes == 1 { "like" } else { "likes" };
    let mut controls = format!("    {} {}  [like]", photo.likes, noun);
    if viewer.is_some_and(|id| photo.is_owned_by(id)) {
        controls.push_str("  [delete]");
    }
    let _ = writeln!(card, "{}", controls);
    card
}

pub fn render_feed(photos: &[Photo], base_url: &str, viewer: Option<i64>) -> String {
    if photos.is_empty() {
        return "No photos yet.\n".to_string();
    }
    photos
        .iter()
        .map(|photo| render_card(photo, base_url, viewer))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn photo(id: i64, user_id: i64, likes: i64) -> Photo {
        Photo {
            id,
            user_id,
            username: "usuario1".to_string(),
            image_url: "/uploads/exemplo1.jpg".to_string(),
            filename: Some("exemplo1.jpg".to_string()),
            description: "First day of school celebration".to_string(),
            taken_at: Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
            likes,
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn date_prefers_taken_at() {
        let mut p = photo(1, 1, 0);
        assert_eq!(format_date(&p), "February 1, 2024");
        p.taken_at = None;
        assert_eq!(format_date(&p), "March 5, 2024");
    }

    #[test]
    fn relative_urls_resolve_against_server() {
        assert_eq!(
            resolve_image_url("http://localhost:5000/", "/uploads/a.png"),
            "http://localhost:5000/uploads/a.png"
        );
        assert_eq!(
            resolve_image_url("http://localhost:5000", "https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn delete_control_only_for_owner() {
        let p = photo(3, 1, 12);

        let owner_view = render_card(&p, "http://localhost:5000", Some(1));
        assert!(owner_view.contains("[delete]"));
        assert!(owner_view.contains("12 likes"));
        assert!(owner_view.contains("http://localhost:5000/uploads/exemplo1.jpg"));

        let other_view = render_card(&p, "http://localhost:5000", Some(2));
        assert!(!other_view.contains("[delete]"));
        assert!(other_view.contains("[like]"));

        assert!(!render_card(&p, "http://localhost:5000", None).contains("[delete]"));
    }

    #[test]
    fn feed_rendering() {
        assert_eq!(render_feed(&[], "http://x", Some(1)), "No photos yet.\n");

        let feed = render_feed(&[photo(1, 1, 1), photo(2, 2, 0)], "http://x", Some(1));
        assert!(feed.contains("[#1]"));
        assert!(feed.contains("1 like  [like]"));
        assert!(feed.contains("[#2]"));
        assert_eq!(feed.matches("[delete]").count(), 1);
    }
}
