//! Placeholder images
//!
//! Generates a flat grey SVG with centered text, used for cars without
//! photos. Two URL forms:
//!
//! ```text
//! GET /placeholder/640/480/Toyota+Camry
//! GET /placeholder?width=640&height=480&text=Toyota%20Camry
//! ```
//!
//! Missing or invalid dimensions fall back to 400x300 and are clamped to
//! `1..=4000`; the default text is "Image".

use axum::{
    extract::{Path, Query},
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;

pub const DEFAULT_WIDTH: u32 = 400;
pub const DEFAULT_HEIGHT: u32 = 300;
pub const MAX_DIMENSION: u32 = 4000;
pub const DEFAULT_TEXT: &str = "Image";

#[derive(Debug, Default, Deserialize)]
pub struct PlaceholderParams {
    pub width: Option<String>,
    pub height: Option<String>,
    pub text: Option<String>,
}

/// Parses the leading digits of `raw`, so "300px" reads as 300
fn parse_dimension(raw: Option<&str>, default: u32) -> u32 {
    let digits: String = raw
        .unwrap_or_default()
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();

    if digits.is_empty() {
        return default;
    }

    match digits.parse::<u64>() {
        Ok(0) => default,
        Ok(n) => n.min(MAX_DIMENSION as u64) as u32,
        Err(_) => MAX_DIMENSION,
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Renders the placeholder SVG
pub fn render_placeholder(width: u32, height: u32, text: &str) -> String {
    let width = width.clamp(1, MAX_DIMENSION);
    let height = height.clamp(1, MAX_DIMENSION);
    let text = if text.trim().is_empty() {
        DEFAULT_TEXT
    } else {
        text
    };

    format!(
        concat!(
            r#"<svg width="{w}" height="{h}" xmlns="http://www.w3.org/2000/svg">"#,
            r##"<rect width="100%" height="100%" fill="#f3f4f6"/>"##,
            r##"<text x="50%" y="50%" font-family="Arial, sans-serif" font-size="16" "##,
            r##"fill="#6b7280" text-anchor="middle" dominant-baseline="middle">{text}</text>"##,
            "</svg>"
        ),
        w = width,
        h = height,
        text = escape_xml(text),
    )
}

fn svg_response(svg: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "public, max-age=31536000"),
        ],
        svg,
    )
}

/// `GET /placeholder/*params` as `:width/:height/:text...`
///
/// Text segments are joined with spaces and `+` reads as a space.
pub async fn placeholder_path(Path(params): Path<String>) -> impl IntoResponse {
    let mut parts = params.split('/').filter(|p| !p.is_empty());

    let width = parse_dimension(parts.next(), DEFAULT_WIDTH);
    let height = parse_dimension(parts.next(), DEFAULT_HEIGHT);
    let text = parts.collect::<Vec<_>>().join(" ").replace('+', " ");

    svg_response(render_placeholder(width, height, &text))
}

/// `GET /placeholder?width&height&text`
pub async fn placeholder_query(Query(params): Query<PlaceholderParams>) -> impl IntoResponse {
    let width = parse_dimension(params.width.as_deref(), DEFAULT_WIDTH);
    let height = parse_dimension(params.height.as_deref(), DEFAULT_HEIGHT);
    let text = params.text.unwrap_or_default();

    svg_response(render_placeholder(width, height, &text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimension() {
        assert_eq!(parse_dimension(Some("640"), 400), 640);
        assert_eq!(parse_dimension(Some("300px"), 400), 300);
        assert_eq!(parse_dimension(Some("abc"), 400), 400);
        assert_eq!(parse_dimension(Some("0"), 300), 300);
        assert_eq!(parse_dimension(Some("99999999999999999999"), 300), MAX_DIMENSION);
        assert_eq!(parse_dimension(Some("10000"), 300), MAX_DIMENSION);
        assert_eq!(parse_dimension(None, 300), 300);
    }

    #[test]
    fn test_render_defaults() {
        let svg = render_placeholder(DEFAULT_WIDTH, DEFAULT_HEIGHT, "");

        assert!(svg.starts_with(r#"<svg width="400" height="300""#));
        assert!(svg.contains(">Image</text>"));
        assert!(svg.contains(r##"fill="#f3f4f6""##));
        assert!(svg.contains(r#"font-size="16""#));
    }

    #[test]
    fn test_render_escapes_text() {
        let svg = render_placeholder(100, 100, r#"<script>alert("x")</script> & co"#);

        assert!(!svg.contains("<script>"));
        assert!(svg.contains("&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; co"));
    }

    #[test]
    fn test_render_clamps_dimensions() {
        let svg = render_placeholder(0, 5000, "x");
        assert!(svg.contains(r#"width="1" height="4000""#));
    }
}
