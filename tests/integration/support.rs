//! Shared fixtures

use chapter_cache::config::{parse_config, Config};
use chapter_cache::CacheEvent;
use futures::{Stream, StreamExt};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a validated config pointing the `mock` provider at `base_url`
pub fn test_config(
    cache_dir: &Path,
    database: &Path,
    base_url: &str,
    strategy: &str,
    search_endpoint: Option<&str>,
) -> Config {
    let endpoint = search_endpoint
        .map(|e| format!("endpoint = '{}'", e))
        .unwrap_or_default();
    parse_config(&format!(
        r#"
[pipeline]
cache-dir = '{cache}'
download-workers = 3
convert-workers = 2
poll-interval-ms = 10

[user-agent]
crawler-name = "ChapterTest"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "test@example.com"

[settings]
database-path = '{database}'

[session]
provider = "mock"
strategy = "{strategy}"
title = "Solo Leveling"
chapter = 2.0
chapter-rate = 1.0

[search]
engine = "duckduckgo"
{endpoint}

[[provider]]
id = "mock"
kind = "madara"
base-url = "{base_url}"
"#,
        cache = cache_dir.display(),
        database = database.display(),
    ))
    .expect("test config is valid")
}

fn encode(format: ImageFormat, color: [u8; 3]) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb(color)));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, format).expect("encode test image");
    bytes.into_inner()
}

pub fn jpeg_bytes() -> Vec<u8> {
    encode(ImageFormat::Jpeg, [200, 30, 30])
}

pub fn png_bytes() -> Vec<u8> {
    encode(ImageFormat::Png, [30, 200, 30])
}

pub fn bmp_bytes() -> Vec<u8> {
    encode(ImageFormat::Bmp, [30, 30, 200])
}

pub async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub async fn mount_head_ok(server: &MockServer, page_path: &str) {
    Mock::given(method("HEAD"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

/// Serves a chapter page at `page_path` with the given images plus a site
/// logo, and serves each image under `/uploads/`
pub async fn mount_chapter(server: &MockServer, page_path: &str, images: &[(&str, Vec<u8>)]) {
    let mut html = String::from(
        r#"<html><head><title>Chapter</title></head><body>
        <img src="/wp-content/themes/madara/logo.png">
        <div class="reading-content">"#,
    );
    for (name, bytes) in images {
        html.push_str(&format!(r#"<img src="/uploads/{}">"#, name));
        Mock::given(method("GET"))
            .and(path(format!("/uploads/{}", name)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.clone()))
            .mount(server)
            .await;
    }
    html.push_str("</div></body></html>");

    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Serves a chapter page with three JPEG pages that each take 400ms to
/// download
pub async fn mount_slow_chapter(server: &MockServer, page_path: &str) {
    let mut html = String::new();
    for n in 1..=3 {
        let image_path = format!("/slow/{}.jpg", n);
        html.push_str(&format!(r#"<img src="{}">"#, image_path));
        Mock::given(method("GET"))
            .and(path(image_path))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(jpeg_bytes())
                    .set_delay(Duration::from_millis(400)),
            )
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

pub async fn collect(stream: impl Stream<Item = CacheEvent>) -> Vec<CacheEvent> {
    stream.collect().await
}

/// Progress starts at 0, never decreases or exceeds 100, and exactly one
/// terminal event closes the sequence
pub fn assert_well_formed(events: &[CacheEvent]) {
    let values: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            CacheEvent::Progress(v) => Some(*v),
            CacheEvent::Finished(_) => None,
        })
        .collect();
    assert_eq!(values.first(), Some(&0), "events: {:?}", events);
    assert!(values.windows(2).all(|w| w[0] <= w[1]), "events: {:?}", events);
    assert!(values.iter().all(|v| *v <= 100));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, CacheEvent::Finished(_)))
            .count(),
        1
    );
    assert!(matches!(events.last(), Some(CacheEvent::Finished(_))));
}

pub fn finished(events: &[CacheEvent]) -> bool {
    matches!(events.last(), Some(CacheEvent::Finished(true)))
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
