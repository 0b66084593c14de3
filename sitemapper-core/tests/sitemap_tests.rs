// Tests for sitemap rendering and generation

use chrono::{TimeZone, Utc};
use flate2::read::GzDecoder;
use sitemapper_core::data::{Database, shared};
use sitemapper_core::model::DiscoveredUrl;
use sitemapper_core::sitemap::{generate_sitemap, gzip, render_sitemap, write_sitemap_file};
use std::io::Read;
use tempfile::TempDir;

fn record(url: &str, status: u16) -> DiscoveredUrl {
    let checked_at = Utc.with_ymd_and_hms(2024, 5, 17, 8, 30, 0).unwrap();
    DiscoveredUrl::from_fetch("shop.com", url, status, checked_at)
}

fn gunzip(bytes: &[u8]) -> String {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = String::new();
    decoder.read_to_string(&mut out).unwrap();
    out
}

#[test]
fn test_render_sitemap_entries() {
    let xml = render_sitemap(&[record("https://shop.com/product/1", 200)]).unwrap();

    assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    assert!(xml.contains(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#));
    assert!(xml.contains("<loc>https://shop.com/product/1</loc>"));
    assert!(xml.contains("<lastmod>2024-05-17T08:30:00Z</lastmod>"));
    assert!(xml.contains("<changefreq>weekly</changefreq>"));
    assert!(xml.contains("<priority>0.8</priority>"));
    assert!(xml.trim_end().ends_with("</urlset>"));
}

#[test]
fn test_render_sitemap_escapes_urls() {
    let xml = render_sitemap(&[record("https://shop.com/search?q=a&page=2", 200)]).unwrap();
    assert!(xml.contains("<loc>https://shop.com/search?q=a&amp;page=2</loc>"));
}

#[test]
fn test_render_empty_sitemap() {
    let xml = render_sitemap(&[]).unwrap();
    assert!(xml.contains("<urlset"));
    assert!(!xml.contains("<url>"));
}

#[test]
fn test_gzip_round_trip() {
    let compressed = gzip(b"<urlset/>").unwrap();
    assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
    assert_eq!(gunzip(&compressed), "<urlset/>");
}

#[test]
fn test_generate_sitemap_uses_ok_pages_by_priority() {
    let db = Database::in_memory().unwrap();
    db.upsert_url(&record("https://shop.com/about", 200)).unwrap();
    db.upsert_url(&record("https://shop.com/", 200)).unwrap();
    db.upsert_url(&record("https://shop.com/broken", 500)).unwrap();
    let db = shared(db);

    let sitemap = generate_sitemap(&db, "shop.com").unwrap();

    assert_eq!(sitemap.total_urls, 2);
    assert!(!sitemap.xml.contains("/broken"));
    let root = sitemap.xml.find("<loc>https://shop.com/</loc>").unwrap();
    let about = sitemap.xml.find("<loc>https://shop.com/about</loc>").unwrap();
    assert!(root < about);
    assert_eq!(gunzip(&sitemap.gzipped), sitemap.xml);
}

#[test]
fn test_write_sitemap_file() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::in_memory().unwrap();
    db.upsert_url(&record("https://shop.com/", 200)).unwrap();
    let sitemap = generate_sitemap(&shared(db), "shop.com").unwrap();

    let plain = temp_dir.path().join("public").join("sitemap.xml");
    write_sitemap_file(&plain, &sitemap, false).unwrap();
    assert_eq!(std::fs::read_to_string(&plain).unwrap(), sitemap.xml);

    let compressed = temp_dir.path().join("sitemap.xml.gz");
    write_sitemap_file(&compressed, &sitemap, true).unwrap();
    assert_eq!(gunzip(&std::fs::read(&compressed).unwrap()), sitemap.xml);
}
