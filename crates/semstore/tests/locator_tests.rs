use std::path::Path;

use semstore::locator::{content_type_extension, remote_extension, uri_extension};
use semstore::Locator;

#[test]
fn remote_schemes_are_recognised_case_insensitively() {
    assert_eq!(Locator::parse("https://host/cat.jpg"), Locator::Remote("https://host/cat.jpg"));
    assert_eq!(Locator::parse("HTTP://host/a.txt"), Locator::Remote("HTTP://host/a.txt"));
    assert_eq!(Locator::parse("ftp://host/missing.jpg"), Locator::Remote("ftp://host/missing.jpg"));
    assert_eq!(Locator::parse("notes/http.txt"), Locator::Local(Path::new("notes/http.txt")));
    assert_eq!(Locator::parse("file:///tmp/a.txt"), Locator::Local(Path::new("file:///tmp/a.txt")));
}

#[test]
fn content_type_maps_to_store_extensions() {
    assert_eq!(content_type_extension("image/jpeg").as_deref(), Some("jpg"));
    assert_eq!(content_type_extension("text/plain; charset=utf-8").as_deref(), Some("txt"));
    assert_eq!(content_type_extension("audio/x-wav").as_deref(), Some("wav"));
    assert_eq!(content_type_extension("image/JPEG").as_deref(), Some("jpg"));
    assert_eq!(content_type_extension("application/octet-stream"), None);
    assert_eq!(content_type_extension("text/html"), None);
}

#[test]
fn uri_extension_ignores_query_and_fragment() {
    assert_eq!(uri_extension("https://img.host/photos/3617500/pic.jpeg?auto=compress&w=1260").as_deref(), Some("jpeg"));
    assert_eq!(uri_extension("https://host/a/b.PDF#page=2").as_deref(), Some("pdf"));
    assert_eq!(uri_extension("https://host.example.com"), None);
    assert_eq!(uri_extension("https://host/dir/"), None);
    assert_eq!(uri_extension("https://host/.hidden"), None);
}

#[test]
fn declared_content_type_wins_over_uri() {
    assert_eq!(remote_extension(Some("image/png"), "https://host/file.txt").as_deref(), Some("png"));
    assert_eq!(remote_extension(Some("application/octet-stream"), "https://host/file.txt").as_deref(), Some("txt"));
    assert_eq!(remote_extension(None, "https://host/song.flac").as_deref(), Some("flac"));
    assert_eq!(remote_extension(None, "https://host/page"), None);
}
