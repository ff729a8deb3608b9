//! Tour catalog discovery against a real directory tree

use std::fs;
use tempfile::TempDir;
use waypoint_core::TourId;
use waypoint_storage::TourCatalog;

// ===== Helpers =====

fn write(dir: &std::path::Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn tour_json(id: &str, language: &str) -> String {
    format!(
        r#"{{
            "id": "{id}",
            "language": "{language}",
            "title": "Tour {id}",
            "stops": [
                {{ "type": "audio", "id": "1", "title": "One", "audioFile": "1.mp3", "duration": 60 }}
            ]
        }}"#
    )
}

// ===== Tests =====

#[test]
fn indexes_by_content_not_file_name() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "barcelona/whatever.json", &tour_json("barcelona", "en"));
    write(dir.path(), "barcelona/de/tour.json", &tour_json("barcelona", "de"));
    write(dir.path(), "misc/prague-cs.json", &tour_json("prague", "cs"));

    let catalog = TourCatalog::load_dir(dir.path()).unwrap();

    let ids: Vec<&str> = catalog.tour_ids().into_iter().map(TourId::as_str).collect();
    assert_eq!(ids, vec!["barcelona", "prague"]);
    assert_eq!(
        catalog.languages_for(&TourId::new("barcelona")),
        vec!["de", "en"]
    );
}

#[test]
fn skips_index_backups_and_invalid_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "index.json", r#"{ "tours": [] }"#);
    write(dir.path(), "rome-original.json", &tour_json("rome", "en"));
    write(dir.path(), "broken.json", "{ not json");
    write(dir.path(), "no-language.json", r#"{ "id": "x", "language": "" }"#);
    write(dir.path(), "notes.txt", "ignore me");
    write(dir.path(), "rome.json", &tour_json("rome", "it"));

    let catalog = TourCatalog::load_dir(dir.path()).unwrap();

    assert_eq!(catalog.tour_ids().len(), 1);
    let rome = catalog.tour(&TourId::new("rome"), "en").unwrap();
    assert_eq!(rome.language, "it");
}

#[test]
fn missing_directory_is_an_error() {
    let dir = TempDir::new().unwrap();
    assert!(TourCatalog::load_dir(dir.path().join("nope")).is_err());
}
