//! Golden file tests for wiki description extraction.
//!
//! Each JSON file in `fixtures/wiki/` names an HTML page and the description
//! expected from it, or `null` plus the reason when the page should yield
//! nothing.

use scraper::Html;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tagsync_core::extract::{extract_best, ExtractionMiss, ExtractionPass};

#[derive(Debug, Deserialize)]
struct TestCase {
    /// HTML file, relative to the fixtures directory
    html: String,
    expected: Option<Expected>,
    /// Why nothing was extracted, when `expected` is null
    #[serde(default)]
    miss: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Expected {
    pass: String,
    description: String,
}

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/wiki")
}

fn load_test_cases() -> Vec<(String, TestCase)> {
    let dir = fixtures_dir();
    let mut cases = Vec::new();

    for entry in fs::read_dir(&dir).expect("Failed to read fixtures directory") {
        let path = entry.expect("Failed to read directory entry").path();
        if path.extension().is_some_and(|e| e == "json") {
            let name = path.file_stem().unwrap().to_string_lossy().into_owned();
            let content = fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
            let case: TestCase = serde_json::from_str(&content)
                .unwrap_or_else(|e| panic!("Failed to parse {}: {}", path.display(), e));
            cases.push((name, case));
        }
    }

    assert!(!cases.is_empty(), "No test fixtures found in {:?}", dir);
    cases.sort_by(|a, b| a.0.cmp(&b.0));
    cases
}

fn variant_name<T: serde::Serialize>(value: T) -> String {
    serde_json::to_value(value)
        .unwrap()
        .as_str()
        .unwrap()
        .to_string()
}

fn pass_name(pass: ExtractionPass) -> String {
    variant_name(pass)
}

fn miss_name(miss: ExtractionMiss) -> String {
    variant_name(miss)
}

#[test]
fn test_wiki_golden_files() {
    for (name, case) in load_test_cases() {
        println!("Testing: {}", name);

        let html_path = fixtures_dir().join(&case.html);
        let html = fs::read_to_string(&html_path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", html_path.display(), e));
        let found = extract_best(&Html::parse_document(&html));

        match (&case.expected, found) {
            (None, Err(miss)) => {
                let expected = case
                    .miss
                    .as_deref()
                    .unwrap_or_else(|| panic!("{}: fixture must name the miss reason", name));
                assert_eq!(miss_name(miss), expected, "miss reason mismatch for {}", name);
            }
            (Some(expected), Ok(found)) => {
                assert_eq!(
                    found.description.as_str(),
                    expected.description,
                    "description mismatch for {}",
                    name
                );
                assert_eq!(pass_name(found.pass), expected.pass, "pass mismatch for {}", name);
            }
            (None, Ok(found)) => panic!(
                "{}: expected no description, got {:?}",
                name,
                found.description.as_str()
            ),
            (Some(expected), Err(miss)) => panic!(
                "{}: expected {:?}, got no description ({:?})",
                name, expected.description, miss
            ),
        }
    }
}
