//! Full index-then-query flows, through the library API and the binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use cim_code_search::config::Config;
use cim_code_search::indexer::run_index;
use cim_code_search::model::{Document, Page};
use cim_code_search::pipeline::CodeSearchPipeline;
use cim_code_search::search::HashEmbedder;

fn write_fixture_document(dir: &Path) -> PathBuf {
    let mut pages = vec![Page::default(); 31];
    pages[1].text =
        "Règles générales de codage PMSI.\nLe diagnostic principal motive la prise en charge."
            .to_string();
    pages.push(Page {
        text: "CHAPITRE I : Maladies infectieuses et parasitaires\n\
               A41\n\
               Sepsis à staphylocoques\n\
               À l'exclusion de : sepsis néonatal (P36.-)\n"
            .to_string(),
        blocks: Vec::new(),
    });
    pages.push(Page {
        text: "CHAPITRE X : Maladies de l'appareil respiratoire\n\
               J18.9\n\
               Pneumonie, sans précision\n\
               Comprend : pneumopathie infectieuse communautaire\n"
            .to_string(),
        blocks: Vec::new(),
    });

    let path = dir.join("manual.json");
    std::fs::write(
        &path,
        serde_json::to_string(&Document { pages }).unwrap(),
    )
    .unwrap();
    path
}

#[test]
fn library_flow_index_query_lookup() {
    let tmp = TempDir::new().unwrap();
    let input = write_fixture_document(tmp.path());
    let data_dir = tmp.path().join("data");
    let config = Config::default();

    let summary = run_index(&input, &data_dir, &config, &HashEmbedder::default()).unwrap();
    assert_eq!(summary.records, 3); // general rules + two codes
    assert_eq!(summary.indexed_semantic, 3);

    let pipeline = CodeSearchPipeline::open(
        &data_dir,
        config,
        Arc::new(HashEmbedder::default()),
        None,
    )
    .unwrap();

    let result = pipeline.suggest("sepsis à staphylocoques").unwrap();
    assert_eq!(result.suggestions[0].code, "A41");
    assert!(result.processing_time_ms >= 0.0);

    let hit = pipeline.lookup("j18.9").unwrap().unwrap();
    assert!(hit.text.contains("Pneumonie"));
}

#[test]
fn query_is_deterministic_for_unchanged_indexes() {
    let tmp = TempDir::new().unwrap();
    let input = write_fixture_document(tmp.path());
    let data_dir = tmp.path().join("data");
    let config = Config::default();
    run_index(&input, &data_dir, &config, &HashEmbedder::default()).unwrap();

    let pipeline = CodeSearchPipeline::open(
        &data_dir,
        config,
        Arc::new(HashEmbedder::default()),
        None,
    )
    .unwrap();

    let run = || -> Vec<(String, String)> {
        pipeline
            .suggest("pneumonie infectieuse")
            .unwrap()
            .suggestions
            .iter()
            .map(|s| (s.code.clone(), format!("{:.6}", s.relevance_score)))
            .collect()
    };
    assert_eq!(run(), run());
}

#[test]
fn cli_index_query_lookup_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let input = write_fixture_document(tmp.path());
    let data_dir = tmp.path().join("data");

    Command::cargo_bin("cims")
        .unwrap()
        .args(["index"])
        .arg(&input)
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("indexed 3 records"));

    Command::cargo_bin("cims")
        .unwrap()
        .args(["query", "sepsis à staphylocoques", "--json"])
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"code\": \"A41\""));

    Command::cargo_bin("cims")
        .unwrap()
        .args(["lookup", "A41"])
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Sepsis à staphylocoques"));

    Command::cargo_bin("cims")
        .unwrap()
        .args(["lookup", "Z99.9"])
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .failure();
}
