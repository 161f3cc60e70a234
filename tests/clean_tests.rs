//! Clean tests: leftovers go, credential records and leased versions stay.

mod helpers;

use helpers::{assert_absent, assert_file_exists, FakeRegistry, FakeTools, TestEnv};
use goldbox::build::Orchestrator;
use goldbox::clean;
use std::fs;

#[test]
fn test_clean_removes_leftover_image() {
    let env = TestEnv::new();
    let paths = env.paths();
    fs::create_dir_all(&env.scratch).unwrap();
    fs::write(&paths.image_path, "leftover").unwrap();
    fs::write(env.scratch.join(format!("{}.tmp", paths.image_name)), "partial").unwrap();

    let summary = clean::clean_scratch(&env.config()).unwrap();
    assert_absent(&paths.image_path);
    assert_eq!(summary.removed.len(), 2);
    assert!(summary.warnings.is_empty());
}

#[test]
fn test_clean_skips_leased_version() {
    let env = TestEnv::new();
    let paths = env.paths();
    fs::create_dir_all(&env.scratch).unwrap();
    fs::write(&paths.image_path, "in use").unwrap();
    fs::create_dir_all(paths.lease_path.parent().unwrap()).unwrap();
    fs::write(&paths.lease_path, "{}").unwrap();

    let summary = clean::clean_scratch(&env.config()).unwrap();
    assert_file_exists(&paths.image_path);
    assert_eq!(summary.skipped, vec!["2022".to_string()]);
}

#[test]
fn test_clean_all_unregisters_and_keeps_records() {
    let env = TestEnv::new();
    let tools = FakeTools::new();
    let ctx = env.context(&tools, false);
    assert!(Orchestrator::run(&ctx).is_success());
    let records = env.records();
    assert_eq!(records.len(), 1);

    let registry = FakeRegistry {
        calls: tools.calls.clone(),
        fail: false,
    };
    tools.clear();
    let summary = clean::clean_all(&env.config(), &registry).unwrap();

    let paths = env.paths();
    assert_absent(&paths.output_dir);
    assert_absent(&paths.box_path);
    assert_absent(&paths.engine_log);
    assert_eq!(tools.calls(), vec!["registry remove golden-2022".to_string()]);
    assert_eq!(env.records(), records);
    assert!(summary.warnings.is_empty(), "{:?}", summary.warnings);
}
