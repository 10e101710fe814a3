mod common;

use std::path::Path;
use std::sync::Arc;

use docview_validate::config::ValidatorsConfig;
use docview_validate::validators::{DISALLOWED_PATHS_ID, MERGE_MARKERS_ID, builtin_registry};
use docview_validate::{
    DOCVIEW_PARSER_ID, EngineConfig, FileStatus, PackageReader, Severity, ValidationEngine,
    ValidationReport, ValidatorRegistry,
};

use common::mocks::{EmptyFileCheck, RecordingValidator};
use common::test_helpers::{PackageFixture, SITE_CONTENT_XML, create_sample_package};

fn builtin_engine(disallowed: &[&str]) -> ValidationEngine {
    let config = ValidatorsConfig {
        disallowed_paths: disallowed.iter().map(|s| s.to_string()).collect(),
        ..ValidatorsConfig::default()
    };
    ValidationEngine::new(
        builtin_registry(&config).unwrap(),
        PackageReader::new(),
        EngineConfig::default(),
    )
}

fn file_status<'a>(report: &'a ValidationReport, file: &str) -> &'a FileStatus {
    &report
        .files
        .iter()
        .find(|f| f.file_path == Path::new(file))
        .unwrap()
        .status
}

#[tokio::test]
async fn test_sample_package_with_builtin_validators() {
    let package = create_sample_package().await.unwrap();
    let report = builtin_engine(&["/content/site/jcr:content/par/*"])
        .validate_package(package.path())
        .await
        .unwrap();

    assert_eq!(report.summary.total_files, 4);
    assert_eq!(report.summary.complete_files, 3);
    assert_eq!(report.summary.incomplete_files, 1);
    assert_eq!(report.summary.errors, 7);
    assert_eq!(report.summary.warnings, 1);
    assert_eq!(report.worst_severity, Some(Severity::Error));
    assert!(report.has_errors());

    let located: Vec<(String, Option<u64>, &str)> = report
        .messages
        .iter()
        .map(|m| {
            (
                m.message
                    .file_path
                    .as_ref()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned(),
                m.message.line,
                m.validator_id.as_str(),
            )
        })
        .collect();

    assert_eq!(
        &located[..5],
        &[
            ("apps/site/readme.txt".to_string(), Some(2), MERGE_MARKERS_ID),
            ("apps/site/readme.txt".to_string(), Some(4), MERGE_MARKERS_ID),
            ("apps/site/readme.txt".to_string(), Some(6), MERGE_MARKERS_ID),
            ("content/site/.content.xml".to_string(), Some(8), DISALLOWED_PATHS_ID),
            ("content/site/.content.xml".to_string(), Some(9), DISALLOWED_PATHS_ID),
        ]
    );
    assert_eq!(
        report.messages[3].message.node_path.as_deref(),
        Some("/content/site/jcr:content/par/text")
    );
    assert_eq!(
        report.messages[4].message.node_path.as_deref(),
        Some("/content/site/jcr:content/par/text[2]")
    );

    // The truncated file still reports the nodes left open when parsing stopped.
    let open_nodes: Vec<(Option<u64>, Option<&str>)> = report.messages[5..7]
        .iter()
        .map(|m| {
            assert_eq!(m.validator_id, DOCVIEW_PARSER_ID);
            assert_eq!(m.severity(), Severity::Error);
            (m.message.line, m.message.node_path.as_deref())
        })
        .collect();
    assert_eq!(
        open_nodes,
        vec![
            (Some(2), Some("/content/site/broken")),
            (Some(3), Some("/content/site/broken/a")),
        ]
    );

    let incomplete = &report.messages[7];
    assert_eq!(incomplete.validator_id, DOCVIEW_PARSER_ID);
    assert_eq!(incomplete.registration_order, 0);
    assert_eq!(incomplete.severity(), Severity::Warn);
    assert!(
        incomplete
            .message
            .message
            .starts_with("Incomplete validation, parsing stopped")
    );

    assert!(
        file_status(&report, "content/site/broken/.content.xml").is_incomplete()
    );
    assert!(file_status(&report, "content/site/logo.png").is_complete());
}

#[tokio::test]
async fn test_clean_package_has_no_findings() {
    let package = PackageFixture::new().await.unwrap();
    package
        .write("content/site/.content.xml", SITE_CONTENT_XML)
        .await
        .unwrap();

    let report = builtin_engine(&["/apps/**"])
        .validate_package(package.path())
        .await
        .unwrap();

    assert!(report.messages.is_empty());
    assert_eq!(report.worst_severity, None);
    assert!(!report.has_errors());
    assert_eq!(report.summary.complete_files, 1);
}

#[tokio::test]
async fn test_jcr_root_can_be_passed_directly() {
    let package = create_sample_package().await.unwrap();
    let engine = builtin_engine(&[]);

    let from_package = engine.validate_package(package.path()).await.unwrap();
    let from_root = engine.validate_package(&package.jcr_root()).await.unwrap();

    assert_eq!(from_package.root, from_root.root);
    assert_eq!(from_package.messages, from_root.messages);
}

#[tokio::test]
async fn test_results_do_not_depend_on_concurrency() {
    let package = PackageFixture::new().await.unwrap();
    for i in 0..24 {
        let content = if i % 5 == 0 {
            "ok\n=======\n".to_string()
        } else {
            format!("file {}\n", i)
        };
        package
            .write(&format!("apps/comp{:02}/notes.txt", i), content)
            .await
            .unwrap();
        package
            .write(&format!("content/page{:02}/.content.xml", i), SITE_CONTENT_XML)
            .await
            .unwrap();
    }

    let run = |threads: usize| {
        let config = EngineConfig {
            max_concurrent_files: threads,
            ..EngineConfig::default()
        };
        let registry = builtin_registry(&ValidatorsConfig {
            disallowed_paths: vec!["/content/*/jcr:content".to_string()],
            ..ValidatorsConfig::default()
        })
        .unwrap();
        ValidationEngine::new(registry, PackageReader::new(), config)
    };

    let sequential = run(1).validate_package(package.path()).await.unwrap();
    let parallel = run(8).validate_package(package.path()).await.unwrap();

    assert_eq!(sequential.messages, parallel.messages);
    assert_eq!(sequential.files, parallel.files);
    assert_eq!(sequential.summary.errors, 5 + 24);
}

#[tokio::test]
async fn test_index_handed_only_to_docview_files() {
    let package = create_sample_package().await.unwrap();
    let raw = Arc::new(RecordingValidator::default());
    let indexed = Arc::new(RecordingValidator::with_index());

    let mut registry = ValidatorRegistry::new();
    registry.register("raw", raw.clone()).unwrap();
    registry.register("indexed", indexed.clone()).unwrap();
    let engine = ValidationEngine::new(registry, PackageReader::new(), EngineConfig::default());
    engine.validate_package(package.path()).await.unwrap();

    let mut raw_seen = raw.seen();
    raw_seen.sort();
    assert_eq!(raw_seen.len(), 4);
    assert!(raw_seen.iter().all(|(_, index)| index.is_none()));

    let mut indexed_seen = indexed.seen();
    indexed_seen.sort();
    let site = indexed_seen
        .iter()
        .find(|(file, _)| file == Path::new("content/site/.content.xml"))
        .unwrap();
    assert_eq!(site.1, Some(5));
    let broken = indexed_seen
        .iter()
        .find(|(file, _)| file == Path::new("content/site/broken/.content.xml"))
        .unwrap();
    assert_eq!(broken.1, Some(2));
    let png = indexed_seen
        .iter()
        .find(|(file, _)| file == Path::new("content/site/logo.png"))
        .unwrap();
    assert_eq!(png.1, None);
}

#[tokio::test]
async fn test_legacy_validator_takes_part_in_run() {
    let package = PackageFixture::new().await.unwrap();
    package.write("apps/empty.txt", "").await.unwrap();
    package.write("apps/full.txt", "text").await.unwrap();

    let mut registry = ValidatorRegistry::new();
    registry.register_legacy("empty-files", EmptyFileCheck).unwrap();
    let report = ValidationEngine::new(registry, PackageReader::new(), EngineConfig::default())
        .validate_package(package.path())
        .await
        .unwrap();

    assert_eq!(report.messages.len(), 1);
    assert_eq!(report.messages[0].validator_id, "empty-files");
    assert_eq!(
        report.messages[0].message.file_path.as_deref(),
        Some(Path::new("apps/empty.txt"))
    );
    assert_eq!(report.worst_severity, Some(Severity::Warn));
}

#[tokio::test]
async fn test_exclude_patterns_limit_the_run() {
    let package = create_sample_package().await.unwrap();
    let reader = PackageReader::new()
        .with_exclude_patterns(&["apps/**".to_string(), "**/*.png".to_string()])
        .unwrap();
    let registry = builtin_registry(&ValidatorsConfig::default()).unwrap();

    let report = ValidationEngine::new(registry, reader, EngineConfig::default())
        .validate_package(package.path())
        .await
        .unwrap();

    assert_eq!(report.summary.total_files, 2);
    assert_eq!(report.summary.errors, 0);
}
