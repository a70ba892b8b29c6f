use bdd_migrate::core::{ConfigProvider, Storage};
use bdd_migrate::{CliConfig, MigrateError, MigratePipeline, MigrationEngine, Result};
use chrono::{TimeZone, Utc};
use clap::Parser;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct MockStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockStorage {
    async fn with_files(files: &[(&str, &str)]) -> Self {
        let storage = Self::default();
        {
            let mut map = storage.files.lock().await;
            for (path, content) in files {
                map.insert(path.to_string(), content.as_bytes().to_vec());
            }
        }
        storage
    }

    async fn text(&self, path: &str) -> Option<String> {
        let files = self.files.lock().await;
        files.get(path).map(|d| String::from_utf8_lossy(d).into_owned())
    }

    async fn paths(&self) -> Vec<String> {
        let files = self.files.lock().await;
        let mut paths: Vec<String> = files.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl Storage for MockStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(path).cloned().ok_or_else(|| {
            MigrateError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path),
            ))
        })
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut files = self.files.lock().await;
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }
}

const CHECKOUT: &str = "import $ from 'jquery';

describe('Checkout', () => {
  beforeEach(() => {
    window.location.href = 'https://shop.test/cart';
  });

  it('pays by card', () => {
    $('#card-number').val('4242424242424242');
    $('#pay').click();
  });
});
";

fn config(args: &[&str]) -> CliConfig {
    let mut argv = vec!["bdd-migrate", "--output-path", "out", "--report-formats", "csv"];
    argv.extend_from_slice(args);
    CliConfig::parse_from(argv)
}

#[tokio::test]
async fn test_engine_run_with_mock_storage() -> anyhow::Result<()> {
    let source = MockStorage::with_files(&[("suite/checkout.js", CHECKOUT)]).await;
    let target = MockStorage::default();
    let config = config(&["--input", "suite/checkout.js", "--base-url", "https://shop.test"]);
    assert_eq!(config.base_url(), Some("https://shop.test"));

    let generated_at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
    let pipeline =
        MigratePipeline::new(source, target.clone(), config).with_generated_at(generated_at);
    let output = MigrationEngine::new(pipeline).run().await?;
    assert_eq!(output, "out");

    assert_eq!(
        target.paths().await,
        vec![
            "checkout.spec.js",
            "features/checkout.feature",
            "migration_report.csv",
            "steps/checkout.steps.js",
        ]
    );

    let spec = target.text("checkout.spec.js").await.unwrap_or_default();
    assert!(spec.starts_with("import { test, expect } from '@playwright/test';\n"));
    assert!(!spec.contains("from 'jquery'"));
    assert!(spec.contains("test.beforeEach(async ({ page }) => {"));
    assert!(spec.contains("await page.goto('https://shop.test/cart');"));

    let feature = target.text("features/checkout.feature").await.unwrap_or_default();
    assert!(feature.starts_with("@migrated\nFeature: Checkout\n"));
    assert!(feature.contains("  Background:\n"));
    assert!(feature.contains("Given I open \"/cart\""));
    assert!(feature.contains("Scenario: pays by card"));

    let steps = target.text("steps/checkout.steps.js").await.unwrap_or_default();
    assert!(steps.starts_with(
        "// Generated by bdd-migrate from checkout.js on 2026-10-16 09:30:00 UTC\n"
    ));
    assert!(steps.contains("import { createBdd } from 'playwright-bdd';"));
    Ok(())
}

#[tokio::test]
async fn test_same_stem_inputs_get_distinct_outputs() -> anyhow::Result<()> {
    let source = MockStorage::with_files(&[
        ("a/login.js", "$('#a').click();\n"),
        ("b/login.spec.js", "$('#b').click();\n"),
    ])
    .await;
    let target = MockStorage::default();
    let config = config(&["--input", "a/login.js,b/login.spec.js", "--no-scenarios"]);

    let pipeline = MigratePipeline::new(source, target.clone(), config);
    MigrationEngine::new(pipeline).run().await?;

    let first = target.text("login.spec.js").await.unwrap_or_default();
    let second = target.text("login_2.spec.js").await.unwrap_or_default();
    assert!(first.contains("page.locator('#a')"));
    assert!(second.contains("page.locator('#b')"));
    Ok(())
}

#[tokio::test]
async fn test_missing_input_fails_the_run() {
    let source = MockStorage::default();
    let target = MockStorage::default();
    let pipeline = MigratePipeline::new(source, target, config(&["--input", "nope.js"]));

    let err = MigrationEngine::new(pipeline).run().await.unwrap_err();
    assert_eq!(err.exit_code(), 3);
}
