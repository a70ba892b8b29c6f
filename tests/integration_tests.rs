use bdd_migrate::core::{ConfigProvider, Pipeline};
use bdd_migrate::{CliConfig, LocalStorage, MigratePipeline, MigrationEngine, TomlConfig};
use clap::Parser;
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

const MOCHA_LOGIN: &str = "const assert = require('assert');

describe('Login', function () {
  it('signs in', function () {
    $('#username').val('alice');
    $('#login').click();
    assert.equal($('.welcome').text(), 'Hi alice');
  });
});
";

const PLAIN_SCRIPT: &str = "var b = $('#login-btn');\nb.click();\n";

fn write_input(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

fn cli(args: &[&str]) -> CliConfig {
    let mut argv = vec!["bdd-migrate"];
    argv.extend_from_slice(args);
    CliConfig::parse_from(argv)
}

#[tokio::test]
async fn test_end_to_end_migration() -> anyhow::Result<()> {
    let input_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    let output_path = output_dir.path().to_string_lossy().into_owned();
    let login = write_input(input_dir.path(), "login.js", MOCHA_LOGIN);

    let config = cli(&["--input", &login, "--output-path", &output_path]);
    let pipeline = MigratePipeline::new(
        LocalStorage::new(".".to_string()),
        LocalStorage::new(config.output_path().to_string()),
        config,
    );
    let engine = MigrationEngine::new(pipeline);
    let result = engine.run().await?;
    assert_eq!(result, output_path);

    let spec = std::fs::read_to_string(output_dir.path().join("login.spec.js"))?;
    assert!(spec.starts_with("const { test, expect } = require('@playwright/test');\n"));
    assert!(spec.contains("test.describe('Login', function () {"));
    assert!(spec.contains("test('signs in', async ({ page }) => {"));
    assert!(spec.contains("await page.locator('#username').fill('alice');"));
    assert!(spec.contains("expect(await page.locator('.welcome').textContent()).toBe('Hi alice');"));
    assert!(!spec.contains("require('assert')"));

    let feature = std::fs::read_to_string(output_dir.path().join("features/login.feature"))?;
    assert!(feature.starts_with("@migrated\nFeature: Login\n"));
    assert!(feature.contains("Scenario: signs in"));

    let steps = std::fs::read_to_string(output_dir.path().join("steps/login.steps.js"))?;
    assert!(steps.contains("const { createBdd } = require('playwright-bdd');"));
    assert!(steps.contains("const { Given, When, Then } = createBdd();"));

    let csv = std::fs::read_to_string(output_dir.path().join("migration_report.csv"))?;
    assert!(csv.contains(",rewritten,"));

    let json = std::fs::read_to_string(output_dir.path().join("migration_report.json"))?;
    let report: serde_json::Value = serde_json::from_str(&json)?;
    assert!(report["totals"]["rewritten"].as_u64().unwrap_or(0) >= 2);
    assert_eq!(report["files"][0]["stem"], "login");

    assert!(!output_dir.path().join("migration_bundle.zip").exists());
    Ok(())
}

#[tokio::test]
async fn test_done_callback_and_wrapped_binding() -> anyhow::Result<()> {
    let input_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    let output_path = output_dir.path().to_string_lossy().into_owned();
    let profile = write_input(
        input_dir.path(),
        "profile.js",
        "describe('Profile', function () {
  it('saves the name', function (done) {
    var field = document.getElementById('name');
    $(field).val('Ada');
    $('#save').click();
    done();
  });
});
",
    );

    let config = cli(&["--input", &profile, "--output-path", &output_path]);
    let pipeline = MigratePipeline::new(
        LocalStorage::new(".".to_string()),
        LocalStorage::new(output_path.clone()),
        config,
    );
    MigrationEngine::new(pipeline).run().await?;

    let spec = std::fs::read_to_string(output_dir.path().join("profile.spec.js"))?;
    assert!(spec.contains("test('saves the name', async ({ page }) => {"));
    assert!(spec.contains(".fill('Ada');"));
    assert!(!spec.contains("page.locator(page.locator"));
    assert!(!spec.contains("done"));

    let steps = std::fs::read_to_string(output_dir.path().join("steps/profile.steps.js"))?;
    assert!(!steps.contains("I done"));
    assert!(!steps.contains("done()"));
    assert!(!steps.contains("page.locator(page.locator"));
    Ok(())
}

#[tokio::test]
async fn test_archive_bundles_every_output() -> anyhow::Result<()> {
    let input_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    let output_path = output_dir.path().to_string_lossy().into_owned();
    let login = write_input(input_dir.path(), "login.js", PLAIN_SCRIPT);

    let config = cli(&["--input", &login, "--output-path", &output_path, "--archive"]);
    let pipeline = MigratePipeline::new(
        LocalStorage::new(".".to_string()),
        LocalStorage::new(output_path.clone()),
        config,
    );
    let result = MigrationEngine::new_with_monitoring(pipeline, true).run().await?;
    assert!(result.ends_with("migration_bundle.zip"));

    let zip_data = std::fs::read(output_dir.path().join("migration_bundle.zip"))?;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data))?;
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).map(|f| f.name().to_string()))
        .collect::<Result<_, _>>()?;

    for expected in [
        "login.spec.js",
        "features/login.feature",
        "steps/login.steps.js",
        "migration_report.csv",
        "migration_report.json",
    ] {
        assert!(names.contains(&expected.to_string()), "missing {}", expected);
    }

    let mut spec = String::new();
    archive.by_name("login.spec.js")?.read_to_string(&mut spec)?;
    assert!(spec.contains("loginButton"));
    assert!(!spec.contains("var b "));
    Ok(())
}

#[tokio::test]
async fn test_rename_only_pass() -> anyhow::Result<()> {
    let input_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    let output_path = output_dir.path().to_string_lossy().into_owned();
    let login = write_input(input_dir.path(), "login.js", PLAIN_SCRIPT);

    let config = cli(&["--input", &login, "--output-path", &output_path, "--no-rewrite"]);
    let pipeline = MigratePipeline::new(
        LocalStorage::new(".".to_string()),
        LocalStorage::new(output_path.clone()),
        config,
    );
    MigrationEngine::new(pipeline).run().await?;

    let spec = std::fs::read_to_string(output_dir.path().join("login.spec.js"))?;
    assert_eq!(spec, "var loginButton = $('#login-btn');\nloginButton.click();\n");
    assert!(!output_dir.path().join("features/login.feature").exists());

    let csv = std::fs::read_to_string(output_dir.path().join("migration_report.csv"))?;
    assert!(csv.contains(",b,loginButton,renamed,"));
    Ok(())
}

#[tokio::test]
async fn test_broken_script_is_skipped() -> anyhow::Result<()> {
    let input_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    let output_path = output_dir.path().to_string_lossy().into_owned();
    let broken = write_input(input_dir.path(), "broken.js", "$('#go').click(;\n");
    let login = write_input(input_dir.path(), "login.js", PLAIN_SCRIPT);

    let config = cli(&["--input", &format!("{},{}", broken, login), "--output-path", &output_path]);
    let pipeline = MigratePipeline::new(
        LocalStorage::new(".".to_string()),
        LocalStorage::new(output_path.clone()),
        config,
    );
    MigrationEngine::new(pipeline).run().await?;

    assert!(output_dir.path().join("login.spec.js").exists());
    assert!(!output_dir.path().join("broken.spec.js").exists());

    let json = std::fs::read_to_string(output_dir.path().join("migration_report.json"))?;
    let report: serde_json::Value = serde_json::from_str(&json)?;
    assert_eq!(report["totals"]["skipped"], 1);
    Ok(())
}

#[tokio::test]
async fn test_dry_run_writes_nothing() -> anyhow::Result<()> {
    let input_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    let output_path = output_dir.path().join("out").to_string_lossy().into_owned();
    let login = write_input(input_dir.path(), "login.js", PLAIN_SCRIPT);

    let config = cli(&["--input", &login, "--output-path", &output_path, "--dry-run"]);
    let pipeline = MigratePipeline::new(
        LocalStorage::new(".".to_string()),
        LocalStorage::new(output_path.clone()),
        config,
    );
    let result = MigrationEngine::new(pipeline).dry_run().await?;

    assert_eq!(result.files.len(), 1);
    assert!(!Path::new(&output_path).exists());
    Ok(())
}

#[tokio::test]
async fn test_toml_config_drives_pipeline() -> anyhow::Result<()> {
    let input_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    write_input(input_dir.path(), "cart.test.js", PLAIN_SCRIPT);

    let toml_content = format!(
        r#"
[project]
name = "cart"

[input]
files = ["cart.test.js"]
base_dir = "{}"

[output]
path = "{}"
report_formats = ["json"]

[rename]
enabled = false

[scenarios]
feature_tag = "legacy"
"#,
        input_dir.path().to_string_lossy().replace('\\', "/"),
        output_dir.path().to_string_lossy().replace('\\', "/")
    );
    let config = TomlConfig::from_toml_str(&toml_content)?;
    let pipeline = MigratePipeline::new(
        LocalStorage::new(config.input_base_dir().to_string()),
        LocalStorage::new(config.output_path().to_string()),
        config,
    );

    let sources = pipeline.extract().await?;
    assert_eq!(sources[0].stem(), "cart");
    let result = pipeline.transform(sources).await?;
    pipeline.load(result).await?;

    let feature = std::fs::read_to_string(output_dir.path().join("features/cart.feature"))?;
    assert!(feature.starts_with("@legacy\n"));
    let spec = std::fs::read_to_string(output_dir.path().join("cart.spec.js"))?;
    assert!(spec.contains("var b = page.locator('#login-btn');"));
    assert!(spec.contains("await b.click();"));
    assert!(!output_dir.path().join("migration_report.csv").exists());
    assert!(output_dir.path().join("migration_report.json").exists());
    Ok(())
}
