pub mod cli;
pub mod toml_config;

use crate::core::report::REPORT_FORMATS;
use crate::core::ConfigProvider;
use crate::scenario::{normalize_tag, DEFAULT_STEPS_MODULE};
use crate::utils::error::{MigrateError, Result};
use crate::utils::validation::{self, Validate, SCRIPT_EXTENSIONS};
use clap::Parser;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OUTPUT_PATH: &str = "./migrated";
pub const DEFAULT_FEATURE_TAG: &str = "@migrated";
pub const DEFAULT_PAGE_OBJECT: &str = "page";

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "bdd-migrate")]
#[command(about = "Migrates DOM/jQuery browser tests to Playwright and Gherkin scenarios")]
pub struct CliConfig {
    /// Scripts to migrate, comma separated
    #[arg(long, value_delimiter = ',')]
    pub input: Vec<String>,

    #[arg(long, help = "Output directory [default: ./migrated]")]
    pub output_path: Option<String>,

    /// TOML configuration; flags given here override it
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long, help = "Skip identifier renaming")]
    pub no_rename: bool,

    #[arg(long, help = "Skip the Playwright rewrite (also skips scenarios)")]
    pub no_rewrite: bool,

    #[arg(long, help = "Skip feature and step file generation")]
    pub no_scenarios: bool,

    #[arg(long, help = "Do not add MIGRATE comments above unsupported code")]
    pub no_annotate: bool,

    #[arg(long, help = "Tag on every generated feature [default: @migrated]")]
    pub feature_tag: Option<String>,

    /// `goto` URLs under this prefix become relative paths
    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long, help = "Module that exports createBdd [default: playwright-bdd]")]
    pub steps_module: Option<String>,

    #[arg(long, help = "Name of the Playwright page fixture [default: page]")]
    pub page_object: Option<String>,

    #[arg(long, value_delimiter = ',')]
    pub rename_exclude: Vec<String>,

    #[arg(long, default_value = "3")]
    pub min_name_length: usize,

    /// Helper functions treated as fixed waits
    #[arg(long, value_delimiter = ',', default_value = "sleep,delay,wait")]
    pub sleep_helpers: Vec<String>,

    #[arg(long, value_delimiter = ',', default_value = "csv,json")]
    pub report_formats: Vec<String>,

    #[arg(long, help = "Also pack every output into migration_bundle.zip")]
    pub archive: bool,

    #[arg(long, help = "Show what would be migrated without writing files")]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, default_value = "compact", value_parser = ["compact", "json"])]
    pub log_format: String,

    #[arg(long, help = "Log the duration of each stage")]
    pub monitor: bool,
}

impl ConfigProvider for CliConfig {
    fn input_files(&self) -> &[String] {
        &self.input
    }

    fn output_path(&self) -> &str {
        self.output_path.as_deref().unwrap_or(DEFAULT_OUTPUT_PATH)
    }

    fn rename_enabled(&self) -> bool {
        !self.no_rename
    }

    fn rewrite_enabled(&self) -> bool {
        !self.no_rewrite
    }

    fn scenarios_enabled(&self) -> bool {
        !self.no_scenarios
    }

    fn feature_tag(&self) -> &str {
        self.feature_tag.as_deref().unwrap_or(DEFAULT_FEATURE_TAG)
    }

    fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    fn steps_module(&self) -> &str {
        self.steps_module.as_deref().unwrap_or(DEFAULT_STEPS_MODULE)
    }

    fn page_object(&self) -> &str {
        self.page_object.as_deref().unwrap_or(DEFAULT_PAGE_OBJECT)
    }

    fn annotate_unsupported(&self) -> bool {
        !self.no_annotate
    }

    fn rename_exclude(&self) -> &[String] {
        &self.rename_exclude
    }

    fn min_name_length(&self) -> usize {
        self.min_name_length
    }

    fn sleep_helpers(&self) -> &[String] {
        &self.sleep_helpers
    }

    fn report_formats(&self) -> &[String] {
        &self.report_formats
    }

    fn archive_enabled(&self) -> bool {
        self.archive
    }
}

/// Checks shared by the CLI and TOML configurations.
pub fn validate_provider<C: ConfigProvider>(config: &C, prefix: &str) -> Result<()> {
    let field = |name: &str| format!("{}{}", prefix, name);

    if config.input_files().is_empty() {
        return Err(MigrateError::MissingConfigError {
            field: field("input"),
        });
    }
    validation::validate_file_extensions(&field("input"), config.input_files(), SCRIPT_EXTENSIONS)?;
    validation::validate_path(&field("output_path"), config.output_path())?;
    validation::validate_feature_tag(&field("feature_tag"), &normalize_tag(config.feature_tag()))?;
    validation::validate_non_empty_string(&field("steps_module"), config.steps_module())?;
    validation::validate_js_identifier(&field("page_object"), config.page_object())?;
    validation::validate_range(&field("min_name_length"), config.min_name_length(), 1, 16)?;
    if let Some(base_url) = config.base_url() {
        validation::validate_url(&field("base_url"), base_url)?;
    }
    for helper in config.sleep_helpers() {
        validation::validate_js_identifier(&field("sleep_helpers"), helper)?;
    }
    for format in config.report_formats() {
        if !REPORT_FORMATS.contains(&format.as_str()) {
            return Err(MigrateError::InvalidConfigValueError {
                field: field("report_formats"),
                value: format.clone(),
                reason: format!(
                    "Unsupported format. Valid formats: {}",
                    REPORT_FORMATS.join(", ")
                ),
            });
        }
    }
    Ok(())
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_provider(self, "")
    }
}
