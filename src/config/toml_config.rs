use crate::analysis::AnalysisOptions;
use crate::config::{validate_provider, CliConfig, DEFAULT_FEATURE_TAG, DEFAULT_OUTPUT_PATH, DEFAULT_PAGE_OBJECT};
use crate::core::ConfigProvider;
use crate::scenario::DEFAULT_STEPS_MODULE;
use crate::utils::error::{MigrateError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub project: ProjectConfig,
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub rewrite: RewriteConfig,
    #[serde(default)]
    pub rename: RenameConfig,
    #[serde(default)]
    pub scenarios: ScenariosConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub files: Vec<String>,
    /// Relative input paths are resolved against this directory
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
    pub report_formats: Vec<String>,
    pub archive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    pub enabled: bool,
    pub page_object: String,
    pub annotate_unsupported: bool,
    pub sleep_helpers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameConfig {
    pub enabled: bool,
    pub exclude: Vec<String>,
    pub min_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenariosConfig {
    pub enabled: bool,
    pub feature_tag: String,
    pub base_url: Option<String>,
    pub steps_module: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_format: Option<String>,
}

fn default_base_dir() -> String {
    ".".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_OUTPUT_PATH.to_string(),
            report_formats: vec!["csv".to_string(), "json".to_string()],
            archive: false,
        }
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            page_object: DEFAULT_PAGE_OBJECT.to_string(),
            annotate_unsupported: true,
            sleep_helpers: AnalysisOptions::default().sleep_helpers,
        }
    }
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exclude: Vec::new(),
            min_length: AnalysisOptions::default().quality.min_length,
        }
    }
}

impl Default for ScenariosConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feature_tag: DEFAULT_FEATURE_TAG.to_string(),
            base_url: None,
            steps_module: DEFAULT_STEPS_MODULE.to_string(),
        }
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex"))
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MigrateError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| MigrateError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${BASE_URL})；未設定的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    /// Command-line flags win over the file. List flags with defaults
    /// (`--sleep-helpers`, `--report-formats`) do not override it.
    pub fn apply_cli_overrides(&mut self, cli: &CliConfig) {
        if !cli.input.is_empty() {
            self.input.files = cli.input.clone();
        }
        if let Some(path) = &cli.output_path {
            self.output.path = path.clone();
        }
        if cli.archive {
            self.output.archive = true;
        }
        if cli.no_rename {
            self.rename.enabled = false;
        }
        if cli.no_rewrite {
            self.rewrite.enabled = false;
        }
        if cli.no_scenarios {
            self.scenarios.enabled = false;
        }
        if cli.no_annotate {
            self.rewrite.annotate_unsupported = false;
        }
        if let Some(tag) = &cli.feature_tag {
            self.scenarios.feature_tag = tag.clone();
        }
        if let Some(base_url) = &cli.base_url {
            self.scenarios.base_url = Some(base_url.clone());
        }
        if let Some(module) = &cli.steps_module {
            self.scenarios.steps_module = module.clone();
        }
        if let Some(page) = &cli.page_object {
            self.rewrite.page_object = page.clone();
        }
        self.rename.exclude.extend(cli.rename_exclude.iter().cloned());
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        crate::utils::validation::validate_non_empty_string("project.name", &self.project.name)?;
        crate::utils::validation::validate_path("input.base_dir", &self.input.base_dir)?;
        validate_provider(self, "")
            .map_err(|e| match e {
                // 對應到 TOML 區段名稱
                MigrateError::MissingConfigError { field } => MigrateError::MissingConfigError {
                    field: section_field(&field),
                },
                MigrateError::InvalidConfigValueError {
                    field,
                    value,
                    reason,
                } => MigrateError::InvalidConfigValueError {
                    field: section_field(&field),
                    value,
                    reason,
                },
                other => other,
            })
    }

    pub fn input_base_dir(&self) -> &str {
        &self.input.base_dir
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_format(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_format.as_deref())
    }
}

fn section_field(field: &str) -> String {
    let qualified = match field {
        "input" => "input.files",
        "output_path" => "output.path",
        "report_formats" => "output.report_formats",
        "feature_tag" => "scenarios.feature_tag",
        "steps_module" => "scenarios.steps_module",
        "base_url" => "scenarios.base_url",
        "page_object" => "rewrite.page_object",
        "sleep_helpers" => "rewrite.sleep_helpers",
        "min_name_length" => "rename.min_length",
        other => other,
    };
    qualified.to_string()
}

impl ConfigProvider for TomlConfig {
    fn input_files(&self) -> &[String] {
        &self.input.files
    }

    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn rename_enabled(&self) -> bool {
        self.rename.enabled
    }

    fn rewrite_enabled(&self) -> bool {
        self.rewrite.enabled
    }

    fn scenarios_enabled(&self) -> bool {
        self.scenarios.enabled
    }

    fn feature_tag(&self) -> &str {
        &self.scenarios.feature_tag
    }

    fn base_url(&self) -> Option<&str> {
        self.scenarios.base_url.as_deref()
    }

    fn steps_module(&self) -> &str {
        &self.scenarios.steps_module
    }

    fn page_object(&self) -> &str {
        &self.rewrite.page_object
    }

    fn annotate_unsupported(&self) -> bool {
        self.rewrite.annotate_unsupported
    }

    fn rename_exclude(&self) -> &[String] {
        &self.rename.exclude
    }

    fn min_name_length(&self) -> usize {
        self.rename.min_length
    }

    fn sleep_helpers(&self) -> &[String] {
        &self.rewrite.sleep_helpers
    }

    fn report_formats(&self) -> &[String] {
        &self.output.report_formats
    }

    fn archive_enabled(&self) -> bool {
        self.output.archive
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[project]
name = "checkout-suite"

[input]
files = ["legacy/login.js", "legacy/cart.js"]
"#;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = TomlConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.project.name, "checkout-suite");
        assert_eq!(config.input_base_dir(), ".");
        assert_eq!(config.output_path(), "./migrated");
        assert_eq!(config.feature_tag(), "@migrated");
        assert_eq!(config.steps_module(), "playwright-bdd");
        assert_eq!(config.sleep_helpers(), ["sleep", "delay", "wait"]);
        assert!(config.rename_enabled() && config.rewrite_enabled() && config.scenarios_enabled());
        assert!(!config.archive_enabled());
        assert!(!config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[project]
name = "checkout-suite"
description = "Legacy jQuery checks"
version = "2.1"

[input]
files = ["login.js"]
base_dir = "./legacy"

[output]
path = "./e2e"
report_formats = ["json"]
archive = true

[rewrite]
page_object = "p"
annotate_unsupported = false
sleep_helpers = ["pause"]

[rename]
enabled = false
exclude = ["$el"]
min_length = 2

[scenarios]
feature_tag = "@legacy"
base_url = "https://shop.test"
steps_module = "./fixtures"

[monitoring]
enabled = true
log_format = "json"
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.input_base_dir(), "./legacy");
        assert_eq!(config.report_formats(), ["json"]);
        assert!(config.archive_enabled());
        assert_eq!(config.page_object(), "p");
        assert!(!config.annotate_unsupported());
        assert!(!config.rename_enabled());
        assert_eq!(config.min_name_length(), 2);
        assert_eq!(config.base_url(), Some("https://shop.test"));
        assert!(config.monitoring_enabled());
        assert_eq!(config.log_format(), Some("json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("BDD_MIGRATE_TEST_BASE_URL", "https://staging.shop.test");

        let toml_content = format!(
            "{}\n[scenarios]\nbase_url = \"${{BDD_MIGRATE_TEST_BASE_URL}}\"\n",
            MINIMAL
        );
        let config = TomlConfig::from_toml_str(&toml_content).unwrap();
        assert_eq!(config.base_url(), Some("https://staging.shop.test"));

        std::env::remove_var("BDD_MIGRATE_TEST_BASE_URL");
    }

    #[test]
    fn test_unset_env_var_is_kept() {
        let toml_content = format!(
            "{}\n[scenarios]\nsteps_module = \"${{BDD_MIGRATE_UNSET_VAR}}\"\n",
            MINIMAL
        );
        let config = TomlConfig::from_toml_str(&toml_content).unwrap();
        assert_eq!(config.steps_module(), "${BDD_MIGRATE_UNSET_VAR}");
    }

    #[test]
    fn test_validation_reports_section_fields() {
        let toml_content = format!("{}\n[output]\nreport_formats = [\"xml\"]\n", MINIMAL);
        let config = TomlConfig::from_toml_str(&toml_content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, MigrateError::InvalidConfigValueError { ref field, .. } if field == "output.report_formats")
        );

        let no_inputs = "[project]\nname = \"x\"\n\n[input]\nfiles = []\n";
        let err = TomlConfig::from_toml_str(no_inputs).unwrap().validate().unwrap_err();
        assert!(matches!(err, MigrateError::MissingConfigError { ref field } if field == "input.files"));
    }

    #[test]
    fn test_missing_section_is_a_parse_error() {
        let err = TomlConfig::from_toml_str("[project]\nname = \"x\"\n").unwrap_err();
        assert!(matches!(err, MigrateError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = TomlConfig::from_toml_str(MINIMAL).unwrap();
        let cli = CliConfig::parse_from([
            "bdd-migrate",
            "--input",
            "only.js",
            "--no-scenarios",
            "--feature-tag",
            "@smoke",
            "--archive",
        ]);
        config.apply_cli_overrides(&cli);

        assert_eq!(config.input_files(), ["only.js"]);
        assert!(!config.scenarios_enabled());
        assert_eq!(config.feature_tag(), "@smoke");
        assert!(config.archive_enabled());
        // 未指定的旗標不覆蓋
        assert_eq!(config.output_path(), "./migrated");
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.project.name, "checkout-suite");
    }
}
