use serde::{Deserialize, Serialize};
use std::path::Path;

/// An input script as read from storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// `tests/login.spec.js` -> `login.spec.js`
    pub fn file_name(&self) -> &str {
        Path::new(&self.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.path)
    }

    /// `tests/login.spec.js` -> `login`; `.spec`/`.test` suffixes are dropped
    /// so the output does not read `login.spec.spec.js`.
    pub fn stem(&self) -> String {
        let stem = Path::new(&self.path)
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.path);
        stem.strip_suffix(".spec")
            .or_else(|| stem.strip_suffix(".test"))
            .unwrap_or(stem)
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Rewritten,
    Renamed,
    Unsupported,
    Skipped,
    Warning,
    Dropped,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rewritten => "rewritten",
            Self::Renamed => "renamed",
            Self::Unsupported => "unsupported",
            Self::Skipped => "skipped",
            Self::Warning => "warning",
            Self::Dropped => "dropped",
        }
    }
}

/// One line of `migration_report.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub file: String,
    pub line: usize,
    pub family: String,
    pub original: String,
    pub replacement: String,
    pub status: ReportStatus,
    pub message: String,
}

/// Everything produced for one input script.
#[derive(Debug, Clone, Serialize)]
pub struct FileMigration {
    pub path: String,
    /// Output name prefix, unique within a run
    pub stem: String,
    #[serde(skip)]
    pub rewritten: String,
    #[serde(skip)]
    pub feature: Option<String>,
    #[serde(skip)]
    pub steps_file: Option<String>,
    pub scenarios: usize,
    pub step_definitions: usize,
    pub async_functions: Vec<String>,
    #[serde(skip)]
    pub report: Vec<ReportRow>,
}

impl FileMigration {
    pub fn spec_path(&self) -> String {
        format!("{}.spec.js", self.stem)
    }

    pub fn feature_path(&self) -> String {
        format!("features/{}.feature", self.stem)
    }

    pub fn steps_path(&self) -> String {
        format!("steps/{}.steps.js", self.stem)
    }

    pub fn count(&self, status: ReportStatus) -> usize {
        self.report.iter().filter(|r| r.status == status).count()
    }

    /// `(relative path, contents)` for every file this migration writes.
    pub fn outputs(&self) -> Vec<(String, &str)> {
        let mut outputs = vec![(self.spec_path(), self.rewritten.as_str())];
        if let Some(feature) = &self.feature {
            outputs.push((self.feature_path(), feature.as_str()));
        }
        if let Some(steps) = &self.steps_file {
            outputs.push((self.steps_path(), steps.as_str()));
        }
        outputs
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigrationResult {
    pub files: Vec<FileMigration>,
    /// Inputs that could not be migrated, one `skipped` row each
    pub failures: Vec<ReportRow>,
}

impl MigrationResult {
    /// Report rows of every file followed by the failed inputs.
    pub fn rows(&self) -> impl Iterator<Item = &ReportRow> {
        self.files
            .iter()
            .flat_map(|f| f.report.iter())
            .chain(self.failures.iter())
    }

    pub fn count(&self, status: ReportStatus) -> usize {
        self.rows().filter(|r| r.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_drops_spec_suffix() {
        assert_eq!(SourceFile::new("tests/login.spec.js", "").stem(), "login");
        assert_eq!(SourceFile::new("cart.test.mjs", "").stem(), "cart");
        assert_eq!(SourceFile::new("legacy/checkout.js", "").stem(), "checkout");
        assert_eq!(SourceFile::new("legacy/checkout.js", "").file_name(), "checkout.js");
    }

    #[test]
    fn test_outputs_follow_stem() {
        let migration = FileMigration {
            path: "login.js".to_string(),
            stem: "login".to_string(),
            rewritten: "code".to_string(),
            feature: Some("Feature: Login".to_string()),
            steps_file: None,
            scenarios: 1,
            step_definitions: 0,
            async_functions: Vec::new(),
            report: Vec::new(),
        };
        let paths: Vec<String> = migration.outputs().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["login.spec.js", "features/login.feature"]);
    }
}
