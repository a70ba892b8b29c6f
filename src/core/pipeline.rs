use crate::analysis::syntax::Script;
use crate::analysis::{analyze, AnalysisOptions};
use crate::core::report;
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{FileMigration, MigrationResult, ReportRow, ReportStatus, SourceFile};
use crate::rename::{self, RenameOptions};
use crate::rewrite::{self, NoteStatus, RewriteOptions};
use crate::scenario::{build_feature, humanize, render_feature, render_steps, ScenarioOptions};
use crate::utils::error::{MigrateError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Reads scripts from `source`, writes migrated files and reports to `target`.
pub struct MigratePipeline<S: Storage, C: ConfigProvider> {
    source: S,
    target: S,
    config: C,
    generated_at: DateTime<Utc>,
}

impl<S: Storage, C: ConfigProvider> MigratePipeline<S, C> {
    pub fn new(source: S, target: S, config: C) -> Self {
        Self {
            source,
            target,
            config,
            generated_at: Utc::now(),
        }
    }

    /// Fixes the timestamp written into step files and reports.
    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    fn analysis_options(&self) -> AnalysisOptions {
        let mut options = AnalysisOptions {
            sleep_helpers: self.config.sleep_helpers().to_vec(),
            ..AnalysisOptions::default()
        };
        options.quality.min_length = self.config.min_name_length();
        options
    }

    /// Runs the enabled passes over one script.
    pub fn migrate_file(&self, file: &SourceFile, stem: &str) -> Result<FileMigration> {
        let analysis_options = self.analysis_options();
        let mut report = Vec::new();

        let mut script = Script::parse(&file.path, &file.content)?;
        let mut analysis = analyze(&script, &analysis_options);
        tracing::debug!(
            "{}: {} poor identifiers",
            file.path,
            analysis.poor_identifiers().count()
        );

        if self.config.rename_enabled() {
            let options = RenameOptions {
                exclude: self.config.rename_exclude().to_vec(),
            };
            let plan = rename::plan(&script, &analysis, &options);
            for renamed in &plan.renames {
                report.push(ReportRow {
                    file: file.path.clone(),
                    line: renamed.line,
                    family: "identifier".to_string(),
                    original: renamed.from.clone(),
                    replacement: renamed.to.clone(),
                    status: ReportStatus::Renamed,
                    message: format!("name was {}", renamed.quality.as_str()),
                });
            }
            for skipped in &plan.skipped {
                report.push(ReportRow {
                    file: file.path.clone(),
                    line: skipped.line,
                    family: "identifier".to_string(),
                    original: skipped.name.clone(),
                    replacement: String::new(),
                    status: ReportStatus::Skipped,
                    message: skipped.reason.clone(),
                });
            }
            if !plan.is_empty() {
                // 重新解析改名後的程式碼
                let renamed = rename::apply(&script, &plan);
                script = Script::parse(&file.path, &renamed)?;
                analysis = analyze(&script, &analysis_options);
            }
        }

        let mut migration = FileMigration {
            path: file.path.clone(),
            stem: stem.to_string(),
            rewritten: script.source().to_string(),
            feature: None,
            steps_file: None,
            scenarios: 0,
            step_definitions: 0,
            async_functions: Vec::new(),
            report: Vec::new(),
        };

        if !self.config.rewrite_enabled() {
            if self.config.scenarios_enabled() {
                tracing::warn!(
                    "⚠️ {}: scenarios are built from Playwright code, skipped because rewriting is off",
                    file.path
                );
            }
            migration.report = report;
            return Ok(migration);
        }

        let options = RewriteOptions {
            page_object: self.config.page_object().to_string(),
            test_name: humanize(stem),
            annotate_unsupported: self.config.annotate_unsupported(),
            ..RewriteOptions::default()
        };
        let rewritten = rewrite::rewrite(&script, &analysis, &options)?;
        report.extend(rewritten.notes.iter().map(|note| ReportRow {
            file: file.path.clone(),
            line: note.line,
            family: note.family.to_string(),
            original: note.original.clone(),
            replacement: note.replacement.clone(),
            status: match note.status {
                NoteStatus::Rewritten => ReportStatus::Rewritten,
                NoteStatus::Unsupported => ReportStatus::Unsupported,
                NoteStatus::Warning => ReportStatus::Warning,
                NoteStatus::Dropped => ReportStatus::Dropped,
            },
            message: note.message.clone(),
        }));
        migration.async_functions = rewritten.async_functions.clone();

        if self.config.scenarios_enabled() {
            let target = Script::parse(&file.path, &rewritten.code)?;
            let options = ScenarioOptions {
                feature_tag: self.config.feature_tag().to_string(),
                base_url: self.config.base_url().map(str::to_string),
                page_object: self.config.page_object().to_string(),
            };
            let set = build_feature(&target, stem, &options);
            for (line, message) in &set.warnings {
                report.push(ReportRow {
                    file: file.path.clone(),
                    line: *line,
                    family: "scenario".to_string(),
                    original: String::new(),
                    replacement: String::new(),
                    status: ReportStatus::Warning,
                    message: message.clone(),
                });
            }
            migration.scenarios = set.feature.scenarios.len();
            migration.step_definitions = set.definitions.len();
            migration.feature = Some(render_feature(&set.feature));
            migration.steps_file = Some(render_steps(
                &set,
                file.file_name(),
                self.config.steps_module(),
                self.config.base_url(),
                self.generated_at,
            ));
        }

        migration.rewritten = rewritten.code;
        migration.report = report;
        Ok(migration)
    }

    fn write_reports(&self, result: &MigrationResult) -> Result<Vec<(String, Vec<u8>)>> {
        let mut written = Vec::new();
        for format in self.config.report_formats() {
            match format.as_str() {
                "csv" => {
                    let rows: Vec<&ReportRow> = result.rows().collect();
                    written.push((report::CSV_REPORT.to_string(), report::to_csv(&rows)?.into_bytes()));
                }
                "json" => {
                    let json = report::to_json(result, self.generated_at)?;
                    written.push((report::JSON_REPORT.to_string(), json.into_bytes()));
                }
                other => {
                    return Err(MigrateError::InvalidConfigValueError {
                        field: "output.report_formats".to_string(),
                        value: other.to_string(),
                        reason: format!("Valid formats: {}", report::REPORT_FORMATS.join(", ")),
                    })
                }
            }
        }
        Ok(written)
    }
}

/// `login`, `login_2`, ... so two inputs never write the same output.
fn unique_stem(stem: String, used: &mut HashSet<String>) -> String {
    if used.insert(stem.clone()) {
        return stem;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", stem, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for MigratePipeline<S, C> {
    async fn extract(&self) -> Result<Vec<SourceFile>> {
        let mut sources = Vec::new();
        for path in self.config.input_files() {
            tracing::debug!("Reading {}", path);
            let data = self.source.read_file(path).await?;
            let content = String::from_utf8(data).map_err(|e| MigrateError::ValidationError {
                message: format!("{} is not valid UTF-8: {}", path, e),
            })?;
            sources.push(SourceFile::new(path.clone(), content));
        }
        Ok(sources)
    }

    async fn transform(&self, sources: Vec<SourceFile>) -> Result<MigrationResult> {
        let mut result = MigrationResult::default();
        let mut used = HashSet::new();

        for file in &sources {
            let stem = unique_stem(file.stem(), &mut used);
            match self.migrate_file(file, &stem) {
                Ok(migration) => {
                    tracing::info!(
                        "✅ {} -> {} ({} rewritten, {} renamed, {} unsupported)",
                        file.path,
                        migration.spec_path(),
                        migration.count(ReportStatus::Rewritten),
                        migration.count(ReportStatus::Renamed),
                        migration.count(ReportStatus::Unsupported)
                    );
                    result.files.push(migration);
                }
                // 單一檔案失敗不影響其他檔案
                Err(e @ (MigrateError::LexError { .. } | MigrateError::ProcessingError { .. })) => {
                    tracing::warn!("⚠️ Skipping {}: {}", file.path, e);
                    let line = match &e {
                        MigrateError::LexError { line, .. } => *line,
                        _ => 0,
                    };
                    result.failures.push(ReportRow {
                        file: file.path.clone(),
                        line,
                        family: "file".to_string(),
                        original: String::new(),
                        replacement: String::new(),
                        status: ReportStatus::Skipped,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if result.files.is_empty() && !sources.is_empty() {
            return Err(MigrateError::ProcessingError {
                message: format!("none of the {} input scripts could be migrated", sources.len()),
            });
        }
        Ok(result)
    }

    async fn load(&self, result: MigrationResult) -> Result<String> {
        let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
        for migration in &result.files {
            for (path, contents) in migration.outputs() {
                entries.push((path, contents.as_bytes().to_vec()));
            }
        }
        entries.extend(self.write_reports(&result)?);

        for (path, data) in &entries {
            tracing::debug!("Writing {} ({} bytes)", path, data.len());
            self.target.write_file(path, data).await?;
        }

        if self.config.archive_enabled() {
            let zip_data = report::bundle(&entries)?;
            tracing::debug!("Writing ZIP bundle ({} bytes) to storage", zip_data.len());
            self.target.write_file(report::BUNDLE, &zip_data).await?;
            return Ok(format!("{}/{}", self.config.output_path(), report::BUNDLE));
        }

        Ok(self.config.output_path().to_string())
    }
}
