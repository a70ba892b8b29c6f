use crate::core::Pipeline;
use crate::domain::model::{MigrationResult, ReportStatus};
use crate::utils::error::Result;
use std::time::Instant;

pub struct MigrationEngine<P: Pipeline> {
    pipeline: P,
    monitor: bool,
}

impl<P: Pipeline> MigrationEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            monitor: false,
        }
    }

    /// Logs the duration of every stage.
    pub fn new_with_monitoring(pipeline: P, monitor: bool) -> Self {
        Self { pipeline, monitor }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting migration...");

        let result = self.migrate().await?;

        let started = Instant::now();
        tracing::info!("Writing migrated files...");
        let output_path = self.pipeline.load(result).await?;
        self.stage_done("load", started);
        tracing::info!("📁 Output saved to: {}", output_path);

        Ok(output_path)
    }

    /// Extract and transform only; nothing is written.
    pub async fn dry_run(&self) -> Result<MigrationResult> {
        tracing::info!("🔍 Dry run, no files will be written");
        self.migrate().await
    }

    async fn migrate(&self) -> Result<MigrationResult> {
        let started = Instant::now();
        tracing::info!("Reading input scripts...");
        let sources = self.pipeline.extract().await?;
        tracing::info!("Read {} scripts", sources.len());
        self.stage_done("extract", started);

        let started = Instant::now();
        tracing::info!("Migrating scripts...");
        let result = self.pipeline.transform(sources).await?;
        tracing::info!(
            "Migrated {} scripts: {} rewritten, {} renamed, {} unsupported, {} skipped",
            result.files.len(),
            result.count(ReportStatus::Rewritten),
            result.count(ReportStatus::Renamed),
            result.count(ReportStatus::Unsupported),
            result.count(ReportStatus::Skipped)
        );
        self.stage_done("transform", started);

        Ok(result)
    }

    fn stage_done(&self, stage: &str, started: Instant) {
        if self.monitor {
            tracing::info!("⏱️ {} took {:?}", stage, started.elapsed());
        }
    }
}
