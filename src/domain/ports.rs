use crate::domain::model::{MigrationResult, SourceFile};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_files(&self) -> &[String];
    fn output_path(&self) -> &str;
    fn rename_enabled(&self) -> bool;
    fn rewrite_enabled(&self) -> bool;
    fn scenarios_enabled(&self) -> bool;
    fn feature_tag(&self) -> &str;
    fn base_url(&self) -> Option<&str>;
    fn steps_module(&self) -> &str;
    fn page_object(&self) -> &str;
    fn annotate_unsupported(&self) -> bool;
    fn rename_exclude(&self) -> &[String];
    /// Names shorter than this count as too short
    fn min_name_length(&self) -> usize;
    fn sleep_helpers(&self) -> &[String];
    fn report_formats(&self) -> &[String];
    fn archive_enabled(&self) -> bool;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<SourceFile>>;
    async fn transform(&self, sources: Vec<SourceFile>) -> Result<MigrationResult>;
    async fn load(&self, result: MigrationResult) -> Result<String>;
}
