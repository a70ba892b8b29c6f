use bdd_migrate::core::{ConfigProvider, ReportStatus};
use bdd_migrate::utils::{logger, validation::Validate};
use bdd_migrate::{LocalStorage, MigratePipeline, MigrationEngine, TomlConfig};
use clap::Parser;

#[derive(Parser)]
#[command(name = "toml-migrate")]
#[command(about = "Browser test migration driven by a TOML configuration")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "migrate.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the archive setting from config
    #[arg(long)]
    archive: Option<bool>,

    /// Dry run - show what would be migrated without writing files
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 載入 TOML 配置
    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    logger::init_logger(config.log_format().unwrap_or("compact"), args.verbose);

    tracing::info!("🚀 Starting TOML-based migration");
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 應用命令列覆蓋設定
    if let Some(archive) = args.archive {
        config.output.archive = archive;
        tracing::info!("🔧 Archive overridden to: {}", archive);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");

    display_config_summary(&config, &args);

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 Stage timing enabled");
    }

    let source = LocalStorage::new(config.input_base_dir().to_string());
    let target = LocalStorage::new(config.output_path().to_string());
    let pipeline = MigratePipeline::new(source, target, config);
    let engine = MigrationEngine::new_with_monitoring(pipeline, monitor_enabled);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No files will be written");
        match engine.dry_run().await {
            Ok(result) => {
                println!("🔍 Dry Run Analysis:");
                for migration in &result.files {
                    println!(
                        "  {} -> {} ({} rewritten, {} renamed, {} unsupported, {} scenarios)",
                        migration.path,
                        migration.spec_path(),
                        migration.count(ReportStatus::Rewritten),
                        migration.count(ReportStatus::Renamed),
                        migration.count(ReportStatus::Unsupported),
                        migration.scenarios
                    );
                }
                for failure in &result.failures {
                    println!("  ⚠️ {} skipped: {}", failure.file, failure.message);
                }
                println!();
                println!("✅ Dry run analysis complete. Use --verbose for more details.");
            }
            Err(e) => exit_with(e),
        }
        return Ok(());
    }

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Migration completed successfully!");
            println!("✅ Migration completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => exit_with(e),
    }

    Ok(())
}

fn exit_with(e: bdd_migrate::MigrateError) {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Migration failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    let exit_code = e.exit_code();
    if exit_code > 0 {
        std::process::exit(exit_code);
    }
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!(
        "  Project: {} {}",
        config.project.name,
        config.project.version.as_deref().unwrap_or("")
    );
    println!("  Inputs: {} scripts from {}", config.input_files().len(), config.input_base_dir());
    println!("  Output: {}", config.output_path());
    println!(
        "  Passes: rename={} rewrite={} scenarios={}",
        config.rename_enabled(),
        config.rewrite_enabled(),
        config.scenarios_enabled()
    );
    println!("  Feature tag: {}", config.feature_tag());
    if let Some(base_url) = config.base_url() {
        println!("  Base URL: {}", base_url);
    }
    println!("  Reports: {}", config.report_formats().join(", "));
    if config.archive_enabled() {
        println!("  Archive: migration_bundle.zip");
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}
