use bdd_migrate::core::{ConfigProvider, MigrationResult, ReportStatus};
use bdd_migrate::utils::{logger, validation::Validate};
use bdd_migrate::{CliConfig, LocalStorage, MigratePipeline, MigrationEngine, TomlConfig};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 有 --config 時以 TOML 為基礎，旗標覆蓋
    let toml = match &cli.config {
        Some(path) => match TomlConfig::from_file(path) {
            Ok(mut config) => {
                config.apply_cli_overrides(&cli);
                Some(config)
            }
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(e.exit_code().max(1));
            }
        },
        None => None,
    };

    let log_format = match (&toml, cli.log_format.as_str()) {
        (Some(config), "compact") => config.log_format().unwrap_or("compact").to_string(),
        _ => cli.log_format.clone(),
    };
    logger::init_logger(&log_format, cli.verbose);

    tracing::info!("Starting bdd-migrate CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let exit_code = match toml {
        Some(config) => {
            let monitor = cli.monitor || config.monitoring_enabled();
            let source = LocalStorage::new(config.input_base_dir().to_string());
            run(config, source, cli.dry_run, monitor).await
        }
        None => {
            let (dry_run, monitor) = (cli.dry_run, cli.monitor);
            run(cli, LocalStorage::new(".".to_string()), dry_run, monitor).await
        }
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

async fn run<C: ConfigProvider + Validate>(
    config: C,
    source: LocalStorage,
    dry_run: bool,
    monitor: bool,
) -> i32 {
    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        return 1;
    }

    if monitor {
        tracing::info!("🔍 Stage timing enabled");
    }

    let target = LocalStorage::new(config.output_path().to_string());
    let pipeline = MigratePipeline::new(source, target, config);
    let engine = MigrationEngine::new_with_monitoring(pipeline, monitor);

    let outcome = if dry_run {
        engine.dry_run().await.map(|result| {
            print_dry_run(&result);
            String::new()
        })
    } else {
        engine.run().await
    };

    match outcome {
        Ok(output_path) => {
            if !dry_run {
                tracing::info!("✅ Migration completed successfully!");
                println!("✅ Migration completed successfully!");
                println!("📁 Output saved to: {}", output_path);
            }
            0
        }
        Err(e) => {
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

            e.exit_code()
        }
    }
}

fn print_dry_run(result: &MigrationResult) {
    println!("🔍 Dry Run Analysis:");
    for migration in &result.files {
        println!();
        println!("📄 {}", migration.path);
        for (path, _) in migration.outputs() {
            println!("  -> {}", path);
        }
        println!(
            "  {} rewritten, {} renamed, {} unsupported, {} warnings",
            migration.count(ReportStatus::Rewritten),
            migration.count(ReportStatus::Renamed),
            migration.count(ReportStatus::Unsupported),
            migration.count(ReportStatus::Warning)
        );
        if migration.scenarios > 0 {
            println!(
                "  {} scenarios, {} step definitions",
                migration.scenarios, migration.step_definitions
            );
        }
    }
    for failure in &result.failures {
        println!();
        println!("⚠️ {} skipped: {}", failure.file, failure.message);
    }
    println!();
    println!("✅ Dry run complete. Nothing was written.");
}
