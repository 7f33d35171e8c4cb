use clap::Parser;
use postventa_import::config::cli::{Cli, Command};
use postventa_import::config::ConfigOverrides;
use postventa_import::domain::ports::RecordStore;
use postventa_import::utils::error::ErrorSeverity;
use postventa_import::utils::logger;
use postventa_import::{
    ImportConfig, ImportEngine, ImportError, ImportTarget, LocalStorage, LoggingObserver,
    MemoryStore, RestStore, Result, RunState,
};
use tokio_util::sync::CancellationToken;

const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logger::init_logger(logger::LogFormat::from_json_flag(cli.log_json), cli.verbose);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Stop requested; finishing the current batch");
            on_signal.cancel();
        }
    });

    let code = match run(cli, &cancel).await {
        Ok(code) => code,
        Err(e) => exit_code_for(&e),
    };
    std::process::exit(code);
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<i32> {
    tracing::info!("📁 Loading configuration from: {}", cli.config.display());
    let mut config = ImportConfig::from_file_or_default(&cli.config)?;
    config.apply_overrides(&ConfigOverrides::from(&cli.overrides));
    config.validate_pipeline()?;

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    match cli.command {
        Command::Targets => {
            for target in config.targets() {
                let key = target
                    .natural_key
                    .as_ref()
                    .map(|k| k.fields().join(", "))
                    .unwrap_or_else(|| "-".to_string());
                println!("{} → {}", target.name, target.table);
                println!("    required: {}", target.required_columns.join(", "));
                println!("    key:      {}", key);
                println!("    columns:  {}", target.columns.len());
            }
            Ok(0)
        }
        Command::Import {
            file,
            target,
            dry_run,
        } => {
            let target = config.target(&target)?;
            let file = file.to_string_lossy().into_owned();
            if dry_run {
                tracing::info!("🔍 DRY RUN MODE - the store will not be touched");
                let engine = build_engine(&config, MemoryStore::new(), cli.monitor)?;
                return dry_run_import(&engine, &file, &target, cancel).await;
            }
            let engine = build_engine(&config, connect(&config)?, cli.monitor)?;
            import(&engine, &file, &target, cancel).await
        }
        Command::Purge { target, yes } => {
            let target = config.target(&target)?;
            if !yes {
                eprintln!(
                    "⚠️ This deletes every row of '{}'{}. Re-run with --yes to confirm.",
                    target.table,
                    if target.dependents.is_empty() {
                        String::new()
                    } else {
                        format!(" and of {}", target.dependents.join(", "))
                    }
                );
                return Ok(1);
            }
            let engine = build_engine(&config, connect(&config)?, cli.monitor)?;
            let reports = engine.purge(&target, cancel, &mut LoggingObserver::default()).await?;
            for report in &reports {
                println!(
                    "🗑️ {}: {} deleted, {} remaining",
                    report.table, report.deleted, report.remaining
                );
            }
            if cancel.is_cancelled() {
                return Ok(EXIT_CANCELLED);
            }
            Ok(if reports.iter().any(|r| r.remaining > 0) { 2 } else { 0 })
        }
        Command::Count { target } => {
            let target = config.target(&target)?;
            let engine = build_engine(&config, connect(&config)?, cli.monitor)?;
            println!("{}: {}", target.table, engine.count(&target).await?);
            Ok(0)
        }
    }
}

fn connect(config: &ImportConfig) -> Result<RestStore> {
    config.validate_store()?;
    RestStore::from_config(&config.store)
}

fn build_engine<R: RecordStore>(
    config: &ImportConfig,
    store: R,
    monitor: bool,
) -> Result<ImportEngine<LocalStorage, R>> {
    Ok(ImportEngine::new_with_monitoring(
        LocalStorage::default(),
        store,
        config.import_settings()?,
        config.purge_settings(),
        monitor,
    ))
}

async fn import<R: RecordStore>(
    engine: &ImportEngine<LocalStorage, R>,
    file: &str,
    target: &ImportTarget,
    cancel: &CancellationToken,
) -> Result<i32> {
    let mut observer = LoggingObserver::default();
    let mut rows = engine.load_file(file, target, cancel, &mut observer).await?;
    let summary = engine.commit(&mut rows, target, cancel, &mut observer).await?;

    let stats = summary.stats;
    println!("📊 Import {} into '{}'", summary.state, summary.table);
    println!("   ✅ imported:   {}", stats.success);
    println!("   ❌ failed:     {}", stats.failed);
    println!("   🔄 duplicates: {}", stats.duplicates);
    println!("   ⏱️ elapsed:    {:.1}s", stats.elapsed_seconds);
    if !rows.is_empty() {
        println!("   📦 {} rows kept in buffer, nothing was imported", rows.len());
    }

    Ok(match summary.state {
        RunState::Stopped => EXIT_CANCELLED,
        _ if stats.failed > 0 => 2,
        _ => 0,
    })
}

async fn dry_run_import<R: RecordStore>(
    engine: &ImportEngine<LocalStorage, R>,
    file: &str,
    target: &ImportTarget,
    cancel: &CancellationToken,
) -> Result<i32> {
    let rows = engine
        .load_file(file, target, cancel, &mut LoggingObserver::default())
        .await?;
    let preview = engine.preview(&rows, target, 5);

    println!("📊 {} rows would be imported into '{}'", rows.len(), target.table);
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(0)
}

fn exit_code_for(e: &ImportError) -> i32 {
    tracing::error!(
        "❌ Import failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    if matches!(e, ImportError::Cancelled) {
        return EXIT_CANCELLED;
    }
    // 根據錯誤嚴重程度決定退出碼
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}
