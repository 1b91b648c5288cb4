// Rescore entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open database
// 4. Load advancement tables
// 5. Build the event source and read the game list
// 6. Rescore every game
// 7. Print the run totals

use std::sync::Arc;

use anyhow::Context;
use rescore_app::config;
use rescore_app::db;
use rescore_app::processor::Processor;
use rescore_app::report::ReportWriter;
use rescore_app::source;
use rescore_app::tables;
use rescore_core::GameAnalyzer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("rescore starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: source={:?}, seed={}, output={}",
        config.source.kind, config.advancement.seed, config.output.dir
    );

    // 3. Open database
    let db = db::Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    // 4. Load advancement tables. A table without a default row stops the
    // run before any game is touched.
    let tables = tables::load_tables(&config.advancement)
        .context("failed to load advancement tables")?;
    let analyzer = GameAnalyzer::new(config.advancement.analyzer_config(), Arc::new(tables));

    // 5. Event source and game list
    let events = source::from_config(&config.source).context("failed to open event source")?;
    let game_ids = source::load_game_list(&config.games.list_path)
        .context("failed to read game list")?;
    info!("{} games to rescore", game_ids.len());

    // 6. Rescore
    let reports = ReportWriter::new(&config.output.dir)?;
    let processor = Processor::new(
        Arc::from(events),
        analyzer,
        Arc::new(db),
        reports,
        config.games.max_concurrent,
    );
    let run = processor.run(&game_ids).await?;

    // 7. Totals
    println!(
        "rescored {} games ({} invalid, {} failed): {} new strikeouts, {} results reversed",
        run.rescored, run.invalid, run.failed, run.new_strikeouts, run.reversed
    );
    Ok(())
}

/// Default filter when `RUST_LOG` is unset: both rescore crates at info,
/// everything else at warn.
const DEFAULT_LOG_FILTER: &str = "rescore_core=info,rescore_app=info,warn";

/// Append to `logs/rescore.log` so the terminal only shows the final totals
/// and earlier runs stay readable in the same file.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("rescore.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
