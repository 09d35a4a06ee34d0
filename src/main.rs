use anyhow::Context;
use lotledger::orchestration::enrich::{build_directory, load_overrides};
use lotledger::report::write_reports;
use lotledger::{
    init_db, AppError, Compiler, Config, LedgerFileLoader, MatchingMode, MetadataEnricher,
    MetadataMode, MetadataSource, Repository, SymbolLookupSource,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let loader = LedgerFileLoader::new(&config.excluded_instruments);
    let ledger = loader
        .load_path(&config.ledger_path)
        .await
        .map_err(AppError::from)?;

    let pool = init_db(&config.database_path)
        .await
        .with_context(|| format!("Failed to open metadata cache {}", config.database_path))?;
    let repo = Arc::new(Repository::new(pool));

    match config.metadata_mode {
        MetadataMode::Online => {
            let source: Arc<dyn MetadataSource> =
                Arc::new(SymbolLookupSource::new(config.symbol_lookup_url.clone()));
            let enricher = MetadataEnricher::new(source, repo.clone(), config.lookup_delay());
            enricher
                .ensure_metadata(ledger.transactions.iter().map(|t| &t.instrument))
                .await
                .map_err(AppError::from)?;
        }
        MetadataMode::CacheOnly => {
            tracing::info!("Metadata lookups disabled, using cached entries only");
        }
    }

    let overrides = match &config.instrument_overrides_path {
        Some(path) => load_overrides(path).await.map_err(AppError::from)?,
        None => Vec::new(),
    };
    let directory = build_directory(&repo, &ledger.statement_names, overrides)
        .await
        .map_err(AppError::from)?;

    let compiler = Compiler::fifo(config.holding_policy());
    let mut run = match config.matching_mode {
        MatchingMode::Sequential => compiler.compile(&ledger.transactions),
        MatchingMode::Parallel => compiler
            .compile_parallel(ledger.transactions)
            .await
            .map_err(AppError::from)?,
    };
    // Statement rows rejected while loading come first
    let mut rejected = ledger.rejected;
    rejected.append(&mut run.rejected);
    run.rejected = rejected;

    let window = config.reporting_window;
    let files = write_reports(&config.report_dir, &run, &window, &directory)
        .map_err(AppError::from)?;

    let totals = run.totals(&window);
    let under_matched = run.under_matched().count();
    tracing::info!(
        window = %window,
        ltcg = %totals.long_term,
        stcg = %totals.short_term,
        total = %totals.total(),
        rejected = run.rejected.len(),
        failed_instruments = run.failed_instruments.len(),
        under_matched,
        summary = %files.summary.display(),
        rejected_report = %files.rejected.display(),
        "Capital gains computed"
    );

    println!("Period {}", window);
    println!("Total capital gains: {}", totals.total().to_canonical_string());
    println!("LTCG: {}", totals.long_term.to_canonical_string());
    println!("STCG: {}", totals.short_term.to_canonical_string());

    Ok(())
}
