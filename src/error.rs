use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("Ledger load failed: {0}")]
    Load(#[from] crate::datasource::LoadError),
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Metadata enrichment failed: {0}")]
    Enrichment(#[from] crate::orchestration::EnrichmentError),
    #[error("Compilation failed: {0}")]
    Compile(#[from] crate::ledger::CompileError),
    #[error("Report export failed: {0}")]
    Report(#[from] crate::report::ReportError),
    #[error("Invalid reporting window: {0}")]
    Window(#[from] crate::engine::WindowError),
}
