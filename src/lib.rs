pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod orchestration;
pub mod report;

pub use config::{Config, MatchingMode, MetadataMode};
pub use datasource::{
    DataSourceError, LedgerFileLoader, LoadedLedger, MetadataSource, MockMetadataSource,
    SymbolLookupSource,
};
pub use db::{init_db, Repository};
pub use domain::{
    Action, Decimal, GainAllocation, HoldingCategory, InstrumentDirectory, InstrumentId,
    InstrumentMetadata, SellResult, Transaction,
};
pub use engine::{
    Fifo, HoldingPolicy, LotMatcher, LotSelector, OpenLot, PeriodTotals, ReportingWindow,
};
pub use error::AppError;
pub use ledger::{Compiler, LedgerRun};
pub use orchestration::MetadataEnricher;
