use super::ReportError;
use crate::domain::{Decimal, InstrumentDirectory};
use crate::engine::{sells_in_window, OpenLot, ReportingWindow};
use crate::ledger::LedgerRun;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
struct AllocationRecord {
    instrument: String,
    name: String,
    isin: String,
    buy_date: String,
    sell_date: String,
    quantity: String,
    buy_price: String,
    sell_price: String,
    cost: String,
    proceeds: String,
    holding_days: i64,
    category: &'static str,
    gain: String,
}

#[derive(Debug, Serialize)]
struct SellRecord {
    instrument: String,
    name: String,
    isin: String,
    sell_date: String,
    quantity: String,
    price: String,
    matched_quantity: String,
    unmatched_quantity: String,
    ltcg: String,
    stcg: String,
    total_gain: String,
}

#[derive(Debug, Serialize)]
struct OpenLotRecord {
    instrument: String,
    name: String,
    isin: String,
    acquired: String,
    original_quantity: String,
    remaining_quantity: String,
    unit_cost: String,
    remaining_cost: String,
}

#[derive(Debug, Serialize)]
struct InstrumentTotalsRecord {
    instrument: String,
    name: String,
    isin: String,
    ltcg: String,
    stcg: String,
    total: String,
    allocations: usize,
}

#[derive(Debug, Serialize)]
struct RejectedRow {
    kind: &'static str,
    index: Option<usize>,
    instrument: String,
    txn_key: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct SummaryRecord {
    from: String,
    to: String,
    ltcg: String,
    stcg: String,
    total: String,
    allocations: usize,
    unmatched_sells: usize,
    unmatched_quantity: String,
}

fn dec(value: Decimal) -> String {
    value.to_canonical_string()
}

/// One row per allocation whose sell date falls in `window`.
pub fn write_allocations<W: Write>(
    writer: W,
    run: &LedgerRun,
    window: &ReportingWindow,
    directory: &InstrumentDirectory,
) -> Result<usize, ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut written = 0;
    for allocation in run
        .allocations
        .iter()
        .filter(|a| window.contains(a.sell_date))
    {
        wtr.serialize(AllocationRecord {
            instrument: allocation.instrument.to_string(),
            name: directory.name_for(&allocation.instrument),
            isin: directory.isin_for(&allocation.instrument),
            buy_date: allocation.buy_date.to_string(),
            sell_date: allocation.sell_date.to_string(),
            quantity: dec(allocation.matched_quantity),
            buy_price: dec(allocation.buy_unit_cost),
            sell_price: dec(allocation.sell_unit_price),
            cost: dec(allocation.cost_basis()),
            proceeds: dec(allocation.proceeds()),
            holding_days: allocation.holding_days,
            category: allocation.category.label(),
            gain: dec(allocation.gain),
        })?;
        written += 1;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(written)
}

/// One row per SELL dated in `window`, under-matched ones included.
pub fn write_sells<W: Write>(
    writer: W,
    run: &LedgerRun,
    window: &ReportingWindow,
    directory: &InstrumentDirectory,
) -> Result<usize, ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut written = 0;
    for sell in sells_in_window(&run.sells, window) {
        wtr.serialize(SellRecord {
            instrument: sell.instrument.to_string(),
            name: directory.name_for(&sell.instrument),
            isin: directory.isin_for(&sell.instrument),
            sell_date: sell.sell_date.to_string(),
            quantity: dec(sell.quantity),
            price: dec(sell.price),
            matched_quantity: dec(sell.matched_quantity),
            unmatched_quantity: dec(sell.unmatched_quantity),
            ltcg: dec(sell.long_term_gain),
            stcg: dec(sell.short_term_gain),
            total_gain: dec(sell.total_gain()),
        })?;
        written += 1;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(written)
}

/// Lots still held at the end of the history. Not window filtered.
pub fn write_open_lots<W: Write>(
    writer: W,
    open_lots: &[OpenLot],
    directory: &InstrumentDirectory,
) -> Result<usize, ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for lot in open_lots {
        wtr.serialize(OpenLotRecord {
            instrument: lot.instrument.to_string(),
            name: directory.name_for(&lot.instrument),
            isin: directory.isin_for(&lot.instrument),
            acquired: lot.acquired.to_string(),
            original_quantity: dec(lot.original_quantity),
            remaining_quantity: dec(lot.remaining_quantity),
            unit_cost: dec(lot.unit_cost),
            remaining_cost: dec(lot.remaining_cost()),
        })?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(open_lots.len())
}

/// Per-instrument LTCG/STCG for allocations in `window`, in instrument order.
pub fn write_instrument_totals<W: Write>(
    writer: W,
    run: &LedgerRun,
    window: &ReportingWindow,
    directory: &InstrumentDirectory,
) -> Result<usize, ReportError> {
    let by_instrument = run.totals_by_instrument(window);
    let mut wtr = csv::Writer::from_writer(writer);
    for (instrument, totals) in &by_instrument {
        wtr.serialize(InstrumentTotalsRecord {
            instrument: instrument.to_string(),
            name: directory.name_for(instrument),
            isin: directory.isin_for(instrument),
            ltcg: dec(totals.long_term),
            stcg: dec(totals.short_term),
            total: dec(totals.total()),
            allocations: totals.allocation_count,
        })?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(by_instrument.len())
}

/// Records refused before matching, then instruments whose replay failed.
pub fn write_rejected<W: Write>(writer: W, run: &LedgerRun) -> Result<usize, ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in &run.rejected {
        wtr.serialize(RejectedRow {
            kind: "record",
            index: Some(record.index),
            instrument: record
                .instrument
                .as_ref()
                .map(|i| i.to_string())
                .unwrap_or_default(),
            txn_key: record.txn_key.clone().unwrap_or_default(),
            reason: record.error.to_string(),
        })?;
    }
    for failed in &run.failed_instruments {
        wtr.serialize(RejectedRow {
            kind: "instrument",
            index: None,
            instrument: failed.instrument.to_string(),
            txn_key: String::new(),
            reason: failed.error.to_string(),
        })?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(run.rejected.len() + run.failed_instruments.len())
}

/// A single row with the window bounds and its totals.
pub fn write_summary<W: Write>(
    writer: W,
    run: &LedgerRun,
    window: &ReportingWindow,
) -> Result<(), ReportError> {
    let totals = run.totals(window);
    let (unmatched, residual) = crate::engine::unmatched_in_window(&run.sells, window);
    let bound = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.serialize(SummaryRecord {
        from: bound(window.start()),
        to: bound(window.end()),
        ltcg: dec(totals.long_term),
        stcg: dec(totals.short_term),
        total: dec(totals.total()),
        allocations: totals.allocation_count,
        unmatched_sells: unmatched.len(),
        unmatched_quantity: dec(residual),
    })?;
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Paths of the files written by [`write_reports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub allocations: PathBuf,
    pub sells: PathBuf,
    pub open_lots: PathBuf,
    pub instrument_totals: PathBuf,
    pub rejected: PathBuf,
    pub summary: PathBuf,
}

/// Write every report into `dir`, creating it if needed.
pub fn write_reports(
    dir: &Path,
    run: &LedgerRun,
    window: &ReportingWindow,
    directory: &InstrumentDirectory,
) -> Result<ReportFiles, ReportError> {
    std::fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let files = ReportFiles {
        allocations: dir.join("allocations.csv"),
        sells: dir.join("sells.csv"),
        open_lots: dir.join("open_lots.csv"),
        instrument_totals: dir.join("instrument_totals.csv"),
        rejected: dir.join("rejected.csv"),
        summary: dir.join("summary.csv"),
    };

    let allocations = write_allocations(create(&files.allocations)?, run, window, directory)?;
    let sells = write_sells(create(&files.sells)?, run, window, directory)?;
    let open_lots = write_open_lots(create(&files.open_lots)?, &run.open_lots, directory)?;
    let instruments =
        write_instrument_totals(create(&files.instrument_totals)?, run, window, directory)?;
    let rejected = write_rejected(create(&files.rejected)?, run)?;
    write_summary(create(&files.summary)?, run, window)?;

    info!(
        dir = %dir.display(),
        window = %window,
        allocations,
        sells,
        open_lots,
        instruments,
        rejected,
        "Reports written"
    );
    Ok(files)
}

fn create(path: &Path) -> Result<File, ReportError> {
    File::create(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        InstrumentId, InstrumentMetadata, RejectedRecord, Transaction, ValidationError,
    };
    use crate::engine::MatchError;
    use crate::ledger::{Compiler, FailedInstrument};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn sample_run() -> LedgerRun {
        let txns = vec![
            Transaction::buy("500209", date(2023, 1, 10), d("100"), d("10")),
            Transaction::buy("500209", date(2023, 6, 1), d("50"), d("12")),
            Transaction::sell("500209", date(2024, 2, 1), d("120"), d("15")),
            Transaction::sell("532540", date(2024, 3, 1), d("5"), d("2.50")),
        ];
        Compiler::default().compile(&txns)
    }

    fn directory() -> InstrumentDirectory {
        vec![InstrumentMetadata::new(
            InstrumentId::new("500209"),
            "INFY".to_string(),
            "INE009A01021".to_string(),
        )]
        .into_iter()
        .collect()
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>),
    {
        let mut buf = Vec::new();
        f(&mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_allocations_csv_content() {
        let run = sample_run();
        let out = render(|buf| {
            let n = write_allocations(buf, &run, &ReportingWindow::unbounded(), &directory())
                .unwrap();
            assert_eq!(n, 2);
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            "instrument,name,isin,buy_date,sell_date,quantity,buy_price,sell_price,cost,proceeds,holding_days,category,gain"
        );
        assert_eq!(
            lines[1],
            "500209,INFY,INE009A01021,2023-01-10,2024-02-01,100,10,15,1000,1500,387,LTCG,500"
        );
        assert_eq!(
            lines[2],
            "500209,INFY,INE009A01021,2023-06-01,2024-02-01,20,12,15,240,300,245,STCG,60"
        );
    }

    #[test]
    fn test_allocations_respect_window() {
        let run = sample_run();
        let window = ReportingWindow::financial_year(2024).unwrap();
        let out = render(|buf| {
            let n = write_allocations(buf, &run, &window, &directory()).unwrap();
            assert_eq!(n, 0);
        });
        assert_eq!(out.lines().count(), 0);
    }

    #[test]
    fn test_sells_csv_flags_residual() {
        let run = sample_run();
        let out = render(|buf| {
            write_sells(buf, &run, &ReportingWindow::unbounded(), &directory()).unwrap();
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            "500209,INFY,INE009A01021,2024-02-01,120,15,120,0,500,60,560"
        );
        assert_eq!(
            lines[2],
            "532540,532540,UNKNOWN,2024-03-01,5,2.5,0,5,0,0,0"
        );
    }

    #[test]
    fn test_open_lots_csv() {
        let run = sample_run();
        let out = render(|buf| {
            write_open_lots(buf, &run.open_lots, &directory()).unwrap();
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "500209,INFY,INE009A01021,2023-06-01,50,30,12,360");
    }

    #[test]
    fn test_summary_csv() {
        let run = sample_run();
        let window = ReportingWindow::financial_year(2023).unwrap();
        let out = render(|buf| write_summary(buf, &run, &window).unwrap());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            "from,to,ltcg,stcg,total,allocations,unmatched_sells,unmatched_quantity"
        );
        assert_eq!(lines[1], "2023-04-01,2024-03-31,500,60,560,2,1,5");
    }

    #[test]
    fn test_write_reports_creates_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let dir = temp_dir.path().join("out");
        let files = write_reports(
            &dir,
            &sample_run(),
            &ReportingWindow::unbounded(),
            &directory(),
        )
        .unwrap();

        for path in [
            &files.allocations,
            &files.sells,
            &files.open_lots,
            &files.instrument_totals,
            &files.rejected,
            &files.summary,
        ] {
            assert!(path.exists(), "missing {}", path.display());
        }
        let summary = std::fs::read_to_string(&files.summary).unwrap();
        assert!(summary.contains(",,500,60,560,2,1,5"));
    }

    #[test]
    fn test_instrument_totals_csv() {
        let txns = vec![
            Transaction::buy("500209", date(2023, 1, 10), d("100"), d("10")),
            Transaction::buy("532540", date(2023, 1, 1), d("2"), d("100")),
            Transaction::buy("500209", date(2023, 6, 1), d("50"), d("12")),
            Transaction::sell("500209", date(2024, 2, 1), d("120"), d("15")),
            Transaction::sell("532540", date(2023, 5, 1), d("2"), d("90")),
        ];
        let run = Compiler::default().compile(&txns);

        let out = render(|buf| {
            let n = write_instrument_totals(buf, &run, &ReportingWindow::unbounded(), &directory())
                .unwrap();
            assert_eq!(n, 2);
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "instrument,name,isin,ltcg,stcg,total,allocations");
        assert_eq!(lines[1], "500209,INFY,INE009A01021,500,60,560,2");
        assert_eq!(lines[2], "532540,532540,UNKNOWN,0,-20,-20,1");
    }

    #[test]
    fn test_rejected_csv_lists_records_and_instruments() {
        let mut run = sample_run();
        run.rejected.push(RejectedRecord::new(
            4,
            Some(InstrumentId::new("500209")),
            ValidationError::InvalidDate("31/13/2023".to_string()),
        ));
        run.failed_instruments.push(FailedInstrument {
            instrument: InstrumentId::new("BIG"),
            error: MatchError::Overflow {
                txn_key: "txn:abc".to_string(),
            },
        });

        let out = render(|buf| {
            assert_eq!(write_rejected(buf, &run).unwrap(), 2);
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "kind,index,instrument,txn_key,reason");
        assert!(lines[1].starts_with("record,4,500209,,"));
        assert!(lines[1].contains("31/13/2023"));
        assert!(lines[2].starts_with("instrument,,BIG,,"));
        assert!(lines[2].contains("txn:abc"));
    }
}
