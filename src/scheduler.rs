use chrono::Local;
use tokio_util::sync::CancellationToken;

use crate::analysis;
use crate::error::CycleError;
use crate::market_data::MarketFetcher;
use crate::market_table::MarketTable;
use crate::report;
use crate::spreadsheet::{SheetState, SheetWriter};
use crate::storage_utils::AppConfig;

/// How a single cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The fetch came back empty; nothing downstream ran.
    NoData,
    /// A stage failed before anything was persisted.
    Aborted(CycleError),
    /// `report` is the summary that was printed for this cycle.
    Completed {
        rows: usize,
        persisted: bool,
        report: String,
    },
}

/// Runs fetch, transform, analyze, report and persist in sequence, once per interval.
pub struct Poller {
    config: AppConfig,
    fetcher: MarketFetcher,
    writer: SheetWriter,
}

impl Poller {
    pub fn new(config: AppConfig) -> Result<Self, CycleError> {
        let fetcher = MarketFetcher::new(config.api.clone())?;
        let writer = SheetWriter::new(config.workbook.clone(), &config.api.vs_currency);
        Ok(Self {
            config,
            fetcher,
            writer,
        })
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        let started = Local::now();
        tracing::info!(at = %started.format("%Y-%m-%d %H:%M:%S"), "fetching live data");

        let raw = self.fetcher.fetch().await;
        if raw.is_empty() {
            tracing::info!("no data to update");
            return CycleOutcome::NoData;
        }

        let table = match MarketTable::from_raw(&raw) {
            Ok(table) => table,
            Err(e) => {
                tracing::error!(error = %e, "malformed market data, skipping cycle");
                return CycleOutcome::Aborted(e);
            }
        };

        let report = match analysis::summarize(&table, self.config.top_n) {
            Ok(summary) => report::render(&summary, &self.config.api.vs_currency, started),
            Err(e) => return CycleOutcome::Aborted(e),
        };
        println!("{}", report);

        let rows = table.len();
        let sheet = &self.config.workbook.sheet_name;
        let persisted = match self.writer.persist(table).await {
            Ok(prior) => {
                match prior {
                    SheetState::Absent => tracing::info!(sheet = %sheet, "sheet does not exist, created it"),
                    SheetState::Empty | SheetState::Populated { .. } => {
                        tracing::info!(sheet = %sheet, ?prior, "sheet exists, replaced its data")
                    }
                }
                tracing::info!(path = %self.writer.path().display(), rows, "updated workbook");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to update workbook");
                false
            }
        };

        CycleOutcome::Completed {
            rows,
            persisted,
            report,
        }
    }

    /// Polls until `cancel` fires. Cancellation is only observed between cycles, so a
    /// token cancelled up front still gets exactly one cycle.
    pub async fn run(&self, cancel: CancellationToken) {
        let interval = self.config.poll_interval();
        loop {
            self.run_cycle().await;

            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("poller stopped");
                    break;
                }
                () = tokio::time::sleep(interval) => {}
            }
        }
    }
}
