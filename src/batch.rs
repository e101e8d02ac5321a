use std::ops::RangeInclusive;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::resolver::{self, ResolvePrice};
use crate::store::{self, Row, Sheet};

/// Jittered pause between consecutive rows that hit the network.
const ROW_DELAY_MS: RangeInclusive<u64> = 500..=2_000;

pub struct BatchOptions {
    /// Cap on rows visited this run; None visits every row.
    pub limit: Option<usize>,
    pub row_delay_ms: RangeInclusive<u64>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { limit: None, row_delay_ms: ROW_DELAY_MS }
    }
}

/// Terminal state of one visited row.
enum RowOutcome {
    AlreadyProcessed,
    InvalidName,
    Found(f64),
    NotFound,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub updated: usize,
    pub not_found: usize,
    pub invalid_name: usize,
    pub already_processed: usize,
    pub failed: usize,
    /// Whether the final snapshot reached the output file.
    pub persisted: bool,
}

impl Summary {
    pub fn print(&self) {
        println!(
            "\nSummary: {} updated, {} not found ({} invalid name(s)), {} already processed, {} failed",
            self.updated,
            self.not_found + self.invalid_name,
            self.invalid_name,
            self.already_processed,
            self.failed,
        );
    }
}

/// Visit rows in sheet order, resolve each pending one and persist after
/// every update. Never fails as a whole: a row that errors is counted and
/// logged, and the loop moves on.
pub async fn run(
    sheet: &mut Sheet,
    resolver: &dyn ResolvePrice,
    output: &Path,
    opts: BatchOptions,
) -> Summary {
    let total = sheet.rows.len();
    let visit = opts.limit.map_or(total, |n| n.min(total));
    let mut summary = Summary::default();

    let bar = ProgressBar::new(visit as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} (eta {eta})")
    {
        bar.set_style(style.progress_chars("#>-"));
    }

    for i in 0..visit {
        let id = sheet.rows[i].id.clone();
        let name = sheet.rows[i].name.clone();
        info!("row {}/{}: {}", i + 1, total, name);

        match process_row(&sheet.rows[i], resolver).await {
            Ok(RowOutcome::AlreadyProcessed) => {
                info!("row {} already priced at {:.2}, skipping", id, sheet.rows[i].price.unwrap_or_default());
                summary.already_processed += 1;
            }
            Ok(RowOutcome::InvalidName) => {
                warn!("row {} has no searchable name: '{}'", id, name);
                summary.invalid_name += 1;
            }
            Ok(RowOutcome::Found(price)) => {
                sheet.rows[i].price = Some(price);
                summary.updated += 1;
                persist(output, sheet);
                resolver::jitter_sleep(opts.row_delay_ms.clone()).await;
            }
            Ok(RowOutcome::NotFound) => {
                info!("no price found for '{}'", name);
                summary.not_found += 1;
                resolver::jitter_sleep(opts.row_delay_ms.clone()).await;
            }
            Err(e) => {
                warn!("row {} failed: {}", id, e);
                summary.failed += 1;
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    // Final snapshot; also covers runs that updated nothing and runs cut
    // short by the row cap, so the output file always exists and is whole.
    summary.persisted = persist(output, sheet);
    summary
}

async fn process_row(row: &Row, resolver: &dyn ResolvePrice) -> anyhow::Result<RowOutcome> {
    if row.checkpointed {
        return Ok(RowOutcome::AlreadyProcessed);
    }
    if !resolver::usable_name(&resolver::normalize_name(&row.name)) {
        return Ok(RowOutcome::InvalidName);
    }
    Ok(match resolver.resolve(&row.name).await? {
        Some(price) => RowOutcome::Found(price),
        None => RowOutcome::NotFound,
    })
}

/// A failed write only warns: the previous snapshot on disk stays intact
/// and the next update retries. Returns whether the write landed.
fn persist(output: &Path, sheet: &Sheet) -> bool {
    match store::save(output, sheet) {
        Ok(()) => true,
        Err(e) => {
            warn!("could not persist progress to {}: {}", output.display(), e);
            false
        }
    }
}

// ── Tests ──
