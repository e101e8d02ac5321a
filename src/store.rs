use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

pub const REQUIRED_COLUMNS: [&str; 3] = ["id", "name", "price"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sheet is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub name: String,
    pub price: Option<f64>,
    /// Cells of the non-required columns, in sheet order.
    pub extra: Vec<String>,
    /// Set when a prior run already priced this row; never persisted.
    pub checkpointed: bool,
}

impl Row {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price: None,
            extra: Vec::new(),
            checkpointed: false,
        }
    }
}

/// A product sheet: the original column layout plus one Row per record.
/// Unrecognized columns ride along untouched so the output stays a drop-in
/// replacement for the input.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub columns: Vec<String>,
    id_idx: usize,
    name_idx: usize,
    price_idx: usize,
    pub rows: Vec<Row>,
}

impl Sheet {
    /// Sheet with the bare required columns; layout-preserving loads come
    /// from [`load`].
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            columns: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            id_idx: 0,
            name_idx: 1,
            price_idx: 2,
            rows,
        }
    }

    fn record(&self, row: &Row) -> Vec<String> {
        let mut extra = row.extra.iter();
        self.columns
            .iter()
            .enumerate()
            .map(|(ix, _)| {
                if ix == self.id_idx {
                    row.id.clone()
                } else if ix == self.name_idx {
                    row.name.clone()
                } else if ix == self.price_idx {
                    row.price.map(|p| format!("{p:.2}")).unwrap_or_default()
                } else {
                    extra.next().cloned().unwrap_or_default()
                }
            })
            .collect()
    }
}

/// Load a product sheet, matching the required columns case-insensitively
/// and keeping every other column as passthrough data.
pub fn load(path: &Path) -> Result<Sheet, StoreError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let find = |want: &str| columns.iter().position(|c| c.eq_ignore_ascii_case(want));
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| find(c).is_none())
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(StoreError::MissingColumns(missing));
    }
    let id_idx = find("id").unwrap();
    let name_idx = find("name").unwrap();
    let price_idx = find("price").unwrap();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |ix: usize| record.get(ix).unwrap_or("").trim();
        let extra = (0..columns.len())
            .filter(|ix| *ix != id_idx && *ix != name_idx && *ix != price_idx)
            .map(|ix| cell(ix).to_string())
            .collect();
        rows.push(Row {
            id: cell(id_idx).to_string(),
            name: cell(name_idx).to_string(),
            price: parse_price(cell(price_idx)),
            extra,
            checkpointed: false,
        });
    }

    debug!("loaded {} row(s) from {}", rows.len(), path.display());
    Ok(Sheet { columns, id_idx, name_idx, price_idx, rows })
}

/// Write the sheet to a sibling temp file, then rename over the target, so
/// readers only ever see a complete snapshot.
pub fn save(path: &Path, sheet: &Sheet) -> Result<(), StoreError> {
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp)?;
        writer.write_record(&sheet.columns)?;
        for row in &sheet.rows {
            writer.write_record(sheet.record(row))?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    debug!("saved {} row(s) to {}", sheet.rows.len(), path.display());
    Ok(())
}

/// Price cells written by hand come in local notation too; anything that
/// does not parse to a positive finite number counts as unpriced.
fn parse_price(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>()
        .ok()
        .or_else(|| cell.replace(',', ".").parse::<f64>().ok())
        .filter(|p| p.is_finite() && *p > 0.0)
}

// ── Tests ──
