use std::collections::HashMap;

use tracing::info;

use crate::store::Sheet;

pub struct Reconciled {
    pub sheet: Sheet,
    /// True when the prior output held at least one usable price.
    pub resumed: bool,
    /// Rows whose price was carried over and marked already processed.
    pub carried: usize,
}

/// Fold a prior run's output back into a freshly loaded sheet.
///
/// Rows whose id appears in the prior output with a positive price take that
/// price and are marked processed, so an interrupted batch picks up where it
/// stopped instead of re-querying the web for work already done. A prior
/// sheet with no usable prices leaves the fresh sheet untouched.
pub fn reconcile(mut fresh: Sheet, prior: Option<&Sheet>) -> Reconciled {
    let done: HashMap<&str, f64> = prior
        .map(|s| s.rows.as_slice())
        .unwrap_or_default()
        .iter()
        .filter(|r| !r.id.is_empty())
        .filter_map(|r| r.price.filter(|p| *p > 0.0).map(|p| (r.id.as_str(), p)))
        .collect();

    if done.is_empty() {
        return Reconciled { sheet: fresh, resumed: false, carried: 0 };
    }

    let mut carried = 0;
    for row in &mut fresh.rows {
        if let Some(price) = done.get(row.id.as_str()) {
            row.price = Some(*price);
            row.checkpointed = true;
            carried += 1;
        }
    }

    info!("resuming: {} row(s) already priced in prior output", carried);
    Reconciled { sheet: fresh, resumed: true, carried }
}

// ── Tests ──
