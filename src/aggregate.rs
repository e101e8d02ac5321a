/// Multiplier on the standard deviation; candidates further from the mean
/// than this band are treated as outliers.
const OUTLIER_BAND: f64 = 1.5;
/// Samples at or below this count are averaged as-is; the deviation filter
/// needs more data to be meaningful.
const MIN_FILTER_SAMPLES: usize = 3;

/// Collapse a multiset of price candidates into one representative value.
///
/// Small samples are averaged directly. Larger samples drop candidates more
/// than 1.5 standard deviations from the mean before averaging, so a single
/// wild page (a bulk listing, an unrelated product) cannot drag the result.
/// Returns None when there are no candidates at all.
pub fn aggregate(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }
    if prices.len() <= MIN_FILTER_SAMPLES {
        return Some(mean(prices));
    }

    let m = mean(prices);
    let variance = prices.iter().map(|p| (p - m) * (p - m)).sum::<f64>() / prices.len() as f64;
    let band = OUTLIER_BAND * variance.sqrt();

    let kept: Vec<f64> = prices.iter().copied().filter(|p| (p - m).abs() <= band).collect();
    if kept.is_empty() {
        // Guard only; with a 1.5 sigma band at least half the sample survives.
        return Some(m);
    }
    Some(mean(&kept))
}

fn mean(prices: &[f64]) -> f64 {
    prices.iter().sum::<f64>() / prices.len() as f64
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.unwrap();
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_is_none() {
        assert_eq!(aggregate(&[]), None);
    }

    #[test]
    fn single_candidate_passes_through() {
        assert_close(aggregate(&[10.0]), 10.0);
    }

    #[test]
    fn small_samples_are_plain_means() {
        assert_close(aggregate(&[10.0, 20.0]), 15.0);
        assert_close(aggregate(&[10.0, 20.0, 90.0]), 40.0);
    }

    #[test]
    fn outlier_is_dropped_from_larger_samples() {
        // mean 32.9, sigma ~43.56: only the 120.0 falls outside the band.
        assert_close(
            aggregate(&[10.0, 11.0, 12.0, 11.5, 120.0]),
            (10.0 + 11.0 + 12.0 + 11.5) / 4.0,
        );
    }

    #[test]
    fn high_spread_sample_filters_the_extreme() {
        // mean 33.375, sigma ~35.58: 95.0 deviates by ~61.6 > 1.5 sigma.
        assert_close(
            aggregate(&[12.5, 12.9, 13.1, 95.0]),
            (12.5 + 12.9 + 13.1) / 3.0,
        );
    }

    #[test]
    fn uniform_sample_is_unchanged() {
        assert_close(aggregate(&[5.0, 5.0, 5.0, 5.0, 5.0, 5.0]), 5.0);
    }

    #[test]
    fn order_does_not_matter() {
        let a = aggregate(&[12.5, 12.9, 13.1, 95.0]).unwrap();
        let b = aggregate(&[95.0, 13.1, 12.9, 12.5]).unwrap();
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn duplicates_weigh_in() {
        assert_close(aggregate(&[10.0, 10.0, 40.0]), 20.0);
    }
}
