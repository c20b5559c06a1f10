use crate::error::{FigureError, Result};

/// Element-wise sum. The result is as long as the shortest column.
pub fn sum(columns: &[&[f64]]) -> Vec<f64> {
    let len = columns.iter().map(|c| c.len()).min().unwrap_or(0);
    (0..len)
        .map(|i| columns.iter().map(|c| c[i]).sum())
        .collect()
}

pub fn scale(values: &[f64], factor: f64) -> Vec<f64> {
    values.iter().map(|v| v * factor).collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Base of every layer in a stack: zero for the first, then the running sum
/// of the layers below it.
pub fn cumulative(layers: &[&[f64]]) -> Vec<Vec<f64>> {
    let mut bases = Vec::with_capacity(layers.len());
    let mut running = match layers.first() {
        Some(first) => vec![0.0; first.len()],
        None => return bases,
    };
    for layer in layers {
        bases.push(running.clone());
        running = sum(&[running.as_slice(), *layer]);
    }
    bases
}

/// Empirical CDF: sample `i` of `n` (ascending) sits at `i / n`.
pub fn cdf(samples: &[f64]) -> Result<Vec<(f64, f64)>> {
    if samples.is_empty() {
        return Err(FigureError::Empty);
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len() as f64;
    Ok(sorted
        .into_iter()
        .enumerate()
        .map(|(i, x)| (x, i as f64 / n))
        .collect())
}

/// Decade-aligned range covering every positive value, suitable for a log
/// axis. Spans at least one decade.
pub fn log_bounds(values: &[f64]) -> (f64, f64) {
    let positive = values.iter().copied().filter(|v| *v > 0.0);
    let (min, max) = positive.fold((f64::INFINITY, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if max <= 0.0 {
        return (0.1, 1.0);
    }

    let lo = min.log10().floor();
    let mut hi = max.log10().ceil();
    if hi <= lo {
        hi = lo + 1.0;
    }
    (10f64.powi(lo as i32), 10f64.powi(hi as i32))
}

/// Size in bits of an optimal Bloom filter holding `n` elements at false
/// positive rate `fp_rate`, which must lie in `(0, 1)`.
pub fn bloom_filter_bits(n: u64, fp_rate: f64) -> Result<u64> {
    if !(fp_rate > 0.0 && fp_rate < 1.0) {
        return Err(FigureError::BadFpRate(fp_rate));
    }
    let ln2 = std::f64::consts::LN_2;
    Ok((-(n as f64) * fp_rate.ln() / (ln2 * ln2)).ceil() as u64)
}

#[test]
fn sum_is_element_wise() {
    let a = [1.0, 2.0, 3.0];
    let b = [10.0, 20.0, 30.0];
    let c = [0.5, 0.5, 0.5];
    assert_eq!(sum(&[&a[..], &b[..], &c[..]]), vec![11.5, 22.5, 33.5]);
}

#[test]
fn sum_truncates_to_shortest() {
    assert_eq!(sum(&[&[1.0, 2.0][..], &[1.0][..]]), vec![2.0]);
    assert!(sum(&[]).is_empty());
}

#[test]
fn scale_converts_units() {
    assert_eq!(scale(&[60.0, 90.0], 1.0 / 60.0), vec![1.0, 1.5]);
}

#[test]
fn mean_of_empty_is_none() {
    assert_eq!(mean(&[]), None);
    assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
}

#[test]
fn cumulative_bases_stack() {
    let a = [1.0, 2.0];
    let b = [3.0, 4.0];
    let c = [5.0, 6.0];
    let bases = cumulative(&[&a[..], &b[..], &c[..]]);
    assert_eq!(bases, vec![vec![0.0, 0.0], vec![1.0, 2.0], vec![4.0, 6.0]]);
}

#[test]
fn cdf_starts_at_zero() {
    let points = cdf(&[30.0, 10.0, 20.0, 40.0]).unwrap();
    assert_eq!(
        points,
        vec![(10.0, 0.0), (20.0, 0.25), (30.0, 0.5), (40.0, 0.75)]
    );
}

#[test]
fn cdf_of_nothing_fails() {
    assert!(matches!(cdf(&[]), Err(FigureError::Empty)));
}

#[test]
fn log_bounds_are_decades() {
    assert_eq!(log_bounds(&[3.0, 250.0]), (1.0, 1000.0));
    assert_eq!(log_bounds(&[0.05, 0.0, -1.0, 2.0]), (0.01, 10.0));
    assert_eq!(log_bounds(&[10.0]), (10.0, 100.0));
    assert_eq!(log_bounds(&[2.0, 5.0]), (1.0, 10.0));
    assert_eq!(log_bounds(&[]), (0.1, 1.0));
}

#[test]
fn bloom_sizes_match_report() {
    let sizes: Vec<u64> = [64, 128, 256, 512, 1024, 2048]
        .iter()
        .map(|n| bloom_filter_bits(*n, 0.01).unwrap())
        .collect();
    assert_eq!(sizes, vec![614, 1227, 2454, 4908, 9816, 19631]);
}

#[test]
fn bloom_rate_outside_unit_interval_fails() {
    for rate in [0.0, 1.0, 1.5, -1.0, f64::NAN] {
        assert!(matches!(bloom_filter_bits(64, rate), Err(FigureError::BadFpRate(_))));
    }
}
