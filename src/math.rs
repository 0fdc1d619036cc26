/// Log-sum-exp trick for numerical stability.
///
/// Computes `log(sum(exp(values)))` as `max + log(sum(exp(v - max)))`.
/// Returns `NEG_INFINITY` for empty input or input where every value is `NEG_INFINITY`.
pub fn logsumexp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max_val = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }
    let sum: f64 = values.iter().map(|&v| (v - max_val).exp()).sum();
    max_val + sum.ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logsumexp_matches_naive() {
        let values = [0.5, -1.25, 2.0];
        let naive = values.iter().map(|v: &f64| v.exp()).sum::<f64>().ln();
        assert!((logsumexp(&values) - naive).abs() < 1e-12);
    }

    #[test]
    fn test_logsumexp_large_values() {
        // exp(1000) overflows f64, the shifted form must not
        let values = [1000.0, 1000.0];
        let result = logsumexp(&values);
        assert!((result - (1000.0 + 2f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn test_logsumexp_degenerate() {
        assert_eq!(logsumexp(&[]), f64::NEG_INFINITY);
        assert_eq!(
            logsumexp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]),
            f64::NEG_INFINITY
        );
        assert_eq!(logsumexp(&[3.0]), 3.0);
    }
}
