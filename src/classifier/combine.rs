//! Combining clue probabilities into a message probability.
//!
//! Every scheme works on sums of logarithms so long clue lists cannot
//! underflow.

use crate::domain::Indicators;

/// Robinson's geometric-mean scheme. Zero clues score exactly 0.5.
pub fn robinson(probs: &[f64]) -> f64 {
    if probs.is_empty() {
        return 0.5;
    }
    let n = probs.len() as f64;
    let ln_p: f64 = probs.iter().map(|p| (1.0 - p).ln()).sum();
    let ln_q: f64 = probs.iter().map(|p| p.ln()).sum();
    let p = 1.0 - (ln_p / n).exp();
    let q = 1.0 - (ln_q / n).exp();
    if p + q == 0.0 {
        return 0.5;
    }
    0.5 + ((p - q) / (p + q)) / 2.0
}

/// Fisher's method applied to each side: the spam indicator tests how
/// unlikely the `1 - p` values are under chance, the ham indicator does the
/// same for `p`. The score is `(S - H + 1) / 2`, so strong evidence on both
/// sides lands near 0.5 instead of at whichever extreme has more clues.
pub fn chi_squared(probs: &[f64]) -> (f64, Indicators) {
    if probs.is_empty() {
        return (0.5, Indicators { spam: 0.0, ham: 0.0 });
    }
    let dof = 2 * probs.len();
    let ln_s: f64 = probs.iter().map(|p| (1.0 - p).ln()).sum();
    let ln_h: f64 = probs.iter().map(|p| p.ln()).sum();
    let spam = 1.0 - chi2_q(-2.0 * ln_s, dof);
    let ham = 1.0 - chi2_q(-2.0 * ln_h, dof);
    ((spam - ham + 1.0) / 2.0, Indicators { spam, ham })
}

/// `P(chisq >= x2)` with `dof` degrees of freedom; `dof` must be even.
fn chi2_q(x2: f64, dof: usize) -> f64 {
    debug_assert!(dof % 2 == 0);
    let m = x2 / 2.0;
    let mut term = (-m).exp();
    let mut sum = term;
    for i in 1..dof / 2 {
        term *= m / i as f64;
        sum += term;
    }
    // Rounding can push the series a hair past 1.
    sum.min(1.0)
}

/// Legacy Graham product: `prod(p) / (prod(p) + prod(1 - p))`.
///
/// Measurably worse than [`robinson`] (far more false positives); kept for
/// compatibility only.
pub fn product(probs: &[f64]) -> f64 {
    if probs.is_empty() {
        return 0.5;
    }
    let ln_spam: f64 = probs.iter().map(|p| p.ln()).sum();
    let ln_ham: f64 = probs.iter().map(|p| (1.0 - p).ln()).sum();
    let ratio = (ln_ham - ln_spam).exp();
    if ratio.is_nan() {
        return 0.5;
    }
    1.0 / (1.0 + ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_input_is_neutral() {
        assert_eq!(robinson(&[]), 0.5);
        assert_eq!(product(&[]), 0.5);
        assert_eq!(chi_squared(&[]).0, 0.5);
    }

    #[test]
    fn single_clue_scores_its_own_probability() {
        assert!(close(robinson(&[0.99]), 0.99));
        assert!(close(product(&[0.2]), 0.2));
        let (prob, indicators) = chi_squared(&[0.8]);
        assert!(close(prob, 0.8));
        assert!(close(indicators.spam, 0.8));
        assert!(close(indicators.ham, 0.2));
    }

    #[test]
    fn opposite_clues_cancel() {
        assert!(close(robinson(&[0.9, 0.1]), 0.5));
        assert!(close(product(&[0.9, 0.1]), 0.5));
        assert!(close(chi_squared(&[0.9, 0.1]).0, 0.5));
    }

    #[test]
    fn chi2_q_matches_closed_forms() {
        // Two degrees of freedom: exp(-x / 2).
        assert!(close(chi2_q(3.0, 2), (-1.5f64).exp()));
        // Four degrees of freedom: exp(-x / 2) * (1 + x / 2).
        assert!(close(chi2_q(3.0, 4), (-1.5f64).exp() * 2.5));
        assert_eq!(chi2_q(0.0, 10), 1.0);
    }

    #[test]
    fn chi_squared_is_unsure_when_evidence_conflicts() {
        let mut probs = vec![0.99; 8];
        probs.extend([0.01; 6]);
        let (prob, indicators) = chi_squared(&probs);
        assert!(indicators.spam > 0.99 && indicators.ham > 0.99, "{indicators:?}");
        assert!((0.45..0.55).contains(&prob), "chi-squared scored {prob}");
    }

    #[test]
    fn chi_squared_agrees_in_direction_with_robinson() {
        let spammy = [0.99, 0.95, 0.9, 0.2];
        let hammy = [0.01, 0.05, 0.1, 0.8];
        assert!(chi_squared(&spammy).0 > 0.9);
        assert!(chi_squared(&hammy).0 < 0.1);
        assert!(close(chi_squared(&spammy).0, 1.0 - chi_squared(&hammy).0));
    }

    #[test]
    fn robinson_matches_direct_formula() {
        let probs = [0.99, 0.8, 0.3];
        let n = probs.len() as f64;
        let p = 1.0 - probs.iter().map(|p| 1.0 - p).product::<f64>().powf(1.0 / n);
        let q = 1.0 - probs.iter().product::<f64>().powf(1.0 / n);
        let expected = 0.5 + ((p - q) / (p + q)) / 2.0;
        assert!(close(robinson(&probs), expected));
    }

    #[test]
    fn long_clue_lists_do_not_underflow() {
        let probs = vec![0.01; 500];
        let score = robinson(&probs);
        assert!(score.is_finite());
        assert!(score < 0.05);
        assert!(product(&probs) < 1e-10);
        let (prob, indicators) = chi_squared(&probs);
        assert!(prob.is_finite() && prob < 0.01);
        assert!(indicators.ham > 0.99);
    }
}
