//! Proportion statistics: two-proportion Z-test and Cohen's h.

use serde::{Deserialize, Serialize};

/// Result of comparing two observed proportions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProportionTest {
    pub p1: f64,
    pub p2: f64,
    pub pooled_p: f64,
    pub standard_error: f64,
    pub z_score: f64,
    /// Two-tailed p-value.
    pub p_value: f64,
}

impl ProportionTest {
    fn undefined(p1: f64, p2: f64) -> Self {
        Self {
            p1,
            p2,
            pooled_p: 0.0,
            standard_error: 0.0,
            z_score: 0.0,
            p_value: 1.0,
        }
    }
}

/// Magnitude class for Cohen's h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectSizeClass {
    Trivial,
    Small,
    Medium,
    Large,
}

impl EffectSizeClass {
    pub fn from_cohens_h(h: f64) -> Self {
        let h = h.abs();
        if h < 0.2 {
            Self::Trivial
        } else if h < 0.5 {
            Self::Small
        } else if h < 0.8 {
            Self::Medium
        } else {
            Self::Large
        }
    }
}

/// Two-proportion Z-test of `x1/n1` against `x2/n2`. Proportions are capped at 1
/// when a stage reports more successes than its denominator.
pub fn two_proportion_z_test(x1: f64, n1: f64, x2: f64, n2: f64) -> ProportionTest {
    if n1 <= 0.0 || n2 <= 0.0 {
        return ProportionTest::undefined(0.0, 0.0);
    }
    let x1 = x1.clamp(0.0, n1);
    let x2 = x2.clamp(0.0, n2);
    let p1 = x1 / n1;
    let p2 = x2 / n2;
    let pooled_p = (x1 + x2) / (n1 + n2);
    let standard_error = (pooled_p * (1.0 - pooled_p) * (1.0 / n1 + 1.0 / n2)).sqrt();
    if standard_error == 0.0 || !standard_error.is_finite() {
        return ProportionTest {
            pooled_p,
            ..ProportionTest::undefined(p1, p2)
        };
    }
    let z_score = (p1 - p2) / standard_error;
    let p_value = (2.0 * (1.0 - normal_cdf(z_score.abs()))).clamp(0.0, 1.0);

    ProportionTest {
        p1,
        p2,
        pooled_p,
        standard_error,
        z_score,
        p_value,
    }
}

/// Standard normal CDF (Abramowitz & Stegun 26.2.17, |error| < 7.5e-8).
pub fn normal_cdf(x: f64) -> f64 {
    if x < 0.0 {
        return 1.0 - normal_cdf(-x);
    }
    let t = 1.0 / (1.0 + 0.2316419 * x);
    let d = 0.3989422804014327;
    let upper_tail = d
        * (-x * x / 2.0).exp()
        * (t * (0.3193815
            + t * (-0.3565638 + t * (1.781478 + t * (-1.821256 + t * 1.330274)))));
    1.0 - upper_tail
}

/// Cohen's h effect size between two proportions.
pub fn cohens_h(p1: f64, p2: f64) -> f64 {
    let p1 = p1.clamp(0.0, 1.0);
    let p2 = p2.clamp(0.0, 1.0);
    2.0 * (p1.sqrt().asin() - p2.sqrt().asin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_cdf_known_points() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-6);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-4);
        assert!((normal_cdf(-1.96) - 0.025).abs() < 1e-4);
        assert!(normal_cdf(8.0) > 0.999_999);
    }

    #[test]
    fn test_identical_proportions_not_significant() {
        let test = two_proportion_z_test(50.0, 1000.0, 50.0, 1000.0);
        assert_eq!(test.z_score, 0.0);
        assert!((test.p_value - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_clear_difference_is_significant() {
        // 10% vs 5% on 2000 trials each.
        let test = two_proportion_z_test(200.0, 2000.0, 100.0, 2000.0);
        assert!(test.z_score > 5.0);
        assert!(test.p_value < 0.001);
        assert!((test.pooled_p - 0.075).abs() < 1e-12);
    }

    #[test]
    fn test_empty_denominators() {
        let test = two_proportion_z_test(0.0, 0.0, 10.0, 100.0);
        assert_eq!(test.p_value, 1.0);
        assert_eq!(test.z_score, 0.0);
    }

    #[test]
    fn test_cohens_h_and_classes() {
        assert_eq!(cohens_h(0.5, 0.5), 0.0);
        let h = cohens_h(0.5, 0.2);
        assert!((h - 0.6435).abs() < 1e-3);
        assert_eq!(EffectSizeClass::from_cohens_h(0.1), EffectSizeClass::Trivial);
        assert_eq!(EffectSizeClass::from_cohens_h(-0.3), EffectSizeClass::Small);
        assert_eq!(EffectSizeClass::from_cohens_h(h), EffectSizeClass::Medium);
        assert_eq!(EffectSizeClass::from_cohens_h(0.8), EffectSizeClass::Large);
    }
}
