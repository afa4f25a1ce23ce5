//! Unit draws for all supported distribution families.

use rand::Rng;

// -------------------------------------------------------------------------------------------------

/// Uniform draw in range [0, 1).
#[inline]
pub fn uniform<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.random::<f64>()
}

/// Standard normal draw via the polar Box-Muller method.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let u = 2.0 * uniform(rng) - 1.0;
        let v = 2.0 * uniform(rng) - 1.0;
        let s = u * u + v * v;
        if s > 0.0 && s < 1.0 {
            return u * (-2.0 * s.ln() / s).sqrt();
        }
    }
}

/// Standard Cauchy draw, the ratio of two independent standard normal draws.
#[inline]
pub fn cauchy<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    gaussian(rng) / gaussian(rng)
}

/// Unit rate exponential draw by inverting the CDF of a uniform draw.
#[inline]
pub fn exponential<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // 1 - u is in (0, 1], so the result is always finite
    -(1.0 - uniform(rng)).ln()
}

/// Gamma draw with the given shape and unit scale, using Fishman's rejection method.
///
/// The method is exact for `shape >= 1`. Smaller shapes accept the first candidate, which
/// degrades to a scaled exponential draw. Invalid shapes yield NaN.
pub fn gamma<R: Rng + ?Sized>(rng: &mut R, shape: f64) -> f64 {
    const MAX_REJECTIONS: usize = 1000;
    if !shape.is_finite() || shape <= 0.0 {
        return f64::NAN;
    }
    let mut v = exponential(rng);
    for _ in 0..MAX_REJECTIONS {
        let w = exponential(rng);
        if w >= (shape - 1.0) * (v - v.ln() - 1.0) {
            break;
        }
        v = exponential(rng);
    }
    shape * v
}

/// Fair coin flip.
#[inline]
pub fn coin<R: Rng + ?Sized>(rng: &mut R) -> bool {
    uniform(rng) < 0.5
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{rngs::SmallRng, SeedableRng};

    const DRAWS: usize = 20000;

    fn mean_and_variance(values: &[f64]) -> (f64, f64) {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance =
            values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
        (mean, variance)
    }

    #[test]
    fn uniform_range() {
        let mut rng = SmallRng::seed_from_u64(1);
        let values = (0..DRAWS).map(|_| uniform(&mut rng)).collect::<Vec<_>>();
        assert!(values.iter().all(|v| (0.0..1.0).contains(v)));
        let (mean, _) = mean_and_variance(&values);
        assert!((mean - 0.5).abs() < 0.02, "{mean}");
    }

    #[test]
    fn gaussian_moments() {
        let mut rng = SmallRng::seed_from_u64(2);
        let values = (0..DRAWS).map(|_| gaussian(&mut rng)).collect::<Vec<_>>();
        let (mean, variance) = mean_and_variance(&values);
        assert!(mean.abs() < 0.05, "{mean}");
        assert!((variance - 1.0).abs() < 0.1, "{variance}");
    }

    #[test]
    fn exponential_moments() {
        let mut rng = SmallRng::seed_from_u64(3);
        let values = (0..DRAWS).map(|_| exponential(&mut rng)).collect::<Vec<_>>();
        assert!(values.iter().all(|v| v.is_finite() && *v >= 0.0));
        let (mean, _) = mean_and_variance(&values);
        assert!((mean - 1.0).abs() < 0.05, "{mean}");
    }

    #[test]
    fn gamma_moments() {
        let mut rng = SmallRng::seed_from_u64(4);
        let values = (0..DRAWS).map(|_| gamma(&mut rng, 4.0)).collect::<Vec<_>>();
        assert!(values.iter().all(|v| *v > 0.0));
        let (mean, variance) = mean_and_variance(&values);
        // gamma(k) has mean k and variance k
        assert!((mean - 4.0).abs() < 0.15, "{mean}");
        assert!((variance - 4.0).abs() < 0.6, "{variance}");

        assert!(gamma(&mut rng, 0.0).is_nan());
        assert!(gamma(&mut rng, f64::NAN).is_nan());
    }

    #[test]
    fn cauchy_median() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut values = (0..DRAWS).map(|_| cauchy(&mut rng)).collect::<Vec<_>>();
        values.sort_by(|a, b| a.total_cmp(b));
        let median = values[DRAWS / 2];
        assert!(median.abs() < 0.05, "{median}");
    }
}
