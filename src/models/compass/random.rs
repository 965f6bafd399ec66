//! Random variate helpers shared by the compass updaters.

use rand::RngExt;
use rand::rngs::StdRng;

pub fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0_f64 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Marsaglia-Tsang gamma draw with unit scale; shapes below one are boosted.
pub fn sample_gamma(rng: &mut StdRng, shape: f64) -> f64 {
    if !(shape > 0.0 && shape.is_finite()) {
        return f64::NAN;
    }

    if shape < 1.0 {
        let u = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
        return sample_gamma(rng, shape + 1.0) * u.powf(1.0 / shape);
    }

    let d = shape - (1.0 / 3.0);
    let c = (1.0 / (9.0 * d)).sqrt();
    loop {
        let z = sample_standard_normal(rng);
        let v = c.mul_add(z, 1.0);
        if v <= 0.0 {
            continue;
        }
        let v3 = v * v * v;
        let u = rng.random::<f64>();
        if u < (0.0331 * z * z * z).mul_add(-z, 1.0)
            || u.ln() < (0.5 * z).mul_add(z, d * (1.0 - v3 + v3.ln()))
        {
            return d * v3;
        }
    }
}

/// Draw `Dirichlet(shapes)` into `out` via normalized gamma variates, in
/// index order.
pub fn sample_dirichlet_into(rng: &mut StdRng, shapes: &[f64], out: &mut Vec<f64>) {
    out.clear();
    out.extend(shapes.iter().map(|shape| sample_gamma(rng, *shape)));
    let total: f64 = out.iter().sum();
    if total > 0.0 && total.is_finite() {
        for value in out.iter_mut() {
            *value /= total;
        }
    }
}

pub fn should_accept(log_acceptance: f64, rng: &mut StdRng) -> bool {
    log_acceptance >= 0.0 || rng.random::<f64>().ln() < log_acceptance
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn gamma_mean_matches_shape() {
        let mut rng = StdRng::seed_from_u64(11);
        for shape in [0.3, 1.0, 4.5] {
            let draws = 20_000;
            let mean = (0..draws).map(|_| sample_gamma(&mut rng, shape)).sum::<f64>()
                / f64::from(draws);
            assert_relative_eq!(mean, shape, max_relative = 0.05);
        }
    }

    #[test]
    fn gamma_rejects_invalid_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_gamma(&mut rng, 0.0).is_nan());
        assert!(sample_gamma(&mut rng, f64::INFINITY).is_nan());
    }

    #[test]
    fn dirichlet_draw_is_a_simplex() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut out = Vec::new();
        sample_dirichlet_into(&mut rng, &[0.5, 2.0, 7.0], &mut out);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|value| *value >= 0.0));
        assert_relative_eq!(out.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn non_negative_log_ratio_always_accepts() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!((0..100).all(|_| should_accept(0.0, &mut rng)));
        assert!(!(0..100).any(|_| should_accept(f64::NEG_INFINITY, &mut rng)));
    }
}
