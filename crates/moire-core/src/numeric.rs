//! Log-domain numeric helpers shared by the likelihood and prior code.
//!
//! Everything here works on natural logs. Probabilities are never accumulated
//! in linear space.

use statrs::function::beta::ln_beta;
use statrs::function::factorial::ln_factorial;
use statrs::function::gamma::ln_gamma;

/// Numerically stable `ln(sum(exp(values)))`.
///
/// Returns `-inf` for an empty slice or when every entry is `-inf`, and `NaN`
/// if any entry is `NaN`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// `ln(1 - x)` computed without cancellation for small `x`.
pub fn ln_one_minus(x: f64) -> f64 {
    (-x).ln_1p()
}

/// Log density of a Beta(alpha, beta) distribution at `x`.
pub fn beta_ln_pdf(x: f64, alpha: f64, beta: f64) -> f64 {
    if !(0.0..=1.0).contains(&x) {
        return f64::NEG_INFINITY;
    }
    let mut lp = -ln_beta(alpha, beta);
    // 0 * ln(0) must contribute nothing when the exponent vanishes.
    if alpha != 1.0 {
        lp += (alpha - 1.0) * x.ln();
    }
    if beta != 1.0 {
        lp += (beta - 1.0) * ln_one_minus(x);
    }
    lp
}

/// Log density of a Gamma distribution with shape/scale parameterisation.
pub fn gamma_ln_pdf(x: f64, shape: f64, scale: f64) -> f64 {
    if x <= 0.0 {
        return f64::NEG_INFINITY;
    }
    (shape - 1.0) * x.ln() - x / scale - ln_gamma(shape) - shape * scale.ln()
}

/// Log mass of a Poisson(lambda) distribution at `k`.
pub fn poisson_ln_pmf(k: usize, lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return if k == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    k as f64 * lambda.ln() - lambda - ln_factorial(k as u64)
}

/// Log density of a Dirichlet(alpha) distribution at `x`.
pub fn dirichlet_ln_pdf(x: &[f64], alpha: &[f64]) -> f64 {
    if x.len() != alpha.len() {
        return f64::NAN;
    }
    let alpha_total: f64 = alpha.iter().sum();
    let mut lp = ln_gamma(alpha_total);
    for (&xi, &ai) in x.iter().zip(alpha) {
        if xi <= 0.0 {
            return f64::NEG_INFINITY;
        }
        lp += (ai - 1.0) * xi.ln() - ln_gamma(ai);
    }
    lp
}

/// Log multinomial coefficient `ln(n! / prod(counts!))`.
pub fn ln_multinomial_coefficient(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    let mut lp = ln_factorial(total as u64);
    for &count in counts {
        lp -= ln_factorial(count as u64);
    }
    lp
}
