use approx::assert_relative_eq;
use moire_core::numeric::{
    beta_ln_pdf, dirichlet_ln_pdf, gamma_ln_pdf, ln_multinomial_coefficient, log_sum_exp,
    poisson_ln_pmf,
};

#[test]
fn log_sum_exp_survives_underflow() {
    let values = [-1000.0, -1000.0];
    assert_relative_eq!(log_sum_exp(&values), -1000.0 + 2f64.ln(), epsilon = 1e-12);
}

#[test]
fn log_sum_exp_edge_cases() {
    assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
    assert_eq!(
        log_sum_exp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]),
        f64::NEG_INFINITY
    );
    assert!(log_sum_exp(&[0.0, f64::NAN]).is_nan());
    assert_relative_eq!(log_sum_exp(&[f64::NEG_INFINITY, 0.0]), 0.0);
}

#[test]
fn uniform_beta_is_flat() {
    assert_relative_eq!(beta_ln_pdf(0.3, 1.0, 1.0), 0.0, epsilon = 1e-12);
    assert_relative_eq!(beta_ln_pdf(0.0, 1.0, 1.0), 0.0, epsilon = 1e-12);
    assert_eq!(beta_ln_pdf(1.5, 1.0, 1.0), f64::NEG_INFINITY);
}

#[test]
fn informative_beta_prefers_small_error() {
    assert!(beta_ln_pdf(0.01, 1.0, 50.0) > beta_ln_pdf(0.3, 1.0, 50.0));
}

#[test]
fn poisson_matches_closed_form() {
    let expected = (2.0f64.powi(3) * (-2.0f64).exp() / 6.0).ln();
    assert_relative_eq!(poisson_ln_pmf(3, 2.0), expected, epsilon = 1e-10);
    assert_eq!(poisson_ln_pmf(0, 0.0), 0.0);
    assert_eq!(poisson_ln_pmf(2, 0.0), f64::NEG_INFINITY);
}

#[test]
fn gamma_exponential_special_case() {
    // shape 1 is an exponential with mean `scale`.
    assert_relative_eq!(
        gamma_ln_pdf(2.0, 1.0, 4.0),
        -(4.0f64.ln()) - 0.5,
        epsilon = 1e-10
    );
    assert_eq!(gamma_ln_pdf(-1.0, 2.0, 1.0), f64::NEG_INFINITY);
}

#[test]
fn flat_dirichlet_density_is_constant() {
    // Dir(1, 1, 1) has density 2 on the 2-simplex.
    let a = dirichlet_ln_pdf(&[0.2, 0.3, 0.5], &[1.0, 1.0, 1.0]);
    let b = dirichlet_ln_pdf(&[0.6, 0.1, 0.3], &[1.0, 1.0, 1.0]);
    assert_relative_eq!(a, 2f64.ln(), epsilon = 1e-10);
    assert_relative_eq!(a, b, epsilon = 1e-12);
    assert_eq!(
        dirichlet_ln_pdf(&[0.0, 1.0], &[2.0, 2.0]),
        f64::NEG_INFINITY
    );
}

#[test]
fn multinomial_coefficient_counts_orderings() {
    assert_relative_eq!(ln_multinomial_coefficient(&[2, 1]), 3f64.ln(), epsilon = 1e-12);
    assert_relative_eq!(ln_multinomial_coefficient(&[3]), 0.0, epsilon = 1e-12);
}
