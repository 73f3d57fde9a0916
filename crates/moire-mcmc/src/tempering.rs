use moire_core::errors::{ErrorInfo, MoireError};

use crate::config::{LadderConfig, LadderPolicy};
use crate::kernel::metropolis_accept;

fn ladder_error(code: &str, message: &str, ladder: &[f64]) -> MoireError {
    MoireError::Config(
        ErrorInfo::new(code, message)
            .with_context("ladder", format!("{ladder:?}"))
            .with_hint("the ladder must start at 1.0 and increase strictly"),
    )
}

/// Builds the temperature ladder and checks that it is usable: non-empty,
/// positive and finite, strictly increasing and starting at exactly 1.0.
pub fn build_ladder(config: &LadderConfig) -> Result<Vec<f64>, MoireError> {
    let ladder = match &config.policy {
        LadderPolicy::Geometric { ratio } => {
            if !ratio.is_finite() || *ratio <= 1.0 {
                return Err(MoireError::Config(
                    ErrorInfo::new("ladder-ratio", "geometric ratio must exceed 1.0")
                        .with_context("ratio", ratio),
                ));
            }
            let replicas = config.replicas.unwrap_or(1);
            let mut ladder = Vec::with_capacity(replicas);
            let mut temp = config.base_temperature;
            for _ in 0..replicas {
                ladder.push(temp);
                temp *= ratio;
            }
            ladder
        }
        LadderPolicy::Manual { temperatures } => {
            if let Some(replicas) = config.replicas {
                if replicas != temperatures.len() {
                    return Err(MoireError::Config(
                        ErrorInfo::new(
                            "ladder-length",
                            "chain count does not match the number of temperatures",
                        )
                        .with_context("replicas", replicas)
                        .with_context("temperatures", temperatures.len()),
                    ));
                }
            }
            temperatures.clone()
        }
    };
    validate_ladder(&ladder)?;
    Ok(ladder)
}

/// Checks an explicit ladder.
pub fn validate_ladder(ladder: &[f64]) -> Result<(), MoireError> {
    if ladder.is_empty() {
        return Err(ladder_error("ladder-empty", "temperature ladder is empty", ladder));
    }
    if ladder.iter().any(|t| !t.is_finite() || *t <= 0.0) {
        return Err(ladder_error(
            "ladder-non-positive",
            "temperatures must be positive and finite",
            ladder,
        ));
    }
    if !ladder.contains(&1.0) {
        return Err(ladder_error(
            "ladder-missing-one",
            "temperature ladder has no 1.0 entry",
            ladder,
        ));
    }
    if ladder[0] != 1.0 {
        return Err(ladder_error(
            "ladder-first-rung",
            "the first rung must be the 1.0 temperature",
            ladder,
        ));
    }
    if ladder.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err(ladder_error(
            "ladder-order",
            "temperatures must increase strictly",
            ladder,
        ));
    }
    Ok(())
}

/// Log acceptance ratio for exchanging the temperatures of two chains:
/// `(llik_a/temp_a)*temp_b + (llik_b/temp_b)*temp_a - llik_a - llik_b`.
pub fn swap_log_ratio(llik_a: f64, temp_a: f64, llik_b: f64, temp_b: f64) -> f64 {
    let (scaled_a, scaled_b) = swapped_lliks(llik_a, temp_a, llik_b, temp_b);
    scaled_a + scaled_b - llik_a - llik_b
}

/// Likelihoods the two chains carry after exchanging temperatures.
pub fn swapped_lliks(llik_a: f64, temp_a: f64, llik_b: f64, temp_b: f64) -> (f64, f64) {
    (llik_a / temp_a * temp_b, llik_b / temp_b * temp_a)
}

/// Decides one exchange. Returns the rescaled `(llik_a, llik_b)` on accept;
/// a non-finite ratio never accepts.
pub fn attempt_swap(
    llik_a: f64,
    temp_a: f64,
    llik_b: f64,
    temp_b: f64,
    log_u: f64,
) -> Option<(f64, f64)> {
    let ratio = swap_log_ratio(llik_a, temp_a, llik_b, temp_b);
    metropolis_accept(ratio, log_u).then(|| swapped_lliks(llik_a, temp_a, llik_b, temp_b))
}
