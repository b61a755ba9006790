// Glicko-2 primitives (per Mark Glickman, "Example of the Glicko-2 system")
// Public scale is centred on 1500; the internal scale divides by 173.7178.

use std::f64::consts::PI;
use thiserror::Error;

/// Ratio between the public rating scale and the Glicko-2 internal scale.
pub const SCALE: f64 = 173.7178;

/// Upper bound on the bracketing and regula falsi loops. Well-formed input
/// converges in well under a hundred steps.
pub const MAX_ITERATIONS: usize = 1_000;

#[derive(Debug, Clone, Copy)]
pub struct Glicko2Params {
    pub default_rating: f64, // typically 1500
    pub default_rd: f64,     // typically 350
    pub default_vol: f64,    // typically 0.06
    pub tau: f64,            // volatility constraint, 0.3–1.2; we use 0.5
    pub max_rd: f64,         // rd never exceeds the unrated deviation
    pub epsilon: f64,        // convergence tolerance for the volatility solve
}

impl Default for Glicko2Params {
    fn default() -> Self {
        Self {
            default_rating: 1500.0,
            default_rd: 350.0,
            default_vol: 0.06,
            tau: 0.5,
            max_rd: 350.0,
            epsilon: 1e-6,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GlickoError {
    #[error("variance is undefined without opponents")]
    NoOpponents,
    #[error("opponent inputs have mismatched lengths")]
    LengthMismatch,
}

pub fn to_mu(rating: f64) -> f64 {
    (rating - 1500.0) / SCALE
}

pub fn to_phi(rd: f64) -> f64 {
    rd / SCALE
}

pub fn from_mu(mu: f64) -> f64 {
    mu * SCALE + 1500.0
}

pub fn from_phi(phi: f64) -> f64 {
    phi * SCALE
}

/// Dampens an opponent's impact as their uncertainty grows.
pub fn g(phi: f64) -> f64 {
    1.0 / (1.0 + 3.0 * phi.powi(2) / PI.powi(2)).sqrt()
}

/// Expected score against one opponent, in (0, 1).
pub fn e(mu: f64, opp_mu: f64, opp_phi: f64) -> f64 {
    1.0 / (1.0 + (-g(opp_phi) * (mu - opp_mu)).exp())
}

/// Estimated variance of the player's rating based only on game outcomes.
pub fn variance(mu: f64, opp_mus: &[f64], opp_phis: &[f64]) -> Result<f64, GlickoError> {
    if opp_mus.is_empty() {
        return Err(GlickoError::NoOpponents);
    }
    if opp_mus.len() != opp_phis.len() {
        return Err(GlickoError::LengthMismatch);
    }

    let v_inv: f64 = opp_mus
        .iter()
        .zip(opp_phis)
        .map(|(&mu_j, &phi_j)| {
            let e_val = e(mu, mu_j, phi_j);
            g(phi_j).powi(2) * e_val * (1.0 - e_val)
        })
        .sum();
    Ok(1.0 / v_inv)
}

/// Estimated improvement in rating over the pre-period rating.
pub fn delta(
    v: f64,
    mu: f64,
    opp_mus: &[f64],
    opp_phis: &[f64],
    scores: &[f64],
) -> Result<f64, GlickoError> {
    if opp_mus.len() != opp_phis.len() || opp_mus.len() != scores.len() {
        return Err(GlickoError::LengthMismatch);
    }

    let sum: f64 = opp_mus
        .iter()
        .zip(opp_phis)
        .zip(scores)
        .map(|((&mu_j, &phi_j), &s)| g(phi_j) * (s - e(mu, mu_j, phi_j)))
        .sum();
    Ok(v * sum)
}

/// Result of the volatility root find, with enough detail to check convergence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilitySolution {
    pub vol: f64,
    pub iterations: usize,
    pub bracket_width: f64,
}

/// Step 5 of Glickman's procedure: solve for the new volatility with the
/// Illinois variant of regula falsi.
pub fn solve_volatility(
    vol: f64,
    delta: f64,
    phi: f64,
    v: f64,
    tau: f64,
    epsilon: f64,
) -> VolatilitySolution {
    let a = (vol * vol).ln();
    let phi_sq = phi * phi;
    let delta_sq = delta * delta;
    let tau_sq = tau * tau;

    let f = |x: f64| {
        let ex = x.exp();
        let denom = phi_sq + v + ex;
        (ex * (delta_sq - phi_sq - v - ex)) / (2.0 * denom * denom) - (x - a) / tau_sq
    };

    let mut big_a = a;
    let mut big_b = if delta_sq > phi_sq + v {
        (delta_sq - phi_sq - v).ln()
    } else {
        let mut k = 1.0;
        while f(a - k * tau) < 0.0 && k < MAX_ITERATIONS as f64 {
            k += 1.0;
        }
        a - k * tau
    };

    let mut f_a = f(big_a);
    let mut f_b = f(big_b);
    let mut iterations = 0;

    while (big_b - big_a).abs() >= epsilon && iterations < MAX_ITERATIONS {
        let c = big_a + (big_a - big_b) * f_a / (f_b - f_a);
        let f_c = f(c);
        if f_c * f_b < 0.0 {
            big_a = big_b;
            f_a = f_b;
        } else {
            f_a /= 2.0;
        }
        big_b = c;
        f_b = f_c;
        iterations += 1;
    }

    VolatilitySolution {
        vol: (big_a / 2.0).exp(),
        iterations,
        bracket_width: (big_b - big_a).abs(),
    }
}
