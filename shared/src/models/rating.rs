use serde::{Deserialize, Serialize};

/// A player's Glicko-2 belief: rating, rating deviation and volatility on
/// the public (1500-centred) scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlickoRating {
    pub rating: f64,
    pub rd: f64,
    pub vol: f64,
}

impl GlickoRating {
    pub const DEFAULT_RATING: f64 = 1500.0;
    pub const DEFAULT_RD: f64 = 350.0;
    pub const DEFAULT_VOL: f64 = 0.06;

    pub fn new(rating: f64, rd: f64, vol: f64) -> Self {
        Self { rating, rd, vol }
    }
}

impl Default for GlickoRating {
    fn default() -> Self {
        Self {
            rating: Self::DEFAULT_RATING,
            rd: Self::DEFAULT_RD,
            vol: Self::DEFAULT_VOL,
        }
    }
}
