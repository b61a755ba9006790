use shared::GlickoRating;

use super::glicko::{
    delta, from_mu, from_phi, solve_volatility, to_mu, to_phi, variance, Glicko2Params,
};

/// One game against one opponent, on the public scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpponentSample {
    pub opp_rating: f64,
    pub opp_rd: f64,
    pub score: f64, // 1.0 win, 0.5 draw, 0.0 loss; fractional for partial results
}

/// Updated ratings for the four players of a doubles match, in seat order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchRatings {
    pub player1: GlickoRating,
    pub player2: GlickoRating,
    pub player3: GlickoRating,
    pub player4: GlickoRating,
}

impl MatchRatings {
    pub fn into_array(self) -> [GlickoRating; 4] {
        [self.player1, self.player2, self.player3, self.player4]
    }
}

/// Applies Glicko-2 to doubles matches. Pure: no state beyond its parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RatingEngine {
    params: Glicko2Params,
}

impl RatingEngine {
    pub fn new(params: Glicko2Params) -> Self {
        Self { params }
    }

    pub fn params(&self) -> Glicko2Params {
        self.params
    }

    /// Rating period update for a single player.
    ///
    /// With no opponents only the deviation grows (`φ' = sqrt(φ² + σ²)`);
    /// rating and volatility are left alone. In every case `rd` is capped at
    /// `max_rd`; rating and volatility are never clamped.
    pub fn update_one_player(&self, current: GlickoRating, opponents: &[OpponentSample]) -> GlickoRating {
        let mu = to_mu(current.rating);
        let phi = to_phi(current.rd);

        let opp_mus: Vec<f64> = opponents.iter().map(|o| to_mu(o.opp_rating)).collect();
        let opp_phis: Vec<f64> = opponents.iter().map(|o| to_phi(o.opp_rd)).collect();
        let scores: Vec<f64> = opponents.iter().map(|o| o.score).collect();

        let v = match variance(mu, &opp_mus, &opp_phis) {
            Ok(v) => v,
            Err(_) => return self.inflate_rd(current),
        };
        let delta = match delta(v, mu, &opp_mus, &opp_phis, &scores) {
            Ok(d) => d,
            Err(_) => return self.inflate_rd(current),
        };

        let sigma_prime =
            solve_volatility(current.vol, delta, phi, v, self.params.tau, self.params.epsilon).vol;

        let phi_star = (phi.powi(2) + sigma_prime.powi(2)).sqrt();
        let phi_prime = 1.0 / (1.0 / phi_star.powi(2) + 1.0 / v).sqrt();
        let mu_prime = mu + phi_prime.powi(2) * delta / v;

        GlickoRating {
            rating: from_mu(mu_prime),
            rd: from_phi(phi_prime).min(self.params.max_rd),
            vol: sigma_prime,
        }
    }

    /// "No games played": uncertainty grows by one period of volatility.
    pub fn inflate_rd(&self, current: GlickoRating) -> GlickoRating {
        let phi = to_phi(current.rd);
        let inflated = (phi.powi(2) + current.vol.powi(2)).sqrt();
        GlickoRating {
            rd: from_phi(inflated).min(self.params.max_rd),
            ..current
        }
    }

    /// Rates a doubles match from the team scores (sets won).
    ///
    /// The score pair becomes a result fraction for team 1. Every player is
    /// updated against both opposing players with their team's fraction, using
    /// the ratings as they stood before the match. A 0–0 score changes nothing.
    pub fn compute_match_ratings(
        &self,
        player1: GlickoRating,
        player2: GlickoRating,
        player3: GlickoRating,
        player4: GlickoRating,
        team1_score: u32,
        team2_score: u32,
    ) -> MatchRatings {
        let total = u64::from(team1_score) + u64::from(team2_score);
        if total == 0 {
            return MatchRatings { player1, player2, player3, player4 };
        }

        let team1_result = team1_score as f64 / total as f64;
        let team2_result = 1.0 - team1_result;

        let against = |a: GlickoRating, b: GlickoRating, score: f64| {
            [
                OpponentSample { opp_rating: a.rating, opp_rd: a.rd, score },
                OpponentSample { opp_rating: b.rating, opp_rd: b.rd, score },
            ]
        };
        let vs_team2 = against(player3, player4, team1_result);
        let vs_team1 = against(player1, player2, team2_result);

        MatchRatings {
            player1: self.update_one_player(player1, &vs_team2),
            player2: self.update_one_player(player2, &vs_team2),
            player3: self.update_one_player(player3, &vs_team1),
            player4: self.update_one_player(player4, &vs_team1),
        }
    }
}
