//! Match equity and takepoints.
//!
//! The match equity table is computed rather than shipped: each game is a coin
//! flip that ends in a gammon with probability `gammon_rate`, and the cube is
//! ignored. Values are coarser than a published table.
//!
//! Takepoints are last-cube takepoints: the cube is dead once taken. Money
//! play uses the gammon-adjusted risk/gain ratio, match play weighs the same
//! outcomes in match equity.

use serde::{Deserialize, Serialize};

use crate::analysis::Chances;
use crate::position::{Score, Side};

/// Cubeless match equity table indexed by away scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEquityTable {
    gammon_rate: f64,
    max_away: usize,
    /// `rows[a - 1][b - 1]` is player 1's chance of winning at a-away, b-away.
    rows: Vec<Vec<f64>>,
}

impl Default for MatchEquityTable {
    fn default() -> Self {
        Self::new(Self::DEFAULT_GAMMON_RATE)
    }
}

impl MatchEquityTable {
    pub const DEFAULT_GAMMON_RATE: f64 = 0.2;
    pub const DEFAULT_MAX_AWAY: usize = 25;
    /// Largest table that may be built
    pub const MAX_AWAY_LIMIT: usize = 64;

    pub fn new(gammon_rate: f64) -> Self {
        Self::with_max_away(gammon_rate, Self::DEFAULT_MAX_AWAY)
    }

    /// Build a table up to `max_away` (capped at [`Self::MAX_AWAY_LIMIT`]).
    pub fn with_max_away(gammon_rate: f64, max_away: usize) -> Self {
        let gammon_rate = gammon_rate.clamp(0.0, 1.0);
        let max_away = max_away.min(Self::MAX_AWAY_LIMIT);
        let mut rows = vec![vec![0.0; max_away]; max_away];

        for a in 1..=max_away {
            for b in 1..=max_away {
                let lookup = |a: i64, b: i64| -> f64 {
                    if a <= 0 {
                        1.0
                    } else if b <= 0 {
                        0.0
                    } else {
                        rows[a as usize - 1][b as usize - 1]
                    }
                };
                let (ai, bi) = (a as i64, b as i64);
                let single = 0.5 * (1.0 - gammon_rate);
                let gammon = 0.5 * gammon_rate;
                let value = single * lookup(ai - 1, bi)
                    + gammon * lookup(ai - 2, bi)
                    + single * lookup(ai, bi - 1)
                    + gammon * lookup(ai, bi - 2);
                rows[a - 1][b - 1] = value;
            }
        }

        Self {
            gammon_rate,
            max_away,
            rows,
        }
    }

    pub fn gammon_rate(&self) -> f64 {
        self.gammon_rate
    }

    /// Player 1's probability (0..=1) of winning the match from these away scores.
    pub fn player1_equity(&self, away1: i32, away2: i32) -> Option<f64> {
        if away1 <= 0 || away2 <= 0 {
            return None;
        }
        let (a, b) = (away1 as usize, away2 as usize);
        if a > self.max_away || b > self.max_away {
            return None;
        }
        Some(self.rows[a - 1][b - 1])
    }

    /// Match-winning chance of `side` in percent; `None` for money play or
    /// scores beyond the table.
    pub fn winning_chance(&self, score: &Score, side: Side) -> Option<f64> {
        if score.is_money() {
            return None;
        }
        let p1 = self.player1_equity(score.away[0], score.away[1])?;
        Some(match side {
            Side::Player1 => p1 * 100.0,
            Side::Player2 => (1.0 - p1) * 100.0,
        })
    }

    /// Takepoint (percent) of `taker` facing a double from `cube` to `2 * cube`.
    ///
    /// Passing concedes `cube` points. Taking risks or wins `2 * cube`, twice
    /// that for a gammon and three times for a backgammon. `None` when the
    /// score is beyond the table.
    pub fn takepoint(
        &self,
        score: &Score,
        cube: u32,
        taker: Side,
        taker_chances: &Chances,
        doubler_chances: &Chances,
    ) -> Option<f64> {
        if score.is_money() {
            return Some(takepoint(taker_chances, doubler_chances));
        }
        let own = i64::from(score.away_for(taker)?);
        let other = i64::from(score.away_for(taker.opponent())?);
        let stake = i64::from(cube.max(1));

        let pass = self.equity_at(own, other - stake)?;
        let mut lose = 0.0;
        for (points, weight) in outcomes(doubler_chances) {
            lose += weight * self.equity_at(own, other - 2 * stake * points)?;
        }
        let mut win = 0.0;
        for (points, weight) in outcomes(taker_chances) {
            win += weight * self.equity_at(own - 2 * stake * points, other)?;
        }
        if win <= lose {
            return None;
        }
        Some((pass - lose) / (win - lose) * 100.0)
    }

    /// Chance of the side at `own`-away against `other`-away, 1.0 once it
    /// has won and 0.0 once it has lost.
    fn equity_at(&self, own: i64, other: i64) -> Option<f64> {
        if own <= 0 {
            return Some(1.0);
        }
        if other <= 0 {
            return Some(0.0);
        }
        self.player1_equity(i32::try_from(own).ok()?, i32::try_from(other).ok()?)
    }
}

/// Share of wins that are singles, gammons and backgammons, by points won.
fn outcomes(chances: &Chances) -> [(i64, f64); 3] {
    if chances.win <= 0.0 {
        return [(1, 1.0), (2, 0.0), (3, 0.0)];
    }
    let win = chances.win;
    [
        (1, (win - chances.gammon) / win),
        (2, (chances.gammon - chances.backgammon) / win),
        (3, chances.backgammon / win),
    ]
}

/// Money-play dead-cube takepoint in percent for the side taking a double.
///
/// `W` is the taker's average value per win and `L` the doubler's; the taker
/// needs `(L - 1/2) / (W + L)` winning chances. Without gammons this is 25%.
pub fn takepoint(taker: &Chances, doubler: &Chances) -> f64 {
    let w = taker.average_win_value();
    let l = doubler.average_win_value();
    (l - 0.5) / (w + l) * 100.0
}
