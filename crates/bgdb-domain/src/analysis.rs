//! Engine analysis attached to a stored position.
//!
//! Chances are percentages (0..=100) from the named side's point of view.
//! Gammon chances include backgammons. Equities and errors are millipoints
//! (1000 = one point) so they compare exactly against grammar values.

use serde::{Deserialize, Serialize};

use crate::equity::MatchEquityTable;
use crate::position::{Score, Side};

/// Outcome probabilities for one side
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Chances {
    pub win: f64,
    pub gammon: f64,
    pub backgammon: f64,
}

impl Chances {
    pub fn new(win: f64, gammon: f64, backgammon: f64) -> Self {
        Self {
            win,
            gammon,
            backgammon,
        }
    }

    /// Average points won per win: singles count 1, gammons 2, backgammons 3.
    pub fn average_win_value(&self) -> f64 {
        if self.win <= 0.0 {
            return 1.0;
        }
        1.0 + (self.gammon + self.backgammon) / self.win
    }
}

/// Cube actions as recorded by the analyser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CubeAction {
    NoDouble,
    DoubleTake,
    DoublePass,
}

/// Cubeful evaluation of a cube decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeAnalysis {
    pub player1: Chances,
    pub player2: Chances,
    /// Cubeful equity after no double, millipoints
    pub no_double: i64,
    /// Cubeful equity after double/take, millipoints
    pub double_take: i64,
    /// Cubeful equity after double/pass, millipoints
    pub double_pass: i64,
}

impl CubeAnalysis {
    pub fn equity_of(&self, action: CubeAction) -> i64 {
        match action {
            CubeAction::NoDouble => self.no_double,
            CubeAction::DoubleTake => self.double_take,
            CubeAction::DoublePass => self.double_pass,
        }
    }

    /// Equity under correct play by both sides: the taker picks the cheaper
    /// of take and pass, the doubler doubles only when that beats holding.
    pub fn best_equity(&self) -> i64 {
        self.no_double.max(self.double_take.min(self.double_pass))
    }

    pub fn best_action(&self) -> CubeAction {
        let doubled = self.double_take.min(self.double_pass);
        if doubled <= self.no_double {
            CubeAction::NoDouble
        } else if self.double_take <= self.double_pass {
            CubeAction::DoubleTake
        } else {
            CubeAction::DoublePass
        }
    }

    pub fn error_of(&self, action: CubeAction) -> i64 {
        (self.best_equity() - self.equity_of(action)).abs()
    }
}

/// One candidate move of a checker-play analysis
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CheckerMove {
    /// Move in the usual notation, e.g. `13/9 6/5`
    pub notation: String,
    /// Equity in millipoints
    pub equity: i64,
    pub player1: Chances,
    pub player2: Chances,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CheckerAnalysis {
    pub moves: Vec<CheckerMove>,
}

impl CheckerAnalysis {
    /// Highest-equity candidate
    pub fn best(&self) -> Option<&CheckerMove> {
        self.moves.iter().max_by_key(|m| m.equity)
    }

    pub fn find(&self, notation: &str) -> Option<&CheckerMove> {
        let wanted = normalize_move(notation);
        self.moves
            .iter()
            .find(|m| normalize_move(&m.notation) == wanted)
    }
}

fn normalize_move(notation: &str) -> String {
    notation.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Everything the analyser recorded for a position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub cube: Option<CubeAnalysis>,
    #[serde(default)]
    pub checker: Option<CheckerAnalysis>,
    /// Move actually played, if known
    #[serde(default)]
    pub played_move: Option<String>,
    /// Cube action actually taken, if known
    #[serde(default)]
    pub played_cube_action: Option<CubeAction>,
}

impl Analysis {
    /// Outcome chances for `side`, preferring the cube evaluation and falling
    /// back to the best checker play.
    pub fn chances(&self, side: Side) -> Option<Chances> {
        if let Some(cube) = &self.cube {
            return Some(match side {
                Side::Player1 => cube.player1,
                Side::Player2 => cube.player2,
            });
        }
        let best = self.checker.as_ref()?.best()?;
        Some(match side {
            Side::Player1 => best.player1,
            Side::Player2 => best.player2,
        })
    }

    /// Equity of the best play, millipoints
    pub fn best_equity(&self) -> Option<i64> {
        if let Some(cube) = &self.cube {
            return Some(cube.best_equity());
        }
        self.checker.as_ref()?.best().map(|m| m.equity)
    }

    /// Millipoints lost by the decision actually made. Zero when the played
    /// move is the best one; `None` when nothing was recorded as played or the
    /// played move is missing from the candidate list.
    pub fn played_error(&self) -> Option<i64> {
        if let (Some(cube), Some(action)) = (&self.cube, self.played_cube_action) {
            return Some(cube.error_of(action));
        }
        let checker = self.checker.as_ref()?;
        let played = checker.find(self.played_move.as_deref()?)?;
        let best = checker.best()?;
        Some(best.equity - played.equity)
    }

    /// Texts a move-pattern criterion searches: best move then played move.
    pub fn move_texts(&self) -> Vec<&str> {
        let mut texts = Vec::new();
        if let Some(best) = self.checker.as_ref().and_then(CheckerAnalysis::best) {
            texts.push(best.notation.as_str());
        }
        if let Some(played) = self.played_move.as_deref() {
            texts.push(played);
        }
        texts
    }

    /// Takepoint (percent) of `taker` when the other side doubles `cube`.
    pub fn takepoint(
        &self,
        taker: Side,
        score: &Score,
        cube: u32,
        met: &MatchEquityTable,
    ) -> Option<f64> {
        let taker_chances = self.chances(taker)?;
        let doubler_chances = self.chances(taker.opponent())?;
        met.takepoint(score, cube, taker, &taker_chances, &doubler_chances)
    }
}
