//! Board, cube, dice, score and the position itself.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of board slots: 24 points plus one bar per side.
pub const BOARD_SLOTS: usize = 26;

/// Checkers each side starts with.
pub const CHECKERS_PER_SIDE: u8 = 15;

/// Errors raised while building domain values from user input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Invalid dice: {0}")]
    InvalidDice(String),

    #[error("Point {0} is outside 1..=25")]
    InvalidPoint(usize),

    #[error("Slot {0} already holds checkers of the other side")]
    OccupiedSlot(usize),
}

/// One of the two players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Player1,
    Player2,
}

impl Side {
    /// The other player
    pub fn opponent(self) -> Side {
        match self {
            Side::Player1 => Side::Player2,
            Side::Player2 => Side::Player1,
        }
    }

    /// Index into per-side arrays (borne-off counts, away scores)
    pub fn index(self) -> usize {
        match self {
            Side::Player1 => 0,
            Side::Player2 => 1,
        }
    }

    /// Board slot of this side's bar
    pub fn bar_index(self) -> usize {
        self.board_index(25)
    }

    /// Board slot of this side's point `n`, where 1 is the deepest home point
    /// and 25 is the bar.
    pub fn board_index(self, n: usize) -> usize {
        match self {
            Side::Player1 => n,
            Side::Player2 => 25 - n,
        }
    }

    /// Short label used in listings
    pub fn label(self) -> &'static str {
        match self {
            Side::Player1 => "p1",
            Side::Player2 => "p2",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named region of the board, seen from one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Bar,
    HomeBoard,
    Outfield,
    OpponentHome,
    BorneOff,
}

impl Zone {
    /// Side-relative points covered by the zone; `None` for borne-off checkers.
    pub fn points(self) -> Option<RangeInclusive<usize>> {
        match self {
            Zone::Bar => Some(25..=25),
            Zone::HomeBoard => Some(1..=6),
            Zone::Outfield => Some(7..=18),
            Zone::OpponentHome => Some(19..=24),
            Zone::BorneOff => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Zone::Bar => "bar",
            Zone::HomeBoard => "home board",
            Zone::Outfield => "outfield",
            Zone::OpponentHome => "opponent home",
            Zone::BorneOff => "borne off",
        }
    }
}

/// Checkers on a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub checkers: u8,
    pub owner: Option<Side>,
}

impl Point {
    pub const EMPTY: Point = Point {
        checkers: 0,
        owner: None,
    };

    pub fn new(checkers: u8, owner: Side) -> Self {
        if checkers == 0 {
            return Self::EMPTY;
        }
        Self {
            checkers,
            owner: Some(owner),
        }
    }

    /// Checkers on this slot belonging to `side`
    pub fn held_by(&self, side: Side) -> u8 {
        if self.owner == Some(side) {
            self.checkers
        } else {
            0
        }
    }
}

/// The 26 board slots plus borne-off counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub points: [Point; BOARD_SLOTS],
    pub borne_off: [u8; 2],
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

impl Board {
    /// A board with no checkers on it
    pub fn empty() -> Self {
        Self {
            points: [Point::EMPTY; BOARD_SLOTS],
            borne_off: [0, 0],
        }
    }

    /// The opening layout
    pub fn starting() -> Self {
        let mut board = Self::empty();
        for side in [Side::Player1, Side::Player2] {
            for (n, count) in [(24, 2), (13, 5), (8, 3), (6, 5)] {
                board.points[side.board_index(n)] = Point::new(count, side);
            }
        }
        board
    }

    /// Place `checkers` of `side` on that side's point `n` (25 = bar).
    ///
    /// Replaces whatever count the side already had there.
    pub fn place(&mut self, side: Side, n: usize, checkers: u8) -> Result<(), DomainError> {
        if !(1..=25).contains(&n) {
            return Err(DomainError::InvalidPoint(n));
        }
        let slot = side.board_index(n);
        let current = self.points[slot];
        if current.checkers > 0 && current.owner != Some(side) {
            return Err(DomainError::OccupiedSlot(slot));
        }
        self.points[slot] = Point::new(checkers, side);
        Ok(())
    }

    /// Builder form of [`Board::place`]
    pub fn with(mut self, side: Side, n: usize, checkers: u8) -> Result<Self, DomainError> {
        self.place(side, n, checkers)?;
        Ok(self)
    }

    /// Builder form for borne-off checkers
    pub fn with_borne_off(mut self, side: Side, checkers: u8) -> Self {
        self.borne_off[side.index()] = checkers;
        self
    }

    /// Checkers `side` has on its own point `n` (25 = bar)
    pub fn checkers_on(&self, side: Side, n: usize) -> u8 {
        if !(1..=25).contains(&n) {
            return 0;
        }
        self.points[side.board_index(n)].held_by(side)
    }

    /// Checkers `side` has in `zone`
    pub fn zone_count(&self, side: Side, zone: Zone) -> u32 {
        match zone.points() {
            Some(range) => range.map(|n| self.checkers_on(side, n) as u32).sum(),
            None => self.borne_off[side.index()] as u32,
        }
    }

    /// Pip count: distance `side` still has to travel.
    pub fn pip_count(&self, side: Side) -> u32 {
        (1..=25)
            .map(|n| n as u32 * self.checkers_on(side, n) as u32)
            .sum()
    }

    /// Points in `range` (side-relative) where `side` has exactly one checker
    pub fn blots(&self, side: Side, range: RangeInclusive<usize>) -> u32 {
        range.filter(|&n| self.checkers_on(side, n) == 1).count() as u32
    }

    /// Highest side-relative point `side` still occupies, bar included
    pub fn furthest_back(&self, side: Side) -> Option<usize> {
        (1..=25).rev().find(|&n| self.checkers_on(side, n) > 0)
    }

    /// True while the two armies can still hit or block each other.
    pub fn has_contact(&self) -> bool {
        // Player 1 runs towards slot 0, player 2 towards slot 25. Contact is
        // gone once player 1's rearmost checker sits below player 2's rearmost.
        let p1_back = self.furthest_back(Side::Player1);
        let p2_back = self
            .furthest_back(Side::Player2)
            .map(|n| Side::Player2.board_index(n));
        match (p1_back, p2_back) {
            (Some(p1), Some(p2)) => p1 > p2,
            _ => false,
        }
    }

    /// True when every checker placed on `anchor` is present here with the
    /// same owner and at least the same count.
    pub fn contains(&self, anchor: &Board) -> bool {
        self.points.iter().zip(anchor.points.iter()).all(|(have, want)| {
            want.checkers == 0 || (have.owner == want.owner && have.checkers >= want.checkers)
        })
    }

    /// The board seen from the other side of the table
    pub fn mirrored(&self) -> Self {
        let mut points = [Point::EMPTY; BOARD_SLOTS];
        for (i, point) in self.points.iter().enumerate() {
            points[25 - i] = Point {
                checkers: point.checkers,
                owner: point.owner.map(Side::opponent),
            };
        }
        Self {
            points,
            borne_off: [self.borne_off[1], self.borne_off[0]],
        }
    }
}

/// Doubling cube state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cube {
    pub owner: Option<Side>,
    pub value: u32,
}

impl Default for Cube {
    fn default() -> Self {
        Self {
            owner: None,
            value: 1,
        }
    }
}

impl Cube {
    pub fn owned_by(side: Side, value: u32) -> Self {
        Self {
            owner: Some(side),
            value,
        }
    }
}

/// A dice roll. `(0, 0)` means no dice have been rolled (cube decisions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dice(pub u8, pub u8);

impl Dice {
    pub fn is_rolled(&self) -> bool {
        (1..=6).contains(&self.0) && (1..=6).contains(&self.1)
    }

    /// Same roll regardless of the order the dice are written in
    pub fn same_roll(&self, other: &Dice) -> bool {
        (self.0 == other.0 && self.1 == other.1) || (self.0 == other.1 && self.1 == other.0)
    }

    pub fn is_double(&self) -> bool {
        self.is_rolled() && self.0 == self.1
    }
}

impl fmt::Display for Dice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0, self.1)
    }
}

impl FromStr for Dice {
    type Err = DomainError;

    /// Parses two adjacent digits such as `31` or `66`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: Vec<u8> = s
            .chars()
            .map(|c| c.to_digit(10).map(|d| d as u8))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| DomainError::InvalidDice(s.to_string()))?;
        match digits.as_slice() {
            [a, b] if (1..=6).contains(a) && (1..=6).contains(b) => Ok(Dice(*a, *b)),
            _ => Err(DomainError::InvalidDice(s.to_string())),
        }
    }
}

/// Match score as points still needed ("away") per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub away: [i32; 2],
}

impl Default for Score {
    fn default() -> Self {
        Self::money()
    }
}

impl Score {
    /// Unlimited (money) session
    pub fn money() -> Self {
        Self { away: [-1, -1] }
    }

    pub fn away(player1: i32, player2: i32) -> Self {
        Self {
            away: [player1, player2],
        }
    }

    pub fn is_money(&self) -> bool {
        self.away[0] <= 0 || self.away[1] <= 0
    }

    /// Points `side` still needs, `None` in money play
    pub fn away_for(&self, side: Side) -> Option<i32> {
        if self.is_money() {
            None
        } else {
            Some(self.away[side.index()])
        }
    }

    pub fn swapped(&self) -> Self {
        Self {
            away: [self.away[1], self.away[0]],
        }
    }
}

/// What kind of decision the position asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    #[default]
    Checker,
    Cube,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::Checker => "checker",
            DecisionType::Cube => "cube",
        }
    }
}

/// One static board configuration with its cube, score and dice context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub board: Board,
    #[serde(default)]
    pub cube: Cube,
    #[serde(default)]
    pub dice: Dice,
    #[serde(default)]
    pub score: Score,
    pub player_on_roll: Side,
    #[serde(default)]
    pub decision_type: DecisionType,
    #[serde(default)]
    pub jacoby: bool,
    #[serde(default)]
    pub beaver: bool,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            board: Board::starting(),
            cube: Cube::default(),
            dice: Dice::default(),
            score: Score::money(),
            player_on_roll: Side::Player1,
            decision_type: DecisionType::Checker,
            jacoby: false,
            beaver: false,
        }
    }
}

impl Position {
    /// Position with the given board and everything else at its default
    pub fn with_board(board: Board) -> Self {
        Self {
            board,
            ..Self::default()
        }
    }

    pub fn pip_count(&self, side: Side) -> u32 {
        self.board.pip_count(side)
    }

    /// Player 1 pips minus player 2 pips
    pub fn pip_difference(&self) -> i64 {
        self.pip_count(Side::Player1) as i64 - self.pip_count(Side::Player2) as i64
    }

    /// The same position with the players' roles exchanged.
    pub fn mirrored(&self) -> Self {
        Self {
            board: self.board.mirrored(),
            cube: Cube {
                owner: self.cube.owner.map(Side::opponent),
                value: self.cube.value,
            },
            dice: self.dice,
            score: self.score.swapped(),
            player_on_roll: self.player_on_roll.opponent(),
            decision_type: self.decision_type,
            jacoby: self.jacoby,
            beaver: self.beaver,
        }
    }

    /// Canonical form: seen from player 1 on roll.
    pub fn normalized(&self) -> Self {
        match self.player_on_roll {
            Side::Player1 => self.clone(),
            Side::Player2 => self.mirrored(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn starting_board_pips() {
        let board = Board::starting();
        assert_eq!(board.pip_count(Side::Player1), 167);
        assert_eq!(board.pip_count(Side::Player2), 167);
        assert!(board.has_contact());
    }

    #[test]
    fn place_rejects_foreign_slot() {
        let mut board = Board::empty();
        board.place(Side::Player1, 6, 2).unwrap();
        // Player 2's 19 point is player 1's 6 point
        assert_eq!(
            board.place(Side::Player2, 19, 1),
            Err(DomainError::OccupiedSlot(6))
        );
        assert_eq!(board.place(Side::Player1, 0, 1), Err(DomainError::InvalidPoint(0)));
    }

    #[test]
    fn bar_counts_are_side_relative() {
        let board = Board::empty()
            .with(Side::Player1, 25, 3)
            .unwrap()
            .with(Side::Player2, 25, 1)
            .unwrap();
        assert_eq!(board.points[25].held_by(Side::Player1), 3);
        assert_eq!(board.points[0].held_by(Side::Player2), 1);
        assert_eq!(board.zone_count(Side::Player1, Zone::Bar), 3);
        assert_eq!(board.zone_count(Side::Player2, Zone::Bar), 1);
        assert_eq!(board.pip_count(Side::Player1), 75);
        assert_eq!(board.pip_count(Side::Player2), 25);
    }

    #[rstest]
    #[case(Zone::HomeBoard, 10)]
    #[case(Zone::Outfield, 5)]
    #[case(Zone::OpponentHome, 0)]
    #[case(Zone::BorneOff, 0)]
    fn zone_counts_on_mixed_board(#[case] zone: Zone, #[case] expected: u32) {
        let board = Board::empty()
            .with(Side::Player1, 6, 5)
            .unwrap()
            .with(Side::Player1, 5, 5)
            .unwrap()
            .with(Side::Player1, 13, 5)
            .unwrap();
        assert_eq!(board.zone_count(Side::Player1, zone), expected);
    }

    #[test]
    fn contact_detection() {
        let racing = Board::empty()
            .with(Side::Player1, 6, 15)
            .unwrap()
            .with(Side::Player2, 6, 15)
            .unwrap();
        assert!(!racing.has_contact());

        let engaged = Board::empty()
            .with(Side::Player1, 20, 1)
            .unwrap()
            .with(Side::Player2, 20, 1)
            .unwrap();
        assert!(engaged.has_contact());
    }

    #[test]
    fn blots_in_range() {
        let board = Board::empty()
            .with(Side::Player1, 9, 1)
            .unwrap()
            .with(Side::Player1, 10, 2)
            .unwrap()
            .with(Side::Player1, 4, 1)
            .unwrap();
        assert_eq!(board.blots(Side::Player1, 7..=18), 1);
        assert_eq!(board.blots(Side::Player1, 1..=6), 1);
    }

    #[test]
    fn mirror_twice_is_identity() {
        let mut position = Position::default();
        position.cube = Cube::owned_by(Side::Player2, 4);
        position.score = Score::away(3, 5);
        position.board.borne_off = [2, 0];
        let back = position.mirrored().mirrored();
        assert_eq!(position, back);

        let mirrored = position.mirrored();
        assert_eq!(mirrored.cube.owner, Some(Side::Player1));
        assert_eq!(mirrored.score, Score::away(5, 3));
        assert_eq!(mirrored.board.borne_off, [0, 2]);
        assert_eq!(mirrored.player_on_roll, Side::Player2);
    }

    #[test]
    fn contains_anchor_checkers() {
        let board = Board::starting();
        let anchor = Board::empty().with(Side::Player1, 6, 3).unwrap();
        assert!(board.contains(&anchor));
        let too_many = Board::empty().with(Side::Player1, 6, 6).unwrap();
        assert!(!board.contains(&too_many));
        let wrong_side = Board::empty().with(Side::Player2, 19, 1).unwrap();
        assert!(!board.contains(&wrong_side));
    }

    #[rstest]
    #[case("31", Some(Dice(3, 1)))]
    #[case("66", Some(Dice(6, 6)))]
    #[case("70", None)]
    #[case("3", None)]
    #[case("3a", None)]
    fn dice_from_str(#[case] input: &str, #[case] expected: Option<Dice>) {
        assert_eq!(input.parse::<Dice>().ok(), expected);
    }

    #[test]
    fn dice_order_insensitive() {
        assert!(Dice(3, 1).same_roll(&Dice(1, 3)));
        assert!(!Dice(3, 1).same_roll(&Dice(3, 2)));
        assert!(!Dice::default().is_rolled());
    }

    #[test]
    fn money_score() {
        let score = Score::money();
        assert!(score.is_money());
        assert_eq!(score.away_for(Side::Player1), None);
        assert_eq!(Score::away(2, 4).away_for(Side::Player2), Some(4));
    }

    #[test]
    fn position_serde_defaults() {
        let json = serde_json::to_string(&Position::default()).unwrap();
        let back: Position = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Position::default());
    }
}
