//! Backgammon position model for bgdb
//!
//! This crate holds the data the search engine reasons about. Nothing here
//! touches storage or the command grammar.
//!
//! # Modules
//!
//! - [`position`]: board, cube, dice, score and the position itself
//! - [`analysis`]: engine analysis attached to a position (chances, equities, errors)
//! - [`equity`]: match equity table and takepoint derivation
//! - [`record`]: a stored position with its annotations, the unit of the corpus
//! - [`tag`]: hierarchical tag paths
//!
//! # Orientation
//!
//! Board slots are indexed 0..=25. Player 1 moves from 24 down to 1, its bar is
//! slot 25. Player 2 moves the other way, its bar is slot 0. Everything that
//! talks about "a side's point n" goes through [`Side::board_index`].

pub mod analysis;
pub mod equity;
pub mod position;
pub mod record;
pub mod tag;

pub use analysis::{Analysis, Chances, CheckerAnalysis, CheckerMove, CubeAction, CubeAnalysis};
pub use equity::{takepoint, MatchEquityTable};
pub use position::{
    Board, Cube, DecisionType, Dice, DomainError, Point, Position, Score, Side, Zone,
    BOARD_SLOTS, CHECKERS_PER_SIDE,
};
pub use record::{MatchRef, PositionId, PositionRecord};
pub use tag::{normalize_tag, tag_matches};
