//! Domain types: game parameters, historical draws, candidate sets.

pub mod candidate;
pub mod draw;
pub mod game;

pub use candidate::CandidateSet;
pub use draw::{Draw, DrawError, DrawRecord, SkipCounts};
pub use game::{GameError, GameSpec};

/// A lottery number. Games never exceed 255 distinct numbers.
pub type Number = u8;
