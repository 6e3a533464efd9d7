pub mod count;
pub mod grader;
pub mod strategy;
pub mod table;

use serde::{Deserialize, Serialize};
use serde_enum_str::{Deserialize_enum_str, Serialize_enum_str};
use thiserror::Error;

pub use count::{CountHistory, CountTracker, HistoryEntry, RemainingCards};
pub use grader::{Grade, Mistake, MoveGrader, StrategyStats, MISTAKE_LOG_CAPACITY};
pub use strategy::{recommend, Recommendation, Situation};
pub use table::{
    hand::{Hand, PlayerHands},
    shoe::Shoe,
    Card, HandResult, NoPause, Outcome, Pacer, Phase, Rank, Seat, Snapshot, Suit, Table,
    TableEvent, TableEventHandler, ThreadSleepPacer,
};

pub const MIN_DECKS: u8 = 1;
pub const MAX_DECKS: u8 = 8;

/// A player decision, named the way the trainer displays it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_enum_str, Deserialize_enum_str)]
pub enum Action {
    #[serde(rename = "HIT")]
    Hit,
    #[serde(rename = "STAND")]
    Stand,
    #[serde(rename = "DOUBLE")]
    Double,
    #[serde(rename = "SPLIT")]
    Split,
    #[serde(rename = "INSURANCE")]
    Insurance,
    #[serde(rename = "NO INSURANCE")]
    NoInsurance,
}

/// How a hand is classified in the mistake log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_enum_str, Deserialize_enum_str)]
pub enum HandKind {
    Pair,
    Soft,
    Hard,
}

/// Outcome of a command sent to the table. Commands whose preconditions
/// fail are ignored rather than reported as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Applied,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Shoe is empty! Please reset.")]
    EmptyShoe,
    #[error("Not enough cards! Please reset shoe. ({remaining} left, 4 needed)")]
    InsufficientCards { remaining: usize },
    #[error("deck count must be in [1, 8], got {0}")]
    InvalidDeckCount(u8),
    #[error("{0} is no longer available in the shoe")]
    CardNotInShoe(Card),
}

pub type Result<T> = std::result::Result<T, TableError>;

fn default_deck_count() -> u8 {
    1
}

fn default_deal_delay_ms() -> u64 {
    1200
}

fn default_true() -> bool {
    true
}

/// Everything the presentation layer may configure. All fields can also be
/// changed on a running `Table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default = "default_deck_count")]
    pub deck_count: u8,
    #[serde(default = "default_deal_delay_ms")]
    pub deal_delay_ms: u64,
    #[serde(default = "default_true")]
    pub insurance_enabled: bool,
    #[serde(default = "default_true")]
    pub deviations_enabled: bool,
    /// Fixed shuffle seed. Entropy is used when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl TableConfig {
    pub fn validate(&self) -> Result<()> {
        validate_deck_count(self.deck_count)
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            deck_count: default_deck_count(),
            deal_delay_ms: default_deal_delay_ms(),
            insurance_enabled: true,
            deviations_enabled: true,
            seed: None,
        }
    }
}

pub(crate) fn validate_deck_count(deck_count: u8) -> Result<()> {
    if (MIN_DECKS..=MAX_DECKS).contains(&deck_count) {
        Ok(())
    } else {
        Err(TableError::InvalidDeckCount(deck_count))
    }
}
