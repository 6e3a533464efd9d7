use std::time::Duration;

use serde::Serialize;
use strum::{EnumCount, IntoEnumIterator};

use crate::table::{shoe::Shoe, Card, Rank};

const HISTORY_SHOWN: usize = 10;

/// Hi-Lo running count over the lifetime of one shoe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountTracker {
    running_count: i32,
}

impl CountTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the card to the running count unless it is still face down.
    pub fn record(&mut self, card: Card, counted: bool) {
        if counted {
            self.running_count += card.hi_lo();
        }
    }

    pub fn running_count(&self) -> i32 {
        self.running_count
    }

    /// Running count per remaining deck, 0 for an empty shoe.
    pub fn true_count(&self, shoe: &Shoe) -> f64 {
        let decks = shoe.decks_remaining();
        if decks > 0.0 {
            self.running_count as f64 / decks
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        self.running_count = 0;
    }
}

/// Composition of the cards left in the shoe.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemainingCards {
    pub total: usize,
    /// 2 to 6.
    pub low: usize,
    /// 7 to 9.
    pub neutral: usize,
    /// 10, J, Q, K and A.
    pub high: usize,
    /// Indexed by `Rank as usize`, Ace first.
    pub by_rank: [usize; Rank::COUNT],
}

impl RemainingCards {
    pub fn tally(shoe: &Shoe) -> RemainingCards {
        let mut remaining = RemainingCards {
            total: shoe.len(),
            ..Default::default()
        };
        for card in shoe.cards() {
            remaining.by_rank[card.rank as usize] += 1;
            match card.hi_lo() {
                1 => remaining.low += 1,
                0 => remaining.neutral += 1,
                _ => remaining.high += 1,
            }
        }
        remaining
    }

    pub fn of_rank(&self, rank: Rank) -> usize {
        self.by_rank[rank as usize]
    }

    pub fn ranks(&self) -> impl Iterator<Item = (Rank, usize)> + '_ {
        Rank::iter().map(move |rank| (rank, self.of_rank(rank)))
    }

    fn percent(&self, part: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            part as f64 * 100.0 / self.total as f64
        }
    }

    pub fn low_percent(&self) -> f64 {
        self.percent(self.low)
    }

    pub fn neutral_percent(&self) -> f64 {
        self.percent(self.neutral)
    }

    pub fn high_percent(&self) -> f64 {
        self.percent(self.high)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub event: String,
    pub running_count: i32,
    pub true_count: f64,
    /// Time since the shoe was started.
    pub elapsed: Duration,
}

/// Log of count snapshots taken at shoe resets, deals and round ends.
#[derive(Debug, Clone, Default)]
pub struct CountHistory {
    entries: Vec<HistoryEntry>,
}

impl CountHistory {
    pub fn record(&mut self, event: impl Into<String>, running_count: i32, true_count: f64, elapsed: Duration) {
        self.entries.push(HistoryEntry {
            event: event.into(),
            running_count,
            true_count,
            elapsed,
        });
    }

    /// Last entries, newest first.
    pub fn recent(&self) -> Vec<HistoryEntry> {
        self.entries.iter().rev().take(HISTORY_SHOWN).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
