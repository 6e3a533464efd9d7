use crate::{validate_deck_count, Result, TableError};

use super::{Card, Rank, Suit};

use strum::IntoEnumIterator;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const CARDS_PER_DECK: usize = 52;

/// Represents a shoe in the real world. Cards are drawn from the back of
/// `cards`, which is equivalent to drawing from a uniformly shuffled stack.
#[derive(Debug, Clone)]
pub struct Shoe {
    deck_count: u8,
    cards: Vec<Card>,
    dealt: usize,
    rng: StdRng,
}

impl Shoe {
    /// Creates a shuffled shoe seeded from entropy.
    pub fn new(deck_count: u8) -> Result<Shoe> {
        Self::with_rng(deck_count, StdRng::from_entropy())
    }

    /// Creates a shuffled shoe whose shuffles are reproducible.
    pub fn with_seed(deck_count: u8, seed: u64) -> Result<Shoe> {
        Self::with_rng(deck_count, StdRng::seed_from_u64(seed))
    }

    /// Creates a shoe whose first draws are exactly `firsts`, in order. The
    /// remaining cards are shuffled, so the shoe still holds
    /// `deck_count` complete decks.
    pub fn with_firsts(deck_count: u8, firsts: &[Card]) -> Result<Shoe> {
        let mut shoe = Self::new(deck_count)?;
        shoe.stack_firsts(firsts)?;
        Ok(shoe)
    }

    fn with_rng(deck_count: u8, rng: StdRng) -> Result<Shoe> {
        validate_deck_count(deck_count)?;
        let mut shoe = Shoe {
            deck_count,
            cards: ordered_cards(deck_count),
            dealt: 0,
            rng,
        };
        shoe.shuffle();
        Ok(shoe)
    }

    /// Replaces the whole content with `deck_count` fresh decks and shuffles.
    pub fn reset(&mut self, deck_count: u8) -> Result<()> {
        validate_deck_count(deck_count)?;
        self.deck_count = deck_count;
        self.cards = ordered_cards(deck_count);
        self.dealt = 0;
        self.shuffle();
        Ok(())
    }

    /// Fisher-Yates over the cards still in the shoe.
    pub fn shuffle(&mut self) {
        self.cards.shuffle(&mut self.rng);
    }

    /// Rebuilds the shoe so that the next draws return `firsts` in order.
    /// Fails if a card is requested more often than the shoe holds it.
    pub fn stack_firsts(&mut self, firsts: &[Card]) -> Result<()> {
        let mut cards = ordered_cards(self.deck_count);
        for card in firsts {
            let position = cards
                .iter()
                .position(|c| c == card)
                .ok_or(TableError::CardNotInShoe(*card))?;
            cards.swap_remove(position);
        }
        cards.shuffle(&mut self.rng);
        cards.extend(firsts.iter().rev());
        self.cards = cards;
        self.dealt = 0;
        Ok(())
    }

    /// Deals a card if the shoe is not empty.
    pub fn draw(&mut self) -> Result<Card> {
        let card = self.cards.pop().ok_or(TableError::EmptyShoe)?;
        self.dealt += 1;
        Ok(card)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards_dealt(&self) -> usize {
        self.dealt
    }

    pub fn deck_count(&self) -> u8 {
        self.deck_count
    }

    pub fn decks_remaining(&self) -> f64 {
        self.cards.len() as f64 / CARDS_PER_DECK as f64
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Deals away everything but the next `count` cards.
    #[cfg(test)]
    pub(crate) fn keep_next(&mut self, count: usize) {
        let removed = self.cards.len().saturating_sub(count);
        self.cards.drain(..removed);
        self.dealt += removed;
    }
}

/// `deck_count` standard decks, suit by suit, Ace to King.
pub fn ordered_cards(deck_count: u8) -> Vec<Card> {
    let mut cards = Vec::with_capacity(deck_count as usize * CARDS_PER_DECK);
    for _ in 0..deck_count {
        for suit in Suit::iter() {
            for rank in Rank::iter() {
                cards.push(Card { rank, suit });
            }
        }
    }
    cards
}
