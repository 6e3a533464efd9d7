use serde::Serialize;

use crate::HandKind;

use super::{Card, Rank};

/// An ordered group of cards held by the player or the dealer. Totals are
/// always recomputed from the cards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    pub fn new() -> Hand {
        Hand {
            cards: Vec::with_capacity(4),
        }
    }

    pub fn from_cards(cards: &[Card]) -> Hand {
        Hand {
            cards: cards.to_vec(),
        }
    }

    pub fn receive_card(&mut self, card: Card) {
        self.cards.push(card);
    }

    fn remove_card(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Sum of card values with every Ace at 11.
    pub fn hard_sum(&self) -> u8 {
        self.cards.iter().map(Card::value).sum()
    }

    /// Returns the total and how many Aces still count as 11.
    fn evaluate(&self) -> (u8, u8) {
        let mut total = self.hard_sum();
        let mut soft_aces = self.cards.iter().filter(|c| c.rank == Rank::Ace).count() as u8;
        while total > 21 && soft_aces > 0 {
            total -= 10;
            soft_aces -= 1;
        }
        (total, soft_aces)
    }

    /// Best total not above 21 when possible. Above 21 means bust.
    pub fn score(&self) -> u8 {
        self.evaluate().0
    }

    /// True when an Ace is still counted as 11 in the score.
    pub fn is_soft(&self) -> bool {
        self.evaluate().1 > 0
    }

    pub fn is_bust(&self) -> bool {
        self.score() > 21
    }

    /// Exactly two cards of the same rank. Equal value is not enough.
    pub fn is_pair(&self) -> bool {
        self.cards.len() == 2 && self.cards[0].rank == self.cards[1].rank
    }

    pub fn is_blackjack(&self) -> bool {
        self.cards.len() == 2 && self.score() == 21
    }

    pub fn kind(&self) -> HandKind {
        if self.is_pair() {
            HandKind::Pair
        } else if self.is_soft() {
            HandKind::Soft
        } else {
            HandKind::Hard
        }
    }

    pub fn hi_lo(&self) -> i32 {
        self.cards.iter().map(Card::hi_lo).sum()
    }

    /// Ranks joined by commas, e.g. `A,7`.
    pub fn describe(&self) -> String {
        self.cards
            .iter()
            .map(|card| card.rank.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// All hands of the player. Holds more than one hand only after a split;
/// hands are then played one at a time, left to right.
#[derive(Debug, Clone)]
pub struct PlayerHands {
    hands: Vec<Hand>,
    active: usize,
}

impl PlayerHands {
    pub fn new() -> PlayerHands {
        PlayerHands {
            hands: vec![Hand::new()],
            active: 0,
        }
    }

    /// The active hand receives a given card.
    pub fn receive_card(&mut self, card: Card) {
        self.hands[self.active].receive_card(card);
    }

    /// The given hand receives a given card.
    pub fn receive_card_at(&mut self, hand_index: usize, card: Card) {
        self.hands[hand_index].receive_card(card);
    }

    /// Splits the active pair into two one-card hands. The second card
    /// becomes the hand right after the active one.
    pub fn split_active(&mut self) -> bool {
        if self.is_split() || !self.active().is_pair() {
            return false;
        }
        let Some(card) = self.hands[self.active].remove_card() else {
            return false;
        };
        self.hands.insert(self.active + 1, Hand::from_cards(&[card]));
        true
    }

    /// Moves to the next hand. Returns false when there is none.
    pub fn advance(&mut self) -> bool {
        if self.active + 1 < self.hands.len() {
            self.active += 1;
            true
        } else {
            false
        }
    }

    pub fn active(&self) -> &Hand {
        &self.hands[self.active]
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn hands(&self) -> &[Hand] {
        &self.hands
    }

    pub fn is_split(&self) -> bool {
        self.hands.len() > 1
    }

    /// A natural on the single, unsplit hand.
    pub fn has_natural(&self) -> bool {
        !self.is_split() && self.hands[0].is_blackjack()
    }

    pub fn hi_lo(&self) -> i32 {
        self.hands.iter().map(Hand::hi_lo).sum()
    }

    /// Clears all the cards and removes the hands that came from a split,
    /// leaving one empty hand.
    pub fn clear(&mut self) {
        self.hands.truncate(1);
        self.hands[0] = Hand::new();
        self.active = 0;
    }
}

impl Default for PlayerHands {
    fn default() -> Self {
        PlayerHands::new()
    }
}
