use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use crate::{
    strategy::Recommendation,
    table::{hand::Hand, Card},
    Action, HandKind,
};

const RECENT_MISTAKES_SHOWN: usize = 5;
/// Older mistakes are dropped once the log holds this many.
pub const MISTAKE_LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StrategyStats {
    pub correct_moves: u32,
    pub total_moves: u32,
}

impl StrategyStats {
    /// Percentage of correct moves rounded to an integer, 0 before the
    /// first move.
    pub fn accuracy(&self) -> u32 {
        if self.total_moves == 0 {
            0
        } else {
            (self.correct_moves as f64 * 100.0 / self.total_moves as f64).round() as u32
        }
    }
}

/// A move that did not match the reference play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mistake {
    /// Ranks of the hand before the move, e.g. `A,7`.
    pub hand_description: String,
    /// Dealer up card with its suit, e.g. `10♠`.
    pub dealer_up_card: String,
    pub action_taken: Action,
    pub correct_action: Action,
    pub hand_kind: HandKind,
}

/// Verdict on a single move, shown as feedback to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grade {
    pub correct: bool,
    pub action: Action,
    pub recommended: Action,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct MoveGrader {
    stats: StrategyStats,
    mistakes: VecDeque<Mistake>,
    mistake_count: usize,
}

impl MoveGrader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares the move with the recommendation for the hand it was made
    /// on and updates the statistics.
    pub fn grade(
        &mut self,
        action: Action,
        recommendation: &Recommendation,
        hand: &Hand,
        dealer_up: Card,
    ) -> Grade {
        let recommended = recommendation.action;
        // Doubling is impossible after a hit, so hitting is the right play.
        let correct = action == recommended
            || (recommended == Action::Double && action == Action::Hit && hand.len() > 2);

        self.stats.total_moves += 1;
        let message = if correct {
            self.stats.correct_moves += 1;
            String::from("Correct!")
        } else {
            if self.mistakes.len() == MISTAKE_LOG_CAPACITY {
                self.mistakes.pop_front();
            }
            self.mistakes.push_back(Mistake {
                hand_description: hand.describe(),
                dealer_up_card: dealer_up.to_string(),
                action_taken: action,
                correct_action: recommended,
                hand_kind: hand.kind(),
            });
            self.mistake_count += 1;
            format!(
                "Incorrect. Should {}: {}",
                recommended.to_string().to_lowercase(),
                recommendation.rationale
            )
        };
        debug!(%action, %recommended, correct, hand = %hand.describe(), "move graded");

        Grade {
            correct,
            action,
            recommended,
            message,
        }
    }

    pub fn stats(&self) -> StrategyStats {
        self.stats
    }

    pub fn accuracy(&self) -> u32 {
        self.stats.accuracy()
    }

    /// The kept mistakes, oldest first.
    pub fn mistakes(&self) -> &VecDeque<Mistake> {
        &self.mistakes
    }

    /// Every mistake since the last reset, including dropped ones.
    pub fn mistake_count(&self) -> usize {
        self.mistake_count
    }

    /// The latest mistakes, newest first.
    pub fn recent_mistakes(&self) -> Vec<Mistake> {
        self.mistakes
            .iter()
            .rev()
            .take(RECENT_MISTAKES_SHOWN)
            .cloned()
            .collect()
    }

    pub fn reset(&mut self) {
        self.stats = StrategyStats::default();
        self.mistakes.clear();
        self.mistake_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Rank, Suit};

    fn hand(ranks: &[Rank]) -> Hand {
        let cards: Vec<Card> = ranks.iter().map(|&r| Card::new(r, Suit::Diamond)).collect();
        Hand::from_cards(&cards)
    }

    fn recommendation(action: Action) -> Recommendation {
        Recommendation {
            action,
            rationale: String::from("Hit 16 vs dealer 10"),
        }
    }

    #[test]
    fn matching_move_is_correct() {
        let mut grader = MoveGrader::new();
        let grade = grader.grade(
            Action::Hit,
            &recommendation(Action::Hit),
            &hand(&[Rank::Ten, Rank::Six]),
            Card::new(Rank::Ten, Suit::Spade),
        );
        assert!(grade.correct);
        assert_eq!(grader.stats(), StrategyStats { correct_moves: 1, total_moves: 1 });
        assert!(grader.mistakes().is_empty());
        assert_eq!(grader.accuracy(), 100);
    }

    #[test]
    fn wrong_move_is_logged() {
        let mut grader = MoveGrader::new();
        let grade = grader.grade(
            Action::Stand,
            &recommendation(Action::Hit),
            &hand(&[Rank::Ace, Rank::Five]),
            Card::new(Rank::Ten, Suit::Spade),
        );
        assert!(!grade.correct);
        assert_eq!(grade.message, "Incorrect. Should hit: Hit 16 vs dealer 10");
        let mistake = &grader.mistakes()[0];
        assert_eq!(mistake.hand_description, "A,5");
        assert_eq!(mistake.dealer_up_card, "10♠");
        assert_eq!(mistake.action_taken, Action::Stand);
        assert_eq!(mistake.correct_action, Action::Hit);
        assert_eq!(mistake.hand_kind, HandKind::Soft);
        assert_eq!(grader.accuracy(), 0);
    }

    #[test]
    fn hit_is_accepted_for_a_double_that_is_no_longer_possible() {
        let mut grader = MoveGrader::new();
        let up = Card::new(Rank::Six, Suit::Club);
        let three_cards = hand(&[Rank::Two, Rank::Four, Rank::Five]);
        assert!(grader.grade(Action::Hit, &recommendation(Action::Double), &three_cards, up).correct);
        let two_cards = hand(&[Rank::Six, Rank::Five]);
        assert!(!grader.grade(Action::Hit, &recommendation(Action::Double), &two_cards, up).correct);
        assert_eq!(grader.stats().total_moves, 2);
        assert_eq!(grader.accuracy(), 50);
    }

    #[test]
    fn accuracy_rounds_to_nearest_percent() {
        let stats = StrategyStats { correct_moves: 2, total_moves: 3 };
        assert_eq!(stats.accuracy(), 67);
        assert_eq!(StrategyStats::default().accuracy(), 0);
    }

    #[test]
    fn recent_mistakes_are_newest_first() {
        let mut grader = MoveGrader::new();
        let up = Card::new(Rank::Nine, Suit::Heart);
        for _ in 0..7 {
            grader.grade(Action::Stand, &recommendation(Action::Hit), &hand(&[Rank::Two, Rank::Three]), up);
        }
        grader.grade(Action::Split, &recommendation(Action::Stand), &hand(&[Rank::Nine, Rank::Nine]), up);
        let recent = grader.recent_mistakes();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].hand_kind, HandKind::Pair);
        assert_eq!(grader.mistakes().len(), 8);
        assert_eq!(grader.mistake_count(), 8);

        grader.reset();
        assert!(grader.mistakes().is_empty());
        assert_eq!(grader.mistake_count(), 0);
        assert_eq!(grader.stats(), StrategyStats::default());
    }

    #[test]
    fn mistake_log_keeps_the_newest() {
        let mut grader = MoveGrader::new();
        let up = Card::new(Rank::Nine, Suit::Heart);
        let stiff = hand(&[Rank::Two, Rank::Three]);
        for _ in 0..MISTAKE_LOG_CAPACITY + 50 {
            grader.grade(Action::Stand, &recommendation(Action::Hit), &stiff, up);
        }
        grader.grade(Action::Split, &recommendation(Action::Stand), &hand(&[Rank::Nine, Rank::Nine]), up);

        assert_eq!(grader.mistakes().len(), MISTAKE_LOG_CAPACITY);
        assert_eq!(grader.mistake_count(), MISTAKE_LOG_CAPACITY + 51);
        assert_eq!(grader.mistakes().back().map(|m| m.hand_kind), Some(HandKind::Pair));
        assert_eq!(grader.recent_mistakes()[0].hand_kind, HandKind::Pair);
        assert_eq!(grader.stats().total_moves as usize, MISTAKE_LOG_CAPACITY + 51);
        assert_eq!(grader.accuracy(), 0);
    }
}
