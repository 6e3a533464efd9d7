pub mod hand;
pub mod shoe;

use std::{
    fmt, thread,
    time::{Duration, Instant},
};

use hilo_trainer_macros::allowed_phase;
use serde::Serialize;
use serde_enum_str::{Deserialize_enum_str, Serialize_enum_str};
use strum_macros::{EnumCount, EnumIter};
use tracing::{debug, info, warn};

use crate::{
    count::{CountHistory, CountTracker, HistoryEntry, RemainingCards},
    grader::{Grade, Mistake, MoveGrader, StrategyStats},
    strategy::{recommend, Recommendation, Situation},
    validate_deck_count, Action, Response, Result, TableConfig, TableError,
};

use self::{
    hand::{Hand, PlayerHands},
    shoe::Shoe,
};

const DEALER_STANDS_ON: u8 = 17;
const CARDS_PER_ROUND: usize = 4;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize_enum_str, Deserialize_enum_str,
)]
pub enum Suit {
    #[serde(rename = "♠")]
    Spade,
    #[serde(rename = "♣")]
    Club,
    #[serde(rename = "♥")]
    Heart,
    #[serde(rename = "♦")]
    Diamond,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    EnumCount,
    Serialize_enum_str,
    Deserialize_enum_str,
)]
pub enum Rank {
    #[serde(rename = "A")]
    Ace,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
}

static RANK_TO_VALUE: [u8; 13] = [11, 2, 3, 4, 5, 6, 7, 8, 9, 10, 10, 10, 10];
static RANK_TO_HI_LO: [i32; 13] = [-1, 1, 1, 1, 1, 1, 0, 0, 0, -1, -1, -1, -1];

/// Represents a card in the real world with a rank and a suit. The suit
/// never affects play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Card {
        Card { rank, suit }
    }

    /// Blackjack value with the Ace at 11.
    pub fn value(&self) -> u8 {
        RANK_TO_VALUE[self.rank as usize]
    }

    /// Hi-Lo tag: +1 for 2 to 6, -1 for tens and Aces, 0 otherwise.
    pub fn hi_lo(&self) -> i32 {
        RANK_TO_HI_LO[self.rank as usize]
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Dealing,
    InsurancePending,
    PlayerTurn,
    DealerTurn,
    RoundOver,
}

impl Phase {
    /// A round is in progress and has not been settled.
    pub fn is_game_active(self) -> bool {
        matches!(
            self,
            Phase::Dealing | Phase::InsurancePending | Phase::PlayerTurn | Phase::DealerTurn
        )
    }
}

/// Waits between card reveals so that a human can follow the deal.
pub trait Pacer {
    fn pause(&mut self, delay: Duration);
}

/// Does not wait at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPause;

impl Pacer for NoPause {
    fn pause(&mut self, _delay: Duration) {}
}

/// Blocks the calling thread for the whole delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleepPacer;

impl Pacer for ThreadSleepPacer {
    fn pause(&mut self, delay: Duration) {
        thread::sleep(delay);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Seat {
    Player { hand_index: usize },
    Dealer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TableEvent {
    ShoeReset { deck_count: u8 },
    /// `card` is `None` for the face-down hole card.
    CardDealt { seat: Seat, card: Option<Card> },
    HoleCardRevealed(Card),
    InsuranceOffered,
    InsuranceResolved { taken: bool, dealer_blackjack: bool },
    HandAdvanced { hand_index: usize },
    Feedback(Grade),
    RoundOver { message: String },
    Message(String),
}

/// Receives every table event along with the state right after it.
pub trait TableEventHandler {
    fn on_event(&mut self, event: &TableEvent, snapshot: &Snapshot);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_enum_str)]
pub enum Outcome {
    Win,
    Lose,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HandResult {
    pub hand_index: usize,
    pub outcome: Outcome,
    pub player_score: u8,
    pub dealer_score: u8,
}

/// Read-only view of the table for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub phase: Phase,
    pub busy: bool,
    pub game_active: bool,
    pub player_hands: Vec<Hand>,
    pub player_scores: Vec<u8>,
    pub active_hand: usize,
    pub split_mode: bool,
    /// The hole card is `None` while it is face down.
    pub dealer_cards: Vec<Option<Card>>,
    pub hole_card_hidden: bool,
    /// Only the up card's value while the hole card is hidden.
    pub dealer_score: u8,
    pub running_count: i32,
    pub true_count: f64,
    pub decks_remaining: f64,
    pub hand_count: i32,
    pub cards_dealt: usize,
    pub remaining: RemainingCards,
    pub message: String,
    pub recommendation: Option<Recommendation>,
    pub feedback: Option<Grade>,
    pub stats: StrategyStats,
    pub accuracy: u32,
    pub recent_mistakes: Vec<Mistake>,
    pub mistake_count: usize,
    pub recent_history: Vec<HistoryEntry>,
    pub results: Vec<HandResult>,
    pub insurance_offered: bool,
    pub insurance_taken: bool,
    pub shoe_elapsed: Duration,
}

/// A single-player blackjack table that keeps the Hi-Lo count and grades
/// every decision against the reference strategy.
pub struct Table {
    config: TableConfig,
    phase: Phase,
    busy: bool,

    // Shoe and count
    shoe: Shoe,
    counter: CountTracker,
    history: CountHistory,
    shoe_started: Instant,

    // Round state
    dealer: Hand,
    player: PlayerHands,
    hole_card_revealed: bool,
    insurance_offered: bool,
    insurance_taken: bool,
    results: Vec<HandResult>,
    message: String,

    // Grading
    grader: MoveGrader,
    last_feedback: Option<Grade>,

    pacer: Box<dyn Pacer>,
    handlers: Vec<Box<dyn TableEventHandler>>,
}

impl Table {
    /// Creates a table with a freshly shuffled shoe. Pauses with
    /// `ThreadSleepPacer` until another pacer is set.
    pub fn new(config: TableConfig) -> Result<Table> {
        config.validate()?;
        let shoe = match config.seed {
            Some(seed) => Shoe::with_seed(config.deck_count, seed)?,
            None => Shoe::new(config.deck_count)?,
        };
        Ok(Self::with_shoe(config, shoe))
    }

    /// Creates a table around a prepared shoe. The deck count of the shoe
    /// wins over the one in `config`.
    pub fn with_shoe(mut config: TableConfig, shoe: Shoe) -> Table {
        config.deck_count = shoe.deck_count();
        let mut table = Table {
            config,
            phase: Phase::Idle,
            busy: false,
            shoe,
            counter: CountTracker::new(),
            history: CountHistory::default(),
            shoe_started: Instant::now(),
            dealer: Hand::new(),
            player: PlayerHands::new(),
            hole_card_revealed: false,
            insurance_offered: false,
            insurance_taken: false,
            results: Vec::new(),
            message: String::new(),
            grader: MoveGrader::new(),
            last_feedback: None,
            pacer: Box::new(ThreadSleepPacer),
            handlers: Vec::new(),
        };
        table.record_history("Shoe reset");
        table
    }

    pub fn with_pacer(mut self, pacer: impl Pacer + 'static) -> Table {
        self.pacer = Box::new(pacer);
        self
    }

    pub fn subscribe(&mut self, handler: impl TableEventHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    #[allowed_phase(Idle, RoundOver)]
    pub fn deal(&mut self) -> Result<Response> {
        let remaining = self.shoe.len();
        if remaining < CARDS_PER_ROUND {
            let err = TableError::InsufficientCards { remaining };
            warn!(remaining, "not enough cards to deal");
            self.show_message(err.to_string());
            return Err(err);
        }

        self.clear_round();
        self.phase = Phase::Dealing;
        self.paced(|table| {
            table.deal_to_player(0)?;
            table.deal_to_dealer(true)?;
            table.deal_to_player(0)?;
            table.deal_to_dealer(false)?;

            let offer_insurance = table.config.insurance_enabled
                && table.up_card().map(|card| card.rank) == Some(Rank::Ace);
            if offer_insurance {
                table.insurance_offered = true;
                table.phase = Phase::InsurancePending;
                table.emit(TableEvent::InsuranceOffered);
                Ok(())
            } else {
                table.record_history("New hand dealt");
                table.start_player_turn()
            }
        })
    }

    #[allowed_phase(InsurancePending)]
    pub fn take_insurance(&mut self) -> Result<Response> {
        self.resolve_insurance(true)
    }

    #[allowed_phase(InsurancePending)]
    pub fn decline_insurance(&mut self) -> Result<Response> {
        self.resolve_insurance(false)
    }

    #[allowed_phase(PlayerTurn)]
    pub fn hit(&mut self) -> Result<Response> {
        self.grade_move(Action::Hit);
        self.paced(|table| {
            let hand_index = table.player.active_index();
            table.deal_to_player(hand_index)?;
            table.after_player_card(false)
        })
    }

    #[allowed_phase(PlayerTurn)]
    pub fn stand(&mut self) -> Result<Response> {
        self.grade_move(Action::Stand);
        self.paced(Table::advance_hand)
    }

    #[allowed_phase(PlayerTurn)]
    pub fn double(&mut self) -> Result<Response> {
        if self.player.active().len() != 2 {
            debug!(cards = self.player.active().len(), "double needs exactly two cards");
            return Ok(Response::Ignored);
        }
        self.grade_move(Action::Double);
        self.paced(|table| {
            let hand_index = table.player.active_index();
            table.deal_to_player(hand_index)?;
            table.after_player_card(true)
        })
    }

    #[allowed_phase(PlayerTurn)]
    pub fn split(&mut self) -> Result<Response> {
        if self.player.is_split() || !self.player.active().is_pair() {
            debug!(hand = %self.player.active().describe(), "hand cannot be split");
            return Ok(Response::Ignored);
        }
        self.grade_move(Action::Split);
        self.player.split_active();
        self.show_message("Playing first hand...");
        self.paced(|table| {
            table.deal_to_player(0)?;
            table.deal_to_player(1)?;
            if table.player.active().score() == 21 {
                table.advance_hand()?;
            }
            Ok(())
        })
    }

    /// Cancels any round in progress and starts a fresh shoe. Allowed in
    /// every phase.
    pub fn reset_shoe(&mut self, deck_count: u8) -> Result<Response> {
        validate_deck_count(deck_count)?;
        let cancelled = self.phase.is_game_active();
        self.clear_round();
        self.phase = Phase::Idle;
        self.busy = false;
        self.shoe.reset(deck_count)?;
        self.config.deck_count = deck_count;
        self.counter.reset();
        self.shoe_started = Instant::now();
        self.record_history("Shoe reset");
        info!(deck_count, cancelled, "shoe reset");
        if cancelled {
            self.message = String::from("Shoe reset - hand cancelled");
        }
        self.emit(TableEvent::ShoeReset { deck_count });
        Ok(Response::Applied)
    }

    pub fn set_deal_delay(&mut self, delay_ms: u64) {
        self.config.deal_delay_ms = delay_ms;
    }

    pub fn set_deviations_enabled(&mut self, enabled: bool) {
        self.config.deviations_enabled = enabled;
    }

    pub fn set_insurance_enabled(&mut self, enabled: bool) {
        self.config.insurance_enabled = enabled;
    }

    pub fn reset_stats(&mut self) {
        self.grader.reset();
        self.last_feedback = None;
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn shoe(&self) -> &Shoe {
        &self.shoe
    }

    pub fn grader(&self) -> &MoveGrader {
        &self.grader
    }

    pub fn history(&self) -> &CountHistory {
        &self.history
    }

    pub fn dealer_hand(&self) -> &Hand {
        &self.dealer
    }

    pub fn player_hands(&self) -> &[Hand] {
        self.player.hands()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn results(&self) -> &[HandResult] {
        &self.results
    }

    pub fn running_count(&self) -> i32 {
        self.counter.running_count()
    }

    pub fn true_count(&self) -> f64 {
        self.counter.true_count(&self.shoe)
    }

    /// Hi-Lo sum of the cards visible in the current round.
    pub fn hand_count(&self) -> i32 {
        let dealer = if self.hole_card_revealed {
            self.dealer.hi_lo()
        } else {
            self.up_card().map_or(0, |card| card.hi_lo())
        };
        self.player.hi_lo() + dealer
    }

    /// The reference play for the current decision, if one is pending.
    pub fn recommendation(&self) -> Option<Recommendation> {
        if !matches!(self.phase, Phase::InsurancePending | Phase::PlayerTurn) {
            return None;
        }
        let up_card = self.up_card()?;
        let hand = self.player.active();
        let situation = Situation::new(hand, up_card, self.true_count())
            .with_deviations(self.config.deviations_enabled)
            .with_insurance_pending(self.phase == Phase::InsurancePending)
            .with_split_allowed(!self.player.is_split());
        Some(recommend(&situation))
    }

    pub fn snapshot(&self) -> Snapshot {
        let hole_card_hidden = !self.hole_card_revealed && self.dealer.len() >= 2;
        let dealer_cards = self
            .dealer
            .cards()
            .iter()
            .enumerate()
            .map(|(i, card)| (i != 1 || !hole_card_hidden).then_some(*card))
            .collect();
        let dealer_score = if hole_card_hidden {
            self.up_card().map_or(0, |card| card.value())
        } else {
            self.dealer.score()
        };
        let stats = self.grader.stats();

        Snapshot {
            phase: self.phase,
            busy: self.busy,
            game_active: self.phase.is_game_active(),
            player_hands: self.player.hands().to_vec(),
            player_scores: self.player.hands().iter().map(Hand::score).collect(),
            active_hand: self.player.active_index(),
            split_mode: self.player.is_split(),
            dealer_cards,
            hole_card_hidden,
            dealer_score,
            running_count: self.running_count(),
            true_count: self.true_count(),
            decks_remaining: self.shoe.decks_remaining(),
            hand_count: self.hand_count(),
            cards_dealt: self.shoe.cards_dealt(),
            remaining: RemainingCards::tally(&self.shoe),
            message: self.message.clone(),
            recommendation: self.recommendation(),
            feedback: self.last_feedback.clone(),
            stats,
            accuracy: stats.accuracy(),
            recent_mistakes: self.grader.recent_mistakes(),
            mistake_count: self.grader.mistake_count(),
            recent_history: self.history.recent(),
            results: self.results.clone(),
            insurance_offered: self.insurance_offered,
            insurance_taken: self.insurance_taken,
            shoe_elapsed: self.shoe_started.elapsed(),
        }
    }

    /// Runs a sequence of paced steps with the busy flag raised.
    fn paced<F>(&mut self, sequence: F) -> Result<Response>
    where
        F: FnOnce(&mut Table) -> Result<()>,
    {
        self.busy = true;
        let outcome = sequence(self);
        self.busy = false;
        outcome.map(|()| Response::Applied)
    }

    fn pause(&mut self) {
        let delay = Duration::from_millis(self.config.deal_delay_ms);
        self.pacer.pause(delay);
    }

    fn emit(&mut self, event: TableEvent) {
        if self.handlers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for handler in self.handlers.iter_mut() {
            handler.on_event(&event, &snapshot);
        }
    }

    fn show_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.emit(TableEvent::Message(self.message.clone()));
    }

    fn record_history(&mut self, event: impl Into<String>) {
        let true_count = self.true_count();
        self.history.record(
            event,
            self.counter.running_count(),
            true_count,
            self.shoe_started.elapsed(),
        );
    }

    fn up_card(&self) -> Option<Card> {
        self.dealer.cards().first().copied()
    }

    fn clear_round(&mut self) {
        self.dealer = Hand::new();
        self.player.clear();
        self.hole_card_revealed = false;
        self.insurance_offered = false;
        self.insurance_taken = false;
        self.results.clear();
        self.message.clear();
        self.last_feedback = None;
    }

    /// Draws the next card and counts it if it is dealt face up.
    fn draw(&mut self, counted: bool) -> Result<Card> {
        match self.shoe.draw() {
            Ok(card) => {
                self.counter.record(card, counted);
                debug!(
                    %card,
                    counted,
                    running_count = self.counter.running_count(),
                    "card drawn"
                );
                Ok(card)
            }
            Err(err) => {
                warn!("shoe ran out of cards mid-round");
                self.show_message(err.to_string());
                Err(err)
            }
        }
    }

    fn deal_to_player(&mut self, hand_index: usize) -> Result<()> {
        let card = self.draw(true)?;
        self.player.receive_card_at(hand_index, card);
        self.emit(TableEvent::CardDealt {
            seat: Seat::Player { hand_index },
            card: Some(card),
        });
        self.pause();
        Ok(())
    }

    fn deal_to_dealer(&mut self, face_up: bool) -> Result<()> {
        let card = self.draw(face_up)?;
        self.dealer.receive_card(card);
        self.emit(TableEvent::CardDealt {
            seat: Seat::Dealer,
            card: face_up.then_some(card),
        });
        self.pause();
        Ok(())
    }

    /// Turns the hole card face up and adds it to the count.
    fn reveal_hole_card(&mut self) {
        if self.hole_card_revealed {
            return;
        }
        if let Some(&hole) = self.dealer.cards().get(1) {
            self.counter.record(hole, true);
            self.hole_card_revealed = true;
            debug!(card = %hole, running_count = self.counter.running_count(), "hole card revealed");
            self.emit(TableEvent::HoleCardRevealed(hole));
        }
    }

    fn grade_move(&mut self, action: Action) {
        let Some(recommendation) = self.recommendation() else {
            return;
        };
        let Some(up_card) = self.up_card() else {
            return;
        };
        let grade = self
            .grader
            .grade(action, &recommendation, self.player.active(), up_card);
        self.last_feedback = Some(grade.clone());
        self.emit(TableEvent::Feedback(grade));
    }

    fn resolve_insurance(&mut self, taken: bool) -> Result<Response> {
        self.insurance_offered = false;
        self.insurance_taken = taken;
        // Peek without turning the hole card over.
        let dealer_blackjack = self
            .dealer
            .cards()
            .get(1)
            .is_some_and(|hole| hole.value() == 10);
        if taken {
            self.show_message(if dealer_blackjack {
                "Dealer has blackjack! Insurance pays 2:1"
            } else {
                "Dealer does not have blackjack. Insurance lost."
            });
        }
        self.emit(TableEvent::InsuranceResolved {
            taken,
            dealer_blackjack,
        });
        self.paced(|table| {
            if dealer_blackjack {
                table.dealer_turn()
            } else {
                table.start_player_turn()
            }
        })
    }

    /// A player 21 is stood automatically and graded as a stand.
    fn start_player_turn(&mut self) -> Result<()> {
        self.phase = Phase::PlayerTurn;
        if self.player.active().score() == 21 {
            self.grade_move(Action::Stand);
            self.pause();
            self.advance_hand()?;
        }
        Ok(())
    }

    /// Continues after the active hand got a card from a hit or a double.
    fn after_player_card(&mut self, doubled: bool) -> Result<()> {
        let score = self.player.active().score();
        if score > 21 {
            if self.player.is_split() {
                let message = format!("Hand {} busts!", self.player.active_index() + 1);
                self.show_message(message);
                self.pause();
                self.advance_hand()
            } else {
                self.end_round_player_bust();
                Ok(())
            }
        } else if doubled || score == 21 {
            if self.player.is_split() && !doubled {
                self.pause();
            } else if !doubled {
                self.grade_move(Action::Stand);
            }
            self.advance_hand()
        } else {
            Ok(())
        }
    }

    /// Moves to the next split hand, skipping those already at 21, or hands
    /// over to the dealer after the last one.
    fn advance_hand(&mut self) -> Result<()> {
        while self.player.advance() {
            let hand_index = self.player.active_index();
            self.show_message(format!("Playing hand {}...", hand_index + 1));
            self.emit(TableEvent::HandAdvanced { hand_index });
            if self.player.active().score() != 21 {
                return Ok(());
            }
            self.pause();
        }
        self.dealer_turn()
    }

    fn dealer_turn(&mut self) -> Result<()> {
        self.phase = Phase::DealerTurn;
        self.reveal_hole_card();
        self.pause();
        // A player natural is settled against the dealer's first two cards.
        if !self.player.has_natural() {
            while self.dealer.score() < DEALER_STANDS_ON {
                self.deal_to_dealer(true)?;
            }
        }
        self.settle();
        Ok(())
    }

    fn end_round_player_bust(&mut self) {
        self.reveal_hole_card();
        let player_score = self.player.active().score();
        self.results = vec![HandResult {
            hand_index: 0,
            outcome: Outcome::Lose,
            player_score,
            dealer_score: self.dealer.score(),
        }];
        self.finish_round(String::from("Bust! You lose."));
    }

    fn settle(&mut self) {
        let dealer_score = self.dealer.score();
        let message = if self.player.is_split() {
            let mut parts = Vec::with_capacity(self.player.hands().len());
            for (hand_index, hand) in self.player.hands().iter().enumerate() {
                let player_score = hand.score();
                let (outcome, label) = if player_score > 21 {
                    (Outcome::Lose, "Bust")
                } else if dealer_score > 21 {
                    (Outcome::Win, "Win (Dealer bust)")
                } else if player_score > dealer_score {
                    (Outcome::Win, "Win")
                } else if player_score < dealer_score {
                    (Outcome::Lose, "Lose")
                } else {
                    (Outcome::Push, "Push")
                };
                self.results.push(HandResult {
                    hand_index,
                    outcome,
                    player_score,
                    dealer_score,
                });
                parts.push(format!("Hand {}: {}", hand_index + 1, label));
            }
            parts.join(", ")
        } else {
            let hand = self.player.active();
            let player_score = hand.score();
            let player_natural = hand.is_blackjack();
            let dealer_natural = self.dealer.is_blackjack();
            let (outcome, message) = if player_natural && dealer_natural {
                (Outcome::Push, "Push! Both have blackjack.")
            } else if player_natural {
                (Outcome::Win, "Blackjack! You win!")
            } else if dealer_natural {
                (Outcome::Lose, "Dealer blackjack. You lose.")
            } else if dealer_score > 21 {
                (Outcome::Win, "Dealer bust! You win!")
            } else if player_score > dealer_score {
                (Outcome::Win, "You win!")
            } else if player_score < dealer_score {
                (Outcome::Lose, "You lose.")
            } else {
                (Outcome::Push, "Push!")
            };
            self.results.push(HandResult {
                hand_index: 0,
                outcome,
                player_score,
                dealer_score,
            });
            String::from(message)
        };
        self.finish_round(message);
    }

    fn finish_round(&mut self, message: String) {
        self.phase = Phase::RoundOver;
        self.record_history(format!("Hand ended: {message}"));
        info!(
            result = %message,
            running_count = self.counter.running_count(),
            true_count = self.true_count(),
            "round over"
        );
        self.message = message.clone();
        self.emit(TableEvent::RoundOver { message });
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    fn card(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    fn config() -> TableConfig {
        TableConfig {
            deal_delay_ms: 0,
            ..TableConfig::default()
        }
    }

    fn table_with(firsts: &[Card]) -> Table {
        table_with_config(config(), firsts)
    }

    fn table_with_config(config: TableConfig, firsts: &[Card]) -> Table {
        let shoe = Shoe::with_firsts(config.deck_count, firsts).unwrap();
        Table::with_shoe(config, shoe).with_pacer(NoPause)
    }

    #[derive(Default)]
    struct Recorder {
        events: Rc<RefCell<Vec<TableEvent>>>,
        busy_seen: Rc<RefCell<bool>>,
    }

    impl TableEventHandler for Recorder {
        fn on_event(&mut self, event: &TableEvent, snapshot: &Snapshot) {
            self.events.borrow_mut().push(event.clone());
            if snapshot.busy {
                *self.busy_seen.borrow_mut() = true;
            }
        }
    }

    #[test]
    fn card_values_and_tags() {
        assert_eq!(card(Rank::Ace, Suit::Heart).value(), 11);
        assert_eq!(card(Rank::King, Suit::Heart).value(), 10);
        assert_eq!(card(Rank::Seven, Suit::Heart).value(), 7);
        assert_eq!(card(Rank::Two, Suit::Club).hi_lo(), 1);
        assert_eq!(card(Rank::Six, Suit::Club).hi_lo(), 1);
        assert_eq!(card(Rank::Nine, Suit::Club).hi_lo(), 0);
        assert_eq!(card(Rank::Queen, Suit::Club).hi_lo(), -1);
        assert_eq!(card(Rank::Ace, Suit::Club).hi_lo(), -1);
        assert_eq!(card(Rank::Ten, Suit::Spade).to_string(), "10♠");
        assert_eq!(card(Rank::Ace, Suit::Heart).to_string(), "A♥");
    }

    #[test]
    fn dealer_eighteen_beats_seventeen() {
        let mut table = table_with(&[
            card(Rank::Seven, Suit::Spade),
            card(Rank::Seven, Suit::Heart),
            card(Rank::Ten, Suit::Spade),
            card(Rank::Ace, Suit::Heart),
            card(Rank::Five, Suit::Diamond),
        ]);
        assert_eq!(table.deal(), Ok(Response::Applied));
        assert_eq!(table.phase(), Phase::PlayerTurn);
        // The hole card is not counted yet.
        assert_eq!(table.running_count(), -1);
        assert_eq!(table.hand_count(), -1);
        let snapshot = table.snapshot();
        assert!(snapshot.hole_card_hidden);
        assert_eq!(snapshot.dealer_cards[1], None);
        assert_eq!(snapshot.dealer_score, 7);

        assert_eq!(table.stand(), Ok(Response::Applied));
        assert_eq!(table.phase(), Phase::Idle);
        assert_eq!(table.dealer_hand().score(), 18);
        assert_eq!(table.dealer_hand().len(), 2);
        assert_eq!(table.running_count(), -2);
        assert_eq!(table.message(), "You lose.");
        assert_eq!(table.results()[0].outcome, Outcome::Lose);
        assert_eq!(table.shoe().len(), 48);
        // Standing on hard 17 is the reference play.
        assert_eq!(table.grader().stats().correct_moves, 1);

        let history = table.history().recent();
        assert_eq!(history[0].event, "Hand ended: You lose.");
        assert_eq!(history[0].running_count, -2);
        assert_eq!(history[1].event, "New hand dealt");
    }

    #[test]
    fn commands_outside_their_phase_are_ignored() {
        let mut table = table_with(&[
            card(Rank::Two, Suit::Spade),
            card(Rank::Ten, Suit::Heart),
            card(Rank::Three, Suit::Spade),
            card(Rank::Eight, Suit::Heart),
        ]);
        assert_eq!(table.hit(), Ok(Response::Ignored));
        assert_eq!(table.stand(), Ok(Response::Ignored));
        assert_eq!(table.take_insurance(), Ok(Response::Ignored));
        assert_eq!(table.phase(), Phase::Idle);
        assert_eq!(table.shoe().cards_dealt(), 0);
        assert_eq!(table.grader().stats().total_moves, 0);

        table.deal().unwrap();
        assert_eq!(table.deal(), Ok(Response::Ignored));
    }

    #[test]
    fn deal_needs_four_cards() {
        let mut table = table_with(&[]);
        while table.shoe.len() > 3 {
            table.shoe.draw().unwrap();
        }
        let dealt = table.shoe().cards_dealt();
        assert_eq!(
            table.deal(),
            Err(TableError::InsufficientCards { remaining: 3 })
        );
        assert_eq!(table.phase(), Phase::Idle);
        assert_eq!(table.shoe().cards_dealt(), dealt);
        assert!(table.message().starts_with("Not enough cards!"));
    }

    #[test]
    fn insurance_taken_against_dealer_blackjack() {
        let mut table = table_with(&[
            card(Rank::Ten, Suit::Spade),
            card(Rank::Ace, Suit::Heart),
            card(Rank::Nine, Suit::Spade),
            card(Rank::King, Suit::Heart),
        ]);
        table.deal().unwrap();
        assert_eq!(table.phase(), Phase::InsurancePending);
        assert_eq!(
            table.recommendation().map(|r| r.action),
            Some(Action::NoInsurance)
        );
        assert_eq!(table.hit(), Ok(Response::Ignored));

        // The deal is logged once the insurance question is settled.
        assert_eq!(table.history().recent()[0].event, "Shoe reset");
        assert!(table.snapshot().insurance_offered);

        assert_eq!(table.take_insurance(), Ok(Response::Applied));
        assert!(!table.snapshot().insurance_offered);
        assert_eq!(table.phase(), Phase::Idle);
        assert_eq!(table.message(), "Dealer blackjack. You lose.");
        assert_eq!(table.dealer_hand().len(), 2);
        assert_eq!(table.running_count(), -3);
        assert!(table.snapshot().insurance_taken);
    }

    #[test]
    fn insurance_declined_without_dealer_blackjack() {
        let mut table = table_with(&[
            card(Rank::Ten, Suit::Spade),
            card(Rank::Ace, Suit::Heart),
            card(Rank::Six, Suit::Spade),
            card(Rank::Five, Suit::Heart),
        ]);
        table.deal().unwrap();
        assert_eq!(table.phase(), Phase::InsurancePending);
        assert_eq!(table.decline_insurance(), Ok(Response::Applied));
        assert_eq!(table.phase(), Phase::PlayerTurn);
        let snapshot = table.snapshot();
        assert!(!snapshot.insurance_offered);
        assert!(!snapshot.insurance_taken);
        assert_eq!(table.history().recent()[0].event, "Shoe reset");
        assert_eq!(table.recommendation().map(|r| r.action), Some(Action::Hit));
        // Peeking does not count the hole card.
        assert_eq!(table.running_count(), -1);
    }

    #[test]
    fn insurance_is_not_offered_when_disabled() {
        let mut config = config();
        config.insurance_enabled = false;
        let mut table = table_with_config(
            config,
            &[
                card(Rank::Ten, Suit::Spade),
                card(Rank::Ace, Suit::Heart),
                card(Rank::Six, Suit::Spade),
                card(Rank::Five, Suit::Heart),
            ],
        );
        table.deal().unwrap();
        assert_eq!(table.phase(), Phase::PlayerTurn);
    }

    #[test]
    fn bust_reveals_hole_card_without_dealer_draws() {
        let mut table = table_with(&[
            card(Rank::Ten, Suit::Spade),
            card(Rank::Nine, Suit::Heart),
            card(Rank::Six, Suit::Spade),
            card(Rank::Two, Suit::Heart),
            card(Rank::King, Suit::Club),
        ]);
        table.deal().unwrap();
        assert_eq!(table.running_count(), 0);
        assert_eq!(table.hit(), Ok(Response::Applied));
        assert_eq!(table.phase(), Phase::Idle);
        assert_eq!(table.message(), "Bust! You lose.");
        assert_eq!(table.dealer_hand().len(), 2);
        // Hole 2 (+1) and the busting King (-1).
        assert_eq!(table.running_count(), 0);
        assert!(!table.snapshot().hole_card_hidden);
    }

    #[test]
    fn double_takes_exactly_one_card() {
        let mut table = table_with(&[
            card(Rank::Six, Suit::Spade),
            card(Rank::Six, Suit::Heart),
            card(Rank::Five, Suit::Spade),
            card(Rank::Ten, Suit::Heart),
            card(Rank::Two, Suit::Club),
            card(Rank::Nine, Suit::Club),
        ]);
        table.deal().unwrap();
        assert_eq!(table.double(), Ok(Response::Applied));
        assert_eq!(table.player_hands()[0].len(), 3);
        assert_eq!(table.player_hands()[0].score(), 13);
        // Dealer 16 draws the nine and busts.
        assert_eq!(table.dealer_hand().score(), 25);
        assert_eq!(table.message(), "Dealer bust! You win!");
        assert_eq!(table.grader().stats(), StrategyStats { correct_moves: 1, total_moves: 1 });
    }

    #[test]
    fn double_needs_two_cards() {
        let mut table = table_with(&[
            card(Rank::Two, Suit::Spade),
            card(Rank::Ten, Suit::Heart),
            card(Rank::Three, Suit::Spade),
            card(Rank::Eight, Suit::Heart),
            card(Rank::Two, Suit::Club),
        ]);
        table.deal().unwrap();
        table.hit().unwrap();
        assert_eq!(table.player_hands()[0].len(), 3);
        assert_eq!(table.double(), Ok(Response::Ignored));
        assert_eq!(table.grader().stats().total_moves, 1);
    }

    #[test]
    fn split_plays_both_hands() {
        let mut table = table_with(&[
            card(Rank::Eight, Suit::Spade),
            card(Rank::Ten, Suit::Heart),
            card(Rank::Eight, Suit::Heart),
            card(Rank::Seven, Suit::Heart),
            card(Rank::Three, Suit::Club),
            card(Rank::King, Suit::Club),
            card(Rank::Nine, Suit::Diamond),
        ]);
        table.set_deviations_enabled(false);
        table.deal().unwrap();
        assert_eq!(table.recommendation().map(|r| r.action), Some(Action::Split));
        assert_eq!(table.split(), Ok(Response::Applied));
        assert!(table.snapshot().split_mode);
        assert_eq!(table.player_hands()[0].score(), 11);
        assert_eq!(table.player_hands()[1].score(), 18);
        assert_eq!(table.snapshot().active_hand, 0);

        // Only one split per round.
        assert_eq!(table.split(), Ok(Response::Ignored));

        table.hit().unwrap();
        assert_eq!(table.player_hands()[0].score(), 20);
        table.stand().unwrap();
        assert_eq!(table.snapshot().active_hand, 1);
        table.stand().unwrap();

        assert_eq!(table.phase(), Phase::Idle);
        assert_eq!(table.dealer_hand().score(), 17);
        assert_eq!(table.message(), "Hand 1: Win, Hand 2: Win");
        assert_eq!(table.results().len(), 2);
    }

    #[test]
    fn split_hand_bust_moves_to_next_hand() {
        let mut table = table_with(&[
            card(Rank::Eight, Suit::Spade),
            card(Rank::Ten, Suit::Heart),
            card(Rank::Eight, Suit::Heart),
            card(Rank::Nine, Suit::Heart),
            card(Rank::Six, Suit::Club),
            card(Rank::Two, Suit::Club),
            card(Rank::Queen, Suit::Diamond),
        ]);
        table.deal().unwrap();
        table.split().unwrap();
        assert_eq!(table.player_hands()[0].score(), 14);
        table.hit().unwrap();
        assert_eq!(table.snapshot().active_hand, 1);
        assert_eq!(table.phase(), Phase::PlayerTurn);
        table.stand().unwrap();
        assert_eq!(table.message(), "Hand 1: Bust, Hand 2: Lose");
    }

    #[test]
    fn split_aces_reaching_twenty_one_play_themselves() {
        let mut table = table_with(&[
            card(Rank::Ace, Suit::Spade),
            card(Rank::Nine, Suit::Heart),
            card(Rank::Ace, Suit::Heart),
            card(Rank::Eight, Suit::Heart),
            card(Rank::King, Suit::Club),
            card(Rank::Queen, Suit::Club),
        ]);
        table.deal().unwrap();
        table.split().unwrap();
        assert_eq!(table.phase(), Phase::Idle);
        assert_eq!(table.message(), "Hand 1: Win, Hand 2: Win");
    }

    #[test]
    fn player_blackjack_stands_automatically() {
        let mut table = table_with(&[
            card(Rank::Ace, Suit::Spade),
            card(Rank::Nine, Suit::Heart),
            card(Rank::King, Suit::Spade),
            card(Rank::Five, Suit::Heart),
        ]);
        table.deal().unwrap();
        assert_eq!(table.phase(), Phase::Idle);
        assert_eq!(table.message(), "Blackjack! You win!");
        // The dealer does not draw against a natural.
        assert_eq!(table.dealer_hand().len(), 2);
        // The automatic stand is graded like a stand by the player.
        assert_eq!(table.grader().stats(), StrategyStats { correct_moves: 1, total_moves: 1 });
        assert!(table.snapshot().feedback.is_some_and(|grade| grade.correct));
    }

    #[test]
    fn hitting_to_twenty_one_stands_and_grades() {
        let mut table = table_with(&[
            card(Rank::Two, Suit::Spade),
            card(Rank::Ten, Suit::Heart),
            card(Rank::Three, Suit::Spade),
            card(Rank::Eight, Suit::Heart),
            card(Rank::Six, Suit::Club),
            card(Rank::King, Suit::Club),
        ]);
        table.deal().unwrap();
        table.hit().unwrap();
        assert_eq!(table.phase(), Phase::PlayerTurn);
        assert_eq!(table.player_hands()[0].score(), 11);
        table.hit().unwrap();

        assert_eq!(table.phase(), Phase::Idle);
        assert_eq!(table.message(), "You win!");
        assert_eq!(table.grader().stats(), StrategyStats { correct_moves: 3, total_moves: 3 });
    }

    #[test]
    fn empty_shoe_mid_round_keeps_the_round() {
        let mut table = table_with(&[
            card(Rank::Two, Suit::Spade),
            card(Rank::Ten, Suit::Heart),
            card(Rank::Three, Suit::Spade),
            card(Rank::Eight, Suit::Heart),
        ]);
        table.shoe.keep_next(4);
        table.deal().unwrap();
        assert_eq!(table.shoe().len(), 0);
        assert_eq!(table.running_count(), 1);

        assert_eq!(table.hit(), Err(TableError::EmptyShoe));
        assert_eq!(table.message(), "Shoe is empty! Please reset.");
        assert_eq!(table.running_count(), 1);
        assert_eq!(table.player_hands()[0].len(), 2);
        assert_eq!(table.phase(), Phase::PlayerTurn);
        assert!(!table.is_busy());

        assert_eq!(table.reset_shoe(1), Ok(Response::Applied));
        assert_eq!(table.phase(), Phase::Idle);
        assert_eq!(table.running_count(), 0);
        assert_eq!(table.shoe().len(), 52);
        assert_eq!(table.deal(), Ok(Response::Applied));
    }

    #[test]
    fn outcome_is_independent_of_deal_delay() {
        let firsts = [
            card(Rank::Nine, Suit::Spade),
            card(Rank::Six, Suit::Heart),
            card(Rank::Seven, Suit::Spade),
            card(Rank::Ten, Suit::Heart),
            card(Rank::Six, Suit::Club),
        ];
        let mut outcomes = Vec::new();
        for delay in [0, 1, 5] {
            let mut config = config();
            config.deal_delay_ms = delay;
            let mut table = table_with_config(config, &firsts).with_pacer(ThreadSleepPacer);
            table.deal().unwrap();
            table.stand().unwrap();
            outcomes.push((table.message().to_string(), table.running_count()));
        }
        assert!(outcomes.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(outcomes[0].0, "Dealer bust! You win!");
    }

    #[test]
    fn reset_shoe_cancels_round() {
        let mut table = table_with(&[
            card(Rank::Two, Suit::Spade),
            card(Rank::Ten, Suit::Heart),
            card(Rank::Three, Suit::Spade),
            card(Rank::Eight, Suit::Heart),
            card(Rank::Two, Suit::Club),
            card(Rank::Ten, Suit::Spade),
            card(Rank::Three, Suit::Club),
            card(Rank::Eight, Suit::Spade),
        ]);
        table.deal().unwrap();
        table.stand().unwrap();
        table.deal().unwrap();
        assert_eq!(table.phase(), Phase::PlayerTurn);
        assert_eq!(table.reset_shoe(9), Err(TableError::InvalidDeckCount(9)));

        assert_eq!(table.reset_shoe(2), Ok(Response::Applied));
        assert_eq!(table.phase(), Phase::Idle);
        assert_eq!(table.running_count(), 0);
        assert_eq!(table.shoe().len(), 104);
        assert_eq!(table.shoe().cards_dealt(), 0);
        assert_eq!(table.config().deck_count, 2);
        assert!(table.player_hands()[0].is_empty());
        assert_eq!(table.message(), "Shoe reset - hand cancelled");
        assert_eq!(table.history().recent()[0].event, "Shoe reset");
        // Statistics survive a new shoe.
        assert_eq!(table.grader().stats().total_moves, 1);
    }

    #[test]
    fn wrong_move_produces_feedback_and_mistake() {
        let mut table = table_with(&[
            card(Rank::Ten, Suit::Spade),
            card(Rank::Ten, Suit::Heart),
            card(Rank::Six, Suit::Spade),
            card(Rank::Eight, Suit::Heart),
            card(Rank::Two, Suit::Club),
        ]);
        table.set_deviations_enabled(false);
        table.deal().unwrap();
        table.stand().unwrap();
        let snapshot = table.snapshot();
        let feedback = snapshot.feedback.unwrap();
        assert!(!feedback.correct);
        assert_eq!(feedback.message, "Incorrect. Should hit: Hit 16 vs dealer 10");
        assert_eq!(snapshot.mistake_count, 1);
        assert_eq!(snapshot.recent_mistakes[0].dealer_up_card, "10♥");
        assert_eq!(snapshot.accuracy, 0);

        table.reset_stats();
        assert_eq!(table.snapshot().mistake_count, 0);
    }

    #[test]
    fn observers_see_events_while_busy() {
        let mut table = table_with(&[
            card(Rank::Two, Suit::Spade),
            card(Rank::Ten, Suit::Heart),
            card(Rank::Three, Suit::Spade),
            card(Rank::Eight, Suit::Heart),
        ]);
        let recorder = Recorder::default();
        let events = Rc::clone(&recorder.events);
        let busy_seen = Rc::clone(&recorder.busy_seen);
        table.subscribe(recorder);

        table.deal().unwrap();
        assert!(!table.is_busy());
        assert!(*busy_seen.borrow());
        let events = events.borrow();
        let dealt = events
            .iter()
            .filter(|event| matches!(event, TableEvent::CardDealt { .. }))
            .count();
        assert_eq!(dealt, 4);
        assert!(events.contains(&TableEvent::CardDealt {
            seat: Seat::Dealer,
            card: None,
        }));
    }
}
