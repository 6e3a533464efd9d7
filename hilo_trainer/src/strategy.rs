use std::fmt;

use serde::Serialize;

use crate::{
    table::{hand::Hand, Card, Rank},
    Action,
};

/// Insurance is worth taking from this rounded true count on.
pub const INSURANCE_THRESHOLD: i32 = 3;

/// Dealer up card as a chart column: 2 to 10, then Ace (stored as 11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DealerUp(u8);

impl DealerUp {
    pub const ACE: DealerUp = DealerUp(11);

    pub const fn of(value: u8) -> DealerUp {
        DealerUp(value)
    }

    pub fn from_card(card: Card) -> DealerUp {
        DealerUp(card.value())
    }

    fn column(self) -> usize {
        (self.0 - 2) as usize
    }
}

impl fmt::Display for DealerUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == DealerUp::ACE {
            write!(f, "A")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Everything the recommendation depends on.
#[derive(Debug, Clone, Copy)]
pub struct Situation<'a> {
    pub hand: &'a Hand,
    pub dealer_up: Card,
    pub true_count: f64,
    pub use_deviations: bool,
    /// Insurance has been offered and not decided yet.
    pub insurance_pending: bool,
    /// Splitting the hand is a legal move right now.
    pub split_allowed: bool,
}

impl<'a> Situation<'a> {
    pub fn new(hand: &'a Hand, dealer_up: Card, true_count: f64) -> Self {
        Situation {
            hand,
            dealer_up,
            true_count,
            use_deviations: false,
            insurance_pending: false,
            split_allowed: hand.is_pair(),
        }
    }

    pub fn with_deviations(mut self, use_deviations: bool) -> Self {
        self.use_deviations = use_deviations;
        self
    }

    pub fn with_insurance_pending(mut self, insurance_pending: bool) -> Self {
        self.insurance_pending = insurance_pending;
        self
    }

    pub fn with_split_allowed(mut self, split_allowed: bool) -> Self {
        self.split_allowed = split_allowed && self.hand.is_pair();
        self
    }

    fn rounded_true_count(&self) -> i32 {
        round_true_count(self.true_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub action: Action,
    pub rationale: String,
}

impl Recommendation {
    fn new(action: Action, rationale: impl Into<String>) -> Self {
        Recommendation {
            action,
            rationale: rationale.into(),
        }
    }
}

/// Rounds to the nearest integer, halves upward (-2.5 becomes -2).
pub fn round_true_count(true_count: f64) -> i32 {
    (true_count + 0.5).floor() as i32
}

// A chart cell is the preferred action and the action taken when doubling
// is no longer possible.
type Cell = (Action, Action);

const H: Cell = (Action::Hit, Action::Hit);
const S: Cell = (Action::Stand, Action::Stand);
const DH: Cell = (Action::Double, Action::Hit);
const DS: Cell = (Action::Double, Action::Stand);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairCell {
    Split,
    NoSplit,
    SplitIfDas,
}

const Y: PairCell = PairCell::Split;
const N: PairCell = PairCell::NoSplit;
const YN: PairCell = PairCell::SplitIfDas;

// Columns are dealer 2, 3, 4, 5, 6, 7, 8, 9, 10, A.
const HARD_CHART: [[Cell; 10]; 9] = [
    [H, H, H, H, H, H, H, H, H, H], // 8
    [H, DH, DH, DH, DH, H, H, H, H, H],
    [DH, DH, DH, DH, DH, DH, DH, DH, H, H],
    [DH, DH, DH, DH, DH, DH, DH, DH, DH, DH],
    [H, H, S, S, S, H, H, H, H, H],
    [S, S, S, S, S, H, H, H, H, H],
    [S, S, S, S, S, H, H, H, H, H],
    [S, S, S, S, S, H, H, H, H, H],
    [S, S, S, S, S, H, H, H, H, H], // 16
];

const SOFT_CHART: [[Cell; 10]; 8] = [
    [H, H, H, DH, DH, H, H, H, H, H], // Ace + 2
    [H, H, H, DH, DH, H, H, H, H, H],
    [H, H, DH, DH, DH, H, H, H, H, H],
    [H, H, DH, DH, DH, H, H, H, H, H],
    [H, DH, DH, DH, DH, H, H, H, H, H],
    [DS, DS, DS, DS, DS, S, S, H, H, H],
    [S, S, S, S, DS, S, S, S, S, S],
    [S, S, S, S, S, S, S, S, S, S], // Ace + 9
];

// Rows follow `Rank` order up to the ten; J, Q and K use the ten row.
const PAIR_CHART: [[PairCell; 10]; 10] = [
    [Y, Y, Y, Y, Y, Y, Y, Y, Y, Y], // A,A
    [YN, YN, Y, Y, Y, Y, N, N, N, N], // 2,2
    [YN, YN, Y, Y, Y, Y, N, N, N, N],
    [N, N, N, YN, YN, N, N, N, N, N],
    [N, N, N, N, N, N, N, N, N, N],
    [YN, Y, Y, Y, Y, N, N, N, N, N],
    [Y, Y, Y, Y, Y, Y, N, N, N, N],
    [Y, Y, Y, Y, Y, Y, Y, Y, Y, Y],
    [Y, Y, Y, Y, Y, N, Y, Y, N, N],
    [N, N, N, N, N, N, N, N, N, N], // T,T
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviationHand {
    TenPair,
    Hard(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    AtLeast,
    AtMost,
    Below,
}

impl Comparison {
    fn holds(self, count: i32, threshold: i32) -> bool {
        match self {
            Comparison::AtLeast => count >= threshold,
            Comparison::AtMost => count <= threshold,
            Comparison::Below => count < threshold,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Comparison::AtLeast => "≥",
            Comparison::AtMost => "≤",
            Comparison::Below => "<",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Deviation {
    hand: DeviationHand,
    dealer: DealerUp,
    comparison: Comparison,
    threshold: i32,
    action: Action,
}

const fn deviation(
    hand: DeviationHand,
    dealer: DealerUp,
    comparison: Comparison,
    threshold: i32,
    action: Action,
) -> Deviation {
    Deviation {
        hand,
        dealer,
        comparison,
        threshold,
        action,
    }
}

/// Checked in order, first match wins. Pair rules come first.
const DEVIATIONS: [Deviation; 17] = {
    use Action::{Double, Hit, Split, Stand};
    use Comparison::{AtLeast, AtMost, Below};
    use DeviationHand::{Hard, TenPair};
    [
        deviation(TenPair, DealerUp::of(5), AtLeast, 5, Split),
        deviation(TenPair, DealerUp::of(6), AtLeast, 4, Split),
        deviation(Hard(16), DealerUp::of(10), AtLeast, 0, Stand),
        deviation(Hard(16), DealerUp::of(9), AtLeast, 5, Stand),
        deviation(Hard(15), DealerUp::of(10), AtLeast, 4, Stand),
        deviation(Hard(13), DealerUp::of(2), AtLeast, -1, Stand),
        deviation(Hard(13), DealerUp::of(3), AtMost, -2, Hit),
        deviation(Hard(12), DealerUp::of(2), AtLeast, 3, Stand),
        deviation(Hard(12), DealerUp::of(3), AtLeast, 2, Stand),
        deviation(Hard(12), DealerUp::of(4), Below, 0, Hit),
        deviation(Hard(12), DealerUp::of(5), AtMost, -2, Hit),
        deviation(Hard(12), DealerUp::of(6), AtMost, -1, Hit),
        deviation(Hard(11), DealerUp::ACE, AtLeast, 1, Double),
        deviation(Hard(10), DealerUp::of(10), AtLeast, 4, Double),
        deviation(Hard(10), DealerUp::ACE, AtLeast, 4, Double),
        deviation(Hard(9), DealerUp::of(2), AtLeast, 1, Double),
        deviation(Hard(9), DealerUp::of(7), AtLeast, 3, Double),
    ]
};

/// The reference play for the situation, with a short explanation.
pub fn recommend(situation: &Situation) -> Recommendation {
    if situation.insurance_pending {
        return recommend_insurance(situation);
    }
    if situation.use_deviations {
        if let Some(recommendation) = check_deviations(situation) {
            return recommendation;
        }
    }
    if let Some(recommendation) = check_pairs(situation) {
        return recommendation;
    }
    if situation.hand.is_soft() {
        if let Some(recommendation) = check_soft(situation) {
            return recommendation;
        }
    }
    check_hard(situation)
}

fn recommend_insurance(situation: &Situation) -> Recommendation {
    let count = situation.rounded_true_count();
    if situation.use_deviations && count >= INSURANCE_THRESHOLD {
        Recommendation::new(
            Action::Insurance,
            format!("Take insurance (TC: {count} ≥ {INSURANCE_THRESHOLD})"),
        )
    } else {
        Recommendation::new(
            Action::NoInsurance,
            format!("Decline insurance (TC: {count} < {INSURANCE_THRESHOLD})"),
        )
    }
}

fn pair_cell(rank: Rank, dealer: DealerUp) -> PairCell {
    let row = (rank as usize).min(Rank::Ten as usize);
    PAIR_CHART[row][dealer.column()]
}

fn is_ten_rank(rank: Rank) -> bool {
    matches!(rank, Rank::Ten | Rank::Jack | Rank::Queen | Rank::King)
}

fn check_deviations(situation: &Situation) -> Option<Recommendation> {
    let hand = situation.hand;
    let dealer = DealerUp::from_card(situation.dealer_up);
    let count = situation.rounded_true_count();
    let total = hand.score();
    let ten_pair = situation.split_allowed && is_ten_rank(hand.cards()[0].rank);
    // Pairs without a soft Ace are hard totals here, even splittable ones.
    let hard = !hand.is_soft();

    DEVIATIONS
        .iter()
        .find(|rule| {
            let hand_matches = match rule.hand {
                DeviationHand::TenPair => ten_pair,
                DeviationHand::Hard(rule_total) => hard && total == rule_total,
            };
            let double_ok = rule.action != Action::Double || hand.len() == 2;
            hand_matches
                && double_ok
                && rule.dealer == dealer
                && rule.comparison.holds(count, rule.threshold)
        })
        .map(|rule| {
            let verb = match rule.action {
                Action::Split => "Split",
                Action::Stand => "Stand",
                Action::Double => "Double",
                _ => "Hit",
            };
            let subject = match rule.hand {
                DeviationHand::TenPair => String::from("10,10"),
                DeviationHand::Hard(total) => total.to_string(),
            };
            Recommendation::new(
                rule.action,
                format!(
                    "{verb} {subject} vs {dealer} (TC: {count} {} {})",
                    rule.comparison.symbol(),
                    rule.threshold
                ),
            )
        })
}

fn check_pairs(situation: &Situation) -> Option<Recommendation> {
    if !situation.split_allowed {
        return None;
    }
    let rank = situation.hand.cards()[0].rank;
    let dealer = DealerUp::from_card(situation.dealer_up);
    let label = if is_ten_rank(rank) {
        String::from("T")
    } else {
        rank.to_string()
    };
    match pair_cell(rank, dealer) {
        PairCell::Split => Some(Recommendation::new(
            Action::Split,
            format!("Always split {label}s against dealer {dealer}"),
        )),
        PairCell::SplitIfDas => Some(Recommendation::new(
            Action::Split,
            format!("Split {label}s against {dealer} if DAS allowed, otherwise hit"),
        )),
        PairCell::NoSplit => None,
    }
}

/// Picks the chart action, falling back when the hand can no longer double.
fn settle(cell: Cell, hand: &Hand) -> Action {
    if cell.0 == Action::Double && hand.len() != 2 {
        cell.1
    } else {
        cell.0
    }
}

fn check_soft(situation: &Situation) -> Option<Recommendation> {
    let hand = situation.hand;
    let total = hand.score();
    let dealer = DealerUp::from_card(situation.dealer_up);
    let recommendation = match total {
        21 => Recommendation::new(Action::Stand, "Always stand on soft 21"),
        13..=20 => {
            let cell = SOFT_CHART[(total - 13) as usize][dealer.column()];
            let action = settle(cell, hand);
            let rationale = match cell {
                DH => format!("Double soft {total} vs {dealer} (hit if can't double)"),
                DS => format!("Double soft {total} vs {dealer} (stand if can't double)"),
                S => format!("stand on soft {total} vs dealer {dealer}"),
                _ => format!("hit on soft {total} vs dealer {dealer}"),
            };
            Recommendation::new(action, rationale)
        }
        12 => Recommendation::new(Action::Hit, "Always hit soft 12"),
        _ => return None,
    };
    Some(recommendation)
}

fn check_hard(situation: &Situation) -> Recommendation {
    let hand = situation.hand;
    let total = hand.score();
    let dealer = DealerUp::from_card(situation.dealer_up);
    if total >= 17 {
        return Recommendation::new(Action::Stand, "Always stand on hard 17 or higher");
    }
    if total < 8 {
        return Recommendation::new(Action::Hit, "Always hit on 7 or less");
    }

    // 11 against an Ace is only doubled with a positive count, even when
    // deviations are switched off. This cell compares the unrounded count.
    if total == 11 && dealer == DealerUp::ACE {
        let true_count = situation.true_count;
        return if true_count >= 1.0 {
            Recommendation::new(
                settle(DH, hand),
                format!("Double 11 vs A (true count {true_count:.1} is positive)"),
            )
        } else {
            Recommendation::new(
                Action::Hit,
                format!("Hit 11 vs A (true count {true_count:.1} is negative/neutral)"),
            )
        };
    }

    let cell = HARD_CHART[(total - 8) as usize][dealer.column()];
    let action = settle(cell, hand);
    let rationale = match cell.0 {
        Action::Double => match total {
            11 => String::from("Always double 11"),
            10 => format!("Double 10 vs dealer {dealer}"),
            _ => format!("Double {total} vs dealer {dealer} (hit if can't double)"),
        },
        Action::Stand if total == 12 => String::from("Stand on 12 vs dealer 4-6"),
        Action::Stand => format!("Stand on {total} vs dealer {dealer}"),
        _ => format!("Hit {total} vs dealer {dealer}"),
    };
    Recommendation::new(action, rationale)
}
