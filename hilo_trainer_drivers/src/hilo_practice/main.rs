use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use hilo_trainer::{
    Response, Seat, Snapshot, Table, TableConfig, TableEvent, TableEventHandler, ThreadSleepPacer,
};
use hilo_trainer_drivers::{parse_config_from_file, Config};
use tracing::{info, Level};

const DEFAULT_CONFIG_PATH: &str = "~/.hilo_trainer.yml";
const DEFAULT_CONFIG_NAME: &str = ".hilo_trainer.yml";

const HELP: &str = "\
commands:
  d  deal          h  hit           s  stand
  x  double        p  split
  i  insurance     n  no insurance
  r [decks]        reset the shoe
  delay <ms>       set the deal delay
  dev on|off       count deviations
  ins on|off       offer insurance
  stats            strategy statistics and recent mistakes
  history          count history
  clear-stats      forget statistics
  clear-history    forget count history
  ?  help          q  quit";

#[derive(Debug, Parser)]
#[command(author, about, long_about = None)]
struct CommandLineArgs {
    /// The path of the config file
    #[arg(short, long, default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    config: String,

    /// Number of decks in the shoe, overrides the config file
    #[arg(short, long)]
    deck_count: Option<u8>,

    /// Delay between cards in milliseconds, overrides the config file
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Shuffle seed, overrides the config file
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = Level::WARN)]
    log_level: Level,
}

fn load_config(path: &str) -> Result<Config> {
    if path != DEFAULT_CONFIG_PATH {
        return parse_config_from_file(path);
    }
    let home_dir = home::home_dir().context("cannot find home directory")?;
    let config_file_path = home_dir.join(DEFAULT_CONFIG_NAME);
    if config_file_path.is_file() {
        parse_config_from_file(&config_file_path)
    } else {
        info!(path = %config_file_path.display(), "no config file, using defaults");
        Ok(Config::default())
    }
}

/// Prints the deal as it happens.
struct TextRenderer;

impl TableEventHandler for TextRenderer {
    fn on_event(&mut self, event: &TableEvent, snapshot: &Snapshot) {
        match event {
            TableEvent::CardDealt { seat, card } => {
                let card = card.map_or(String::from("[hidden]"), |card| card.to_string());
                match seat {
                    Seat::Player { hand_index } if snapshot.split_mode => {
                        println!("  hand {} <- {card}", hand_index + 1)
                    }
                    Seat::Player { .. } => println!("  player <- {card}"),
                    Seat::Dealer => println!("  dealer <- {card}"),
                }
            }
            TableEvent::HoleCardRevealed(card) => println!("  dealer reveals {card}"),
            TableEvent::InsuranceOffered => println!("Dealer shows an Ace. Insurance? (i/n)"),
            TableEvent::Feedback(grade) => println!("{}", grade.message),
            TableEvent::Message(message) if !message.is_empty() => println!("{message}"),
            TableEvent::RoundOver { message } => println!("== {message} =="),
            TableEvent::ShoeReset { deck_count } => {
                println!("New shoe with {deck_count} deck(s).")
            }
            _ => {}
        }
    }
}

fn format_hand(cards: impl Iterator<Item = String>) -> String {
    cards.collect::<Vec<_>>().join(" ")
}

fn print_table(snapshot: &Snapshot, config: &Config) {
    let dealer = format_hand(
        snapshot
            .dealer_cards
            .iter()
            .map(|card| card.map_or(String::from("??"), |card| card.to_string())),
    );
    if !snapshot.dealer_cards.is_empty() {
        println!("Dealer: {dealer} ({})", snapshot.dealer_score);
    }
    for (index, hand) in snapshot.player_hands.iter().enumerate() {
        if hand.is_empty() {
            continue;
        }
        let marker = if snapshot.split_mode && index == snapshot.active_hand && snapshot.game_active {
            ">"
        } else {
            " "
        };
        println!(
            "{marker}You:   {} ({})",
            format_hand(hand.cards().iter().map(|card| card.to_string())),
            snapshot.player_scores[index]
        );
    }
    println!(
        "RC {:+} | TC {:+.1} | hand {:+} | decks left {:.2} | dealt {}",
        snapshot.running_count,
        snapshot.true_count,
        snapshot.hand_count,
        snapshot.decks_remaining,
        snapshot.cards_dealt
    );
    if config.practice.show_remaining_cards {
        let remaining = &snapshot.remaining;
        println!(
            "left {}: low {} ({:.0}%) | neutral {} ({:.0}%) | high {} ({:.0}%)",
            remaining.total,
            remaining.low,
            remaining.low_percent(),
            remaining.neutral,
            remaining.neutral_percent(),
            remaining.high,
            remaining.high_percent()
        );
    }
    if config.practice.show_recommendation {
        if let Some(recommendation) = &snapshot.recommendation {
            println!(
                "Suggested: {} - {}",
                recommendation.action, recommendation.rationale
            );
        }
    }
}

fn print_stats(snapshot: &Snapshot) {
    println!(
        "Accuracy {}% ({} of {} moves)",
        snapshot.accuracy, snapshot.stats.correct_moves, snapshot.stats.total_moves
    );
    if snapshot.mistake_count > 0 {
        println!("Recent mistakes ({} in total):", snapshot.mistake_count);
        for mistake in &snapshot.recent_mistakes {
            println!(
                "  {} ({}) vs {}: took {}, should {}",
                mistake.hand_description,
                mistake.hand_kind,
                mistake.dealer_up_card,
                mistake.action_taken,
                mistake.correct_action
            );
        }
    }
}

fn print_history(snapshot: &Snapshot) {
    let elapsed = snapshot.shoe_elapsed.as_secs();
    println!("Shoe time {:02}:{:02}", elapsed / 60, elapsed % 60);
    for entry in &snapshot.recent_history {
        let at = entry.elapsed.as_secs();
        println!(
            "  {:02}:{:02} RC {:+} TC {:+.1}  {}",
            at / 60,
            at % 60,
            entry.running_count,
            entry.true_count,
            entry.event
        );
    }
}

fn parse_switch(value: Option<&str>) -> Option<bool> {
    match value {
        Some("on") => Some(true),
        Some("off") => Some(false),
        _ => None,
    }
}

fn main() -> Result<()> {
    let args = CommandLineArgs::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(io::stderr)
        .init();

    let mut config = load_config(&args.config)?;
    if let Some(deck_count) = args.deck_count {
        config.table.deck_count = deck_count;
    }
    if let Some(delay_ms) = args.delay_ms {
        config.table.deal_delay_ms = delay_ms;
    }
    if args.seed.is_some() {
        config.table.seed = args.seed;
    }
    let table_config: TableConfig = config.table.clone();
    let mut table = Table::new(table_config)
        .context("cannot set up the table")?
        .with_pacer(ThreadSleepPacer);
    table.subscribe(TextRenderer);

    println!("{HELP}");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };

        let result = match command {
            "d" | "deal" => table.deal(),
            "h" | "hit" => table.hit(),
            "s" | "stand" => table.stand(),
            "x" | "double" => table.double(),
            "p" | "split" => table.split(),
            "i" | "insurance" => table.take_insurance(),
            "n" | "no" => table.decline_insurance(),
            "r" | "reset" => {
                let decks = match words.next().map(str::parse::<u8>) {
                    Some(Ok(decks)) => decks,
                    Some(Err(_)) => {
                        println!("usage: r [decks]");
                        continue;
                    }
                    None => table.config().deck_count,
                };
                table.reset_shoe(decks)
            }
            "delay" => {
                match words.next().map(str::parse::<u64>) {
                    Some(Ok(ms)) => table.set_deal_delay(ms),
                    _ => println!("usage: delay <ms>"),
                }
                continue;
            }
            "dev" => {
                match parse_switch(words.next()) {
                    Some(enabled) => table.set_deviations_enabled(enabled),
                    None => println!("usage: dev on|off"),
                }
                continue;
            }
            "ins" => {
                match parse_switch(words.next()) {
                    Some(enabled) => table.set_insurance_enabled(enabled),
                    None => println!("usage: ins on|off"),
                }
                continue;
            }
            "stats" => {
                print_stats(&table.snapshot());
                continue;
            }
            "history" => {
                print_history(&table.snapshot());
                continue;
            }
            "clear-stats" => {
                table.reset_stats();
                continue;
            }
            "clear-history" => {
                table.clear_history();
                continue;
            }
            "q" | "quit" => break,
            "?" | "help" => {
                println!("{HELP}");
                continue;
            }
            other => {
                println!("unknown command {other:?}, type ? for help");
                continue;
            }
        };

        match result {
            Ok(Response::Applied) => print_table(&table.snapshot(), &config),
            Ok(Response::Ignored) => println!("not now"),
            Err(err) => println!("{err}"),
        }
    }
    Ok(())
}
