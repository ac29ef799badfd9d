//! Chat Guardian CLI - inspect the detector and strike ledger from a terminal

use clap::Parser;
use guardian_detector::{Detector, RuleCatalog};
use guardian_ledger::{NullAccountSync, StrikeLedger};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "guardian")]
#[command(about = "Chat Guardian - bidirectional moderation for peer-to-peer chat")]
struct Cli {
    /// Detection rule catalog path
    #[arg(long, default_value = "config/detection_rules.json")]
    rules: String,

    /// Strike ledger database path
    #[arg(long, default_value = "./guardian_ledger.db")]
    db: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run a message through the detector
    Analyze {
        /// The message text to analyze
        text: String,
    },
    /// Show the loaded rule catalog, grouped by category
    Rules,
    /// Show a user's current strike count
    Strikes {
        /// User id
        user: String,
    },
    /// Show a user's strike history, newest first
    History {
        /// User id
        user: String,
    },
    /// List pending interactions
    Pending,
    /// Reset a user's strikes to zero
    Reset {
        /// User id
        user: String,
    },
}

fn open_ledger(path: &str) -> anyhow::Result<StrikeLedger> {
    Ok(StrikeLedger::open(path, Arc::new(NullAccountSync))?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();

    match cli.command {
        Some(Commands::Analyze { text }) => {
            let detector = Detector::new(RuleCatalog::load(&cli.rules));
            match detector.analyze(&text) {
                Some(detection) => {
                    println!("FLAGGED: {}", detection.summary());
                    println!("Suggestion: {}", detection.suggestion);
                }
                None => println!("Clean"),
            }
        }
        Some(Commands::Rules) => {
            let catalog = RuleCatalog::try_load(&cli.rules)?;
            println!("{} rules loaded", catalog.len());
            for (category, count) in catalog.statistics() {
                println!("  {category}: {count}");
            }
        }
        Some(Commands::Strikes { user }) => {
            let ledger = open_ledger(&cli.db)?;
            println!("{}: {} strikes", user, ledger.current_strikes(&user)?);
        }
        Some(Commands::History { user }) => {
            let ledger = open_ledger(&cli.db)?;
            let history = ledger.strike_history(&user)?;
            if history.is_empty() {
                println!("No strike history for {user}");
            }
            for record in history {
                println!(
                    "{}  +{:.1}  {} (severity {}): {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.strikes_added,
                    record.category,
                    record.severity,
                    record.message,
                );
            }
        }
        Some(Commands::Pending) => {
            let ledger = open_ledger(&cli.db)?;
            let pending = ledger.pending_interactions()?;
            println!("{} pending interaction(s)", pending.len());
            for interaction in pending {
                println!(
                    "{}  {} -> {}  [{}]",
                    interaction.id,
                    interaction.sender_id,
                    interaction.receiver_id,
                    interaction.detection_summary,
                );
            }
        }
        Some(Commands::Reset { user }) => {
            let ledger = open_ledger(&cli.db)?;
            ledger.reset_strikes(&user).await?;
            ledger.storage().flush()?;
            println!("Strikes reset for {user}");
        }
        None => {
            println!("Chat Guardian v0.1.0 - Use --help for commands");
        }
    }

    Ok(())
}
