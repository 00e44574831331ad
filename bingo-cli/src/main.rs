mod commands;
mod config;

use bingo_core::{Address, BingoError, GameId, ProposalId, TokenId, Wei};
use clap::{Parser, Subcommand};
use config::CliConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bingo")]
#[command(about = "Buy-in bingo with escrowed stakes and equal-share payouts")]
#[command(version)]
struct Cli {
    /// Data directory for the ledger database and config.json
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Propose a new game and buy your first cards
    Propose {
        /// Calling address
        #[arg(long = "as")]
        caller: Address,
        /// Buy-in per card, in ether
        #[arg(long, value_parser = commands::parse_ether_arg)]
        buy_in: Wei,
        /// Seconds between draws
        #[arg(long, default_value_t = 10)]
        interval: u64,
        /// Players needed before the game starts
        #[arg(long, default_value_t = 5)]
        players: u32,
        /// Card cap per player
        #[arg(long, default_value_t = 10)]
        max_cards: u32,
        /// Cards to buy now
        #[arg(long, default_value_t = 1)]
        cards: u32,
        /// Amount sent, in ether (defaults to the exact stake)
        #[arg(long, value_parser = commands::parse_ether_arg)]
        pay: Option<Wei>,
    },
    /// Join an open proposal
    Join {
        #[arg(long = "as")]
        caller: Address,
        proposal_id: ProposalId,
        cards: u32,
        /// Amount sent, in ether (defaults to the exact stake)
        #[arg(long, value_parser = commands::parse_ether_arg)]
        pay: Option<Wei>,
    },
    /// Cancel an open proposal you created
    Cancel {
        #[arg(long = "as")]
        caller: Address,
        proposal_id: ProposalId,
    },
    /// Withdraw your stake from a cancelled proposal
    Refund {
        #[arg(long = "as")]
        caller: Address,
        proposal_id: ProposalId,
    },
    /// Draw the next number(s)
    Draw {
        game_id: GameId,
        /// Number of draws to attempt
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Claim bingo on one of your boards
    Claim {
        #[arg(long = "as")]
        caller: Address,
        game_id: GameId,
        token_id: TokenId,
    },
    /// Collect your share once the claim window has closed
    Payout {
        #[arg(long = "as")]
        caller: Address,
        game_id: GameId,
    },
    /// Show game status
    Status { game_id: GameId },
    /// List proposals and games
    List,
    /// Show a board
    Board { token_id: TokenId },
    /// List winner badge holders
    Badges,
    /// Show the ledger event log
    Events {
        /// Only the most recent N events
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "bingo={},bingo_core={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = cli.data_dir.unwrap_or_else(config::default_data_dir);
    tokio::fs::create_dir_all(&data_dir).await?;
    let config = CliConfig::load(&data_dir)?;

    let result = match cli.command {
        Commands::Propose {
            caller,
            buy_in,
            interval,
            players,
            max_cards,
            cards,
            pay,
        } => {
            let params = bingo_core::ProposalParams {
                wei_buy_in: buy_in,
                draw_interval_sec: interval,
                num_players_required: players,
                max_cards_per_player: max_cards,
                cards,
            };
            commands::propose(&config, caller, params, pay).await
        }
        Commands::Join {
            caller,
            proposal_id,
            cards,
            pay,
        } => commands::join(&config, caller, proposal_id, cards, pay).await,
        Commands::Cancel { caller, proposal_id } => commands::cancel(&config, caller, proposal_id).await,
        Commands::Refund { caller, proposal_id } => commands::refund(&config, caller, proposal_id).await,
        Commands::Draw { game_id, count } => commands::draw(&config, game_id, count).await,
        Commands::Claim {
            caller,
            game_id,
            token_id,
        } => commands::claim(&config, caller, game_id, token_id).await,
        Commands::Payout { caller, game_id } => commands::payout(&config, caller, game_id).await,
        Commands::Status { game_id } => commands::show_game_status(&config, game_id).await,
        Commands::List => commands::list(&config).await,
        Commands::Board { token_id } => commands::show_board(&config, token_id).await,
        Commands::Badges => commands::list_badges(&config).await,
        Commands::Events { limit } => commands::show_events(&config, limit).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<BingoError>() {
            Some(BingoError::ClaimWindowNotClosed(game_id)) => {
                eprintln!("Error: claim window for game {} is still open", game_id);
                eprintln!("Use 'bingo status {}' to see when it closes", game_id);
            }
            Some(BingoError::DrawTooEarly { next_draw_at, .. }) => {
                eprintln!("Error: next draw allowed at {}", commands::format_timestamp(*next_draw_at));
            }
            Some(BingoError::InsufficientPayment { need, paid }) => {
                eprintln!("Error: insufficient payment");
                eprintln!(
                    "Need: {} ether, Paid: {} ether",
                    commands::format_ether(*need),
                    commands::format_ether(*paid)
                );
            }
            _ => {
                eprintln!("Error: {:#}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
