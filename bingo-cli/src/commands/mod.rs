use crate::config::CliConfig;
use anyhow::Context;
use bingo_core::storage::Storage;
use bingo_core::{
    parse_ether, Address, BingoHouse, EntropySource, EventKind, FixedEntropy, FundsTransport, GameId, GameStatus,
    LedgerState, LedgerStore, OsEntropy, ProposalId, ProposalParams, TokenId, Wei, WEI_PER_ETHER,
};
use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, Table};
use parking_lot::Mutex;
use std::sync::Arc;

/// Holds outbound transfers until the ledger that records them is saved.
#[derive(Default)]
struct PendingTransfers {
    queued: Mutex<Vec<(Address, Wei)>>,
}

impl PendingTransfers {
    fn take(&self) -> Vec<(Address, Wei)> {
        std::mem::take(&mut *self.queued.lock())
    }
}

impl FundsTransport for PendingTransfers {
    fn send(&self, to: &Address, amount: Wei) -> bingo_core::Result<()> {
        tracing::debug!("Queued transfer of {} wei to {}", amount, to);
        self.queued.lock().push((*to, amount));
        Ok(())
    }
}

pub fn parse_ether_arg(value: &str) -> Result<Wei, String> {
    parse_ether(value).ok_or_else(|| format!("'{}' is not an ether amount", value))
}

pub fn format_ether(wei: Wei) -> String {
    let whole = wei / WEI_PER_ETHER;
    let frac = wei % WEI_PER_ETHER;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:018}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

pub fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// One invocation's view of the ledger. Transfers made by operations are
/// only released by `commit`, after the state recording them is on disk.
struct Session {
    storage: Storage,
    house: BingoHouse,
    transfers: Arc<PendingTransfers>,
}

impl Session {
    fn new(storage: Storage, config: &CliConfig, state: LedgerState) -> anyhow::Result<Self> {
        let transfers = Arc::new(PendingTransfers::default());
        let entropy: Arc<dyn EntropySource> = match config.entropy_seed {
            Some(seed) => Arc::new(FixedEntropy::from_u64(seed)),
            None => Arc::new(OsEntropy),
        };
        let house = BingoHouse::with_state(config.rules.clone(), state)?
            .with_entropy(entropy)
            .with_transport(transfers.clone());

        Ok(Self {
            storage,
            house,
            transfers,
        })
    }

    /// Saves the ledger, then releases the queued transfers. If the save
    /// fails nothing is released.
    async fn commit(&self) -> anyhow::Result<Vec<(Address, Wei)>> {
        LedgerStore::new(&self.storage)
            .save_state(&self.house.snapshot())
            .await
            .context("saving ledger")?;

        let released = self.transfers.take();
        for (to, amount) in &released {
            tracing::info!("Transfer {} wei to {}", amount, to);
            println!("Sent {} ether to {}", format_ether(*amount), to);
        }
        Ok(released)
    }
}

async fn open_session(config: &CliConfig) -> anyhow::Result<Session> {
    let storage = Storage::new(&config.database_path()).await?;
    let state = LedgerStore::new(&storage).load_state().await?;
    Session::new(storage, config, state)
}

pub async fn propose(
    config: &CliConfig,
    caller: Address,
    params: ProposalParams,
    pay: Option<Wei>,
) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let house = &session.house;
    let paid = pay.unwrap_or_else(|| params.wei_buy_in.saturating_mul(params.cards as Wei));

    let outcome = house.create_proposal(caller, params, paid)?;
    session.commit().await?;

    println!("Created proposal {}", outcome.proposal_id);
    println!("Buy-in: {} ether per card", format_ether(params.wei_buy_in));
    println!("Players required: {}", params.num_players_required);
    println!();
    println!("Share this command with other players:");
    println!("bingo join --as <address> {} <cards>", outcome.proposal_id);

    Ok(())
}

pub async fn join(
    config: &CliConfig,
    caller: Address,
    proposal_id: ProposalId,
    cards: u32,
    pay: Option<Wei>,
) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let house = &session.house;
    let proposal = house
        .proposal(proposal_id)
        .with_context(|| format!("proposal {} not found", proposal_id))?;
    let paid = pay.unwrap_or_else(|| proposal.wei_buy_in.saturating_mul(cards as Wei));

    let outcome = house.join_proposal(caller, proposal_id, cards, paid)?;
    session.commit().await?;

    println!("Joined proposal {} with {} card(s)", proposal_id, cards);
    match outcome.game_id {
        Some(game_id) => {
            println!("Proposal filled! Game {} is live.", game_id);
            println!("Draw numbers with: bingo draw {}", game_id);
        }
        None => {
            if let Some(proposal) = house.proposal(proposal_id) {
                println!(
                    "Waiting for players: {}/{}",
                    proposal.player_count(),
                    proposal.num_players_required
                );
            }
        }
    }

    Ok(())
}

pub async fn cancel(config: &CliConfig, caller: Address, proposal_id: ProposalId) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let house = &session.house;
    house.cancel_proposal(caller, proposal_id)?;
    session.commit().await?;

    println!("Cancelled proposal {}", proposal_id);
    println!("Players can withdraw their stake with: bingo refund --as <address> {}", proposal_id);
    Ok(())
}

pub async fn refund(config: &CliConfig, caller: Address, proposal_id: ProposalId) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let house = &session.house;
    let amount = house.withdraw_refund(caller, proposal_id)?;
    session.commit().await?;

    println!("Refunded {} ether", format_ether(amount));
    Ok(())
}

pub async fn draw(config: &CliConfig, game_id: GameId, count: u32) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let house = &session.house;

    let mut drawn = Vec::new();
    let mut result = Ok(());
    for _ in 0..count.max(1) {
        match house.draw_number(game_id) {
            Ok(number) => drawn.push(number),
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }

    // Keep whatever was drawn before a rejection.
    session.commit().await?;

    if !drawn.is_empty() {
        let listed: Vec<String> = drawn.iter().map(|n| n.to_string()).collect();
        println!("Drew: {}", listed.join(", "));
    }
    if let Some(game) = house.game(game_id) {
        if let (GameStatus::ClaimWindowOpen, Some(closes_at)) = (game.status, game.claim_window_close_timestamp) {
            println!("All numbers drawn. Claims accepted until {}", format_timestamp(closes_at));
        }
    }

    result.map_err(Into::into)
}

pub async fn claim(config: &CliConfig, caller: Address, game_id: GameId, token_id: TokenId) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let house = &session.house;
    let line = house.claim_bingo(caller, game_id, token_id)?;
    session.commit().await?;

    println!("BINGO! Board {} wins game {} with {:?}", token_id, game_id, line);
    Ok(())
}

pub async fn payout(config: &CliConfig, caller: Address, game_id: GameId) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let house = &session.house;
    let amount = house.get_winnings(caller, game_id)?;
    session.commit().await?;

    println!("Collected {} ether from game {}", format_ether(amount), game_id);
    if house.is_badge_holder(&caller) {
        println!("{} holds a winner badge", caller);
    }
    Ok(())
}

pub async fn show_game_status(config: &CliConfig, game_id: GameId) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let house = &session.house;
    let game = house
        .game(game_id)
        .with_context(|| format!("game {} not found", game_id))?;
    let pool = house.escrow_pool(game_id);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Game".to_string(), game.id.to_string()]);
    table.add_row(vec!["Proposal".to_string(), game.source_proposal_id.to_string()]);
    table.add_row(vec!["Status".to_string(), format!("{:?}", game.status)]);
    table.add_row(vec!["Numbers drawn".to_string(), format!("{}/75", game.drawn_numbers.len())]);
    table.add_row(vec![
        "Last number".to_string(),
        game.drawn_numbers.last().map_or("-".to_string(), |n| n.to_string()),
    ]);
    table.add_row(vec!["Next draw".to_string(), format_timestamp(game.next_draw_at())]);
    table.add_row(vec![
        "Boards".to_string(),
        format!(
            "{} (tokens {}..={})",
            game.board_count,
            game.first_token_id,
            game.first_token_id + game.board_count.saturating_sub(1)
        ),
    ]);
    table.add_row(vec!["Winners".to_string(), game.winner_count().to_string()]);
    if let Some(closes_at) = game.claim_window_close_timestamp {
        table.add_row(vec!["Claim window closes".to_string(), format_timestamp(closes_at)]);
    }
    if let Some(pool) = pool {
        table.add_row(vec!["Escrow".to_string(), format!("{} ether", format_ether(pool.total))]);
        table.add_row(vec!["Paid out".to_string(), format!("{} ether", format_ether(pool.paid_out))]);
    }

    println!("{}", table);
    Ok(())
}

pub async fn list(config: &CliConfig) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let house = &session.house;

    let proposals = house.proposals();
    if proposals.is_empty() {
        println!("No proposals yet");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Proposal", "Status", "Buy-in", "Players", "Escrow", "Game"]);
    for proposal in &proposals {
        table.add_row(vec![
            proposal.id.to_string(),
            format!("{:?}", proposal.status),
            format!("{} ether", format_ether(proposal.wei_buy_in)),
            format!("{}/{}", proposal.player_count(), proposal.num_players_required),
            format!("{} ether", format_ether(proposal.escrow)),
            proposal.game_id.map_or("-".to_string(), |id| id.to_string()),
        ]);
    }
    println!("{}", table);

    let games = house.games();
    if !games.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Game", "Status", "Drawn", "Boards", "Winners"]);
        for game in &games {
            table.add_row(vec![
                game.id.to_string(),
                format!("{:?}", game.status),
                game.drawn_numbers.len().to_string(),
                game.board_count.to_string(),
                game.winner_count().to_string(),
            ]);
        }
        println!("{}", table);
    }

    Ok(())
}

pub async fn show_board(config: &CliConfig, token_id: TokenId) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let house = &session.house;
    let board = house
        .board(token_id)
        .with_context(|| format!("board {} not found", token_id))?;

    println!("Board {} (game {}, owner {})", board.id, board.game_id, board.owner);
    if board.has_won {
        println!("This board has won");
    }
    println!();
    print!("{}", board.layout);

    if let Some(game) = house.game(board.game_id) {
        let marked: Vec<String> = board
            .layout
            .rows()
            .iter()
            .flatten()
            .filter(|&&n| n != 0 && game.is_drawn(n))
            .map(|n| n.to_string())
            .collect();
        println!();
        println!("Drawn on this board: {}", if marked.is_empty() { "-".to_string() } else { marked.join(", ") });
    }

    Ok(())
}

pub async fn list_badges(config: &CliConfig) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let house = &session.house;
    let badges = house.badge_holders();
    if badges.is_empty() {
        println!("No winner badges minted yet");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Holder", "First win (game)", "Minted"]);
    for badge in badges {
        table.add_row(vec![
            badge.holder.to_string(),
            badge.first_game_id.to_string(),
            format_timestamp(badge.minted_at),
        ]);
    }
    println!("{}", table);
    Ok(())
}

pub async fn show_events(config: &CliConfig, limit: Option<usize>) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let house = &session.house;
    let events = house.events();
    let skip = limit.map_or(0, |l| events.len().saturating_sub(l));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Time", "Event"]);
    for event in events.iter().skip(skip) {
        table.add_row(vec![
            event.sequence.to_string(),
            format_timestamp(event.timestamp),
            describe(&event.kind),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn describe(kind: &EventKind) -> String {
    match kind {
        EventKind::ProposalCreated {
            proposal_id,
            creator,
            wei_buy_in,
            num_players_required,
        } => format!(
            "proposal {} created by {} ({} ether, {} players)",
            proposal_id,
            creator,
            format_ether(*wei_buy_in),
            num_players_required
        ),
        EventKind::PlayerJoined {
            proposal_id,
            player,
            cards,
            escrow,
        } => format!(
            "{} joined proposal {} with {} card(s), escrow {} ether",
            player,
            proposal_id,
            cards,
            format_ether(*escrow)
        ),
        EventKind::ProposalCancelled { proposal_id } => format!("proposal {} cancelled", proposal_id),
        EventKind::RefundWithdrawn {
            proposal_id,
            player,
            amount,
        } => format!(
            "{} withdrew {} ether from proposal {}",
            player,
            format_ether(*amount),
            proposal_id
        ),
        EventKind::GameActivated {
            game_id,
            proposal_id,
            escrow,
            board_count,
            ..
        } => format!(
            "game {} activated from proposal {} with {} boards, escrow {} ether",
            game_id,
            proposal_id,
            board_count,
            format_ether(*escrow)
        ),
        EventKind::NumberDrawn {
            game_id,
            number,
            draw_index,
        } => format!("game {} draw #{}: {}", game_id, draw_index + 1, number),
        EventKind::ClaimWindowOpened { game_id, closes_at } => format!(
            "game {} claim window open until {}",
            game_id,
            format_timestamp(*closes_at)
        ),
        EventKind::BingoClaimed {
            game_id,
            token_id,
            winner,
            line,
        } => format!("{} claimed bingo on board {} in game {} ({:?})", winner, token_id, game_id, line),
        EventKind::WinningsPaid {
            game_id,
            winner,
            amount,
        } => format!("{} paid {} ether from game {}", winner, format_ether(*amount), game_id),
        EventKind::BadgeMinted { holder } => format!("winner badge minted for {}", holder),
        EventKind::GameClosed { game_id } => format!("game {} closed", game_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ether() {
        assert_eq!(format_ether(WEI_PER_ETHER), "1");
        assert_eq!(format_ether(4_500_000_000_000_000), "0.0045");
        assert_eq!(format_ether(0), "0");
    }

    fn session_with(storage: Storage) -> Session {
        let config = CliConfig {
            entropy_seed: Some(7),
            ..CliConfig::default()
        };
        Session::new(storage, &config, LedgerState::new()).unwrap()
    }

    fn overpaid_proposal(session: &Session) {
        let params = ProposalParams {
            wei_buy_in: WEI_PER_ETHER / 1000,
            draw_interval_sec: 10,
            num_players_required: 2,
            max_cards_per_player: 10,
            cards: 1,
        };
        session
            .house
            .create_proposal(Address::from_low_u64_be(1), params, WEI_PER_ETHER / 100)
            .unwrap();
    }

    #[tokio::test]
    async fn test_transfers_released_only_after_save() {
        let session = session_with(Storage::in_memory().await.unwrap());
        overpaid_proposal(&session);
        assert_eq!(session.transfers.queued.lock().len(), 1);

        let released = session.commit().await.unwrap();
        assert_eq!(released, vec![(Address::from_low_u64_be(1), 9 * WEI_PER_ETHER / 1000)]);
        assert!(session.transfers.queued.lock().is_empty());

        let saved = LedgerStore::new(&session.storage).load_state().await.unwrap();
        assert_eq!(saved, session.house.snapshot());
    }

    #[tokio::test]
    async fn test_failed_save_releases_nothing() {
        let storage = Storage::in_memory().await.unwrap();
        storage
            .get_connection()
            .await
            .execute("DROP TABLE events", [])
            .unwrap();
        let session = session_with(storage);
        overpaid_proposal(&session);

        assert!(session.commit().await.is_err());
        assert_eq!(session.transfers.queued.lock().len(), 1);
    }

    #[test]
    fn test_parse_ether_arg() {
        assert_eq!(parse_ether_arg("0.001"), Ok(1_000_000_000_000_000));
        assert!(parse_ether_arg("lots").is_err());
    }
}
