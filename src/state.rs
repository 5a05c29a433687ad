use solana_program::{clock::UnixTimestamp, pubkey::Pubkey};
use std::convert::TryFrom;

use crate::error::LotteryError;

/// Seed of the singleton lottery account (PDA)
pub const LOTTERY_SEED: &[u8] = b"lottery";
/// Seed prefix of ticket accounts: `[TICKET_SEED, lottery, holder, holder_index_le]`
pub const TICKET_SEED: &[u8] = b"ticket";
/// Seed prefix of holder accounts: `[HOLDER_SEED, lottery, holder]`
pub const HOLDER_SEED: &[u8] = b"holder";

/// Allocated size of the lottery account; the largest a CPI may create
pub const LOTTERY_ACCOUNT_LEN: usize = 10_240;
/// Ticket price set by `initialize` (0.1 SOL = 100,000,000 lamports)
pub const DEFAULT_TICKET_PRICE: u64 = 100_000_000;
/// Entries a single run can hold
pub const MAX_PARTICIPANTS: usize = 256;
pub const MAX_NAME_LEN: usize = 32;
pub const MAX_SYMBOL_LEN: usize = 10;
/// Version marker of freshly initialized state
pub const INITIAL_VERSION: u32 = 1;

/// Lifecycle phase of the current run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No run was ever started
    NotStarted,
    /// A run is scheduled; entries are accepted inside `[start_at, end_at]`
    Open,
    /// The final drawing ran
    Closed,
}

impl TryFrom<u8> for Phase {
    type Error = &'static str;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(Phase::NotStarted),
            1 => Ok(Phase::Open),
            2 => Ok(Phase::Closed),
            _ => Err("Invalid lottery phase"),
        }
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::NotStarted => 0,
            Phase::Open => 1,
            Phase::Closed => 2,
        }
    }
}

/// The whole persisted state of one lottery, passed by reference into every operation.
///
/// Field order mirrors the persisted layout in `upgrade.rs`; new fields go at the end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LotteryState {
    /// Version marker of the logic that last committed
    pub version: u32,
    /// Administrator identity
    pub admin: Pubkey,
    /// Ticket collection name
    pub name: String,
    /// Ticket collection symbol
    pub symbol: String,
    /// Price per ticket in lamports
    pub ticket_price: u64,
    pub start_at: UnixTimestamp,
    pub end_at: UnixTimestamp,
    pub phase: Phase,
    /// Run counter, 0 until the first `start_lottery`
    pub run: u64,
    /// Id the next minted ticket receives
    pub next_ticket_id: u64,
    /// Entry payments not yet paid out
    pub pot: u64,
    /// One identity per entry of the current run
    pub participants: Vec<Pubkey>,
    pub surprise_winner: Option<Pubkey>,
    pub lottery_winner: Option<Pubkey>,
    /// Program data slot of the deployment the state was last committed under
    pub last_deploy_slot: u64,
    /// Set while an outbound transfer is being settled
    pub payout_in_progress: bool,
    /// Amount paid by the surprise drawing of the current run
    pub surprise_prize: u64,
    /// Amount paid by the final drawing of the current run
    pub lottery_prize: u64,
    /// Surprise prize awarded but not yet transferred to its winner
    pub surprise_unclaimed: u64,
    /// Final prize awarded but not yet transferred to its winner
    pub lottery_unclaimed: u64,
}

impl LotteryState {
    /// State produced by `initialize`: `admin` administers, price is the default.
    pub fn new(
        admin: Pubkey,
        name: String,
        symbol: String,
        deploy_slot: u64,
    ) -> Result<Self, LotteryError> {
        if name.is_empty()
            || name.len() > MAX_NAME_LEN
            || symbol.is_empty()
            || symbol.len() > MAX_SYMBOL_LEN
        {
            return Err(LotteryError::InvalidCollectionIdentity);
        }

        Ok(Self {
            version: INITIAL_VERSION,
            admin,
            name,
            symbol,
            ticket_price: DEFAULT_TICKET_PRICE,
            start_at: 0,
            end_at: 0,
            phase: Phase::NotStarted,
            run: 0,
            next_ticket_id: 0,
            pot: 0,
            participants: Vec::new(),
            surprise_winner: None,
            lottery_winner: None,
            last_deploy_slot: deploy_slot,
            payout_in_progress: false,
            surprise_prize: 0,
            lottery_prize: 0,
            surprise_unclaimed: 0,
            lottery_unclaimed: 0,
        })
    }

    pub fn get_balance(&self) -> u64 {
        self.pot
    }

    pub fn ticket_price(&self) -> u64 {
        self.ticket_price
    }

    pub fn start_at(&self) -> UnixTimestamp {
        self.start_at
    }

    pub fn end_at(&self) -> UnixTimestamp {
        self.end_at
    }

    pub fn surprise_winner(&self) -> Option<Pubkey> {
        self.surprise_winner
    }

    pub fn lottery_winner(&self) -> Option<Pubkey> {
        self.lottery_winner
    }

    pub fn get_version(&self) -> u32 {
        self.version
    }

    pub fn participants(&self) -> &[Pubkey] {
        &self.participants
    }

    /// Whether entries are accepted at `now`: the run is open and `now` is inside the window.
    pub fn is_open_at(&self, now: UnixTimestamp) -> bool {
        self.phase == Phase::Open && self.start_at <= now && now <= self.end_at
    }

    /// Rejects any mutation while a transfer of a drawing has not settled.
    pub(crate) fn ensure_no_payout_in_progress(&self) -> Result<(), LotteryError> {
        if self.payout_in_progress {
            return Err(LotteryError::PayoutInProgress);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn new_state(admin: Pubkey) -> LotteryState {
        LotteryState::new(admin, "LotteryTicket".to_string(), "LT".to_string(), 7).unwrap()
    }

    #[test]
    fn initialize_sets_collection_and_default_price() {
        let admin = Pubkey::new_unique();
        let state = new_state(admin);

        assert_eq!(state.name, "LotteryTicket");
        assert_eq!(state.symbol, "LT");
        assert_eq!(state.ticket_price(), DEFAULT_TICKET_PRICE);
        assert_eq!(state.get_version(), INITIAL_VERSION);
        assert_eq!(state.phase, Phase::NotStarted);
        assert_eq!(state.get_balance(), 0);
        assert_eq!(state.surprise_winner(), None);
        assert_eq!(state.lottery_winner(), None);
    }

    #[test]
    fn collection_identity_is_bounded() {
        let admin = Pubkey::new_unique();
        assert_eq!(
            LotteryState::new(admin, String::new(), "LT".to_string(), 0),
            Err(LotteryError::InvalidCollectionIdentity)
        );
        assert_eq!(
            LotteryState::new(admin, "LotteryTicket".to_string(), "X".repeat(11), 0),
            Err(LotteryError::InvalidCollectionIdentity)
        );
    }

    #[test]
    fn phase_round_trips_through_its_tag() {
        for phase in [Phase::NotStarted, Phase::Open, Phase::Closed] {
            assert_eq!(Phase::try_from(u8::from(phase)), Ok(phase));
        }
        assert!(Phase::try_from(3).is_err());
    }

    #[test]
    fn open_window_is_inclusive() {
        let mut state = new_state(Pubkey::new_unique());
        state.phase = Phase::Open;
        state.start_at = 100;
        state.end_at = 160;

        assert!(!state.is_open_at(99));
        assert!(state.is_open_at(100));
        assert!(state.is_open_at(160));
        assert!(!state.is_open_at(161));
    }
}
