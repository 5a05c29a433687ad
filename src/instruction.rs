// Ticket Lottery Program - Instructions
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
    sysvar::slot_hashes,
};

use crate::{random::Draw, state::LotteryState, utils};

/// Participants returned by one `Query::Participants` page; fits the 1024 byte return data
pub const PARTICIPANTS_PAGE_LEN: usize = 30;
/// Appended to every query answer. The runtime drops trailing zero bytes of return data.
pub const ANSWER_TERMINATOR: u8 = 0xff;

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum LotteryInstruction {
    /// Create the lottery and name its ticket collection
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The deployer, must be the program's upgrade authority
    /// 1. `[writable]` The lottery account (PDA)
    /// 2. `[]` The program data account of this program
    /// 3. `[]` System program
    Initialize { name: String, symbol: String },

    /// Set the price of one ticket (admin only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The lottery account
    SetTicketPrice {
        /// Price in lamports (0.1 SOL = 100,000,000 lamports)
        price: u64,
    },

    /// Schedule the entry window of a run (admin only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The lottery account
    StartLottery { start_at: i64, end_at: i64 },

    /// Buy one ticket
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The entrant, pays `payment` plus rent
    /// 1. `[writable]` The lottery account
    /// 2. `[writable]` The ticket account (PDA of the entrant's current ticket count)
    /// 3. `[writable]` The entrant's holder account (PDA)
    /// 4. `[]` System program
    EnterLottery {
        /// Lamports paid, at least the ticket price
        payment: u64,
    },

    /// Award half the pot to a participant drawn during the open window
    ///
    /// Accounts expected:
    /// 0. `[signer]` Any caller
    /// 1. `[writable]` The lottery account
    /// 2. `[]` SlotHashes sysvar
    AwardSurpriseWinner,

    /// Close the run and award the remaining pot to a drawn participant
    ///
    /// Accounts expected:
    /// 0. `[signer]` Any caller
    /// 1. `[writable]` The lottery account
    /// 2. `[]` SlotHashes sysvar
    EndLottery,

    /// Transfer an awarded prize to its recorded winner
    ///
    /// Accounts expected:
    /// 0. `[signer]` Any caller
    /// 1. `[writable]` The lottery account
    /// 2. `[writable]` The winner's wallet
    ClaimPrize { draw: Draw },

    /// Hand administration to another identity (admin only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` Current admin
    /// 1. `[]` New admin
    /// 2. `[writable]` The lottery account
    TransferAdmin,

    /// Adopt a newly deployed program binary and bump the version marker
    ///
    /// Accounts expected:
    /// 0. `[signer]` The program's upgrade authority
    /// 1. `[writable]` The lottery account
    /// 2. `[]` The program data account of this program
    CommitUpgrade,

    /// Read lottery state; the Borsh encoded answer followed by `ANSWER_TERMINATOR` is
    /// set as return data
    ///
    /// Accounts expected:
    /// 0. `[]` The lottery account
    Query { query: Query },
}

/// Read-only questions answered by `LotteryInstruction::Query`
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Query {
    /// `u64` lamports in the pot
    Balance,
    /// `u64`
    TicketPrice,
    /// `i64`
    StartAt,
    /// `i64`
    EndAt,
    /// `Option<Pubkey>`
    SurpriseWinner,
    /// `Option<Pubkey>`
    LotteryWinner,
    /// `u32`
    Version,
    /// `String`
    Name,
    /// `String`
    Symbol,
    /// `u32` entries in the current run
    ParticipantCount,
    /// `Vec<Pubkey>`, up to `PARTICIPANTS_PAGE_LEN` entries starting at `offset`
    Participants { offset: u32 },
}

impl LotteryInstruction {
    /// Unpacks a byte buffer into a LotteryInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| ProgramError::InvalidInstructionData)
    }

    /// Packs a LotteryInstruction into a byte buffer
    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        self.try_to_vec().map_err(|_| ProgramError::InvalidInstructionData)
    }
}

impl Query {
    /// Borsh encoded answer for `state`, terminated by `ANSWER_TERMINATOR`
    pub fn answer(&self, state: &LotteryState) -> Result<Vec<u8>, ProgramError> {
        let encoded = match self {
            Query::Balance => state.get_balance().try_to_vec(),
            Query::TicketPrice => state.ticket_price().try_to_vec(),
            Query::StartAt => state.start_at().try_to_vec(),
            Query::EndAt => state.end_at().try_to_vec(),
            Query::SurpriseWinner => state.surprise_winner().try_to_vec(),
            Query::LotteryWinner => state.lottery_winner().try_to_vec(),
            Query::Version => state.get_version().try_to_vec(),
            Query::Name => state.name.try_to_vec(),
            Query::Symbol => state.symbol.try_to_vec(),
            Query::ParticipantCount => (state.participants().len() as u32).try_to_vec(),
            Query::Participants { offset } => {
                let page: Vec<Pubkey> = state
                    .participants()
                    .iter()
                    .skip(*offset as usize)
                    .take(PARTICIPANTS_PAGE_LEN)
                    .copied()
                    .collect();
                page.try_to_vec()
            }
        };
        let mut answer = encoded.map_err(|_| ProgramError::InvalidAccountData)?;
        answer.push(ANSWER_TERMINATOR);
        Ok(answer)
    }
}

/// Decodes a query answer read back from return data.
pub fn decode_answer<T: BorshDeserialize>(return_data: &[u8]) -> Result<T, ProgramError> {
    match return_data.split_last() {
        Some((&ANSWER_TERMINATOR, answer)) => {
            T::try_from_slice(answer).map_err(|_| ProgramError::InvalidAccountData)
        }
        _ => Err(ProgramError::InvalidAccountData),
    }
}

fn build(
    program_id: &Pubkey,
    instruction: LotteryInstruction,
    accounts: Vec<AccountMeta>,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: instruction.pack()?,
    })
}

/// Create initialize instruction
pub fn initialize(
    program_id: &Pubkey,
    deployer: &Pubkey,
    name: String,
    symbol: String,
) -> Result<Instruction, ProgramError> {
    let (lottery, _) = utils::lottery_address(program_id);
    let (program_data, _) = utils::program_data_address(program_id);

    let accounts = vec![
        AccountMeta::new(*deployer, true),
        AccountMeta::new(lottery, false),
        AccountMeta::new_readonly(program_data, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    build(program_id, LotteryInstruction::Initialize { name, symbol }, accounts)
}

/// Create set_ticket_price instruction
pub fn set_ticket_price(
    program_id: &Pubkey,
    admin: &Pubkey,
    price: u64,
) -> Result<Instruction, ProgramError> {
    let (lottery, _) = utils::lottery_address(program_id);

    let accounts = vec![
        AccountMeta::new_readonly(*admin, true),
        AccountMeta::new(lottery, false),
    ];

    build(program_id, LotteryInstruction::SetTicketPrice { price }, accounts)
}

/// Create start_lottery instruction
pub fn start_lottery(
    program_id: &Pubkey,
    admin: &Pubkey,
    start_at: i64,
    end_at: i64,
) -> Result<Instruction, ProgramError> {
    let (lottery, _) = utils::lottery_address(program_id);

    let accounts = vec![
        AccountMeta::new_readonly(*admin, true),
        AccountMeta::new(lottery, false),
    ];

    build(program_id, LotteryInstruction::StartLottery { start_at, end_at }, accounts)
}

/// Create enter_lottery instruction. `holder_index` is the entrant's current ticket count.
pub fn enter_lottery(
    program_id: &Pubkey,
    entrant: &Pubkey,
    holder_index: u64,
    payment: u64,
) -> Result<Instruction, ProgramError> {
    let (lottery, _) = utils::lottery_address(program_id);
    let (ticket, _) = utils::ticket_address(program_id, &lottery, entrant, holder_index);
    let (holder, _) = utils::holder_address(program_id, &lottery, entrant);

    let accounts = vec![
        AccountMeta::new(*entrant, true),
        AccountMeta::new(lottery, false),
        AccountMeta::new(ticket, false),
        AccountMeta::new(holder, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    build(program_id, LotteryInstruction::EnterLottery { payment }, accounts)
}

fn drawing_accounts(program_id: &Pubkey, caller: &Pubkey) -> Vec<AccountMeta> {
    let (lottery, _) = utils::lottery_address(program_id);

    vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new(lottery, false),
        AccountMeta::new_readonly(slot_hashes::id(), false),
    ]
}

/// Create award_surprise_winner instruction
pub fn award_surprise_winner(
    program_id: &Pubkey,
    caller: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let accounts = drawing_accounts(program_id, caller);
    build(program_id, LotteryInstruction::AwardSurpriseWinner, accounts)
}

/// Create end_lottery instruction
pub fn end_lottery(program_id: &Pubkey, caller: &Pubkey) -> Result<Instruction, ProgramError> {
    let accounts = drawing_accounts(program_id, caller);
    build(program_id, LotteryInstruction::EndLottery, accounts)
}

/// Create claim_prize instruction
pub fn claim_prize(
    program_id: &Pubkey,
    caller: &Pubkey,
    winner: &Pubkey,
    draw: Draw,
) -> Result<Instruction, ProgramError> {
    let (lottery, _) = utils::lottery_address(program_id);

    let accounts = vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new(lottery, false),
        AccountMeta::new(*winner, false),
    ];

    build(program_id, LotteryInstruction::ClaimPrize { draw }, accounts)
}

/// Create transfer_admin instruction
pub fn transfer_admin(
    program_id: &Pubkey,
    current_admin: &Pubkey,
    new_admin: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (lottery, _) = utils::lottery_address(program_id);

    let accounts = vec![
        AccountMeta::new_readonly(*current_admin, true),
        AccountMeta::new_readonly(*new_admin, false),
        AccountMeta::new(lottery, false),
    ];

    build(program_id, LotteryInstruction::TransferAdmin, accounts)
}

/// Create commit_upgrade instruction
pub fn commit_upgrade(
    program_id: &Pubkey,
    authority: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (lottery, _) = utils::lottery_address(program_id);
    let (program_data, _) = utils::program_data_address(program_id);

    let accounts = vec![
        AccountMeta::new_readonly(*authority, true),
        AccountMeta::new(lottery, false),
        AccountMeta::new_readonly(program_data, false),
    ];

    build(program_id, LotteryInstruction::CommitUpgrade, accounts)
}

/// Create query instruction
pub fn query(program_id: &Pubkey, query: Query) -> Result<Instruction, ProgramError> {
    let (lottery, _) = utils::lottery_address(program_id);

    let accounts = vec![AccountMeta::new_readonly(lottery, false)];

    build(program_id, LotteryInstruction::Query { query }, accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::new_state;

    #[test]
    fn instructions_unpack_what_builders_pack() {
        let program_id = Pubkey::new_unique();
        let entrant = Pubkey::new_unique();

        let ix = enter_lottery(&program_id, &entrant, 3, 500_000_000).unwrap();
        assert_eq!(
            LotteryInstruction::unpack(&ix.data).unwrap(),
            LotteryInstruction::EnterLottery { payment: 500_000_000 }
        );
        assert_eq!(ix.accounts.len(), 5);
        assert!(ix.accounts[0].is_signer);

        assert_eq!(
            LotteryInstruction::unpack(&[42]),
            Err(ProgramError::InvalidInstructionData)
        );
        assert_eq!(
            LotteryInstruction::unpack(&[]),
            Err(ProgramError::InvalidInstructionData)
        );
    }

    #[test]
    fn drawings_take_no_winner_accounts() {
        let program_id = Pubkey::new_unique();
        let caller = Pubkey::new_unique();

        let ix = end_lottery(&program_id, &caller).unwrap();
        assert_eq!(ix.accounts.len(), 3);
        assert_eq!(ix.accounts[2].pubkey, slot_hashes::id());

        let ix = claim_prize(&program_id, &caller, &Pubkey::new_unique(), Draw::Final).unwrap();
        assert_eq!(
            LotteryInstruction::unpack(&ix.data).unwrap(),
            LotteryInstruction::ClaimPrize { draw: Draw::Final }
        );
        assert!(ix.accounts[2].is_writable && !ix.accounts[2].is_signer);
    }

    #[test]
    fn queries_answer_borsh_values() {
        let mut state = new_state(Pubkey::new_unique());
        state.pot = 1_250_000_000;
        state.participants = (0..(PARTICIPANTS_PAGE_LEN + 5))
            .map(|_| Pubkey::new_unique())
            .collect();

        let balance = Query::Balance.answer(&state).unwrap();
        assert_eq!(decode_answer::<u64>(&balance).unwrap(), 1_250_000_000);

        let winner = Query::SurpriseWinner.answer(&state).unwrap();
        assert_eq!(decode_answer::<Option<Pubkey>>(&winner).unwrap(), None);

        let name = Query::Name.answer(&state).unwrap();
        assert_eq!(decode_answer::<String>(&name).unwrap(), "LotteryTicket");

        let first = Query::Participants { offset: 0 }.answer(&state).unwrap();
        assert!(first.len() <= 1024);
        assert_eq!(
            decode_answer::<Vec<Pubkey>>(&first).unwrap(),
            state.participants[..PARTICIPANTS_PAGE_LEN].to_vec()
        );
        let rest = Query::Participants { offset: PARTICIPANTS_PAGE_LEN as u32 }
            .answer(&state)
            .unwrap();
        assert_eq!(decode_answer::<Vec<Pubkey>>(&rest).unwrap().len(), 5);
    }

    #[test]
    fn answers_survive_trailing_zero_stripping() {
        let mut state = new_state(Pubkey::new_unique());
        state.ticket_price = 100_000_000;

        for query in [Query::TicketPrice, Query::SurpriseWinner, Query::StartAt] {
            let answer = query.answer(&state).unwrap();
            assert_eq!(answer.last(), Some(&ANSWER_TERMINATOR));

            // The runtime keeps return data only up to its last non-zero byte
            let kept = answer.iter().rposition(|byte| *byte != 0).map_or(0, |last| last + 1);
            assert_eq!(kept, answer.len());
        }

        let price = Query::TicketPrice.answer(&state).unwrap();
        assert_eq!(decode_answer::<u64>(&price).unwrap(), 100_000_000);
        assert!(decode_answer::<u64>(&price[..price.len() - 1]).is_err());
    }
}
